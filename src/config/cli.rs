use clap::Parser;
use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "snmpgate", version, about = "SNMP polling gateway")]
pub struct CliConfig {
    // IPv4 or IPv6 literal (e.g., 0.0.0.0, 127.0.0.1, ::, ::1).
    #[arg(long = "host", short = 'H', env = "SNMPGATE_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(long = "port", short = 'p', env = "SNMPGATE_PORT", default_value_t = 1216)]
    pub port: u16,

    // Missing file falls back to built-in defaults; see settings.rs.
    #[arg(long = "config", env = "SNMPGATE_CONFIG_FILE", default_value = "snmpgate.toml")]
    pub config_file: PathBuf,

    #[arg(long = "log", default_value = "info")]
    pub log_level: LogLevel,
}

impl CliConfig {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((self.host, self.port))
    }
}

// -----------------------------------------------------------------------------
// ----- LogLevel --------------------------------------------------------------

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
