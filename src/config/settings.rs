use serde::Deserialize;
use std::{path::Path, time::Duration};
use thiserror::Error;
use tokio::fs;
use tracing::warn;

// -----------------------------------------------------------------------------
// ----- Settings --------------------------------------------------------------

/// Process-wide tunables, read once at startup. No dynamic reload.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub snmp: SnmpSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SnmpSettings {
    /// Pool capacity: max cached sessions.
    pub max_sessions: usize,
    /// Idle lifetime before the reaper expires a session, in seconds.
    pub max_lifetime_secs: u64,
    /// Default per-call timeout, in seconds; callers may override.
    pub timeout_secs: u64,
    /// Default retry count forwarded to the protocol driver.
    pub retry: u32,
    /// Max protocol operations in flight process-wide.
    pub async_limit: usize,
}

impl Default for SnmpSettings {
    fn default() -> Self {
        Self {
            max_sessions: 1000,
            max_lifetime_secs: 30,
            timeout_secs: 2,
            retry: 1,
            async_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogSettings {
    /// Lowers the default tracing filter to debug.
    pub debug: bool,
}

// -----------------------------------------------------------------------------
// ----- Settings: Public ------------------------------------------------------

impl Settings {
    /// Loads the settings file. A missing file is not an error, matching the
    /// original agent's tolerant loader: built-in defaults apply. A present
    /// but malformed file is loud.
    pub async fn from_file(path: &Path) -> Result<Settings, SettingsError> {
        let raw = match fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("settings file {:?} not found, using defaults", path);
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Settings, SettingsError> {
        toml::from_str(raw).map_err(|source| SettingsError::Toml { source })
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.snmp.max_lifetime_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.snmp.timeout_secs)
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("read error for {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings.snmp.max_sessions, 1000);
        assert_eq!(settings.max_lifetime(), Duration::from_secs(30));
        assert_eq!(settings.timeout(), Duration::from_secs(2));
        assert_eq!(settings.snmp.retry, 1);
        assert_eq!(settings.snmp.async_limit, 100);
        assert!(!settings.log.debug);
    }

    #[test]
    fn overrides_apply() {
        let settings = Settings::parse(
            r#"
            [snmp]
            max_sessions = 50
            async_limit = 8

            [log]
            debug = true
            "#,
        )
        .unwrap();
        assert_eq!(settings.snmp.max_sessions, 50);
        assert_eq!(settings.snmp.async_limit, 8);
        // Untouched keys keep their defaults.
        assert_eq!(settings.snmp.retry, 1);
        assert!(settings.log.debug);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(matches!(
            Settings::parse("[snmp\nmax_sessions = 50"),
            Err(SettingsError::Toml { .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let settings = Settings::from_file(Path::new("/nonexistent/snmpgate.toml"))
            .await
            .unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[snmp]\nmax_lifetime_secs = 7").unwrap();

        let settings = Settings::from_file(file.path()).await.unwrap();
        assert_eq!(settings.max_lifetime(), Duration::from_secs(7));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
