use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use snmpgate::config::{CliConfig, Settings};
use snmpgate::gateway::{self, ConcurrencyGate, Gateway, SessionPool};
use snmpgate::http;
use snmpgate::snmp::Value;
use snmpgate::snmp::sim::SimBackend;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "snmpgate";

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let cli = CliConfig::parse_args();
    let settings = Settings::from_file(&cli.config_file)
        .await
        .unwrap_or_else(|e| panic!("invalid settings: {e}"));

    init_tracing(&cli, &settings);
    run(cli, settings).await
}

fn init_tracing(cli: &CliConfig, settings: &Settings) {
    // The settings debug flag lowers the default filter; RUST_LOG and --log
    // still win when set.
    let level = if settings.log.debug {
        "debug"
    } else {
        cli.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run(cli: CliConfig, settings: Settings) -> std::io::Result<()> {
    let pool = Arc::new(SessionPool::new(
        demo_backend(),
        settings.snmp.max_sessions,
        settings.max_lifetime(),
    ));
    let reaper = gateway::reaper::spawn(pool.clone(), gateway::SWEEP_PERIOD);

    let gate = ConcurrencyGate::new(settings.snmp.async_limit);
    let gateway = Arc::new(Gateway::new(
        pool.clone(),
        gate,
        settings.timeout(),
        settings.snmp.retry,
    ));

    let listener = TcpListener::bind(cli.listen_addr()).await?;
    info!("{APP_NAME} listening on {}", cli.listen_addr());

    axum::serve(listener, http::router(gateway))
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("{APP_NAME} shutting down");
        })
        .await?;

    // Deterministic teardown: stop the reaper, then drain the pool.
    reaper.shutdown().await;
    pool.close_all().await;

    Ok(())
}

/// This build ships the in-process simulated backend; a real UDP driver
/// implements the same connector trait. One loopback device is seeded so the
/// endpoint is exercisable out of the box.
fn demo_backend() -> SimBackend {
    let backend = SimBackend::new();
    backend
        .add_device("127.0.0.1", "public")
        .set(".1.3.6.1.2.1.1.1.0", Value::OctetString("snmpgate demo device".into()))
        .set(".1.3.6.1.2.1.1.3.0", Value::TimeTicks(0))
        .set(".1.3.6.1.2.1.2.2.1.2.1", Value::OctetString("lo0".into()))
        .set(".1.3.6.1.2.1.2.2.1.10.1", Value::Counter(0));
    backend
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
