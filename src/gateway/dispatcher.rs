use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::request::{self, PollRequest, PollResult, TaskKind, UnitResult};
use crate::snmp::{Oid, SnmpConnector, SnmpSession, SnmpVersion, Target};

use super::aggregate::{self, TaskOutput};
use super::gate::ConcurrencyGate;
use super::pool::SessionPool;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Fixed per-oid failure string; part of the wire contract.
pub const POLL_FAILED: &str = "snmp get failed";

// -----------------------------------------------------------------------------
// ----- Gateway ---------------------------------------------------------------

/// Turns a validated request into gate-guarded poll tasks against one pooled
/// session and aggregates their results. Owned by the serving process and
/// passed by reference; tests construct isolated instances.
pub struct Gateway<C: SnmpConnector> {
    pool: Arc<SessionPool<C>>,
    gate: ConcurrencyGate,
    default_timeout: Duration,
    default_retry: u32,
}

impl<C: SnmpConnector> Gateway<C> {
    pub fn new(
        pool: Arc<SessionPool<C>>,
        gate: ConcurrencyGate,
        default_timeout: Duration,
        default_retry: u32,
    ) -> Self {
        Self {
            pool,
            gate,
            default_timeout,
            default_retry,
        }
    }

    pub fn pool(&self) -> &Arc<SessionPool<C>> {
        &self.pool
    }

    /// Full request lifecycle: validate, resolve version/timeout/retry, get
    /// a pooled session, fan out one task per oid, fan in. Every failure
    /// comes back inside the `PollResult`; this never panics the caller.
    ///
    /// A connection failure aborts the whole request with no partial
    /// results. Per-oid failures do not abort sibling tasks. There is no
    /// per-request timeout and in-flight tasks are never cancelled.
    pub async fn poll(&self, req: &PollRequest) -> PollResult {
        if let Err(err) = request::validate(req) {
            return PollResult::from_error(err);
        }

        let version = match req.version.parse::<SnmpVersion>() {
            Ok(version) => version,
            // v3 and friends are rejected before any pool access.
            Err(err) => return PollResult::from_error(err),
        };

        let timeout = resolve_timeout(req.timeout.as_deref(), self.default_timeout);
        let retry = resolve_retry(req.retry.as_deref(), self.default_retry);
        let target = Target::new(&req.ip, &req.community, version, timeout, retry);

        let session = match self.pool.get_or_create(&target).await {
            Ok(session) => session,
            Err(err) => {
                error!("{err}");
                return PollResult::from_error(err);
            }
        };

        let tasks = match request::parse_tasks(&req.oids) {
            Ok(tasks) => tasks,
            Err(err) => return PollResult::from_error(err),
        };
        debug!(seq = %req.seq, ip = %req.ip, tasks = tasks.len(), "dispatching poll");

        let expected = tasks.len();
        let (tx, rx) = mpsc::channel(expected.max(1));

        for task in tasks {
            let session = session.clone();
            let gate = self.gate.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                // Backpressure: wait for a slot, hold it for the whole
                // operation, release on completion regardless of outcome.
                let _permit = gate.acquire().await;
                let output = match task.kind {
                    TaskKind::Scalar => scalar_fetch(session.as_ref(), &task.oid).await,
                    TaskKind::Subtree => subtree_walk(session.as_ref(), &task.oid).await,
                };
                let _ = tx.send(output).await;
            });
        }
        drop(tx);

        aggregate::collect(rx, expected).await
    }
}

// -----------------------------------------------------------------------------
// ----- Poll tasks ------------------------------------------------------------

async fn scalar_fetch<S: SnmpSession>(session: &S, oid: &Oid) -> TaskOutput {
    match session.get(oid).await {
        Ok(value) if value.is_supported() => {
            TaskOutput::ok(vec![UnitResult::ok(oid.to_string(), value.to_string())])
        }
        Ok(_) => TaskOutput::failed(oid.to_string(), POLL_FAILED),
        Err(err) => {
            error!("{oid} {err}");
            TaskOutput::failed(oid.to_string(), POLL_FAILED)
        }
    }
}

/// An empty subtree counts as a failure, same as a transport error: the
/// caller asked for a table that is not there.
async fn subtree_walk<S: SnmpSession>(session: &S, root: &Oid) -> TaskOutput {
    match session.walk(root).await {
        Ok(rows) if !rows.is_empty() => TaskOutput::ok(
            rows.into_iter()
                .map(|(oid, value)| UnitResult::ok(oid.to_string(), value.to_string()))
                .collect(),
        ),
        Ok(_) => TaskOutput::failed(root.to_string(), POLL_FAILED),
        Err(err) => {
            error!("{root} {err}");
            TaskOutput::failed(root.to_string(), POLL_FAILED)
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Overrides -------------------------------------------------------------

/// Caller-supplied timeout in whole seconds, falling back to the process
/// default when absent or unparsable.
fn resolve_timeout(raw: Option<&str>, default: Duration) -> Duration {
    match raw.and_then(|s| s.parse::<u64>().ok()) {
        Some(secs) => Duration::from_secs(secs),
        None => default,
    }
}

fn resolve_retry(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|s| s.parse::<u32>().ok()).unwrap_or(default)
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snmp::Value;
    use crate::snmp::sim::{SimBackend, SimDevice};

    fn gateway_with_device() -> (Gateway<SimBackend>, Arc<SimDevice>) {
        let backend = SimBackend::new();
        let device = backend.add_device("10.0.0.1", "public");
        device
            .set(".1.3.6.1.2.1.1.1.0", Value::OctetString("linux router".into()))
            .set(".1.3.6.1.2.1.1.3.0", Value::TimeTicks(123456))
            .set(".1.3.6.1.2.1.2.2.1.2.1", Value::OctetString("eth0".into()))
            .set(".1.3.6.1.2.1.2.2.1.2.2", Value::OctetString("eth1".into()))
            .set(".1.3.6.1.2.1.2.2.1.10.1", Value::Counter(1000))
            .set(".1.3.6.1.2.1.2.2.1.10.2", Value::Counter(2000));

        let pool = Arc::new(SessionPool::new(backend, 100, Duration::from_secs(30)));
        let gateway = Gateway::new(pool, ConcurrencyGate::new(100), Duration::from_secs(2), 1);
        (gateway, device)
    }

    fn request(oids: &str) -> PollRequest {
        PollRequest {
            seq: "1".into(),
            ip: "10.0.0.1".into(),
            community: "public".into(),
            oids: oids.into(),
            version: "v2c".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn scalar_and_table_mix_returns_one_unit_per_value() {
        let (gateway, _) = gateway_with_device();

        let result = gateway
            .poll(&request("get:.1.3.6.1.2.1.1.1.0!table:.1.3.6.1.2.1.2.2"))
            .await;

        assert_eq!(result.error, "");
        // One scalar unit plus one per table row.
        assert_eq!(result.data.len(), 1 + 4);
        assert!(result.data.iter().all(|unit| unit.error.is_empty()));
        let scalar = result
            .data
            .iter()
            .find(|unit| unit.index == ".1.3.6.1.2.1.1.1.0")
            .expect("scalar unit present");
        assert_eq!(scalar.value, "linux router");
    }

    #[tokio::test]
    async fn get_only_request_yields_one_unit_per_oid() {
        let (gateway, _) = gateway_with_device();

        let result = gateway
            .poll(&request("get:.1.3.6.1.2.1.1.1.0,.1.3.6.1.2.1.1.3.0"))
            .await;

        assert_eq!(result.error, "");
        assert_eq!(result.data.len(), 2);
    }

    #[tokio::test]
    async fn missing_oid_fails_that_unit_and_sets_top_level_error() {
        let (gateway, _) = gateway_with_device();

        let result = gateway
            .poll(&request("get:.1.3.6.1.2.1.1.1.0,.1.3.6.1.9.9.9.0"))
            .await;

        assert_eq!(result.error, POLL_FAILED);
        assert_eq!(result.data.len(), 2);
        let failed = result
            .data
            .iter()
            .find(|unit| unit.index == ".1.3.6.1.9.9.9.0")
            .expect("failed unit present");
        assert_eq!(failed.value, "");
        assert_eq!(failed.error, POLL_FAILED);
        // The sibling task still succeeded.
        assert!(result.data.iter().any(|unit| unit.error.is_empty()));
    }

    #[tokio::test]
    async fn empty_table_is_a_failure_for_the_root() {
        let (gateway, _) = gateway_with_device();

        let result = gateway.poll(&request("table:.1.3.6.1.4.9")).await;

        assert_eq!(result.error, POLL_FAILED);
        assert_eq!(result.data.len(), 1);
        assert_eq!(result.data[0].index, ".1.3.6.1.4.9");
    }

    #[tokio::test]
    async fn unsupported_encoding_is_a_failure() {
        let (gateway, device) = gateway_with_device();
        device.set(".1.3.6.1.2.1.1.9.0", Value::Unsupported(0x44));

        let result = gateway.poll(&request("get:.1.3.6.1.2.1.1.9.0")).await;

        assert_eq!(result.error, POLL_FAILED);
        assert_eq!(result.data[0].value, "");
    }

    #[tokio::test]
    async fn v3_rejected_before_pool_access() {
        let (gateway, _) = gateway_with_device();
        let mut req = request("get:.1.3.6.1.2.1.1.1.0");
        req.version = "v3".into();

        let result = gateway.poll(&req).await;

        assert_eq!(
            result.error,
            "unsupported snmp version (v3), not implemented yet"
        );
        assert!(result.data.is_empty());
        assert!(gateway.pool().is_empty().await);
    }

    #[tokio::test]
    async fn validation_failure_makes_no_network_call() {
        let (gateway, _) = gateway_with_device();
        let req = request("walk:.1.3.6.1.2.1.1.1.0");

        let result = gateway.poll(&req).await;

        assert!(result.error.contains("unsupported snmp method 'walk'"));
        assert!(gateway.pool().is_empty().await);
    }

    #[tokio::test]
    async fn connection_failure_aborts_whole_request() {
        let (gateway, _) = gateway_with_device();
        let mut req = request("get:.1.3.6.1.2.1.1.1.0");
        req.ip = "10.9.9.9".into();

        let result = gateway.poll(&req).await;

        assert!(result.error.starts_with("connect to 10.9.9.9 failed"));
        assert!(result.data.is_empty());
    }

    #[tokio::test]
    async fn large_request_completes_under_small_gate() {
        let backend = SimBackend::new();
        let device = backend.add_device("10.0.0.1", "public");
        for i in 0..40u32 {
            device.set_oid(
                format!(".1.3.6.1.2.1.99.{i}").parse().unwrap(),
                Value::Integer(i as i64),
            );
        }
        let pool = Arc::new(SessionPool::new(backend, 10, Duration::from_secs(30)));
        let gateway = Gateway::new(pool, ConcurrencyGate::new(2), Duration::from_secs(2), 1);

        let oids: Vec<String> = (0..40).map(|i| format!(".1.3.6.1.2.1.99.{i}")).collect();
        let result = gateway
            .poll(&request(&format!("get:{}", oids.join(","))))
            .await;

        assert_eq!(result.error, "");
        assert_eq!(result.data.len(), 40);
    }

    #[test]
    fn timeout_and_retry_fall_back_to_defaults() {
        let default = Duration::from_secs(2);
        assert_eq!(resolve_timeout(None, default), default);
        assert_eq!(resolve_timeout(Some(""), default), default);
        assert_eq!(resolve_timeout(Some("abc"), default), default);
        assert_eq!(resolve_timeout(Some("7"), default), Duration::from_secs(7));

        assert_eq!(resolve_retry(None, 1), 1);
        assert_eq!(resolve_retry(Some("x"), 1), 1);
        assert_eq!(resolve_retry(Some("3"), 1), 3);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
