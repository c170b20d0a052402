//! In-memory SNMP backend. Stands in for the real UDP driver in the bundled
//! binary and in every test: devices are plain oid->value maps with a
//! community check, a connect counter, an optional connect delay to widen
//! race windows, and a kill switch so liveness probes can be made to fail.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Oid, PROBE_OID, SnmpConnector, SnmpError, SnmpSession, Target, Value};

// -----------------------------------------------------------------------------
// ----- SimBackend ------------------------------------------------------------

#[derive(Default)]
pub struct SimBackend {
    devices: RwLock<HashMap<String, Arc<SimDevice>>>,
    connects: AtomicUsize,
    connect_delay_ms: AtomicU64,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device at `ip`. The probe oid is pre-seeded so cached
    /// sessions survive reaper sweeps until the device is killed.
    pub fn add_device(
        &self,
        ip: impl Into<String>,
        community: impl Into<String>,
    ) -> Arc<SimDevice> {
        let device = Arc::new(SimDevice {
            community: community.into(),
            mib: RwLock::new(BTreeMap::new()),
            alive: AtomicBool::new(true),
        });
        device.set_oid(
            PROBE_OID.clone(),
            Value::ObjectId(".1.3.6.1.4.1.99999".parse().expect("static oid")),
        );
        self.devices.write().insert(ip.into(), device.clone());
        device
    }

    /// Total successful `connect` calls, for asserting session reuse and
    /// single-flight creation.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn set_connect_delay(&self, delay: Duration) {
        self.connect_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl SnmpConnector for SimBackend {
    type Session = SimSession;

    async fn connect(&self, target: &Target) -> Result<SimSession, SnmpError> {
        let delay = self.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let device = self
            .devices
            .read()
            .get(&target.ip)
            .cloned()
            .ok_or_else(|| SnmpError::Timeout {
                ip: target.ip.clone(),
            })?;

        if !device.alive.load(Ordering::SeqCst) {
            return Err(SnmpError::Timeout {
                ip: target.ip.clone(),
            });
        }
        if device.community != target.community_exposed() {
            return Err(SnmpError::BadCredential {
                ip: target.ip.clone(),
            });
        }

        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(SimSession {
            device,
            closed: AtomicBool::new(false),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- SimDevice -------------------------------------------------------------

#[derive(Debug)]
pub struct SimDevice {
    community: String,
    mib: RwLock<BTreeMap<Oid, Value>>,
    alive: AtomicBool,
}

impl SimDevice {
    /// Panics on a malformed oid literal; this is test/demo plumbing.
    pub fn set(&self, oid: &str, value: Value) -> &Self {
        let oid = oid.parse().expect("sim device oid literal");
        self.set_oid(oid, value);
        self
    }

    pub fn set_oid(&self, oid: Oid, value: Value) {
        self.mib.write().insert(oid, value);
    }

    /// Makes every subsequent operation (including the liveness probe) fail.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    pub fn revive(&self) {
        self.alive.store(true, Ordering::SeqCst);
    }
}

// -----------------------------------------------------------------------------
// ----- SimSession ------------------------------------------------------------

#[derive(Debug)]
pub struct SimSession {
    device: Arc<SimDevice>,
    closed: AtomicBool,
}

impl SimSession {
    fn check(&self) -> Result<(), SnmpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SnmpError::Closed);
        }
        if !self.device.alive.load(Ordering::SeqCst) {
            return Err(SnmpError::Timeout {
                ip: "<sim>".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SnmpSession for SimSession {
    async fn get(&self, oid: &Oid) -> Result<Value, SnmpError> {
        self.check()?;
        self.device
            .mib
            .read()
            .get(oid)
            .cloned()
            .ok_or_else(|| SnmpError::NoSuchObject(oid.clone()))
    }

    async fn walk(&self, root: &Oid) -> Result<Vec<(Oid, Value)>, SnmpError> {
        self.check()?;
        Ok(self
            .device
            .mib
            .read()
            .range(root.clone()..)
            .take_while(|(oid, _)| oid.starts_with(root))
            .map(|(oid, value)| (oid.clone(), value.clone()))
            .collect())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn target(ip: &str, community: &str) -> Target {
        Target::new(
            ip,
            community,
            crate::snmp::SnmpVersion::V2c,
            Duration::from_secs(2),
            1,
        )
    }

    #[tokio::test]
    async fn connect_checks_community() {
        let backend = SimBackend::new();
        backend.add_device("10.0.0.1", "public");

        assert!(backend.connect(&target("10.0.0.1", "public")).await.is_ok());
        assert!(matches!(
            backend.connect(&target("10.0.0.1", "private")).await,
            Err(SnmpError::BadCredential { .. })
        ));
        assert_eq!(backend.connects(), 1);
    }

    #[tokio::test]
    async fn walk_is_prefix_bounded() {
        let backend = SimBackend::new();
        let device = backend.add_device("10.0.0.1", "public");
        device
            .set(".1.3.6.1.2.1.2.2.1.2.1", Value::OctetString("eth0".into()))
            .set(".1.3.6.1.2.1.2.2.1.2.2", Value::OctetString("eth1".into()))
            .set(".1.3.6.1.2.1.3.1", Value::Integer(7));

        let sess = backend.connect(&target("10.0.0.1", "public")).await.unwrap();
        let rows = sess.walk(&".1.3.6.1.2.1.2.2".parse().unwrap()).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|(oid, _)| oid.to_string().starts_with(".1.3.6.1.2.1.2.2")));
    }

    #[tokio::test]
    async fn killed_device_fails_probe() {
        let backend = SimBackend::new();
        let device = backend.add_device("10.0.0.1", "public");
        let sess = backend.connect(&target("10.0.0.1", "public")).await.unwrap();

        assert!(sess.get(&PROBE_OID).await.is_ok());
        device.kill();
        assert!(matches!(
            sess.get(&PROBE_OID).await,
            Err(SnmpError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn closed_session_rejects_ops() {
        let backend = SimBackend::new();
        backend.add_device("10.0.0.1", "public");
        let sess = backend.connect(&target("10.0.0.1", "public")).await.unwrap();

        sess.close().await;
        assert!(matches!(sess.get(&PROBE_OID).await, Err(SnmpError::Closed)));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
