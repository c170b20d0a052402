use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::errors::GatewayError;
use crate::snmp::{PROBE_OID, SnmpConnector, SnmpSession, SnmpVersion, Target};

// -----------------------------------------------------------------------------
// ----- SessionPool -----------------------------------------------------------

/// Cache of open SNMP sessions keyed by target address, at most one per
/// address, bounded by `capacity`.
///
/// Lock discipline: lookups take the map read lock; inserts and removals
/// take the write lock. [`SessionPool::sweep`] holds the write lock for the
/// full sweep (probes included), so lookups block until a sweep finishes.
///
/// Creation is single-flight per address: concurrent callers that miss on
/// the same key serialize on a per-key mutex and all but the first find the
/// freshly stored session on re-check, so no duplicate connection is ever
/// opened for one key.
pub struct SessionPool<C: SnmpConnector> {
    connector: C,
    capacity: usize,
    max_lifetime: Duration,
    sessions: RwLock<HashMap<String, CachedSession<C::Session>>>,
    creating: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

struct CachedSession<S> {
    version: SnmpVersion,
    last_access: parking_lot::Mutex<Instant>,
    session: Arc<S>,
}

impl<S> CachedSession<S> {
    fn new(version: SnmpVersion, session: Arc<S>) -> Self {
        Self {
            version,
            last_access: parking_lot::Mutex::new(Instant::now()),
            session,
        }
    }

    fn touch(&self) {
        *self.last_access.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_access.lock().elapsed()
    }
}

// -----------------------------------------------------------------------------
// ----- SessionPool: Public ---------------------------------------------------

impl<C: SnmpConnector> SessionPool<C> {
    pub fn new(connector: C, capacity: usize, max_lifetime: Duration) -> Self {
        Self {
            connector,
            capacity: capacity.max(1),
            max_lifetime,
            sessions: RwLock::new(HashMap::new()),
            creating: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached session for `target.ip` when its version matches,
    /// refreshing its last-access time; otherwise opens a new one.
    ///
    /// A version change replaces the cached entry; the superseded handle is
    /// closed once it leaves the map. When the pool is already at capacity a
    /// new connection is refused with `ResourceExhausted` before any network
    /// activity. If another creation fills the last slot while ours is in
    /// flight, the fresh session is returned to the caller but not cached.
    pub async fn get_or_create(&self, target: &Target) -> Result<Arc<C::Session>, GatewayError> {
        if let Some(session) = self.lookup(target).await {
            return Ok(session);
        }

        let key_lock = self.key_lock(&target.ip);
        let result = {
            let _guard = key_lock.lock().await;

            // Another caller may have finished creating while we waited.
            match self.lookup(target).await {
                Some(session) => Ok(session),
                None => self.create(target).await,
            }
        };
        // Our clone must be gone before the waiter-count check below.
        drop(key_lock);
        self.release_key_lock(&target.ip);

        result
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Removes and closes the entry for `ip`, if present.
    pub async fn close(&self, ip: &str) -> bool {
        let removed = self.sessions.write().await.remove(ip);
        match removed {
            Some(cached) => {
                cached.session.close().await;
                true
            }
            None => false,
        }
    }

    /// Drains the pool, closing every session. Shutdown path.
    pub async fn close_all(&self) {
        let drained: Vec<_> = self.sessions.write().await.drain().collect();
        for (ip, cached) in drained {
            debug!("closing snmp session {ip}");
            cached.session.close().await;
        }
    }

    /// One reaper pass. Entries idle past `max_lifetime` are removed and
    /// closed; survivors get a liveness probe and are removed on failure
    /// regardless of age. Holds the write lock for the whole pass.
    pub async fn sweep(&self) {
        let mut sessions = self.sessions.write().await;

        let mut dead = Vec::new();
        for (ip, cached) in sessions.iter() {
            if cached.idle_for() > self.max_lifetime {
                debug!("snmp session expired: {ip}");
                dead.push(ip.clone());
            } else if cached.session.get(&PROBE_OID).await.is_err() {
                debug!("snmp session failed probe: {ip}");
                dead.push(ip.clone());
            }
        }

        for ip in dead {
            if let Some(cached) = sessions.remove(&ip) {
                cached.session.close().await;
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- SessionPool: Private --------------------------------------------------

impl<C: SnmpConnector> SessionPool<C> {
    async fn lookup(&self, target: &Target) -> Option<Arc<C::Session>> {
        let sessions = self.sessions.read().await;
        let cached = sessions.get(&target.ip)?;
        if cached.version != target.version {
            return None;
        }
        cached.touch();
        Some(cached.session.clone())
    }

    /// Caller holds the per-key lock and has re-checked for a hit.
    async fn create(&self, target: &Target) -> Result<Arc<C::Session>, GatewayError> {
        // Checked before connecting, even when this is a version-change
        // overwrite that would not grow the map.
        if self.sessions.read().await.len() >= self.capacity {
            return Err(GatewayError::ResourceExhausted);
        }

        info!("create snmp session {}", target.ip);
        let session = self
            .connector
            .connect(target)
            .await
            .map_err(|source| GatewayError::Connection {
                ip: target.ip.clone(),
                source,
            })?;
        let session = Arc::new(session);

        let superseded = {
            let mut sessions = self.sessions.write().await;
            let superseded = sessions.remove(&target.ip);
            if sessions.len() < self.capacity {
                debug!("save snmp session: {}", target.ip);
                sessions.insert(
                    target.ip.clone(),
                    CachedSession::new(target.version, session.clone()),
                );
            } else {
                // Capacity filled while we were connecting. The caller still
                // gets a usable handle for this request only.
                debug!("pool full, not caching session for {}", target.ip);
            }
            superseded
        };

        if let Some(old) = superseded {
            old.session.close().await;
        }

        Ok(session)
    }

    fn key_lock(&self, ip: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.creating
            .lock()
            .entry(ip.to_string())
            .or_default()
            .clone()
    }

    fn release_key_lock(&self, ip: &str) {
        let mut creating = self.creating.lock();
        if let Some(lock) = creating.get(ip) {
            // Only the map itself still holds the Arc: no waiters left.
            if Arc::strong_count(lock) == 1 {
                creating.remove(ip);
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
