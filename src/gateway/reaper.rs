use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

use crate::snmp::SnmpConnector;

use super::pool::SessionPool;

// -----------------------------------------------------------------------------
// ----- Reaper ----------------------------------------------------------------

/// Default sweep period.
pub const SWEEP_PERIOD: Duration = Duration::from_secs(10);

/// Spawns the background sweeper. Every `period` it runs one
/// [`SessionPool::sweep`] pass, expiring idle entries and probing the rest.
/// The returned handle stops it deterministically at shutdown.
pub fn spawn<C: SnmpConnector>(pool: Arc<SessionPool<C>>, period: Duration) -> ReaperHandle {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; consume it so the first sweep
        // happens one full period after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    pool.sweep().await;
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("session reaper stopped");
    });

    ReaperHandle { shutdown_tx, task }
}

#[derive(Debug)]
pub struct ReaperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signals the reaper and waits for it to finish its current sweep.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snmp::{SnmpVersion, Target};
    use crate::snmp::sim::SimBackend;

    fn target(ip: &str) -> Target {
        Target::new(ip, "public", SnmpVersion::V2c, Duration::from_secs(2), 1)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_gone_after_next_sweep() {
        let backend = SimBackend::new();
        backend.add_device("10.0.0.1", "public");
        let pool = Arc::new(SessionPool::new(backend, 10, Duration::from_secs(5)));
        let reaper = spawn(pool.clone(), SWEEP_PERIOD);
        settle().await;

        pool.get_or_create(&target("10.0.0.1")).await.unwrap();
        assert_eq!(pool.len().await, 1);

        // Past the entry's lifetime and past the next tick.
        tokio::time::advance(Duration::from_secs(11)).await;
        settle().await;

        assert!(pool.is_empty().await);
        reaper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_entry_survives_sweep_until_probe_fails() {
        let backend = SimBackend::new();
        let device = backend.add_device("10.0.0.1", "public");
        let pool = Arc::new(SessionPool::new(backend, 10, Duration::from_secs(60)));
        let reaper = spawn(pool.clone(), SWEEP_PERIOD);
        settle().await;

        pool.get_or_create(&target("10.0.0.1")).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;
        settle().await;
        assert_eq!(pool.len().await, 1);

        device.kill();
        tokio::time::advance(SWEEP_PERIOD).await;
        settle().await;

        assert!(pool.is_empty().await);
        reaper.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_task() {
        let pool = Arc::new(SessionPool::new(SimBackend::new(), 10, Duration::from_secs(5)));
        let reaper = spawn(pool, SWEEP_PERIOD);

        // Returns only once the task has exited.
        reaper.shutdown().await;
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
