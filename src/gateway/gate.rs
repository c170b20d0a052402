use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

// -----------------------------------------------------------------------------
// ----- ConcurrencyGate -------------------------------------------------------

/// Process-wide bound on concurrently executing protocol operations. Acquire
/// blocks when the gate is saturated; excess work is delayed, never dropped.
/// Waiters are served FIFO.
#[derive(Clone, Debug)]
pub struct ConcurrencyGate {
    sem: Arc<Semaphore>,
    limit: usize,
}

impl ConcurrencyGate {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            sem: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub async fn acquire(&self) -> GatePermit {
        let permit = self
            .sem
            .clone()
            .acquire_owned()
            .await
            .expect("gate semaphore is never closed");
        GatePermit { _permit: permit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Free slots right now; test instrumentation.
    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }
}

/// Releases its slot on drop, success or failure alike.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_limit() {
        let gate = ConcurrencyGate::new(3);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..24 {
            let gate = gate.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire().await;
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(gate.available(), 3);
    }

    #[tokio::test]
    async fn permit_released_on_drop() {
        let gate = ConcurrencyGate::new(1);
        {
            let _permit = gate.acquire().await;
            assert_eq!(gate.available(), 0);
        }
        assert_eq!(gate.available(), 1);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
