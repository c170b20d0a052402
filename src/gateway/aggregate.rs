use tokio::sync::mpsc;

use crate::request::{PollResult, UnitResult};

// -----------------------------------------------------------------------------
// ----- Aggregation -----------------------------------------------------------

/// One poll task's contribution: a scalar fetch yields one unit, a subtree
/// walk one per row (or a single failure unit).
#[derive(Debug)]
pub(crate) struct TaskOutput {
    pub data: Vec<UnitResult>,
    pub error: String,
}

impl TaskOutput {
    pub fn ok(data: Vec<UnitResult>) -> Self {
        Self {
            data,
            error: String::new(),
        }
    }

    pub fn failed(index: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            data: vec![UnitResult::failed(index, error.clone())],
            error,
        }
    }
}

/// Fan-in: collects exactly `expected` task outputs in completion order.
/// `data` is their concatenation; the top-level error is the first non-empty
/// task error to arrive, so which one wins under concurrent partial failure
/// is non-deterministic.
pub(crate) async fn collect(mut rx: mpsc::Receiver<TaskOutput>, expected: usize) -> PollResult {
    let mut result = PollResult::default();

    for _ in 0..expected {
        let Some(output) = rx.recv().await else {
            break;
        };
        result.data.extend(output.data);
        if result.error.is_empty() {
            result.error = output.error;
        }
    }

    result
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
