mod aggregate;
pub mod dispatcher;
pub mod gate;
pub mod pool;
pub mod reaper;

pub use dispatcher::{Gateway, POLL_FAILED};
pub use gate::ConcurrencyGate;
pub use pool::SessionPool;
pub use reaper::{ReaperHandle, SWEEP_PERIOD};
