pub mod types;
pub mod validator;

pub use types::{PollRequest, PollResult, PollTask, TaskKind, UnitResult};
pub use validator::{parse_tasks, validate};
