pub mod cli;
pub mod settings;

pub use cli::{CliConfig, LogLevel};
pub use settings::{Settings, SettingsError};
