pub mod config;
pub mod errors;
pub mod gateway;
pub mod http;
pub mod request;
pub mod snmp;

pub use config::{CliConfig, Settings};
pub use errors::GatewayError;
pub use gateway::{ConcurrencyGate, Gateway, SessionPool};
