use serde::{Deserialize, Serialize};

use crate::snmp::Oid;

// -----------------------------------------------------------------------------
// ----- PollRequest -----------------------------------------------------------

/// Inbound request fields, exactly as they arrive on the wire. Every field
/// defaults so a missing parameter validates as empty instead of failing
/// deserialization; the validator owns the error message.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PollRequest {
    #[serde(default)]
    pub seq: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub community: String,
    #[serde(default)]
    pub oids: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub timeout: Option<String>,
    #[serde(default)]
    pub retry: Option<String>,
}

// -----------------------------------------------------------------------------
// ----- PollTask --------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    /// `get:` single-value fetch.
    Scalar,
    /// `table:` subtree walk.
    Subtree,
}

/// One unit of work, produced by parsing the `oids` specification.
#[derive(Clone, Debug, PartialEq)]
pub struct PollTask {
    pub kind: TaskKind,
    pub oid: Oid,
}

// -----------------------------------------------------------------------------
// ----- Response payload ------------------------------------------------------

/// One oid's outcome. Field names are part of the wire contract.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UnitResult {
    #[serde(rename = "Index")]
    pub index: String,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "Error")]
    pub error: String,
}

impl UnitResult {
    pub fn ok(index: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            value: value.into(),
            error: String::new(),
        }
    }

    pub fn failed(index: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            value: String::new(),
            error: error.into(),
        }
    }
}

/// The full response. `data` is ordered by task completion, not request
/// order. `error` is the first non-empty per-task error observed, which
/// under concurrent partial failure is non-deterministic.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PollResult {
    #[serde(rename = "Data", default)]
    pub data: Vec<UnitResult>,
    #[serde(rename = "Error", default)]
    pub error: String,
}

impl PollResult {
    pub fn from_error(error: impl ToString) -> Self {
        Self {
            data: Vec::new(),
            error: error.to_string(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
