use thiserror::Error;

use crate::snmp::SnmpError;

// -----------------------------------------------------------------------------
// ----- GatewayError ----------------------------------------------------------

/// Request-level failures. Per-oid transport failures never surface here;
/// they stay inside the response as `UnitResult` errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or missing request fields. Reported before any network
    /// activity, never retried.
    #[error("parameter error: {0}")]
    Validation(String),

    /// Version outside the supported set.
    #[error("unsupported snmp version ({0})")]
    UnsupportedVersion(String),

    /// `v3` is recognized but not wired up; callers get an explicit answer
    /// instead of a silent downgrade.
    #[error("unsupported snmp version ({0}), not implemented yet")]
    UnimplementedVersion(String),

    /// Session pool is at capacity. Transient; the caller is expected to
    /// retry later, this layer does not.
    #[error("snmpgate: reached max snmp connections")]
    ResourceExhausted,

    /// Opening a session failed. Aborts the whole request, no partial
    /// results.
    #[error("connect to {ip} failed: {source}")]
    Connection { ip: String, source: SnmpError },
}

impl GatewayError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v3_message_names_unimplemented() {
        let err = GatewayError::UnimplementedVersion("v3".into());
        assert_eq!(
            err.to_string(),
            "unsupported snmp version (v3), not implemented yet"
        );
    }

    #[test]
    fn validation_message_prefix() {
        let err = GatewayError::validation("'community' is null");
        assert_eq!(err.to_string(), "parameter error: 'community' is null");
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
