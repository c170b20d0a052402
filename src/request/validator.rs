use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::GatewayError;
use crate::snmp::Oid;

use super::types::{PollRequest, PollTask, TaskKind};

// -----------------------------------------------------------------------------
// ----- Validation ------------------------------------------------------------

/// Digits, dots and commas only; applied to the oid list of each group
/// before the per-identifier parse.
static OID_LIST_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[.\d,]+$").expect("static regex"));

/// Fails fast on the first offending field or identifier. No network
/// activity happens for an invalid request.
pub fn validate(req: &PollRequest) -> Result<(), GatewayError> {
    required("seq", &req.seq)?;
    required("ip", &req.ip)?;
    required("community", &req.community)?;
    required("oids", &req.oids)?;
    required("version", &req.version)?;

    parse_tasks(&req.oids).map(drop)
}

fn required(name: &str, value: &str) -> Result<(), GatewayError> {
    if value.is_empty() {
        return Err(GatewayError::validation(format!("'{name}' is null")));
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Oid specification grammar ---------------------------------------------

/// Parses the `oids` field: `group ("!" group)*`, where
/// `group = kind ":" oid ("," oid)*` and `kind` is `get` or `table`.
/// Shared by the validator and the dispatcher so the grammar lives in one
/// place.
pub fn parse_tasks(spec: &str) -> Result<Vec<PollTask>, GatewayError> {
    let mut tasks = Vec::new();

    for group in spec.split('!') {
        let (kind_str, oid_list) = match group.split_once(':') {
            Some((kind, oids)) => (kind, Some(oids)),
            None => (group, None),
        };

        let kind = match kind_str {
            "get" => TaskKind::Scalar,
            "table" => TaskKind::Subtree,
            other => {
                return Err(GatewayError::validation(format!(
                    "unsupported snmp method '{other}'"
                )));
            }
        };

        let Some(oid_list) = oid_list else {
            continue;
        };

        if !OID_LIST_RE.is_match(oid_list) {
            return Err(GatewayError::validation(format!(
                "snmp oid({oid_list}) format error"
            )));
        }

        for raw in oid_list.split(',') {
            let oid: Oid = raw.parse().map_err(|_| {
                GatewayError::validation(format!("snmp oid({raw}) format error"))
            })?;
            tasks.push(PollTask { kind, oid });
        }
    }

    Ok(tasks)
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
