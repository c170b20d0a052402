//! Protocol seam. The gateway core is generic over these traits; the real
//! UDP driver is an external concern and plugs in without touching the pool
//! or dispatcher. `sim` provides the in-process backend used by the bundled
//! binary and the tests.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::errors::GatewayError;

pub mod sim;

// -----------------------------------------------------------------------------
// ----- Probe oid -------------------------------------------------------------

/// sysObjectID. A fixed, cheap scalar every agent answers; the reaper uses it
/// as the liveness probe.
pub static PROBE_OID: Lazy<Oid> = Lazy::new(|| {
    ".1.3.6.1.2.1.1.2.0"
        .parse()
        .expect("probe oid literal is well-formed")
});

// -----------------------------------------------------------------------------
// ----- SnmpVersion -----------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnmpVersion {
    V1,
    V2c,
}

impl SnmpVersion {
    pub fn as_str(self) -> &'static str {
        match self {
            SnmpVersion::V1 => "v1",
            SnmpVersion::V2c => "v2c",
        }
    }
}

impl FromStr for SnmpVersion {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "v1" => Ok(SnmpVersion::V1),
            "v2c" => Ok(SnmpVersion::V2c),
            // v3 needs user/auth plumbing the agent side doesn't have.
            "v3" => Err(GatewayError::UnimplementedVersion(s.to_string())),
            other => Err(GatewayError::UnsupportedVersion(other.to_string())),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Oid -------------------------------------------------------------------

/// A dotted object identifier. Parsed once at the edge; everything past the
/// validator works with this type, never raw strings.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(Vec<u32>);

impl Oid {
    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    /// Whether `self` sits under `root` (used to bound subtree walks).
    pub fn starts_with(&self, root: &Oid) -> bool {
        self.0.len() >= root.0.len() && self.0[..root.0.len()] == root.0[..]
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("snmp oid({0}) format error")]
pub struct OidParseError(pub String);

impl FromStr for Oid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Err(OidParseError(s.to_string()));
        }
        let arcs = trimmed
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| OidParseError(s.to_string()))?;
        Ok(Oid(arcs))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for arc in &self.0 {
            write!(f, ".{arc}")?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// ----- Value -----------------------------------------------------------------

/// Decoded SNMP value. `Unsupported` carries the raw BER tag of an encoding
/// the decoder does not handle; poll tasks must treat it as a failure rather
/// than render garbage.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Integer(i64),
    OctetString(String),
    ObjectId(Oid),
    Counter(u64),
    Gauge(u32),
    TimeTicks(u32),
    Unsupported(u8),
}

impl Value {
    pub fn is_supported(&self) -> bool {
        !matches!(self, Value::Unsupported(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::OctetString(v) => write!(f, "{v}"),
            Value::ObjectId(v) => write!(f, "{v}"),
            Value::Counter(v) => write!(f, "{v}"),
            Value::Gauge(v) => write!(f, "{v}"),
            Value::TimeTicks(v) => write!(f, "{v}"),
            Value::Unsupported(tag) => write!(f, "<unsupported ber type 0x{tag:02x}>"),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- SnmpError -------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SnmpError {
    #[error("timeout waiting for {ip}")]
    Timeout { ip: String },

    #[error("community rejected by {ip}")]
    BadCredential { ip: String },

    #[error("no such object: {0}")]
    NoSuchObject(Oid),

    #[error("session closed")]
    Closed,

    #[error("network error: {0}")]
    Network(String),
}

// -----------------------------------------------------------------------------
// ----- Target ----------------------------------------------------------------

/// Everything needed to open a session to one device. The community string
/// is a credential and stays wrapped until the driver needs it.
#[derive(Clone, Debug)]
pub struct Target {
    pub ip: String,
    pub community: SecretString,
    pub version: SnmpVersion,
    pub timeout: Duration,
    pub retry: u32,
}

impl Target {
    pub fn new(
        ip: impl Into<String>,
        community: impl Into<String>,
        version: SnmpVersion,
        timeout: Duration,
        retry: u32,
    ) -> Self {
        Self {
            ip: ip.into(),
            community: SecretString::new(community.into().into_boxed_str()),
            version,
            timeout,
            retry,
        }
    }

    pub fn community_exposed(&self) -> &str {
        self.community.expose_secret()
    }
}

// -----------------------------------------------------------------------------
// ----- Traits ----------------------------------------------------------------

/// Session factory. One connector serves the whole process.
#[async_trait]
pub trait SnmpConnector: Send + Sync + 'static {
    type Session: SnmpSession;

    async fn connect(&self, target: &Target) -> Result<Self::Session, SnmpError>;
}

#[async_trait]
impl<C: SnmpConnector> SnmpConnector for std::sync::Arc<C> {
    type Session = C::Session;

    async fn connect(&self, target: &Target) -> Result<Self::Session, SnmpError> {
        self.as_ref().connect(target).await
    }
}

/// One open session to a device. Handles are shared across concurrent poll
/// tasks via `Arc`, so implementations must be internally synchronized, and
/// `close` must tolerate in-flight operations (they fail with `Closed`).
#[async_trait]
pub trait SnmpSession: Send + Sync + 'static {
    /// Single-oid fetch. Also serves as the liveness probe when pointed at
    /// [`PROBE_OID`].
    async fn get(&self, oid: &Oid) -> Result<Value, SnmpError>;

    /// Fetch every pair under `root`, in oid order.
    async fn walk(&self, root: &Oid) -> Result<Vec<(Oid, Value)>, SnmpError>;

    async fn close(&self);
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
