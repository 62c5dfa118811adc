// ── Core identity types ──
//
// StableId and TransportSerial are the two keys every other type hangs
// off. A stable id names a piece of hardware; a transport serial names
// one live session to it. Several serials may resolve to one stable id.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

// ── StableId ────────────────────────────────────────────────────────

/// Hardware-rooted identifier (the boot-time serial property).
///
/// Immutable once assigned and used as the registry key. Distinct from
/// any transport serial: the same device seen over USB and over TCPIP
/// reports the same `StableId`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StableId(String);

impl StableId {
    /// Wrap a raw property value. Surrounding whitespace is dropped.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StableId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for StableId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ── TransportSerial ─────────────────────────────────────────────────

static ADDRESS_AND_PORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}\.[0-9]{1,3}:[0-9]{1,5}$")
        .expect("address:port pattern should compile")
});

/// Identifier the bridge reports for one live session.
///
/// An opaque serial for USB and emulator transports, `address:port`
/// for TCPIP transports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransportSerial(String);

impl TransportSerial {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Purely syntactic: `a.b.c.d:port` is a TCPIP transport.
    pub fn is_tcpip(&self) -> bool {
        ADDRESS_AND_PORT.is_match(&self.0)
    }

    /// The network endpoint of a TCPIP transport.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        if self.is_tcpip() {
            self.0.parse().ok()
        } else {
            None
        }
    }
}

impl fmt::Display for TransportSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransportSerial {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<SocketAddr> for TransportSerial {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn stable_id_trims_property_output() {
        let id = StableId::new("SN001\r\n");
        assert_eq!(id.as_str(), "SN001");
    }

    #[test]
    fn stable_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&StableId::new("SN001")).unwrap();
        assert_eq!(json, "\"SN001\"");
    }

    #[test]
    fn address_and_port_is_tcpip() {
        let serial = TransportSerial::from("192.168.1.5:5555");
        assert!(serial.is_tcpip());
        assert_eq!(
            serial.socket_addr(),
            Some("192.168.1.5:5555".parse().unwrap())
        );
    }

    #[test]
    fn opaque_serial_is_not_tcpip() {
        for raw in ["ABC123", "emulator-5554", "192.168.1.5", "adb-R58M._adb-tls-connect._tcp"] {
            let serial = TransportSerial::from(raw);
            assert!(!serial.is_tcpip(), "{raw} classified as tcpip");
            assert!(serial.socket_addr().is_none());
        }
    }

    #[test]
    fn socket_addr_round_trips_into_serial() {
        let addr: SocketAddr = "10.0.0.7:5555".parse().unwrap();
        assert_eq!(TransportSerial::from(addr).as_str(), "10.0.0.7:5555");
    }
}
