// ── Transport domain types ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::identity::TransportSerial;

/// How a transport reaches its device. Classification is syntactic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "lowercase")]
pub enum TransportKind {
    Usb,
    Tcpip,
    Emulator,
}

/// Connection state reported by the bridge for one transport.
///
/// Spelled the way `adb devices` prints it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[non_exhaustive]
pub enum TransportState {
    #[strum(serialize = "device")]
    Online,
    Offline,
    Unauthorized,
    Authorizing,
    Connecting,
    Bootloader,
    Recovery,
    Sideload,
    #[strum(serialize = "no permissions")]
    NoPermissions,
    #[strum(default)]
    Unknown(String),
}

impl TransportState {
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

/// What changed about a transport, as reported with a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceChange {
    State,
    ClientList,
    BuildInfo,
}

/// One live transport as reported by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transport {
    pub serial: TransportSerial,
    /// Set by the bridge, never inferred from the serial.
    pub emulator: bool,
    pub state: TransportState,
}

impl Transport {
    /// An online USB/TCPIP transport with the given serial.
    pub fn online(serial: impl Into<TransportSerial>) -> Self {
        Self {
            serial: serial.into(),
            emulator: false,
            state: TransportState::Online,
        }
    }

    pub fn kind(&self) -> TransportKind {
        if self.serial.is_tcpip() {
            TransportKind::Tcpip
        } else if self.emulator {
            TransportKind::Emulator
        } else {
            TransportKind::Usb
        }
    }

    pub fn is_online(&self) -> bool {
        self.state.is_online()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn kind_prefers_address_syntax() {
        let mut transport = Transport::online("10.0.0.7:5555");
        transport.emulator = true;
        assert_eq!(transport.kind(), TransportKind::Tcpip);
    }

    #[test]
    fn emulator_flag_comes_from_bridge() {
        let mut transport = Transport::online("emulator-5554");
        assert_eq!(transport.kind(), TransportKind::Usb);
        transport.emulator = true;
        assert_eq!(transport.kind(), TransportKind::Emulator);
    }

    #[test]
    fn state_parses_adb_spelling() {
        assert_eq!("device".parse::<TransportState>().unwrap(), TransportState::Online);
        assert_eq!(
            "unauthorized".parse::<TransportState>().unwrap(),
            TransportState::Unauthorized
        );
        assert_eq!(
            "no permissions".parse::<TransportState>().unwrap(),
            TransportState::NoPermissions
        );
        assert_eq!(
            "host".parse::<TransportState>().unwrap(),
            TransportState::Unknown("host".into())
        );
    }

    #[test]
    fn only_device_state_is_online() {
        assert!(TransportState::Online.is_online());
        assert!(!TransportState::Offline.is_online());
        assert!(!TransportState::Unauthorized.is_online());
    }
}
