// ── Persistence value objects ──
//
// What survives a session: every known device with its best-effort name
// and last wireless endpoint, plus the registry-wide "last connected"
// hint used for blind reconnection after a bridge restart.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::StableId;

/// Persisted view of one logical device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub stable_id: StableId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected_address: Option<SocketAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected_at: Option<DateTime<Utc>>,
}

impl DeviceSnapshot {
    pub fn new(stable_id: StableId) -> Self {
        Self {
            stable_id,
            display_name: None,
            last_connected_address: None,
            last_connected_at: None,
        }
    }

    /// Name to show a human: the display name, else the stable id.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(self.stable_id.as_str())
    }
}

/// Persisted view of the whole registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub devices: Vec<DeviceSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected_stable_id: Option<StableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_connected_address: Option<SocketAddr>,
}

impl RegistrySnapshot {
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty() && self.last_connected_address.is_none()
    }

    pub fn device(&self, stable_id: &StableId) -> Option<&DeviceSnapshot> {
        self.devices.iter().find(|d| &d.stable_id == stable_id)
    }

    /// Drop one remembered device. Clears the registry-level hint too when
    /// it pointed at that device. Returns whether anything was removed.
    pub fn forget(&mut self, stable_id: &StableId) -> bool {
        let before = self.devices.len();
        self.devices.retain(|d| &d.stable_id != stable_id);
        if self.last_connected_stable_id.as_ref() == Some(stable_id) {
            self.last_connected_stable_id = None;
            self.last_connected_address = None;
        }
        self.devices.len() != before
    }

    /// Endpoint to try first when reconnecting blind: the registry-level
    /// hint, else the first device that remembers an address.
    pub fn reconnect_target(&self) -> Option<SocketAddr> {
        self.last_connected_address.or_else(|| {
            self.devices
                .iter()
                .find_map(|d| d.last_connected_address)
        })
    }
}
