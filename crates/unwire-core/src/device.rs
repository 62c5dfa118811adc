// ── Logical device ──
//
// One piece of hardware, keyed by its stable id, with every transport
// currently open to it. Lives only inside the registry tables; nothing
// outside holds a reference to it.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::handle::DeviceHandle;
use crate::model::{DeviceSnapshot, StableId, TransportSerial};

#[derive(Debug)]
pub(crate) struct LogicalDevice {
    stable_id: StableId,
    display_name: Option<String>,
    last_connected_address: Option<SocketAddr>,
    last_connected_at: Option<DateTime<Utc>>,
    handles: BTreeMap<TransportSerial, Arc<DeviceHandle>>,
}

impl LogicalDevice {
    pub(crate) fn new(stable_id: StableId) -> Self {
        Self {
            stable_id,
            display_name: None,
            last_connected_address: None,
            last_connected_at: None,
            handles: BTreeMap::new(),
        }
    }

    pub(crate) fn stable_id(&self) -> &StableId {
        &self.stable_id
    }

    pub(crate) fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub(crate) fn last_connected_address(&self) -> Option<SocketAddr> {
        self.last_connected_address
    }

    /// Returns the existing handle for `serial`, or installs the one built
    /// by `make`. The flag is true when a new handle was installed.
    ///
    /// A freshly opened TCPIP handle records its endpoint as the last
    /// connected address.
    pub(crate) fn open(
        &mut self,
        serial: &TransportSerial,
        make: impl FnOnce() -> DeviceHandle,
    ) -> (Arc<DeviceHandle>, bool) {
        if let Some(existing) = self.handles.get(serial) {
            return (existing.clone(), false);
        }
        let handle = Arc::new(make());
        if let Some(addr) = handle.tcpip_address() {
            self.record_connected(addr, Utc::now());
        }
        self.handles.insert(serial.clone(), handle.clone());
        (handle, true)
    }

    /// Drop the handle for `serial`. Nothing else happens here: any
    /// reconnection is driven by later events.
    pub(crate) fn close(&mut self, serial: &TransportSerial) -> Option<Arc<DeviceHandle>> {
        self.handles.remove(serial)
    }

    pub(crate) fn close_all(&mut self) -> Vec<Arc<DeviceHandle>> {
        std::mem::take(&mut self.handles).into_values().collect()
    }

    pub(crate) fn is_open(&self) -> bool {
        !self.handles.is_empty()
    }

    pub(crate) fn is_open_over_tcpip(&self) -> bool {
        self.handles.values().any(|h| h.is_tcpip())
    }

    pub(crate) fn handles(&self) -> impl Iterator<Item = &Arc<DeviceHandle>> {
        self.handles.values()
    }

    // ── Best-effort fields ───────────────────────────────────────────

    /// Only a non-empty value replaces the current one.
    pub(crate) fn update_display_name(&mut self, name: Option<&str>) {
        if let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) {
            self.display_name = Some(name.to_owned());
        }
    }

    pub(crate) fn record_connected(&mut self, addr: SocketAddr, at: DateTime<Utc>) {
        self.last_connected_address = Some(addr);
        self.last_connected_at = Some(at);
    }

    // ── Persistence ──────────────────────────────────────────────────

    pub(crate) fn to_snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            stable_id: self.stable_id.clone(),
            display_name: self.display_name.clone(),
            last_connected_address: self.last_connected_address,
            last_connected_at: self.last_connected_at,
        }
    }

    /// Fold persisted fields in without clearing anything already known.
    pub(crate) fn merge_snapshot(&mut self, snapshot: &DeviceSnapshot) {
        self.update_display_name(snapshot.display_name.as_deref());
        if self.last_connected_address.is_none() {
            self.last_connected_address = snapshot.last_connected_address;
            self.last_connected_at = snapshot.last_connected_at;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Transport;
    use crate::testing::FakeAdb;

    fn make(fake: &Arc<FakeAdb>, serial: &str) -> impl FnOnce() -> DeviceHandle {
        let fake = fake.clone();
        let serial = serial.to_owned();
        move || {
            DeviceHandle::new(
                Transport::online(serial.as_str()),
                StableId::new("SN001"),
                fake.clone(),
                fake.clone(),
                Arc::new(fake.config()),
            )
        }
    }

    #[test]
    fn open_is_idempotent_per_serial() {
        let fake = FakeAdb::new();
        let mut device = LogicalDevice::new(StableId::new("SN001"));
        let (first, created) = device.open(&"USB1".into(), make(&fake, "USB1"));
        assert!(created);
        let (second, created) = device.open(&"USB1".into(), make(&fake, "USB1"));
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(device.handles().count(), 1);
    }

    #[test]
    fn tcpip_open_records_address() {
        let fake = FakeAdb::new();
        let mut device = LogicalDevice::new(StableId::new("SN001"));
        device.open(&"USB1".into(), make(&fake, "USB1"));
        assert!(!device.is_open_over_tcpip());
        assert_eq!(device.last_connected_address(), None);

        device.open(&"10.0.0.7:5555".into(), make(&fake, "10.0.0.7:5555"));
        assert!(device.is_open_over_tcpip());
        assert_eq!(
            device.last_connected_address(),
            Some("10.0.0.7:5555".parse().unwrap())
        );
    }

    #[test]
    fn close_keeps_best_effort_fields() {
        let fake = FakeAdb::new();
        let mut device = LogicalDevice::new(StableId::new("SN001"));
        device.update_display_name(Some("Robot"));
        device.open(&"10.0.0.7:5555".into(), make(&fake, "10.0.0.7:5555"));
        assert!(device.close(&"10.0.0.7:5555".into()).is_some());
        assert!(device.close(&"10.0.0.7:5555".into()).is_none());

        assert!(!device.is_open());
        assert_eq!(device.display_name(), Some("Robot"));
        assert!(device.last_connected_address().is_some());
    }

    #[test]
    fn empty_display_name_never_clears() {
        let mut device = LogicalDevice::new(StableId::new("SN001"));
        device.update_display_name(Some("Robot"));
        device.update_display_name(Some("  "));
        device.update_display_name(None);
        assert_eq!(device.display_name(), Some("Robot"));
    }

    #[test]
    fn merge_does_not_overwrite_live_address() {
        let mut device = LogicalDevice::new(StableId::new("SN001"));
        device.record_connected("10.0.0.8:5555".parse().unwrap(), Utc::now());

        let mut persisted = DeviceSnapshot::new(StableId::new("SN001"));
        persisted.last_connected_address = Some("10.0.0.7:5555".parse().unwrap());
        persisted.display_name = Some("Robot".into());
        device.merge_snapshot(&persisted);

        assert_eq!(
            device.last_connected_address(),
            Some("10.0.0.8:5555".parse().unwrap())
        );
        assert_eq!(device.display_name(), Some("Robot"));
    }
}
