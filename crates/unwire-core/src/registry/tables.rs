// ── Registry tables ──
//
// Everything the primary lock guards: logical devices by stable id, the
// reverse index from transport serial to open handle, and the registry
// wide "last connected" hint. All methods are synchronous.

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::device::LogicalDevice;
use crate::handle::DeviceHandle;
use crate::model::{RegistrySnapshot, StableId, TransportKind, TransportSerial};

/// Point-in-time view of one device, handed out to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStatus {
    pub stable_id: StableId,
    pub display_name: Option<String>,
    pub last_connected_address: Option<SocketAddr>,
    pub transports: Vec<(TransportSerial, TransportKind)>,
}

impl DeviceStatus {
    pub fn is_open_over_tcpip(&self) -> bool {
        self.transports
            .iter()
            .any(|(_, kind)| *kind == TransportKind::Tcpip)
    }
}

/// What promotion needs to know about one device, copied out of the lock.
#[derive(Debug, Clone)]
pub(crate) struct PromotionView {
    pub label: String,
    pub open: bool,
    pub open_over_tcpip: bool,
    /// Handles promotion may drive; never TCPIP ones.
    pub wired: Vec<Arc<DeviceHandle>>,
    /// Some open handle anywhere already occupies this address.
    pub group_owner_in_use: bool,
}

#[derive(Debug, Default)]
pub(crate) struct DeviceTables {
    devices: BTreeMap<StableId, LogicalDevice>,
    index: HashMap<TransportSerial, Arc<DeviceHandle>>,
    last_connected: Option<(StableId, SocketAddr)>,
}

impl DeviceTables {
    // ── Handles ──────────────────────────────────────────────────────

    /// Find-or-create the device, then find-or-open the handle. Returns
    /// the handle and whether it was newly opened.
    pub(crate) fn open(
        &mut self,
        stable_id: &StableId,
        display_name: Option<&str>,
        serial: &TransportSerial,
        make: impl FnOnce() -> DeviceHandle,
    ) -> (Arc<DeviceHandle>, bool) {
        // A serial re-attached under a different identity: drop the stale handle.
        if self
            .index
            .get(serial)
            .is_some_and(|h| h.stable_id() != stable_id)
        {
            self.close(serial);
        }

        let device = self
            .devices
            .entry(stable_id.clone())
            .or_insert_with(|| LogicalDevice::new(stable_id.clone()));
        device.update_display_name(display_name);
        let (handle, created) = device.open(serial, make);
        if created {
            debug!(serial = %serial, stable_id = %stable_id, kind = %handle.kind(), "opened");
            if let Some(addr) = handle.tcpip_address() {
                self.last_connected = Some((stable_id.clone(), addr));
            }
        }
        self.index.insert(serial.clone(), handle.clone());
        (handle, created)
    }

    /// Detach the handle for `serial` from its device and the index.
    pub(crate) fn close(&mut self, serial: &TransportSerial) -> Option<Arc<DeviceHandle>> {
        let handle = self.index.remove(serial)?;
        if let Some(device) = self.devices.get_mut(handle.stable_id()) {
            device.close(serial);
        }
        debug!(serial = %serial, stable_id = %handle.stable_id(), "closed");
        Some(handle)
    }

    pub(crate) fn close_all(&mut self) -> usize {
        self.index.clear();
        self.devices
            .values_mut()
            .map(|d| d.close_all().len())
            .sum()
    }

    #[cfg(test)]
    pub(crate) fn handle(&self, serial: &TransportSerial) -> Option<&Arc<DeviceHandle>> {
        self.index.get(serial)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub(crate) fn stable_ids(&self) -> Vec<StableId> {
        self.devices.keys().cloned().collect()
    }

    pub(crate) fn promotion_view(
        &self,
        stable_id: &StableId,
        group_owner: IpAddr,
    ) -> Option<PromotionView> {
        let device = self.devices.get(stable_id)?;
        let group_owner_in_use = self
            .index
            .values()
            .any(|h| h.tcpip_address().is_some_and(|a| a.ip() == group_owner));
        Some(PromotionView {
            label: device
                .display_name()
                .unwrap_or(device.stable_id().as_str())
                .to_owned(),
            open: device.is_open(),
            open_over_tcpip: device.is_open_over_tcpip(),
            wired: device.handles().filter(|h| !h.is_tcpip()).cloned().collect(),
            group_owner_in_use,
        })
    }

    pub(crate) fn status(&self) -> Vec<DeviceStatus> {
        self.devices
            .values()
            .map(|d| DeviceStatus {
                stable_id: d.stable_id().clone(),
                display_name: d.display_name().map(str::to_owned),
                last_connected_address: d.last_connected_address(),
                transports: d.handles().map(|h| (h.serial().clone(), h.kind())).collect(),
            })
            .collect()
    }

    pub(crate) fn last_connected_address(&self) -> Option<SocketAddr> {
        self.last_connected.as_ref().map(|(_, addr)| *addr)
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Remember a successful TCPIP connect on the device and the registry.
    pub(crate) fn record_connected(&mut self, stable_id: &StableId, addr: SocketAddr, at: DateTime<Utc>) {
        if let Some(device) = self.devices.get_mut(stable_id) {
            device.record_connected(addr, at);
        }
        self.last_connected = Some((stable_id.clone(), addr));
    }

    /// Remove one device outright. Returns the handles it had open, or
    /// `None` for an unknown device.
    pub(crate) fn forget(&mut self, stable_id: &StableId) -> Option<Vec<Arc<DeviceHandle>>> {
        let mut device = self.devices.remove(stable_id)?;
        let closed = device.close_all();
        for handle in &closed {
            self.index.remove(handle.serial());
        }
        if self.last_connected.as_ref().is_some_and(|(id, _)| id == stable_id) {
            self.last_connected = None;
        }
        Some(closed)
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    // ── Persistence ──────────────────────────────────────────────────

    pub(crate) fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            devices: self.devices.values().map(LogicalDevice::to_snapshot).collect(),
            last_connected_stable_id: self.last_connected.as_ref().map(|(id, _)| id.clone()),
            last_connected_address: self.last_connected_address(),
        }
    }

    /// Merge a persisted snapshot. Devices that are absent from it and
    /// have no open transport are dropped; everything else is kept and
    /// only gains information.
    pub(crate) fn restore(&mut self, snapshot: &RegistrySnapshot) {
        self.devices.retain(|id, device| {
            device.is_open() || snapshot.device(id).is_some()
        });
        for persisted in &snapshot.devices {
            self.devices
                .entry(persisted.stable_id.clone())
                .or_insert_with(|| LogicalDevice::new(persisted.stable_id.clone()))
                .merge_snapshot(persisted);
        }
        if self.last_connected.is_none() {
            self.last_connected = snapshot
                .last_connected_stable_id
                .clone()
                .zip(snapshot.last_connected_address);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{DeviceSnapshot, Transport};
    use crate::testing::FakeAdb;
    use pretty_assertions::assert_eq;

    fn open(tables: &mut DeviceTables, fake: &Arc<FakeAdb>, id: &str, serial: &str) -> Arc<DeviceHandle> {
        let fake = fake.clone();
        let transport = Transport::online(serial);
        let stable_id = StableId::new(id);
        tables
            .open(&stable_id.clone(), None, &transport.serial.clone(), move || {
                DeviceHandle::new(
                    transport,
                    stable_id,
                    fake.clone(),
                    fake.clone(),
                    Arc::new(fake.config()),
                )
            })
            .0
    }

    #[test]
    fn one_device_many_transports() {
        let fake = FakeAdb::new();
        let mut tables = DeviceTables::default();
        open(&mut tables, &fake, "SN001", "ABC123");
        open(&mut tables, &fake, "SN001", "192.168.1.5:5555");

        let status = tables.status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].transports.len(), 2);
        assert!(status[0].is_open_over_tcpip());
        assert_eq!(
            tables.last_connected_address(),
            Some("192.168.1.5:5555".parse().unwrap())
        );
    }

    #[test]
    fn reattached_serial_moves_to_new_identity() {
        let fake = FakeAdb::new();
        let mut tables = DeviceTables::default();
        open(&mut tables, &fake, "SN001", "USB1");
        open(&mut tables, &fake, "SN002", "USB1");

        assert_eq!(tables.handle(&"USB1".into()).unwrap().stable_id().as_str(), "SN002");
        let open_counts: Vec<_> = tables.status().iter().map(|s| s.transports.len()).collect();
        assert_eq!(open_counts, vec![0, 1]);
    }

    #[test]
    fn group_owner_occupancy_is_registry_wide() {
        let fake = FakeAdb::new();
        let mut tables = DeviceTables::default();
        open(&mut tables, &fake, "SN001", "USB1");
        open(&mut tables, &fake, "SN002", "192.168.49.1:5555");

        let view = tables
            .promotion_view(&StableId::new("SN001"), "192.168.49.1".parse().unwrap())
            .unwrap();
        assert!(view.group_owner_in_use);
        assert_eq!(view.wired.len(), 1);
        assert!(!view.open_over_tcpip);
    }

    #[test]
    fn restore_keeps_open_devices_and_drops_idle_strangers() {
        let fake = FakeAdb::new();
        let mut tables = DeviceTables::default();
        open(&mut tables, &fake, "LIVE", "USB1");
        open(&mut tables, &fake, "IDLE", "USB2");
        tables.close(&"USB2".into());

        let mut persisted = DeviceSnapshot::new(StableId::new("SN001"));
        persisted.last_connected_address = Some("10.0.0.7:5555".parse().unwrap());
        tables.restore(&RegistrySnapshot {
            devices: vec![persisted],
            last_connected_stable_id: Some(StableId::new("SN001")),
            last_connected_address: Some("10.0.0.7:5555".parse().unwrap()),
        });

        let ids: Vec<_> = tables.stable_ids().iter().map(ToString::to_string).collect();
        assert_eq!(ids, vec!["LIVE", "SN001"]);
        assert_eq!(
            tables.last_connected_address(),
            Some("10.0.0.7:5555".parse().unwrap())
        );
    }

    #[test]
    fn forget_unindexes_handles() {
        let fake = FakeAdb::new();
        let mut tables = DeviceTables::default();
        open(&mut tables, &fake, "SN001", "10.0.0.7:5555");
        assert_eq!(tables.forget(&StableId::new("SN001")).unwrap().len(), 1);
        assert!(tables.handle(&"10.0.0.7:5555".into()).is_none());
        assert_eq!(tables.last_connected_address(), None);
        assert!(tables.forget(&StableId::new("SN001")).is_none());
    }
}
