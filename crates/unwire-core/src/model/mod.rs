// ── Domain model ──
//
// Identity keys, transport descriptions reported by the bridge, and the
// persistence value objects the registry snapshots into.

pub mod identity;
pub mod snapshot;
pub mod transport;

// ── Re-exports ──────────────────────────────────────────────────────

pub use identity::{StableId, TransportSerial};
pub use snapshot::{DeviceSnapshot, RegistrySnapshot};
pub use transport::{DeviceChange, Transport, TransportKind, TransportState};
