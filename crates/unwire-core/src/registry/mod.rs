// ── Device registry ──
//
// Single owner of every logical device and open handle. Direct calls
// (`open`, `snapshot`, `refresh_all`, ...) wait for the primary lock;
// notification-driven work goes through `handle_event` and is either run
// on the spot or queued for the current lock holder, never waiting.
//
// Anything slow (identity reads, probes, connects) runs outside the
// lock. Promotion and reconnect work is spawned on the registry's task
// tracker so it never runs on a notification path.

pub mod events;
pub(crate) mod tables;


use std::net::SocketAddr;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::Utc;
use dashmap::DashSet;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::CoreError;
use crate::gateway::Collaborators;
use crate::handle::{DeviceHandle, query_display_name, resolve_stable_id};
use crate::lock::PendingLock;
use crate::model::{RegistrySnapshot, StableId, Transport, TransportSerial};
use crate::promotion::{Promoter, Promotion};

pub use events::{BridgeEvent, BridgeId, NotificationSource, RegistryNotice};
pub use tables::DeviceStatus;

use tables::DeviceTables;

const NOTICE_CHANNEL_SIZE: usize = 64;

// ── DeviceRegistry ───────────────────────────────────────────────────

/// Process-wide device registry.
///
/// Cheaply cloneable via `Arc<RegistryInner>`. Construct with
/// [`new`](Self::new), optionally [`restore`](Self::restore) persisted
/// state, then [`start`](Self::start) it with notification sources and
/// finally [`teardown`](Self::teardown).
#[derive(Clone)]
pub struct DeviceRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    config: Arc<RegistryConfig>,
    collaborators: Collaborators,
    tables: PendingLock<DeviceTables>,
    /// Stable ids with a promotion running.
    in_flight: DashSet<StableId>,
    bridge: ArcSwapOption<BridgeId>,
    /// Endpoint `restore` already reconnected to, consumed by the first
    /// bridge report.
    restored_reconnect: ArcSwapOption<SocketAddr>,
    workers: TaskTracker,
    cancel: CancellationToken,
    notices: broadcast::Sender<RegistryNotice>,
    /// Subscribed sources plus the event pump.
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl DeviceRegistry {
    pub fn new(config: RegistryConfig, collaborators: Collaborators) -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_SIZE);
        Self {
            inner: Arc::new(RegistryInner {
                config: Arc::new(config),
                collaborators,
                tables: PendingLock::new(DeviceTables::default()),
                in_flight: DashSet::new(),
                bridge: ArcSwapOption::empty(),
                restored_reconnect: ArcSwapOption::empty(),
                workers: TaskTracker::new(),
                cancel: CancellationToken::new(),
                notices,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Subscribe to advisory notices (promotions, failures, identity misses).
    pub fn subscribe_notices(&self) -> broadcast::Receiver<RegistryNotice> {
        self.inner.notices.subscribe()
    }

    /// Bridge instance the registry currently believes in.
    pub fn current_bridge(&self) -> Option<BridgeId> {
        self.inner.bridge.load_full().map(|id| *id)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Subscribe every source and start delivering their events.
    pub async fn start(&self, sources: Vec<Box<dyn NotificationSource>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut tasks = self.inner.tasks.lock().await;
        for source in &sources {
            debug!(source = source.name(), "subscribing");
            tasks.push(source.subscribe(tx.clone(), self.inner.cancel.child_token()));
        }
        drop(tx);
        tasks.push(tokio::spawn(events::pump(
            self.clone(),
            rx,
            self.inner.cancel.child_token(),
        )));
        info!(sources = sources.len(), "registry started");
    }

    /// Unsubscribe every source, interrupt running work, and wait for the
    /// workers to finish. Tables stay readable for a final snapshot.
    pub async fn teardown(&self) {
        self.inner.cancel.cancel();
        let tasks: Vec<_> = self.inner.tasks.lock().await.drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        self.inner.workers.close();
        self.inner.workers.wait().await;
        let discarded = self.inner.tables.discard_pending();
        if discarded > 0 {
            debug!(discarded, "dropped pending ops at teardown");
        }
        info!("registry stopped");
    }

    /// Wait until every spawned promotion and reconnect has finished.
    ///
    /// Must not run concurrently with [`teardown`](Self::teardown). A
    /// registry that is already torn down stays closed.
    pub async fn settle(&self) {
        self.inner.workers.close();
        self.inner.workers.wait().await;
        if !self.inner.cancel.is_cancelled() {
            self.inner.workers.reopen();
        }
    }

    // ── Direct operations ────────────────────────────────────────────

    /// Open (or return the already open) handle for a transport.
    ///
    /// Resolves the stable id first, outside the lock; fails with
    /// [`CoreError::PropertyTimeout`] or [`CoreError::IdentityResolution`]
    /// when that is not possible, leaving nothing registered. Every open,
    /// new or repeated, triggers promotion for its device in the background.
    pub async fn open(&self, transport: &Transport) -> Result<Arc<DeviceHandle>, CoreError> {
        let (stable_id, display_name) = self.identify(&transport.serial).await?;
        let make = self.handle_factory(transport.clone(), stable_id.clone());
        let (handle, _) = self
            .inner
            .tables
            .lock_while("open", &self.inner.cancel, |t| {
                t.open(&stable_id, display_name.as_deref(), &transport.serial, make)
            })
            .await?;
        self.spawn_promotion(stable_id);
        Ok(handle)
    }

    /// Close the handle for `serial`. Returns whether one was open.
    pub async fn close(&self, serial: &TransportSerial) -> Result<bool, CoreError> {
        self.inner
            .tables
            .lock_while("close", &self.inner.cancel, |t| t.close(serial).is_some())
            .await
    }

    /// Run promotion for every known device, one after another, without
    /// holding the lock across any of them.
    pub async fn refresh_all(&self, reason: &str) -> Result<Vec<(StableId, Promotion)>, CoreError> {
        info!(reason, "refreshing tcpip connectivity");
        let ids = self
            .inner
            .tables
            .lock_while("refresh_all", &self.inner.cancel, |t| t.stable_ids())
            .await?;
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let outcome = self.promote(&id).await?;
            outcomes.push((id, outcome));
        }
        Ok(outcomes)
    }

    /// One promotion attempt for one device. A second request while one is
    /// already running for the same device returns [`Promotion::InFlight`].
    pub async fn promote(&self, stable_id: &StableId) -> Result<Promotion, CoreError> {
        let Some(_flight) = InFlight::acquire(&self.inner.in_flight, stable_id) else {
            debug!(stable_id = %stable_id, "promotion already in flight");
            return Ok(Promotion::InFlight);
        };

        let group_owner = self.inner.config.group_owner_address;
        let view = self
            .inner
            .tables
            .lock_while("promotion_view", &self.inner.cancel, |t| {
                t.promotion_view(stable_id, group_owner)
            })
            .await?;
        let Some(view) = view else {
            return Ok(Promotion::Idle);
        };

        let outcome = Promoter {
            config: &self.inner.config,
            bridge: self.inner.collaborators.bridge.as_ref(),
            prober: self.inner.collaborators.prober.as_ref(),
            cancel: &self.inner.cancel,
        }
        .run(&view)
        .await?;

        match outcome {
            Promotion::Connected { address, .. } => {
                self.inner
                    .tables
                    .lock_while("record_connected", &self.inner.cancel, |t| {
                        t.record_connected(stable_id, address, Utc::now());
                    })
                    .await?;
                self.notify(RegistryNotice::Promoted {
                    stable_id: stable_id.clone(),
                    address,
                });
            }
            Promotion::Failed => self.notify(RegistryNotice::PromotionFailed {
                stable_id: stable_id.clone(),
                label: view.label,
            }),
            Promotion::Idle | Promotion::AlreadyWireless | Promotion::InFlight => {}
        }
        Ok(outcome)
    }

    /// Persistence-ready copy of every device plus the last-connected hint.
    pub async fn snapshot(&self) -> Result<RegistrySnapshot, CoreError> {
        self.inner
            .tables
            .lock_while("snapshot", &self.inner.cancel, |t| t.snapshot())
            .await
    }

    /// Live view of every device and its open transports.
    pub async fn status(&self) -> Result<Vec<DeviceStatus>, CoreError> {
        self.inner
            .tables
            .lock_while("status", &self.inner.cancel, |t| t.status())
            .await
    }

    /// Merge persisted state and make one blind reconnect attempt to the
    /// remembered endpoint, without waiting for any attach notification.
    pub async fn restore(&self, snapshot: RegistrySnapshot) -> Result<(), CoreError> {
        let target = snapshot.reconnect_target();
        self.inner
            .tables
            .lock_while("restore", &self.inner.cancel, |t| t.restore(&snapshot))
            .await?;
        info!(devices = snapshot.devices.len(), "restored registry state");
        if let Some(addr) = target {
            self.inner.restored_reconnect.store(Some(Arc::new(addr)));
            self.spawn_reconnect(addr);
        }
        Ok(())
    }

    /// Remove one device and everything known about it. Its TCPIP
    /// transports are disconnected at the bridge too.
    pub async fn forget(&self, stable_id: &StableId) -> Result<bool, CoreError> {
        let Some(closed) = self
            .inner
            .tables
            .lock_while("forget", &self.inner.cancel, |t| t.forget(stable_id))
            .await?
        else {
            return Ok(false);
        };
        for handle in closed.iter().filter(|h| h.is_tcpip()) {
            match self.inner.collaborators.bridge.disconnect(handle.serial()).await {
                Ok(true) => debug!(serial = %handle.serial(), "disconnected"),
                Ok(false) => debug!(serial = %handle.serial(), "disconnect refused"),
                Err(e) => debug!(serial = %handle.serial(), error = %e, "disconnect failed"),
            }
        }
        Ok(true)
    }

    /// Remove every device.
    pub async fn reset(&self) -> Result<(), CoreError> {
        self.inner
            .tables
            .lock_while("reset", &self.inner.cancel, DeviceTables::reset)
            .await
    }

    /// Blind reconnect to the registry-wide last connected address.
    pub async fn reconnect_last(&self) -> Result<Option<SocketAddr>, CoreError> {
        self.reconnect_last_except(None).await
    }

    /// Like [`reconnect_last`](Self::reconnect_last), but nothing is
    /// attempted when the address equals `skip`.
    async fn reconnect_last_except(
        &self,
        skip: Option<SocketAddr>,
    ) -> Result<Option<SocketAddr>, CoreError> {
        let target = self
            .inner
            .tables
            .lock_while("reconnect_last", &self.inner.cancel, |t| {
                t.last_connected_address()
            })
            .await?
            .filter(|addr| Some(*addr) != skip);
        if let Some(addr) = target {
            self.spawn_reconnect(addr);
        }
        Ok(target)
    }

    // ── Notifications ────────────────────────────────────────────────

    /// React to one external event. Never waits for the registry lock;
    /// the only suspension is the bounded identity read on attach.
    pub async fn handle_event(&self, event: BridgeEvent) {
        match event {
            BridgeEvent::DeviceAttached(transport) => {
                if transport.is_online() {
                    self.open_or_pend(transport).await;
                } else {
                    debug!(serial = %transport.serial, state = %transport.state, "attached but not online");
                }
            }
            BridgeEvent::DeviceChanged(transport, change) => {
                debug!(serial = %transport.serial, %change, "device changed");
                if transport.is_online() {
                    self.open_or_pend(transport).await;
                } else {
                    self.close_or_pend(transport.serial);
                }
            }
            BridgeEvent::DeviceDetached(serial) => self.close_or_pend(serial),
            BridgeEvent::BridgeChanged(bridge) => self.bridge_changed(bridge),
            BridgeEvent::NetworkInterfacesChanged { up, down } => {
                info!(?up, ?down, "network interfaces changed");
                self.spawn_network_refresh();
            }
        }
    }

    async fn open_or_pend(&self, transport: Transport) {
        let (stable_id, display_name) = match self.identify(&transport.serial).await {
            Ok(identity) => identity,
            Err(e) if e.is_interrupted() => return,
            Err(e) => {
                self.notify(RegistryNotice::IdentityUnresolved {
                    serial: transport.serial.clone(),
                    reason: e.to_string(),
                });
                return;
            }
        };

        let registry = self.clone();
        let serial = transport.serial.clone();
        let make = self.handle_factory(transport, stable_id.clone());
        self.inner.tables.lock_and_run_or_pend("open", move |t| {
            t.open(&stable_id, display_name.as_deref(), &serial, make);
            registry.spawn_promotion(stable_id);
        });
    }

    fn close_or_pend(&self, serial: TransportSerial) {
        self.inner.tables.lock_and_run_or_pend("close", move |t| {
            t.close(&serial);
        });
    }

    fn bridge_changed(&self, bridge: Option<BridgeId>) {
        let previous = self.inner.bridge.swap(bridge.map(Arc::new));
        let previous = previous.map(|id| *id);
        // Only the first bridge report may follow a restore's reconnect.
        let restored = self
            .inner
            .restored_reconnect
            .swap(None)
            .filter(|_| previous.is_none())
            .map(|addr| *addr);
        if previous == bridge {
            return;
        }
        info!(?previous, current = ?bridge, "bridge changed");

        if previous.is_some() {
            self.inner.tables.lock_and_run_or_pend("close_all", |t| {
                let closed = t.close_all();
                debug!(closed, "closed every handle of the previous bridge");
            });
        }
        if bridge.is_some() {
            let registry = self.clone();
            self.inner.workers.spawn(async move {
                match registry.reconnect_last_except(restored).await {
                    Ok(Some(addr)) => debug!(%addr, "blind reconnect scheduled"),
                    Ok(None) => {}
                    Err(e) => debug!(error = %e, "blind reconnect abandoned"),
                }
            });
        }
    }

    // ── Background work ──────────────────────────────────────────────

    fn spawn_promotion(&self, stable_id: StableId) {
        let registry = self.clone();
        self.inner.workers.spawn(async move {
            if let Err(e) = registry.promote(&stable_id).await {
                debug!(stable_id = %stable_id, error = %e, "promotion abandoned");
            }
        });
    }

    fn spawn_reconnect(&self, addr: SocketAddr) {
        let bridge = self.inner.collaborators.bridge.clone();
        let timeout = self.inner.config.timeouts.slow;
        let cancel = self.inner.cancel.clone();
        self.inner.workers.spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                result = bridge.connect(addr, timeout) => match result {
                    Ok(true) => info!(%addr, "reconnected"),
                    Ok(false) => debug!(%addr, "reconnect refused"),
                    Err(e) => debug!(%addr, error = %e, "reconnect failed"),
                },
            }
        });
    }

    fn spawn_network_refresh(&self) {
        let registry = self.clone();
        self.inner.workers.spawn(async move {
            if let Err(e) = registry.refresh_after_network_change().await {
                debug!(error = %e, "network refresh abandoned");
            }
        });
    }

    /// Refresh, then retry with a fixed backoff while some device could
    /// not be promoted.
    async fn refresh_after_network_change(&self) -> Result<(), CoreError> {
        let attempts = self.inner.config.network_retry_attempts.max(1);
        for attempt in 1..=attempts {
            let outcomes = self.refresh_all("network interfaces changed").await?;
            if !outcomes.iter().any(|(_, outcome)| outcome.is_failure()) {
                break;
            }
            if attempt < attempts {
                debug!(attempt, "devices still wired; retrying after backoff");
                tokio::select! {
                    biased;
                    () = self.inner.cancel.cancelled() => return Err(CoreError::Interrupted),
                    () = tokio::time::sleep(self.inner.config.network_retry_backoff) => {}
                }
            }
        }
        Ok(())
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// Stable id and best-effort display name, read without any lock.
    async fn identify(
        &self,
        serial: &TransportSerial,
    ) -> Result<(StableId, Option<String>), CoreError> {
        let shell = self.inner.collaborators.shell.as_ref();
        let config = self.inner.config.as_ref();
        let stable_id = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => return Err(CoreError::Interrupted),
            resolved = resolve_stable_id(shell, serial, config) => resolved?,
        };
        let display_name = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => return Err(CoreError::Interrupted),
            queried = query_display_name(shell, serial, config) => match queried {
                Ok(name) => name,
                Err(e) => {
                    debug!(serial = %serial, error = %e, "display name unavailable");
                    None
                }
            },
        };
        Ok((stable_id, display_name))
    }

    fn handle_factory(
        &self,
        transport: Transport,
        stable_id: StableId,
    ) -> impl FnOnce() -> DeviceHandle + Send + 'static {
        let shell = self.inner.collaborators.shell.clone();
        let bridge = self.inner.collaborators.bridge.clone();
        let config = self.inner.config.clone();
        move || DeviceHandle::new(transport, stable_id, shell, bridge, config)
    }

    fn notify(&self, notice: RegistryNotice) {
        match &notice {
            RegistryNotice::Promoted { .. } => info!(target: "unwire::notify", "{notice}"),
            _ => warn!(target: "unwire::notify", "{notice}"),
        }
        let _ = self.inner.notices.send(notice);
    }

    #[cfg(test)]
    fn tables(&self) -> &PendingLock<DeviceTables> {
        &self.inner.tables
    }
}

// ── Single promotion in flight ───────────────────────────────────────

struct InFlight<'a> {
    set: &'a DashSet<StableId>,
    stable_id: StableId,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a DashSet<StableId>, stable_id: &StableId) -> Option<Self> {
        set.insert(stable_id.clone()).then(|| Self {
            set,
            stable_id: stable_id.clone(),
        })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.stable_id);
    }
}
