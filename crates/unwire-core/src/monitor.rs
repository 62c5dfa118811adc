// ── Host network-interface monitor ──
//
// Notification source that polls the host's IPv4 interfaces and reports
// when an interface gains or loses its last address. Loopback is ignored.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::{BridgeEvent, NotificationSource};

pub struct NetworkInterfaceMonitor {
    interval: Duration,
}

impl NetworkInterfaceMonitor {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

/// Names of interfaces that currently hold a non-loopback IPv4 address.
fn interfaces_up() -> Option<BTreeSet<String>> {
    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => Some(
            interfaces
                .into_iter()
                .filter(|(_, addr)| addr.is_ipv4() && !addr.is_loopback())
                .map(|(name, _)| name)
                .collect(),
        ),
        Err(e) => {
            warn!(error = %e, "cannot enumerate network interfaces");
            None
        }
    }
}

/// Event for the difference between two polls, if there is one.
fn diff(previous: &BTreeSet<String>, current: &BTreeSet<String>) -> Option<BridgeEvent> {
    let up: Vec<String> = current.difference(previous).cloned().collect();
    let down: Vec<String> = previous.difference(current).cloned().collect();
    (!up.is_empty() || !down.is_empty())
        .then_some(BridgeEvent::NetworkInterfacesChanged { up, down })
}

impl NotificationSource for NetworkInterfaceMonitor {
    fn name(&self) -> &'static str {
        "network-interface-monitor"
    }

    fn subscribe(
        &self,
        events: mpsc::UnboundedSender<BridgeEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let period = self.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut previous: Option<BTreeSet<String>> = None;
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(current) = interfaces_up() else { continue };
                        if let Some(event) = previous.as_ref().and_then(|p| diff(p, &current)) {
                            debug!(?event, "interfaces changed");
                            if events.send(event).is_err() {
                                return;
                            }
                        }
                        previous = Some(current);
                    }
                }
            }
            debug!("network interface monitor stopped");
        })
    }
}
