// ── Scripted bridge for tests ──
//
// One fake standing in for the shell gateway, the host bridge and the
// prober. Devices are described by properties keyed on transport serial;
// every bridge command is recorded for assertions.

#![allow(clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{RegistryConfig, Timeouts};
use crate::error::CoreError;
use crate::gateway::{
    BOOT_SERIAL_PROPERTY, HostBridge, ReachabilityProber, ShellGateway, TCPIP_PORT_PROPERTY,
};
use crate::model::{Transport, TransportSerial};

#[derive(Default)]
struct State {
    props: HashMap<(String, String), String>,
    display_names: HashMap<String, String>,
    ifconfig: HashMap<String, String>,
    ip_addr: HashMap<String, String>,
    unresponsive: HashSet<String>,
    reachable: HashSet<IpAddr>,
    transports: Vec<Transport>,
    listing_fails: bool,
    connect_delay: Duration,
    setting_delay: Duration,
    connects: Vec<SocketAddr>,
    disconnects: Vec<String>,
    tcpip_requests: Vec<String>,
}

#[derive(Default)]
pub(crate) struct FakeAdb {
    state: Mutex<State>,
    connects_running: AtomicUsize,
    connects_peak: AtomicUsize,
}

impl FakeAdb {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Short timeouts so failure paths finish quickly.
    pub(crate) fn config(&self) -> RegistryConfig {
        RegistryConfig {
            timeouts: Timeouts {
                fast: Duration::from_millis(50),
                slow: Duration::from_millis(200),
                listen_poll: Duration::from_millis(5),
            },
            network_retry_backoff: Duration::from_millis(10),
            ..RegistryConfig::default()
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    // ── Scripting ────────────────────────────────────────────────────

    /// A transport whose device reports `stable_id` as its boot serial.
    pub(crate) fn device(&self, serial: &str, stable_id: &str) {
        self.set_prop(serial, BOOT_SERIAL_PROPERTY, stable_id);
    }

    pub(crate) fn set_prop(&self, serial: &str, name: &str, value: &str) {
        self.with(|s| {
            s.props
                .insert((serial.to_owned(), name.to_owned()), value.to_owned())
        });
    }

    pub(crate) fn set_display_name(&self, serial: &str, name: &str) {
        self.with(|s| s.display_names.insert(serial.to_owned(), name.to_owned()));
    }

    pub(crate) fn set_ifconfig(&self, serial: &str, output: &str) {
        self.with(|s| s.ifconfig.insert(serial.to_owned(), output.to_owned()));
    }

    pub(crate) fn set_group_owner(&self, serial: &str) {
        self.set_ifconfig(
            serial,
            "p2p0: ip 192.168.49.1 mask 255.255.255.0 flags [up broadcast running multicast]",
        );
    }

    pub(crate) fn set_ip_addr(&self, serial: &str, output: &str) {
        self.with(|s| s.ip_addr.insert(serial.to_owned(), output.to_owned()));
    }

    /// Every shell command to `serial` times out.
    pub(crate) fn set_unresponsive(&self, serial: &str) {
        self.with(|s| s.unresponsive.insert(serial.to_owned()));
    }

    /// The prober sees `ip`, and connects to it succeed.
    pub(crate) fn set_reachable(&self, ip: &str) {
        self.with(|s| s.reachable.insert(ip.parse().unwrap()));
    }

    pub(crate) fn set_transports(&self, transports: Vec<Transport>) {
        self.with(|s| s.transports = transports);
    }

    pub(crate) fn set_listing_fails(&self, fails: bool) {
        self.with(|s| s.listing_fails = fails);
    }

    pub(crate) fn set_connect_delay(&self, delay: Duration) {
        self.with(|s| s.connect_delay = delay);
    }

    /// `settings get` answers only after `delay`, ignoring the timeout.
    pub(crate) fn set_setting_delay(&self, delay: Duration) {
        self.with(|s| s.setting_delay = delay);
    }

    // ── Observation ──────────────────────────────────────────────────

    pub(crate) fn connects(&self) -> Vec<SocketAddr> {
        self.with(|s| s.connects.clone())
    }

    pub(crate) fn disconnects(&self) -> Vec<String> {
        self.with(|s| s.disconnects.clone())
    }

    pub(crate) fn tcpip_requests(&self) -> Vec<String> {
        self.with(|s| s.tcpip_requests.clone())
    }

    pub(crate) fn peak_concurrent_connects(&self) -> usize {
        self.connects_peak.load(Ordering::SeqCst)
    }

    fn timeout(command: &str, timeout: Duration) -> CoreError {
        CoreError::CommandTimeout {
            command: command.to_owned(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap(),
        }
    }
}

#[async_trait]
impl ShellGateway for FakeAdb {
    async fn execute(
        &self,
        serial: &TransportSerial,
        command: &str,
        timeout: Duration,
    ) -> Result<String, CoreError> {
        let serial = serial.as_str();
        if command.starts_with("settings get ") {
            let delay = self.with(|s| s.setting_delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        self.with(|s| {
            if s.unresponsive.contains(serial) {
                return Err(Self::timeout(command, timeout));
            }
            let lookup = |map: &HashMap<String, String>| map.get(serial).cloned();
            if let Some(name) = command.strip_prefix("getprop ") {
                Ok(s.props
                    .get(&(serial.to_owned(), name.to_owned()))
                    .cloned()
                    .unwrap_or_default()
                    + "\n")
            } else if command.starts_with("settings get global ") {
                Ok(lookup(&s.display_names).unwrap_or_else(|| "null".into()) + "\n")
            } else if command.starts_with("ifconfig ") {
                Ok(lookup(&s.ifconfig)
                    .unwrap_or_else(|| "p2p0: Cannot assign requested address".into()))
            } else if command.starts_with("ip -f inet addr show ") {
                Ok(lookup(&s.ip_addr).unwrap_or_default())
            } else {
                Err(CoreError::communication(serial, format!("unknown command {command}")))
            }
        })
    }
}

#[async_trait]
impl HostBridge for FakeAdb {
    async fn set_listening(
        &self,
        serial: &TransportSerial,
        port: u16,
        timeout: Duration,
    ) -> Result<bool, CoreError> {
        self.with(|s| {
            if s.unresponsive.contains(serial.as_str()) {
                return Err(Self::timeout("tcpip", timeout));
            }
            s.tcpip_requests.push(serial.to_string());
            s.props.insert(
                (serial.to_string(), TCPIP_PORT_PROPERTY.to_owned()),
                port.to_string(),
            );
            Ok(true)
        })
    }

    async fn connect(&self, addr: SocketAddr, _timeout: Duration) -> Result<bool, CoreError> {
        let running = self.connects_running.fetch_add(1, Ordering::SeqCst) + 1;
        self.connects_peak.fetch_max(running, Ordering::SeqCst);
        let delay = self.with(|s| s.connect_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let ok = self.with(|s| {
            s.connects.push(addr);
            s.reachable.contains(&addr.ip())
        });
        self.connects_running.fetch_sub(1, Ordering::SeqCst);
        Ok(ok)
    }

    async fn disconnect(&self, serial: &TransportSerial) -> Result<bool, CoreError> {
        self.with(|s| s.disconnects.push(serial.to_string()));
        Ok(true)
    }

    async fn list_transports(&self) -> Result<Vec<Transport>, CoreError> {
        self.with(|s| {
            if s.listing_fails {
                Err(CoreError::communication("host", "cannot connect to daemon"))
            } else {
                Ok(s.transports.clone())
            }
        })
    }
}

#[async_trait]
impl ReachabilityProber for FakeAdb {
    async fn is_reachable(&self, addr: IpAddr, _timeout: Duration) -> bool {
        self.with(|s| s.reachable.contains(&addr))
    }
}
