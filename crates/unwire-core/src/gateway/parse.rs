// ── Command output parsers ──
//
// Everything that looks at raw `adb` / shell text lives here. Bridge
// wording varies across vendors and platform-tools versions, so each
// classifier matches the narrowest phrase that survives that variance.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Transport, TransportSerial, TransportState};

static IFCONFIG_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s(?:ip\s|inet addr:)(?<addr>\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})")
        .expect("ifconfig address pattern should compile")
});

// `p2p0: ip 192.168.49.1 mask 255.255.255.0 flags [up broadcast running multicast]`
static IFCONFIG_FLAGS_BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"flags\s\[(?<flags>(?:[a-zA-Z]+\s*)+)\]")
        .expect("bracketed flags pattern should compile")
});

// `          UP BROADCAST RUNNING MULTICAST  MTU:1500  Metric:1`
static IFCONFIG_FLAGS_LEGACY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ink\s+(?<flags>(?:[a-zA-Z]+\s+)+)\s*MTU:")
        .expect("legacy flags pattern should compile")
});

static INET_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\binet\s+(?<addr>\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})(?:/\d+)?")
        .expect("inet address pattern should compile")
});

// ── Properties and settings ─────────────────────────────────────────

/// `getprop` prints an empty line for unset properties.
pub fn property_value(output: &str) -> Option<String> {
    let value = output.trim();
    (!value.is_empty()).then(|| value.to_owned())
}

/// `settings get` prints the literal `null` for unset settings.
pub fn setting_value(output: &str) -> Option<String> {
    property_value(output).filter(|v| v != "null")
}

/// Active TCPIP port from the daemon property; zero or garbage means none.
pub fn tcpip_port(value: Option<&str>) -> Option<u16> {
    value
        .and_then(|v| v.trim().parse::<u16>().ok())
        .filter(|port| *port != 0)
}

/// An IPv4 address property value, if it parses.
pub fn ipv4(value: Option<&str>) -> Option<Ipv4Addr> {
    value.and_then(|v| v.trim().parse().ok())
}

// ── Bridge control outcomes ─────────────────────────────────────────

fn reports_error(output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    lower.contains("error") || lower.contains("failed")
}

/// `adb tcpip <port>`: `restarting in TCP mode port: 5555` on success,
/// `error: device 'X' not found` otherwise.
pub fn tcpip_accepted(output: &str) -> bool {
    !reports_error(output)
}

/// `adb connect <addr>`: both `connected to X` and `already connected to X`
/// count; `failed to connect to X` does not.
pub fn connect_succeeded(output: &str, addr: SocketAddr) -> bool {
    output.contains(&format!("connected to {addr}"))
}

/// `adb disconnect <serial>`: `disconnected X` or `error: no such device 'X'`.
pub fn disconnect_succeeded(output: &str) -> bool {
    !reports_error(output)
}

// ── Transport listing ───────────────────────────────────────────────

/// Parse `adb devices -l`. The header and daemon start-up chatter
/// (`* daemon not running ...`) are skipped.
pub fn transports(output: &str) -> Vec<Transport> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !line.starts_with('*') && !line.starts_with("List of devices")
        })
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let serial = tokens.next()?;
            let state = match tokens.next()? {
                "no" if tokens.next().is_some_and(|t| t.starts_with("permissions")) => {
                    TransportState::NoPermissions
                }
                raw => raw.parse().unwrap_or(TransportState::Unknown(raw.to_owned())),
            };
            Some(Transport {
                serial: TransportSerial::new(serial),
                emulator: serial.starts_with("emulator-"),
                state,
            })
        })
        .collect()
}

// ── Interface configuration ─────────────────────────────────────────

/// The parts of `ifconfig <iface>` the registry cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceConfig {
    pub address: Option<Ipv4Addr>,
    /// Lower-cased flag words (`up`, `broadcast`, ...).
    pub flags: Vec<String>,
}

impl InterfaceConfig {
    pub fn is_up(&self) -> bool {
        self.flags.iter().any(|f| f == "up")
    }
}

/// Parse either ifconfig dialect found on devices: the toybox one-liner
/// (`ip X mask Y flags [...]`) or the net-tools block (`inet addr:X`).
/// Errors such as `Cannot assign requested address` yield an empty config.
pub fn ifconfig(output: &str) -> InterfaceConfig {
    let address = IFCONFIG_ADDRESS
        .captures(output)
        .and_then(|c| c["addr"].parse().ok());
    let flags = IFCONFIG_FLAGS_BRACKETED
        .captures(output)
        .or_else(|| IFCONFIG_FLAGS_LEGACY.captures(output))
        .map(|c| {
            c["flags"]
                .split_whitespace()
                .map(str::to_ascii_lowercase)
                .collect()
        })
        .unwrap_or_default();
    InterfaceConfig { address, flags }
}

/// First IPv4 address in `ip -f inet addr show <iface>` output.
pub fn inet_address(output: &str) -> Option<Ipv4Addr> {
    INET_ADDRESS
        .captures(output)
        .and_then(|c| c["addr"].parse().ok())
}
