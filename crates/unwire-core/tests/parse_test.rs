//! Bridge and device output parsing, against captured command output.
#![allow(clippy::unwrap_used)]

use std::net::Ipv4Addr;

use pretty_assertions::assert_eq;

use unwire_core::gateway::parse;
use unwire_core::{TransportKind, TransportState};

// ── adb devices -l ──────────────────────────────────────────────────

#[test]
fn listing_skips_header_and_daemon_chatter() {
    let output = "\
* daemon not running; starting now at tcp:5037
* daemon started successfully
List of devices attached
R58M123ABC             device usb:1-1 product:beyond1 model:SM_G973F device:beyond1 transport_id:1
192.168.1.5:5555       device product:panther model:Pixel_7 device:panther transport_id:3
emulator-5554          offline transport_id:4
0123456789ABCDEF       unauthorized usb:1-2 transport_id:5

";
    let transports = parse::transports(output);
    let summary: Vec<_> = transports
        .iter()
        .map(|t| (t.serial.as_str(), t.kind(), t.state.clone()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("R58M123ABC", TransportKind::Usb, TransportState::Online),
            ("192.168.1.5:5555", TransportKind::Tcpip, TransportState::Online),
            ("emulator-5554", TransportKind::Emulator, TransportState::Offline),
            ("0123456789ABCDEF", TransportKind::Usb, TransportState::Unauthorized),
        ]
    );
}

#[test]
fn listing_understands_no_permissions() {
    let output = "List of devices attached\n\
        ????????????\tno permissions (user in plugdev group; are your udev rules wrong?); see [http://developer.android.com/tools/device.html]\n";
    let transports = parse::transports(output);
    assert_eq!(transports.len(), 1);
    assert_eq!(transports[0].state, TransportState::NoPermissions);
    assert!(!transports[0].is_online());
}

#[test]
fn empty_listing_has_no_transports() {
    assert!(parse::transports("List of devices attached\n\n").is_empty());
    assert!(parse::transports("").is_empty());
}

// ── ifconfig ────────────────────────────────────────────────────────

#[test]
fn toybox_ifconfig_one_liner() {
    let cfg = parse::ifconfig(
        "p2p0: ip 192.168.49.1 mask 255.255.255.0 flags [up broadcast running multicast]\n",
    );
    assert_eq!(cfg.address, Some(Ipv4Addr::new(192, 168, 49, 1)));
    assert!(cfg.is_up());
    assert_eq!(cfg.flags, vec!["up", "broadcast", "running", "multicast"]);
}

#[test]
fn net_tools_ifconfig_block() {
    let output = "\
wlan0     Link encap:UNSPEC    Driver cnss_pci
          inet addr:10.0.0.7  Bcast:10.0.0.255  Mask:255.255.255.0
          inet6 addr: fe80::1/64 Scope: Link
          UP BROADCAST RUNNING MULTICAST  MTU:1500  Metric:1
          RX packets:1000 errors:0 dropped:0 overruns:0 frame:0
";
    let cfg = parse::ifconfig(output);
    assert_eq!(cfg.address, Some(Ipv4Addr::new(10, 0, 0, 7)));
    assert!(cfg.is_up());
}

#[test]
fn ifconfig_error_is_an_empty_config() {
    let cfg = parse::ifconfig("ifconfig: p2p0: Cannot assign requested address\n");
    assert_eq!(cfg, parse::InterfaceConfig::default());
    assert!(!cfg.is_up());
}

#[test]
fn down_interface_keeps_its_address() {
    let cfg = parse::ifconfig("p2p0: ip 192.168.49.1 mask 255.255.255.0 flags [broadcast multicast]\n");
    assert_eq!(cfg.address, Some(Ipv4Addr::new(192, 168, 49, 1)));
    assert!(!cfg.is_up());
}

// ── ip addr / properties ────────────────────────────────────────────

#[test]
fn inet_address_from_ip_addr_show() {
    let output = "\
30: wlan0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500 qdisc mq state UP group default qlen 3000
    inet 192.168.1.23/24 brd 192.168.1.255 scope global wlan0
       valid_lft forever preferred_lft forever
";
    assert_eq!(
        parse::inet_address(output),
        Some(Ipv4Addr::new(192, 168, 1, 23))
    );
    assert_eq!(parse::inet_address("Device \"wlan0\" does not exist.\n"), None);
}

#[test]
fn property_values_are_trimmed() {
    assert_eq!(parse::property_value("SN001\r\n"), Some("SN001".into()));
    assert_eq!(parse::property_value("\n"), None);
    assert_eq!(
        parse::ipv4(Some("192.168.1.23")),
        Some(Ipv4Addr::new(192, 168, 1, 23))
    );
    assert_eq!(parse::ipv4(Some("not-an-ip")), None);
}
