//! `unwire promote`: one promotion pass over every attached device.

use std::collections::HashMap;
use std::net::SocketAddr;

use serde::Serialize;
use tabled::Tabled;
use tokio::sync::broadcast;
use tracing::warn;

use unwire_core::{DeviceStatus, HostBridge, Promotion, RegistryNotice, StableId};

use crate::cli::{GlobalOpts, PromoteArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output::{self, Tone};

// ── Report ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct DeviceReport {
    stable_id: String,
    display_name: Option<String>,
    transports: Vec<String>,
    outcome: &'static str,
    address: Option<SocketAddr>,
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "Device")]
    stable_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Transports")]
    transports: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
}

impl From<&DeviceReport> for ReportRow {
    fn from(r: &DeviceReport) -> Self {
        Self {
            stable_id: r.stable_id.clone(),
            name: r.display_name.clone().unwrap_or_default(),
            transports: r.transports.join(", "),
            outcome: match r.address {
                Some(addr) => format!("{} ({addr})", r.outcome),
                None => r.outcome.to_owned(),
            },
        }
    }
}

/// What happened to one device, from the direct pass and the notices of
/// the background promotions that opening a handle starts.
fn report(
    status: &DeviceStatus,
    direct: Option<&Promotion>,
    noticed: Option<&RegistryNotice>,
) -> DeviceReport {
    let (outcome, address) = match (noticed, direct) {
        (Some(RegistryNotice::Promoted { address, .. }), _)
        | (_, Some(Promotion::Connected { address, .. })) => ("connected", Some(*address)),
        (Some(RegistryNotice::PromotionFailed { .. }), _) | (_, Some(Promotion::Failed)) => {
            ("failed", None)
        }
        _ if status.is_open_over_tcpip() => ("wireless", None),
        _ if status.transports.is_empty() => ("idle", None),
        _ => ("wired", None),
    };
    DeviceReport {
        stable_id: status.stable_id.to_string(),
        display_name: status.display_name.clone(),
        transports: status
            .transports
            .iter()
            .map(|(serial, kind)| format!("{serial} [{kind}]"))
            .collect(),
        outcome,
        address,
    }
}

fn drain_notices(rx: &mut broadcast::Receiver<RegistryNotice>) -> HashMap<StableId, RegistryNotice> {
    let mut latest = HashMap::new();
    loop {
        match rx.try_recv() {
            Ok(notice) => match &notice {
                RegistryNotice::Promoted { stable_id, .. }
                | RegistryNotice::PromotionFailed { stable_id, .. } => {
                    latest.insert(stable_id.clone(), notice);
                }
                RegistryNotice::IdentityUnresolved { .. } => {}
            },
            Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => break,
        }
    }
    latest
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(cfg: &Config, args: &PromoteArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let format = config::output_format(args.output, cfg)?;
    let color = output::should_color(config::color_mode(global, cfg)?);
    let state_path = cfg.state_path();
    let (registry, adb) = super::registry(cfg)?;
    let mut notices = registry.subscribe_notices();

    registry
        .restore(unwire_config::load_state(&state_path)?)
        .await?;

    let transports = adb
        .list_transports()
        .await
        .map_err(|e| super::bridge_error(cfg, e))?;
    for transport in transports.iter().filter(|t| t.is_online()) {
        if let Err(e) = registry.open(transport).await {
            if e.is_interrupted() {
                return Err(e.into());
            }
            warn!(serial = %transport.serial, error = %e, "skipping transport");
            output::print_status(
                &format!("Skipping {}: {e}", transport.serial),
                Tone::Bad,
                color,
                global.quiet,
            );
        }
    }

    let direct: HashMap<StableId, Promotion> = registry
        .refresh_all("promote command")
        .await?
        .into_iter()
        .collect();
    registry.settle().await;
    let noticed = drain_notices(&mut notices);
    let status = registry.status().await?;

    registry.teardown().await;
    unwire_config::save_state(&state_path, &registry.snapshot().await?)?;

    let reports: Vec<DeviceReport> = status
        .iter()
        .map(|s| report(s, direct.get(&s.stable_id), noticed.get(&s.stable_id)))
        .collect();
    let out = output::render_list(format, &reports, |r| ReportRow::from(r));
    output::print_output(&out, global.quiet);
    Ok(())
}
