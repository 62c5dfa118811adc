//! `unwire status`: show what the state file remembers.

use tabled::Tabled;

use unwire_core::{DeviceSnapshot, RegistrySnapshot};

use crate::cli::{GlobalOpts, OutputFormat, StatusArgs};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Device")]
    stable_id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Last Address")]
    address: String,
    #[tabled(rename = "Last Connected")]
    at: String,
}

impl DeviceRow {
    fn new(device: &DeviceSnapshot, snapshot: &RegistrySnapshot) -> Self {
        let latest = snapshot.last_connected_stable_id.as_ref() == Some(&device.stable_id);
        Self {
            marker: if latest { "*" } else { "" },
            stable_id: device.stable_id.to_string(),
            name: device.display_name.clone().unwrap_or_default(),
            address: device
                .last_connected_address
                .map(|a| a.to_string())
                .unwrap_or_default(),
            at: device
                .last_connected_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default(),
        }
    }
}

fn render(snapshot: &RegistrySnapshot, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => output::render_json(snapshot),
        OutputFormat::Table if snapshot.is_empty() => {
            "No remembered devices. Attach one over USB and run: unwire promote".into()
        }
        OutputFormat::Table => {
            output::render_list(format, &snapshot.devices, |d| DeviceRow::new(d, snapshot))
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(cfg: &Config, args: &StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let format = config::output_format(args.output, cfg)?;
    let snapshot = unwire_config::load_state(&cfg.state_path())?;
    output::print_output(&render(&snapshot, format), global.quiet);
    Ok(())
}
