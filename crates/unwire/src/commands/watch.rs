//! `unwire watch`: run the registry against live notification sources
//! until Ctrl-C, saving state periodically and on the way out.

use std::path::Path;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, Interval};
use tracing::{debug, info, warn};

use unwire_core::{
    DeviceRegistry, DeviceTracker, NetworkInterfaceMonitor, NotificationSource, RegistryNotice,
};

use crate::cli::GlobalOpts;
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output::{self, Tone};

pub async fn handle(cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(config::color_mode(global, cfg)?);
    let state_path = cfg.state_path();
    let (registry, adb) = super::registry(cfg)?;
    let runtime = registry.config().clone();

    let snapshot = unwire_config::load_state(&state_path)?;
    let remembered = snapshot.devices.len();
    registry.restore(snapshot).await?;

    let sources: Vec<Box<dyn NotificationSource>> = vec![
        Box::new(DeviceTracker::new(adb, runtime.device_poll_interval)),
        Box::new(NetworkInterfaceMonitor::new(runtime.network_poll_interval)),
    ];
    let mut notices = registry.subscribe_notices();
    registry.start(sources).await;
    output::print_status(
        &format!(
            "Watching for devices ({remembered} remembered, state in {})",
            state_path.display()
        ),
        Tone::Quiet,
        color,
        global.quiet,
    );

    let mut autosave = cfg.autosave_interval().map(delayed_interval);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut shutdown => {
                res?;
                info!("interrupted; shutting down");
                break;
            }
            notice = notices.recv() => match notice {
                Ok(notice) => {
                    output::print_status(&notice.to_string(), tone(&notice), color, global.quiet);
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "notice stream lagged"),
                Err(RecvError::Closed) => break,
            },
            () = tick(autosave.as_mut()) => {
                if let Err(e) = persist(&registry, &state_path).await {
                    warn!(error = %e, "autosave failed");
                }
            }
        }
    }

    registry.teardown().await;
    persist(&registry, &state_path).await
}

fn tone(notice: &RegistryNotice) -> Tone {
    match notice {
        RegistryNotice::Promoted { .. } => Tone::Good,
        RegistryNotice::PromotionFailed { .. } | RegistryNotice::IdentityUnresolved { .. } => {
            Tone::Bad
        }
    }
}

/// An interval whose first tick is one period away rather than immediate.
fn delayed_interval(period: Duration) -> Interval {
    tokio::time::interval_at(Instant::now() + period, period)
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn persist(registry: &DeviceRegistry, path: &Path) -> Result<(), CliError> {
    let snapshot = registry.snapshot().await?;
    unwire_config::save_state(path, &snapshot)?;
    debug!(path = %path.display(), "state persisted");
    Ok(())
}
