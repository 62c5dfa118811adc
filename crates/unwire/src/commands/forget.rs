//! `unwire forget`: drop remembered devices from the state file.

use std::path::Path;

use unwire_core::{RegistrySnapshot, StableId};

use crate::cli::{ForgetArgs, GlobalOpts};
use crate::config::Config;
use crate::error::CliError;

fn forget_in(path: &Path, target: Option<&StableId>) -> Result<usize, CliError> {
    let mut snapshot = unwire_config::load_state(path)?;
    let removed = match target {
        Some(id) => {
            if !snapshot.forget(id) {
                return Err(CliError::DeviceNotFound {
                    stable_id: id.to_string(),
                });
            }
            1
        }
        None => {
            let count = snapshot.devices.len();
            snapshot = RegistrySnapshot::default();
            count
        }
    };
    unwire_config::save_state(path, &snapshot)?;
    Ok(removed)
}

pub fn handle(cfg: &Config, args: &ForgetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let target = match (&args.stable_id, args.all) {
        (_, true) => None,
        (Some(id), false) => Some(StableId::new(id)),
        (None, false) => {
            return Err(CliError::Validation {
                field: "forget".into(),
                reason: "name a device or pass --all".into(),
            });
        }
    };
    let removed = forget_in(&cfg.state_path(), target.as_ref())?;
    if !global.quiet {
        eprintln!("Forgot {removed} device(s)");
    }
    Ok(())
}
