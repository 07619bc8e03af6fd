//! Implementation of the `wurf path` command.

use crate::settings::{ConfigArgs, Settings};
use anyhow::{bail, Result};
use std::path::PathBuf;
use wurf_resolve::RecordStore;

/// Stored path of dependency `name`.
pub fn dependency_path(args: &ConfigArgs, name: &str) -> Result<PathBuf> {
    let settings = Settings::load(args, |_| Ok(()))?;
    let store = RecordStore::new(&settings.config.bundle_config_path);

    match store.load(name)? {
        Some(record) => match record.path {
            Some(path) => Ok(path),
            None => bail!("dependency '{name}' was unavailable in the last resolve"),
        },
        None => bail!("dependency '{name}' has not been resolved"),
    }
}
