// Copyright (c) 2024 Gridstake Developers

use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;

use crate::address::Network;
use crate::config::Config;

/// Write a default config for `network`
pub fn run(config_path: &Path, network: Network, force: bool) -> Result<()> {
    if Config::exists(config_path) && !force {
        bail!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    let config = Config::new(network);
    config.save(config_path)?;
    info!(path = %config_path.display(), network = network.display_name(), "Wrote default config");

    println!("Config written to {}", config_path.display());
    println!("Edit the [staking] section to configure side-staking and stake splitting.");
    Ok(())
}
