// Copyright (c) 2024 Gridstake Developers

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::Config;
use crate::monetary::format_money;
use crate::node::MinerSettings;

/// Print the effective staking policy
pub fn run(config_path: &Path) -> Result<()> {
    let config = Config::load(config_path).context("No config found. Run 'gridstake config init' first.")?;
    let settings = config.miner_settings();

    for line in describe(&config, &settings) {
        println!("{}", line);
    }
    Ok(())
}

/// Human readable summary of the resolved settings.
pub fn describe(config: &Config, settings: &MinerSettings) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        "=== Gridstake Staking Policy ===".to_string(),
        String::new(),
        format!("Network: {}", settings.network.display_name()),
        format!("Staking: {}", if config.staking.enabled { "enabled" } else { "disabled" }),
        format!("Interval: {} ms", settings.sleep_interval.as_millis()),
        format!("Organization: {}", settings.organization),
        String::new(),
        "Block:".to_string(),
        format!("  Max size: {} bytes", settings.block_limits.max_size),
        format!("  Priority size: {} bytes", settings.block_limits.priority_size),
        format!("  Min size: {} bytes", settings.block_limits.min_size),
        format!("  Min fee: {} per KB", format_money(settings.block_limits.min_tx_fee)),
        String::new(),
        "Reward:".to_string(),
        format!("  Constant block reward: {}", format_money(settings.reward.constant_block_reward)),
        format!("  Coin-year reward: {}", format_money(settings.reward.coin_year_reward)),
        String::new(),
        format!(
            "Side-staking: {}",
            if settings.side_stake.enabled { "enabled" } else { "disabled" }
        ),
    ];

    for entry in &settings.side_stake.entries {
        lines.push(format!("  {} {}", entry.address, entry.allocation));
    }
    if settings.side_stake.enabled {
        lines.push(format!("  Total: {}", settings.side_stake.total_allocation()));
    }

    let split = &settings.stake_split;
    lines.push(String::new());
    lines.push(format!(
        "Stake splitting: {}",
        if split.enabled { "enabled" } else { "disabled" }
    ));
    if split.enabled {
        lines.push(format!("  Efficiency: {:.0}%", split.efficiency * 100.0));
        lines.push(format!("  Min split value: {}", format_money(split.min_split_value)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, Network};
    use crate::script::KeyId;

    #[test]
    fn test_describe_lists_side_stakes() {
        let mut config = Config::new(Network::Testnet);
        let address = Address::from_key_id(KeyId([4; 20]), Network::Testnet);
        config.staking.side_stake.enabled = true;
        config.staking.side_stake.entries = vec![format!("{},33.5", address)];
        config.staking.stake_split.enabled = true;

        let lines = describe(&config, &config.miner_settings());
        assert!(lines.contains(&format!("  {} 33.50%", address)));
        assert!(lines.contains(&"  Total: 33.50%".to_string()));
        assert!(lines.contains(&"  Efficiency: 90%".to_string()));
        assert!(lines.contains(&"  Min split value: 800.00000000".to_string()));
    }
}
