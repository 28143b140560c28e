// Copyright (c) 2024 Gridstake Developers

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::address::{Address, Network};
use crate::block::MAX_BLOCK_SIZE_GEN;
use crate::monetary::{Allocation, Amount, MIN_TX_FEE};
use crate::node::MinerSettings;
use crate::staking::distributor::MIN_STAKE_SPLIT_VALUE_COINS;
use crate::staking::selector::DEFAULT_PRIORITY_SIZE;
use crate::staking::{BlockLimits, RewardPolicy, SideStake, SideStakePolicy, StakeSplitPolicy};

/// Main configuration for Gridstake
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Network type (mainnet or testnet)
    #[serde(default)]
    pub network_type: Network,
    #[serde(default)]
    pub staking: StakingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingConfig {
    /// Whether the stake miner runs
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Pause between staking attempts
    #[serde(default = "default_miner_sleep_ms")]
    pub miner_sleep_ms: u64,

    /// Organization tag carried in research claims
    #[serde(default)]
    pub organization: String,

    #[serde(default)]
    pub block: BlockConfig,

    #[serde(default)]
    pub side_stake: SideStakeConfig,

    #[serde(default)]
    pub stake_split: StakeSplitConfig,

    #[serde(default)]
    pub reward: RewardConfig,
}

fn default_enabled() -> bool {
    true
}

fn default_miner_sleep_ms() -> u64 {
    8000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockConfig {
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// Bytes reserved for high-priority transactions
    #[serde(default = "default_priority_size")]
    pub priority_size: usize,
    /// Free transactions are included until the block reaches this size
    #[serde(default)]
    pub min_size: usize,
    /// Fee per kilobyte below which a transaction counts as free
    #[serde(default = "default_min_tx_fee")]
    pub min_tx_fee: Amount,
}

fn default_max_size() -> usize {
    MAX_BLOCK_SIZE_GEN / 2
}

fn default_priority_size() -> usize {
    DEFAULT_PRIORITY_SIZE
}

fn default_min_tx_fee() -> Amount {
    MIN_TX_FEE
}

/// Reward shares paid to other addresses.
///
/// Entries are `"<address>,<percent>"` strings, for example
/// `"S7Lq...,12.5"`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SideStakeConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeSplitConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Target staking efficiency, clamped to 75..=98
    #[serde(default = "default_efficiency_percent")]
    pub efficiency_percent: u32,
    /// Whole coins, never below 800
    #[serde(default = "default_min_split_value")]
    pub min_split_value: Amount,
}

fn default_efficiency_percent() -> u32 {
    90
}

fn default_min_split_value() -> Amount {
    MIN_STAKE_SPLIT_VALUE_COINS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Base reward per block from block version 11, in halfords
    #[serde(default = "default_constant_block_reward")]
    pub constant_block_reward: Amount,
    /// Interest per coin-year of stake age before version 11, in halfords
    #[serde(default = "default_coin_year_reward")]
    pub coin_year_reward: Amount,
}

fn default_constant_block_reward() -> Amount {
    RewardPolicy::default().constant_block_reward
}

fn default_coin_year_reward() -> Amount {
    RewardPolicy::default().coin_year_reward
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            miner_sleep_ms: default_miner_sleep_ms(),
            organization: String::new(),
            block: BlockConfig::default(),
            side_stake: SideStakeConfig::default(),
            stake_split: StakeSplitConfig::default(),
            reward: RewardConfig::default(),
        }
    }
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            priority_size: default_priority_size(),
            min_size: 0,
            min_tx_fee: default_min_tx_fee(),
        }
    }
}

impl Default for StakeSplitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            efficiency_percent: default_efficiency_percent(),
            min_split_value: default_min_split_value(),
        }
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            constant_block_reward: default_constant_block_reward(),
            coin_year_reward: default_coin_year_reward(),
        }
    }
}

impl BlockConfig {
    pub fn limits(&self) -> BlockLimits {
        BlockLimits::new(self.max_size, self.priority_size, self.min_size, self.min_tx_fee)
    }
}

impl SideStakeConfig {
    /// Validate the configured entries for `network`.
    ///
    /// Malformed entries, invalid addresses and non-positive percentages are
    /// skipped. Parsing stops at the first entry that takes the total over
    /// 100%.
    pub fn policy(&self, network: Network) -> SideStakePolicy {
        let mut policy = SideStakePolicy {
            enabled: self.enabled,
            entries: Vec::new(),
        };
        if !self.enabled {
            return policy;
        }

        let mut total = Allocation::ZERO;
        for entry in &self.entries {
            let parts: Vec<&str> = entry.split(',').collect();
            let [address, percent] = parts.as_slice() else {
                warn!(entry = %entry, "Incomplete side-stake entry, skipping");
                continue;
            };
            let address = match Address::parse(address, network) {
                Ok(address) => address,
                Err(e) => {
                    warn!(address = %address.trim(), error = %e, "Ignoring side-stake with invalid address");
                    continue;
                }
            };
            let Some(allocation) = Allocation::parse_percent(percent) else {
                warn!(entry = %entry, "Invalid side-stake allocation, skipping");
                continue;
            };
            if allocation.is_zero() {
                warn!(entry = %entry, "Zero side-stake allocation, skipping");
                continue;
            }
            match total.checked_add(allocation).filter(|t| *t <= Allocation::WHOLE) {
                Some(sum) => total = sum,
                None => {
                    warn!("Side-stake allocations exceed 100%, ignoring the rest");
                    break;
                }
            }
            debug!(address = %address, allocation = %allocation, "Side-stake entry");
            policy.entries.push(SideStake { address, allocation });
        }

        if total.is_zero() {
            warn!("Side-staking is enabled but nothing is allocated");
        }
        policy
    }
}

impl StakeSplitConfig {
    pub fn policy(&self) -> StakeSplitPolicy {
        StakeSplitPolicy::new(self.enabled, self.efficiency_percent, self.min_split_value)
    }
}

impl RewardConfig {
    pub fn policy(&self) -> RewardPolicy {
        RewardPolicy {
            constant_block_reward: self.constant_block_reward.max(0),
            coin_year_reward: self.coin_year_reward.max(0),
        }
    }
}

impl Config {
    pub fn new(network_type: Network) -> Self {
        Self {
            network_type,
            staking: StakingConfig::default(),
        }
    }

    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        toml::from_str(&contents).with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).with_context(|| format!("Failed to write config to {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms)
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }

        Ok(())
    }

    /// Check if config file exists
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    /// Staking policy with every value validated and clamped.
    pub fn miner_settings(&self) -> MinerSettings {
        let staking = &self.staking;
        MinerSettings {
            network: self.network_type,
            sleep_interval: Duration::from_millis(staking.miner_sleep_ms),
            block_limits: staking.block.limits(),
            reward: staking.reward.policy(),
            side_stake: staking.side_stake.policy(self.network_type),
            stake_split: staking.stake_split.policy(),
            organization: staking.organization.clone(),
        }
    }
}

/// Get the default data directory
pub fn default_data_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".gridstake"))
        .context("Could not determine home directory")
}

/// Default config file for `network`: `~/.gridstake/{network}/config.toml`
pub fn config_path(network: Network) -> Result<PathBuf> {
    Ok(default_data_dir()?.join(network.dir_name()).join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monetary::COIN;
    use crate::script::KeyId;
    use tempfile::tempdir;

    fn testnet_address(seed: u8) -> String {
        Address::from_key_id(KeyId([seed; 20]), Network::Testnet).to_string()
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::new(Network::Testnet);
        config.staking.side_stake.enabled = true;
        config.staking.side_stake.entries = vec![format!("{},25", testnet_address(1))];
        config.staking.organization = "lab".to_string();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.network_type, Network::Testnet);
        assert_eq!(loaded.staking.side_stake.entries, config.staking.side_stake.entries);
        assert_eq!(loaded.staking.organization, "lab");
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_config_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::default().save(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_defaults_from_sparse_file() {
        let config: Config = toml::from_str("network_type = \"mainnet\"\n[staking]\nminer_sleep_ms = 500\n").unwrap();
        assert_eq!(config.network_type, Network::Mainnet);
        assert!(config.staking.enabled);
        assert_eq!(config.staking.miner_sleep_ms, 500);
        assert_eq!(config.staking.block.min_tx_fee, MIN_TX_FEE);
        assert_eq!(config.staking.stake_split.efficiency_percent, 90);
        assert_eq!(config.staking.reward.constant_block_reward, 10 * COIN);
    }

    #[test]
    fn test_side_stake_parsing() {
        let config = SideStakeConfig {
            enabled: true,
            entries: vec![
                format!("{},25", testnet_address(1)),
                "not-an-address,10".to_string(),
                testnet_address(2),
                format!("{},0", testnet_address(3)),
                format!("{},abc", testnet_address(4)),
                format!("{},12.5", testnet_address(5)),
                format!("{},70", testnet_address(6)),
                format!("{},1", testnet_address(7)),
            ],
        };
        let policy = config.policy(Network::Testnet);
        let allocations: Vec<u32> = policy.entries.iter().map(|e| e.allocation.basis_points()).collect();
        // The 70% entry would exceed 100% and ends parsing.
        assert_eq!(allocations, vec![2_500, 1_250]);
        assert_eq!(policy.total_allocation(), Allocation::from_basis_points(3_750));
    }

    #[test]
    fn test_side_stake_rejects_other_network() {
        let mainnet = Address::from_key_id(KeyId([1; 20]), Network::Mainnet).to_string();
        let config = SideStakeConfig {
            enabled: true,
            entries: vec![format!("{},10", mainnet)],
        };
        assert!(config.policy(Network::Testnet).entries.is_empty());
    }

    #[test]
    fn test_disabled_side_stake_ignores_entries() {
        let config = SideStakeConfig {
            enabled: false,
            entries: vec![format!("{},25", testnet_address(1))],
        };
        let policy = config.policy(Network::Testnet);
        assert!(!policy.enabled);
        assert!(policy.entries.is_empty());
    }

    #[test]
    fn test_miner_settings_clamp() {
        let mut config = Config::default();
        config.staking.block.max_size = 10;
        config.staking.block.priority_size = 50_000;
        config.staking.stake_split.efficiency_percent = 99;
        config.staking.stake_split.min_split_value = 1;

        let settings = config.miner_settings();
        assert_eq!(settings.block_limits.max_size, 1000);
        assert_eq!(settings.block_limits.priority_size, 1000);
        assert_eq!(settings.stake_split.efficiency, 0.98);
        assert_eq!(settings.stake_split.min_split_value, 800 * COIN);
        assert_eq!(settings.sleep_interval, Duration::from_millis(8000));
    }
}
