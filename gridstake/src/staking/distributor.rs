// Copyright (c) 2024 Gridstake Developers

//! Reward distribution over the coinstake outputs.
//!
//! After the reward has been added, the coinstake has exactly two outputs:
//! the empty marker and the aggregate stake output. The distributor pays
//! configured side-stake destinations out of the reward, then splits what
//! is left into same-owner outputs sized for efficient future staking.
//!
//! The final layout is
//!
//! ```text
//! [empty marker, split remainder, equal splits..., side-stakes (reversed)]
//! ```
//!
//! so output 1 is always a stake output, as block validation requires. The
//! sum of the values is unchanged.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::address::{Address, Network};
use crate::monetary::{format_money, Allocation, Amount, CENT, COIN};
use crate::transaction::{Transaction, TxOut};

/// Floor for the configured minimum split value, in whole coins.
pub const MIN_STAKE_SPLIT_VALUE_COINS: Amount = 800;

/// Empirical constant relating difficulty to the stake needed for a
/// given staking efficiency.
pub const SPLIT_CONSTANT_G: f64 = 9942.2056;

/// Blocks in the difficulty average used to size split outputs.
pub const SPLIT_DIFFICULTY_BLOCKS: usize = 160;

pub const MIN_STAKE_EFFICIENCY: f64 = 0.75;
pub const MAX_STAKE_EFFICIENCY: f64 = 0.98;

/// Coinstake output limit for a block version, marker included.
pub fn max_coinstake_outputs(block_version: u32) -> usize {
    if block_version >= 10 {
        8
    } else {
        3
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DistributionError {
    #[error("block has no coinstake")]
    MissingCoinstake,
    #[error("reward {reward} exceeds stake output value {value}")]
    RewardExceedsStake { reward: Amount, value: Amount },
}

/// A destination receiving a share of every reward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideStake {
    pub address: Address,
    pub allocation: Allocation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideStakePolicy {
    pub enabled: bool,
    pub entries: Vec<SideStake>,
}

impl SideStakePolicy {
    pub fn total_allocation(&self) -> Allocation {
        self.entries
            .iter()
            .fold(Allocation::ZERO, |acc, e| acc.checked_add(e.allocation).unwrap_or(Allocation::WHOLE))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StakeSplitPolicy {
    pub enabled: bool,
    /// Target staking efficiency in `[0.75, 0.98]`.
    pub efficiency: f64,
    /// Outputs at or below this value are never split.
    pub min_split_value: Amount,
}

impl Default for StakeSplitPolicy {
    fn default() -> Self {
        Self::new(false, 90, MIN_STAKE_SPLIT_VALUE_COINS)
    }
}

impl StakeSplitPolicy {
    /// Build from configured values, clamping them into range.
    pub fn new(enabled: bool, efficiency_percent: u32, min_split_coins: Amount) -> Self {
        let efficiency = (f64::from(efficiency_percent) / 100.0).clamp(MIN_STAKE_EFFICIENCY, MAX_STAKE_EFFICIENCY);
        Self {
            enabled,
            efficiency,
            min_split_value: min_split_coins.max(MIN_STAKE_SPLIT_VALUE_COINS) * COIN,
        }
    }

    /// Size of the outputs a stake is split into at `average_difficulty`.
    pub fn desired_output_value(&self, average_difficulty: f64) -> Amount {
        let desired = SPLIT_CONSTANT_G * average_difficulty * 1.5 * (1.0 / self.efficiency - 1.0) * COIN as f64;
        // Saturating float to int conversion; NaN becomes 0.
        (desired as Amount).max(self.min_split_value)
    }
}

/// Number of outputs to split `value` into.
pub fn number_of_stake_outputs(value: Amount, min_split_value: Amount, desired_output_value: Amount) -> usize {
    if value <= min_split_value || desired_output_value <= 0 {
        return 1;
    }
    usize::try_from(value / desired_output_value).unwrap_or(usize::MAX).max(1)
}

/// What a distribution did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionSummary {
    pub allocated: Allocation,
    pub side_stake_total: Amount,
    pub side_stake_outputs: usize,
    pub split_outputs: usize,
}

pub struct RewardDistributor<'a> {
    side_stake: &'a SideStakePolicy,
    stake_split: &'a StakeSplitPolicy,
    network: Network,
}

impl<'a> RewardDistributor<'a> {
    pub fn new(side_stake: &'a SideStakePolicy, stake_split: &'a StakeSplitPolicy, network: Network) -> Self {
        Self {
            side_stake,
            stake_split,
            network,
        }
    }

    pub fn is_active(&self) -> bool {
        self.side_stake.enabled || self.stake_split.enabled
    }

    /// Rewrite the outputs of `coinstake`, whose output 1 holds the stake
    /// plus `reward`.
    ///
    /// # Panics
    ///
    /// If the coinstake does not have exactly two outputs.
    pub fn distribute(
        &self,
        coinstake: &mut Transaction,
        reward: Amount,
        block_version: u32,
        block_time: i64,
        average_difficulty: f64,
    ) -> Result<DistributionSummary, DistributionError> {
        let mut summary = DistributionSummary::default();
        if !self.is_active() {
            return Ok(summary);
        }

        assert_eq!(coinstake.outputs.len(), 2, "coinstake must have exactly two outputs before distribution");

        let stake_script = coinstake.outputs[1].script.clone();
        let total_value = coinstake.outputs[1].value;
        if reward < 0 || reward > total_value {
            return Err(DistributionError::RewardExceedsStake {
                reward,
                value: total_value,
            });
        }
        let input_value = total_value - reward;
        let stake_address = Address::from_script(&stake_script, self.network);

        let max_outputs = max_coinstake_outputs(block_version);
        let max_side_stake_outputs = max_outputs - 2;
        let mut outputs_used = 1;
        let mut remaining = total_value;
        let mut outputs = Vec::with_capacity(max_outputs);

        if self.side_stake.enabled {
            let mut entries = self.side_stake.entries.clone();
            if entries.len() > max_side_stake_outputs {
                let mut rng = ChaCha8Rng::seed_from_u64(block_time as u64);
                entries.shuffle(&mut rng);
                debug!(entries = entries.len(), slots = max_side_stake_outputs, "Shuffled side-stake entries");
            }

            for entry in &entries {
                if outputs_used > max_side_stake_outputs {
                    break;
                }
                if entry.address.network != self.network {
                    warn!(address = %entry.address, "Ignoring side-stake to an address on another network");
                    continue;
                }
                let share = entry.allocation.apply(reward);
                if share < CENT {
                    warn!(address = %entry.address, value = %format_money(share), "Side-stake distribution too small");
                    continue;
                }
                let Some(cumulative) = summary
                    .allocated
                    .checked_add(entry.allocation)
                    .filter(|c| *c <= Allocation::WHOLE)
                else {
                    warn!(address = %entry.address, allocation = %entry.allocation, "Side-stake allocation would exceed 100%");
                    continue;
                };
                if stake_address.as_ref() == Some(&entry.address) {
                    debug!(address = %entry.address, "Side-stake destination is the staking address");
                    continue;
                }

                let value = if cumulative == Allocation::WHOLE {
                    remaining - input_value
                } else {
                    share
                };
                outputs.push(TxOut::new(value, entry.address.locking_script()));
                info!(
                    output = outputs_used,
                    address = %entry.address,
                    value = %format_money(value),
                    "Created side-stake output"
                );

                summary.allocated = cumulative;
                summary.side_stake_total += value;
                summary.side_stake_outputs += 1;
                remaining -= value;
                outputs_used += 1;
            }

            if summary.allocated.is_zero() {
                warn!("Side-staking is enabled but nothing was allocated");
            }
        }

        let split_count = if self.stake_split.enabled {
            let desired = self.stake_split.desired_output_value(average_difficulty);
            let wanted = number_of_stake_outputs(remaining, self.stake_split.min_split_value, desired);
            debug!(desired = %format_money(desired), wanted, "Computed stake split");
            wanted.min(max_outputs - outputs_used)
        } else {
            1
        };

        let share = remaining / split_count as Amount;
        for _ in 1..split_count {
            outputs.push(TxOut::new(share, stake_script.clone()));
        }
        let last = remaining - share * (split_count as Amount - 1);
        outputs.push(TxOut::new(last, stake_script));
        if split_count > 1 {
            info!(outputs = split_count, value = %format_money(share), "Split stake output");
        }
        summary.split_outputs = split_count;

        outputs.push(TxOut::empty());
        outputs.reverse();
        coinstake.outputs = outputs;

        Ok(summary)
    }
}
