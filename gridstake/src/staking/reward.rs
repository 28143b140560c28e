// Copyright (c) 2024 Gridstake Developers

//! Block reward computation.
//!
//! The reward of a staked block is the base subsidy, plus the research
//! subsidy accrued by the minting researcher, plus the fees of the block's
//! ordinary transactions. Receiving nodes recompute every figure, so all of
//! it is done in integer halfords with a single rounding step per value.

use tracing::{debug, info};

use crate::block::Block;
use crate::chain::BlockIndexEntry;
use crate::claim::{Cpid, MagnitudeUnit, MiningId, ResearchClaim};
use crate::hash::Hash256;
use crate::monetary::{format_money, Amount, CENT, COIN};
use crate::research::{IdentityProvider, ResearchAccount};

/// First block version paying a constant base reward instead of interest.
pub const CONSTANT_REWARD_VERSION: u32 = 11;

/// Largest research payout per block day, in whole coins.
pub const MAX_RESEARCH_SUBSIDY: Amount = 50;

/// Blocks per day at the 90 second target spacing.
pub const BLOCKS_PER_DAY: u32 = 960;

/// Researchers must wait this many blocks between rewards.
pub const MIN_ACCRUAL_BLOCK_SPAN: u32 = 10;

/// Average magnitudes above this are treated as this.
pub const MAX_AVERAGE_MAGNITUDE: u64 = 20_000;

/// Cap on the first research reward of a new researcher.
pub const NEWBIE_ACCRUAL_CAP: Amount = 500 * COIN;

const SECONDS_PER_DAY: i128 = 86_400;
const SIX_MONTHS: i64 = 86_400 * 30 * 6;
const UNIT_SCALE: i128 = MagnitudeUnit::SCALE as i128;

/// Base subsidy settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardPolicy {
    /// Paid per block from [`CONSTANT_REWARD_VERSION`] on.
    pub constant_block_reward: Amount,
    /// Interest per coin-year of stake for older block versions.
    pub coin_year_reward: Amount,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            constant_block_reward: 10 * COIN,
            coin_year_reward: 3 * CENT / 2,
        }
    }
}

impl RewardPolicy {
    pub fn base_subsidy(&self, block_version: u32, coin_age: u64) -> Amount {
        if block_version >= CONSTANT_REWARD_VERSION {
            return self.constant_block_reward;
        }
        // 365 and 8/33 days per year.
        let interest = i128::from(coin_age) * i128::from(self.coin_year_reward) * 33 / (365 * 33 + 8);
        Amount::try_from(interest).unwrap_or(Amount::MAX)
    }
}

/// Research accrual with the average magnitude it was computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accrual {
    pub amount: Amount,
    /// In hundredths.
    pub average_magnitude: u32,
}

/// Everything the accrual of one researcher depends on.
#[derive(Debug, Clone)]
pub struct ResearchSnapshot {
    pub cpid: Cpid,
    /// Time rewards are computed at: the previous block's time.
    pub payment_time: i64,
    /// Height of the previous block.
    pub last_height: u32,
    pub magnitude: u16,
    pub magnitude_unit: MagnitudeUnit,
    pub account: ResearchAccount,
    pub beacon_time: Option<i64>,
}

impl ResearchSnapshot {
    pub fn accrual(&self) -> Accrual {
        if self.account.is_new() {
            self.newbie_accrual()
        } else {
            self.established_accrual()
        }
    }

    fn raw_accrual(&self, age: i64, avg_num: u64, avg_den: u64) -> i128 {
        i128::from(age.max(0))
            * i128::from(avg_num)
            * i128::from(self.magnitude_unit.micros())
            * i128::from(COIN)
            / (i128::from(avg_den.max(1)) * UNIT_SCALE * SECONDS_PER_DAY)
    }

    fn newbie_accrual(&self) -> Accrual {
        let magnitude = u64::from(self.magnitude);
        let average_magnitude = u32::from(self.magnitude) * 100;
        let age = match self.beacon_time {
            Some(time) if time > 0 => self.payment_time - time,
            _ => 0,
        };

        if age >= SIX_MONTHS {
            debug!(cpid = %self.cpid, "Stale beacon, using bootstrap accrual");
            return Accrual {
                amount: magnitude as Amount * COIN / 100 + COIN,
                average_magnitude,
            };
        }

        let raw = self.raw_accrual(age, magnitude, 1);
        let amount = if raw > i128::from(NEWBIE_ACCRUAL_CAP) {
            debug!(cpid = %self.cpid, "First research reward capped");
            NEWBIE_ACCRUAL_CAP
        } else {
            raw as Amount + COIN
        };
        Accrual {
            amount,
            average_magnitude,
        }
    }

    fn established_accrual(&self) -> Accrual {
        let Some(last) = self.account.last_reward else {
            return Accrual::default();
        };
        let magnitude = u64::from(self.magnitude);
        let last_magnitude = u64::from(last.magnitude);
        let span = self.last_height.saturating_sub(last.height);

        let (mut num, mut den) = if span <= BLOCKS_PER_DAY * 20 {
            (last_magnitude + magnitude, 2)
        } else {
            let (total, count) = self.account.average_magnitude();
            ((last_magnitude + magnitude) * count + total, 3 * count)
        };
        if num > MAX_AVERAGE_MAGNITUDE * den {
            num = MAX_AVERAGE_MAGNITUDE;
            den = 1;
        }
        let average_magnitude = u32::try_from(num * 100 / den).unwrap_or(u32::MAX);

        if span < MIN_ACCRUAL_BLOCK_SPAN {
            debug!(cpid = %self.cpid, span, "Block span below minimum, accrual deferred");
            return Accrual {
                amount: 0,
                average_magnitude,
            };
        }
        if self.exceeded_recent_payments() {
            debug!(cpid = %self.cpid, "Payments per day above limit, accrual deferred");
            return Accrual {
                amount: 0,
                average_magnitude,
            };
        }

        let age = if self.payment_time > last.time {
            self.payment_time - last.time
        } else {
            0
        };
        let raw = self.raw_accrual(age, num, den);
        let max_reward = i128::from(MAX_RESEARCH_SUBSIDY * 255 * COIN);
        Accrual {
            amount: raw.min(max_reward) as Amount,
            average_magnitude,
        }
    }

    /// Lifetime payments per day above five times the expected daily rate.
    fn exceeded_recent_payments(&self) -> bool {
        let account = &self.account;
        if account.is_new() {
            return false;
        }
        let (total_magnitude, count) = account.average_magnitude();
        let elapsed = (self.payment_time - account.first_payment_time).max(0);

        // paid * 86400 / (elapsed + 0.01 day) > avg_mag * unit * 5 * COIN
        let lhs = i128::from(account.total_research_subsidy)
            * SECONDS_PER_DAY
            * i128::from(count)
            * UNIT_SCALE;
        let rhs = i128::from(total_magnitude)
            * i128::from(self.magnitude_unit.micros())
            * 5
            * i128::from(COIN)
            * (i128::from(elapsed) + SECONDS_PER_DAY / 100);
        lhs > rhs
    }
}

/// The computed reward and the claim metadata that goes with it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardBreakdown {
    pub mining_id: MiningId,
    pub base_subsidy: Amount,
    pub research_subsidy: Amount,
    pub fees: Amount,
    pub magnitude: u16,
    pub magnitude_unit: MagnitudeUnit,
    pub average_magnitude: u32,
    pub last_payment_time: i64,
    pub last_por_block_hash: Hash256,
}

impl RewardBreakdown {
    /// Total credited to the coinstake.
    pub fn reward(&self) -> Amount {
        self.base_subsidy + self.research_subsidy + self.fees
    }

    pub fn fill_claim(&self, claim: &mut ResearchClaim) {
        claim.mining_id = self.mining_id;
        claim.block_subsidy = self.base_subsidy;
        claim.research_subsidy = self.research_subsidy;
        claim.magnitude = self.magnitude;
        claim.magnitude_unit = self.magnitude_unit;
        claim.average_magnitude = self.average_magnitude;
        claim.last_payment_time = self.last_payment_time;
        claim.last_por_block_hash = self.last_por_block_hash;
    }
}

/// Compute the reward for a block on `prev` minted by `mining_id`.
pub fn calculate_reward<I: IdentityProvider + ?Sized>(
    identity: &I,
    policy: &RewardPolicy,
    mining_id: MiningId,
    block_version: u32,
    coin_age: u64,
    fees: Amount,
    prev: &BlockIndexEntry,
) -> RewardBreakdown {
    let mut breakdown = RewardBreakdown {
        mining_id,
        base_subsidy: policy.base_subsidy(block_version, coin_age),
        fees,
        ..Default::default()
    };

    let MiningId::Researcher(cpid) = mining_id else {
        return breakdown;
    };

    let account = identity.research_account(&cpid);
    let snapshot = ResearchSnapshot {
        cpid,
        payment_time: prev.time,
        last_height: prev.height,
        magnitude: identity.magnitude(&cpid),
        magnitude_unit: identity.magnitude_unit(prev.time),
        beacon_time: identity.beacon_timestamp(&cpid),
        account,
    };
    let accrual = snapshot.accrual();

    breakdown.research_subsidy = accrual.amount;
    breakdown.magnitude = snapshot.magnitude;
    breakdown.magnitude_unit = snapshot.magnitude_unit;
    breakdown.average_magnitude = accrual.average_magnitude;
    if let Some(last) = snapshot.account.last_reward {
        breakdown.last_payment_time = last.time;
        breakdown.last_por_block_hash = last.block_hash;
    }
    breakdown
}

/// Move the block's fees from the coinbase into the coinstake together with
/// the minted reward, and fill in the claim.
///
/// Expects the coinbase to hold the collected fees in its only output and
/// the coinstake to hold the stake in output 1.
pub fn apply_reward(block: &mut Block, breakdown: &RewardBreakdown, prev: &BlockIndexEntry) -> Amount {
    if let Some(fee_output) = block.transactions.get_mut(0).and_then(|cb| cb.outputs.get_mut(0)) {
        *fee_output = Default::default();
    }

    breakdown.fill_claim(&mut block.claim);
    block.claim.last_block_hash = prev.hash;

    let reward = breakdown.reward();
    if let Some(stake_output) = block.transactions.get_mut(1).and_then(|cs| cs.outputs.get_mut(1)) {
        stake_output.value += reward;
    }

    info!(
        mining_id = %breakdown.mining_id,
        reward = %format_money(reward),
        research = %format_money(breakdown.research_subsidy),
        base = %format_money(breakdown.base_subsidy),
        magnitude = breakdown.magnitude,
        "Computed block reward"
    );
    reward
}
