// Copyright (c) 2024 Gridstake Developers

//! Proof-of-stake kernel search.
//!
//! A coin may stake a block when
//!
//! ```text
//! H(modifier || coin block time || coin txid || output index || coinstake time)
//!     <= target(bits) * weight(coin value)
//! ```
//!
//! Timestamps are masked to [`STAKE_TIMESTAMP_MASK`] granularity so a
//! staker gets one attempt per coin per 16 second window. The first coin
//! that satisfies the inequality becomes the coinstake input.

use primitive_types::U256;
use subtle::{Choice, ConstantTimeEq, ConstantTimeLess};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::block::{compact_from_target, difficulty_from_bits, target_from_compact};
use crate::chain::{find_stake_modifier, BlockIndexEntry, ChainIndex};
use crate::hash::{Hash256, HashWriter};
use crate::monetary::{Amount, CENT, COIN};
use crate::script::{KeyId, LockingScript, PublicKey};
use crate::transaction::{Transaction, TxIn, TxOut};
use crate::wallet::{StakeCandidate, StakingWallet};

/// Low bits cleared from kernel timestamps.
pub const STAKE_TIMESTAMP_MASK: i64 = 15;

/// Halfords per unit of stake weight.
pub const STAKE_WEIGHT_DIVISOR: Amount = 1_250_000;

const SECONDS_PER_DAY: i128 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("{0}")]
    NoCandidates(String),
    #[error("invalid target bits {0:#010x}")]
    InvalidTarget(u32),
    #[error("no kernel found among {tried} coins")]
    NotFound { tried: usize },
    #[error("no key for stake output {0:?}")]
    MissingKey(KeyId),
    #[error("cannot stake a {0} output")]
    UnsupportedScript(&'static str),
}

/// Aggregates over every coin tried in one search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchStats {
    pub candidates: usize,
    pub weight_sum: u64,
    pub weight_min: u64,
    pub weight_max: u64,
    pub value_sum: Amount,
    pub coin_age_sum: u64,
    pub kernel_diff_sum: f64,
    pub kernel_diff_max: f64,
    /// Masked coinstake time the search ran for.
    pub search_time: i64,
}

impl SearchStats {
    fn record(&mut self, weight: u64, value: Amount, coin_age: u64, kernel_diff: f64) {
        if self.candidates == 0 {
            self.weight_min = weight;
        }
        self.candidates += 1;
        self.weight_sum += weight;
        self.weight_min = self.weight_min.min(weight);
        self.weight_max = self.weight_max.max(weight);
        self.value_sum += value;
        self.coin_age_sum += coin_age;
        self.kernel_diff_sum += kernel_diff;
        self.kernel_diff_max = self.kernel_diff_max.max(kernel_diff);
    }
}

/// A coin that satisfied the kernel, with its coinstake skeleton.
#[derive(Debug, Clone, PartialEq)]
pub struct StakeKernel {
    pub candidate: StakeCandidate,
    /// One input, outputs `[empty marker, full stake value]`.
    pub coinstake: Transaction,
    /// Key that signs the block.
    pub stake_key: PublicKey,
    /// Coin age of the stake input, in coin-days.
    pub coin_age: u64,
    pub kernel_hash: Hash256,
}

pub struct KernelSearch {
    pub outcome: Result<StakeKernel, KernelError>,
    pub stats: SearchStats,
}

pub fn mask_timestamp(time: i64) -> i64 {
    time & !STAKE_TIMESTAMP_MASK
}

/// Masked timestamp for a block on top of a parent stamped `prev_time`.
///
/// Never earlier than the first masked slot after the parent.
pub fn stake_time(adjusted_time: i64, prev_time: i64) -> i64 {
    let earliest = mask_timestamp(prev_time) + STAKE_TIMESTAMP_MASK + 1;
    mask_timestamp(adjusted_time).max(earliest)
}

pub fn stake_weight(value: Amount) -> u64 {
    (value.max(0) / STAKE_WEIGHT_DIVISOR) as u64
}

pub fn kernel_hash(
    modifier: u64,
    coin_block_time: i64,
    coin_txid: &Hash256,
    output_index: u32,
    coinstake_time: i64,
) -> Hash256 {
    let mut hasher = HashWriter::new();
    hasher
        .update(modifier.to_le_bytes())
        .update((mask_timestamp(coin_block_time) as u32).to_le_bytes())
        .update(coin_txid.as_bytes())
        .update(output_index.to_le_bytes())
        .update((mask_timestamp(coinstake_time) as u32).to_le_bytes());
    hasher.finalize()
}

/// `target(bits) * weight`, saturating at the largest 256-bit value.
pub fn weighted_target(bits: u32, weight: u64) -> Option<U256> {
    Some(target_from_compact(bits)?.saturating_mul(U256::from(weight)))
}

pub fn hash_to_u256(hash: &Hash256) -> U256 {
    U256::from_little_endian(hash.as_bytes())
}

/// `hash <= target`, evaluated without data-dependent branches.
pub fn meets_target(hash: &Hash256, target: &U256) -> bool {
    let value = hash_to_u256(hash);
    let mut less = Choice::from(0);
    let mut equal = Choice::from(1);
    for limb in (0..4).rev() {
        let a = value.0[limb];
        let b = target.0[limb];
        less |= equal & a.ct_lt(&b);
        equal &= a.ct_eq(&b);
    }
    bool::from(less | equal)
}

/// Coin age in coin-days of `value` held from `coin_time` to `tx_time`.
pub fn coin_age(value: Amount, coin_time: i64, tx_time: i64) -> u64 {
    if value <= 0 || tx_time <= coin_time {
        return 0;
    }
    let cent_seconds = i128::from(value) * i128::from(tx_time - coin_time) / i128::from(CENT);
    let coin_days = cent_seconds * i128::from(CENT) / i128::from(COIN) / SECONDS_PER_DAY;
    u64::try_from(coin_days).unwrap_or(u64::MAX)
}

/// Difficulty-equivalent of a kernel hash scaled by weight, for diagnostics.
fn kernel_difficulty(hash: &Hash256, weight: u64) -> f64 {
    difficulty_from_bits(compact_from_target(hash_to_u256(hash))) * weight as f64
}

/// Pick the spend key for a kernel coin and the script for its new output.
pub fn resolve_stake_script<W: StakingWallet + ?Sized>(
    wallet: &W,
    script: &LockingScript,
) -> Result<(PublicKey, LockingScript), KernelError> {
    match script {
        LockingScript::PubKeyHash(key_id) => {
            let key = wallet.public_key(key_id).ok_or(KernelError::MissingKey(*key_id))?;
            Ok((key.clone(), LockingScript::PubKey(key)))
        }
        LockingScript::PubKey(key) => {
            let key_id = key.key_id();
            match wallet.public_key(&key_id) {
                Some(held) if held == *key => Ok((held, script.clone())),
                _ => Err(KernelError::MissingKey(key_id)),
            }
        }
        other => Err(KernelError::UnsupportedScript(other.kind_name())),
    }
}

/// Search the wallet's stakeable coins for a kernel on top of `prev`.
pub fn search_kernel<C, W>(
    chain: &C,
    wallet: &W,
    prev: &BlockIndexEntry,
    block_time: i64,
    bits: u32,
) -> KernelSearch
where
    C: ChainIndex + ?Sized,
    W: StakingWallet + ?Sized,
{
    let coinstake_time = mask_timestamp(block_time);
    let mut stats = SearchStats {
        search_time: coinstake_time,
        ..Default::default()
    };

    let candidates = match wallet.select_coins_for_staking(coinstake_time) {
        Ok(candidates) if !candidates.is_empty() => candidates,
        Ok(_) => {
            return KernelSearch {
                outcome: Err(KernelError::NoCandidates("No coins".to_string())),
                stats,
            }
        }
        Err(reason) => {
            return KernelSearch {
                outcome: Err(KernelError::NoCandidates(reason)),
                stats,
            }
        }
    };

    let Some(modifier) = find_stake_modifier(chain, prev) else {
        warn!(height = prev.height, "No stake modifier in chain lineage");
        return KernelSearch {
            outcome: Err(KernelError::NotFound { tried: 0 }),
            stats,
        };
    };

    debug!(coins = candidates.len(), time = coinstake_time, bits, "Searching for stake kernel");

    for candidate in candidates {
        let Some(output) = candidate.output().cloned() else {
            continue;
        };
        let coin_txid = candidate.tx.txid();
        let Some(location) = chain.transaction_location(&coin_txid) else {
            debug!(txid = %coin_txid.short(), "Stake candidate not in chain index");
            continue;
        };

        let weight = stake_weight(output.value);
        let Some(target) = weighted_target(bits, weight) else {
            return KernelSearch {
                outcome: Err(KernelError::InvalidTarget(bits)),
                stats,
            };
        };
        let hash = kernel_hash(
            modifier,
            location.block_time,
            &coin_txid,
            candidate.output_index,
            coinstake_time,
        );
        let found = meets_target(&hash, &target);
        stats.record(
            weight,
            output.value,
            coin_age(output.value, candidate.tx.time, coinstake_time),
            kernel_difficulty(&hash, weight),
        );

        if !found {
            continue;
        }

        let (stake_key, output_script) = match resolve_stake_script(wallet, &output.script) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(txid = %coin_txid.short(), error = %e, "Skipping kernel coin");
                continue;
            }
        };

        let mut coinstake = Transaction::new(coinstake_time);
        coinstake.inputs.push(TxIn::new(candidate.outpoint()));
        coinstake.outputs.push(TxOut::empty());
        coinstake.outputs.push(TxOut::new(output.value, output_script));

        let age = coin_age(output.value, candidate.tx.time, coinstake_time);
        info!(
            txid = %coin_txid.short(),
            index = candidate.output_index,
            value = output.value,
            weight,
            "Found stake kernel"
        );

        return KernelSearch {
            outcome: Ok(StakeKernel {
                candidate,
                coinstake,
                stake_key,
                coin_age: age,
                kernel_hash: hash,
            }),
            stats,
        };
    }

    KernelSearch {
        outcome: Err(KernelError::NotFound {
            tried: stats.candidates,
        }),
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_timestamp() {
        assert_eq!(mask_timestamp(1_600_000_015), 1_600_000_000);
        assert_eq!(mask_timestamp(1_600_000_016), 1_600_000_016);
    }

    #[test]
    fn test_stake_time_stays_after_parent() {
        let prev = 1_600_000_000;
        assert_eq!(stake_time(prev + 60, prev), 1_600_000_048);
        // Masking would land on the parent's own slot.
        assert_eq!(stake_time(prev + 5, prev), prev + 16);
        assert_eq!(stake_time(prev - 100, prev), prev + 16);
        assert_eq!(stake_time(prev + 20, prev + 15), prev + 16);
        for adjusted in prev - 40..prev + 40 {
            let time = stake_time(adjusted, prev + 7);
            assert!(time > prev + 7);
            assert_eq!(mask_timestamp(time), time);
        }
    }

    #[test]
    fn test_stake_weight() {
        assert_eq!(stake_weight(COIN), 80);
        assert_eq!(stake_weight(STAKE_WEIGHT_DIVISOR - 1), 0);
        assert_eq!(stake_weight(-COIN), 0);
    }

    #[test]
    fn test_kernel_hash_ignores_masked_bits() {
        let txid = Hash256([3; 32]);
        let a = kernel_hash(7, 1_000, &txid, 1, 2_000);
        let b = kernel_hash(7, 1_007, &txid, 1, 2_015);
        let c = kernel_hash(7, 1_000, &txid, 1, 2_016);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, kernel_hash(8, 1_000, &txid, 1, 2_000));
        assert_ne!(a, kernel_hash(7, 1_000, &txid, 2, 2_000));
    }

    #[test]
    fn test_meets_target() {
        let mut bytes = [0u8; 32];
        bytes[0] = 5;
        let hash = Hash256(bytes);
        assert!(meets_target(&hash, &U256::from(5)));
        assert!(meets_target(&hash, &U256::from(6)));
        assert!(!meets_target(&hash, &U256::from(4)));

        let mut high = [0u8; 32];
        high[31] = 1;
        let high = Hash256(high);
        assert!(!meets_target(&high, &(U256::one() << 247)));
        assert!(meets_target(&high, &(U256::one() << 248)));
        assert!(meets_target(&high, &U256::MAX));
        assert!(meets_target(&Hash256::ZERO, &U256::zero()));
    }

    #[test]
    fn test_weighted_target_saturates() {
        let base = target_from_compact(0x1d00ffff).unwrap();
        assert_eq!(weighted_target(0x1d00ffff, 3), Some(base * U256::from(3u64)));
        assert_eq!(weighted_target(0x2100ffff, u64::MAX), Some(U256::MAX));
        assert_eq!(weighted_target(0x1d00ffff, 0), Some(U256::zero()));
        assert_eq!(weighted_target(0x04923456, 1), None);
    }

    #[test]
    fn test_coin_age() {
        // 100 coins held for 10 days.
        assert_eq!(coin_age(100 * COIN, 0, 10 * 86_400), 1_000);
        assert_eq!(coin_age(100 * COIN, 10, 5), 0);
        assert_eq!(coin_age(CENT - 1, 0, 86_400), 0);
    }
}
