// Copyright (c) 2024 Gridstake Developers

//! Research identity and superblock quorum data.
//!
//! The research tally, beacon registry and superblock scraper run outside
//! the engine. These traits are the slice of them the staking loop needs.

use thiserror::Error;

use crate::address::Address;
use crate::claim::{Cpid, MagnitudeUnit, MiningId, Superblock};
use crate::hash::Hash256;
use crate::monetary::Amount;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BeaconError {
    #[error("no active beacon for {0}")]
    NoBeacon(Cpid),
    #[error("beacon private key for {0} is not in the wallet")]
    MissingKey(Cpid),
    #[error("beacon signing failed: {0}")]
    Signing(String),
}

/// The block that paid a researcher most recently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastReward {
    pub height: u32,
    pub time: i64,
    pub magnitude: u16,
    pub block_hash: Hash256,
}

/// Lifetime research payment record for one identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResearchAccount {
    pub first_payment_time: i64,
    pub total_research_subsidy: Amount,
    /// Sum of the magnitudes of every rewarded block.
    pub total_magnitude: u64,
    /// Number of rewarded blocks.
    pub accuracy: u32,
    pub last_reward: Option<LastReward>,
}

impl ResearchAccount {
    /// Never rewarded.
    pub fn is_new(&self) -> bool {
        self.accuracy == 0 || self.last_reward.is_none()
    }

    /// Lifetime average magnitude as a `(numerator, denominator)` pair.
    pub fn average_magnitude(&self) -> (u64, u64) {
        if self.accuracy == 0 {
            (0, 1)
        } else {
            (self.total_magnitude, u64::from(self.accuracy))
        }
    }
}

pub trait IdentityProvider: Send + Sync {
    /// Identity this node mints under.
    fn mining_id(&self) -> MiningId;

    /// Whether `cpid` has an active beacon.
    fn has_active_beacon(&self, cpid: &Cpid) -> bool;

    /// Sign with the beacon key of `cpid`.
    fn sign_with_beacon(&self, cpid: &Cpid, digest: &Hash256) -> Result<Vec<u8>, BeaconError>;

    fn research_account(&self, cpid: &Cpid) -> ResearchAccount;

    /// Current magnitude of `cpid` from the latest superblock.
    fn magnitude(&self, cpid: &Cpid) -> u16;

    fn magnitude_unit(&self, time: i64) -> MagnitudeUnit;

    /// When the beacon of `cpid` was advertised.
    fn beacon_timestamp(&self, cpid: &Cpid) -> Option<i64>;

    /// Whether the network averages needed for reward computation are loaded.
    fn network_averages_loaded(&self) -> bool;
}

/// Superblock scraper and quorum state.
pub trait QuorumProvider: Send + Sync {
    /// Scraper data is too old to vote on.
    fn out_of_sync(&self) -> bool;

    fn is_participant(&self, address: &Address, time: i64) -> bool;

    /// The network is due a superblock.
    fn needs_superblock(&self) -> bool;

    /// Height of a superblock already awaiting confirmation, if any.
    fn pending_superblock_height(&self) -> Option<u32>;

    /// Hash of the superblock this node would produce.
    fn local_quorum_hash(&self) -> Option<Hash256>;

    /// Hash the network quorum currently agrees on.
    fn consensus_quorum_hash(&self) -> Option<Hash256>;

    fn local_superblock(&self) -> Option<Superblock>;
}
