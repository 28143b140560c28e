// Copyright (c) 2024 Gridstake Developers

//! The research-reward claim attached to every staked block.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hash::{sha256d, Hash256, HashWriter};
use crate::monetary::Amount;

/// Longest client version string a claim may carry.
pub const MAX_VERSION_SIZE: usize = 30;

/// Longest organization tag a claim may carry.
pub const MAX_ORGANIZATION_SIZE: usize = 50;

/// Decimal places of precision kept for the magnitude unit.
pub const MAG_UNIT_PLACES: u32 = 6;

/// External research project identifier.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cpid(pub [u8; 16]);

impl Cpid {
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        Some(Cpid(bytes.try_into().ok()?))
    }
}

impl fmt::Display for Cpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Cpid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cpid({})", self)
    }
}

/// Who is minting: a plain staker or a credit-bearing researcher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MiningId {
    #[default]
    Investor,
    Researcher(Cpid),
}

impl MiningId {
    pub fn cpid(&self) -> Option<&Cpid> {
        match self {
            MiningId::Investor => None,
            MiningId::Researcher(cpid) => Some(cpid),
        }
    }
}

impl fmt::Display for MiningId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MiningId::Investor => write!(f, "INVESTOR"),
            MiningId::Researcher(cpid) => write!(f, "{}", cpid),
        }
    }
}

/// Coins per unit of magnitude per day, in millionths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MagnitudeUnit(u64);

impl MagnitudeUnit {
    pub const SCALE: u64 = 10u64.pow(MAG_UNIT_PLACES);

    pub fn from_micros(micros: u64) -> Self {
        MagnitudeUnit(micros)
    }

    pub fn micros(self) -> u64 {
        self.0
    }

    /// Derive the unit from the network's daily research payment limit and
    /// total magnitude, rounded to a 0.025 grid and capped at 5.
    pub fn from_network(max_daily_payment_coins: u64, total_magnitude: u64) -> Self {
        const GRID: u64 = MagnitudeUnit::SCALE / 40;
        const CAP: u64 = 5 * MagnitudeUnit::SCALE;
        if total_magnitude == 0 {
            return MagnitudeUnit(CAP);
        }
        let raw = max_daily_payment_coins.saturating_mul(Self::SCALE) / total_magnitude;
        MagnitudeUnit(((raw + GRID / 2) / GRID * GRID).min(CAP))
    }
}

impl fmt::Display for MagnitudeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:06}", self.0 / Self::SCALE, self.0 % Self::SCALE)
    }
}

/// An aggregate research contract voted on by the network quorum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Superblock {
    pub contract: Vec<u8>,
}

impl Superblock {
    pub fn hash(&self) -> Hash256 {
        sha256d(&self.contract)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchClaim {
    pub version: u32,
    pub mining_id: MiningId,
    pub client_version: String,
    pub organization: String,
    pub block_subsidy: Amount,
    pub research_subsidy: Amount,
    pub magnitude: u16,
    pub magnitude_unit: MagnitudeUnit,
    /// Average magnitude used for accrual, in hundredths.
    pub average_magnitude: u32,
    pub last_payment_time: i64,
    pub last_block_hash: Hash256,
    pub last_por_block_hash: Hash256,
    pub signature: Option<Vec<u8>>,
    pub quorum_hash: Option<Hash256>,
    pub quorum_address: Option<String>,
    pub superblock: Option<Superblock>,
}

impl ResearchClaim {
    pub const CURRENT_VERSION: u32 = 2;

    pub fn new(version: u32) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }

    pub fn set_client_version(&mut self, version: &str) {
        self.client_version = truncate_utf8(version, MAX_VERSION_SIZE);
    }

    pub fn set_organization(&mut self, organization: &str) {
        self.organization = truncate_utf8(organization, MAX_ORGANIZATION_SIZE);
    }

    pub fn well_formed(&self) -> bool {
        self.version > 0
            && self.version <= Self::CURRENT_VERSION
            && self.client_version.len() <= MAX_VERSION_SIZE
            && self.organization.len() <= MAX_ORGANIZATION_SIZE
            && self.block_subsidy > 0
            && (self.mining_id != MiningId::Investor || self.research_subsidy == 0)
    }

    pub fn has_research_reward(&self) -> bool {
        matches!(self.mining_id, MiningId::Researcher(_)) && self.research_subsidy > 0
    }

    pub fn contains_superblock(&self) -> bool {
        self.superblock.is_some()
    }

    pub fn total_subsidy(&self) -> Amount {
        self.block_subsidy + self.research_subsidy
    }

    /// Digest signed by the researcher's beacon key. Binds the claim to the
    /// block it extends so it cannot be replayed on another branch.
    pub fn signing_hash(&self, last_block_hash: &Hash256) -> Hash256 {
        let mut hasher = HashWriter::new();
        match &self.mining_id {
            MiningId::Investor => hasher.update([0u8]),
            MiningId::Researcher(cpid) => hasher.update([1u8]).update(cpid.0),
        };
        hasher.update(last_block_hash.as_bytes());
        hasher.finalize()
    }

    /// Commitment stored in the coinbase.
    pub fn hash(&self) -> Hash256 {
        sha256d(bincode::serialize(self).unwrap_or_default())
    }
}

fn truncate_utf8(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
