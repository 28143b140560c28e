// Copyright (c) 2024 Gridstake Developers

use gridstake::address::Address;
use gridstake::claim::{Cpid, MagnitudeUnit, MiningId, Superblock};
use gridstake::hash::Hash256;
use gridstake::research::{BeaconError, IdentityProvider, QuorumProvider, ResearchAccount};

pub struct MockIdentity {
    pub mining_id: MiningId,
    pub beacon_active: bool,
    pub beacon_fails: bool,
    pub beacon_time: Option<i64>,
    pub account: ResearchAccount,
    pub magnitude: u16,
    pub magnitude_unit: MagnitudeUnit,
    pub averages_loaded: bool,
}

impl MockIdentity {
    pub fn investor() -> Self {
        Self {
            mining_id: MiningId::Investor,
            beacon_active: false,
            beacon_fails: false,
            beacon_time: None,
            account: ResearchAccount::default(),
            magnitude: 0,
            magnitude_unit: MagnitudeUnit::from_micros(250_000),
            averages_loaded: true,
        }
    }

    pub fn researcher(cpid: Cpid) -> Self {
        Self {
            mining_id: MiningId::Researcher(cpid),
            beacon_active: true,
            magnitude: 100,
            ..Self::investor()
        }
    }

    pub fn beacon_signature(digest: &Hash256) -> Vec<u8> {
        let mut signature = b"beacon:".to_vec();
        signature.extend_from_slice(digest.as_bytes());
        signature
    }
}

impl IdentityProvider for MockIdentity {
    fn mining_id(&self) -> MiningId {
        self.mining_id
    }

    fn has_active_beacon(&self, _cpid: &Cpid) -> bool {
        self.beacon_active
    }

    fn sign_with_beacon(&self, cpid: &Cpid, digest: &Hash256) -> Result<Vec<u8>, BeaconError> {
        if self.beacon_fails {
            return Err(BeaconError::MissingKey(*cpid));
        }
        Ok(Self::beacon_signature(digest))
    }

    fn research_account(&self, _cpid: &Cpid) -> ResearchAccount {
        self.account.clone()
    }

    fn magnitude(&self, _cpid: &Cpid) -> u16 {
        self.magnitude
    }

    fn magnitude_unit(&self, _time: i64) -> MagnitudeUnit {
        self.magnitude_unit
    }

    fn beacon_timestamp(&self, _cpid: &Cpid) -> Option<i64> {
        self.beacon_time
    }

    fn network_averages_loaded(&self) -> bool {
        self.averages_loaded
    }
}

/// Quorum that is never due a vote unless configured.
#[derive(Default)]
pub struct MockQuorum {
    pub participant: bool,
    pub needs_superblock: bool,
    pub local_hash: Option<Hash256>,
    pub consensus_hash: Option<Hash256>,
    pub superblock: Option<Superblock>,
}

impl QuorumProvider for MockQuorum {
    fn out_of_sync(&self) -> bool {
        false
    }

    fn is_participant(&self, _address: &Address, _time: i64) -> bool {
        self.participant
    }

    fn needs_superblock(&self) -> bool {
        self.needs_superblock
    }

    fn pending_superblock_height(&self) -> Option<u32> {
        None
    }

    fn local_quorum_hash(&self) -> Option<Hash256> {
        self.local_hash
    }

    fn consensus_quorum_hash(&self) -> Option<Hash256> {
        self.consensus_hash
    }

    fn local_superblock(&self) -> Option<Superblock> {
        self.superblock.clone()
    }
}
