// Copyright (c) 2024 Gridstake Developers

//! Superblock quorum voting through the research claim.

use tracing::{debug, info};

use crate::address::Address;
use crate::claim::ResearchClaim;
use crate::research::QuorumProvider;

/// A pending superblock this close to the tip blocks new votes.
pub const PENDING_SUPERBLOCK_WINDOW: u32 = 200;

/// Outcome of [`add_quorum_vote`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuorumVote {
    Skipped(&'static str),
    Voted,
    /// Voted and attached the superblock contract.
    Attached,
}

/// Add this node's superblock vote to `claim` when it is due one.
pub fn add_quorum_vote<Q: QuorumProvider + ?Sized>(
    quorum: &Q,
    claim: &mut ResearchClaim,
    address: Option<&Address>,
    tip_height: u32,
    time: i64,
) -> QuorumVote {
    let vote = cast_vote(quorum, claim, address, tip_height, time);
    match vote {
        QuorumVote::Skipped(reason) => debug!(reason, "No quorum vote"),
        QuorumVote::Voted => info!(height = tip_height, "Added quorum vote"),
        QuorumVote::Attached => info!(height = tip_height, "Added quorum vote with superblock"),
    }
    vote
}

fn cast_vote<Q: QuorumProvider + ?Sized>(
    quorum: &Q,
    claim: &mut ResearchClaim,
    address: Option<&Address>,
    tip_height: u32,
    time: i64,
) -> QuorumVote {
    if quorum.out_of_sync() {
        return QuorumVote::Skipped("out of sync");
    }
    let Some(address) = address.filter(|a| quorum.is_participant(a, time)) else {
        return QuorumVote::Skipped("not a quorum participant");
    };
    if !quorum.needs_superblock() {
        return QuorumVote::Skipped("superblock not needed");
    }
    if let Some(height) = quorum.pending_superblock_height() {
        if height >= tip_height.saturating_sub(PENDING_SUPERBLOCK_WINDOW) {
            return QuorumVote::Skipped("superblock pending");
        }
    }
    let Some(local_hash) = quorum.local_quorum_hash() else {
        return QuorumVote::Skipped("no local quorum hash");
    };

    claim.quorum_hash = Some(local_hash);
    claim.quorum_address = Some(address.to_string());

    if quorum.consensus_quorum_hash() == Some(local_hash) {
        if let Some(superblock) = quorum.local_superblock() {
            claim.superblock = Some(superblock);
            return QuorumVote::Attached;
        }
    }
    QuorumVote::Voted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Network;
    use crate::claim::Superblock;
    use crate::hash::Hash256;
    use crate::script::KeyId;

    struct Quorum {
        out_of_sync: bool,
        participant: bool,
        needs: bool,
        pending: Option<u32>,
        local: Option<Hash256>,
        consensus: Option<Hash256>,
    }

    impl Default for Quorum {
        fn default() -> Self {
            Self {
                out_of_sync: false,
                participant: true,
                needs: true,
                pending: None,
                local: Some(Hash256([1; 32])),
                consensus: None,
            }
        }
    }

    impl QuorumProvider for Quorum {
        fn out_of_sync(&self) -> bool {
            self.out_of_sync
        }
        fn is_participant(&self, _address: &Address, _time: i64) -> bool {
            self.participant
        }
        fn needs_superblock(&self) -> bool {
            self.needs
        }
        fn pending_superblock_height(&self) -> Option<u32> {
            self.pending
        }
        fn local_quorum_hash(&self) -> Option<Hash256> {
            self.local
        }
        fn consensus_quorum_hash(&self) -> Option<Hash256> {
            self.consensus
        }
        fn local_superblock(&self) -> Option<Superblock> {
            Some(Superblock {
                contract: b"contract".to_vec(),
            })
        }
    }

    fn vote(quorum: &Quorum, tip: u32) -> (QuorumVote, ResearchClaim) {
        let address = Address::from_key_id(KeyId([9; 20]), Network::Testnet);
        let mut claim = ResearchClaim::default();
        let vote = add_quorum_vote(quorum, &mut claim, Some(&address), tip, 0);
        (vote, claim)
    }

    #[test]
    fn test_vote_without_consensus() {
        let (outcome, claim) = vote(&Quorum::default(), 1_000);
        assert_eq!(outcome, QuorumVote::Voted);
        assert_eq!(claim.quorum_hash, Some(Hash256([1; 32])));
        assert!(claim.quorum_address.is_some());
        assert!(!claim.contains_superblock());
    }

    #[test]
    fn test_matching_consensus_attaches_superblock() {
        let quorum = Quorum {
            consensus: Some(Hash256([1; 32])),
            ..Default::default()
        };
        let (outcome, claim) = vote(&quorum, 1_000);
        assert_eq!(outcome, QuorumVote::Attached);
        assert!(claim.contains_superblock());
    }

    #[test]
    fn test_skip_conditions() {
        let cases = [
            Quorum {
                out_of_sync: true,
                ..Default::default()
            },
            Quorum {
                participant: false,
                ..Default::default()
            },
            Quorum {
                needs: false,
                ..Default::default()
            },
            Quorum {
                pending: Some(850),
                ..Default::default()
            },
            Quorum {
                local: None,
                ..Default::default()
            },
        ];
        for quorum in &cases {
            let (outcome, claim) = vote(quorum, 1_000);
            assert!(matches!(outcome, QuorumVote::Skipped(_)));
            assert_eq!(claim, ResearchClaim::default());
        }
    }

    #[test]
    fn test_old_pending_superblock_does_not_block() {
        let quorum = Quorum {
            pending: Some(700),
            ..Default::default()
        };
        assert_eq!(vote(&quorum, 1_000).0, QuorumVote::Voted);
    }
}
