// Copyright (c) 2024 Gridstake Developers

//! Read access to chain state.
//!
//! Block storage and indexing live outside the engine. The staking loop
//! reads them through [`ChainIndex`] while holding the chain lock.

use std::fmt;

use crate::block::Block;
use crate::hash::Hash256;
use crate::transaction::{OutPoint, TxOut};

/// Index record for a block on the active chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockIndexEntry {
    pub hash: Hash256,
    pub prev_hash: Option<Hash256>,
    pub height: u32,
    pub time: i64,
    pub bits: u32,
    pub version: u32,
    pub stake_modifier: u64,
    /// Whether this block rotated the stake modifier.
    pub generated_stake_modifier: bool,
}

/// Where a confirmed transaction lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxLocation {
    pub block_hash: Hash256,
    pub height: u32,
    pub block_time: i64,
}

/// A transaction output as recorded by the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedOutput {
    pub output: TxOut,
    pub height: u32,
    pub spent: bool,
}

pub trait ChainIndex: Send + Sync {
    /// The current best block.
    fn tip(&self) -> BlockIndexEntry;

    fn block_index(&self, hash: &Hash256) -> Option<BlockIndexEntry>;

    /// Compact target for a block built on `prev`.
    fn next_target_bits(&self, prev: &BlockIndexEntry) -> u32;

    /// Network-adjusted wall clock, in unix seconds.
    fn adjusted_time(&self) -> i64;

    /// Mean proof-of-stake difficulty over the last `blocks` blocks.
    fn average_difficulty(&self, blocks: usize) -> f64;

    fn transaction_location(&self, txid: &Hash256) -> Option<TxLocation>;

    fn confirmed_output(&self, outpoint: &OutPoint) -> Option<ConfirmedOutput>;

    /// Whether block version 11 rules apply at `height`.
    fn is_v11_enabled(&self, height: u32) -> bool;
}

/// Peer connectivity as seen by the networking layer.
pub trait NetworkState: Send + Sync {
    fn connected_peers(&self) -> usize;
    fn is_initial_block_download(&self) -> bool;
}

/// Result of handing a block to the acceptance pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Rejected(String),
}

impl fmt::Display for SubmitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitOutcome::Accepted => write!(f, "accepted"),
            SubmitOutcome::Rejected(reason) => write!(f, "rejected: {}", reason),
        }
    }
}

/// The chain-acceptance pipeline.
pub trait BlockSink: Send + Sync {
    fn submit(&self, block: &Block) -> SubmitOutcome;
}

/// Confirmations of a block at `height` when the tip is at `tip_height`.
pub fn confirmations(tip_height: u32, height: u32) -> u32 {
    if height > tip_height {
        0
    } else {
        tip_height - height + 1
    }
}

/// The stake modifier in effect for a block built on `prev`: the one set by
/// the nearest ancestor (inclusive) that generated a modifier.
pub fn find_stake_modifier<C: ChainIndex + ?Sized>(chain: &C, prev: &BlockIndexEntry) -> Option<u64> {
    let mut entry = prev.clone();
    loop {
        if entry.generated_stake_modifier {
            return Some(entry.stake_modifier);
        }
        entry = chain.block_index(&entry.prev_hash?)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Lineage(HashMap<Hash256, BlockIndexEntry>);

    impl ChainIndex for Lineage {
        fn tip(&self) -> BlockIndexEntry {
            BlockIndexEntry::default()
        }
        fn block_index(&self, hash: &Hash256) -> Option<BlockIndexEntry> {
            self.0.get(hash).cloned()
        }
        fn next_target_bits(&self, _prev: &BlockIndexEntry) -> u32 {
            0
        }
        fn adjusted_time(&self) -> i64 {
            0
        }
        fn average_difficulty(&self, _blocks: usize) -> f64 {
            0.0
        }
        fn transaction_location(&self, _txid: &Hash256) -> Option<TxLocation> {
            None
        }
        fn confirmed_output(&self, _outpoint: &OutPoint) -> Option<ConfirmedOutput> {
            None
        }
        fn is_v11_enabled(&self, _height: u32) -> bool {
            true
        }
    }

    fn entry(height: u32, generated: bool) -> BlockIndexEntry {
        BlockIndexEntry {
            hash: Hash256([height as u8; 32]),
            prev_hash: height.checked_sub(1).map(|h| Hash256([h as u8; 32])),
            height,
            stake_modifier: u64::from(height) * 1_000,
            generated_stake_modifier: generated,
            ..Default::default()
        }
    }

    #[test]
    fn test_find_stake_modifier_walks_back() {
        let blocks = [entry(0, true), entry(1, false), entry(2, true), entry(3, false), entry(4, false)];
        let chain = Lineage(blocks.iter().map(|b| (b.hash, b.clone())).collect());

        assert_eq!(find_stake_modifier(&chain, &blocks[4]), Some(2_000));
        assert_eq!(find_stake_modifier(&chain, &blocks[2]), Some(2_000));
        assert_eq!(find_stake_modifier(&chain, &blocks[1]), Some(0));
    }

    #[test]
    fn test_find_stake_modifier_missing_ancestor() {
        let orphan = entry(5, false);
        let chain = Lineage(HashMap::new());
        assert_eq!(find_stake_modifier(&chain, &orphan), None);
    }

    #[test]
    fn test_confirmations() {
        assert_eq!(confirmations(10, 10), 1);
        assert_eq!(confirmations(10, 1), 10);
        assert_eq!(confirmations(10, 11), 0);
    }
}
