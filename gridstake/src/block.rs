// Copyright (c) 2024 Gridstake Developers

//! Blocks, headers and compact difficulty targets.

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::claim::ResearchClaim;
use crate::hash::{Hash256, HashWriter};
use crate::transaction::Transaction;

/// Consensus limit on a serialized block.
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// Limit on blocks this node generates.
pub const MAX_BLOCK_SIZE_GEN: usize = MAX_BLOCK_SIZE / 2;

/// Consensus limit on signature operations per block.
pub const MAX_BLOCK_SIGOPS: usize = MAX_BLOCK_SIZE / 50;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    pub time: i64,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    pub fn hash(&self) -> Hash256 {
        let mut hasher = HashWriter::new();
        hasher
            .update(self.version.to_le_bytes())
            .update(self.prev_hash.as_bytes())
            .update(self.merkle_root.as_bytes())
            .update(self.time.to_le_bytes())
            .update(self.bits.to_le_bytes())
            .update(self.nonce.to_le_bytes());
        hasher.finalize()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    /// Slot 0 is the coinbase, slot 1 the coinstake.
    pub transactions: Vec<Transaction>,
    pub claim: ResearchClaim,
    /// Signature over the header hash by the stake key.
    pub signature: Vec<u8>,
}

impl Block {
    pub fn new(header: BlockHeader) -> Self {
        Self {
            header,
            transactions: Vec::new(),
            claim: ResearchClaim::default(),
            signature: Vec::new(),
        }
    }

    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    pub fn coinstake(&self) -> Option<&Transaction> {
        self.transactions.get(1)
    }

    pub fn compute_merkle_root(&self) -> Hash256 {
        merkle_root(&self.transactions)
    }

    pub fn serialized_size(&self) -> usize {
        bincode::serialized_size(self).map(|n| n as usize).unwrap_or(0)
    }
}

/// Merkle root over transaction ids. Odd levels repeat their last node.
pub fn merkle_root(transactions: &[Transaction]) -> Hash256 {
    let mut level: Vec<Hash256> = transactions.iter().map(Transaction::txid).collect();
    if level.is_empty() {
        return Hash256::ZERO;
    }
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            if let Some(last) = level.last().copied() {
                level.push(last);
            }
        }
        level = level
            .chunks(2)
            .map(|pair| {
                let mut hasher = HashWriter::new();
                hasher.update(pair[0].as_bytes()).update(pair[1].as_bytes());
                hasher.finalize()
            })
            .collect();
    }
    level[0]
}

/// Expand compact target bits into a 256-bit target.
///
/// Returns `None` for negative or overflowing encodings.
pub fn target_from_compact(bits: u32) -> Option<U256> {
    let size = bits >> 24;
    let word = bits & 0x007f_ffff;
    let negative = word != 0 && (bits & 0x0080_0000) != 0;
    let overflow = word != 0
        && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32));
    if negative || overflow {
        return None;
    }
    let target = if size <= 3 {
        U256::from(word >> (8 * (3 - size)))
    } else {
        U256::from(word) << (8 * (size - 3) as usize)
    };
    Some(target)
}

/// Encode a 256-bit target in compact form.
pub fn compact_from_target(target: U256) -> u32 {
    let mut size = (target.bits() as u32 + 7) / 8;
    let mut compact = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size - 3) as usize)).low_u32()
    };
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | (size << 24)
}

/// Difficulty relative to the minimum-difficulty target, for display.
pub fn difficulty_from_bits(bits: u32) -> f64 {
    let mut shift = (bits >> 24) & 0xff;
    let mantissa = bits & 0x00ff_ffff;
    if mantissa == 0 {
        return 0.0;
    }
    let mut diff = f64::from(0x0000_ffffu32) / f64::from(mantissa);
    while shift < 29 {
        diff *= 256.0;
        shift += 1;
    }
    while shift > 29 {
        diff /= 256.0;
        shift -= 1;
    }
    diff
}
