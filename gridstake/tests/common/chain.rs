// Copyright (c) 2024 Gridstake Developers

use std::collections::HashMap;

use parking_lot::Mutex;

use gridstake::block::Block;
use gridstake::chain::{
    BlockIndexEntry, BlockSink, ChainIndex, ConfirmedOutput, NetworkState, SubmitOutcome, TxLocation,
};
use gridstake::hash::Hash256;
use gridstake::monetary::Amount;
use gridstake::script::{LockingScript, PublicKey};
use gridstake::transaction::{OutPoint, Transaction, TxIn, TxOut};

use super::EASY_BITS;

/// Seconds between mock blocks.
pub const SPACING: i64 = 90;

pub struct MockChain {
    pub blocks: HashMap<Hash256, BlockIndexEntry>,
    pub tip: BlockIndexEntry,
    pub outputs: HashMap<OutPoint, ConfirmedOutput>,
    pub locations: HashMap<Hash256, TxLocation>,
    pub bits: u32,
    pub adjusted_time: i64,
    pub average_difficulty: f64,
    pub v11: bool,
    funding_nonce: u32,
}

impl MockChain {
    /// A straight chain of `height + 1` blocks whose tip is stamped `tip_time`.
    /// Only genesis generates a stake modifier.
    pub fn new(height: u32, tip_time: i64) -> Self {
        let mut blocks = HashMap::new();
        let mut prev: Option<BlockIndexEntry> = None;
        for h in 0..=height {
            let mut hash = [0u8; 32];
            hash[..4].copy_from_slice(&h.to_le_bytes());
            hash[31] = 0xbb;
            let entry = BlockIndexEntry {
                hash: Hash256(hash),
                prev_hash: prev.as_ref().map(|p| p.hash),
                height: h,
                time: tip_time - i64::from(height - h) * SPACING,
                bits: EASY_BITS,
                version: 11,
                stake_modifier: if h == 0 { 0x5eed } else { 0 },
                generated_stake_modifier: h == 0,
            };
            blocks.insert(entry.hash, entry.clone());
            prev = Some(entry);
        }
        let tip = prev.unwrap_or_default();
        Self {
            blocks,
            tip,
            outputs: HashMap::new(),
            locations: HashMap::new(),
            bits: EASY_BITS,
            adjusted_time: tip_time + 60,
            average_difficulty: 1.0,
            v11: true,
            funding_nonce: 0,
        }
    }

    /// Record `tx` as confirmed at `height`.
    pub fn confirm(&mut self, tx: &Transaction, height: u32) {
        let txid = tx.txid();
        let block = self
            .blocks
            .values()
            .find(|b| b.height == height)
            .cloned()
            .unwrap_or_default();
        self.locations.insert(
            txid,
            TxLocation {
                block_hash: block.hash,
                height,
                block_time: block.time,
            },
        );
        for (index, output) in tx.outputs.iter().enumerate() {
            self.outputs.insert(
                OutPoint::new(txid, index as u32),
                ConfirmedOutput {
                    output: output.clone(),
                    height,
                    spent: false,
                },
            );
        }
    }

    /// Confirm a transaction paying `value` to `key` at `height`.
    pub fn fund(&mut self, key: &PublicKey, value: Amount, height: u32) -> Transaction {
        self.fund_script(LockingScript::PubKeyHash(key.key_id()), value, height)
    }

    pub fn fund_script(&mut self, script: LockingScript, value: Amount, height: u32) -> Transaction {
        self.funding_nonce += 1;
        let time = self
            .blocks
            .values()
            .find(|b| b.height == height)
            .map(|b| b.time)
            .unwrap_or_default();
        let mut tx = Transaction::new(time);
        tx.inputs.push(TxIn::new(OutPoint::new(Hash256([0xfe; 32]), self.funding_nonce)));
        tx.outputs.push(TxOut::new(value, script));
        self.confirm(&tx, height);
        tx
    }
}

impl ChainIndex for MockChain {
    fn tip(&self) -> BlockIndexEntry {
        self.tip.clone()
    }

    fn block_index(&self, hash: &Hash256) -> Option<BlockIndexEntry> {
        self.blocks.get(hash).cloned()
    }

    fn next_target_bits(&self, _prev: &BlockIndexEntry) -> u32 {
        self.bits
    }

    fn adjusted_time(&self) -> i64 {
        self.adjusted_time
    }

    fn average_difficulty(&self, _blocks: usize) -> f64 {
        self.average_difficulty
    }

    fn transaction_location(&self, txid: &Hash256) -> Option<TxLocation> {
        self.locations.get(txid).copied()
    }

    fn confirmed_output(&self, outpoint: &OutPoint) -> Option<ConfirmedOutput> {
        self.outputs.get(outpoint).cloned()
    }

    fn is_v11_enabled(&self, _height: u32) -> bool {
        self.v11
    }
}

pub struct MockNetwork {
    pub peers: usize,
    pub initial_download: bool,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self {
            peers: 8,
            initial_download: false,
        }
    }
}

impl NetworkState for MockNetwork {
    fn connected_peers(&self) -> usize {
        self.peers
    }

    fn is_initial_block_download(&self) -> bool {
        self.initial_download
    }
}

/// Acceptance pipeline that records what it was given.
pub struct RecordingSink {
    pub blocks: Mutex<Vec<Block>>,
    pub reject_with: Option<String>,
    pub panic_on_submit: bool,
}

impl RecordingSink {
    pub fn accepting() -> Self {
        Self {
            blocks: Mutex::new(Vec::new()),
            reject_with: None,
            panic_on_submit: false,
        }
    }

    /// Records the block, then panics.
    pub fn panicking() -> Self {
        Self {
            panic_on_submit: true,
            ..Self::accepting()
        }
    }

    pub fn rejecting(reason: &str) -> Self {
        Self {
            blocks: Mutex::new(Vec::new()),
            reject_with: Some(reason.to_string()),
            panic_on_submit: false,
        }
    }

    pub fn submitted(&self) -> Vec<Block> {
        self.blocks.lock().clone()
    }
}

impl BlockSink for RecordingSink {
    fn submit(&self, block: &Block) -> SubmitOutcome {
        self.blocks.lock().push(block.clone());
        if self.panic_on_submit {
            panic!("acceptance pipeline failed");
        }
        match &self.reject_with {
            Some(reason) => SubmitOutcome::Rejected(reason.clone()),
            None => SubmitOutcome::Accepted,
        }
    }
}
