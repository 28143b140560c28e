// Copyright (c) 2024 Gridstake Developers

//! Transactions.
//!
//! A transaction carries its own timestamp. The first transaction of a block
//! is the coinbase (a single null input); the second is the coinstake, whose
//! first output is an empty marker.

use serde::{Deserialize, Serialize};

use crate::block::MAX_BLOCK_SIZE_GEN;
use crate::hash::{sha256d, Hash256};
use crate::monetary::{money_range, Amount, MAX_MONEY, MIN_TX_FEE};
use crate::script::LockingScript;

/// Lock times below this are block heights, above it unix timestamps.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// Reference to an output of an earlier transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: u32) -> Self {
        Self { txid, index }
    }

    /// The outpoint referenced by a coinbase input.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            index: u32::MAX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u32::MAX
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub prevout: OutPoint,
    /// Signature data satisfying the spent output's script.
    pub unlocking: Vec<u8>,
    /// Redeem script revealed when spending a pay-to-script-hash output.
    pub redeem_script: Option<LockingScript>,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(prevout: OutPoint) -> Self {
        Self {
            prevout,
            unlocking: Vec::new(),
            redeem_script: None,
            sequence: u32::MAX,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub value: Amount,
    pub script: LockingScript,
}

impl TxOut {
    pub fn new(value: Amount, script: LockingScript) -> Self {
        Self { value, script }
    }

    /// Zero-value output with an empty script.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0 && self.script.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub time: i64,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
    /// Hash of the block's research claim. Set on the coinbase only.
    pub claim_hash: Option<Hash256>,
}

impl Transaction {
    pub const CURRENT_VERSION: u32 = 2;

    pub fn new(time: i64) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            time,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
            claim_hash: None,
        }
    }

    /// Coinbase for a proof-of-stake block: a null input tagged with the
    /// height and a single empty output that later collects fees.
    pub fn coinbase(height: u32, time: i64) -> Self {
        let mut tx = Self::new(time);
        let mut input = TxIn::new(OutPoint::null());
        input.unlocking = height.to_le_bytes().to_vec();
        tx.inputs.push(input);
        tx.outputs.push(TxOut::empty());
        tx
    }

    pub fn txid(&self) -> Hash256 {
        sha256d(bincode::serialize(self).unwrap_or_default())
    }

    pub fn serialized_size(&self) -> usize {
        bincode::serialized_size(self).map(|n| n as usize).unwrap_or(0)
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }

    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty()
            && !self.inputs[0].prevout.is_null()
            && self.outputs.len() >= 2
            && self.outputs[0].is_empty()
    }

    /// Whether the lock time is satisfied for a block at `height` and `block_time`.
    pub fn is_final(&self, height: u32, block_time: i64) -> bool {
        if self.lock_time == 0 {
            return true;
        }
        let threshold = if self.lock_time < LOCKTIME_THRESHOLD {
            i64::from(height)
        } else {
            block_time
        };
        if i64::from(self.lock_time) < threshold {
            return true;
        }
        self.inputs.iter().all(|input| input.sequence == u32::MAX)
    }

    pub fn value_out(&self) -> Amount {
        self.outputs.iter().map(|o| o.value).sum()
    }

    /// Signature operations in the outputs under the legacy rule.
    pub fn legacy_sigops(&self) -> usize {
        self.outputs.iter().map(|o| o.script.legacy_sigops()).sum()
    }

    /// Signature operations in revealed redeem scripts.
    ///
    /// `spent` holds the output consumed by each input, in input order.
    pub fn p2sh_sigops(&self, spent: &[TxOut]) -> usize {
        self.inputs
            .iter()
            .zip(spent)
            .filter(|(_, prev)| matches!(prev.script, LockingScript::ScriptHash(_)))
            .filter_map(|(input, _)| input.redeem_script.as_ref())
            .map(LockingScript::accurate_sigops)
            .sum()
    }

    /// Minimum fee for including this transaction in a block that already
    /// holds `block_size` bytes.
    ///
    /// One `MIN_TX_FEE` per started kilobyte. Past half of the generated
    /// block size limit the fee is multiplied by how close the block is to
    /// full; a block at the limit cannot take any more transactions.
    pub fn min_fee(&self, block_size: usize) -> Amount {
        let bytes = self.serialized_size();
        let mut fee = (1 + (bytes / 1000) as Amount) * MIN_TX_FEE;
        let new_size = block_size + bytes;

        if block_size != 1 && new_size >= MAX_BLOCK_SIZE_GEN / 2 {
            if new_size >= MAX_BLOCK_SIZE_GEN {
                return MAX_MONEY;
            }
            fee = fee.saturating_mul((MAX_BLOCK_SIZE_GEN / (MAX_BLOCK_SIZE_GEN - new_size)) as Amount);
        }

        if money_range(fee) {
            fee
        } else {
            MAX_MONEY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{KeyId, ScriptId};

    fn spend(txid_seed: u8, value: Amount) -> Transaction {
        let mut tx = Transaction::new(1_000);
        tx.inputs.push(TxIn::new(OutPoint::new(Hash256([txid_seed; 32]), 0)));
        tx.outputs.push(TxOut::new(value, LockingScript::PubKeyHash(KeyId([1; 20]))));
        tx
    }

    #[test]
    fn test_coinbase_shape() {
        let cb = Transaction::coinbase(10, 1_000);
        assert!(cb.is_coinbase());
        assert!(!cb.is_coinstake());
        assert_eq!(cb.outputs, vec![TxOut::empty()]);
    }

    #[test]
    fn test_coinstake_shape() {
        let mut tx = spend(1, 5);
        tx.outputs.insert(0, TxOut::empty());
        assert!(tx.is_coinstake());
        assert!(!tx.is_coinbase());
    }

    #[test]
    fn test_txid_changes_with_content() {
        let a = spend(1, 5);
        let b = spend(1, 6);
        assert_ne!(a.txid(), b.txid());
        assert_eq!(a.txid(), a.clone().txid());
    }

    #[test]
    fn test_is_final() {
        let mut tx = spend(1, 5);
        assert!(tx.is_final(100, 1_000));

        tx.lock_time = 200;
        tx.inputs[0].sequence = 0;
        assert!(!tx.is_final(100, 1_000));
        assert!(tx.is_final(201, 1_000));

        tx.lock_time = LOCKTIME_THRESHOLD + 10;
        assert!(!tx.is_final(100, i64::from(LOCKTIME_THRESHOLD)));
        assert!(tx.is_final(100, i64::from(LOCKTIME_THRESHOLD) + 11));

        tx.inputs[0].sequence = u32::MAX;
        assert!(tx.is_final(100, 0));
    }

    #[test]
    fn test_min_fee_per_kilobyte() {
        let tx = spend(1, 5);
        assert!(tx.serialized_size() < 1000);
        assert_eq!(tx.min_fee(1000), MIN_TX_FEE);
    }

    #[test]
    fn test_min_fee_rises_near_full_block() {
        let tx = spend(1, 5);
        let half = MAX_BLOCK_SIZE_GEN / 2;
        let near_full = tx.min_fee(half);
        assert!(near_full >= 2 * MIN_TX_FEE);
        assert_eq!(tx.min_fee(MAX_BLOCK_SIZE_GEN), MAX_MONEY);
    }

    #[test]
    fn test_p2sh_sigops_counts_revealed_script() {
        let mut tx = spend(1, 5);
        tx.inputs[0].redeem_script = Some(LockingScript::MultiSig {
            required: 1,
            keys: vec![Default::default(), Default::default()],
        });
        let prev = TxOut::new(10, LockingScript::ScriptHash(ScriptId([2; 20])));
        assert_eq!(tx.p2sh_sigops(&[prev]), 2);

        let plain = TxOut::new(10, LockingScript::PubKeyHash(KeyId([2; 20])));
        assert_eq!(tx.p2sh_sigops(&[plain]), 0);
    }
}
