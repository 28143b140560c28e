// Copyright (c) 2024 Gridstake Developers

//! Pool of unconfirmed transactions.
//!
//! The block assembler only reads the pool through [`TxPool`]. [`Mempool`]
//! is the in-memory implementation the node feeds from relay.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::chain::ChainIndex;
use crate::hash::Hash256;
use crate::monetary::Amount;
use crate::transaction::{OutPoint, Transaction};

/// Maximum transactions held before the cheapest is evicted.
const MAX_MEMPOOL_SIZE: usize = 1000;

/// Read access to pending transactions.
pub trait TxPool: Send + Sync {
    /// Every pending transaction, in an order that only depends on pool
    /// content.
    fn transactions(&self) -> Vec<Transaction>;

    fn get(&self, txid: &Hash256) -> Option<Transaction>;
}

/// A pending transaction with metadata
#[derive(Debug, Clone)]
pub struct PendingTx {
    pub tx: Transaction,
    pub fee: Amount,
    pub size: usize,
}

impl PendingTx {
    pub fn new(tx: Transaction, fee: Amount) -> Self {
        let size = tx.serialized_size().max(1);
        Self {
            tx,
            fee,
            size,
        }
    }

    /// Fee per kilobyte, compared without division.
    fn fee_rate_key(&self) -> (i128, usize) {
        (self.fee as i128 * 1000, self.size)
    }
}

/// Transaction mempool
pub struct Mempool {
    /// Pending transactions by id
    txs: BTreeMap<Hash256, PendingTx>,
    /// Outpoints consumed by pending transactions
    spent_outpoints: HashSet<OutPoint>,
    capacity: usize,
}

impl Mempool {
    pub fn new() -> Self {
        Self::with_capacity(MAX_MEMPOOL_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            txs: BTreeMap::new(),
            spent_outpoints: HashSet::new(),
            capacity: capacity.max(1),
        }
    }

    /// Add a transaction, resolving its inputs against the chain and the
    /// transactions already pending.
    pub fn add_tx<C: ChainIndex + ?Sized>(
        &mut self,
        tx: Transaction,
        chain: &C,
    ) -> Result<Hash256, MempoolError> {
        let txid = tx.txid();

        if self.txs.contains_key(&txid) {
            return Err(MempoolError::AlreadyExists);
        }
        if tx.is_coinbase() || tx.is_coinstake() {
            return Err(MempoolError::NotStandalone);
        }
        if tx.inputs.is_empty() || tx.outputs.is_empty() {
            return Err(MempoolError::Empty);
        }
        if tx.inputs.iter().any(|input| self.spent_outpoints.contains(&input.prevout)) {
            return Err(MempoolError::DoubleSpend);
        }

        let mut value_in: Amount = 0;
        for input in &tx.inputs {
            let value = match chain.confirmed_output(&input.prevout) {
                Some(confirmed) if confirmed.spent => return Err(MempoolError::DoubleSpend),
                Some(confirmed) => confirmed.output.value,
                None => self
                    .txs
                    .get(&input.prevout.txid)
                    .and_then(|parent| parent.tx.outputs.get(input.prevout.index as usize))
                    .map(|out| out.value)
                    .ok_or(MempoolError::InputNotFound(input.prevout))?,
            };
            value_in += value;
        }

        let value_out = tx.value_out();
        if value_out > value_in {
            return Err(MempoolError::InsufficientInputs {
                inputs: value_in,
                outputs: value_out,
            });
        }

        if self.txs.len() >= self.capacity {
            self.evict_lowest_fee();
        }

        for input in &tx.inputs {
            self.spent_outpoints.insert(input.prevout);
        }
        self.txs.insert(txid, PendingTx::new(tx, value_in - value_out));

        debug!(txid = %txid.short(), "Added transaction to mempool");
        Ok(txid)
    }

    pub fn remove_tx(&mut self, txid: &Hash256) -> Option<Transaction> {
        let pending = self.txs.remove(txid)?;
        for input in &pending.tx.inputs {
            self.spent_outpoints.remove(&input.prevout);
        }
        Some(pending.tx)
    }

    /// Remove transactions that were included in a block
    pub fn remove_confirmed(&mut self, transactions: &[Transaction]) {
        for tx in transactions {
            self.remove_tx(&tx.txid());
        }
    }

    fn evict_lowest_fee(&mut self) {
        let cheapest = self
            .txs
            .iter()
            .min_by(|(_, a), (_, b)| {
                let (fa, sa) = a.fee_rate_key();
                let (fb, sb) = b.fee_rate_key();
                (fa * sb as i128).cmp(&(fb * sa as i128))
            })
            .map(|(id, _)| *id);

        if let Some(txid) = cheapest {
            self.remove_tx(&txid);
            debug!(txid = %txid.short(), "Evicted low-fee transaction from mempool");
        }
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn contains(&self, txid: &Hash256) -> bool {
        self.txs.contains_key(txid)
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl TxPool for Mempool {
    fn transactions(&self) -> Vec<Transaction> {
        self.txs.values().map(|p| p.tx.clone()).collect()
    }

    fn get(&self, txid: &Hash256) -> Option<Transaction> {
        self.txs.get(txid).map(|p| p.tx.clone())
    }
}

/// Mempool errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    AlreadyExists,
    NotStandalone,
    Empty,
    DoubleSpend,
    InputNotFound(OutPoint),
    InsufficientInputs { inputs: Amount, outputs: Amount },
}

impl std::fmt::Display for MempoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "Transaction already in mempool"),
            Self::NotStandalone => write!(f, "Coinbase and coinstake transactions only exist in blocks"),
            Self::Empty => write!(f, "Transaction has no inputs or no outputs"),
            Self::DoubleSpend => write!(f, "Double-spend detected"),
            Self::InputNotFound(outpoint) => {
                write!(f, "Input not found: {}:{}", outpoint.txid.short(), outpoint.index)
            }
            Self::InsufficientInputs { inputs, outputs } => {
                write!(f, "Insufficient inputs: {} < {}", inputs, outputs)
            }
        }
    }
}

impl std::error::Error for MempoolError {}
