// Copyright (c) 2024 Gridstake Developers

//! Transaction selection for a candidate block.
//!
//! Pool transactions are ranked by coin-age priority until the priority
//! area of the block fills up or priority drops below [`PRIORITY_FLOOR`],
//! then by fee per kilobyte for the rest of the block. The switch happens
//! once per selection and never reverts.
//!
//! Transactions spending outputs of other pool transactions wait as orphans
//! until every parent has been selected.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;
use tracing::debug;

use crate::block::{MAX_BLOCK_SIGOPS, MAX_BLOCK_SIZE, MAX_BLOCK_SIZE_GEN};
use crate::chain::{confirmations, BlockIndexEntry, ChainIndex};
use crate::hash::Hash256;
use crate::mempool::TxPool;
use crate::monetary::{Amount, COIN, MIN_TX_FEE};
use crate::transaction::{OutPoint, Transaction, TxOut};

/// Bytes reserved for the coinbase and coinstake.
pub const RESERVED_BLOCK_SIZE: usize = 1000;

/// Signature operations reserved for the coinbase and coinstake.
pub const RESERVED_SIGOPS: usize = 100;

/// Default bytes of the block given to high-priority transactions.
pub const DEFAULT_PRIORITY_SIZE: usize = 27_000;

/// Priority of one coin a day old in a 250 byte transaction.
pub const PRIORITY_FLOOR: f64 = (COIN * 144 / 250) as f64;

/// Size and fee policy for block assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLimits {
    pub max_size: usize,
    pub priority_size: usize,
    pub min_size: usize,
    pub min_tx_fee: Amount,
}

impl BlockLimits {
    /// Limits clamped into the range the chain accepts.
    pub fn new(max_size: usize, priority_size: usize, min_size: usize, min_tx_fee: Amount) -> Self {
        let max_size = max_size.clamp(1000, MAX_BLOCK_SIZE - 1000);
        Self {
            max_size,
            priority_size: priority_size.min(max_size),
            min_size: min_size.min(max_size),
            min_tx_fee: min_tx_fee.max(0),
        }
    }
}

impl Default for BlockLimits {
    fn default() -> Self {
        Self::new(MAX_BLOCK_SIZE_GEN / 2, DEFAULT_PRIORITY_SIZE, 0, MIN_TX_FEE)
    }
}

/// Ordering in force when a transaction was taken from the ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Priority,
    Fee,
}

/// Why a pool transaction stayed out of the block.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NotStandalone,
    NotFinal,
    MissingInput(OutPoint),
    Oversize { size: usize },
    TooManySigops { sigops: usize },
    FromTheFuture { tx_time: i64, block_time: i64 },
    BelowMinimumFee { fee_per_kb: f64 },
    InputsUnavailable(OutPoint),
    DoubleSpend(OutPoint),
    InsufficientFee { fee: Amount, required: Amount },
    UnresolvedDependency,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStandalone => write!(f, "coinbase or coinstake"),
            Self::NotFinal => write!(f, "lock time not reached"),
            Self::MissingInput(o) => write!(f, "input {}:{} not found", o.txid.short(), o.index),
            Self::Oversize { size } => write!(f, "{} bytes do not fit", size),
            Self::TooManySigops { sigops } => write!(f, "{} sigops do not fit", sigops),
            Self::FromTheFuture { tx_time, block_time } => {
                write!(f, "timestamp {} after block time {}", tx_time, block_time)
            }
            Self::BelowMinimumFee { fee_per_kb } => {
                write!(f, "fee {:.0}/kB below minimum with block past minimum size", fee_per_kb)
            }
            Self::InputsUnavailable(o) => {
                write!(f, "input {}:{} unavailable", o.txid.short(), o.index)
            }
            Self::DoubleSpend(o) => write!(f, "input {}:{} already spent", o.txid.short(), o.index),
            Self::InsufficientFee { fee, required } => {
                write!(f, "fee {} below required {}", fee, required)
            }
            Self::UnresolvedDependency => write!(f, "parent transaction not selected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedTx {
    pub txid: Hash256,
    pub mode: SelectionMode,
    pub priority: f64,
    pub fee_per_kb: f64,
    pub fee: Amount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub txid: Hash256,
    pub reason: SkipReason,
}

/// Outcome of one selection run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// Chosen transactions in block order.
    pub transactions: Vec<Transaction>,
    pub fees: Amount,
    /// Running size including the reserved bytes.
    pub block_size: usize,
    /// Running sigops including the reserved count.
    pub sigops: usize,
    pub included: Vec<SelectedTx>,
    pub excluded: Vec<Exclusion>,
}

/// A pool transaction with the figures used to rank it.
#[derive(Debug, Clone)]
struct PendingEntry {
    txid: Hash256,
    tx: Transaction,
    size: usize,
    priority: f64,
    fee_per_kb: f64,
}

struct Ranked {
    primary: f64,
    secondary: f64,
    entry: PendingEntry,
}

impl Ranked {
    fn new(entry: PendingEntry, by_fee: bool) -> Self {
        let (primary, secondary) = if by_fee {
            (entry.fee_per_kb, entry.priority)
        } else {
            (entry.priority, entry.fee_per_kb)
        };
        Self {
            primary,
            secondary,
            entry,
        }
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.primary
            .total_cmp(&other.primary)
            .then(self.secondary.total_cmp(&other.secondary))
            // Lower txid wins a full tie.
            .then_with(|| other.entry.txid.cmp(&self.entry.txid))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

/// Max-heap whose ordering switches once from priority to fee.
struct RankingQueue {
    by_fee: bool,
    heap: BinaryHeap<Ranked>,
}

impl RankingQueue {
    fn new(by_fee: bool) -> Self {
        Self {
            by_fee,
            heap: BinaryHeap::new(),
        }
    }

    fn push(&mut self, entry: PendingEntry) {
        self.heap.push(Ranked::new(entry, self.by_fee));
    }

    fn pop(&mut self) -> Option<PendingEntry> {
        self.heap.pop().map(|r| r.entry)
    }

    fn mode(&self) -> SelectionMode {
        if self.by_fee {
            SelectionMode::Fee
        } else {
            SelectionMode::Priority
        }
    }

    fn switch_to_fee(&mut self) {
        if self.by_fee {
            return;
        }
        self.by_fee = true;
        let entries = std::mem::take(&mut self.heap).into_vec();
        self.heap = entries.into_iter().map(|r| Ranked::new(r.entry, true)).collect();
    }
}

/// Waiting on pool parents that are not in the block yet.
struct Orphan {
    entry: PendingEntry,
    depends_on: HashSet<Hash256>,
}

/// Builds the ordinary-transaction part of a candidate block.
pub struct TransactionSelector<'a, C: ChainIndex + ?Sized, P: TxPool + ?Sized> {
    chain: &'a C,
    pool: &'a P,
    limits: BlockLimits,
}

impl<'a, C: ChainIndex + ?Sized, P: TxPool + ?Sized> TransactionSelector<'a, C, P> {
    pub fn new(chain: &'a C, pool: &'a P, limits: BlockLimits) -> Self {
        Self {
            chain,
            pool,
            limits,
        }
    }

    /// Select transactions for a block on top of `prev` stamped `block_time`.
    pub fn select(&self, prev: &BlockIndexEntry, block_time: i64) -> Selection {
        let height = prev.height + 1;
        let mut selection = Selection {
            block_size: RESERVED_BLOCK_SIZE,
            sigops: RESERVED_SIGOPS,
            ..Default::default()
        };

        let mut queue = RankingQueue::new(self.limits.priority_size == 0);
        let mut orphans: HashMap<Hash256, Orphan> = HashMap::new();
        let mut dependers: HashMap<Hash256, Vec<Hash256>> = HashMap::new();

        for tx in self.pool.transactions() {
            let txid = tx.txid();
            if tx.is_coinbase() || tx.is_coinstake() {
                exclude(&mut selection, txid, SkipReason::NotStandalone);
                continue;
            }
            if !tx.is_final(height, block_time) {
                exclude(&mut selection, txid, SkipReason::NotFinal);
                continue;
            }

            match self.rank(prev, txid, tx) {
                Ok((entry, parents)) if parents.is_empty() => queue.push(entry),
                Ok((entry, parents)) => {
                    for parent in &parents {
                        dependers.entry(*parent).or_default().push(txid);
                    }
                    orphans.insert(
                        txid,
                        Orphan {
                            entry,
                            depends_on: parents,
                        },
                    );
                }
                Err(reason) => exclude(&mut selection, txid, reason),
            }
        }

        let mut spent_in_block: HashSet<OutPoint> = HashSet::new();
        let mut block_txs: HashMap<Hash256, usize> = HashMap::new();

        while let Some(entry) = queue.pop() {
            let mode = queue.mode();
            let size = entry.size;

            if selection.block_size + size >= self.limits.max_size {
                exclude(&mut selection, entry.txid, SkipReason::Oversize { size });
                continue;
            }

            let legacy_sigops = entry.tx.legacy_sigops();
            if selection.sigops + legacy_sigops >= MAX_BLOCK_SIGOPS {
                exclude(
                    &mut selection,
                    entry.txid,
                    SkipReason::TooManySigops {
                        sigops: legacy_sigops,
                    },
                );
                continue;
            }

            if entry.tx.time > block_time {
                exclude(
                    &mut selection,
                    entry.txid,
                    SkipReason::FromTheFuture {
                        tx_time: entry.tx.time,
                        block_time,
                    },
                );
                continue;
            }

            if queue.by_fee
                && entry.fee_per_kb < self.limits.min_tx_fee as f64
                && selection.block_size + size >= self.limits.min_size
            {
                exclude(
                    &mut selection,
                    entry.txid,
                    SkipReason::BelowMinimumFee {
                        fee_per_kb: entry.fee_per_kb,
                    },
                );
                continue;
            }

            if !queue.by_fee
                && (selection.block_size + size >= self.limits.priority_size
                    || entry.priority < PRIORITY_FLOOR)
            {
                debug!(
                    txid = %entry.txid.short(),
                    priority = entry.priority,
                    "Priority area exhausted, ranking by fee"
                );
                queue.switch_to_fee();
            }

            let spent = match self.connect_inputs(&entry.tx, &selection, &block_txs, &spent_in_block) {
                Ok(spent) => spent,
                Err(reason) => {
                    exclude(&mut selection, entry.txid, reason);
                    continue;
                }
            };

            let value_in: Amount = spent.iter().map(|o| o.value).sum();
            let fee = value_in - entry.tx.value_out();
            let required = entry.tx.min_fee(selection.block_size);
            if fee < required {
                exclude(&mut selection, entry.txid, SkipReason::InsufficientFee { fee, required });
                continue;
            }

            let sigops = legacy_sigops + entry.tx.p2sh_sigops(&spent);
            if selection.sigops + sigops >= MAX_BLOCK_SIGOPS {
                exclude(&mut selection, entry.txid, SkipReason::TooManySigops { sigops });
                continue;
            }

            for input in &entry.tx.inputs {
                spent_in_block.insert(input.prevout);
            }
            block_txs.insert(entry.txid, selection.transactions.len());
            selection.block_size += size;
            selection.sigops += sigops;
            selection.fees += fee;
            selection.included.push(SelectedTx {
                txid: entry.txid,
                mode,
                priority: entry.priority,
                fee_per_kb: entry.fee_per_kb,
                fee,
            });
            debug!(
                txid = %entry.txid.short(),
                ?mode,
                priority = entry.priority,
                fee_per_kb = entry.fee_per_kb,
                "Selected transaction"
            );

            let accepted = entry.txid;
            selection.transactions.push(entry.tx);

            for child in dependers.remove(&accepted).unwrap_or_default() {
                let ready = match orphans.get_mut(&child) {
                    Some(orphan) => {
                        orphan.depends_on.remove(&accepted);
                        orphan.depends_on.is_empty()
                    }
                    None => false,
                };
                if ready {
                    if let Some(orphan) = orphans.remove(&child) {
                        queue.push(orphan.entry);
                    }
                }
            }
        }

        let mut stranded: Vec<Hash256> = orphans.into_keys().collect();
        stranded.sort();
        for txid in stranded {
            exclude(&mut selection, txid, SkipReason::UnresolvedDependency);
        }

        selection
    }

    /// Compute priority and fee rate, and collect unconfirmed parents.
    fn rank(
        &self,
        prev: &BlockIndexEntry,
        txid: Hash256,
        tx: Transaction,
    ) -> Result<(PendingEntry, HashSet<Hash256>), SkipReason> {
        let mut parents = HashSet::new();
        let mut coin_age_value = 0f64;
        let mut value_in: Amount = 0;

        for input in &tx.inputs {
            if let Some(confirmed) = self.chain.confirmed_output(&input.prevout) {
                let depth = confirmations(prev.height, confirmed.height);
                coin_age_value += confirmed.output.value as f64 * f64::from(depth);
                value_in += confirmed.output.value;
                continue;
            }
            let parent_output = self
                .pool
                .get(&input.prevout.txid)
                .and_then(|parent| parent.outputs.get(input.prevout.index as usize).cloned());
            match parent_output {
                Some(output) => {
                    parents.insert(input.prevout.txid);
                    value_in += output.value;
                }
                None => {
                    debug!(txid = %txid.short(), "Dropping pool transaction with missing input");
                    return Err(SkipReason::MissingInput(input.prevout));
                }
            }
        }

        let size = tx.serialized_size().max(1);
        let fee = value_in - tx.value_out();
        let entry = PendingEntry {
            txid,
            priority: coin_age_value / size as f64,
            fee_per_kb: fee as f64 / (size as f64 / 1000.0),
            size,
            tx,
        };
        Ok((entry, parents))
    }

    /// Resolve inputs against the chain plus the transactions already in
    /// this block. Returns the spent outputs in input order.
    fn connect_inputs(
        &self,
        tx: &Transaction,
        selection: &Selection,
        block_txs: &HashMap<Hash256, usize>,
        spent_in_block: &HashSet<OutPoint>,
    ) -> Result<Vec<TxOut>, SkipReason> {
        let mut spent = Vec::with_capacity(tx.inputs.len());
        let mut seen = HashSet::new();
        for input in &tx.inputs {
            let prevout = input.prevout;
            if spent_in_block.contains(&prevout) || !seen.insert(prevout) {
                return Err(SkipReason::DoubleSpend(prevout));
            }
            if let Some(&slot) = block_txs.get(&prevout.txid) {
                let output = selection.transactions[slot]
                    .outputs
                    .get(prevout.index as usize)
                    .cloned()
                    .ok_or(SkipReason::InputsUnavailable(prevout))?;
                spent.push(output);
                continue;
            }
            match self.chain.confirmed_output(&prevout) {
                Some(confirmed) if confirmed.spent => return Err(SkipReason::DoubleSpend(prevout)),
                Some(confirmed) => spent.push(confirmed.output),
                None => return Err(SkipReason::InputsUnavailable(prevout)),
            }
        }
        Ok(spent)
    }
}

fn exclude(selection: &mut Selection, txid: Hash256, reason: SkipReason) {
    debug!(txid = %txid.short(), %reason, "Skipping transaction");
    selection.excluded.push(Exclusion { txid, reason });
}
