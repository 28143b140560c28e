// Copyright (c) 2024 Gridstake Developers

//! The background staking loop.
//!
//! [`StakeMiner`] owns one thread that runs a staking attempt, sleeps for
//! the configured interval and repeats until the shutdown flag is set. An
//! attempt holds the chain, pool and wallet locks (in that order) while it
//! assembles and signs a block, and releases them before submitting it.

pub mod metrics;
pub mod status;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::address::Network;
use crate::block::{Block, BlockHeader};
use crate::chain::{BlockSink, ChainIndex, NetworkState, SubmitOutcome};
use crate::claim::{MiningId, ResearchClaim};
use crate::hash::Hash256;
use crate::mempool::TxPool;
use crate::monetary::format_money;
use crate::research::{IdentityProvider, QuorumProvider};
use crate::staking::distributor::SPLIT_DIFFICULTY_BLOCKS;
use crate::staking::kernel::stake_time;
use crate::staking::{
    add_quorum_vote, apply_reward, calculate_reward, finalize_block, search_kernel, BlockLimits, RewardDistributor,
    RewardPolicy, SideStakePolicy, StakeSplitPolicy, StakingError, TransactionSelector,
};
use crate::transaction::Transaction;
use crate::wallet::StakingWallet;

pub use metrics::StakingMetrics;
pub use status::{MinerStatus, MinerStatusHandle};

/// Mainnet needs at least this many peers to stake.
pub const MIN_MAINNET_PEERS: usize = 3;

/// Granularity of shutdown checks while sleeping.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Client version string stamped into claims.
pub const CLIENT_VERSION: &str = concat!("gridstake-", env!("CARGO_PKG_VERSION"));

/// Stages of one staking attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakingStage {
    Idle,
    BuildingTemplate,
    SearchingKernel,
    Found,
    NotFound,
    Rewarding,
    Splitting,
    Signing,
    Submitting,
}

/// Staking policy resolved from configuration.
#[derive(Debug, Clone)]
pub struct MinerSettings {
    pub network: Network,
    pub sleep_interval: Duration,
    pub block_limits: BlockLimits,
    pub reward: RewardPolicy,
    pub side_stake: SideStakePolicy,
    pub stake_split: StakeSplitPolicy,
    pub organization: String,
}

impl Default for MinerSettings {
    fn default() -> Self {
        Self {
            network: Network::default(),
            sleep_interval: Duration::from_millis(8000),
            block_limits: BlockLimits::default(),
            reward: RewardPolicy::default(),
            side_stake: SideStakePolicy::default(),
            stake_split: StakeSplitPolicy::default(),
            organization: String::new(),
        }
    }
}

/// Everything a staking attempt reads or writes.
pub struct StakingContext<C, P, W> {
    pub chain: Arc<RwLock<C>>,
    pub pool: Arc<RwLock<P>>,
    pub wallet: Arc<Mutex<W>>,
    pub identity: Arc<dyn IdentityProvider>,
    pub quorum: Arc<dyn QuorumProvider>,
    pub network: Arc<dyn NetworkState>,
    pub sink: Arc<dyn BlockSink>,
    pub settings: MinerSettings,
    pub status: MinerStatusHandle,
    pub metrics: Arc<StakingMetrics>,
}

impl<C, P, W> StakingContext<C, P, W>
where
    C: ChainIndex,
    P: TxPool,
    W: StakingWallet,
{
    /// Reasons staking is not possible right now, empty when it is.
    pub fn mining_blockers(&self) -> Vec<&'static str> {
        let mut reasons = Vec::new();
        if self.wallet.lock().is_locked() {
            reasons.push("Wallet locked");
        }
        if !self.identity.network_averages_loaded() {
            reasons.push("Net averages not yet loaded");
        }
        let peers = self.network.connected_peers();
        let offline = peers == 0
            || (self.settings.network.is_production()
                && (self.network.is_initial_block_download() || peers < MIN_MAINNET_PEERS));
        if offline {
            reasons.push("Offline");
        }
        reasons
    }

    /// Run one attempt. Returns the submitted block's hash.
    pub fn run_attempt(&self) -> Result<Hash256, StakingError> {
        self.metrics.attempts.inc();

        let blockers = self.mining_blockers();
        if !blockers.is_empty() {
            self.status.update(|s| {
                s.clear();
                for reason in &blockers {
                    s.append_reason(reason);
                }
            });
            return Err(StakingError::NotAllowed(blockers.join("; ")));
        }

        let block = self.assemble_block()?;

        let hash = block.hash();
        stage(StakingStage::Submitting);
        self.status.update(|s| s.created_count += 1);
        self.metrics.blocks_created.inc();

        match self.sink.submit(&block) {
            SubmitOutcome::Accepted => {
                self.status.update(|s| s.accepted_count += 1);
                self.metrics.blocks_accepted.inc();
                info!(hash = %hash, reward = %format_money(block.claim.total_subsidy()), "Staked block accepted");
                Ok(hash)
            }
            SubmitOutcome::Rejected(reason) => {
                self.metrics.blocks_rejected.inc();
                warn!(hash = %hash, reason = %reason, "Staked block rejected");
                Err(StakingError::Rejected(reason))
            }
        }
    }

    /// Build, distribute and sign a block under the chain, pool and wallet
    /// locks.
    fn assemble_block(&self) -> Result<Block, StakingError> {
        let chain = self.chain.read();
        let pool = self.pool.read();
        let wallet = self.wallet.lock();

        stage(StakingStage::BuildingTemplate);
        let prev = chain.tip();
        let height = prev.height + 1;
        let v11 = chain.is_v11_enabled(height);
        let (block_version, claim_version) = if v11 {
            (11, ResearchClaim::CURRENT_VERSION)
        } else {
            (10, 1)
        };
        self.status.update(|s| {
            s.clear();
            s.version = block_version;
        });

        let time = stake_time(chain.adjusted_time(), prev.time);
        let bits = chain.next_target_bits(&prev);
        let selection = TransactionSelector::new(&*chain, &*pool, self.settings.block_limits).select(&prev, time);
        debug!(
            height,
            transactions = selection.transactions.len(),
            fees = %format_money(selection.fees),
            excluded = selection.excluded.len(),
            "Assembled block template"
        );

        stage(StakingStage::SearchingKernel);
        let search = search_kernel(&*chain, &*wallet, &prev, time, bits);
        self.metrics.record_search(&search.stats);
        let found = search.outcome.is_ok();
        self.status.update(|s| s.record_search(&search.stats, found));
        let kernel = match search.outcome {
            Ok(kernel) => kernel,
            Err(e) => {
                stage(StakingStage::NotFound);
                self.status.update(|s| s.append_reason(&e.to_string()));
                return Err(e.into());
            }
        };
        stage(StakingStage::Found);
        self.metrics.kernels_found.inc();

        stage(StakingStage::Rewarding);
        debug_assert_eq!(kernel.coinstake.time, time);
        let mut coinbase = Transaction::coinbase(height, time);
        coinbase.outputs[0].value = selection.fees;

        let mut block = Block::new(BlockHeader {
            version: block_version,
            prev_hash: prev.hash,
            time,
            bits,
            ..Default::default()
        });
        block.transactions.push(coinbase);
        block.transactions.push(kernel.coinstake);
        block.transactions.extend(selection.transactions);

        block.claim = ResearchClaim::new(claim_version);
        block.claim.set_client_version(CLIENT_VERSION);
        block.claim.set_organization(&self.settings.organization);

        let mining_id = match self.identity.mining_id() {
            MiningId::Researcher(cpid) if !self.identity.has_active_beacon(&cpid) => {
                debug!(cpid = %cpid, "No active beacon, staking as investor");
                MiningId::Investor
            }
            id => id,
        };
        let breakdown = calculate_reward(
            self.identity.as_ref(),
            &self.settings.reward,
            mining_id,
            block_version,
            kernel.coin_age,
            selection.fees,
            &prev,
        );
        let reward = apply_reward(&mut block, &breakdown, &prev);

        stage(StakingStage::Splitting);
        let distributor = RewardDistributor::new(
            &self.settings.side_stake,
            &self.settings.stake_split,
            self.settings.network,
        );
        if distributor.is_active() {
            let average_difficulty = chain.average_difficulty(SPLIT_DIFFICULTY_BLOCKS);
            let summary = distributor.distribute(&mut block.transactions[1], reward, block_version, time, average_difficulty)?;
            debug!(
                side_stakes = summary.side_stake_outputs,
                split_outputs = summary.split_outputs,
                allocated = %summary.allocated,
                "Distributed reward"
            );
        }

        let address = wallet.default_address();
        add_quorum_vote(self.quorum.as_ref(), &mut block.claim, address.as_ref(), prev.height, time);

        stage(StakingStage::Signing);
        let spent: Vec<_> = kernel.candidate.output().cloned().into_iter().collect();
        finalize_block(self.identity.as_ref(), &*wallet, &mut block, &spent, &kernel.stake_key).map_err(|e| {
            self.status.update(|s| s.append_reason(&e.to_string()));
            StakingError::from(e)
        })?;

        Ok(block)
    }
}

fn stage(stage: StakingStage) {
    debug!(stage = ?stage, "Staking stage");
}

/// Runs [`StakingContext::run_attempt`] on a background thread.
pub struct StakeMiner<C, P, W> {
    context: Arc<StakingContext<C, P, W>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl<C, P, W> StakeMiner<C, P, W>
where
    C: ChainIndex + 'static,
    P: TxPool + 'static,
    W: StakingWallet + 'static,
{
    pub fn new(context: StakingContext<C, P, W>, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            context: Arc::new(context),
            shutdown,
            handle: None,
        }
    }

    pub fn status(&self) -> MinerStatusHandle {
        self.context.status.clone()
    }

    pub fn metrics(&self) -> Arc<StakingMetrics> {
        self.context.metrics.clone()
    }

    pub fn start(&mut self) -> std::io::Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        let context = self.context.clone();
        let shutdown = self.shutdown.clone();
        let handle = thread::Builder::new()
            .name("stake-miner".to_string())
            .spawn(move || stake_loop(&context, &shutdown))?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Set the shutdown flag and wait for the current attempt to finish.
    ///
    /// Returns `false` if the staking thread panicked.
    pub fn stop(mut self) -> bool {
        self.shutdown.store(true, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return true;
        };
        match handle.join() {
            Ok(()) => true,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                error!(panic = %message, "Stake miner thread panicked");
                false
            }
        }
    }
}

fn stake_loop<C, P, W>(context: &StakingContext<C, P, W>, shutdown: &AtomicBool)
where
    C: ChainIndex,
    P: TxPool,
    W: StakingWallet,
{
    info!(interval_ms = context.settings.sleep_interval.as_millis() as u64, "Stake miner started");

    while !shutdown.load(Ordering::Relaxed) {
        match context.run_attempt() {
            Ok(hash) => info!(hash = %hash, "Staked block"),
            Err(e) if e.is_miss() => debug!(reason = %e, "No block staked"),
            Err(e) => warn!(reason = %e, "Staking attempt failed"),
        }
        stage(StakingStage::Idle);
        sleep_until_shutdown(context.settings.sleep_interval, shutdown);
    }

    info!("Stake miner stopped");
}

fn sleep_until_shutdown(interval: Duration, shutdown: &AtomicBool) {
    let mut remaining = interval;
    while !remaining.is_zero() && !shutdown.load(Ordering::Relaxed) {
        let slice = remaining.min(SLEEP_SLICE);
        thread::sleep(slice);
        remaining -= slice;
    }
}
