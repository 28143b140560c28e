// Copyright (c) 2024 Gridstake Developers

//! Block assembly for proof-of-stake minting.
//!
//! One attempt runs the stages in order:
//! - [`selector`] fills the block with pool transactions
//! - [`kernel`] looks for a wallet coin allowed to stake it
//! - [`reward`] computes the base and research subsidy
//! - [`distributor`] pays side-stakes and splits the stake output
//! - [`quorum`] adds this node's superblock vote to the claim
//! - [`finalizer`] signs the claim, the coinstake and the block

pub mod distributor;
pub mod finalizer;
pub mod kernel;
pub mod quorum;
pub mod reward;
pub mod selector;

use thiserror::Error;

pub use distributor::{
    DistributionError, DistributionSummary, RewardDistributor, SideStake, SideStakePolicy, StakeSplitPolicy,
};
pub use finalizer::{finalize_block, SigningError};
pub use kernel::{search_kernel, KernelError, KernelSearch, SearchStats, StakeKernel};
pub use quorum::{add_quorum_vote, QuorumVote};
pub use reward::{apply_reward, calculate_reward, RewardBreakdown, RewardPolicy};
pub use selector::{BlockLimits, Selection, TransactionSelector};

/// Why a staking attempt ended without a submitted block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakingError {
    #[error("{0}")]
    NotAllowed(String),
    #[error(transparent)]
    Kernel(#[from] KernelError),
    #[error(transparent)]
    Distribution(#[from] DistributionError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("block rejected: {0}")]
    Rejected(String),
}

impl StakingError {
    /// Attempt failures are retried on the next interval.
    pub fn is_fatal(&self) -> bool {
        false
    }

    /// An ordinary miss rather than a fault.
    pub fn is_miss(&self) -> bool {
        matches!(
            self,
            StakingError::Kernel(KernelError::NotFound { .. } | KernelError::NoCandidates(_))
        )
    }
}

