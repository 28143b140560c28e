// Copyright (c) 2024 Gridstake Developers

//! Gridstake: the block-assembly and staking engine of a proof-of-stake
//! node that also mints research rewards.
//!
//! The engine runs as a single background task. Each attempt selects pool
//! transactions, searches the wallet's coins for a stake kernel, computes
//! and distributes the reward, then signs the block and hands it to the
//! acceptance pipeline. Chain storage, the pool, the wallet and the research
//! tally are consumed through the traits in [`chain`], [`mempool`],
//! [`wallet`] and [`research`].

#![deny(clippy::print_stdout)]

pub mod address;
pub mod block;
pub mod chain;
pub mod claim;
pub mod commands;
pub mod config;
pub mod hash;
pub mod mempool;
pub mod monetary;
pub mod node;
pub mod research;
pub mod script;
pub mod staking;
pub mod telemetry;
pub mod transaction;
pub mod wallet;
