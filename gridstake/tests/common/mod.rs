// Copyright (c) 2024 Gridstake Developers
//
//! In-memory collaborators for integration tests.
//!
//! The fixtures stand in for the chain index, wallet, research tally,
//! quorum scraper, peer set and acceptance pipeline, so tests can drive the
//! staking engine end to end without a node.
//!
//! ```ignore
//! let mut chain = MockChain::new(100, 1_600_000_000);
//! let coin = chain.fund(&key(1), 1_000 * COIN, 50);
//! let wallet = MockWallet::new(vec![key(1)]).with_coin(coin);
//! ```

#![allow(dead_code)]

mod chain;
mod research;
mod wallet;

pub use chain::*;
pub use research::*;
pub use wallet::*;

use gridstake::script::PublicKey;

/// Bits whose weighted target saturates, so every coin finds a kernel.
pub const EASY_BITS: u32 = 0x2100_ffff;

/// Bits with a target of one, so no coin finds a kernel.
pub const IMPOSSIBLE_BITS: u32 = 0x0300_0001;

/// Deterministic compressed-looking public key.
pub fn key(seed: u8) -> PublicKey {
    let mut bytes = vec![0x02];
    bytes.extend_from_slice(&[seed; 32]);
    PublicKey::from_bytes(bytes)
}
