// Copyright (c) 2024 Gridstake Developers

//! The wallet capability consumed by the staking engine.
//!
//! Key storage, coin enumeration and signature schemes belong to the
//! wallet. The engine asks for stakeable coins, public keys and signatures
//! and never sees private key material.

use thiserror::Error;

use crate::address::Address;
use crate::hash::Hash256;
use crate::monetary::Amount;
use crate::script::{KeyId, PublicKey};
use crate::transaction::{OutPoint, Transaction, TxOut};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    #[error("wallet is locked")]
    Locked,
    #[error("no private key for {0:?}")]
    MissingKey(KeyId),
    #[error("cannot sign input {index}: {reason}")]
    InputSigning { index: usize, reason: String },
    #[error("signing failed: {0}")]
    Signing(String),
}

/// A wallet coin eligible to stake.
///
/// The wallet has already applied maturity and confirmation filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeCandidate {
    /// The transaction that created the coin.
    pub tx: Transaction,
    pub output_index: u32,
}

impl StakeCandidate {
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.tx.txid(), self.output_index)
    }

    pub fn output(&self) -> Option<&TxOut> {
        self.tx.outputs.get(self.output_index as usize)
    }

    pub fn value(&self) -> Amount {
        self.output().map(|o| o.value).unwrap_or(0)
    }
}

pub trait StakingWallet: Send + Sync {
    fn is_locked(&self) -> bool;

    /// Coins that may stake a block timestamped `time`, or the reason there
    /// are none.
    fn select_coins_for_staking(&self, time: i64) -> Result<Vec<StakeCandidate>, String>;

    /// Public key for a key id the wallet holds the private key of.
    fn public_key(&self, key_id: &KeyId) -> Option<PublicKey>;

    /// Fill in the unlocking data of input `index`, which spends `spent`.
    fn sign_input(&self, tx: &mut Transaction, index: usize, spent: &TxOut) -> Result<(), WalletError>;

    /// Sign a digest with the private key behind `key`.
    fn sign_digest(&self, key: &PublicKey, digest: &Hash256) -> Result<Vec<u8>, WalletError>;

    /// Address used for quorum participation.
    fn default_address(&self) -> Option<Address>;
}
