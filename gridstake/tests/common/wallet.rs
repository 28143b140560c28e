// Copyright (c) 2024 Gridstake Developers

use std::collections::HashMap;

use gridstake::address::{Address, Network};
use gridstake::hash::Hash256;
use gridstake::script::{KeyId, PublicKey};
use gridstake::transaction::{Transaction, TxOut};
use gridstake::wallet::{StakeCandidate, StakingWallet, WalletError};

pub struct MockWallet {
    pub locked: bool,
    pub keys: HashMap<KeyId, PublicKey>,
    pub coins: Vec<StakeCandidate>,
    /// Returned by coin selection instead of the coins.
    pub selection_error: Option<String>,
    /// Coinstake inputs fail to sign as if the wallet locked mid-attempt.
    pub fail_input_signing: bool,
    pub fail_header_signing: bool,
    pub network: Network,
}

impl MockWallet {
    pub fn new(keys: Vec<PublicKey>) -> Self {
        Self {
            locked: false,
            keys: keys.into_iter().map(|k| (k.key_id(), k)).collect(),
            coins: Vec::new(),
            selection_error: None,
            fail_input_signing: false,
            fail_header_signing: false,
            network: Network::Testnet,
        }
    }

    pub fn with_coin(mut self, tx: Transaction) -> Self {
        self.coins.push(StakeCandidate { tx, output_index: 0 });
        self
    }

    /// Signature the mock produces over `digest` with `key`.
    pub fn signature(key: &PublicKey, digest: &Hash256) -> Vec<u8> {
        let mut signature = digest.as_bytes().to_vec();
        signature.extend_from_slice(key.as_bytes());
        signature
    }
}

impl StakingWallet for MockWallet {
    fn is_locked(&self) -> bool {
        self.locked
    }

    fn select_coins_for_staking(&self, _time: i64) -> Result<Vec<StakeCandidate>, String> {
        match &self.selection_error {
            Some(reason) => Err(reason.clone()),
            None => Ok(self.coins.clone()),
        }
    }

    fn public_key(&self, key_id: &KeyId) -> Option<PublicKey> {
        self.keys.get(key_id).cloned()
    }

    fn sign_input(&self, tx: &mut Transaction, index: usize, _spent: &TxOut) -> Result<(), WalletError> {
        if self.locked || self.fail_input_signing {
            return Err(WalletError::Locked);
        }
        let input = tx.inputs.get_mut(index).ok_or_else(|| WalletError::InputSigning {
            index,
            reason: "no such input".to_string(),
        })?;
        input.unlocking = b"signed".to_vec();
        Ok(())
    }

    fn sign_digest(&self, key: &PublicKey, digest: &Hash256) -> Result<Vec<u8>, WalletError> {
        if self.locked {
            return Err(WalletError::Locked);
        }
        if self.fail_header_signing {
            return Err(WalletError::Signing("hardware key unavailable".to_string()));
        }
        if !self.keys.contains_key(&key.key_id()) {
            return Err(WalletError::MissingKey(key.key_id()));
        }
        Ok(Self::signature(key, digest))
    }

    fn default_address(&self) -> Option<Address> {
        self.keys
            .keys()
            .min()
            .map(|key_id| Address::from_key_id(*key_id, self.network))
    }
}
