// Copyright (c) 2024 Gridstake Developers

//! Base58check addresses.
//!
//! An address is a version byte followed by a 20-byte key or script
//! identifier, encoded with a four byte double-SHA256 checksum:
//!
//! | network | pay-to-key-hash | pay-to-script-hash |
//! |---------|-----------------|--------------------|
//! | mainnet | 62              | 85                 |
//! | testnet | 111             | 196                |
//!
//! Addresses are only valid on the network they were made for.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::script::{KeyId, LockingScript, ScriptId};

/// The chain an address, config or node belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
}

impl Network {
    pub fn is_production(self) -> bool {
        matches!(self, Network::Mainnet)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Network::Mainnet => "Mainnet",
            Network::Testnet => "Testnet",
        }
    }

    /// Directory name used under the data directory.
    pub fn dir_name(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    fn pubkey_version(self) -> u8 {
        match self {
            Network::Mainnet => 62,
            Network::Testnet => 111,
        }
    }

    fn script_version(self) -> u8 {
        match self {
            Network::Mainnet => 85,
            Network::Testnet => 196,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("invalid base58check encoding")]
    Encoding,
    #[error("unexpected payload length {0}")]
    Length(usize),
    #[error("version byte {version} is not valid on {network}")]
    WrongNetwork { version: u8, network: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    PubKeyHash(KeyId),
    ScriptHash(ScriptId),
}

/// A destination that can receive a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    pub network: Network,
    pub kind: AddressKind,
}

impl Address {
    pub fn from_key_id(key_id: KeyId, network: Network) -> Self {
        Self {
            network,
            kind: AddressKind::PubKeyHash(key_id),
        }
    }

    pub fn from_script_id(script_id: ScriptId, network: Network) -> Self {
        Self {
            network,
            kind: AddressKind::ScriptHash(script_id),
        }
    }

    /// Decode and validate an address for `network`.
    pub fn parse(s: &str, network: Network) -> Result<Self, AddressError> {
        let payload = bs58::decode(s.trim())
            .with_check(None)
            .into_vec()
            .map_err(|_| AddressError::Encoding)?;
        if payload.len() != 21 {
            return Err(AddressError::Length(payload.len()));
        }
        let version = payload[0];
        let mut id = [0u8; 20];
        id.copy_from_slice(&payload[1..]);

        if version == network.pubkey_version() {
            Ok(Self::from_key_id(KeyId(id), network))
        } else if version == network.script_version() {
            Ok(Self::from_script_id(ScriptId(id), network))
        } else {
            Err(AddressError::WrongNetwork {
                version,
                network: network.display_name(),
            })
        }
    }

    /// The script that pays to this address.
    pub fn locking_script(&self) -> LockingScript {
        match self.kind {
            AddressKind::PubKeyHash(key_id) => LockingScript::PubKeyHash(key_id),
            AddressKind::ScriptHash(script_id) => LockingScript::ScriptHash(script_id),
        }
    }

    /// Recover the address a standard script pays to, if any.
    pub fn from_script(script: &LockingScript, network: Network) -> Option<Self> {
        match script {
            LockingScript::PubKeyHash(key_id) => Some(Self::from_key_id(*key_id, network)),
            LockingScript::PubKey(key) => Some(Self::from_key_id(key.key_id(), network)),
            LockingScript::ScriptHash(script_id) => Some(Self::from_script_id(*script_id, network)),
            _ => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut payload = Vec::with_capacity(21);
        match self.kind {
            AddressKind::PubKeyHash(KeyId(id)) => {
                payload.push(self.network.pubkey_version());
                payload.extend_from_slice(&id);
            }
            AddressKind::ScriptHash(ScriptId(id)) => {
                payload.push(self.network.script_version());
                payload.extend_from_slice(&id);
            }
        }
        write!(f, "{}", bs58::encode(payload).with_check().into_string())
    }
}
