// Copyright (c) 2024 Gridstake Developers

//! Locking scripts.
//!
//! Only the standard forms the engine needs to reason about are modelled
//! structurally. Anything else is carried as raw bytes.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hash::hash160;

/// Signature operations charged for a bare multisig output by the legacy
/// counting rule, regardless of its actual key count.
pub const MULTISIG_LEGACY_SIGOPS: usize = 20;

const OP_CHECKSIG: u8 = 0xac;
const OP_CHECKSIGVERIFY: u8 = 0xad;
const OP_CHECKMULTISIG: u8 = 0xae;
const OP_CHECKMULTISIGVERIFY: u8 = 0xaf;

/// Hash160 of a public key.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KeyId(pub [u8; 20]);

/// Hash160 of a redeem script.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScriptId(pub [u8; 20]);

impl fmt::Debug for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyId({})", hex::encode(self.0))
    }
}

impl fmt::Debug for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptId({})", hex::encode(self.0))
    }
}

/// A serialized secp256k1 public key (compressed or uncompressed).
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        PublicKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn key_id(&self) -> KeyId {
        KeyId(hash160(&self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(&self.0))
    }
}

/// The condition that must be satisfied to spend an output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockingScript {
    /// Empty script. Used for the coinstake marker output.
    #[default]
    Empty,
    /// `<pubkey> CHECKSIG`
    PubKey(PublicKey),
    /// `DUP HASH160 <key id> EQUALVERIFY CHECKSIG`
    PubKeyHash(KeyId),
    /// `HASH160 <script id> EQUAL`
    ScriptHash(ScriptId),
    /// `<m> <pubkey>... <n> CHECKMULTISIG`
    MultiSig { required: u8, keys: Vec<PublicKey> },
    /// `RETURN <data>`
    NullData(Vec<u8>),
    /// Any other script, kept verbatim.
    NonStandard(Vec<u8>),
}

impl LockingScript {
    pub fn is_empty(&self) -> bool {
        matches!(self, LockingScript::Empty)
    }

    /// Short name of the script form, for logs and skip reasons.
    pub fn kind_name(&self) -> &'static str {
        match self {
            LockingScript::Empty => "empty",
            LockingScript::PubKey(_) => "pubkey",
            LockingScript::PubKeyHash(_) => "pubkeyhash",
            LockingScript::ScriptHash(_) => "scripthash",
            LockingScript::MultiSig { .. } => "multisig",
            LockingScript::NullData(_) => "nulldata",
            LockingScript::NonStandard(_) => "nonstandard",
        }
    }

    /// Signature operations under the legacy counting rule.
    pub fn legacy_sigops(&self) -> usize {
        match self {
            LockingScript::Empty
            | LockingScript::ScriptHash(_)
            | LockingScript::NullData(_) => 0,
            LockingScript::PubKey(_) | LockingScript::PubKeyHash(_) => 1,
            LockingScript::MultiSig { .. } => MULTISIG_LEGACY_SIGOPS,
            LockingScript::NonStandard(bytes) => bytes
                .iter()
                .map(|op| match *op {
                    OP_CHECKSIG | OP_CHECKSIGVERIFY => 1,
                    OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => MULTISIG_LEGACY_SIGOPS,
                    _ => 0,
                })
                .sum(),
        }
    }

    /// Signature operations when the exact key count is known, as it is for
    /// a redeem script revealed by a pay-to-script-hash spend.
    pub fn accurate_sigops(&self) -> usize {
        match self {
            LockingScript::MultiSig { keys, .. } => keys.len(),
            other => other.legacy_sigops(),
        }
    }

    pub fn script_id(&self) -> ScriptId {
        let encoded = bincode::serialize(self).unwrap_or_default();
        ScriptId(hash160(encoded))
    }
}
