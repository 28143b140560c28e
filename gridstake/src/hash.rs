// Copyright (c) 2024 Gridstake Developers

//! Digest types shared by transactions, blocks and the stake kernel.

use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A double SHA-256 digest.
///
/// Stored in internal byte order; displayed reversed, the way block and
/// transaction identifiers are conventionally shown.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> String {
        let mut full = self.to_string();
        full.truncate(16);
        full
    }

    /// Parse the reversed hex display form.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let mut out: [u8; 32] = bytes.try_into().ok()?;
        out.reverse();
        Some(Hash256(out))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        write!(f, "{}", hex::encode(reversed))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self)
    }
}

/// Incremental double SHA-256, fed field by field.
#[derive(Clone, Default)]
pub struct HashWriter {
    inner: Sha256,
}

impl HashWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        self.inner.update(data);
        self
    }

    pub fn finalize(self) -> Hash256 {
        let first = self.inner.finalize();
        Hash256(Sha256::digest(first).into())
    }
}

/// Double SHA-256 of a byte string.
pub fn sha256d(data: impl AsRef<[u8]>) -> Hash256 {
    let mut writer = HashWriter::new();
    writer.update(data);
    writer.finalize()
}

/// RIPEMD-160 of SHA-256, used for key and script identifiers.
pub fn hash160(data: impl AsRef<[u8]>) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha);
    ripemd.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256d_known_vector() {
        // Double SHA-256 of the empty string.
        let digest = sha256d(b"");
        assert_eq!(
            hex::encode(digest.0),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn test_hash_writer_matches_concatenation() {
        let mut writer = HashWriter::new();
        writer.update(b"grid").update(b"coin");
        assert_eq!(writer.finalize(), sha256d(b"gridcoin"));
    }

    #[test]
    fn test_display_is_reversed_hex() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xab;
        let hash = Hash256(bytes);
        let shown = hash.to_string();
        assert!(shown.ends_with("ab"));
        assert_eq!(Hash256::from_hex(&shown), Some(hash));
        assert_eq!(hash.short().len(), 16);
    }

    #[test]
    fn test_hash160_length_and_determinism() {
        let a = hash160(b"key");
        let b = hash160(b"key");
        assert_eq!(a, b);
        assert_ne!(a, hash160(b"other"));
    }
}
