//! 32-byte SHA3-256 digests.

use crate::types::encoding::EncodeSink;
use nexus_derive::BinaryCodec;
use sha3::{Digest, Sha3_256};
use std::fmt;

pub const HASH_LEN: usize = 32;

/// SHA3-256 digest. Copy-sized, used for transaction ids, context
/// addresses and interop lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BinaryCodec, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// The all-zero hash. Oracle lookups return it for "not found".
    pub const NULL: Hash = Hash([0u8; HASH_LEN]);

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn sha3() -> HashBuilder {
        HashBuilder::new()
    }

    /// Digest of a single byte slice.
    pub fn digest(data: &[u8]) -> Hash {
        let mut h = Self::sha3();
        h.update(data);
        h.finalize()
    }

    /// Builds a hash from exactly [`HASH_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Hash> {
        let array: [u8; HASH_LEN] = bytes.try_into().ok()?;
        Some(Hash(array))
    }

    /// Parses 64 hex characters, with or without a `0x` prefix.
    pub fn parse(text: &str) -> Option<Hash> {
        let text = text.strip_prefix("0x").unwrap_or(text);
        if text.len() != HASH_LEN * 2 {
            return None;
        }
        let bytes = hex::decode(text).ok()?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Incremental SHA3-256. Implements [`EncodeSink`] so encodable values can
/// be hashed without an intermediate buffer.
pub struct HashBuilder {
    hasher: Sha3_256,
}

impl HashBuilder {
    pub fn new() -> Self {
        Self {
            hasher: Sha3_256::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn chain(mut self, data: &[u8]) -> Self {
        self.update(data);
        self
    }

    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSink for HashBuilder {
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::Encode;

    #[test]
    fn builder_matches_one_shot_digest() {
        let chained = Hash::sha3().chain(b"ab").chain(b"c").finalize();
        assert_eq!(chained, Hash::digest(b"abc"));
    }

    #[test]
    fn encoding_into_builder_hashes_the_encoded_bytes() {
        let value = "name".to_string();
        let mut builder = Hash::sha3();
        value.encode(&mut builder);
        assert_eq!(builder.finalize(), Hash::digest(&value.to_bytes()));
    }

    #[test]
    fn parse_round_trips_display() {
        let h = Hash::digest(b"round trip");
        assert_eq!(Hash::parse(&h.to_string()), Some(h));
        assert_eq!(Hash::parse(&format!("0x{h}")), Some(h));
    }

    #[test]
    fn parse_rejects_wrong_length_and_garbage() {
        assert_eq!(Hash::parse("abcd"), None);
        assert_eq!(Hash::parse(&"zz".repeat(HASH_LEN)), None);
    }

    #[test]
    fn null_hash() {
        assert!(Hash::NULL.is_null());
        assert!(!Hash::digest(b"x").is_null());
    }
}
