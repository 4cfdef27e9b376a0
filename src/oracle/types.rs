use crate::types::address::Address;
use crate::types::hash::Hash;
use nexus_derive::BinaryCodec;
use num_bigint::BigInt;

/// Cached oracle answer, keyed by the exact request URL.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct OracleEntry {
    pub url: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct InteropTransfer {
    pub source_chain: String,
    pub source_address: Address,
    pub dest_chain: String,
    pub dest_address: Address,
    pub interop_address: Address,
    pub symbol: String,
    pub value: BigInt,
    /// Packed NFT data for non-fungible transfers.
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct InteropTransaction {
    pub hash: Hash,
    pub transfers: Vec<InteropTransfer>,
}

impl InteropTransaction {
    /// Answer for a lookup that legitimately found nothing.
    pub fn not_found() -> Self {
        Self {
            hash: Hash::NULL,
            transfers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct InteropBlock {
    pub platform: String,
    pub chain: String,
    pub hash: Hash,
    pub transactions: Vec<Hash>,
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct InteropNFT {
    pub name: String,
    pub description: String,
    pub url: String,
}
