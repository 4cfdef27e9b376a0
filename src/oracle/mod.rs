//! External data requested by scripts through `Oracle.Read`.
//!
//! URL schemes:
//! - `price://SYMBOL`: fiat quote at fiat decimals
//! - `fee://PLATFORM`: network fee estimate
//! - `interop://PLATFORM/CHAIN/tx/HASH` and `.../block/HASH_OR_HEIGHT`
//! - `interop://PLATFORM/nft/SYMBOL/ID`
//! - anything else is handed to [`OracleSource::pull_data`]
//!
//! Answers are cached per transaction and promoted to the global cache
//! when the transaction commits.

pub mod reader;
pub mod source;
pub mod types;

use crate::types::encoding::DecodeError;
use crate::types::hash::Hash;
use nexus_derive::Error;
use num_bigint::BigInt;

pub use reader::OracleReader;
pub use source::{OracleSource, StaticOracleSource};
pub use types::{InteropBlock, InteropNFT, InteropTransaction, InteropTransfer, OracleEntry};

pub const INTEROP_TAG: &str = "interop://";
pub const PRICE_TAG: &str = "price://";
pub const FEE_TAG: &str = "fee://";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("invalid oracle platform: {0}")]
    InvalidPlatform(String),
    #[error("missing oracle input")]
    MissingInput,
    #[error("unknown platform oracle")]
    UnknownCommand,
    #[error("invalid transaction hash for chain {chain} @ {platform}")]
    InvalidTransactionHash { chain: String, platform: String },
    #[error("invalid block hash for chain {chain} @ {platform}")]
    InvalidBlockHash { chain: String, platform: String },
    #[error("invalid nft id: {0}")]
    InvalidNftId(String),
    #[error("invalid oracle price request")]
    InvalidPriceRequest,
    #[error("unknown token: {0}")]
    UnknownToken(String),
    #[error("invalid oracle fee request")]
    InvalidFeeRequest,
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),
    /// The data source failed or had no answer.
    #[error("oracle source error: {0}")]
    Source(String),
    #[error("malformed oracle content: {0}")]
    Decode(#[from] DecodeError),
}

pub fn price_url(symbol: &str) -> String {
    format!("{PRICE_TAG}{symbol}")
}

pub fn fee_url(platform: &str) -> String {
    format!("{FEE_TAG}{platform}")
}

pub fn transaction_url(platform: &str, chain: &str, hash: &Hash) -> String {
    format!("{INTEROP_TAG}{platform}/{chain}/tx/{hash}")
}

pub fn block_url(platform: &str, chain: &str, hash: &Hash) -> String {
    format!("{INTEROP_TAG}{platform}/{chain}/block/{hash}")
}

pub fn nft_url(platform: &str, symbol: &str, id: &BigInt) -> String {
    format!("{INTEROP_TAG}{platform}/nft/{symbol}/{id}")
}
