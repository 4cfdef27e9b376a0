use crate::oracle::types::{InteropBlock, InteropNFT, InteropTransaction};
use crate::oracle::OracleError;
use crate::types::hash::Hash;
use crate::types::timestamp::Timestamp;
use dashmap::DashMap;
use num_bigint::BigInt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Where oracle answers come from. Implementations talk to price feeds and
/// foreign chains; the engine only sees this interface.
pub trait OracleSource: Send + Sync {
    fn pull_data(&self, time: Timestamp, url: &str) -> Result<Vec<u8>, OracleError>;

    /// Price of `symbol` in the fiat token, at fiat decimals.
    fn pull_price(&self, time: Timestamp, symbol: &str) -> Result<BigInt, OracleError>;

    fn pull_fee(&self, time: Timestamp, platform: &str) -> Result<BigInt, OracleError>;

    fn pull_platform_block(&self, platform: &str, chain: &str, hash: &Hash) -> Result<InteropBlock, OracleError>;

    fn pull_platform_block_at(&self, platform: &str, chain: &str, height: &BigInt) -> Result<InteropBlock, OracleError>;

    /// `None` when the transaction is not known to the platform.
    fn pull_platform_transaction(
        &self,
        platform: &str,
        chain: &str,
        hash: &Hash,
    ) -> Result<Option<InteropTransaction>, OracleError>;

    fn pull_platform_nft(&self, platform: &str, symbol: &str, id: &BigInt) -> Result<InteropNFT, OracleError>;
}

/// In-process source answering from preloaded tables. Counts every pull so
/// callers can observe caching.
#[derive(Debug, Default)]
pub struct StaticOracleSource {
    prices: DashMap<String, BigInt>,
    fees: DashMap<String, BigInt>,
    data: DashMap<String, Vec<u8>>,
    blocks: DashMap<Hash, InteropBlock>,
    transactions: DashMap<Hash, InteropTransaction>,
    nfts: DashMap<(String, BigInt), InteropNFT>,
    pulls: AtomicUsize,
}

impl StaticOracleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, symbol: &str, price: BigInt) {
        self.prices.insert(symbol.to_string(), price);
    }

    pub fn set_fee(&self, platform: &str, fee: BigInt) {
        self.fees.insert(platform.to_string(), fee);
    }

    pub fn set_data(&self, url: &str, content: Vec<u8>) {
        self.data.insert(url.to_string(), content);
    }

    pub fn add_block(&self, block: InteropBlock) {
        self.blocks.insert(block.hash, block);
    }

    pub fn add_transaction(&self, tx: InteropTransaction) {
        self.transactions.insert(tx.hash, tx);
    }

    pub fn add_nft(&self, symbol: &str, id: BigInt, nft: InteropNFT) {
        self.nfts.insert((symbol.to_string(), id), nft);
    }

    /// Number of pulls served so far.
    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::Relaxed)
    }

    fn count(&self) {
        self.pulls.fetch_add(1, Ordering::Relaxed);
    }
}

impl OracleSource for StaticOracleSource {
    fn pull_data(&self, _time: Timestamp, url: &str) -> Result<Vec<u8>, OracleError> {
        self.count();
        self.data
            .get(url)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OracleError::Source(format!("no data for {url}")))
    }

    fn pull_price(&self, _time: Timestamp, symbol: &str) -> Result<BigInt, OracleError> {
        self.count();
        self.prices
            .get(symbol)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OracleError::Source(format!("no price for {symbol}")))
    }

    fn pull_fee(&self, _time: Timestamp, platform: &str) -> Result<BigInt, OracleError> {
        self.count();
        self.fees
            .get(platform)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OracleError::Source(format!("no fee for {platform}")))
    }

    fn pull_platform_block(&self, platform: &str, chain: &str, hash: &Hash) -> Result<InteropBlock, OracleError> {
        self.count();
        self.blocks
            .get(hash)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OracleError::InvalidBlockHash {
                chain: chain.to_string(),
                platform: platform.to_string(),
            })
    }

    fn pull_platform_block_at(&self, platform: &str, chain: &str, _height: &BigInt) -> Result<InteropBlock, OracleError> {
        self.count();
        Ok(InteropBlock {
            platform: platform.to_string(),
            chain: chain.to_string(),
            hash: Hash::NULL,
            transactions: Vec::new(),
        })
    }

    fn pull_platform_transaction(
        &self,
        _platform: &str,
        _chain: &str,
        hash: &Hash,
    ) -> Result<Option<InteropTransaction>, OracleError> {
        self.count();
        Ok(self.transactions.get(hash).map(|entry| entry.value().clone()))
    }

    fn pull_platform_nft(&self, _platform: &str, symbol: &str, id: &BigInt) -> Result<InteropNFT, OracleError> {
        self.count();
        self.nfts
            .get(&(symbol.to_string(), id.clone()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OracleError::Source(format!("no nft {symbol} #{id}")))
    }
}
