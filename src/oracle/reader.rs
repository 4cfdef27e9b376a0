use crate::chain::nexus::Nexus;
use crate::config::DomainSettings;
use crate::oracle::source::OracleSource;
use crate::oracle::types::{InteropBlock, InteropNFT, InteropTransaction, OracleEntry};
use crate::oracle::{block_url, nft_url, price_url, transaction_url, OracleError, FEE_TAG, INTEROP_TAG, PRICE_TAG};
use crate::storage::context::StorageContext;
use crate::types::encoding::{Decode, Encode};
use crate::types::hash::Hash;
use crate::types::timestamp::Timestamp;
use dashmap::DashMap;
use num_bigint::BigInt;
use std::sync::Arc;

/// Caching front of an [`OracleSource`].
///
/// `tx_entries` holds answers fetched by the running transaction and is
/// only promoted into `entries` by [`merge_tx_data`](Self::merge_tx_data).
/// Lookups check the transaction cache, then the global cache, each read
/// on its own; no lock spans both maps.
///
/// A reader serves one transaction at a time. `tx_entries` is not keyed by
/// transaction, so a merge or discard from one run (a gas estimate, say)
/// acts on every pending entry. Runs that overlap need a reader each,
/// sharing the [`OracleSource`].
pub struct OracleReader {
    entries: DashMap<String, Vec<u8>>,
    tx_entries: DashMap<String, Vec<u8>>,
    source: Arc<dyn OracleSource>,
}

impl OracleReader {
    pub fn new(source: Arc<dyn OracleSource>) -> Self {
        Self {
            entries: DashMap::new(),
            tx_entries: DashMap::new(),
            source,
        }
    }

    fn cached(&self, url: &str) -> Option<Vec<u8>> {
        if let Some(entry) = self.tx_entries.get(url) {
            return Some(entry.value().clone());
        }
        self.entries.get(url).map(|entry| entry.value().clone())
    }

    fn cache(&self, url: &str, content: &[u8]) {
        self.tx_entries.insert(url.to_string(), content.to_vec());
    }

    /// Answers `url`, pulling from the source on a cache miss.
    ///
    /// Platform and token names are checked against `nexus` as seen
    /// through `storage`.
    pub fn read(
        &self,
        nexus: &Nexus,
        storage: &dyn StorageContext,
        time: Timestamp,
        url: &str,
    ) -> Result<Vec<u8>, OracleError> {
        if let Some(content) = self.cached(url) {
            return Ok(content);
        }

        crate::debug!("oracle pull {url}");
        let content = if let Some(tags) = url.strip_prefix(INTEROP_TAG) {
            match self.read_interop(nexus, storage, tags)? {
                Answer::Cacheable(content) => content,
                Answer::NotFound(content) => return Ok(content),
            }
        } else if let Some(symbol) = url.strip_prefix(PRICE_TAG) {
            self.read_price_tag(nexus, storage, time, symbol)?.to_signed_bytes_le()
        } else if let Some(platform) = url.strip_prefix(FEE_TAG) {
            if platform.contains('/') {
                return Err(OracleError::InvalidFeeRequest);
            }
            if !nexus.platform_exists(storage, platform) {
                return Err(OracleError::UnknownPlatform(platform.to_string()));
            }
            self.source.pull_fee(time, platform)?.to_signed_bytes_le()
        } else {
            self.source.pull_data(time, url)?
        };

        self.cache(url, &content);
        Ok(content)
    }

    fn read_price_tag(
        &self,
        nexus: &Nexus,
        storage: &dyn StorageContext,
        time: Timestamp,
        symbol: &str,
    ) -> Result<BigInt, OracleError> {
        if symbol.contains('/') {
            return Err(OracleError::InvalidPriceRequest);
        }
        if !nexus.token_exists(storage, symbol) {
            return Err(OracleError::UnknownToken(symbol.to_string()));
        }
        if symbol != DomainSettings::FUEL_TOKEN_SYMBOL {
            return self.source.pull_price(time, symbol);
        }

        // Fuel is priced off the staking token.
        let staking_url = price_url(DomainSettings::STAKING_TOKEN_SYMBOL);
        let staking_price = match self.cached(&staking_url) {
            Some(bytes) => BigInt::from_signed_bytes_le(&bytes),
            None => {
                let price = self.source.pull_price(time, DomainSettings::STAKING_TOKEN_SYMBOL)?;
                self.cache(&staking_url, &price.to_signed_bytes_le());
                price
            }
        };
        Ok(staking_price / DomainSettings::FUEL_PRICE_DIVISOR)
    }

    fn read_interop(&self, nexus: &Nexus, storage: &dyn StorageContext, tags: &str) -> Result<Answer, OracleError> {
        let args: Vec<&str> = tags.split('/').collect();
        if args.len() < 2 {
            return Err(OracleError::MissingInput);
        }
        let (platform, chain, input) = (args[0], args[1], &args[2..]);
        if !nexus.platform_exists(storage, platform) {
            return Err(OracleError::InvalidPlatform(platform.to_string()));
        }
        if input.len() != 2 {
            return Err(OracleError::MissingInput);
        }

        if chain == "nft" {
            let (symbol, raw_id) = (input[0], input[1]);
            let id: BigInt = raw_id
                .parse()
                .map_err(|_| OracleError::InvalidNftId(raw_id.to_string()))?;
            let nft = self.source.pull_platform_nft(platform, symbol, &id)?;
            return Ok(Answer::Cacheable(nft.to_bytes()));
        }

        match input[0].to_ascii_lowercase().as_str() {
            "tx" | "transaction" => {
                let hash = Hash::parse(input[1]).ok_or_else(|| OracleError::InvalidTransactionHash {
                    chain: chain.to_string(),
                    platform: platform.to_string(),
                })?;
                let tx = self
                    .source
                    .pull_platform_transaction(platform, chain, &hash)?
                    .unwrap_or_else(InteropTransaction::not_found);
                Ok(Answer::from_hash(tx.hash, tx.to_bytes()))
            }
            "block" => {
                let block = if let Some(hash) = Hash::parse(input[1]) {
                    self.source.pull_platform_block(platform, chain, &hash)?
                } else if let Ok(height) = input[1].parse::<BigInt>() {
                    self.source.pull_platform_block_at(platform, chain, &height)?
                } else {
                    return Err(OracleError::InvalidBlockHash {
                        chain: chain.to_string(),
                        platform: platform.to_string(),
                    });
                };
                Ok(Answer::from_hash(block.hash, block.to_bytes()))
            }
            _ => Err(OracleError::UnknownCommand),
        }
    }

    // Typed readers

    pub fn read_price(
        &self,
        nexus: &Nexus,
        storage: &dyn StorageContext,
        time: Timestamp,
        symbol: &str,
    ) -> Result<BigInt, OracleError> {
        let bytes = self.read(nexus, storage, time, &price_url(symbol))?;
        Ok(BigInt::from_signed_bytes_le(&bytes))
    }

    pub fn read_transaction(
        &self,
        nexus: &Nexus,
        storage: &dyn StorageContext,
        time: Timestamp,
        platform: &str,
        chain: &str,
        hash: &Hash,
    ) -> Result<InteropTransaction, OracleError> {
        let bytes = self.read(nexus, storage, time, &transaction_url(platform, chain, hash))?;
        Ok(InteropTransaction::from_bytes(&bytes)?)
    }

    pub fn read_block(
        &self,
        nexus: &Nexus,
        storage: &dyn StorageContext,
        time: Timestamp,
        platform: &str,
        chain: &str,
        hash: &Hash,
    ) -> Result<InteropBlock, OracleError> {
        let bytes = self.read(nexus, storage, time, &block_url(platform, chain, hash))?;
        Ok(InteropBlock::from_bytes(&bytes)?)
    }

    pub fn read_nft(
        &self,
        nexus: &Nexus,
        storage: &dyn StorageContext,
        time: Timestamp,
        platform: &str,
        symbol: &str,
        id: &BigInt,
    ) -> Result<InteropNFT, OracleError> {
        let bytes = self.read(nexus, storage, time, &nft_url(platform, symbol, id))?;
        Ok(InteropNFT::from_bytes(&bytes)?)
    }

    // Cache lifecycle

    /// Promotes the transaction cache into the global cache.
    pub fn merge_tx_data(&self) {
        let urls: Vec<String> = self.tx_entries.iter().map(|entry| entry.key().clone()).collect();
        for url in urls {
            if let Some((url, content)) = self.tx_entries.remove(&url) {
                self.entries.insert(url, content);
            }
        }
    }

    /// Drops everything fetched since the last merge, whichever run fetched it.
    pub fn discard_tx_data(&self) {
        self.tx_entries.clear();
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.tx_entries.clear();
    }

    /// Globally cached entries, ordered by URL.
    pub fn entries(&self) -> Vec<OracleEntry> {
        let mut entries: Vec<OracleEntry> = self
            .entries
            .iter()
            .map(|entry| OracleEntry {
                url: entry.key().clone(),
                content: entry.value().clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.url.cmp(&b.url));
        entries
    }

    pub fn tx_entry_count(&self) -> usize {
        self.tx_entries.len()
    }
}

enum Answer {
    Cacheable(Vec<u8>),
    /// Carries the null hash; returned to the caller but never cached.
    NotFound(Vec<u8>),
}

impl Answer {
    fn from_hash(hash: Hash, content: Vec<u8>) -> Answer {
        if hash.is_null() {
            Answer::NotFound(content)
        } else {
            Answer::Cacheable(content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::token::{TokenFlags, TokenInfo};
    use crate::oracle::source::StaticOracleSource;
    use crate::oracle::fee_url;
    use crate::storage::context::MemoryStorage;
    use crate::types::address::Address;
    use crate::utils::test_utils::utils::test_hash;

    fn setup() -> (Nexus, MemoryStorage, Arc<StaticOracleSource>, OracleReader) {
        let nexus = Nexus::new("nexus");
        let mut storage = MemoryStorage::new();
        for (symbol, decimals) in [("FUEL", 10), ("CORE", 8), ("USD", 8)] {
            let info = TokenInfo::new(symbol, symbol, Address::NULL, decimals, TokenFlags::FUNGIBLE);
            nexus.create_token(&mut storage, &info).unwrap();
        }
        nexus.create_platform(&mut storage, "nexus", "FUEL").unwrap();
        nexus.create_platform(&mut storage, "neo", "GAS").unwrap();

        let source = Arc::new(StaticOracleSource::new());
        source.set_price("CORE", BigInt::from(1_000_000_000u64));
        let reader = OracleReader::new(source.clone());
        (nexus, storage, source, reader)
    }

    #[test]
    fn fuel_price_is_a_fifth_of_staking_price() {
        let (nexus, storage, source, reader) = setup();
        let fuel = reader.read_price(&nexus, &storage, Timestamp(10), "FUEL").unwrap();
        assert_eq!(fuel, BigInt::from(200_000_000u64));
        assert_eq!(source.pulls(), 1);

        // The staking quote fetched on the way is cached under its own URL.
        let core = reader.read_price(&nexus, &storage, Timestamp(10), "CORE").unwrap();
        assert_eq!(core, BigInt::from(1_000_000_000u64));
        assert_eq!(source.pulls(), 1);
    }

    #[test]
    fn fuel_price_reuses_cached_staking_price() {
        let (nexus, storage, source, reader) = setup();
        reader.read_price(&nexus, &storage, Timestamp(10), "CORE").unwrap();
        source.set_price("CORE", BigInt::from(5));
        let fuel = reader.read_price(&nexus, &storage, Timestamp(10), "FUEL").unwrap();
        assert_eq!(fuel, BigInt::from(200_000_000u64));
        assert_eq!(source.pulls(), 1);
    }

    #[test]
    fn malformed_requests_are_errors() {
        let (nexus, storage, _, reader) = setup();
        let time = Timestamp(0);
        assert_eq!(
            reader.read(&nexus, &storage, time, "price://CORE/USD"),
            Err(OracleError::InvalidPriceRequest)
        );
        assert_eq!(
            reader.read(&nexus, &storage, time, "price://NOPE"),
            Err(OracleError::UnknownToken("NOPE".into()))
        );
        assert_eq!(reader.read(&nexus, &storage, time, "fee://neo/x"), Err(OracleError::InvalidFeeRequest));
        assert_eq!(
            reader.read(&nexus, &storage, time, &fee_url("eth")),
            Err(OracleError::UnknownPlatform("eth".into()))
        );
        assert_eq!(
            reader.read(&nexus, &storage, time, "interop://eth/main/tx/00"),
            Err(OracleError::InvalidPlatform("eth".into()))
        );
        assert_eq!(
            reader.read(&nexus, &storage, time, "interop://neo/main/tx"),
            Err(OracleError::MissingInput)
        );
        assert_eq!(
            reader.read(&nexus, &storage, time, "interop://neo/main/tx/zz"),
            Err(OracleError::InvalidTransactionHash {
                chain: "main".into(),
                platform: "neo".into()
            })
        );
        assert_eq!(
            reader.read(&nexus, &storage, time, "interop://neo/main/receipt/zz"),
            Err(OracleError::UnknownCommand)
        );
    }

    #[test]
    fn unknown_transaction_is_a_null_answer_and_not_cached() {
        let (nexus, storage, source, reader) = setup();
        let hash = test_hash(7);
        let tx = reader
            .read_transaction(&nexus, &storage, Timestamp(0), "neo", "main", &hash)
            .unwrap();
        assert!(tx.hash.is_null());
        assert_eq!(reader.tx_entry_count(), 0);

        source.add_transaction(InteropTransaction {
            hash,
            transfers: Vec::new(),
        });
        let tx = reader
            .read_transaction(&nexus, &storage, Timestamp(0), "neo", "main", &hash)
            .unwrap();
        assert_eq!(tx.hash, hash);
        assert_eq!(reader.tx_entry_count(), 1);
    }

    #[test]
    fn tx_cache_merges_on_commit_and_discards_on_failure() {
        let (nexus, storage, source, reader) = setup();
        reader.read_price(&nexus, &storage, Timestamp(0), "CORE").unwrap();
        reader.discard_tx_data();
        assert!(reader.entries().is_empty());

        reader.read_price(&nexus, &storage, Timestamp(0), "CORE").unwrap();
        assert_eq!(source.pulls(), 2);
        reader.merge_tx_data();
        assert_eq!(reader.tx_entry_count(), 0);
        assert_eq!(reader.entries().len(), 1);
        assert_eq!(reader.entries()[0].url, "price://CORE");

        reader.read_price(&nexus, &storage, Timestamp(0), "CORE").unwrap();
        assert_eq!(source.pulls(), 2);
        reader.clear();
        assert!(reader.entries().is_empty());
    }

    #[test]
    fn overlapping_runs_keep_pending_entries_apart_with_a_reader_each() {
        let (nexus, storage, source, committing) = setup();
        let estimating = OracleReader::new(source.clone());

        committing.read_price(&nexus, &storage, Timestamp(0), "CORE").unwrap();
        estimating.read_price(&nexus, &storage, Timestamp(0), "CORE").unwrap();
        estimating.discard_tx_data();
        assert_eq!(committing.tx_entry_count(), 1);

        committing.read_price(&nexus, &storage, Timestamp(0), "FUEL").unwrap();
        assert_eq!(committing.tx_entry_count(), 2);
        committing.discard_tx_data();
        assert_eq!(committing.tx_entry_count(), 0);
        assert_eq!(source.pulls(), 2);
    }

    #[test]
    fn generic_urls_go_to_pull_data() {
        let (nexus, storage, _, reader) = setup();
        let source = Arc::new(StaticOracleSource::new());
        source.set_data("https://example.org/x", vec![1, 2]);
        let reader2 = OracleReader::new(source);
        assert_eq!(
            reader2.read(&nexus, &storage, Timestamp(0), "https://example.org/x").unwrap(),
            vec![1, 2]
        );
        assert!(matches!(
            reader.read(&nexus, &storage, Timestamp(0), "https://example.org/x"),
            Err(OracleError::Source(_))
        ));
    }
}
