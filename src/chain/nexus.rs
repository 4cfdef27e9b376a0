//! Chain-wide registries kept in contract storage.
//!
//! Every registry is a [`StorageMap`] under a `.nexus.` prefix, keyed by
//! name (or address for the dangerous-address list). Organization members
//! live in one map per organization.

use crate::chain::token::TokenInfo;
use crate::contract::abi::ContractInterface;
use crate::storage::context::StorageContext;
use crate::storage::map::StorageMap;
use crate::types::address::Address;
use crate::types::encoding::DecodeError;
use nexus_derive::{BinaryCodec, Error};

const TOKENS_PREFIX: &str = ".nexus.tokens";
const CHAINS_PREFIX: &str = ".nexus.chains";
const PLATFORMS_PREFIX: &str = ".nexus.platforms";
const FEEDS_PREFIX: &str = ".nexus.feeds";
const ORGANIZATIONS_PREFIX: &str = ".nexus.orgs";
const CONTRACTS_PREFIX: &str = ".nexus.contracts";
const DANGEROUS_PREFIX: &str = ".nexus.dangerous";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NexusError {
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: &'static str, name: String },
    #[error("unknown {kind}: {name}")]
    NotFound { kind: &'static str, name: String },
    #[error("corrupted registry entry: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct ChainInfo {
    pub name: String,
    /// Empty for the root chain.
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct PlatformInfo {
    pub name: String,
    pub fuel_symbol: String,
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct FeedInfo {
    pub name: String,
    pub owner: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct OrganizationInfo {
    pub id: String,
    pub name: String,
}

/// A user contract deployed on chain.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct DeployedContract {
    pub name: String,
    pub script: Vec<u8>,
    pub abi: ContractInterface,
}

/// Handle over the registries of one nexus.
#[derive(Debug, Clone)]
pub struct Nexus {
    name: String,
    tokens: StorageMap,
    chains: StorageMap,
    platforms: StorageMap,
    feeds: StorageMap,
    organizations: StorageMap,
    contracts: StorageMap,
    dangerous: StorageMap,
}

impl Nexus {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tokens: StorageMap::new(TOKENS_PREFIX),
            chains: StorageMap::new(CHAINS_PREFIX),
            platforms: StorageMap::new(PLATFORMS_PREFIX),
            feeds: StorageMap::new(FEEDS_PREFIX),
            organizations: StorageMap::new(ORGANIZATIONS_PREFIX),
            contracts: StorageMap::new(CONTRACTS_PREFIX),
            dangerous: StorageMap::new(DANGEROUS_PREFIX),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn members(&self, organization: &str) -> StorageMap {
        StorageMap::new(format!("{ORGANIZATIONS_PREFIX}.{organization}.members"))
    }

    // Tokens

    pub fn create_token(&self, storage: &mut dyn StorageContext, info: &TokenInfo) -> Result<(), NexusError> {
        if self.tokens.contains(storage, &info.symbol) {
            return Err(NexusError::AlreadyExists {
                kind: "token",
                name: info.symbol.clone(),
            });
        }
        self.tokens.set(storage, &info.symbol, info)?;
        Ok(())
    }

    pub fn token_exists(&self, storage: &dyn StorageContext, symbol: &str) -> bool {
        self.tokens.contains(storage, symbol)
    }

    pub fn get_token(&self, storage: &dyn StorageContext, symbol: &str) -> Result<TokenInfo, NexusError> {
        self.tokens
            .get(storage, symbol)?
            .ok_or_else(|| NexusError::NotFound {
                kind: "token",
                name: symbol.to_string(),
            })
    }

    /// Registered symbols in storage key order.
    pub fn token_symbols(&self, storage: &dyn StorageContext) -> Result<Vec<String>, NexusError> {
        Ok(self.tokens.keys(storage)?)
    }

    /// Hands every token owned by `from` over to `to`.
    pub fn migrate_token_owner(
        &self,
        storage: &mut dyn StorageContext,
        from: &Address,
        to: &Address,
    ) -> Result<usize, NexusError> {
        let mut moved = 0;
        for mut info in self.tokens.values::<TokenInfo>(storage)? {
            if info.owner == *from {
                info.owner = *to;
                self.tokens.set(storage, &info.symbol, &info)?;
                moved += 1;
            }
        }
        Ok(moved)
    }

    // Chains and platforms

    pub fn create_chain(&self, storage: &mut dyn StorageContext, name: &str, parent: &str) -> Result<(), NexusError> {
        if self.chains.contains(storage, name) {
            return Err(NexusError::AlreadyExists {
                kind: "chain",
                name: name.to_string(),
            });
        }
        let info = ChainInfo {
            name: name.to_string(),
            parent: parent.to_string(),
        };
        self.chains.set(storage, name, &info)?;
        Ok(())
    }

    pub fn chain_exists(&self, storage: &dyn StorageContext, name: &str) -> bool {
        self.chains.contains(storage, name)
    }

    pub fn create_platform(&self, storage: &mut dyn StorageContext, name: &str, fuel_symbol: &str) -> Result<(), NexusError> {
        if self.platforms.contains(storage, name) {
            return Err(NexusError::AlreadyExists {
                kind: "platform",
                name: name.to_string(),
            });
        }
        let info = PlatformInfo {
            name: name.to_string(),
            fuel_symbol: fuel_symbol.to_string(),
        };
        self.platforms.set(storage, name, &info)?;
        Ok(())
    }

    pub fn platform_exists(&self, storage: &dyn StorageContext, name: &str) -> bool {
        self.platforms.contains(storage, name)
    }

    // Feeds

    pub fn create_feed(&self, storage: &mut dyn StorageContext, name: &str, owner: &Address) -> Result<(), NexusError> {
        if self.feeds.contains(storage, name) {
            return Err(NexusError::AlreadyExists {
                kind: "feed",
                name: name.to_string(),
            });
        }
        let info = FeedInfo {
            name: name.to_string(),
            owner: *owner,
        };
        self.feeds.set(storage, name, &info)?;
        Ok(())
    }

    pub fn feed_exists(&self, storage: &dyn StorageContext, name: &str) -> bool {
        self.feeds.contains(storage, name)
    }

    // Organizations

    pub fn create_organization(&self, storage: &mut dyn StorageContext, id: &str, name: &str) -> Result<(), NexusError> {
        if self.organizations.contains(storage, id) {
            return Err(NexusError::AlreadyExists {
                kind: "organization",
                name: id.to_string(),
            });
        }
        let info = OrganizationInfo {
            id: id.to_string(),
            name: name.to_string(),
        };
        self.organizations.set(storage, id, &info)?;
        Ok(())
    }

    pub fn organization_exists(&self, storage: &dyn StorageContext, id: &str) -> bool {
        self.organizations.contains(storage, id)
    }

    pub fn organization_ids(&self, storage: &dyn StorageContext) -> Result<Vec<String>, NexusError> {
        Ok(self.organizations.keys(storage)?)
    }

    fn ensure_organization(&self, storage: &dyn StorageContext, id: &str) -> Result<(), NexusError> {
        if self.organization_exists(storage, id) {
            Ok(())
        } else {
            Err(NexusError::NotFound {
                kind: "organization",
                name: id.to_string(),
            })
        }
    }

    /// Returns `false` when `member` already belongs to the organization.
    pub fn add_member(&self, storage: &mut dyn StorageContext, id: &str, member: &Address) -> Result<bool, NexusError> {
        self.ensure_organization(storage, id)?;
        let members = self.members(id);
        if members.contains(storage, member) {
            return Ok(false);
        }
        members.set(storage, member, member)?;
        Ok(true)
    }

    pub fn is_member(&self, storage: &dyn StorageContext, id: &str, member: &Address) -> bool {
        self.members(id).contains(storage, member)
    }

    pub fn organization_members(&self, storage: &dyn StorageContext, id: &str) -> Result<Vec<Address>, NexusError> {
        Ok(self.members(id).values(storage)?)
    }

    /// Replaces `from` with `to` in the organization. Returns `false` when
    /// `from` was not a member or `to` already is one.
    pub fn migrate_member(
        &self,
        storage: &mut dyn StorageContext,
        id: &str,
        from: &Address,
        to: &Address,
    ) -> Result<bool, NexusError> {
        self.ensure_organization(storage, id)?;
        let members = self.members(id);
        if !members.contains(storage, from) || members.contains(storage, to) {
            return Ok(false);
        }
        members.remove(storage, from)?;
        members.set(storage, to, to)?;
        Ok(true)
    }

    // Deployed contracts

    pub fn deploy_contract(&self, storage: &mut dyn StorageContext, contract: &DeployedContract) -> Result<(), NexusError> {
        if self.contracts.contains(storage, &contract.name) {
            return Err(NexusError::AlreadyExists {
                kind: "contract",
                name: contract.name.clone(),
            });
        }
        self.contracts.set(storage, &contract.name, contract)?;
        Ok(())
    }

    pub fn contract_exists(&self, storage: &dyn StorageContext, name: &str) -> bool {
        self.contracts.contains(storage, name)
    }

    pub fn get_contract(&self, storage: &dyn StorageContext, name: &str) -> Result<Option<DeployedContract>, NexusError> {
        Ok(self.contracts.get(storage, name)?)
    }

    pub fn contracts(&self, storage: &dyn StorageContext) -> Result<Vec<DeployedContract>, NexusError> {
        Ok(self.contracts.values(storage)?)
    }

    // Dangerous addresses

    pub fn is_dangerous_address(&self, storage: &dyn StorageContext, address: &Address) -> bool {
        self.dangerous.contains(storage, address)
    }

    pub fn set_dangerous_address(
        &self,
        storage: &mut dyn StorageContext,
        address: &Address,
        dangerous: bool,
    ) -> Result<(), NexusError> {
        if dangerous {
            self.dangerous.set(storage, address, &true)?;
        } else {
            self.dangerous.remove(storage, address)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::token::TokenFlags;
    use crate::storage::context::MemoryStorage;
    use crate::utils::test_utils::utils::user_address;

    #[test]
    fn tokens_are_unique_and_listed() {
        let nexus = Nexus::new("nexus");
        let mut storage = MemoryStorage::new();
        let fuel = TokenInfo::new("FUEL", "Fuel", user_address(1), 10, TokenFlags::FUNGIBLE);
        nexus.create_token(&mut storage, &fuel).unwrap();
        assert!(matches!(
            nexus.create_token(&mut storage, &fuel),
            Err(NexusError::AlreadyExists { kind: "token", .. })
        ));
        assert!(nexus.token_exists(&storage, "FUEL"));
        assert_eq!(nexus.get_token(&storage, "FUEL").unwrap(), fuel);
        assert!(matches!(nexus.get_token(&storage, "CORE"), Err(NexusError::NotFound { .. })));
        assert_eq!(nexus.token_symbols(&storage).unwrap(), vec!["FUEL".to_string()]);
    }

    #[test]
    fn token_ownership_migrates() {
        let nexus = Nexus::new("nexus");
        let mut storage = MemoryStorage::new();
        let (alice, bob) = (user_address(1), user_address(2));
        nexus
            .create_token(&mut storage, &TokenInfo::new("A", "A", alice, 0, TokenFlags::NONE))
            .unwrap();
        nexus
            .create_token(&mut storage, &TokenInfo::new("B", "B", bob, 0, TokenFlags::NONE))
            .unwrap();
        assert_eq!(nexus.migrate_token_owner(&mut storage, &alice, &bob).unwrap(), 1);
        assert_eq!(nexus.get_token(&storage, "A").unwrap().owner, bob);
    }

    #[test]
    fn organization_membership_moves() {
        let nexus = Nexus::new("nexus");
        let mut storage = MemoryStorage::new();
        let (alice, bob) = (user_address(1), user_address(2));
        assert!(nexus.add_member(&mut storage, "validators", &alice).is_err());

        nexus.create_organization(&mut storage, "validators", "Validators").unwrap();
        assert!(nexus.add_member(&mut storage, "validators", &alice).unwrap());
        assert!(!nexus.add_member(&mut storage, "validators", &alice).unwrap());

        assert!(nexus.migrate_member(&mut storage, "validators", &alice, &bob).unwrap());
        assert!(!nexus.is_member(&storage, "validators", &alice));
        assert!(nexus.is_member(&storage, "validators", &bob));
        assert!(!nexus.migrate_member(&mut storage, "validators", &alice, &bob).unwrap());
        assert_eq!(nexus.organization_ids(&storage).unwrap(), vec!["validators".to_string()]);
    }

    #[test]
    fn registries_are_independent() {
        let nexus = Nexus::new("nexus");
        let mut storage = MemoryStorage::new();
        nexus.create_chain(&mut storage, "main", "").unwrap();
        nexus.create_platform(&mut storage, "neo", "GAS").unwrap();
        nexus.create_feed(&mut storage, "weather", &user_address(3)).unwrap();
        assert!(nexus.chain_exists(&storage, "main"));
        assert!(!nexus.platform_exists(&storage, "main"));
        assert!(nexus.platform_exists(&storage, "neo"));
        assert!(nexus.feed_exists(&storage, "weather"));
        assert!(!nexus.contract_exists(&storage, "weather"));
    }

    #[test]
    fn dangerous_flag_toggles() {
        let nexus = Nexus::new("nexus");
        let mut storage = MemoryStorage::new();
        let address = user_address(9);
        nexus.set_dangerous_address(&mut storage, &address, true).unwrap();
        assert!(nexus.is_dangerous_address(&storage, &address));
        nexus.set_dangerous_address(&mut storage, &address, false).unwrap();
        assert!(!nexus.is_dangerous_address(&storage, &address));
    }

    #[test]
    fn contracts_round_trip() {
        let nexus = Nexus::new("nexus");
        let mut storage = MemoryStorage::new();
        let contract = DeployedContract {
            name: "bank".into(),
            script: vec![0, 1, 2],
            abi: ContractInterface::empty(),
        };
        nexus.deploy_contract(&mut storage, &contract).unwrap();
        assert_eq!(nexus.get_contract(&storage, "bank").unwrap(), Some(contract.clone()));
        assert_eq!(nexus.contracts(&storage).unwrap(), vec![contract]);
    }
}
