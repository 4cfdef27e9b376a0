use crate::chain::nexus::{DeployedContract, Nexus};
use crate::chain::token::TokenInfo;
use crate::config::DomainSettings;
use crate::contract::abi::{ContractInterface, ContractMethod};
use crate::contract::event::EventKind;
use crate::contract::trigger::TriggerResult;
use crate::storage::context::StorageContext;
use crate::storage::sheets::{BalanceSheet, OwnershipSheet};
use crate::types::address::Address;
use crate::types::hash::Hash;
use crate::types::timestamp::Timestamp;
use crate::virtual_machine::context::NativeContractKind;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::object::VMObject;
use crate::virtual_machine::vm::gas::GasCategory;
use num_bigint::BigInt;

/// Address a context acts as: user contexts are named by their address
/// text, every other context by a name hashed into a system address.
pub fn context_address(name: &str) -> Address {
    Address::from_text(name).unwrap_or_else(|_| Address::from_hash(name))
}

/// Everything native contracts and runtime interops may do to the chain.
///
/// One value is handed to each native call or interop; nothing else gives
/// contract code access to storage, tokens or other contexts.
pub trait Runtime {
    // Stack

    fn pop(&mut self) -> Result<VMObject, VMError>;

    fn push(&mut self, value: VMObject) -> Result<(), VMError>;

    fn pop_number(&mut self) -> Result<BigInt, VMError> {
        self.pop()?.as_number()
    }

    fn pop_string(&mut self) -> Result<String, VMError> {
        self.pop()?.as_string()
    }

    fn pop_bool(&mut self) -> Result<bool, VMError> {
        self.pop()?.as_bool()
    }

    fn pop_bytes(&mut self) -> Result<Vec<u8>, VMError> {
        self.pop()?.as_bytes()
    }

    fn pop_address(&mut self) -> Result<Address, VMError> {
        self.pop()?.as_address()
    }

    // Environment

    fn time(&self) -> Timestamp;

    fn chain_name(&self) -> &str;

    fn transaction_hash(&self) -> Hash;

    fn current_context_name(&self) -> Option<String>;

    fn previous_context_name(&self) -> Option<String>;

    /// True while a trigger is running.
    fn is_trigger(&self) -> bool;

    fn current_address(&self) -> Address {
        self.current_context_name()
            .map(|name| context_address(&name))
            .unwrap_or(Address::NULL)
    }

    fn is_root_chain(&self) -> bool {
        self.chain_name() == DomainSettings::ROOT_CHAIN_NAME
    }

    // State

    fn nexus(&self) -> &Nexus;

    fn storage(&self) -> &dyn StorageContext;

    fn storage_mut(&mut self) -> &mut dyn StorageContext;

    fn nexus_name(&self) -> &str {
        self.nexus().name()
    }

    fn token_exists(&self, symbol: &str) -> bool {
        self.nexus().token_exists(self.storage(), symbol)
    }

    fn chain_exists(&self, name: &str) -> bool {
        self.nexus().chain_exists(self.storage(), name)
    }

    fn platform_exists(&self, name: &str) -> bool {
        self.nexus().platform_exists(self.storage(), name)
    }

    fn feed_exists(&self, name: &str) -> bool {
        self.nexus().feed_exists(self.storage(), name)
    }

    fn organization_exists(&self, id: &str) -> bool {
        self.nexus().organization_exists(self.storage(), id)
    }

    /// Native contracts count as deployed.
    fn contract_exists(&self, name: &str) -> bool {
        NativeContractKind::from_name(name).is_some() || self.nexus().contract_exists(self.storage(), name)
    }

    fn is_dangerous_address(&self, address: &Address) -> bool {
        self.nexus().is_dangerous_address(self.storage(), address)
    }

    fn get_token(&self, symbol: &str) -> Result<TokenInfo, VMError> {
        Ok(self.nexus().get_token(self.storage(), symbol)?)
    }

    fn get_tokens(&self) -> Result<Vec<String>, VMError> {
        Ok(self.nexus().token_symbols(self.storage())?)
    }

    fn get_contracts(&self) -> Result<Vec<DeployedContract>, VMError> {
        Ok(self.nexus().contracts(self.storage())?)
    }

    fn get_organizations(&self) -> Result<Vec<String>, VMError> {
        Ok(self.nexus().organization_ids(self.storage())?)
    }

    // Tokens

    /// Fungible balance, or the number of ids held for non-fungible tokens.
    fn get_balance(&self, symbol: &str, address: &Address) -> Result<BigInt, VMError> {
        let token = self.get_token(symbol)?;
        if token.is_fungible() {
            Ok(BalanceSheet::new(symbol).get(self.storage(), address)?)
        } else {
            let ids = OwnershipSheet::new(symbol).get(self.storage(), address)?;
            Ok(BigInt::from(ids.len()))
        }
    }

    fn get_ownerships(&self, symbol: &str, address: &Address) -> Result<Vec<BigInt>, VMError> {
        Ok(OwnershipSheet::new(symbol).get(self.storage(), address)?)
    }

    /// Moves a fungible amount, running token and account send/receive
    /// triggers and emitting the send/receive events.
    fn transfer_tokens(&mut self, symbol: &str, from: &Address, to: &Address, amount: &BigInt) -> Result<(), VMError>;

    /// Moves one non-fungible id.
    fn transfer_token(&mut self, symbol: &str, from: &Address, to: &Address, id: &BigInt) -> Result<(), VMError>;

    /// Creates `amount` fungible units for `to`.
    fn mint_tokens(&mut self, symbol: &str, from: &Address, to: &Address, amount: &BigInt) -> Result<(), VMError>;

    fn migrate_member(&mut self, organization: &str, from: &Address, to: &Address) -> Result<bool, VMError> {
        let nexus = self.nexus().clone();
        Ok(nexus.migrate_member(self.storage_mut(), organization, from, to)?)
    }

    /// Transfers ownership of every token owned by `from`.
    fn migrate_token(&mut self, from: &Address, to: &Address) -> Result<usize, VMError> {
        let nexus = self.nexus().clone();
        Ok(nexus.migrate_token_owner(self.storage_mut(), from, to)?)
    }

    // Execution

    fn is_witness(&mut self, address: &Address) -> Result<bool, VMError>;

    fn notify(&mut self, kind: EventKind, address: &Address, data: Vec<u8>) -> Result<(), VMError>;

    /// Calls `method` of the context `name`, which must be a script.
    fn call_context(&mut self, name: &str, method: &ContractMethod, args: &[VMObject]) -> Result<VMObject, VMError>;

    fn call_native_context(
        &mut self,
        kind: NativeContractKind,
        method: &str,
        args: &[VMObject],
    ) -> Result<VMObject, VMError>;

    /// Runs `trigger` from `abi` in an isolated VM. Storage writes and
    /// events of a failed trigger are rolled back.
    fn invoke_trigger(
        &mut self,
        script: &[u8],
        context_name: &str,
        abi: &ContractInterface,
        trigger: &str,
        args: &[VMObject],
    ) -> Result<TriggerResult, VMError>;

    fn read_oracle(&mut self, url: &str) -> Result<Vec<u8>, VMError>;

    fn consume_gas(&mut self, amount: u64, category: GasCategory) -> Result<(), VMError>;

    // Native shortcuts

    fn get_stake(&mut self, address: &Address) -> Result<BigInt, VMError> {
        self.call_native_context(NativeContractKind::Stake, "GetStake", &[VMObject::from(*address)])?
            .as_number()
    }

    fn is_known_validator(&mut self, address: &Address) -> Result<bool, VMError> {
        self.call_native_context(NativeContractKind::Validator, "IsValidator", &[VMObject::from(*address)])?
            .as_bool()
    }
}
