//! Names, account scripts and identity migration for user addresses.
//!
//! State:
//! - `account._addressMap`: address to name
//! - `account._nameMap`: name to address
//! - `account._scriptMap`: address to account script
//! - `account._abiMap`: address to encoded ABI of that script

use crate::config::DomainSettings;
use crate::contract::abi::ContractInterface;
use crate::contract::event::EventKind;
use crate::contract::native::{field, unknown_method, NativeContract};
use crate::contract::trigger::{migrate_signature, AccountTrigger, Trigger, TriggerResult};
use crate::runtime::Runtime;
use crate::storage::context::StorageContext;
use crate::storage::map::StorageMap;
use crate::types::address::Address;
use crate::utils::units::unit_value;
use crate::utils::validation::{is_reserved_identifier, is_valid_identifier, ANONYMOUS_NAME, NULL_NAME};
use crate::virtual_machine::context::NativeContractKind;
use crate::virtual_machine::errors::{expect, VMError};
use crate::virtual_machine::object::VMObject;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

const KIND: NativeContractKind = NativeContractKind::Account;

/// Name of the optional method run right after an account script is registered.
pub const CONSTRUCTOR_NAME: &str = "Initialize";

/// Price of a name registration: 0.1 fuel.
pub fn registration_cost() -> BigInt {
    unit_value(DomainSettings::FUEL_TOKEN_DECIMALS) / 10
}

fn address_map() -> StorageMap {
    field(KIND, "_addressMap")
}

fn name_map() -> StorageMap {
    field(KIND, "_nameMap")
}

fn script_map() -> StorageMap {
    field(KIND, "_scriptMap")
}

fn abi_map() -> StorageMap {
    field(KIND, "_abiMap")
}

pub struct AccountContract;

impl AccountContract {
    /// Account script and ABI registered for `address`, if any.
    pub fn lookup_script(
        storage: &dyn StorageContext,
        address: &Address,
    ) -> Result<Option<(Vec<u8>, ContractInterface)>, VMError> {
        if !address.is_user() {
            return Ok(None);
        }
        let Some(script) = script_map().get::<_, Vec<u8>>(storage, address)? else {
            return Ok(None);
        };
        let abi_bytes = abi_map().get::<_, Vec<u8>>(storage, address)?.unwrap_or_default();
        let abi = ContractInterface::from_bytes(&abi_bytes)?;
        Ok(Some((script, abi)))
    }

    /// Installs an account script without the registration checks. Used for genesis state.
    pub fn seed_script(
        storage: &mut dyn StorageContext,
        address: &Address,
        script: &[u8],
        abi: &ContractInterface,
    ) -> Result<(), VMError> {
        script_map().set(storage, address, &script.to_vec())?;
        abi_map().set(storage, address, &abi.to_byte_array())?;
        Ok(())
    }

    pub fn name_of(storage: &dyn StorageContext, address: &Address) -> Result<Option<String>, VMError> {
        Ok(address_map().get(storage, address)?)
    }

    fn register_name(rt: &mut dyn Runtime, target: Address, name: String) -> Result<(), VMError> {
        expect(target.is_user(), "must be user address")?;
        expect(rt.is_witness(&target)?, "invalid witness")?;
        expect(is_valid_identifier(&name), "invalid name")?;

        let stake = rt.get_stake(&target)?;
        expect(
            stake >= unit_value(DomainSettings::STAKING_TOKEN_DECIMALS),
            "must have something staked",
        )?;
        expect(!rt.is_dangerous_address(&target), "this address can't be used as source")?;

        expect(name != rt.nexus_name(), "name already used for nexus")?;
        expect(!rt.chain_exists(&name), "name already used for a chain")?;
        expect(!rt.platform_exists(&name), "name already used for a platform")?;
        expect(!rt.contract_exists(&name), "name already used for a contract")?;
        expect(!rt.feed_exists(&name), "name already used for a feed")?;
        expect(!rt.organization_exists(&name), "name already used for a organization")?;
        expect(!rt.token_exists(&name.to_uppercase()), "name already used for a token")?;

        let (addresses, names) = (address_map(), name_map());
        expect(!addresses.contains(rt.storage(), &target), "address already has a name")?;
        expect(!names.contains(rt.storage(), &name), "name already used for other account")?;

        let native_names: Vec<&str> = NativeContractKind::names().collect();
        expect(
            !is_reserved_identifier(&name, &native_names),
            format!("name '{name}' reserved by system"),
        )?;

        addresses.set(rt.storage_mut(), &target, &name)?;
        names.set(rt.storage_mut(), &name, &target)?;
        rt.notify(EventKind::AddressRegister, &target, name.into_bytes())
    }

    fn unregister_name(rt: &mut dyn Runtime, target: Address) -> Result<(), VMError> {
        expect(target.is_user(), "must be user address")?;
        expect(rt.is_witness(&target)?, "invalid witness")?;
        expect(!rt.is_dangerous_address(&target), "this address can't be used as source")?;

        let (addresses, names) = (address_map(), name_map());
        let name: Option<String> = addresses.get(rt.storage(), &target)?;
        let Some(name) = name else {
            return Err(VMError::Rejected("address doest not have a name yet".into()));
        };
        addresses.remove(rt.storage_mut(), &target)?;
        names.remove(rt.storage_mut(), &name)?;
        rt.notify(EventKind::AddressUnregister, &target, name.into_bytes())
    }

    fn register_script(rt: &mut dyn Runtime, target: Address, script: Vec<u8>, abi_bytes: Vec<u8>) -> Result<(), VMError> {
        expect(target.is_user(), "must be user address")?;
        expect(rt.is_witness(&target)?, "invalid witness")?;
        expect(!rt.is_dangerous_address(&target), "this address can't be used as source")?;

        let stake = rt.get_stake(&target)?;
        expect(
            stake >= unit_value(DomainSettings::STAKING_TOKEN_DECIMALS),
            "must have something staked",
        )?;
        expect(script.len() < DomainSettings::MAX_ACCOUNT_SCRIPT_LEN, "invalid script length")?;
        expect(!script_map().contains(rt.storage(), &target), "address already has a script")?;

        let abi = ContractInterface::from_bytes(&abi_bytes)?;
        expect(abi.method_count() > 0, "unexpected empty contract abi")?;

        let witness = AccountTrigger::OnWitness.name();
        if abi.has_method(witness) {
            let context_name = target.text();

            let answer = rt.invoke_trigger(&script, &context_name, &abi, witness, &[VMObject::from(Address::NULL)])?;
            expect(
                answer == TriggerResult::Failure,
                "script does not handle OnWitness correctly, case #1",
            )?;

            let check = rt.invoke_trigger(&script, &context_name, &abi, witness, &[VMObject::from(target)])?;
            expect(
                check != TriggerResult::Failure,
                "script does not handle OnWitness correctly, case #2",
            )?;
        }

        script_map().set(rt.storage_mut(), &target, &script)?;
        abi_map().set(rt.storage_mut(), &target, &abi_bytes)?;

        if let Some(constructor) = abi.find_method(CONSTRUCTOR_NAME) {
            rt.call_context(&target.text(), constructor, &[VMObject::from(target)])?;
        }
        Ok(())
    }

    fn has_script(rt: &dyn Runtime, address: Address) -> bool {
        address.is_user() && script_map().contains(rt.storage(), &address)
    }

    fn look_up_address(rt: &dyn Runtime, target: Address) -> Result<String, VMError> {
        Ok(Self::name_of(rt.storage(), &target)?.unwrap_or_else(|| ANONYMOUS_NAME.to_string()))
    }

    fn look_up_script(rt: &dyn Runtime, target: Address) -> Result<Vec<u8>, VMError> {
        Ok(script_map().get(rt.storage(), &target)?.unwrap_or_default())
    }

    fn look_up_abi(rt: &dyn Runtime, target: Address) -> Result<Vec<u8>, VMError> {
        Ok(abi_map().get(rt.storage(), &target)?.unwrap_or_default())
    }

    fn look_up_name(rt: &dyn Runtime, name: &str) -> Result<Address, VMError> {
        if name == ANONYMOUS_NAME || name == NULL_NAME {
            return Ok(Address::NULL);
        }
        Ok(name_map().get(rt.storage(), name)?.unwrap_or(Address::NULL))
    }

    fn expect_migration_accepted(context: &str, answer: &VMObject) -> Result<(), VMError> {
        if *answer == VMObject::Bool(false) {
            return Err(VMError::Rejected(format!("migration rejected by {context}")));
        }
        Ok(())
    }

    /// Moves everything `from` holds or participates in over to `target`.
    fn migrate(rt: &mut dyn Runtime, from: Address, target: Address) -> Result<(), VMError> {
        expect(target != from, "addresses must be different")?;
        expect(target.is_user(), "must be user address")?;
        expect(!rt.is_dangerous_address(&from), "this address can't be used as source")?;
        expect(rt.is_root_chain(), "must be root chain")?;
        expect(rt.is_witness(&from)?, "invalid witness")?;

        let source = [VMObject::from(from)];
        let pair = [VMObject::from(from), VMObject::from(target)];

        let is_seller = rt
            .call_native_context(NativeContractKind::Market, "IsSeller", &source)?
            .as_bool()?;
        expect(!is_seller, "sale pending on market")?;

        let is_seller = rt
            .call_native_context(NativeContractKind::Sale, "IsSeller", &source)?
            .as_bool()?;
        expect(!is_seller, "crowdsale pending")?;

        let relay_balance = rt
            .call_native_context(NativeContractKind::Relay, "GetBalance", &source)?
            .as_number()?;
        expect(relay_balance.is_zero(), "relay channel can't be open")?;

        let unclaimed = rt
            .call_native_context(NativeContractKind::Stake, "GetUnclaimed", &source)?
            .as_number()?;
        if unclaimed.is_positive() {
            rt.call_native_context(NativeContractKind::Stake, "Claim", &[VMObject::from(from), VMObject::from(from)])?;
        }

        let symbols = rt.get_tokens()?;
        for symbol in &symbols {
            let balance = rt.get_balance(symbol, &from)?;
            if !balance.is_positive() {
                continue;
            }
            let info = rt.get_token(symbol)?;
            if !info.is_fungible() {
                for id in rt.get_ownerships(symbol, &from)? {
                    rt.transfer_token(symbol, &from, &target, &id)?;
                }
            } else if symbol != DomainSettings::FUEL_TOKEN_SYMBOL {
                rt.transfer_tokens(symbol, &from, &target, &balance)?;
            } else {
                // One fuel unit stays behind to pay for this transaction.
                let reserve = unit_value(DomainSettings::FUEL_TOKEN_DECIMALS);
                let amount = &balance - &reserve;
                expect(amount > reserve, "Can't migrate address with less than 2 fuel")?;
                rt.transfer_tokens(symbol, &from, &target, &amount)?;
            }
        }

        let (addresses, names) = (address_map(), name_map());
        let current_name: Option<String> = addresses.get(rt.storage(), &from)?;
        if let Some(current_name) = current_name {
            addresses.migrate(rt.storage_mut(), &from, &target)?;
            names.set(rt.storage_mut(), &current_name, &target)?;
            let moved = Self::look_up_address(rt, target)?;
            expect(moved == current_name, "migration of name failed")?;
        }

        script_map().migrate(rt.storage_mut(), &from, &target)?;
        abi_map().migrate(rt.storage_mut(), &from, &target)?;

        let stake = rt.get_stake(&from)?;
        if stake.is_positive() {
            rt.call_native_context(NativeContractKind::Stake, "Migrate", &pair)?;
        }

        if rt.is_known_validator(&from)? {
            rt.call_native_context(NativeContractKind::Validator, "Migrate", &pair)?;
        }

        let used_space = rt
            .call_native_context(NativeContractKind::Storage, "GetUsedSpace", &source)?
            .as_number()?;
        if used_space.is_positive() {
            rt.call_native_context(NativeContractKind::Storage, "Migrate", &pair)?;
        }

        rt.call_native_context(NativeContractKind::Consensus, "Migrate", &pair)?;

        for organization in rt.get_organizations()? {
            rt.migrate_member(&organization, &from, &target)?;
        }

        // A hook vetoes by returning false; a fault aborts the migration too.
        let signature = migrate_signature();
        for contract in rt.get_contracts()? {
            if let Some(method) = contract.abi.find_method(&signature.name).filter(|m| m.same_shape(&signature)) {
                let accepted = rt.call_context(&contract.name, method, &pair)?;
                Self::expect_migration_accepted(&contract.name, &accepted)?;
            }
        }

        for symbol in &symbols {
            let token = rt.get_token(symbol)?;
            if let Some(method) = token.abi.find_method(&signature.name).filter(|m| m.same_shape(&signature)) {
                let accepted = rt.call_context(symbol, method, &pair)?;
                Self::expect_migration_accepted(symbol, &accepted)?;
            }
        }

        rt.migrate_token(&from, &target)?;
        rt.notify(EventKind::AddressMigration, &target, from.as_bytes().to_vec())
    }
}

impl NativeContract for AccountContract {
    fn kind(&self) -> NativeContractKind {
        KIND
    }

    fn methods(&self) -> &'static [&'static str] {
        &[
            "RegisterName",
            "UnregisterName",
            "RegisterScript",
            "HasScript",
            "LookUpAddress",
            "LookUpScript",
            "LookUpABI",
            "LookUpName",
            "Migrate",
        ]
    }

    fn call(&self, rt: &mut dyn Runtime, method: &str) -> Result<(), VMError> {
        match method {
            "RegisterName" => {
                let target = rt.pop_address()?;
                let name = rt.pop_string()?;
                Self::register_name(rt, target, name)
            }
            "UnregisterName" => {
                let target = rt.pop_address()?;
                Self::unregister_name(rt, target)
            }
            "RegisterScript" => {
                let target = rt.pop_address()?;
                let script = rt.pop_bytes()?;
                let abi_bytes = rt.pop_bytes()?;
                Self::register_script(rt, target, script, abi_bytes)
            }
            "HasScript" => {
                let address = rt.pop_address()?;
                let result = Self::has_script(rt, address);
                rt.push(VMObject::Bool(result))
            }
            "LookUpAddress" => {
                let target = rt.pop_address()?;
                let name = Self::look_up_address(rt, target)?;
                rt.push(VMObject::from(name))
            }
            "LookUpScript" => {
                let target = rt.pop_address()?;
                let script = Self::look_up_script(rt, target)?;
                rt.push(VMObject::Bytes(script))
            }
            "LookUpABI" => {
                let target = rt.pop_address()?;
                let abi = Self::look_up_abi(rt, target)?;
                rt.push(VMObject::Bytes(abi))
            }
            "LookUpName" => {
                let name = rt.pop_string()?;
                let address = Self::look_up_name(rt, &name)?;
                rt.push(VMObject::from(address))
            }
            "Migrate" => {
                let from = rt.pop_address()?;
                let target = rt.pop_address()?;
                Self::migrate(rt, from, target)
            }
            _ => Err(unknown_method(KIND, method)),
        }
    }
}
