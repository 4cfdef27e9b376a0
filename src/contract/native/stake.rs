//! Staking of the staking token and fuel claims.

use crate::config::DomainSettings;
use crate::contract::event::{EventKind, TokenEventData};
use crate::contract::native::{expect_account_caller, field, unknown_method, NativeContract};
use crate::runtime::Runtime;
use crate::storage::context::StorageContext;
use crate::storage::map::StorageMap;
use crate::types::address::Address;
use crate::types::encoding::Encode;
use crate::virtual_machine::context::NativeContractKind;
use crate::virtual_machine::errors::{expect, VMError};
use crate::virtual_machine::object::VMObject;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

const KIND: NativeContractKind = NativeContractKind::Stake;

fn stake_map() -> StorageMap {
    field(KIND, "_stakeMap")
}

fn claim_map() -> StorageMap {
    field(KIND, "_claimMap")
}

pub struct StakeContract;

impl StakeContract {
    pub fn stake_of(storage: &dyn StorageContext, address: &Address) -> Result<BigInt, VMError> {
        Ok(stake_map().get(storage, address)?.unwrap_or_default())
    }

    pub fn unclaimed_of(storage: &dyn StorageContext, address: &Address) -> Result<BigInt, VMError> {
        Ok(claim_map().get(storage, address)?.unwrap_or_default())
    }

    /// Writes a stake directly, bypassing token movement. Used for genesis state.
    pub fn seed_stake(storage: &mut dyn StorageContext, address: &Address, amount: &BigInt) -> Result<(), VMError> {
        Ok(stake_map().set(storage, address, amount)?)
    }

    /// Writes pending fuel directly. Used for genesis state.
    pub fn seed_unclaimed(storage: &mut dyn StorageContext, address: &Address, amount: &BigInt) -> Result<(), VMError> {
        Ok(claim_map().set(storage, address, amount)?)
    }

    fn stake(rt: &mut dyn Runtime, from: Address, amount: BigInt) -> Result<(), VMError> {
        expect(amount.is_positive(), "invalid amount")?;
        expect(rt.is_witness(&from)?, "invalid witness")?;

        let contract = KIND.address();
        rt.transfer_tokens(DomainSettings::STAKING_TOKEN_SYMBOL, &from, &contract, &amount)?;

        let total = Self::stake_of(rt.storage(), &from)? + &amount;
        stake_map().set(rt.storage_mut(), &from, &total)?;

        let data = TokenEventData::new(DomainSettings::STAKING_TOKEN_SYMBOL, amount, rt.chain_name());
        rt.notify(EventKind::TokenStake, &from, data.to_bytes())
    }

    fn unstake(rt: &mut dyn Runtime, from: Address, amount: BigInt) -> Result<(), VMError> {
        expect(amount.is_positive(), "invalid amount")?;
        expect(rt.is_witness(&from)?, "invalid witness")?;

        let current = Self::stake_of(rt.storage(), &from)?;
        expect(current >= amount, "not enough staked")?;

        let left = current - &amount;
        if left.is_zero() {
            stake_map().remove(rt.storage_mut(), &from)?;
        } else {
            stake_map().set(rt.storage_mut(), &from, &left)?;
        }

        let contract = KIND.address();
        rt.transfer_tokens(DomainSettings::STAKING_TOKEN_SYMBOL, &contract, &from, &amount)?;

        let data = TokenEventData::new(DomainSettings::STAKING_TOKEN_SYMBOL, amount, rt.chain_name());
        rt.notify(EventKind::TokenClaim, &from, data.to_bytes())
    }

    /// Mints the fuel pending for `from` into `to`.
    fn claim(rt: &mut dyn Runtime, from: Address, to: Address) -> Result<(), VMError> {
        expect(rt.is_witness(&from)?, "invalid witness")?;

        let amount = Self::unclaimed_of(rt.storage(), &from)?;
        expect(amount.is_positive(), "nothing to claim")?;
        claim_map().remove(rt.storage_mut(), &from)?;

        let contract = KIND.address();
        rt.mint_tokens(DomainSettings::FUEL_TOKEN_SYMBOL, &contract, &to, &amount)?;

        let data = TokenEventData::new(DomainSettings::FUEL_TOKEN_SYMBOL, amount, rt.chain_name());
        rt.notify(EventKind::TokenClaim, &to, data.to_bytes())
    }

    fn migrate(rt: &mut dyn Runtime, from: Address, to: Address) -> Result<(), VMError> {
        expect_account_caller(rt)?;
        let moved = Self::stake_of(rt.storage(), &from)?;
        stake_map().remove(rt.storage_mut(), &from)?;
        let total = Self::stake_of(rt.storage(), &to)? + moved;
        stake_map().set(rt.storage_mut(), &to, &total)?;
        claim_map().migrate(rt.storage_mut(), &from, &to)?;
        Ok(())
    }
}

impl NativeContract for StakeContract {
    fn kind(&self) -> NativeContractKind {
        KIND
    }

    fn methods(&self) -> &'static [&'static str] {
        &["Stake", "Unstake", "GetStake", "GetUnclaimed", "Claim", "Migrate"]
    }

    fn call(&self, rt: &mut dyn Runtime, method: &str) -> Result<(), VMError> {
        match method {
            "Stake" => {
                let from = rt.pop_address()?;
                let amount = rt.pop_number()?;
                Self::stake(rt, from, amount)
            }
            "Unstake" => {
                let from = rt.pop_address()?;
                let amount = rt.pop_number()?;
                Self::unstake(rt, from, amount)
            }
            "GetStake" => {
                let address = rt.pop_address()?;
                let stake = Self::stake_of(rt.storage(), &address)?;
                rt.push(VMObject::Number(stake))
            }
            "GetUnclaimed" => {
                let address = rt.pop_address()?;
                let unclaimed = Self::unclaimed_of(rt.storage(), &address)?;
                rt.push(VMObject::Number(unclaimed))
            }
            "Claim" => {
                let from = rt.pop_address()?;
                let to = rt.pop_address()?;
                Self::claim(rt, from, to)
            }
            "Migrate" => {
                let from = rt.pop_address()?;
                let to = rt.pop_address()?;
                Self::migrate(rt, from, to)
            }
            _ => Err(unknown_method(KIND, method)),
        }
    }
}
