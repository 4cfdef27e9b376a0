//! Off-chain relay channels. Only the balance query is exposed; an open
//! channel blocks address migration.

use crate::contract::native::{field, unknown_method, NativeContract};
use crate::runtime::Runtime;
use crate::storage::context::StorageContext;
use crate::storage::map::StorageMap;
use crate::types::address::Address;
use crate::virtual_machine::context::NativeContractKind;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::object::VMObject;
use num_bigint::BigInt;

const KIND: NativeContractKind = NativeContractKind::Relay;

fn balances() -> StorageMap {
    field(KIND, "_balances")
}

pub struct RelayContract;

impl RelayContract {
    pub fn balance_of(storage: &dyn StorageContext, address: &Address) -> Result<BigInt, VMError> {
        Ok(balances().get(storage, address)?.unwrap_or_default())
    }

    pub fn seed_balance(storage: &mut dyn StorageContext, address: &Address, amount: &BigInt) -> Result<(), VMError> {
        Ok(balances().set(storage, address, amount)?)
    }
}

impl NativeContract for RelayContract {
    fn kind(&self) -> NativeContractKind {
        KIND
    }

    fn methods(&self) -> &'static [&'static str] {
        &["GetBalance"]
    }

    fn call(&self, rt: &mut dyn Runtime, method: &str) -> Result<(), VMError> {
        match method {
            "GetBalance" => {
                let address = rt.pop_address()?;
                let balance = Self::balance_of(rt.storage(), &address)?;
                rt.push(VMObject::Number(balance))
            }
            _ => Err(unknown_method(KIND, method)),
        }
    }
}
