//! Per-address storage quota accounting.

use crate::contract::native::{expect_account_caller, field, unknown_method, NativeContract};
use crate::runtime::Runtime;
use crate::storage::context::StorageContext;
use crate::storage::map::StorageMap;
use crate::types::address::Address;
use crate::virtual_machine::context::NativeContractKind;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::object::VMObject;
use num_bigint::BigInt;

const KIND: NativeContractKind = NativeContractKind::Storage;

fn used_space() -> StorageMap {
    field(KIND, "_usedSpace")
}

pub struct StorageContract;

impl StorageContract {
    pub fn used_space_of(storage: &dyn StorageContext, address: &Address) -> Result<BigInt, VMError> {
        Ok(used_space().get(storage, address)?.unwrap_or_default())
    }

    /// Records `bytes` of used space for `address`. Used for genesis state.
    pub fn seed_used_space(storage: &mut dyn StorageContext, address: &Address, bytes: &BigInt) -> Result<(), VMError> {
        Ok(used_space().set(storage, address, bytes)?)
    }
}

impl NativeContract for StorageContract {
    fn kind(&self) -> NativeContractKind {
        KIND
    }

    fn methods(&self) -> &'static [&'static str] {
        &["GetUsedSpace", "Migrate"]
    }

    fn call(&self, rt: &mut dyn Runtime, method: &str) -> Result<(), VMError> {
        match method {
            "GetUsedSpace" => {
                let address = rt.pop_address()?;
                let used = Self::used_space_of(rt.storage(), &address)?;
                rt.push(VMObject::Number(used))
            }
            "Migrate" => {
                let from = rt.pop_address()?;
                let to = rt.pop_address()?;
                expect_account_caller(rt)?;
                used_space().migrate(rt.storage_mut(), &from, &to)?;
                Ok(())
            }
            _ => Err(unknown_method(KIND, method)),
        }
    }
}
