//! Known block validators.

use crate::contract::native::{expect_account_caller, field, unknown_method, NativeContract};
use crate::runtime::Runtime;
use crate::storage::context::StorageContext;
use crate::storage::map::StorageMap;
use crate::types::address::Address;
use crate::types::timestamp::Timestamp;
use crate::virtual_machine::context::NativeContractKind;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::object::VMObject;

const KIND: NativeContractKind = NativeContractKind::Validator;

/// Validator address to the time it was elected.
fn validators() -> StorageMap {
    field(KIND, "_validators")
}

pub struct ValidatorContract;

impl ValidatorContract {
    pub fn is_validator(storage: &dyn StorageContext, address: &Address) -> bool {
        validators().contains(storage, address)
    }

    /// Registers `address` directly. Used for genesis state.
    pub fn seed_validator(storage: &mut dyn StorageContext, address: &Address, since: Timestamp) -> Result<(), VMError> {
        Ok(validators().set(storage, address, &since.0)?)
    }

    pub fn validator_count(storage: &dyn StorageContext) -> Result<u64, VMError> {
        Ok(validators().count(storage)?)
    }
}

impl NativeContract for ValidatorContract {
    fn kind(&self) -> NativeContractKind {
        KIND
    }

    fn methods(&self) -> &'static [&'static str] {
        &["IsValidator", "GetValidatorCount", "Migrate"]
    }

    fn call(&self, rt: &mut dyn Runtime, method: &str) -> Result<(), VMError> {
        match method {
            "IsValidator" => {
                let address = rt.pop_address()?;
                let known = Self::is_validator(rt.storage(), &address);
                rt.push(VMObject::Bool(known))
            }
            "GetValidatorCount" => {
                let count = Self::validator_count(rt.storage())?;
                rt.push(VMObject::from(count as i64))
            }
            "Migrate" => {
                let from = rt.pop_address()?;
                let to = rt.pop_address()?;
                expect_account_caller(rt)?;
                validators().migrate(rt.storage_mut(), &from, &to)?;
                Ok(())
            }
            _ => Err(unknown_method(KIND, method)),
        }
    }
}
