//! Consensus participation records. Only migration is exposed here.

use crate::contract::native::{expect_account_caller, field, unknown_method, NativeContract};
use crate::runtime::Runtime;
use crate::storage::context::StorageContext;
use crate::storage::map::StorageMap;
use crate::types::address::Address;
use crate::virtual_machine::context::NativeContractKind;
use crate::virtual_machine::errors::VMError;

const KIND: NativeContractKind = NativeContractKind::Consensus;

/// Address to the number of rounds it took part in.
fn presences() -> StorageMap {
    field(KIND, "_presences")
}

pub struct ConsensusContract;

impl ConsensusContract {
    pub fn presences_of(storage: &dyn StorageContext, address: &Address) -> Result<u64, VMError> {
        Ok(presences().get(storage, address)?.unwrap_or(0))
    }

    pub fn seed_presences(storage: &mut dyn StorageContext, address: &Address, rounds: u64) -> Result<(), VMError> {
        Ok(presences().set(storage, address, &rounds)?)
    }
}

impl NativeContract for ConsensusContract {
    fn kind(&self) -> NativeContractKind {
        KIND
    }

    fn methods(&self) -> &'static [&'static str] {
        &["Migrate"]
    }

    fn call(&self, rt: &mut dyn Runtime, method: &str) -> Result<(), VMError> {
        match method {
            "Migrate" => {
                let from = rt.pop_address()?;
                let to = rt.pop_address()?;
                expect_account_caller(rt)?;
                let moved = Self::presences_of(rt.storage(), &from)?;
                if moved > 0 {
                    let total = Self::presences_of(rt.storage(), &to)? + moved;
                    presences().remove(rt.storage_mut(), &from)?;
                    presences().set(rt.storage_mut(), &to, &total)?;
                }
                Ok(())
            }
            _ => Err(unknown_method(KIND, method)),
        }
    }
}
