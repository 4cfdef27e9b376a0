//! NFT market and token crowdsales. Both expose whether an address has an
//! open listing, which blocks address migration.

use crate::contract::native::{field, unknown_method, NativeContract};
use crate::runtime::Runtime;
use crate::storage::context::StorageContext;
use crate::storage::map::StorageMap;
use crate::types::address::Address;
use crate::virtual_machine::context::NativeContractKind;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::object::VMObject;

fn sellers(kind: NativeContractKind) -> StorageMap {
    field(kind, "_sellers")
}

/// Marks `address` as having an open listing in `kind`.
pub fn seed_seller(storage: &mut dyn StorageContext, kind: NativeContractKind, address: &Address) -> Result<(), VMError> {
    Ok(sellers(kind).set(storage, address, &true)?)
}

fn call_seller_query(kind: NativeContractKind, rt: &mut dyn Runtime, method: &str) -> Result<(), VMError> {
    match method {
        "IsSeller" => {
            let address = rt.pop_address()?;
            let selling = sellers(kind).contains(rt.storage(), &address);
            rt.push(VMObject::Bool(selling))
        }
        _ => Err(unknown_method(kind, method)),
    }
}

pub struct MarketContract;

impl NativeContract for MarketContract {
    fn kind(&self) -> NativeContractKind {
        NativeContractKind::Market
    }

    fn methods(&self) -> &'static [&'static str] {
        &["IsSeller"]
    }

    fn call(&self, rt: &mut dyn Runtime, method: &str) -> Result<(), VMError> {
        call_seller_query(self.kind(), rt, method)
    }
}

pub struct SaleContract;

impl NativeContract for SaleContract {
    fn kind(&self) -> NativeContractKind {
        NativeContractKind::Sale
    }

    fn methods(&self) -> &'static [&'static str] {
        &["IsSeller"]
    }

    fn call(&self, rt: &mut dyn Runtime, method: &str) -> Result<(), VMError> {
        call_seller_query(self.kind(), rt, method)
    }
}
