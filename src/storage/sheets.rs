//! Token holdings: fungible balances and non-fungible ownership.

use crate::storage::context::{join_key, StorageContext, StorageExt};
use crate::storage::map::StorageMap;
use crate::types::address::Address;
use crate::types::encoding::DecodeError;
use num_bigint::{BigInt, Sign};
use num_traits::Zero;

/// Fungible balances of one token, keyed `.balances.{symbol} ++ address`.
#[derive(Debug, Clone)]
pub struct BalanceSheet {
    prefix: Vec<u8>,
}

impl BalanceSheet {
    pub fn new(symbol: &str) -> Self {
        Self {
            prefix: format!(".balances.{symbol}").into_bytes(),
        }
    }

    pub fn key(&self, address: &Address) -> Vec<u8> {
        join_key(&self.prefix, address.as_bytes())
    }

    pub fn get(&self, storage: &dyn StorageContext, address: &Address) -> Result<BigInt, DecodeError> {
        Ok(storage.get_value::<BigInt>(&self.key(address))?.unwrap_or_default())
    }

    /// Credits `amount`; returns `false` for negative amounts.
    pub fn add(&self, storage: &mut dyn StorageContext, address: &Address, amount: &BigInt) -> Result<bool, DecodeError> {
        if amount.sign() == Sign::Minus {
            return Ok(false);
        }
        if amount.is_zero() {
            return Ok(true);
        }
        let balance = self.get(storage, address)? + amount;
        storage.put_value(&self.key(address), &balance);
        Ok(true)
    }

    /// Debits `amount`; returns `false` for negative amounts or insufficient balance.
    pub fn subtract(
        &self,
        storage: &mut dyn StorageContext,
        address: &Address,
        amount: &BigInt,
    ) -> Result<bool, DecodeError> {
        if amount.sign() == Sign::Minus {
            return Ok(false);
        }
        if amount.is_zero() {
            return Ok(true);
        }
        let balance = self.get(storage, address)?;
        if &balance < amount {
            return Ok(false);
        }
        let remaining = balance - amount;
        let key = self.key(address);
        if remaining.is_zero() {
            storage.delete(&key);
        } else {
            storage.put_value(&key, &remaining);
        }
        Ok(true)
    }
}

/// Non-fungible ownership of one token.
///
/// Each id has at most one owner. Layout:
/// - owned ids: a [`StorageMap`] at `.ids.{symbol} ++ address`, id to id
/// - owner: `.ownership.{symbol} ++ signed_le(id)`, the raw owner address
#[derive(Debug, Clone)]
pub struct OwnershipSheet {
    items_prefix: Vec<u8>,
    owner_prefix: Vec<u8>,
}

impl OwnershipSheet {
    pub fn new(symbol: &str) -> Self {
        Self {
            items_prefix: format!(".ids.{symbol}").into_bytes(),
            owner_prefix: format!(".ownership.{symbol}").into_bytes(),
        }
    }

    fn items(&self, address: &Address) -> StorageMap {
        StorageMap::new(join_key(&self.items_prefix, address.as_bytes()))
    }

    pub fn owner_key(&self, id: &BigInt) -> Vec<u8> {
        join_key(&self.owner_prefix, &id.to_signed_bytes_le())
    }

    /// Ids held by `address`, in storage key order.
    pub fn get(&self, storage: &dyn StorageContext, address: &Address) -> Result<Vec<BigInt>, DecodeError> {
        self.items(address).values(storage)
    }

    /// Owner of `id`, or the null address.
    pub fn get_owner(&self, storage: &dyn StorageContext, id: &BigInt) -> Result<Address, DecodeError> {
        Ok(storage.get_value::<Address>(&self.owner_key(id))?.unwrap_or(Address::NULL))
    }

    /// Fails on a non-positive id or an id that already has an owner.
    pub fn add(&self, storage: &mut dyn StorageContext, address: &Address, id: &BigInt) -> Result<bool, DecodeError> {
        if id.sign() != Sign::Plus {
            return Ok(false);
        }
        if !self.get_owner(storage, id)?.is_null() {
            return Ok(false);
        }
        self.items(address).set(storage, id, id)?;
        storage.put_value(&self.owner_key(id), address);
        Ok(true)
    }

    /// Fails on a non-positive id or when `address` does not own `id`.
    pub fn remove(&self, storage: &mut dyn StorageContext, address: &Address, id: &BigInt) -> Result<bool, DecodeError> {
        if id.sign() != Sign::Plus {
            return Ok(false);
        }
        if self.get_owner(storage, id)? != *address {
            return Ok(false);
        }
        self.items(address).remove(storage, id)?;
        storage.delete(&self.owner_key(id));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::context::MemoryStorage;
    use crate::utils::test_utils::utils::user_address;

    #[test]
    fn balance_key_layout() {
        let owner = user_address(1);
        let mut expected = b".balances.FUEL".to_vec();
        expected.extend_from_slice(owner.as_bytes());
        assert_eq!(BalanceSheet::new("FUEL").key(&owner), expected);
    }

    #[test]
    fn balances_add_and_subtract() {
        let mut storage = MemoryStorage::new();
        let sheet = BalanceSheet::new("FUEL");
        let owner = user_address(1);
        assert!(sheet.add(&mut storage, &owner, &BigInt::from(10)).unwrap());
        assert!(!sheet.subtract(&mut storage, &owner, &BigInt::from(11)).unwrap());
        assert!(!sheet.add(&mut storage, &owner, &BigInt::from(-1)).unwrap());
        assert!(sheet.subtract(&mut storage, &owner, &BigInt::from(10)).unwrap());
        assert_eq!(sheet.get(&storage, &owner).unwrap(), BigInt::from(0));
        assert!(storage.is_empty());
    }

    #[test]
    fn ownership_key_layout() {
        let sheet = OwnershipSheet::new("NFT");
        assert_eq!(sheet.owner_key(&BigInt::from(256)), b".ownership.NFT\x00\x01".to_vec());
    }

    #[test]
    fn one_owner_per_id() {
        let mut storage = MemoryStorage::new();
        let sheet = OwnershipSheet::new("NFT");
        let (a, b) = (user_address(1), user_address(2));
        let id = BigInt::from(7);

        assert!(sheet.add(&mut storage, &a, &id).unwrap());
        assert!(!sheet.add(&mut storage, &b, &id).unwrap());
        assert_eq!(sheet.get_owner(&storage, &id).unwrap(), a);
        assert_eq!(sheet.get(&storage, &a).unwrap(), vec![id.clone()]);

        assert!(!sheet.remove(&mut storage, &b, &id).unwrap());
        assert!(sheet.remove(&mut storage, &a, &id).unwrap());
        assert!(sheet.get_owner(&storage, &id).unwrap().is_null());
        assert!(sheet.add(&mut storage, &b, &id).unwrap());
    }

    #[test]
    fn non_positive_ids_are_rejected() {
        let mut storage = MemoryStorage::new();
        let sheet = OwnershipSheet::new("NFT");
        let a = user_address(1);
        assert!(!sheet.add(&mut storage, &a, &BigInt::from(0)).unwrap());
        assert!(!sheet.add(&mut storage, &a, &BigInt::from(-3)).unwrap());
        assert!(!sheet.remove(&mut storage, &a, &BigInt::from(0)).unwrap());
    }
}
