//! Per-account friend lists.

use crate::contract::event::EventKind;
use crate::contract::native::{field, unknown_method, NativeContract};
use crate::runtime::Runtime;
use crate::storage::context::StorageContext;
use crate::storage::list::StorageList;
use crate::types::address::Address;
use crate::virtual_machine::context::NativeContractKind;
use crate::virtual_machine::errors::{expect, VMError};
use crate::virtual_machine::object::VMObject;
use std::collections::BTreeMap;

const KIND: NativeContractKind = NativeContractKind::Friends;

pub const FRIEND_LIMIT_PER_ACCOUNT: u64 = 100;

/// List of friends stored under the `_friendMap` entry of `owner`.
fn friend_list(owner: &Address) -> StorageList {
    StorageList::new(field(KIND, "_friendMap").element_key(owner))
}

pub struct FriendsContract;

impl FriendsContract {
    pub fn friends_of(storage: &dyn StorageContext, owner: &Address) -> Result<Vec<Address>, VMError> {
        Ok(friend_list(owner).all(storage)?)
    }

    fn add_friend(rt: &mut dyn Runtime, target: Address, friend: Address) -> Result<(), VMError> {
        expect(rt.is_witness(&target)?, "invalid witness")?;
        expect(friend.is_user(), "friend must be user address")?;
        expect(friend != target, "friend must be different from target address")?;

        let list = friend_list(&target);
        expect(list.count(rt.storage())? < FRIEND_LIMIT_PER_ACCOUNT, "friend limit reached")?;
        expect(!list.contains(rt.storage(), &friend)?, "already is friend")?;

        list.add(rt.storage_mut(), &friend)?;
        rt.notify(EventKind::AddressLink, &target, friend.as_bytes().to_vec())
    }

    fn remove_friend(rt: &mut dyn Runtime, target: Address, friend: Address) -> Result<(), VMError> {
        expect(rt.is_witness(&target)?, "invalid witness")?;

        let list = friend_list(&target);
        let Some(index) = list.index_of(rt.storage(), &friend)? else {
            return Err(VMError::Rejected("friend not found".into()));
        };
        list.remove_at(rt.storage_mut(), index)?;
        rt.notify(EventKind::AddressUnlink, &target, friend.as_bytes().to_vec())
    }
}

impl NativeContract for FriendsContract {
    fn kind(&self) -> NativeContractKind {
        KIND
    }

    fn methods(&self) -> &'static [&'static str] {
        &["AddFriend", "RemoveFriend", "GetFriends"]
    }

    fn call(&self, rt: &mut dyn Runtime, method: &str) -> Result<(), VMError> {
        match method {
            "AddFriend" => {
                let target = rt.pop_address()?;
                let friend = rt.pop_address()?;
                Self::add_friend(rt, target, friend)
            }
            "RemoveFriend" => {
                let target = rt.pop_address()?;
                let friend = rt.pop_address()?;
                Self::remove_friend(rt, target, friend)
            }
            // Returned as a struct keyed by list position.
            "GetFriends" => {
                let target = rt.pop_address()?;
                let fields: BTreeMap<String, VMObject> = Self::friends_of(rt.storage(), &target)?
                    .into_iter()
                    .enumerate()
                    .map(|(i, friend)| (i.to_string(), VMObject::from(friend)))
                    .collect();
                rt.push(VMObject::Struct(fields))
            }
            _ => Err(unknown_method(KIND, method)),
        }
    }
}
