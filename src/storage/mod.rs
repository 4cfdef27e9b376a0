//! Contract state storage.
//!
//! - [`context`]: the [`StorageContext`] trait, [`MemoryStorage`] and the
//!   checkpointed [`ChangeSet`] every transaction writes through
//! - [`map`] and [`list`]: prefix-scoped structured views
//! - [`sheets`]: token balances and non-fungible ownership
//!
//! Keys are plain byte concatenations of a UTF-8 prefix and encoded
//! identifiers. That layout is part of the persisted state format.

pub mod context;
pub mod list;
pub mod map;
pub mod sheets;

pub use context::{ChangeSet, Checkpoint, MemoryStorage, StorageContext, StorageExt};
pub use list::{ListError, StorageList};
pub use map::StorageMap;
pub use sheets::{BalanceSheet, OwnershipSheet};
