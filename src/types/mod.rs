//! Primitive value types shared by the engine.
//!
//! - [`encoding`]: deterministic binary codec and varints
//! - [`hash`]: 32-byte SHA3-256 [`hash::Hash`]
//! - [`address`]: 34-byte [`address::Address`] with text form
//! - [`timestamp`]: logical transaction time

pub mod address;
pub mod encoding;
pub mod hash;
pub mod timestamp;
