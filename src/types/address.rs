//! 34-byte account, contract and interop addresses.
//!
//! Layout: one kind byte followed by 33 bytes of key material.
//! - user: kind `1`, then a compressed public key
//! - system: kind `2`, a zero byte, then the SHA3 hash of a context name
//! - interop: kind `3`, a platform byte, then a foreign key hash
//!
//! The text form is a kind letter (`P`, `S`, `X`) followed by the 33 key
//! bytes in lowercase hex. The null address is all zeros and prints as `NULL`.

use crate::types::hash::Hash;
use nexus_derive::{BinaryCodec, Error};
use std::fmt;

pub const ADDRESS_LEN: usize = 34;
const KEY_LEN: usize = ADDRESS_LEN - 1;
const NULL_TEXT: &str = "NULL";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must be 34 bytes, got {0}")]
    InvalidLength(usize),
    #[error("unknown address kind {0}")]
    InvalidKind(u8),
    #[error("invalid address text: {0}")]
    InvalidText(String),
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Invalid = 0,
    User = 1,
    System = 2,
    Interop = 3,
}

impl AddressKind {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Invalid),
            1 => Some(Self::User),
            2 => Some(Self::System),
            3 => Some(Self::Interop),
            _ => None,
        }
    }

    fn prefix(self) -> Option<char> {
        match self {
            Self::User => Some('P'),
            Self::System => Some('S'),
            Self::Interop => Some('X'),
            Self::Invalid => None,
        }
    }

    fn from_prefix(c: char) -> Option<Self> {
        match c {
            'P' => Some(Self::User),
            'S' => Some(Self::System),
            'X' => Some(Self::Interop),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BinaryCodec)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const NULL: Address = Address([0u8; ADDRESS_LEN]);

    /// Deterministic system address of a named context.
    pub fn from_hash(name: &str) -> Address {
        let digest = Hash::digest(name.as_bytes());
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[0] = AddressKind::System as u8;
        bytes[2..].copy_from_slice(digest.as_slice());
        Address(bytes)
    }

    /// User address owning the given compressed public key.
    pub fn from_public_key(key: &[u8; KEY_LEN]) -> Address {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[0] = AddressKind::User as u8;
        bytes[1..].copy_from_slice(key);
        Address(bytes)
    }

    /// Address standing for an account on a foreign platform.
    pub fn from_interop(platform: u8, key: &Hash) -> Address {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[0] = AddressKind::Interop as u8;
        bytes[1] = platform;
        bytes[2..].copy_from_slice(key.as_slice());
        Address(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Address, AddressError> {
        let array: [u8; ADDRESS_LEN] = bytes
            .try_into()
            .map_err(|_| AddressError::InvalidLength(bytes.len()))?;
        let kind = AddressKind::from_byte(array[0]).ok_or(AddressError::InvalidKind(array[0]))?;
        if kind == AddressKind::Invalid && array != [0u8; ADDRESS_LEN] {
            return Err(AddressError::InvalidKind(0));
        }
        Ok(Address(array))
    }

    pub fn from_text(text: &str) -> Result<Address, AddressError> {
        if text == NULL_TEXT {
            return Ok(Address::NULL);
        }
        let invalid = || AddressError::InvalidText(text.to_string());
        let mut chars = text.chars();
        let kind = chars.next().and_then(AddressKind::from_prefix).ok_or_else(invalid)?;
        let body = chars.as_str();
        if body.len() != KEY_LEN * 2 {
            return Err(invalid());
        }
        let key = hex::decode(body).map_err(|_| invalid())?;
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[0] = kind as u8;
        bytes[1..].copy_from_slice(&key);
        Ok(Address(bytes))
    }

    /// Text validity check used before decoding addresses from scripts.
    pub fn is_valid_text(text: &str) -> bool {
        Self::from_text(text).is_ok()
    }

    pub fn kind(&self) -> AddressKind {
        AddressKind::from_byte(self.0[0]).unwrap_or(AddressKind::Invalid)
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn is_user(&self) -> bool {
        self.kind() == AddressKind::User
    }

    pub fn is_system(&self) -> bool {
        self.kind() == AddressKind::System
    }

    pub fn is_interop(&self) -> bool {
        self.kind() == AddressKind::Interop
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn text(&self) -> String {
        match self.kind().prefix() {
            Some(prefix) if !self.is_null() => format!("{prefix}{}", hex::encode(&self.0[1..])),
            _ => NULL_TEXT.to_string(),
        }
    }
}

impl Default for Address {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::{Decode, Encode};

    fn user(seed: u8) -> Address {
        Address::from_public_key(&[seed; KEY_LEN])
    }

    #[test]
    fn null_address_is_all_zero_bytes() {
        assert_eq!(Address::NULL.as_bytes(), &[0u8; ADDRESS_LEN]);
        assert_eq!(Address::NULL.to_bytes().len(), ADDRESS_LEN);
        assert_eq!(Address::NULL.text(), "NULL");
    }

    #[test]
    fn from_hash_is_stable_system_address() {
        let a = Address::from_hash("account");
        assert!(a.is_system());
        assert_eq!(a, Address::from_hash("account"));
        assert_ne!(a, Address::from_hash("stake"));
    }

    #[test]
    fn text_round_trip_for_every_kind() {
        for address in [user(7), Address::from_hash("x"), Address::from_interop(4, &Hash::digest(b"k"))] {
            let text = address.text();
            assert!(Address::is_valid_text(&text));
            assert_eq!(Address::from_text(&text).unwrap(), address);
        }
        assert!(user(1).text().starts_with('P'));
    }

    #[test]
    fn invalid_text_is_rejected() {
        assert!(!Address::is_valid_text("P1234"));
        assert!(!Address::is_valid_text(&format!("Q{}", "00".repeat(KEY_LEN))));
        assert!(!Address::is_valid_text(&format!("P{}", "zz".repeat(KEY_LEN))));
    }

    #[test]
    fn from_bytes_checks_length_and_kind() {
        assert_eq!(Address::from_bytes(&[1, 2]), Err(AddressError::InvalidLength(2)));
        let mut bad = [0u8; ADDRESS_LEN];
        bad[0] = 9;
        assert_eq!(Address::from_bytes(&bad), Err(AddressError::InvalidKind(9)));
        assert_eq!(Address::from_bytes(user(3).as_bytes()).unwrap(), user(3));
    }

    #[test]
    fn codec_is_raw_bytes() {
        let a = user(5);
        assert_eq!(a.to_bytes(), a.as_bytes().to_vec());
        assert_eq!(Address::from_bytes(&a.to_bytes()).unwrap(), a);
        assert_eq!(<Address as Decode>::from_bytes(&a.to_bytes()).unwrap(), a);
    }
}
