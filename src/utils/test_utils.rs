//! Test fixtures shared across modules.

#[cfg(test)]
pub mod utils {
    use crate::types::address::Address;
    use crate::types::hash::Hash;

    /// Deterministic user address derived from `seed`.
    pub fn user_address(seed: u8) -> Address {
        let mut key = [0u8; 33];
        key[0] = 0x02;
        key[1..].copy_from_slice(Hash::digest(&[seed]).as_slice());
        Address::from_public_key(&key)
    }

    /// Deterministic hash for tests that need distinct transaction or block ids.
    pub fn test_hash(seed: u8) -> Hash {
        Hash::digest(&[0xAA, seed])
    }
}
