use crate::contract::abi::ContractInterface;
use crate::types::address::Address;
use nexus_derive::BinaryCodec;
use num_bigint::BigInt;

/// Token capability bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinaryCodec)]
pub struct TokenFlags(pub u32);

impl TokenFlags {
    pub const NONE: TokenFlags = TokenFlags(0);
    pub const TRANSFERABLE: TokenFlags = TokenFlags(1 << 0);
    pub const FUNGIBLE: TokenFlags = TokenFlags(1 << 1);
    pub const FINITE: TokenFlags = TokenFlags(1 << 2);
    pub const DIVISIBLE: TokenFlags = TokenFlags(1 << 3);
    pub const FUEL: TokenFlags = TokenFlags(1 << 4);
    pub const STAKABLE: TokenFlags = TokenFlags(1 << 5);
    pub const FIAT: TokenFlags = TokenFlags(1 << 6);
    pub const SWAPPABLE: TokenFlags = TokenFlags(1 << 7);
    pub const BURNABLE: TokenFlags = TokenFlags(1 << 8);
    pub const MINTABLE: TokenFlags = TokenFlags(1 << 9);

    pub const fn union(self, other: TokenFlags) -> TokenFlags {
        TokenFlags(self.0 | other.0)
    }

    pub const fn contains(self, other: TokenFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for TokenFlags {
    type Output = TokenFlags;

    fn bitor(self, rhs: TokenFlags) -> TokenFlags {
        self.union(rhs)
    }
}

/// Registry entry for a token. `script` and `abi` carry the token's
/// trigger code; both are empty for tokens without hooks.
#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct TokenInfo {
    pub symbol: String,
    pub name: String,
    pub owner: Address,
    pub decimals: u8,
    pub flags: TokenFlags,
    /// Zero means unbounded.
    pub max_supply: BigInt,
    pub script: Vec<u8>,
    pub abi: ContractInterface,
}

impl TokenInfo {
    pub fn new(symbol: &str, name: &str, owner: Address, decimals: u8, flags: TokenFlags) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            owner,
            decimals,
            flags,
            max_supply: BigInt::default(),
            script: Vec::new(),
            abi: ContractInterface::empty(),
        }
    }

    pub fn with_script(mut self, script: Vec<u8>, abi: ContractInterface) -> Self {
        self.script = script;
        self.abi = abi;
        self
    }

    pub fn with_max_supply(mut self, max_supply: BigInt) -> Self {
        self.max_supply = max_supply;
        self
    }

    pub fn is_fungible(&self) -> bool {
        self.flags.contains(TokenFlags::FUNGIBLE)
    }

    pub fn is_transferable(&self) -> bool {
        self.flags.contains(TokenFlags::TRANSFERABLE)
    }

    pub fn is_burnable(&self) -> bool {
        self.flags.contains(TokenFlags::BURNABLE)
    }

    pub fn has_script(&self) -> bool {
        !self.script.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encoding::{Decode, Encode};
    use crate::utils::test_utils::utils::user_address;

    #[test]
    fn flags_combine() {
        let flags = TokenFlags::FUNGIBLE | TokenFlags::TRANSFERABLE;
        assert!(flags.contains(TokenFlags::FUNGIBLE));
        assert!(!flags.contains(TokenFlags::FUEL));
        assert!(flags.contains(TokenFlags::NONE));
    }

    #[test]
    fn token_info_encodes() {
        let info = TokenInfo::new("CROWN", "Crown", user_address(4), 0, TokenFlags::TRANSFERABLE)
            .with_max_supply(BigInt::from(100));
        let decoded = TokenInfo::from_bytes(&info.to_bytes()).unwrap();
        assert_eq!(decoded, info);
        assert!(!decoded.is_fungible());
        assert!(!decoded.has_script());
    }
}
