//! Loadable units of code.
//!
//! A context is either bytecode ([`ScriptContext`]) or a built-in contract
//! implemented by the host ([`NativeContext`]). The set is closed: the VM
//! runs scripts itself and hands native contexts to its host.

use crate::types::address::Address;
use std::fmt;
use std::sync::Arc;

/// Built-in contracts reachable as native contexts.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NativeContractKind {
    Account = 0,
    Stake = 1,
    Validator = 2,
    Storage = 3,
    Market = 4,
    Sale = 5,
    Relay = 6,
    Consensus = 7,
    Friends = 8,
}

impl NativeContractKind {
    pub const ALL: [NativeContractKind; 9] = [
        NativeContractKind::Account,
        NativeContractKind::Stake,
        NativeContractKind::Validator,
        NativeContractKind::Storage,
        NativeContractKind::Market,
        NativeContractKind::Sale,
        NativeContractKind::Relay,
        NativeContractKind::Consensus,
        NativeContractKind::Friends,
    ];

    /// Context name, also used as the storage prefix of the contract.
    pub const fn name(self) -> &'static str {
        match self {
            NativeContractKind::Account => "account",
            NativeContractKind::Stake => "stake",
            NativeContractKind::Validator => "validator",
            NativeContractKind::Storage => "storage",
            NativeContractKind::Market => "market",
            NativeContractKind::Sale => "sale",
            NativeContractKind::Relay => "relay",
            NativeContractKind::Consensus => "consensus",
            NativeContractKind::Friends => "friends",
        }
    }

    pub fn from_name(name: &str) -> Option<NativeContractKind> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn address(self) -> Address {
        Address::from_hash(self.name())
    }

    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::ALL.into_iter().map(NativeContractKind::name)
    }
}

impl fmt::Display for NativeContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptContext {
    pub name: String,
    pub script: Arc<[u8]>,
}

impl ScriptContext {
    pub fn new(name: impl Into<String>, script: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeContext {
    pub kind: NativeContractKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionContext {
    Script(ScriptContext),
    Native(NativeContext),
}

impl ExecutionContext {
    pub fn script(name: impl Into<String>, script: impl Into<Arc<[u8]>>) -> Self {
        ExecutionContext::Script(ScriptContext::new(name, script))
    }

    pub fn native(kind: NativeContractKind) -> Self {
        ExecutionContext::Native(NativeContext { kind })
    }

    pub fn name(&self) -> &str {
        match self {
            ExecutionContext::Script(ctx) => &ctx.name,
            ExecutionContext::Native(ctx) => ctx.kind.name(),
        }
    }

    pub fn address(&self) -> Address {
        Address::from_hash(self.name())
    }
}

impl fmt::Display for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_names_round_trip() {
        for kind in NativeContractKind::ALL {
            assert_eq!(NativeContractKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(NativeContractKind::from_name("gas"), None);
    }

    #[test]
    fn address_is_hash_of_name() {
        let ctx = ExecutionContext::script("my_token", vec![0u8]);
        assert_eq!(ctx.address(), Address::from_hash("my_token"));
        let native = ExecutionContext::native(NativeContractKind::Stake);
        assert_eq!(native.name(), "stake");
        assert_eq!(native.address(), NativeContractKind::Stake.address());
    }
}
