//! Lifecycle hooks the engine invokes on account scripts and token scripts.

use crate::contract::abi::{ContractMethod, ContractParameter};
use crate::virtual_machine::object::VMType;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AccountTrigger {
    OnMint,
    OnBurn,
    OnSend,
    OnReceive,
    OnWitness,
    OnUpgrade,
    OnMigrate,
    OnKill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TokenTrigger {
    OnMint,
    OnBurn,
    OnSend,
    OnReceive,
    OnInfuse,
    OnUpgrade,
    OnSeries,
    OnWrite,
    OnMigrate,
    OnKill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerResult {
    /// The ABI does not declare the trigger.
    Missing,
    /// The trigger ran and rejected the action.
    Failure,
    Success,
}

impl TriggerResult {
    /// Missing counts as permission for most call sites.
    pub fn allows(self) -> bool {
        self != TriggerResult::Failure
    }
}

/// Formal parameter shapes shared by both trigger families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerShape {
    /// `(from: Object)`
    Address,
    /// `(from: Object, to: Object, symbol: String, amount: Number)`
    Transfer,
    /// `(from: Object, to: Object)`
    Pair,
    /// `(from: Object, to: Object, symbol: String, id: Number)`
    TokenData,
}

impl TriggerShape {
    pub fn parameters(self) -> Vec<ContractParameter> {
        let from = ContractParameter::new("from", VMType::Object);
        let to = ContractParameter::new("to", VMType::Object);
        match self {
            TriggerShape::Address => vec![from],
            TriggerShape::Pair => vec![from, to],
            TriggerShape::Transfer => vec![
                from,
                to,
                ContractParameter::new("symbol", VMType::String),
                ContractParameter::new("amount", VMType::Number),
            ],
            TriggerShape::TokenData => vec![
                from,
                to,
                ContractParameter::new("symbol", VMType::String),
                ContractParameter::new("id", VMType::Number),
            ],
        }
    }
}

/// Shared surface of [`AccountTrigger`] and [`TokenTrigger`].
pub trait Trigger: Copy + Ord {
    fn name(self) -> &'static str;
    fn shape(self) -> TriggerShape;

    /// ABI entry for this trigger starting at `offset`.
    fn method(self, offset: i32) -> ContractMethod {
        ContractMethod::new(self.name(), VMType::None, offset, self.shape().parameters())
    }
}

impl Trigger for AccountTrigger {
    fn name(self) -> &'static str {
        match self {
            AccountTrigger::OnMint => "OnMint",
            AccountTrigger::OnBurn => "OnBurn",
            AccountTrigger::OnSend => "OnSend",
            AccountTrigger::OnReceive => "OnReceive",
            AccountTrigger::OnWitness => "OnWitness",
            AccountTrigger::OnUpgrade => "OnUpgrade",
            AccountTrigger::OnMigrate => "OnMigrate",
            AccountTrigger::OnKill => "OnKill",
        }
    }

    fn shape(self) -> TriggerShape {
        match self {
            AccountTrigger::OnWitness | AccountTrigger::OnUpgrade | AccountTrigger::OnKill => TriggerShape::Address,
            AccountTrigger::OnMint | AccountTrigger::OnBurn | AccountTrigger::OnSend | AccountTrigger::OnReceive => {
                TriggerShape::Transfer
            }
            AccountTrigger::OnMigrate => TriggerShape::Pair,
        }
    }
}

impl Trigger for TokenTrigger {
    fn name(self) -> &'static str {
        match self {
            TokenTrigger::OnMint => "OnMint",
            TokenTrigger::OnBurn => "OnBurn",
            TokenTrigger::OnSend => "OnSend",
            TokenTrigger::OnReceive => "OnReceive",
            TokenTrigger::OnInfuse => "OnInfuse",
            TokenTrigger::OnUpgrade => "OnUpgrade",
            TokenTrigger::OnSeries => "OnSeries",
            TokenTrigger::OnWrite => "OnWrite",
            TokenTrigger::OnMigrate => "OnMigrate",
            TokenTrigger::OnKill => "OnKill",
        }
    }

    fn shape(self) -> TriggerShape {
        match self {
            TokenTrigger::OnUpgrade | TokenTrigger::OnKill | TokenTrigger::OnSeries => TriggerShape::Address,
            TokenTrigger::OnMint | TokenTrigger::OnBurn | TokenTrigger::OnSend | TokenTrigger::OnReceive => {
                TriggerShape::Transfer
            }
            TokenTrigger::OnInfuse | TokenTrigger::OnWrite => TriggerShape::TokenData,
            TokenTrigger::OnMigrate => TriggerShape::Pair,
        }
    }
}

impl fmt::Display for AccountTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for TokenTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds ABI methods for a set of triggers and their bytecode offsets.
pub fn get_triggers_for_abi<T: Trigger>(triggers: &BTreeMap<T, i32>) -> Vec<ContractMethod> {
    triggers
        .iter()
        .map(|(trigger, offset)| trigger.method(*offset))
        .collect()
}

/// `OnMigrate(from, to)` signature used to detect the hook before calling it.
pub fn migrate_signature() -> ContractMethod {
    AccountTrigger::OnMigrate.method(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_trigger_shapes() {
        let mut entries = BTreeMap::new();
        entries.insert(AccountTrigger::OnWitness, 0);
        entries.insert(AccountTrigger::OnSend, 17);
        let methods = get_triggers_for_abi(&entries);
        assert_eq!(methods.len(), 2);

        let send = methods.iter().find(|m| m.name == "OnSend").unwrap();
        assert_eq!(send.offset, 17);
        let kinds: Vec<_> = send.parameters.iter().map(|p| p.kind).collect();
        assert_eq!(kinds, vec![VMType::Object, VMType::Object, VMType::String, VMType::Number]);

        let witness = methods.iter().find(|m| m.name == "OnWitness").unwrap();
        assert_eq!(witness.parameters.len(), 1);
        assert_eq!(witness.parameters[0].name, "from");
    }

    #[test]
    fn migrate_takes_two_addresses() {
        let signature = migrate_signature();
        assert_eq!(signature.name, "OnMigrate");
        assert_eq!(signature.parameters.len(), 2);
        assert_eq!(TokenTrigger::OnMigrate.method(4).parameters, signature.parameters);
    }

    #[test]
    fn only_failure_denies() {
        assert!(TriggerResult::Missing.allows());
        assert!(TriggerResult::Success.allows());
        assert!(!TriggerResult::Failure.allows());
    }

    #[test]
    fn token_triggers_are_recognised_as_triggers() {
        assert!(TokenTrigger::OnInfuse.method(0).is_trigger());
        assert_eq!(TokenTrigger::OnWrite.to_string(), "OnWrite");
    }
}
