//! Sandbox that renders human-readable descriptions of contract calls.
//!
//! Description scripts see token metadata through [`DescriptionSource`] and
//! nothing else: no storage, no natives, no other contexts.

use crate::chain::nexus::Nexus;
use crate::chain::token::TokenInfo;
use crate::config::EngineConfig;
use crate::contract::native::AccountContract;
use crate::runtime::interop::{description_interop, DescriptionHandler};
use crate::storage::context::StorageContext;
use crate::types::address::Address;
use crate::virtual_machine::context::{ExecutionContext, NativeContractKind};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::object::VMObject;
use crate::virtual_machine::vm::gas::GasCategory;
use crate::virtual_machine::vm::{ExecutionState, Host, VirtualMachine};

pub trait DescriptionSource {
    fn fetch_token(&self, symbol: &str) -> Option<TokenInfo>;

    fn output_address(&self, address: &Address) -> String {
        address.text()
    }

    fn output_symbol(&self, symbol: &str) -> String {
        symbol.to_string()
    }
}

/// Answers from committed state: tokens from the registry, addresses by
/// their registered name when they have one.
pub struct StateDescriptionSource<'a> {
    nexus: &'a Nexus,
    storage: &'a dyn StorageContext,
}

impl<'a> StateDescriptionSource<'a> {
    pub fn new(nexus: &'a Nexus, storage: &'a dyn StorageContext) -> Self {
        Self { nexus, storage }
    }
}

impl DescriptionSource for StateDescriptionSource<'_> {
    fn fetch_token(&self, symbol: &str) -> Option<TokenInfo> {
        self.nexus.get_token(self.storage, symbol).ok()
    }

    fn output_address(&self, address: &Address) -> String {
        match AccountContract::name_of(self.storage, address) {
            Ok(Some(name)) => format!("@{name}"),
            _ => address.text(),
        }
    }
}

struct DescriptionHost<'a> {
    source: &'a dyn DescriptionSource,
}

impl Host for DescriptionHost<'_> {
    fn execute_interop(&mut self, vm: &mut VirtualMachine, method: &str) -> Result<ExecutionState, VMError> {
        let entry = description_interop(method).ok_or_else(|| VMError::UnknownInterop(method.to_string()))?;
        vm.consume_gas(entry.gas, GasCategory::Interop)?;
        match entry.handler {
            DescriptionHandler::Value(handler) => handler(vm)?,
            DescriptionHandler::Format(handler) => handler(vm, self.source)?,
        }
        Ok(ExecutionState::Running)
    }

    fn execute_native(&mut self, _vm: &mut VirtualMachine, kind: NativeContractKind) -> Result<ExecutionState, VMError> {
        Err(VMError::UnknownContext(kind.name().to_string()))
    }

    fn load_context(&mut self, _name: &str) -> Option<ExecutionContext> {
        None
    }
}

pub struct DescriptionVM<'a> {
    config: &'a EngineConfig,
    source: &'a dyn DescriptionSource,
}

impl<'a> DescriptionVM<'a> {
    pub fn new(config: &'a EngineConfig, source: &'a dyn DescriptionSource) -> Self {
        Self { config, source }
    }

    /// Runs `script` with `args` (first argument popped first) and returns
    /// the string it leaves on top of the stack.
    pub fn describe(&self, script: &[u8], args: &[VMObject]) -> Result<String, VMError> {
        let mut vm = VirtualMachine::for_script(self.config, script.to_vec());
        for arg in args.iter().rev() {
            vm.push(arg.clone())?;
        }
        let mut host = DescriptionHost { source: self.source };
        match vm.execute(&mut host)? {
            ExecutionState::Halt => vm.pop_string(),
            other => Err(VMError::Rejected(format!("description stopped in state {other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::token::TokenFlags;
    use crate::utils::test_utils::utils::user_address;
    use crate::virtual_machine::assembler::assemble;

    struct Tokens;

    impl DescriptionSource for Tokens {
        fn fetch_token(&self, symbol: &str) -> Option<TokenInfo> {
            (symbol == "CORE").then(|| TokenInfo::new("CORE", "Core", user_address(1), 8, TokenFlags::FUNGIBLE))
        }
    }

    fn describe(source: &str, args: &[VMObject]) -> Result<String, VMError> {
        let asm = assemble(source).expect("assembly failed");
        DescriptionVM::new(&EngineConfig::default(), &Tokens).describe(&asm.bytecode, args)
    }

    #[test]
    fn formats_amounts_with_token_decimals() {
        let text = describe(
            r#"
                pop r0
                load r1 "CORE"
                push r1
                push r0
                extcall "Format.Decimals"
                ret
            "#,
            &[VMObject::from(150_000_000i64)],
        )
        .unwrap();
        assert_eq!(text, "1.5 CORE");
    }

    #[test]
    fn formats_accounts_from_text() {
        let address = user_address(9);
        let text = describe(
            r#"
                extcall "Format.Account"
                ret
            "#,
            &[VMObject::String(address.text())],
        )
        .unwrap();
        assert_eq!(text, address.text());
    }

    #[test]
    fn runtime_interops_are_unavailable() {
        let err = describe(
            r#"
                extcall "Runtime.Time"
                ret
            "#,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, VMError::UnknownInterop(name) if name == "Runtime.Time"));
    }

    #[test]
    fn natives_are_unavailable() {
        let err = describe(
            r#"
                load r0 "IsValidator"
                push r0
                load r1 "validator"
                ctx r1 r2
                switch r2
                ret
            "#,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, VMError::UnknownContext(name) if name == "validator"));
    }

    #[test]
    fn unknown_token_is_rejected() {
        let err = describe(
            r#"
                load r0 "NOPE"
                push r0
                load r1 1
                push r1
                extcall "Format.Decimals"
                ret
            "#,
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, VMError::Rejected(msg) if msg == "unknown token: NOPE"));
    }
}
