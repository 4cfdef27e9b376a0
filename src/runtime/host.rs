//! The transaction host: storage, oracle and events behind the VM, and the
//! [`Runtime`] capability handed to interops and native contracts.

use crate::chain::nexus::Nexus;
use crate::chain::token::TokenInfo;
use crate::config::EngineConfig;
use crate::contract::abi::{ContractInterface, ContractMethod};
use crate::contract::event::{Event, EventKind, TokenEventData};
use crate::contract::native::{self, AccountContract, NATIVE_CALL_GAS};
use crate::contract::trigger::{AccountTrigger, TokenTrigger, Trigger, TriggerResult};
use crate::oracle::OracleReader;
use crate::runtime::capability::Runtime;
use crate::runtime::interop::{runtime_interop, RuntimeHandler};
use crate::runtime::transaction::Transaction;
use crate::storage::context::{ChangeSet, StorageContext};
use crate::storage::sheets::{BalanceSheet, OwnershipSheet};
use crate::types::address::Address;
use crate::types::encoding::Encode;
use crate::types::hash::Hash;
use crate::types::timestamp::Timestamp;
use crate::virtual_machine::context::{ExecutionContext, NativeContractKind};
use crate::virtual_machine::errors::{expect, VMError};
use crate::virtual_machine::object::VMObject;
use crate::virtual_machine::vm::gas::GasCategory;
use crate::virtual_machine::vm::{ExecutionState, Host, VirtualMachine};
use num_bigint::BigInt;
use num_traits::Signed;

/// Everything a transaction can touch while it runs.
///
/// Writes go to a [`ChangeSet`] over the committed state; the caller decides
/// whether to keep them once the VM stops.
pub struct RuntimeHost<'a> {
    config: &'a EngineConfig,
    tx: &'a Transaction,
    oracle: &'a OracleReader,
    nexus: Nexus,
    changes: ChangeSet<'a>,
    events: Vec<Event>,
    trigger_depth: usize,
}

impl<'a> RuntimeHost<'a> {
    pub fn new(
        config: &'a EngineConfig,
        tx: &'a Transaction,
        oracle: &'a OracleReader,
        state: &'a dyn StorageContext,
    ) -> Self {
        Self {
            config,
            tx,
            oracle,
            nexus: Nexus::new(&config.nexus_name),
            changes: ChangeSet::new(state),
            events: Vec::new(),
            trigger_depth: 0,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn into_parts(self) -> (Vec<(Vec<u8>, Option<Vec<u8>>)>, Vec<Event>) {
        (self.changes.into_writes(), self.events)
    }

    fn runtime<'r>(&'r mut self, vm: &'r mut VirtualMachine) -> RuntimeContext<'r, 'a> {
        RuntimeContext { vm, host: self }
    }
}

impl Host for RuntimeHost<'_> {
    fn execute_interop(&mut self, vm: &mut VirtualMachine, method: &str) -> Result<ExecutionState, VMError> {
        let entry = runtime_interop(method).ok_or_else(|| VMError::UnknownInterop(method.to_string()))?;
        vm.consume_gas(entry.gas, GasCategory::Interop)?;
        match entry.handler {
            RuntimeHandler::Value(handler) => handler(vm)?,
            RuntimeHandler::Runtime(handler) => handler(&mut self.runtime(vm))?,
        }
        Ok(ExecutionState::Running)
    }

    fn execute_native(&mut self, vm: &mut VirtualMachine, kind: NativeContractKind) -> Result<ExecutionState, VMError> {
        vm.consume_gas(NATIVE_CALL_GAS, GasCategory::NativeCall)?;
        native::execute(&mut self.runtime(vm), kind)?;
        Ok(ExecutionState::Halt)
    }

    /// Resolution order: native contracts, deployed contracts, token
    /// scripts, then account scripts by address text.
    fn load_context(&mut self, name: &str) -> Option<ExecutionContext> {
        if let Some(kind) = NativeContractKind::from_name(name) {
            return Some(ExecutionContext::native(kind));
        }
        if let Ok(Some(contract)) = self.nexus.get_contract(&self.changes, name) {
            return Some(ExecutionContext::script(name, contract.script));
        }
        if let Ok(token) = self.nexus.get_token(&self.changes, name) {
            if token.has_script() {
                return Some(ExecutionContext::script(name, token.script));
            }
        }
        let address = Address::from_text(name).ok()?;
        match AccountContract::lookup_script(&self.changes, &address) {
            Ok(Some((script, _))) => Some(ExecutionContext::script(name, script)),
            _ => None,
        }
    }
}

/// [`Runtime`] over one VM and the host it runs on.
pub struct RuntimeContext<'r, 'a> {
    vm: &'r mut VirtualMachine,
    host: &'r mut RuntimeHost<'a>,
}

impl RuntimeContext<'_, '_> {
    fn token_trigger(&mut self, token: &TokenInfo, trigger: TokenTrigger, args: &[VMObject]) -> Result<TriggerResult, VMError> {
        if !token.has_script() {
            return Ok(TriggerResult::Missing);
        }
        self.invoke_trigger(&token.script, &token.symbol, &token.abi, trigger.name(), args)
    }

    fn account_trigger(&mut self, address: &Address, trigger: AccountTrigger, args: &[VMObject]) -> Result<TriggerResult, VMError> {
        let Some((script, abi)) = AccountContract::lookup_script(&self.host.changes, address)? else {
            return Ok(TriggerResult::Missing);
        };
        self.invoke_trigger(&script, &address.text(), &abi, trigger.name(), args)
    }

    /// Runs the token trigger then the account trigger of `address`; both must allow.
    fn check_triggers(
        &mut self,
        token: &TokenInfo,
        address: &Address,
        triggers: (TokenTrigger, AccountTrigger),
        args: &[VMObject],
    ) -> Result<(), VMError> {
        let (token_trigger, account_trigger) = triggers;
        let result = self.token_trigger(token, token_trigger, args)?;
        expect(result.allows(), format!("token {token_trigger} trigger failed"))?;
        let result = self.account_trigger(address, account_trigger, args)?;
        expect(result.allows(), format!("account {account_trigger} trigger failed"))
    }

    fn emit_token_event(&mut self, kind: EventKind, address: &Address, symbol: &str, value: &BigInt) -> Result<(), VMError> {
        let data = TokenEventData::new(symbol, value.clone(), &self.host.tx.chain);
        self.notify(kind, address, data.to_bytes())
    }
}

impl Runtime for RuntimeContext<'_, '_> {
    fn pop(&mut self) -> Result<VMObject, VMError> {
        self.vm.pop()
    }

    fn push(&mut self, value: VMObject) -> Result<(), VMError> {
        self.vm.push(value)
    }

    fn time(&self) -> Timestamp {
        self.host.tx.time
    }

    fn chain_name(&self) -> &str {
        &self.host.tx.chain
    }

    fn transaction_hash(&self) -> Hash {
        self.host.tx.hash
    }

    fn current_context_name(&self) -> Option<String> {
        self.vm.current_context_name().map(str::to_string)
    }

    fn previous_context_name(&self) -> Option<String> {
        self.vm.previous_context_name().map(str::to_string)
    }

    fn is_trigger(&self) -> bool {
        self.host.trigger_depth > 0
    }

    fn nexus(&self) -> &Nexus {
        &self.host.nexus
    }

    fn storage(&self) -> &dyn StorageContext {
        &self.host.changes
    }

    fn storage_mut(&mut self) -> &mut dyn StorageContext {
        &mut self.host.changes
    }

    fn transfer_tokens(&mut self, symbol: &str, from: &Address, to: &Address, amount: &BigInt) -> Result<(), VMError> {
        expect(amount.is_positive(), "invalid amount")?;
        expect(from != to, "source and destination must be different")?;
        expect(!to.is_null(), "invalid destination")?;

        let token = self.get_token(symbol)?;
        expect(token.is_fungible(), "token must be fungible")?;
        expect(token.is_transferable(), "token must be transferable")?;

        let sheet = BalanceSheet::new(symbol);
        expect(sheet.subtract(&mut self.host.changes, from, amount)?, "insufficient balance")?;
        sheet.add(&mut self.host.changes, to, amount)?;

        let args = [
            VMObject::from(*from),
            VMObject::from(*to),
            VMObject::from(symbol),
            VMObject::Number(amount.clone()),
        ];
        self.check_triggers(&token, from, (TokenTrigger::OnSend, AccountTrigger::OnSend), &args)?;
        self.check_triggers(&token, to, (TokenTrigger::OnReceive, AccountTrigger::OnReceive), &args)?;

        self.emit_token_event(EventKind::TokenSend, from, symbol, amount)?;
        self.emit_token_event(EventKind::TokenReceive, to, symbol, amount)
    }

    fn transfer_token(&mut self, symbol: &str, from: &Address, to: &Address, id: &BigInt) -> Result<(), VMError> {
        expect(from != to, "source and destination must be different")?;
        expect(!to.is_null(), "invalid destination")?;

        let token = self.get_token(symbol)?;
        expect(!token.is_fungible(), "token must be non-fungible")?;
        expect(token.is_transferable(), "token must be transferable")?;

        let sheet = OwnershipSheet::new(symbol);
        expect(sheet.remove(&mut self.host.changes, from, id)?, "source does not own token")?;
        expect(sheet.add(&mut self.host.changes, to, id)?, "could not assign token")?;

        let args = [
            VMObject::from(*from),
            VMObject::from(*to),
            VMObject::from(symbol),
            VMObject::Number(id.clone()),
        ];
        self.check_triggers(&token, from, (TokenTrigger::OnSend, AccountTrigger::OnSend), &args)?;
        self.check_triggers(&token, to, (TokenTrigger::OnReceive, AccountTrigger::OnReceive), &args)?;

        self.emit_token_event(EventKind::TokenSend, from, symbol, id)?;
        self.emit_token_event(EventKind::TokenReceive, to, symbol, id)
    }

    fn mint_tokens(&mut self, symbol: &str, from: &Address, to: &Address, amount: &BigInt) -> Result<(), VMError> {
        expect(amount.is_positive(), "invalid amount")?;
        expect(!to.is_null(), "invalid destination")?;

        let token = self.get_token(symbol)?;
        expect(token.is_fungible(), "token must be fungible")?;

        BalanceSheet::new(symbol).add(&mut self.host.changes, to, amount)?;

        let args = [
            VMObject::from(*from),
            VMObject::from(*to),
            VMObject::from(symbol),
            VMObject::Number(amount.clone()),
        ];
        self.check_triggers(&token, to, (TokenTrigger::OnMint, AccountTrigger::OnMint), &args)?;
        self.emit_token_event(EventKind::TokenMint, to, symbol, amount)
    }

    /// The running context witnesses for itself. A user with an account
    /// script answers through `OnWitness`; otherwise the signer list decides.
    fn is_witness(&mut self, address: &Address) -> Result<bool, VMError> {
        if self.current_address() == *address {
            return Ok(true);
        }

        if let Some((script, abi)) = AccountContract::lookup_script(&self.host.changes, address)? {
            let args = [VMObject::from(*address)];
            match self.invoke_trigger(&script, &address.text(), &abi, AccountTrigger::OnWitness.name(), &args)? {
                TriggerResult::Success => return Ok(true),
                TriggerResult::Failure => return Ok(false),
                TriggerResult::Missing => {}
            }
        }

        Ok(self.host.tx.is_signed_by(address))
    }

    fn notify(&mut self, kind: EventKind, address: &Address, data: Vec<u8>) -> Result<(), VMError> {
        let contract = self.vm.current_context_name().unwrap_or(self.vm.entry_context_name()).to_string();
        crate::debug!("event {kind:?} for {} from {contract}", address.text());
        self.host.events.push(Event::new(kind, *address, &contract, data));
        Ok(())
    }

    fn call_context(&mut self, name: &str, method: &ContractMethod, args: &[VMObject]) -> Result<VMObject, VMError> {
        let offset = method.entry_offset().ok_or_else(|| VMError::UnknownMethod {
            context: name.to_string(),
            method: method.name.clone(),
        })?;
        self.vm.call_context(&mut *self.host, name, offset, args)
    }

    fn call_native_context(
        &mut self,
        kind: NativeContractKind,
        method: &str,
        args: &[VMObject],
    ) -> Result<VMObject, VMError> {
        self.vm.call_native_context(&mut *self.host, kind, method, args)
    }

    fn invoke_trigger(
        &mut self,
        script: &[u8],
        context_name: &str,
        abi: &ContractInterface,
        trigger: &str,
        args: &[VMObject],
    ) -> Result<TriggerResult, VMError> {
        let Some((method, offset)) = abi
            .find_method(trigger)
            .and_then(|method| method.entry_offset().map(|offset| (method, offset)))
        else {
            return Ok(TriggerResult::Missing);
        };
        if method.parameters.len() != args.len() {
            return Err(VMError::TriggerArity {
                context: context_name.to_string(),
                trigger: trigger.to_string(),
                declared: method.parameters.len(),
                given: args.len(),
            });
        }

        let checkpoint = self.host.changes.checkpoint();
        let event_mark = self.host.events.len();

        let mut nested = VirtualMachine::new(self.host.config, script.to_vec(), offset, context_name)
            .with_gas_limit(self.vm.remaining_gas())
            .with_depth_base(self.vm.depth())
            .with_call_depth_base(self.vm.call_depth());
        for arg in args.iter().rev() {
            nested.push(arg.clone())?;
        }

        self.host.trigger_depth += 1;
        let outcome = nested.execute(&mut *self.host);
        self.host.trigger_depth -= 1;
        self.vm.consume_gas(nested.used_gas(), GasCategory::Trigger)?;

        let result = match outcome {
            Ok(ExecutionState::Halt) if matches!(nested.peek(), Some(VMObject::Bool(false))) => TriggerResult::Failure,
            Ok(ExecutionState::Halt) => TriggerResult::Success,
            Ok(_) => TriggerResult::Failure,
            Err(err) if err.is_resource_exhaustion() => return Err(err),
            Err(err) => {
                crate::debug!("trigger {trigger} of {context_name} failed: {err}");
                TriggerResult::Failure
            }
        };

        if result == TriggerResult::Failure {
            self.host.changes.rollback_to(checkpoint);
            self.host.events.truncate(event_mark);
        }
        Ok(result)
    }

    fn read_oracle(&mut self, url: &str) -> Result<Vec<u8>, VMError> {
        Ok(self.host.oracle.read(&self.host.nexus, &self.host.changes, self.host.tx.time, url)?)
    }

    fn consume_gas(&mut self, amount: u64, category: GasCategory) -> Result<(), VMError> {
        self.vm.consume_gas(amount, category)
    }
}

