//! Static interop tables reached through `EXTCALL`.
//!
//! Every entry carries its gas cost, charged before the handler runs.
//! Handlers list their pop order; arguments are pushed by the caller in
//! reverse so the first one listed is on top.

use crate::contract::abi::ContractInterface;
use crate::contract::event::EventKind;
use crate::runtime::capability::Runtime;
use crate::runtime::description::DescriptionSource;
use crate::types::address::Address;
use crate::types::encoding::{Decode, Encode};
use crate::utils::units::format_decimal;
use crate::utils::validation::ENTRY_CONTEXT_NAME;
use crate::virtual_machine::errors::{expect, VMError};
use crate::virtual_machine::object::{InteropValue, VMObject};
use crate::virtual_machine::vm::gas::GasCategory;
use crate::virtual_machine::vm::VirtualMachine;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

pub struct InteropEntry<H: 'static> {
    pub name: &'static str,
    pub gas: u64,
    pub handler: H,
}

type ValueFn = fn(&mut VirtualMachine) -> Result<(), VMError>;

/// Handlers of the transaction runtime. Constructors only touch the stack.
#[derive(Clone, Copy)]
pub enum RuntimeHandler {
    Value(ValueFn),
    Runtime(fn(&mut dyn Runtime) -> Result<(), VMError>),
}

/// Handlers of the description VM, which sees token metadata and nothing else.
#[derive(Clone, Copy)]
pub enum DescriptionHandler {
    Value(ValueFn),
    Format(fn(&mut VirtualMachine, &dyn DescriptionSource) -> Result<(), VMError>),
}

const CONSTRUCTOR_GAS: u64 = 5;

/// Gas per byte written by `Data.Set`.
pub const STORE_GAS_PER_BYTE: u64 = 1;

pub static RUNTIME_INTEROPS: &[InteropEntry<RuntimeHandler>] = &[
    InteropEntry { name: "Address()", gas: CONSTRUCTOR_GAS, handler: RuntimeHandler::Value(construct_address) },
    InteropEntry { name: "Hash()", gas: CONSTRUCTOR_GAS, handler: RuntimeHandler::Value(construct_hash) },
    InteropEntry { name: "Timestamp()", gas: CONSTRUCTOR_GAS, handler: RuntimeHandler::Value(construct_timestamp) },
    InteropEntry { name: "ABI()", gas: CONSTRUCTOR_GAS, handler: RuntimeHandler::Value(construct_abi) },
    InteropEntry { name: "Runtime.Time", gas: 5, handler: RuntimeHandler::Runtime(runtime_time) },
    InteropEntry { name: "Runtime.Log", gas: 10, handler: RuntimeHandler::Runtime(runtime_log) },
    InteropEntry { name: "Runtime.Notify", gas: 50, handler: RuntimeHandler::Runtime(runtime_notify) },
    InteropEntry { name: "Runtime.Event", gas: 50, handler: RuntimeHandler::Runtime(runtime_event) },
    InteropEntry { name: "Runtime.IsWitness", gas: 20, handler: RuntimeHandler::Runtime(runtime_is_witness) },
    InteropEntry { name: "Runtime.IsTrigger", gas: 5, handler: RuntimeHandler::Runtime(runtime_is_trigger) },
    InteropEntry { name: "Runtime.GetBalance", gas: 20, handler: RuntimeHandler::Runtime(runtime_get_balance) },
    InteropEntry {
        name: "Runtime.TransferTokens",
        gas: 100,
        handler: RuntimeHandler::Runtime(runtime_transfer_tokens),
    },
    InteropEntry {
        name: "Runtime.TransferToken",
        gas: 100,
        handler: RuntimeHandler::Runtime(runtime_transfer_token),
    },
    InteropEntry { name: "Oracle.Read", gas: 100, handler: RuntimeHandler::Runtime(oracle_read) },
    InteropEntry { name: "Data.Get", gas: 50, handler: RuntimeHandler::Runtime(data_get) },
    InteropEntry { name: "Data.Set", gas: 100, handler: RuntimeHandler::Runtime(data_set) },
    InteropEntry { name: "Data.Delete", gas: 50, handler: RuntimeHandler::Runtime(data_delete) },
];

pub static DESCRIPTION_INTEROPS: &[InteropEntry<DescriptionHandler>] = &[
    InteropEntry { name: "Address()", gas: CONSTRUCTOR_GAS, handler: DescriptionHandler::Value(construct_address) },
    InteropEntry { name: "Hash()", gas: CONSTRUCTOR_GAS, handler: DescriptionHandler::Value(construct_hash) },
    InteropEntry { name: "Timestamp()", gas: CONSTRUCTOR_GAS, handler: DescriptionHandler::Value(construct_timestamp) },
    InteropEntry { name: "ABI()", gas: CONSTRUCTOR_GAS, handler: DescriptionHandler::Value(construct_abi) },
    InteropEntry { name: "Format.Decimals", gas: 5, handler: DescriptionHandler::Format(format_decimals) },
    InteropEntry { name: "Format.Account", gas: 5, handler: DescriptionHandler::Format(format_account) },
    InteropEntry { name: "Format.Symbol", gas: 5, handler: DescriptionHandler::Format(format_symbol) },
];

type Index<H> = HashMap<&'static str, &'static InteropEntry<H>>;

fn index<H>(table: &'static [InteropEntry<H>]) -> Index<H> {
    table.iter().map(|entry| (entry.name, entry)).collect()
}

pub fn runtime_interop(name: &str) -> Option<&'static InteropEntry<RuntimeHandler>> {
    static INDEX: OnceLock<Index<RuntimeHandler>> = OnceLock::new();
    INDEX.get_or_init(|| index(RUNTIME_INTEROPS)).get(name).copied()
}

pub fn description_interop(name: &str) -> Option<&'static InteropEntry<DescriptionHandler>> {
    static INDEX: OnceLock<Index<DescriptionHandler>> = OnceLock::new();
    INDEX.get_or_init(|| index(DESCRIPTION_INTEROPS)).get(name).copied()
}

/// Decodes an address argument: valid text, serialized bytes or an
/// address handle.
pub fn decode_address(value: &VMObject) -> Result<Address, VMError> {
    match value {
        VMObject::String(text) => {
            expect(Address::is_valid_text(text), "expected valid address")?;
            Ok(Address::from_text(text)?)
        }
        VMObject::Bytes(bytes) => Ok(Address::from_bytes(bytes)?),
        VMObject::Object(InteropValue::Address(address)) => Ok(*address),
        other => Err(VMError::InvalidCast {
            from: other.type_name(),
            to: "Address",
        }),
    }
}

// Constructors

/// Pops: text, bytes or address.
fn construct_address(vm: &mut VirtualMachine) -> Result<(), VMError> {
    let value = vm.pop()?;
    let address = decode_address(&value)?;
    vm.push(VMObject::from(address))
}

/// Pops: hex text or 32 bytes.
fn construct_hash(vm: &mut VirtualMachine) -> Result<(), VMError> {
    let hash = vm.pop()?.as_hash()?;
    vm.push(VMObject::from(hash))
}

/// Pops: seconds.
fn construct_timestamp(vm: &mut VirtualMachine) -> Result<(), VMError> {
    let time = vm.pop()?.as_timestamp()?;
    vm.push(VMObject::Timestamp(time))
}

/// Pops: serialized ABI bytes.
fn construct_abi(vm: &mut VirtualMachine) -> Result<(), VMError> {
    let bytes = vm.pop_bytes()?;
    let abi = ContractInterface::from_bytes(&bytes)?;
    vm.push(VMObject::Object(InteropValue::Abi(abi)))
}

// Runtime

fn runtime_time(rt: &mut dyn Runtime) -> Result<(), VMError> {
    let time = rt.time();
    rt.push(VMObject::Timestamp(time))
}

/// Pops: message.
fn runtime_log(rt: &mut dyn Runtime) -> Result<(), VMError> {
    let message = rt.pop_string()?;
    let context = rt.current_context_name().unwrap_or_default();
    crate::info!("[{context}] {message}");
    let address = rt.current_address();
    rt.notify(EventKind::Log, &address, message.into_bytes())
}

/// Pops: kind, address, value.
fn runtime_notify(rt: &mut dyn Runtime) -> Result<(), VMError> {
    let raw = rt.pop()?.as_enum()?;
    let kind = u8::try_from(raw)
        .ok()
        .and_then(EventKind::from_u8)
        .ok_or_else(|| VMError::InvalidValue(format!("event kind {raw}")))?;
    expect(!kind.is_system(), "system events cannot be raised by scripts")?;

    let address = rt.pop_address()?;
    let value = rt.pop()?;
    rt.notify(kind, &address, value.to_bytes())
}

/// Pops: name, address, value.
fn runtime_event(rt: &mut dyn Runtime) -> Result<(), VMError> {
    let name = rt.pop_string()?;
    let address = rt.pop_address()?;
    let value = rt.pop()?;

    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), VMObject::String(name));
    fields.insert("value".to_string(), value);
    rt.notify(EventKind::Custom, &address, VMObject::Struct(fields).to_bytes())
}

/// Pops: address.
fn runtime_is_witness(rt: &mut dyn Runtime) -> Result<(), VMError> {
    let address = rt.pop_address()?;
    let witness = rt.is_witness(&address)?;
    rt.push(VMObject::Bool(witness))
}

fn runtime_is_trigger(rt: &mut dyn Runtime) -> Result<(), VMError> {
    let trigger = rt.is_trigger();
    rt.push(VMObject::Bool(trigger))
}

/// Pops: address, symbol.
fn runtime_get_balance(rt: &mut dyn Runtime) -> Result<(), VMError> {
    let address = rt.pop_address()?;
    let symbol = rt.pop_string()?;
    expect(rt.token_exists(&symbol), "invalid token")?;
    let balance = rt.get_balance(&symbol, &address)?;
    rt.push(VMObject::Number(balance))
}

/// Pops: source, destination, symbol, amount.
fn runtime_transfer_tokens(rt: &mut dyn Runtime) -> Result<(), VMError> {
    let source = rt.pop_address()?;
    let destination = rt.pop_address()?;
    let symbol = rt.pop_string()?;
    let amount = rt.pop_number()?;

    expect(rt.token_exists(&symbol), "invalid token")?;
    expect(rt.is_witness(&source)?, "invalid witness")?;
    rt.transfer_tokens(&symbol, &source, &destination, &amount)
}

/// Pops: source, destination, symbol, id.
fn runtime_transfer_token(rt: &mut dyn Runtime) -> Result<(), VMError> {
    let source = rt.pop_address()?;
    let destination = rt.pop_address()?;
    let symbol = rt.pop_string()?;
    let id = rt.pop_number()?;

    expect(rt.token_exists(&symbol), "invalid token")?;
    expect(rt.is_witness(&source)?, "invalid witness")?;
    rt.transfer_token(&symbol, &source, &destination, &id)
}

/// Pops: url. Pushes the raw answer bytes.
fn oracle_read(rt: &mut dyn Runtime) -> Result<(), VMError> {
    let url = rt.pop_string()?;
    let content = rt.read_oracle(&url)?;
    rt.push(VMObject::Bytes(content))
}

// Data

fn data_key(context: &str, field: &str) -> Vec<u8> {
    format!("{context}.{field}").into_bytes()
}

/// Context allowed to write contract data; transaction scripts own none.
fn writable_context(rt: &dyn Runtime) -> Result<String, VMError> {
    let context = rt.current_context_name().unwrap_or_default();
    expect(
        !context.is_empty() && context != ENTRY_CONTEXT_NAME,
        "contract data can only be written by a contract",
    )?;
    Ok(context)
}

/// Pops: context name, field. Pushes the stored value or `None`.
fn data_get(rt: &mut dyn Runtime) -> Result<(), VMError> {
    let context = rt.pop_string()?;
    let field = rt.pop_string()?;
    let value = match rt.storage().get(&data_key(&context, &field)) {
        Some(bytes) => VMObject::from_bytes(&bytes)?,
        None => VMObject::None,
    };
    rt.push(value)
}

/// Pops: field, value. Writes under the current context.
fn data_set(rt: &mut dyn Runtime) -> Result<(), VMError> {
    let field = rt.pop_string()?;
    let value = rt.pop()?;
    let context = writable_context(rt)?;

    let bytes = value.to_bytes();
    rt.consume_gas(bytes.len() as u64 * STORE_GAS_PER_BYTE, GasCategory::StateStore)?;
    rt.storage_mut().put(&data_key(&context, &field), bytes);
    Ok(())
}

/// Pops: field.
fn data_delete(rt: &mut dyn Runtime) -> Result<(), VMError> {
    let field = rt.pop_string()?;
    let context = writable_context(rt)?;
    rt.storage_mut().delete(&data_key(&context, &field));
    Ok(())
}

// Format

/// Pops: amount, symbol.
fn format_decimals(vm: &mut VirtualMachine, source: &dyn DescriptionSource) -> Result<(), VMError> {
    let amount = vm.pop_number()?;
    let symbol = vm.pop_string()?;
    let token = source
        .fetch_token(&symbol)
        .ok_or_else(|| VMError::Rejected(format!("unknown token: {symbol}")))?;
    let text = format!("{} {}", format_decimal(&amount, token.decimals), token.symbol);
    vm.push(VMObject::String(text))
}

/// Pops: address.
fn format_account(vm: &mut VirtualMachine, source: &dyn DescriptionSource) -> Result<(), VMError> {
    let value = vm.pop()?;
    let address = decode_address(&value)?;
    vm.push(VMObject::String(source.output_address(&address)))
}

/// Pops: symbol.
fn format_symbol(vm: &mut VirtualMachine, source: &dyn DescriptionSource) -> Result<(), VMError> {
    let symbol = vm.pop_string()?;
    vm.push(VMObject::String(source.output_symbol(&symbol)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn runtime_table_covers_every_interop() {
        let expected = [
            "Address()",
            "Hash()",
            "Timestamp()",
            "ABI()",
            "Runtime.Time",
            "Runtime.Log",
            "Runtime.Notify",
            "Runtime.Event",
            "Runtime.IsWitness",
            "Runtime.IsTrigger",
            "Runtime.GetBalance",
            "Runtime.TransferTokens",
            "Runtime.TransferToken",
            "Oracle.Read",
            "Data.Get",
            "Data.Set",
            "Data.Delete",
        ];
        for name in expected {
            assert!(runtime_interop(name).is_some(), "{name}");
        }
        assert_eq!(RUNTIME_INTEROPS.len(), expected.len());
        assert!(runtime_interop("Format.Decimals").is_none());
    }

    #[test]
    fn description_table_is_restricted() {
        for name in ["Address()", "Hash()", "Timestamp()", "ABI()", "Format.Decimals", "Format.Account", "Format.Symbol"] {
            assert!(description_interop(name).is_some(), "{name}");
        }
        for name in ["Runtime.TransferTokens", "Data.Set", "Oracle.Read"] {
            assert!(description_interop(name).is_none(), "{name}");
        }
    }

    #[test]
    fn names_are_unique_and_priced() {
        let mut seen = HashSet::new();
        for entry in RUNTIME_INTEROPS {
            assert!(seen.insert(entry.name), "duplicate {}", entry.name);
            assert!(entry.gas > 0);
        }
    }

    #[test]
    fn address_decoding_accepts_three_forms() {
        let address = crate::utils::test_utils::utils::user_address(4);
        assert_eq!(decode_address(&VMObject::String(address.text())).ok(), Some(address));
        assert_eq!(decode_address(&VMObject::Bytes(address.as_bytes().to_vec())).ok(), Some(address));
        assert_eq!(decode_address(&VMObject::from(address)).ok(), Some(address));

        let err = decode_address(&VMObject::String("not an address".into())).unwrap_err();
        assert!(matches!(err, VMError::Rejected(msg) if msg == "expected valid address"));
        assert!(matches!(
            decode_address(&VMObject::Bool(true)),
            Err(VMError::InvalidCast { to: "Address", .. })
        ));
    }
}
