//! Contract interfaces: the methods and events a contract exposes.
//!
//! Interfaces are persisted next to contract bytecode, so the encoding is
//! part of the state format:
//! - parameter: `name`, kind tag
//! - method: `name`, return kind tag, `offset` (`i32`, `-1` for natives), parameters
//! - event: `value`, `name`, return kind tag, `description` bytes
//! - interface: methods, then events

use crate::types::encoding::{Decode, DecodeError, Encode, EncodeSink};
use crate::virtual_machine::object::VMType;
use nexus_derive::{BinaryCodec, Error};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    #[error("duplicate method {0} in contract interface")]
    DuplicateMethod(String),
    #[error("invalid contract interface: {0}")]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct ContractParameter {
    pub name: String,
    pub kind: VMType,
}

impl ContractParameter {
    pub fn new(name: &str, kind: VMType) -> Self {
        Self {
            name: name.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct ContractMethod {
    pub name: String,
    pub return_type: VMType,
    /// Bytecode offset of the method body, `-1` when the method is native.
    pub offset: i32,
    pub parameters: Vec<ContractParameter>,
}

impl ContractMethod {
    pub fn new(name: &str, return_type: VMType, offset: i32, parameters: Vec<ContractParameter>) -> Self {
        Self {
            name: name.to_string(),
            return_type,
            offset,
            parameters,
        }
    }

    /// Trigger methods are named `On` followed by an uppercase letter.
    pub fn is_trigger(&self) -> bool {
        let mut chars = self.name.chars();
        chars.next() == Some('O')
            && chars.next() == Some('n')
            && chars.next().is_some_and(|c| c.is_ascii_uppercase())
    }

    /// Entry offset, `None` for native methods.
    pub fn entry_offset(&self) -> Option<usize> {
        usize::try_from(self.offset).ok()
    }

    /// Same name and the same parameter kinds in the same order.
    pub fn same_shape(&self, other: &ContractMethod) -> bool {
        self.name == other.name
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.kind == b.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, BinaryCodec)]
pub struct ContractEvent {
    pub value: u8,
    pub name: String,
    pub return_type: VMType,
    pub description: Vec<u8>,
}

impl ContractEvent {
    pub fn new(value: u8, name: &str, return_type: VMType, description: Vec<u8>) -> Self {
        Self {
            value,
            name: name.to_string(),
            return_type,
            description,
        }
    }
}

/// Methods and events of one contract. Method names are unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractInterface {
    methods: Vec<ContractMethod>,
    events: Vec<ContractEvent>,
}

impl ContractInterface {
    pub fn new(methods: Vec<ContractMethod>, events: Vec<ContractEvent>) -> Result<Self, AbiError> {
        let mut seen = HashSet::with_capacity(methods.len());
        for method in &methods {
            if !seen.insert(method.name.as_str()) {
                return Err(AbiError::DuplicateMethod(method.name.clone()));
            }
        }
        Ok(Self { methods, events })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn methods(&self) -> &[ContractMethod] {
        &self.methods
    }

    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn find_method(&self, name: &str) -> Option<&ContractMethod> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.find_method(name).is_some()
    }

    pub fn find_event(&self, value: u8) -> Option<&ContractEvent> {
        self.events.iter().find(|e| e.value == value)
    }

    /// True when a method with `wanted`'s name and parameter kinds exists.
    pub fn implements(&self, wanted: &ContractMethod) -> bool {
        self.find_method(&wanted.name)
            .is_some_and(|method| method.same_shape(wanted))
    }

    /// True when every method of `other` is implemented here.
    pub fn implements_interface(&self, other: &ContractInterface) -> bool {
        other.methods.iter().all(|m| self.implements(m))
    }

    pub fn to_byte_array(&self) -> Vec<u8> {
        self.to_bytes()
    }

    /// Decodes an interface, rejecting trailing bytes and duplicate methods.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AbiError> {
        let mut input = bytes;
        let methods = Vec::<ContractMethod>::decode(&mut input)?;
        let events = Vec::<ContractEvent>::decode(&mut input)?;
        if !input.is_empty() {
            return Err(AbiError::Decode(DecodeError::InvalidValue));
        }
        Self::new(methods, events)
    }
}

impl Encode for ContractInterface {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.methods.encode(out);
        self.events.encode(out);
    }
}

impl Decode for ContractInterface {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        let methods = Vec::<ContractMethod>::decode(input)?;
        let events = Vec::<ContractEvent>::decode(input)?;
        Self::new(methods, events).map_err(|_| DecodeError::InvalidValue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer_method(offset: i32) -> ContractMethod {
        ContractMethod::new(
            "Transfer",
            VMType::None,
            offset,
            vec![
                ContractParameter::new("from", VMType::Object),
                ContractParameter::new("to", VMType::Object),
                ContractParameter::new("amount", VMType::Number),
            ],
        )
    }

    fn sample() -> ContractInterface {
        ContractInterface::new(
            vec![
                transfer_method(12),
                ContractMethod::new("GetName", VMType::String, 40, vec![]),
            ],
            vec![ContractEvent::new(64, "Paid", VMType::Number, b"paid".to_vec())],
        )
        .unwrap()
    }

    #[test]
    fn byte_array_round_trip() {
        let abi = sample();
        let decoded = ContractInterface::from_bytes(&abi.to_byte_array()).unwrap();
        assert_eq!(decoded, abi);
        let method = decoded.find_method("Transfer").unwrap();
        assert_eq!(method.offset, 12);
        assert_eq!(method.parameters[2].kind, VMType::Number);
    }

    #[test]
    fn duplicate_method_names_are_rejected() {
        let result = ContractInterface::new(vec![transfer_method(0), transfer_method(5)], vec![]);
        assert!(matches!(result, Err(AbiError::DuplicateMethod(name)) if name == "Transfer"));

        let mut raw = Vec::new();
        vec![transfer_method(0), transfer_method(5)].encode(&mut raw);
        Vec::<ContractEvent>::new().encode(&mut raw);
        assert!(matches!(
            ContractInterface::from_bytes(&raw),
            Err(AbiError::DuplicateMethod(_))
        ));
    }

    #[test]
    fn truncated_or_padded_bytes_fail() {
        let bytes = sample().to_byte_array();
        assert!(ContractInterface::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        let mut padded = bytes.clone();
        padded.push(0);
        assert!(ContractInterface::from_bytes(&padded).is_err());
    }

    #[test]
    fn implements_checks_name_and_parameter_kinds() {
        let abi = sample();
        assert!(abi.implements(&transfer_method(-1)));

        let mut wrong_kind = transfer_method(-1);
        wrong_kind.parameters[2].kind = VMType::String;
        assert!(!abi.implements(&wrong_kind));

        let mut wrong_arity = transfer_method(-1);
        wrong_arity.parameters.pop();
        assert!(!abi.implements(&wrong_arity));

        assert!(!abi.implements(&ContractMethod::new("Missing", VMType::None, 0, vec![])));
    }

    #[test]
    fn lookups() {
        let abi = sample();
        assert_eq!(abi.method_count(), 2);
        assert!(abi.has_method("GetName"));
        assert!(!abi.has_method("getname"));
        assert_eq!(abi.find_event(64).map(|e| e.name.as_str()), Some("Paid"));
        assert!(ContractInterface::empty().methods().is_empty());
    }

    #[test]
    fn trigger_names() {
        assert!(ContractMethod::new("OnWitness", VMType::None, 0, vec![]).is_trigger());
        assert!(!ContractMethod::new("Online", VMType::None, 0, vec![]).is_trigger());
        assert_eq!(ContractMethod::new("X", VMType::None, -1, vec![]).entry_offset(), None);
    }
}
