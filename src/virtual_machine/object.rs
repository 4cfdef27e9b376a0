//! Values that flow through registers and the VM stack.
//!
//! # Wire format
//!
//! One [`VMType`] tag byte followed by the payload:
//! - `None`: nothing
//! - `Bool`: one byte
//! - `Number`: varint length + two's-complement little-endian bytes
//! - `String` / `Bytes`: varint length + bytes
//! - `Timestamp` / `Enum`: little-endian `u32`
//! - `Struct`: varint field count, then `(name, value)` pairs in name order,
//!   nested at most [`MAX_STRUCT_DEPTH`] levels
//! - `Object`: one interop kind byte (`0` address, `1` hash, `2` context,
//!   `3` ABI) followed by that value's encoding

use crate::contract::abi::ContractInterface;
use crate::types::address::Address;
use crate::types::encoding::{
    read_byte_array, read_varint, write_byte_array, write_varint, Decode, DecodeError, Encode, EncodeSink,
};
use crate::types::hash::Hash;
use crate::types::timestamp::Timestamp;
use crate::virtual_machine::errors::VMError;
use nexus_derive::BinaryCodec;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use std::collections::BTreeMap;
use std::fmt;

/// Deepest struct nesting a value may have.
pub const MAX_STRUCT_DEPTH: usize = 32;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, BinaryCodec)]
pub enum VMType {
    None = 0,
    Struct = 1,
    Bytes = 2,
    Number = 3,
    String = 4,
    Timestamp = 5,
    Bool = 6,
    Enum = 7,
    Object = 8,
}

impl VMType {
    pub fn from_u8(tag: u8) -> Option<VMType> {
        Some(match tag {
            0 => VMType::None,
            1 => VMType::Struct,
            2 => VMType::Bytes,
            3 => VMType::Number,
            4 => VMType::String,
            5 => VMType::Timestamp,
            6 => VMType::Bool,
            7 => VMType::Enum,
            8 => VMType::Object,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            VMType::None => "None",
            VMType::Struct => "Struct",
            VMType::Bytes => "Bytes",
            VMType::Number => "Number",
            VMType::String => "String",
            VMType::Timestamp => "Timestamp",
            VMType::Bool => "Bool",
            VMType::Enum => "Enum",
            VMType::Object => "Object",
        }
    }

    /// Parses a type name as written in assembly (`Number`, `string`, ...).
    pub fn parse(name: &str) -> Option<VMType> {
        let all = [
            VMType::None,
            VMType::Struct,
            VMType::Bytes,
            VMType::Number,
            VMType::String,
            VMType::Timestamp,
            VMType::Bool,
            VMType::Enum,
            VMType::Object,
        ];
        all.into_iter().find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for VMType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Host-side values carried opaquely by scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteropValue {
    Address(Address),
    Hash(Hash),
    /// Handle to a context registered in the running VM.
    Context(String),
    Abi(ContractInterface),
}

impl InteropValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            InteropValue::Address(_) => "Address",
            InteropValue::Hash(_) => "Hash",
            InteropValue::Context(_) => "Context",
            InteropValue::Abi(_) => "ABI",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VMObject {
    #[default]
    None,
    Bool(bool),
    Number(BigInt),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(Timestamp),
    Enum(u32),
    Struct(BTreeMap<String, VMObject>),
    Object(InteropValue),
}

impl VMObject {
    pub fn vm_type(&self) -> VMType {
        match self {
            VMObject::None => VMType::None,
            VMObject::Bool(_) => VMType::Bool,
            VMObject::Number(_) => VMType::Number,
            VMObject::String(_) => VMType::String,
            VMObject::Bytes(_) => VMType::Bytes,
            VMObject::Timestamp(_) => VMType::Timestamp,
            VMObject::Enum(_) => VMType::Enum,
            VMObject::Struct(_) => VMType::Struct,
            VMObject::Object(_) => VMType::Object,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            VMObject::Object(interop) => interop.kind_name(),
            other => other.vm_type().name(),
        }
    }

    /// Levels of struct nesting; scalars have depth 0.
    pub fn depth(&self) -> usize {
        match self {
            VMObject::Struct(fields) => 1 + fields.values().map(VMObject::depth).max().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, VMObject::None)
    }

    fn cast_error(&self, to: &'static str) -> VMError {
        VMError::InvalidCast {
            from: self.type_name(),
            to,
        }
    }

    pub fn as_number(&self) -> Result<BigInt, VMError> {
        match self {
            VMObject::Number(n) => Ok(n.clone()),
            VMObject::Bool(b) => Ok(BigInt::from(*b as u8)),
            VMObject::Timestamp(t) => Ok(BigInt::from(t.0)),
            VMObject::Enum(e) => Ok(BigInt::from(*e)),
            VMObject::Bytes(bytes) => Ok(BigInt::from_signed_bytes_le(bytes)),
            VMObject::String(s) => s.parse().map_err(|_| self.cast_error("Number")),
            _ => Err(self.cast_error("Number")),
        }
    }

    pub fn as_string(&self) -> Result<String, VMError> {
        match self {
            VMObject::String(s) => Ok(s.clone()),
            VMObject::Number(n) => Ok(n.to_string()),
            VMObject::Bool(b) => Ok(b.to_string()),
            VMObject::Timestamp(t) => Ok(t.to_string()),
            VMObject::Enum(e) => Ok(e.to_string()),
            VMObject::Bytes(bytes) => String::from_utf8(bytes.clone()).map_err(|_| self.cast_error("String")),
            VMObject::Object(InteropValue::Address(a)) => Ok(a.text()),
            VMObject::Object(InteropValue::Hash(h)) => Ok(h.to_string()),
            VMObject::Object(InteropValue::Context(name)) => Ok(name.clone()),
            _ => Err(self.cast_error("String")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, VMError> {
        match self {
            VMObject::Bool(b) => Ok(*b),
            VMObject::Number(n) => Ok(!n.is_zero()),
            VMObject::String(s) if s == "true" => Ok(true),
            VMObject::String(s) if s == "false" => Ok(false),
            VMObject::Bytes(bytes) if bytes.len() == 1 => Ok(bytes[0] != 0),
            _ => Err(self.cast_error("Bool")),
        }
    }

    pub fn as_bytes(&self) -> Result<Vec<u8>, VMError> {
        match self {
            VMObject::Bytes(bytes) => Ok(bytes.clone()),
            VMObject::String(s) => Ok(s.as_bytes().to_vec()),
            VMObject::Number(n) => Ok(n.to_signed_bytes_le()),
            VMObject::Bool(b) => Ok(vec![*b as u8]),
            VMObject::Timestamp(t) => Ok(t.0.to_le_bytes().to_vec()),
            VMObject::Enum(e) => Ok(e.to_le_bytes().to_vec()),
            VMObject::Struct(_) => Ok(self.to_bytes()),
            VMObject::Object(InteropValue::Address(a)) => Ok(a.as_bytes().to_vec()),
            VMObject::Object(InteropValue::Hash(h)) => Ok(h.as_slice().to_vec()),
            _ => Err(self.cast_error("Bytes")),
        }
    }

    /// Accepts an interop address, address text or serialized address bytes.
    pub fn as_address(&self) -> Result<Address, VMError> {
        match self {
            VMObject::Object(InteropValue::Address(a)) => Ok(*a),
            VMObject::String(text) => Ok(Address::from_text(text)?),
            VMObject::Bytes(bytes) => Ok(Address::from_bytes(bytes)?),
            _ => Err(self.cast_error("Address")),
        }
    }

    pub fn as_hash(&self) -> Result<Hash, VMError> {
        match self {
            VMObject::Object(InteropValue::Hash(h)) => Ok(*h),
            VMObject::Bytes(bytes) => Hash::from_slice(bytes).ok_or_else(|| self.cast_error("Hash")),
            VMObject::String(text) => Hash::parse(text).ok_or_else(|| self.cast_error("Hash")),
            _ => Err(self.cast_error("Hash")),
        }
    }

    pub fn as_timestamp(&self) -> Result<Timestamp, VMError> {
        match self {
            VMObject::Timestamp(t) => Ok(*t),
            VMObject::Number(n) => n.to_u32().map(Timestamp).ok_or_else(|| self.cast_error("Timestamp")),
            _ => Err(self.cast_error("Timestamp")),
        }
    }

    pub fn as_enum(&self) -> Result<u32, VMError> {
        match self {
            VMObject::Enum(e) => Ok(*e),
            VMObject::Number(n) => n.to_u32().ok_or_else(|| self.cast_error("Enum")),
            _ => Err(self.cast_error("Enum")),
        }
    }

    pub fn as_interop(&self) -> Result<&InteropValue, VMError> {
        match self {
            VMObject::Object(interop) => Ok(interop),
            _ => Err(self.cast_error("Object")),
        }
    }

    pub fn as_struct(&self) -> Result<&BTreeMap<String, VMObject>, VMError> {
        match self {
            VMObject::Struct(fields) => Ok(fields),
            _ => Err(self.cast_error("Struct")),
        }
    }

    /// Conversion performed by the `CAST` opcode.
    pub fn cast(&self, to: VMType) -> Result<VMObject, VMError> {
        if self.vm_type() == to {
            return Ok(self.clone());
        }
        Ok(match to {
            VMType::None => VMObject::None,
            VMType::Bool => VMObject::Bool(self.as_bool()?),
            VMType::Number => VMObject::Number(self.as_number()?),
            VMType::String => VMObject::String(self.as_string()?),
            VMType::Bytes => VMObject::Bytes(self.as_bytes()?),
            VMType::Timestamp => VMObject::Timestamp(self.as_timestamp()?),
            VMType::Enum => VMObject::Enum(self.as_enum()?),
            VMType::Object => VMObject::Object(InteropValue::Address(self.as_address()?)),
            VMType::Struct => return Err(self.cast_error("Struct")),
        })
    }

    /// Builds an object from a type tag and its raw `LOAD` payload.
    pub fn from_raw(ty: VMType, data: &[u8]) -> Result<VMObject, VMError> {
        let invalid = || VMError::InvalidValue(format!("malformed {ty} literal"));
        Ok(match ty {
            VMType::None => VMObject::None,
            VMType::Bool => match data {
                [b] => VMObject::Bool(*b != 0),
                _ => return Err(invalid()),
            },
            VMType::Number => VMObject::Number(BigInt::from_signed_bytes_le(data)),
            VMType::String => VMObject::String(String::from_utf8(data.to_vec()).map_err(|_| invalid())?),
            VMType::Bytes => VMObject::Bytes(data.to_vec()),
            VMType::Timestamp => VMObject::Timestamp(Timestamp(u32::from_bytes(data).map_err(|_| invalid())?)),
            VMType::Enum => VMObject::Enum(u32::from_bytes(data).map_err(|_| invalid())?),
            VMType::Struct | VMType::Object => VMObject::from_bytes(data)?,
        })
    }
}

impl From<bool> for VMObject {
    fn from(value: bool) -> Self {
        VMObject::Bool(value)
    }
}

impl From<BigInt> for VMObject {
    fn from(value: BigInt) -> Self {
        VMObject::Number(value)
    }
}

impl From<i64> for VMObject {
    fn from(value: i64) -> Self {
        VMObject::Number(BigInt::from(value))
    }
}

impl From<&str> for VMObject {
    fn from(value: &str) -> Self {
        VMObject::String(value.to_string())
    }
}

impl From<String> for VMObject {
    fn from(value: String) -> Self {
        VMObject::String(value)
    }
}

impl From<Vec<u8>> for VMObject {
    fn from(value: Vec<u8>) -> Self {
        VMObject::Bytes(value)
    }
}

impl From<Address> for VMObject {
    fn from(value: Address) -> Self {
        VMObject::Object(InteropValue::Address(value))
    }
}

impl From<Hash> for VMObject {
    fn from(value: Hash) -> Self {
        VMObject::Object(InteropValue::Hash(value))
    }
}

impl From<Timestamp> for VMObject {
    fn from(value: Timestamp) -> Self {
        VMObject::Timestamp(value)
    }
}

impl fmt::Display for VMObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VMObject::None => f.write_str("None"),
            VMObject::Bytes(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            VMObject::Struct(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
            VMObject::Object(InteropValue::Abi(abi)) => write!(f, "ABI({} methods)", abi.method_count()),
            other => match other.as_string() {
                Ok(text) => f.write_str(&text),
                Err(_) => f.write_str(other.type_name()),
            },
        }
    }
}

const INTEROP_ADDRESS: u8 = 0;
const INTEROP_HASH: u8 = 1;
const INTEROP_CONTEXT: u8 = 2;
const INTEROP_ABI: u8 = 3;

impl Encode for VMObject {
    fn encode<S: EncodeSink>(&self, out: &mut S) {
        self.vm_type().encode(out);
        match self {
            VMObject::None => {}
            VMObject::Bool(b) => b.encode(out),
            VMObject::Number(n) => n.encode(out),
            VMObject::String(s) => s.encode(out),
            VMObject::Bytes(bytes) => write_byte_array(out, bytes),
            VMObject::Timestamp(t) => t.encode(out),
            VMObject::Enum(e) => e.encode(out),
            VMObject::Struct(fields) => {
                write_varint(out, fields.len() as u64);
                for (name, value) in fields {
                    name.encode(out);
                    value.encode(out);
                }
            }
            VMObject::Object(interop) => match interop {
                InteropValue::Address(a) => {
                    INTEROP_ADDRESS.encode(out);
                    a.encode(out);
                }
                InteropValue::Hash(h) => {
                    INTEROP_HASH.encode(out);
                    h.encode(out);
                }
                InteropValue::Context(name) => {
                    INTEROP_CONTEXT.encode(out);
                    name.encode(out);
                }
                InteropValue::Abi(abi) => {
                    INTEROP_ABI.encode(out);
                    abi.encode(out);
                }
            },
        }
    }
}

impl Decode for VMObject {
    fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
        decode_object(input, 0)
    }
}

fn decode_object(input: &mut &[u8], depth: usize) -> Result<VMObject, DecodeError> {
    let tag = u8::decode(input)?;
    let ty = VMType::from_u8(tag).ok_or(DecodeError::InvalidValue)?;
    Ok(match ty {
        VMType::None => VMObject::None,
        VMType::Bool => VMObject::Bool(bool::decode(input)?),
        VMType::Number => VMObject::Number(BigInt::decode(input)?),
        VMType::String => VMObject::String(String::decode(input)?),
        VMType::Bytes => VMObject::Bytes(read_byte_array(input)?),
        VMType::Timestamp => VMObject::Timestamp(Timestamp::decode(input)?),
        VMType::Enum => VMObject::Enum(u32::decode(input)?),
        VMType::Struct => {
            if depth >= MAX_STRUCT_DEPTH {
                return Err(DecodeError::TooDeep(MAX_STRUCT_DEPTH));
            }
            let count = read_varint(input)?;
            let mut fields = BTreeMap::new();
            for _ in 0..count {
                let name = String::decode(input)?;
                let value = decode_object(input, depth + 1)?;
                fields.insert(name, value);
            }
            VMObject::Struct(fields)
        }
        VMType::Object => VMObject::Object(match u8::decode(input)? {
            INTEROP_ADDRESS => InteropValue::Address(Address::decode(input)?),
            INTEROP_HASH => InteropValue::Hash(Hash::decode(input)?),
            INTEROP_CONTEXT => InteropValue::Context(String::decode(input)?),
            INTEROP_ABI => InteropValue::Abi(ContractInterface::decode(input)?),
            _ => return Err(DecodeError::InvalidValue),
        }),
    })
}
