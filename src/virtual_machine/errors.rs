use crate::chain::nexus::NexusError;
use crate::contract::abi::AbiError;
use crate::oracle::OracleError;
use crate::storage::list::ListError;
use crate::types::address::AddressError;
use crate::types::encoding::DecodeError;
use nexus_derive::Error;

/// Errors raised while assembling or executing bytecode.
///
/// [`VMError::Rejected`] is a business-rule rejection raised through
/// [`expect`]; every other variant is an engine fault. Both abort the
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VMError {
    /// Business rule violated; the message is the rejection reason.
    #[error("{0}")]
    Rejected(String),
    /// Script executed `THROW`.
    #[error("script exception: {0}")]
    Throw(String),
    /// Unknown opcode encountered in bytecode.
    #[error("invalid instruction {opcode:#04x} at offset {offset}")]
    InvalidInstruction { opcode: u8, offset: usize },
    /// The host refused this opcode.
    #[error("opcode {0} is not allowed here")]
    OpcodeDisabled(&'static str),
    /// Bytecode ended in the middle of an instruction.
    #[error("unexpected end of bytecode at offset {ip}")]
    UnexpectedEndOfBytecode { ip: usize },
    /// Jump or entry offset outside the running script.
    #[error("invalid instruction pointer {ip} for script of {len} bytes")]
    InvalidIP { ip: usize, len: usize },
    #[error("empty script")]
    EmptyScript,
    #[error("register index {0} out of bounds")]
    InvalidRegisterIndex(u8),
    #[error("frames hold at most 32 registers, requested {0}")]
    InvalidRegisterCount(usize),
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow: limit is {0} items")]
    StackOverflow(usize),
    #[error("frame stack is empty")]
    FrameStackEmpty,
    /// Frame or nested-context limit reached.
    #[error("call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),
    #[error("null context")]
    NullContext,
    #[error("unknown context: {0}")]
    UnknownContext(String),
    #[error("unknown interop: {0}")]
    UnknownInterop(String),
    #[error("unknown method {method} in {context}")]
    UnknownMethod { context: String, method: String },
    /// A trigger's ABI entry takes a different number of arguments than the engine passes.
    #[error("trigger {trigger} of {context} declares {declared} parameters, {given} given")]
    TriggerArity {
        context: String,
        trigger: String,
        declared: usize,
        given: usize,
    },
    /// Charging `required` would exceed the gas limit.
    #[error("out of gas: {required} required, {available} available")]
    OutOfGas { required: u64, available: u64 },
    /// Value coercion between incompatible types.
    #[error("cannot convert {from} to {to}")]
    InvalidCast { from: &'static str, to: &'static str },
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("decoding error: {0}")]
    Decode(#[from] DecodeError),
    #[error("{0}")]
    Address(#[from] AddressError),
    #[error("{0}")]
    Abi(#[from] AbiError),
    #[error("{0}")]
    Nexus(#[from] NexusError),
    #[error("{0}")]
    List(#[from] ListError),
    /// Malformed oracle request or failed pull.
    #[error("{0}")]
    Oracle(#[from] OracleError),
    /// Assembly failure with line number context.
    #[error("line {line}: {message}")]
    Assembly { line: usize, message: String },
}

impl VMError {
    /// True for rejections raised by contract rules rather than engine faults.
    pub fn is_business_rule(&self) -> bool {
        matches!(self, VMError::Rejected(_) | VMError::Oracle(_))
    }

    /// Faults that must escape trigger isolation and abort the caller.
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            VMError::OutOfGas { .. } | VMError::CallDepthExceeded(_)
        )
    }
}

/// The engine's universal assertion.
///
/// Returns [`VMError::Rejected`] carrying `message` when `condition` is false.
pub fn expect(condition: bool, message: impl Into<String>) -> Result<(), VMError> {
    if condition {
        Ok(())
    } else {
        Err(VMError::Rejected(message.into()))
    }
}
