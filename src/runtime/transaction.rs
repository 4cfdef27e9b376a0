use crate::config::DomainSettings;
use crate::contract::event::Event;
use crate::types::address::Address;
use crate::types::encoding::Encode;
use crate::types::hash::Hash;
use crate::types::timestamp::Timestamp;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::object::VMObject;
use crate::virtual_machine::vm::ExecutionState;

/// A script submitted for execution together with the addresses that signed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: Hash,
    pub script: Vec<u8>,
    pub signers: Vec<Address>,
    pub time: Timestamp,
    pub chain: String,
}

impl Transaction {
    /// Transaction on the root chain. The hash commits to every field.
    pub fn new(script: Vec<u8>, signers: Vec<Address>, time: Timestamp) -> Self {
        Self::on_chain(DomainSettings::ROOT_CHAIN_NAME, script, signers, time)
    }

    pub fn on_chain(chain: &str, script: Vec<u8>, signers: Vec<Address>, time: Timestamp) -> Self {
        let mut builder = Hash::sha3();
        builder.update(chain.as_bytes());
        builder.update(&script);
        builder.update(&time.to_bytes());
        for signer in &signers {
            builder.update(signer.as_bytes());
        }
        Self {
            hash: builder.finalize(),
            script,
            signers,
            time,
            chain: chain.to_string(),
        }
    }

    pub fn is_signed_by(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }
}

/// Outcome of running a transaction.
///
/// Writes and events are only present when the script halted; a fault
/// leaves the state untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub state: ExecutionState,
    pub used_gas: u64,
    pub events: Vec<Event>,
    /// Value left on top of the stack, if any.
    pub result: Option<VMObject>,
    pub writes: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    pub error: Option<VMError>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.state == ExecutionState::Halt
    }
}
