use crate::config::EngineConfig;
use crate::oracle::OracleReader;
use crate::runtime::host::RuntimeHost;
use crate::runtime::transaction::{ExecutionResult, Transaction};
use crate::storage::context::StorageContext;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::vm::{ExecutionState, VirtualMachine};

/// Runs `tx` against `state` without deciding what to keep.
pub(crate) fn run_transaction<'a>(
    config: &'a EngineConfig,
    oracle: &'a OracleReader,
    state: &'a dyn StorageContext,
    tx: &'a Transaction,
) -> (VirtualMachine, RuntimeHost<'a>, Result<ExecutionState, VMError>) {
    let mut host = RuntimeHost::new(config, tx, oracle, state);
    let mut vm = VirtualMachine::for_script(config, tx.script.clone());
    let outcome = vm.execute(&mut host);
    (vm, host, outcome)
}

/// Executes transactions and reports their writes and events.
///
/// Nothing is written to `state`; a halted run returns its writes for the
/// caller to apply. Oracle answers fetched by a halted run are promoted to
/// the global cache, those of any other run are dropped.
pub struct RuntimeVM<'a> {
    config: &'a EngineConfig,
    oracle: &'a OracleReader,
}

impl<'a> RuntimeVM<'a> {
    pub fn new(config: &'a EngineConfig, oracle: &'a OracleReader) -> Self {
        Self { config, oracle }
    }

    pub fn execute(&self, state: &dyn StorageContext, tx: &Transaction) -> ExecutionResult {
        let (vm, host, outcome) = run_transaction(self.config, self.oracle, state, tx);
        let used_gas = vm.used_gas();

        match outcome {
            Ok(ExecutionState::Halt) => {
                self.oracle.merge_tx_data();
                let (writes, events) = host.into_parts();
                crate::info!(
                    "tx {} halted: {used_gas} gas, {} writes, {} events",
                    tx.hash,
                    writes.len(),
                    events.len()
                );
                ExecutionResult {
                    state: ExecutionState::Halt,
                    used_gas,
                    events,
                    result: vm.peek().cloned(),
                    writes,
                    error: None,
                }
            }
            Ok(state) => {
                self.oracle.discard_tx_data();
                crate::warn!("tx {} stopped in state {state:?}", tx.hash);
                ExecutionResult {
                    state,
                    used_gas,
                    events: Vec::new(),
                    result: None,
                    writes: Vec::new(),
                    error: None,
                }
            }
            Err(err) => {
                self.oracle.discard_tx_data();
                crate::warn!("tx {} faulted: {err}", tx.hash);
                ExecutionResult {
                    state: ExecutionState::Fault,
                    used_gas,
                    events: Vec::new(),
                    result: None,
                    writes: Vec::new(),
                    error: Some(err),
                }
            }
        }
    }
}
