use crate::config::EngineConfig;
use crate::oracle::OracleReader;
use crate::runtime::executor::run_transaction;
use crate::runtime::transaction::Transaction;
use crate::storage::context::StorageContext;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::vm::gas::GasProfile;
use crate::virtual_machine::vm::ExecutionState;

/// Gas estimation by dry run.
///
/// Uses the same host as [`RuntimeVM`](crate::runtime::RuntimeVM), so
/// every opcode, interop and trigger costs exactly what it would cost on
/// commit. Writes are dropped and so is any oracle data the run fetched.
pub struct GasMachine<'a> {
    config: &'a EngineConfig,
    oracle: &'a OracleReader,
}

impl<'a> GasMachine<'a> {
    pub fn new(config: &'a EngineConfig, oracle: &'a OracleReader) -> Self {
        Self { config, oracle }
    }

    /// Gas used by `tx` if it halts. A fault or break rejects it.
    pub fn estimate(&self, state: &dyn StorageContext, tx: &Transaction) -> Result<u64, VMError> {
        self.profile(state, tx).map(|profile| profile.total())
    }

    /// Per-category breakdown of the same dry run.
    pub fn profile(&self, state: &dyn StorageContext, tx: &Transaction) -> Result<GasProfile, VMError> {
        let (vm, _host, outcome) = run_transaction(self.config, self.oracle, state, tx);
        self.oracle.discard_tx_data();
        match outcome? {
            ExecutionState::Halt => Ok(vm.gas_profile().clone()),
            other => Err(VMError::Rejected(format!("estimation stopped in state {other:?}"))),
        }
    }
}
