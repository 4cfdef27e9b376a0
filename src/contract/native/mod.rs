//! Built-in contracts executed by the host instead of the interpreter.
//!
//! A native call arrives with the method name on top of the VM stack and
//! the arguments below it in call order. Each contract pops what it needs,
//! pushes at most one result and keeps its state in maps named
//! `{contract}.{field}`.

pub mod account;
pub mod consensus;
pub mod friends;
pub mod market;
pub mod relay;
pub mod stake;
pub mod storage;
pub mod validator;

use crate::runtime::Runtime;
use crate::storage::map::StorageMap;
use crate::virtual_machine::context::NativeContractKind;
use crate::virtual_machine::errors::{expect, VMError};

pub use account::AccountContract;
pub use consensus::ConsensusContract;
pub use friends::FriendsContract;
pub use market::{MarketContract, SaleContract};
pub use relay::RelayContract;
pub use stake::StakeContract;
pub use storage::StorageContract;
pub use validator::ValidatorContract;

/// Fixed gas charged for entering a native contract.
pub const NATIVE_CALL_GAS: u64 = 50;

pub trait NativeContract: Sync {
    fn kind(&self) -> NativeContractKind;

    /// Method names this contract answers to.
    fn methods(&self) -> &'static [&'static str];

    /// Runs `method` with its arguments on the runtime stack.
    fn call(&self, rt: &mut dyn Runtime, method: &str) -> Result<(), VMError>;
}

pub fn native_contract(kind: NativeContractKind) -> &'static dyn NativeContract {
    match kind {
        NativeContractKind::Account => &AccountContract,
        NativeContractKind::Stake => &StakeContract,
        NativeContractKind::Validator => &ValidatorContract,
        NativeContractKind::Storage => &StorageContract,
        NativeContractKind::Market => &MarketContract,
        NativeContractKind::Sale => &SaleContract,
        NativeContractKind::Relay => &RelayContract,
        NativeContractKind::Consensus => &ConsensusContract,
        NativeContractKind::Friends => &FriendsContract,
    }
}

/// Pops the method name and dispatches to the contract.
pub fn execute(rt: &mut dyn Runtime, kind: NativeContractKind) -> Result<(), VMError> {
    let method = rt.pop_string()?;
    crate::debug!("native call {kind}.{method}");
    native_contract(kind).call(rt, &method)
}

/// Storage map holding `field` of a native contract.
pub fn field(kind: NativeContractKind, name: &str) -> StorageMap {
    StorageMap::new(format!("{}.{}", kind.name(), name))
}

pub(crate) fn unknown_method(kind: NativeContractKind, method: &str) -> VMError {
    VMError::UnknownMethod {
        context: kind.name().to_string(),
        method: method.to_string(),
    }
}

/// Migration hooks may only be driven by the account contract.
pub(crate) fn expect_account_caller(rt: &dyn Runtime) -> Result<(), VMError> {
    expect(
        rt.previous_context_name().as_deref() == Some(NativeContractKind::Account.name()),
        "invalid context",
    )
}
