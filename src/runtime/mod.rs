//! Transaction execution on top of the VM.
//!
//! - [`capability`]: the [`Runtime`] trait native contracts and interops program against
//! - [`host`]: [`RuntimeHost`], the VM host backed by a change set, the oracle and events
//! - [`interop`]: static `EXTCALL` tables and their gas costs
//! - [`executor`] and [`gas_machine`]: committing runs and dry-run gas estimation
//! - [`description`]: the restricted VM rendering call descriptions

pub mod capability;
pub mod description;
pub mod executor;
pub mod gas_machine;
pub mod host;
pub mod interop;
pub mod transaction;


pub use capability::Runtime;
pub use description::{DescriptionSource, DescriptionVM, StateDescriptionSource};
pub use executor::RuntimeVM;
pub use gas_machine::GasMachine;
pub use host::{RuntimeContext, RuntimeHost};
pub use transaction::{ExecutionResult, Transaction};
