//! Deterministic contract execution engine.
//!
//! A register/stack virtual machine with gas metering, static interop
//! tables, native contracts, account and token triggers, an oracle cache
//! and a restricted VM for rendering human-readable call descriptions.

pub mod chain;
pub mod config;
pub mod contract;
pub mod oracle;
pub mod runtime;
pub mod storage;
pub mod types;
pub mod utils;
pub mod virtual_machine;
