//! Contract-facing definitions: ABIs, triggers, events and native contracts.

pub mod abi;
pub mod event;
pub mod native;
pub mod trigger;
