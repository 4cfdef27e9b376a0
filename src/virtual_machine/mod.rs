//! Register-based bytecode virtual machine for contract execution.
//!
//! # Architecture
//!
//! - **Frames**: each call gets a frame of up to 32 registers holding [`object::VMObject`]s
//! - **Stack**: values passed between frames, contexts and the host
//! - **Contexts**: named units of code, either bytecode or a native contract
//! - **Gas metering**: every opcode is charged before it runs, with per-category profiling
//!
//! # Modules
//!
//! - [`assembler`]: Assembly parsing, diagnostics, and bytecode generation
//! - [`context`]: Script and native execution contexts
//! - [`errors`]: Assembly and execution error types
//! - [`frame`]: Call frames and their registers
//! - [`isa`]: Instruction set definition and opcode mappings
//! - [`object`]: Runtime values and their coercions
//! - [`vm`]: Core virtual machine implementation and gas metering

pub mod assembler;
pub mod context;
pub mod errors;
pub mod frame;
pub mod isa;
pub mod object;
pub mod vm;
