//! Chain-level registries the runtime consults: tokens, chains, platforms,
//! feeds, organizations and deployed contracts.

pub mod nexus;
pub mod token;

pub use nexus::{DeployedContract, Nexus, NexusError};
pub use token::{TokenFlags, TokenInfo};
