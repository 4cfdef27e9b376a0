//! Engine limits and chain-wide constants.
//!
//! [`EngineConfig`] is built from defaults, optionally overridden by the
//! environment:
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `NEXUS_GAS_LIMIT` | `gas_limit` | `10_000_000` |
//! | `NEXUS_MAX_FRAMES` | `max_frames` | `256` |
//! | `NEXUS_MAX_CALL_DEPTH` | `max_call_depth` | `16` |
//! | `NEXUS_MAX_STACK` | `max_stack` | `1024` |
//! | `NEXUS_NAME` | `nexus_name` | `nexus` |

use nexus_derive::Error;

/// Constants shared by every node on the network.
pub struct DomainSettings;

impl DomainSettings {
    pub const FUEL_TOKEN_SYMBOL: &'static str = "FUEL";
    pub const FUEL_TOKEN_NAME: &'static str = "Fuel";
    pub const FUEL_TOKEN_DECIMALS: u8 = 10;

    pub const STAKING_TOKEN_SYMBOL: &'static str = "CORE";
    pub const STAKING_TOKEN_NAME: &'static str = "Core";
    pub const STAKING_TOKEN_DECIMALS: u8 = 8;

    pub const FIAT_TOKEN_SYMBOL: &'static str = "USD";
    pub const FIAT_TOKEN_DECIMALS: u8 = 8;

    pub const PLATFORM_NAME: &'static str = "nexus";
    pub const ROOT_CHAIN_NAME: &'static str = "main";

    /// Fuel is priced at this fraction of the staking token.
    pub const FUEL_PRICE_DIVISOR: u32 = 5;
    /// Upper bound on account script size, exclusive.
    pub const MAX_ACCOUNT_SCRIPT_LEN: usize = 1024;
}

pub const GAS_LIMIT_ENV: &str = "NEXUS_GAS_LIMIT";
pub const MAX_FRAMES_ENV: &str = "NEXUS_MAX_FRAMES";
pub const MAX_CALL_DEPTH_ENV: &str = "NEXUS_MAX_CALL_DEPTH";
pub const MAX_STACK_ENV: &str = "NEXUS_MAX_STACK";
pub const NEXUS_NAME_ENV: &str = "NEXUS_NAME";

pub const DEFAULT_GAS_LIMIT: u64 = 10_000_000;
pub const DEFAULT_MAX_FRAMES: usize = 256;
pub const DEFAULT_MAX_CALL_DEPTH: usize = 16;
pub const DEFAULT_MAX_STACK: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Gas available to a transaction.
    pub gas_limit: u64,
    /// Frame depth across the VM and every nested trigger VM.
    pub max_frames: usize,
    /// Context switches and trigger runs that may be active at once. Each
    /// one nests an interpreter loop on the native stack.
    pub max_call_depth: usize,
    /// Value stack capacity per VM.
    pub max_stack: usize,
    pub nexus_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
            max_frames: DEFAULT_MAX_FRAMES,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_stack: DEFAULT_MAX_STACK,
            nexus_name: DomainSettings::PLATFORM_NAME.to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(GAS_LIMIT_ENV) {
            config.gas_limit = parse_positive(GAS_LIMIT_ENV, &value)?;
        }
        if let Some(value) = lookup(MAX_FRAMES_ENV) {
            config.max_frames = parse_positive(MAX_FRAMES_ENV, &value)? as usize;
        }
        if let Some(value) = lookup(MAX_CALL_DEPTH_ENV) {
            config.max_call_depth = parse_positive(MAX_CALL_DEPTH_ENV, &value)? as usize;
        }
        if let Some(value) = lookup(MAX_STACK_ENV) {
            config.max_stack = parse_positive(MAX_STACK_ENV, &value)? as usize;
        }
        if let Some(value) = lookup(NEXUS_NAME_ENV) {
            let name = value.trim();
            if name.is_empty() {
                return Err(ConfigError::Empty { var: NEXUS_NAME_ENV });
            }
            config.nexus_name = name.to_string();
        }
        Ok(config)
    }

    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn with_max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }
}

fn parse_positive(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        }),
    }
}
