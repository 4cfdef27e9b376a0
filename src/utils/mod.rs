//! Shared helpers: logging, unit conversion, naming rules and test fixtures.

pub mod log;
#[cfg(test)]
pub mod test_utils;
pub mod units;
pub mod validation;
