//! Seconds since the Unix epoch, as seen by scripts.
//!
//! Scripts never read the wall clock; the only time they observe is the
//! transaction's logical timestamp, carried as this type.

use nexus_derive::BinaryCodec;
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BinaryCodec)]
pub struct Timestamp(pub u32);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn seconds(self) -> u32 {
        self.0
    }

    pub fn saturating_add(self, seconds: u32) -> Timestamp {
        Timestamp(self.0.saturating_add(seconds))
    }
}

impl From<u32> for Timestamp {
    fn from(value: u32) -> Self {
        Timestamp(value)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
