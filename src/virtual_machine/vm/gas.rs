use crate::virtual_machine::errors::VMError;

/// Number of gas categories tracked by [`GasProfile`].
const GAS_CATEGORY_COUNT: usize = 5;

/// Categories of gas consumption for profiling and debugging.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum GasCategory {
    /// Base cost for executing opcodes.
    OpcodeBase = 0,
    /// Declared cost of interop calls.
    Interop = 1,
    /// Native contract methods.
    NativeCall = 2,
    /// Nested VMs running triggers.
    Trigger = 3,
    /// Storage writes performed by interops.
    StateStore = 4,
}

impl GasCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            GasCategory::OpcodeBase => "Opcode Base",
            GasCategory::Interop => "Interop",
            GasCategory::NativeCall => "Native Call",
            GasCategory::Trigger => "Trigger",
            GasCategory::StateStore => "State Store",
        }
    }

    /// All categories in discriminant order.
    const ALL: [GasCategory; GAS_CATEGORY_COUNT] = [
        GasCategory::OpcodeBase,
        GasCategory::Interop,
        GasCategory::NativeCall,
        GasCategory::Trigger,
        GasCategory::StateStore,
    ];
}

/// Gas consumption profile for debugging and optimization.
///
/// Backed by a flat array indexed by [`GasCategory`] discriminant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GasProfile {
    counts: [u64; GAS_CATEGORY_COUNT],
}

impl GasProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds gas to the specified category.
    #[inline(always)]
    pub fn add(&mut self, category: GasCategory, amount: u64) {
        let slot = &mut self.counts[category as usize];
        *slot = slot.saturating_add(amount);
    }

    pub fn get(&self, category: GasCategory) -> u64 {
        self.counts[category as usize]
    }

    /// Returns the total gas across all categories.
    pub fn total(&self) -> u64 {
        self.counts
            .iter()
            .fold(0u64, |acc, &v| acc.saturating_add(v))
    }

    /// Returns an iterator over all categories and their gas costs.
    pub fn iter(&self) -> impl Iterator<Item = (GasCategory, u64)> {
        GasCategory::ALL.into_iter().zip(self.counts)
    }
}

/// Running gas counter bounded by a fixed limit.
///
/// A charge that would exceed the limit fails without being recorded, so
/// `used() <= limit()` holds at every step.
#[derive(Clone, Debug)]
pub struct GasMeter {
    limit: u64,
    used: u64,
    profile: GasProfile,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: 0,
            profile: GasProfile::new(),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }

    pub fn profile(&self) -> &GasProfile {
        &self.profile
    }

    pub fn charge(&mut self, amount: u64, category: GasCategory) -> Result<(), VMError> {
        let available = self.remaining();
        if amount > available {
            return Err(VMError::OutOfGas {
                required: amount,
                available,
            });
        }
        self.used += amount;
        self.profile.add(category, amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_within_limit() {
        let mut meter = GasMeter::new(10);
        meter.charge(4, GasCategory::OpcodeBase).unwrap();
        meter.charge(6, GasCategory::Interop).unwrap();
        assert_eq!(meter.used(), 10);
        assert_eq!(meter.remaining(), 0);
        assert_eq!(meter.profile().get(GasCategory::Interop), 6);
        assert_eq!(meter.profile().total(), 10);
    }

    #[test]
    fn over_limit_charge_is_not_recorded() {
        let mut meter = GasMeter::new(5);
        meter.charge(3, GasCategory::OpcodeBase).unwrap();
        let err = meter.charge(3, GasCategory::OpcodeBase).unwrap_err();
        assert_eq!(err, VMError::OutOfGas { required: 3, available: 2 });
        assert_eq!(meter.used(), 3);
    }

    #[test]
    fn profile_iterates_in_category_order() {
        let mut profile = GasProfile::new();
        profile.add(GasCategory::Trigger, 2);
        let entries: Vec<_> = profile.iter().collect();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[3], (GasCategory::Trigger, 2));
    }
}
