// Shared speed register
//
// A single scalar in [0.0, 1.0] applied to every actuation, stored as integer
// tenths so repeated steps never drift.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Serialize, Serializer};

const MAX_TENTHS: u8 = 10;

/// Speed as a fraction of full wheel velocity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct SpeedLevel(u8);

impl SpeedLevel {
    pub const ZERO: SpeedLevel = SpeedLevel(0);
    pub const FULL: SpeedLevel = SpeedLevel(MAX_TENTHS);

    /// Values above 10 saturate at full speed
    pub fn from_tenths(tenths: u8) -> Self {
        Self(tenths.min(MAX_TENTHS))
    }

    pub fn tenths(self) -> u8 {
        self.0
    }

    pub fn as_f32(self) -> f32 {
        f32::from(self.0) / f32::from(MAX_TENTHS)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SpeedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.as_f32())
    }
}

impl Serialize for SpeedLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f32(self.as_f32())
    }
}

/// Atomic register read by both control paths without the engine lock
#[derive(Debug)]
pub struct SpeedRegister {
    tenths: AtomicU8,
}

impl SpeedRegister {
    pub fn new(initial: SpeedLevel) -> Self {
        Self {
            tenths: AtomicU8::new(initial.tenths()),
        }
    }

    pub fn get(&self) -> SpeedLevel {
        SpeedLevel(self.tenths.load(Ordering::Acquire))
    }

    /// Step up by 0.1, saturating at 1.0
    pub fn increase(&self) -> SpeedLevel {
        self.update(|t| (t + 1).min(MAX_TENTHS))
    }

    /// Step down by 0.1, saturating at 0.0
    pub fn decrease(&self) -> SpeedLevel {
        self.update(|t| t.saturating_sub(1))
    }

    fn update(&self, step: impl Fn(u8) -> u8) -> SpeedLevel {
        let previous = self
            .tenths
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| Some(step(t)))
            .unwrap_or_else(|t| t);
        SpeedLevel(step(previous))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increase_saturates_at_full() {
        let reg = SpeedRegister::new(SpeedLevel::from_tenths(3));
        for n in 1..=12u8 {
            let level = reg.increase();
            assert_eq!(level.tenths(), (3 + n).min(10));
        }
        assert_eq!(reg.get(), SpeedLevel::FULL);
    }

    #[test]
    fn test_decrease_never_negative() {
        let reg = SpeedRegister::new(SpeedLevel::from_tenths(3));
        for _ in 0..5 {
            reg.decrease();
        }
        assert_eq!(reg.get(), SpeedLevel::ZERO);
        assert_eq!(reg.get().as_f32(), 0.0);
    }

    #[test]
    fn test_display_and_fraction() {
        let level = SpeedLevel::from_tenths(3);
        assert_eq!(level.to_string(), "0.3");
        assert!((level.as_f32() - 0.3).abs() < f32::EPSILON);
        assert_eq!(SpeedLevel::from_tenths(42), SpeedLevel::FULL);
    }
}
