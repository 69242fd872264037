// Forward-facing range sensing
//
// A reading is either a distance or "unknown"; callers must never treat an
// unknown reading as a clear path.

mod a02yyuw;
mod sim;

use serde::Serialize;

pub use a02yyuw::{A02yyuw, SensorError};
pub use sim::ScriptedSensor;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObstacleReading {
    distance_cm: Option<f32>,
    valid: bool,
}

impl ObstacleReading {
    pub fn at(distance_cm: f32) -> Self {
        Self {
            distance_cm: Some(distance_cm),
            valid: true,
        }
    }

    /// Timeout or sensor failure
    pub fn unknown() -> Self {
        Self {
            distance_cm: None,
            valid: false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn distance_cm(&self) -> Option<f32> {
        self.distance_cm.filter(|_| self.valid)
    }

    /// True only for a valid reading at or beyond `clearance_cm`
    pub fn is_clear(&self, clearance_cm: f32) -> bool {
        self.distance_cm().is_some_and(|d| d >= clearance_cm)
    }
}

pub trait RangeSensor: Send {
    /// Returns within the sensor's bounded timeout, yielding `unknown` on no echo
    fn measure(&mut self) -> ObstacleReading;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_never_clear() {
        let reading = ObstacleReading::unknown();
        assert!(!reading.is_valid());
        assert_eq!(reading.distance_cm(), None);
        assert!(!reading.is_clear(0.0));
    }

    #[test]
    fn test_clearance_threshold() {
        assert!(ObstacleReading::at(120.0).is_clear(20.0));
        assert!(ObstacleReading::at(20.0).is_clear(20.0));
        assert!(!ObstacleReading::at(15.0).is_clear(20.0));
    }
}
