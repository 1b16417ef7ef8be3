use super::error::DataError;
use serde::{Deserialize, Serialize};

/// Tolerance used when snapping volumes to the broker's lot step.
///
/// `0.3 / 0.1` is `2.9999999999999996` in f64; without the tolerance an exact
/// multiple of the step would floor one step short.
const STEP_EPSILON: f64 = 1e-9;

/// Static contract metadata for the traded symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: String,
    /// Smallest price increment used to quote spreads ("points").
    pub point: f64,
    /// Account-currency value of one `tick_size` move for one lot.
    pub tick_value: f64,
    pub tick_size: f64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
}

impl SymbolInfo {
    /// Check that the contract metadata can be used for sizing and spread checks.
    pub fn validate(&self) -> Result<(), DataError> {
        let fields = [
            ("point", self.point),
            ("tick_value", self.tick_value),
            ("tick_size", self.tick_size),
            ("volume_min", self.volume_min),
            ("volume_max", self.volume_max),
            ("volume_step", self.volume_step),
        ];
        for (name, value) in fields {
            if !(value.is_finite() && value > 0.0) {
                return Err(self.invalid(format!("{name} must be positive, got {value}")));
            }
        }
        if self.volume_min > self.volume_max {
            return Err(self.invalid(format!(
                "volume_min {} exceeds volume_max {}",
                self.volume_min, self.volume_max
            )));
        }
        Ok(())
    }

    /// Account-currency value of a one-unit price move for one lot.
    pub fn value_per_price_unit(&self) -> f64 {
        self.tick_value / self.tick_size
    }

    /// Round a volume down to a whole number of lot steps.
    pub fn floor_to_step(&self, volume: f64) -> f64 {
        let steps = (volume / self.volume_step + STEP_EPSILON).floor();
        round8(steps * self.volume_step)
    }

    /// Smallest whole-step volume that is not below `volume_min`.
    pub fn min_volume_on_step(&self) -> f64 {
        let steps = (self.volume_min / self.volume_step - STEP_EPSILON).ceil();
        round8(steps * self.volume_step)
    }

    /// Largest whole-step volume that is not above `volume_max`.
    pub fn max_volume_on_step(&self) -> f64 {
        self.floor_to_step(self.volume_max)
    }

    /// True when `volume` is a positive whole number of steps inside the broker limits.
    pub fn accepts_volume(&self, volume: f64) -> bool {
        if !(volume.is_finite() && volume > 0.0) {
            return false;
        }
        let steps = volume / self.volume_step;
        let on_step = (steps - steps.round()).abs() < 1e-6;
        on_step
            && volume >= self.volume_min - STEP_EPSILON
            && volume <= self.volume_max + STEP_EPSILON
    }

    fn invalid(&self, reason: String) -> DataError {
        DataError::InvalidSymbolInfo {
            symbol: self.symbol.clone(),
            reason,
        }
    }
}

/// Round to 8 decimal places, the precision brokers accept for volumes.
pub(crate) fn round8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}
