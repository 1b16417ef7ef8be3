//! Signal engine: mean-reversion z-score and entry/exit thresholds.
//!
//! The signal only sees closing prices. It does not know whether a position
//! is open; the execution controller combines the reading with position state.

pub mod zscore;

pub use zscore::detrended_zscore;

use crate::domain::bar::closes;
use crate::domain::{Bar, DataError, OrderSide};
use serde::{Deserialize, Serialize};

/// Lookback and z-score thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalParams {
    /// Rolling window (bars) for the trend estimate.
    pub lookback: usize,
    /// Enter when |z| reaches this.
    pub entry_z: f64,
    /// Exit an open position when |z| falls to this or below.
    pub exit_z: f64,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            lookback: 120,
            entry_z: 1.2,
            exit_z: 0.3,
        }
    }
}

impl SignalParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.lookback < 2 {
            return Err(format!("lookback must be >= 2, got {}", self.lookback));
        }
        if !(self.exit_z.is_finite() && self.exit_z >= 0.0) {
            return Err(format!("exit_z must be >= 0, got {}", self.exit_z));
        }
        if !(self.entry_z.is_finite() && self.entry_z > self.exit_z) {
            return Err(format!(
                "entry_z ({}) must be greater than exit_z ({})",
                self.entry_z, self.exit_z
            ));
        }
        Ok(())
    }

    /// Minimum closes needed for a z-score.
    pub fn required_bars(&self) -> usize {
        self.lookback + 1
    }

    /// Mean reversion: fade the move. High z sells, low z buys.
    pub fn entry_side(&self, z: f64) -> Option<OrderSide> {
        if z >= self.entry_z {
            Some(OrderSide::Sell)
        } else if z <= -self.entry_z {
            Some(OrderSide::Buy)
        } else {
            None
        }
    }

    pub fn should_exit(&self, z: f64) -> bool {
        z.abs() <= self.exit_z
    }
}

/// Signal output for the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalReading {
    pub z: f64,
    /// Close of the latest bar, the reference price for entries.
    pub close: f64,
}

/// Compute the z-score reading for a validated bar series.
pub fn evaluate(bars: &[Bar], params: &SignalParams) -> Result<SignalReading, DataError> {
    let closes = closes(bars);
    let z = detrended_zscore(&closes, params.lookback)?;
    let close = *closes.last().ok_or(DataError::EmptyBars)?;
    Ok(SignalReading { z, close })
}
