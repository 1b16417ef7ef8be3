//! Position sizing: converts account equity and stop distance into a lot volume.
//!
//! Every sizer returns a volume that is a whole number of broker lot steps and
//! lies within the broker's `[volume_min, volume_max]` range.
//!
//! ## Concrete implementations
//!
//! - [`RiskFractionSizer`]: risk a fixed fraction of equity on the stop distance
//! - [`FixedVolumeSizer`]: always trade the same volume

pub mod fixed;
pub mod risk_fraction;

pub use fixed::FixedVolumeSizer;
pub use risk_fraction::RiskFractionSizer;

use crate::domain::SymbolInfo;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("stop distance must be positive and finite, got {0}")]
    InvalidStopDistance(f64),

    #[error("equity must be positive and finite, got {0}")]
    InvalidEquity(f64),

    #[error("symbol contract values are unusable for sizing: {0}")]
    InvalidContract(String),
}

/// Turns risk inputs into an order volume.
pub trait Sizer: Send + Sync {
    fn name(&self) -> &str;

    /// Volume for a new position with a stop `stop_distance` price units away.
    fn size(&self, equity: f64, stop_distance: f64, symbol: &SymbolInfo)
        -> Result<f64, SizingError>;
}

/// Sizer selection as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SizingConfig {
    RiskFraction {
        #[serde(default = "default_risk_fraction")]
        risk_fraction: f64,
    },
    FixedVolume {
        volume: f64,
    },
}

fn default_risk_fraction() -> f64 {
    0.003
}

impl Default for SizingConfig {
    fn default() -> Self {
        SizingConfig::RiskFraction {
            risk_fraction: default_risk_fraction(),
        }
    }
}

impl SizingConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            SizingConfig::RiskFraction { risk_fraction } => {
                if !(risk_fraction.is_finite() && *risk_fraction > 0.0 && *risk_fraction < 1.0) {
                    return Err(format!(
                        "risk_fraction must be in (0, 1), got {risk_fraction}"
                    ));
                }
            }
            SizingConfig::FixedVolume { volume } => {
                if !(volume.is_finite() && *volume > 0.0) {
                    return Err(format!("fixed volume must be positive, got {volume}"));
                }
            }
        }
        Ok(())
    }

    pub fn build(&self) -> Box<dyn Sizer> {
        match self {
            SizingConfig::RiskFraction { risk_fraction } => {
                Box::new(RiskFractionSizer::new(*risk_fraction))
            }
            SizingConfig::FixedVolume { volume } => Box::new(FixedVolumeSizer::new(*volume)),
        }
    }
}

/// Snap a raw volume onto the lot grid and into the broker's limits.
///
/// Rounds down to the step, then raises to the smallest on-step volume not
/// below `volume_min` and caps at the largest on-step volume not above
/// `volume_max`.
pub fn snap_volume(raw: f64, symbol: &SymbolInfo) -> Result<f64, SizingError> {
    if symbol.volume_step <= 0.0 || !symbol.volume_step.is_finite() {
        return Err(SizingError::InvalidContract(format!(
            "volume_step {}",
            symbol.volume_step
        )));
    }
    let min = symbol.min_volume_on_step();
    let max = symbol.max_volume_on_step();
    if min > max {
        return Err(SizingError::InvalidContract(format!(
            "no whole-step volume between {} and {}",
            symbol.volume_min, symbol.volume_max
        )));
    }
    let floored = if raw.is_finite() {
        symbol.floor_to_step(raw.max(0.0))
    } else {
        max
    };
    Ok(floored.clamp(min, max))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::SymbolInfo;

    /// BTC-style contract: one unit of price is worth one account unit per lot.
    pub fn btc() -> SymbolInfo {
        SymbolInfo {
            symbol: "BTCUSDm".into(),
            point: 0.01,
            tick_value: 0.01,
            tick_size: 0.01,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
        }
    }
}
