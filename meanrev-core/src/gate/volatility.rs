//! Volatility check: rejects erratic markets.
//!
//! Measures the sample std of one-bar percentage returns over the most recent
//! `window` bars and rejects when it exceeds `max`.

use super::{GateContext, GateVerdict, SafetyCheck};
use crate::domain::bar::closes;
use crate::indicators::{pct_returns, sample_std};

#[derive(Debug, Clone)]
pub struct VolatilityCheck {
    window: usize,
    max: f64,
}

impl VolatilityCheck {
    pub fn new(window: usize, max: f64) -> Self {
        Self { window, max }
    }

    /// Std of the last `window` returns, or `None` with too little history.
    pub fn measure(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.window + 1 {
            return None;
        }
        let returns = pct_returns(closes);
        let recent = &returns[returns.len() - self.window..];
        Some(sample_std(recent))
    }
}

impl SafetyCheck for VolatilityCheck {
    fn name(&self) -> &str {
        "volatility"
    }

    fn check(&self, ctx: &GateContext<'_>) -> GateVerdict {
        match self.measure(&closes(ctx.bars)) {
            Some(volatility) if volatility.is_finite() => {
                if volatility > self.max {
                    GateVerdict::VolatilityTooHigh {
                        volatility,
                        max: self.max,
                    }
                } else {
                    GateVerdict::Passed
                }
            }
            _ => GateVerdict::VolatilityUndefined,
        }
    }
}
