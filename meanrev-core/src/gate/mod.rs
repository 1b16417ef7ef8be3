//! Safety gate: ordered chain of pre-trade checks.
//!
//! Every check sees the same `GateContext` snapshot. The chain stops at the
//! first rejection, so a failing check hides everything after it: the
//! returned `GateEvaluation` lists only the checks that actually ran.

pub mod cooldown;
pub mod hours;
pub mod spread;
pub mod volatility;

pub use cooldown::CooldownCheck;
pub use hours::TradingHoursCheck;
pub use spread::SpreadCheck;
pub use volatility::VolatilityCheck;

use crate::domain::{Bar, SymbolInfo, Tick};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Market and timing snapshot the checks evaluate against.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    /// Local wall-clock time.
    pub now: NaiveDateTime,
    pub last_trade_time: Option<NaiveDateTime>,
    pub bars: &'a [Bar],
    pub tick: &'a Tick,
    pub symbol: &'a SymbolInfo,
}

/// Outcome of a single check, or of the whole chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GateVerdict {
    Passed,
    OutsideTradingHours { hour: u32 },
    Cooldown { elapsed_secs: i64, required_secs: i64 },
    VolatilityTooHigh { volatility: f64, max: f64 },
    VolatilityUndefined,
    SpreadTooWide { spread: f64, max: f64 },
}

impl GateVerdict {
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Short reason string for logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Passed => "ok",
            Self::OutsideTradingHours { .. } => "outside trade hours",
            Self::Cooldown { .. } => "cooldown",
            Self::VolatilityTooHigh { .. } => "volatility too high",
            Self::VolatilityUndefined => "volatility undefined",
            Self::SpreadTooWide { .. } => "spread too wide",
        }
    }
}

impl fmt::Display for GateVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutsideTradingHours { hour } => write!(f, "{} (hour {hour})", self.reason()),
            Self::Cooldown {
                elapsed_secs,
                required_secs,
            } => write!(f, "{} ({elapsed_secs}s of {required_secs}s)", self.reason()),
            Self::VolatilityTooHigh { volatility, max } => {
                write!(f, "{} ({volatility:.6} > {max})", self.reason())
            }
            Self::SpreadTooWide { spread, max } => {
                write!(f, "{} ({spread} > {max})", self.reason())
            }
            Self::Passed | Self::VolatilityUndefined => f.write_str(self.reason()),
        }
    }
}

/// A single pre-trade check.
///
/// Checks are pure functions of the context: no broker access, no state.
pub trait SafetyCheck: Send + Sync {
    /// Human-readable name (e.g., "trading_hours").
    fn name(&self) -> &str;

    fn check(&self, ctx: &GateContext<'_>) -> GateVerdict;
}

/// Result of running the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct GateEvaluation {
    pub verdict: GateVerdict,
    /// Names of the checks that ran, in order. The last one decided a rejection.
    pub evaluated: Vec<String>,
}

impl GateEvaluation {
    pub fn is_passed(&self) -> bool {
        self.verdict.is_passed()
    }
}

/// Gate thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateParams {
    /// Inclusive local-hour window, e.g. `[8, 22]`.
    pub trade_hours: (u32, u32),
    /// Ceiling on the std of one-bar returns.
    pub volatility_max: f64,
    pub volatility_window: usize,
    /// Ceiling on ask - bid, in points.
    pub spread_max_points: f64,
    pub min_trade_interval_secs: i64,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            trade_hours: (8, 22),
            volatility_max: 0.004,
            volatility_window: 20,
            spread_max_points: 50.0,
            min_trade_interval_secs: 180,
        }
    }
}

impl GateParams {
    pub fn validate(&self) -> Result<(), String> {
        let (start, end) = self.trade_hours;
        if start > 23 || end > 23 || start > end {
            return Err(format!(
                "trade_hours must satisfy 0 <= start <= end <= 23, got [{start}, {end}]"
            ));
        }
        if !(self.volatility_max.is_finite() && self.volatility_max > 0.0) {
            return Err(format!("volatility_max must be > 0, got {}", self.volatility_max));
        }
        if self.volatility_window < 2 {
            return Err(format!(
                "volatility_window must be >= 2, got {}",
                self.volatility_window
            ));
        }
        if !(self.spread_max_points.is_finite() && self.spread_max_points >= 0.0) {
            return Err(format!(
                "spread_max_points must be >= 0, got {}",
                self.spread_max_points
            ));
        }
        if self.min_trade_interval_secs < 0 {
            return Err(format!(
                "min_trade_interval_secs must be >= 0, got {}",
                self.min_trade_interval_secs
            ));
        }
        Ok(())
    }

    /// Bars the volatility check needs (one extra for the first return).
    pub fn required_bars(&self) -> usize {
        self.volatility_window + 1
    }
}

/// Ordered chain of safety checks.
pub struct SafetyGate {
    checks: Vec<Box<dyn SafetyCheck>>,
}

impl SafetyGate {
    pub fn new(checks: Vec<Box<dyn SafetyCheck>>) -> Self {
        Self { checks }
    }

    /// The standard chain: hours, cooldown, volatility, spread.
    pub fn standard(params: &GateParams) -> Self {
        Self::new(vec![
            Box::new(TradingHoursCheck::new(params.trade_hours.0, params.trade_hours.1)),
            Box::new(CooldownCheck::new(params.min_trade_interval_secs)),
            Box::new(VolatilityCheck::new(
                params.volatility_window,
                params.volatility_max,
            )),
            Box::new(SpreadCheck::new(params.spread_max_points)),
        ])
    }

    pub fn check_names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    pub fn evaluate(&self, ctx: &GateContext<'_>) -> GateEvaluation {
        let mut evaluated = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            evaluated.push(check.name().to_string());
            let verdict = check.check(ctx);
            if !verdict.is_passed() {
                return GateEvaluation { verdict, evaluated };
            }
        }
        GateEvaluation {
            verdict: GateVerdict::Passed,
            evaluated,
        }
    }
}
