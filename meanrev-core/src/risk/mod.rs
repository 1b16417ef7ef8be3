//! Risk governor: daily bookkeeping and circuit breakers.
//!
//! Runs before the signal every iteration. `RiskState::observe` handles day
//! rollover and the equity high-water mark; `check_breakers` decides whether
//! trading is suspended for this iteration. Loss-streak accounting lives in
//! [`outcome`].

pub mod outcome;

pub use outcome::{OpenTrade, TradeEvent};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Circuit-breaker thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Fraction of the day's starting equity that may be lost.
    pub max_daily_loss: f64,
    /// Consecutive losing trades before a pause.
    pub max_loss_streak: u32,
    pub daily_loss_pause_secs: u64,
    pub loss_streak_pause_secs: u64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_daily_loss: 0.02,
            max_loss_streak: 3,
            daily_loss_pause_secs: 300,
            loss_streak_pause_secs: 900,
        }
    }
}

impl RiskLimits {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.max_daily_loss.is_finite()
            && self.max_daily_loss > 0.0
            && self.max_daily_loss < 1.0)
        {
            return Err(format!(
                "max_daily_loss must be in (0, 1), got {}",
                self.max_daily_loss
            ));
        }
        if self.max_loss_streak == 0 {
            return Err("max_loss_streak must be >= 1".into());
        }
        Ok(())
    }
}

/// Day-scoped risk bookkeeping, owned by the trader for the process lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskState {
    /// Cooldown anchor: local time of the last dispatched order.
    pub last_trade_time: Option<NaiveDateTime>,
    pub loss_streak: u32,
    pub peak_equity: f64,
    pub start_equity: f64,
    pub day_marker: Option<NaiveDate>,
    /// The position currently being tracked for its outcome.
    pub open_trade: Option<OpenTrade>,
}

/// What `observe` did to the daily bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DayEvent {
    /// First observation of the process.
    Initialized,
    /// First observation on a new calendar day.
    Rollover { previous: NaiveDate },
    SameDay,
}

impl RiskState {
    /// Apply day rollover and update the equity high-water mark.
    ///
    /// Start equity and the day marker change at most once per calendar day;
    /// calling this repeatedly on the same day only moves the peak.
    pub fn observe(&mut self, today: NaiveDate, equity: f64) -> DayEvent {
        let event = match self.day_marker {
            None => {
                self.start_equity = equity;
                self.peak_equity = equity;
                self.day_marker = Some(today);
                DayEvent::Initialized
            }
            Some(previous) if previous != today => {
                self.start_equity = equity;
                self.loss_streak = 0;
                self.day_marker = Some(today);
                DayEvent::Rollover { previous }
            }
            Some(_) => DayEvent::SameDay,
        };
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        event
    }

    /// Fraction of the day's starting equity lost so far (negative when up).
    pub fn daily_loss(&self, equity: f64) -> f64 {
        (self.start_equity - equity) / self.start_equity
    }

    /// Fraction below the high-water mark.
    pub fn drawdown_from_peak(&self, equity: f64) -> f64 {
        if self.peak_equity > 0.0 {
            (self.peak_equity - equity) / self.peak_equity
        } else {
            0.0
        }
    }

    /// Anchor the cooldown at `at`.
    pub fn record_trade(&mut self, at: NaiveDateTime) {
        self.last_trade_time = Some(at);
    }
}

/// A tripped circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum BreakerTrip {
    DailyLoss { loss: f64, limit: f64 },
    LossStreak { streak: u32, limit: u32 },
}

impl BreakerTrip {
    /// How long trading stays suspended.
    pub fn pause(&self, limits: &RiskLimits) -> Duration {
        match self {
            BreakerTrip::DailyLoss { .. } => Duration::from_secs(limits.daily_loss_pause_secs),
            BreakerTrip::LossStreak { .. } => Duration::from_secs(limits.loss_streak_pause_secs),
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            BreakerTrip::DailyLoss { .. } => "daily loss limit reached",
            BreakerTrip::LossStreak { .. } => "loss streak limit reached",
        }
    }
}

impl fmt::Display for BreakerTrip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakerTrip::DailyLoss { loss, limit } => {
                write!(f, "{} ({:.4} > {limit})", self.reason(), loss)
            }
            BreakerTrip::LossStreak { streak, limit } => {
                write!(f, "{} ({streak} >= {limit})", self.reason())
            }
        }
    }
}

/// Daily-loss breaker first, then loss streak.
///
/// The daily-loss comparison is strict: losing exactly `max_daily_loss` does
/// not trip. A non-positive starting equity always trips.
pub fn check_breakers(state: &RiskState, equity: f64, limits: &RiskLimits) -> Option<BreakerTrip> {
    if state.start_equity <= 0.0 || !state.start_equity.is_finite() {
        return Some(BreakerTrip::DailyLoss {
            loss: f64::INFINITY,
            limit: limits.max_daily_loss,
        });
    }
    let loss = state.daily_loss(equity);
    if loss > limits.max_daily_loss {
        return Some(BreakerTrip::DailyLoss {
            loss,
            limit: limits.max_daily_loss,
        });
    }
    if state.loss_streak >= limits.max_loss_streak {
        return Some(BreakerTrip::LossStreak {
            streak: state.loss_streak,
            limit: limits.max_loss_streak,
        });
    }
    None
}
