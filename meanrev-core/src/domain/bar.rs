//! Bar: the fundamental market data unit.

use super::error::DataError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLC bar for one period of the configured timeframe.
///
/// Timestamps are the bar open time as reported by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub tick_volume: u64,
}

impl Bar {
    pub fn new(time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            tick_volume: 0,
        }
    }

    /// Returns true if any OHLC field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Basic OHLC sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Validate a bar series fetched from the broker.
///
/// Rejects empty series, malformed bars, and timestamps that are not strictly increasing.
pub fn validate_series(bars: &[Bar]) -> Result<(), DataError> {
    if bars.is_empty() {
        return Err(DataError::EmptyBars);
    }
    for (i, bar) in bars.iter().enumerate() {
        if !bar.is_sane() {
            return Err(DataError::MalformedBar {
                index: i,
                time: bar.time,
            });
        }
    }
    if let Some(i) = bars
        .windows(2)
        .position(|pair| pair[1].time <= pair[0].time)
    {
        return Err(DataError::NonChronological { index: i + 1 });
    }
    Ok(())
}

/// Closing prices of a bar slice, oldest first.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}
