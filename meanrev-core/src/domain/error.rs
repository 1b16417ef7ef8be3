use chrono::{DateTime, Utc};
use thiserror::Error;

/// Structured errors for market and account data received from the broker.
///
/// All of these describe data that cannot be trusted for a decision. Most are
/// transient (the next fetch may be clean); see `is_integrity` for the ones
/// that are not.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("broker returned no bars")]
    EmptyBars,

    #[error("insufficient history: need {required} bars, got {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("malformed bar at index {index} ({time})")]
    MalformedBar { index: usize, time: DateTime<Utc> },

    #[error("bars are not in chronological order at index {index}")]
    NonChronological { index: usize },

    #[error("malformed tick: bid={bid}, ask={ask}")]
    MalformedTick { bid: f64, ask: f64 },

    #[error("malformed account snapshot: balance={balance}, equity={equity}")]
    MalformedAccount { balance: f64, equity: f64 },

    #[error("invalid symbol info for {symbol}: {reason}")]
    InvalidSymbolInfo { symbol: String, reason: String },

    #[error("expected at most one open position for {symbol}, broker reported {count}")]
    MultiplePositions { symbol: String, count: usize },
}

impl DataError {
    /// Errors that mean the trader's view of the world is inconsistent, so
    /// retrying the same iteration cannot help.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            DataError::MultiplePositions { .. } | DataError::InvalidSymbolInfo { .. }
        )
    }
}
