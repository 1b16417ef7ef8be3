//! Detrended z-score.
//!
//! ```text
//! trend[i]     = mean(close[i-lookback+1..=i])
//! detrended[i] = close[i] - trend[i]          (defined from i = lookback-1)
//! z            = (detrended[last] - mean(detrended)) / sample_std(detrended)
//! ```

use crate::domain::DataError;
use crate::indicators::{mean, rolling_mean, sample_std};

/// Standard deviations at or below this are rounding noise, not dispersion.
const STD_FLOOR: f64 = 1e-12;

/// Z-score of the latest close relative to its own detrended history.
///
/// Needs at least `lookback + 1` closes so the detrended series has two
/// points. Returns `0.0` when the detrended series has no usable dispersion
/// (flat prices, NaN input), never NaN. Panics if `lookback` is zero.
pub fn detrended_zscore(closes: &[f64], lookback: usize) -> Result<f64, DataError> {
    assert!(lookback >= 1, "lookback must be >= 1");
    let required = lookback + 1;
    if closes.len() < required {
        return Err(DataError::InsufficientHistory {
            required,
            available: closes.len(),
        });
    }

    let trend = rolling_mean(closes, lookback);
    let detrended: Vec<f64> = closes
        .iter()
        .zip(trend.iter())
        .filter(|(_, t)| !t.is_nan())
        .map(|(c, t)| c - t)
        .collect();

    let std = sample_std(&detrended);
    if !std.is_finite() || std <= STD_FLOOR {
        return Ok(0.0);
    }

    let last = detrended[detrended.len() - 1];
    let z = (last - mean(&detrended)) / std;
    Ok(if z.is_finite() { z } else { 0.0 })
}
