//! Average bar range: a cheap true-range proxy.

use crate::domain::Bar;

/// Mean of `high - low` over the last `window` bars.
///
/// Unlike a full ATR this ignores gaps from the previous close; on one-minute
/// bars of a continuously traded symbol the difference is negligible.
/// Returns `None` if fewer than `window` bars are available.
pub fn mean_range(bars: &[Bar], window: usize) -> Option<f64> {
    if window == 0 || bars.len() < window {
        return None;
    }
    let recent = &bars[bars.len() - window..];
    let sum: f64 = recent.iter().map(Bar::range).sum();
    Some(sum / window as f64)
}
