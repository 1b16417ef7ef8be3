use super::{snap_volume, Sizer, SizingError};
use crate::domain::SymbolInfo;

/// Trades a constant volume regardless of equity or stop distance.
#[derive(Debug, Clone)]
pub struct FixedVolumeSizer {
    volume: f64,
}

impl FixedVolumeSizer {
    pub fn new(volume: f64) -> Self {
        Self { volume }
    }
}

impl Sizer for FixedVolumeSizer {
    fn name(&self) -> &str {
        "fixed_volume"
    }

    fn size(
        &self,
        _equity: f64,
        stop_distance: f64,
        symbol: &SymbolInfo,
    ) -> Result<f64, SizingError> {
        if !(stop_distance.is_finite() && stop_distance > 0.0) {
            return Err(SizingError::InvalidStopDistance(stop_distance));
        }
        snap_volume(self.volume, symbol)
    }
}
