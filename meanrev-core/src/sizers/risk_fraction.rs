//! Risk-fraction sizer.
//!
//! `volume = equity * risk_fraction / (stop_distance * value_per_price_unit)`,
//! then snapped to the lot grid. Losing the full stop distance costs about
//! `risk_fraction` of equity, rounded down to the step and floored at the
//! broker minimum.

use super::{snap_volume, Sizer, SizingError};
use crate::domain::SymbolInfo;

#[derive(Debug, Clone)]
pub struct RiskFractionSizer {
    risk_fraction: f64,
}

impl RiskFractionSizer {
    pub fn new(risk_fraction: f64) -> Self {
        Self { risk_fraction }
    }
}

impl Sizer for RiskFractionSizer {
    fn name(&self) -> &str {
        "risk_fraction"
    }

    fn size(
        &self,
        equity: f64,
        stop_distance: f64,
        symbol: &SymbolInfo,
    ) -> Result<f64, SizingError> {
        if !(stop_distance.is_finite() && stop_distance > 0.0) {
            return Err(SizingError::InvalidStopDistance(stop_distance));
        }
        if !(equity.is_finite() && equity > 0.0) {
            return Err(SizingError::InvalidEquity(equity));
        }
        let per_unit = symbol.value_per_price_unit();
        if !(per_unit.is_finite() && per_unit > 0.0) {
            return Err(SizingError::InvalidContract(format!(
                "tick_value {} / tick_size {}",
                symbol.tick_value, symbol.tick_size
            )));
        }
        let risk_money = equity * self.risk_fraction;
        let raw = risk_money / (stop_distance * per_unit);
        snap_volume(raw, symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sizers::test_support::btc;

    #[test]
    fn sizes_from_risk_budget() {
        // 10_000 * 0.003 = 30 at risk; stop 150 price units at 1.0 per unit -> 0.2 lots
        let sizer = RiskFractionSizer::new(0.003);
        let v = sizer.size(10_000.0, 150.0, &btc()).unwrap();
        assert_eq!(v, 0.2);
    }

    #[test]
    fn rounds_down_to_step() {
        // 30 / 70 = 0.428.. -> 0.42
        let sizer = RiskFractionSizer::new(0.003);
        assert_eq!(sizer.size(10_000.0, 70.0, &btc()).unwrap(), 0.42);
    }

    #[test]
    fn exact_step_multiple_is_kept() {
        // 0.3 lots exactly: 30 / 100
        let sizer = RiskFractionSizer::new(0.003);
        assert_eq!(sizer.size(10_000.0, 100.0, &btc()).unwrap(), 0.3);
    }

    #[test]
    fn floors_at_broker_minimum() {
        let sizer = RiskFractionSizer::new(0.003);
        assert_eq!(sizer.size(100.0, 5_000.0, &btc()).unwrap(), 0.01);
    }

    #[test]
    fn caps_at_broker_maximum() {
        let sizer = RiskFractionSizer::new(0.003);
        assert_eq!(sizer.size(1e9, 1.0, &btc()).unwrap(), 100.0);
    }

    #[test]
    fn uses_contract_value_per_unit() {
        // EURUSD-style: tick 0.00001 worth 1.0 -> 100_000 per price unit
        let info = SymbolInfo {
            symbol: "EURUSD".into(),
            point: 0.00001,
            tick_value: 1.0,
            tick_size: 0.00001,
            volume_min: 0.01,
            volume_max: 50.0,
            volume_step: 0.01,
        };
        // 30 / (0.0015 * 100_000) = 0.2
        let v = RiskFractionSizer::new(0.003)
            .size(10_000.0, 0.0015, &info)
            .unwrap();
        assert_eq!(v, 0.2);
    }

    #[test]
    fn rejects_bad_inputs() {
        let sizer = RiskFractionSizer::new(0.003);
        assert_eq!(
            sizer.size(10_000.0, 0.0, &btc()),
            Err(SizingError::InvalidStopDistance(0.0))
        );
        assert!(matches!(
            sizer.size(10_000.0, f64::NAN, &btc()),
            Err(SizingError::InvalidStopDistance(_))
        ));
        assert_eq!(
            sizer.size(-5.0, 10.0, &btc()),
            Err(SizingError::InvalidEquity(-5.0))
        );
    }
}
