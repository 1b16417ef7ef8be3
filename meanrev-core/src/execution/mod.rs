//! Execution controller: turns a signal reading and the position state into
//! at most one order per iteration.
//!
//! The state machine has two states, FLAT and IN_POSITION(side):
//!
//! | State        | Condition             | Decision |
//! |--------------|-----------------------|----------|
//! | IN_POSITION  | \|z\| <= exit_z       | `Exit`: opposite-side market order, no SL/TP |
//! | IN_POSITION  | otherwise             | `Hold` |
//! | FLAT         | z >= entry_z          | `Enter` short |
//! | FLAT         | z <= -entry_z         | `Enter` long |
//! | FLAT         | otherwise             | `Wait` |
//!
//! Entry and exit are mutually exclusive within one evaluation. Dispatching
//! the resulting order is the job of [`OrderExecutor`].

pub mod dispatch;

pub use dispatch::{
    validate_order, DispatchError, ExecutionMode, ExecutionOutcome, ExecutionReport, OrderExecutor,
};

use crate::domain::{Bar, OrderIntent, OrderRequest, OrderSide, Position, PositionState};
use crate::indicators::mean_range;
use crate::signal::{SignalParams, SignalReading};
use serde::{Deserialize, Serialize};

/// Order tagging and protective-level geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionParams {
    /// Max slippage from the reference price, in points.
    pub deviation: u32,
    pub magic: u64,
    pub comment: String,
    /// Stop distance never falls below this fraction of price.
    pub stop_floor_fraction: f64,
    /// Take-profit distance as a multiple of the stop distance.
    pub take_profit_ratio: f64,
    /// Bars averaged for the high-low range stop.
    pub range_window: usize,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            deviation: 20,
            magic: 777_001,
            comment: "meanrev_safe".into(),
            stop_floor_fraction: 0.001,
            take_profit_ratio: 1.5,
            range_window: 20,
        }
    }
}

impl ExecutionParams {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.stop_floor_fraction.is_finite() && self.stop_floor_fraction > 0.0) {
            return Err(format!(
                "stop_floor_fraction must be > 0, got {}",
                self.stop_floor_fraction
            ));
        }
        if !(self.take_profit_ratio.is_finite() && self.take_profit_ratio > 0.0) {
            return Err(format!(
                "take_profit_ratio must be > 0, got {}",
                self.take_profit_ratio
            ));
        }
        if self.range_window == 0 {
            return Err("range_window must be >= 1".into());
        }
        if self.comment.len() > 31 {
            return Err(format!(
                "comment must be at most 31 characters, got {}",
                self.comment.len()
            ));
        }
        Ok(())
    }

    /// Stop distance: mean bar range, floored at a fraction of price.
    pub fn stop_distance(&self, bars: &[Bar], price: f64) -> f64 {
        let floor = price * self.stop_floor_fraction;
        match mean_range(bars, self.range_window) {
            Some(range) if range.is_finite() => range.max(floor),
            _ => floor,
        }
    }

    /// Stop-loss and take-profit levels for an entry at `price`.
    pub fn protective_levels(
        &self,
        side: OrderSide,
        price: f64,
        stop_distance: f64,
    ) -> (f64, f64) {
        let target = stop_distance * self.take_profit_ratio;
        match side {
            OrderSide::Buy => (price - stop_distance, price + target),
            OrderSide::Sell => (price + stop_distance, price - target),
        }
    }

    /// Entry order from flat, with stop-loss and take-profit around `price`.
    pub fn entry_order(
        &self,
        symbol: &str,
        side: OrderSide,
        price: f64,
        stop_distance: f64,
        volume: f64,
    ) -> OrderRequest {
        let (stop_loss, take_profit) = self.protective_levels(side, price, stop_distance);
        OrderRequest {
            symbol: symbol.to_string(),
            side,
            intent: OrderIntent::Entry,
            volume,
            price,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
            deviation: self.deviation,
            magic: self.magic,
            comment: self.comment.clone(),
        }
    }

    /// Market order that flattens `position`. No stop or target.
    pub fn exit_order(&self, position: &Position, price: f64) -> OrderRequest {
        OrderRequest {
            symbol: position.symbol.clone(),
            side: position.closing_side(),
            intent: OrderIntent::Exit,
            volume: position.volume,
            price,
            stop_loss: None,
            take_profit: None,
            deviation: self.deviation,
            magic: self.magic,
            comment: self.comment.clone(),
        }
    }
}

/// What the controller wants to do this iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Flat and no entry signal.
    Wait,
    /// In a position and no exit signal.
    Hold,
    /// Open a position from flat.
    Enter {
        side: OrderSide,
        /// Reference price (latest close).
        price: f64,
        stop_distance: f64,
    },
    /// Close the open position.
    Exit { position: Position },
}

impl Decision {
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Wait => "wait",
            Decision::Hold => "hold",
            Decision::Enter { .. } => "enter",
            Decision::Exit { .. } => "exit",
        }
    }

    /// True for decisions that dispatch an order.
    pub fn is_transition(&self) -> bool {
        matches!(self, Decision::Enter { .. } | Decision::Exit { .. })
    }
}

/// Evaluate the state machine for one iteration.
pub fn decide(
    reading: &SignalReading,
    position: &PositionState,
    bars: &[Bar],
    signal: &SignalParams,
    params: &ExecutionParams,
) -> Decision {
    match position {
        PositionState::Open(p) => {
            if signal.should_exit(reading.z) {
                Decision::Exit {
                    position: p.clone(),
                }
            } else {
                Decision::Hold
            }
        }
        PositionState::Flat => match signal.entry_side(reading.z) {
            Some(side) => Decision::Enter {
                side,
                price: reading.close,
                stop_distance: params.stop_distance(bars, reading.close),
            },
            None => Decision::Wait,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PositionSide;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    fn reading(z: f64) -> SignalReading {
        SignalReading { z, close: 100.0 }
    }

    fn long(volume: f64) -> PositionState {
        PositionState::Open(Position {
            ticket: 9,
            symbol: "BTCUSDm".into(),
            side: PositionSide::Long,
            volume,
            open_price: 99.0,
        })
    }

    #[test]
    fn defaults_match_reference_constants() {
        let p = ExecutionParams::default();
        assert_eq!(p.deviation, 20);
        assert_eq!(p.magic, 777_001);
        assert_eq!(p.comment, "meanrev_safe");
        assert_eq!(p.take_profit_ratio, 1.5);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn stop_distance_uses_mean_range_or_floor() {
        let p = ExecutionParams::default();
        // make_bars on a flat series: every range is exactly 2.0
        let bars = make_bars(&[100.0; 25]);
        assert_approx(p.stop_distance(&bars, 100.0), 2.0, DEFAULT_EPSILON);
        // floor dominates at a high price: 0.1% of 5000 = 5
        assert_approx(p.stop_distance(&bars, 5_000.0), 5.0, DEFAULT_EPSILON);
        // too few bars for the range window: floor only
        assert_approx(p.stop_distance(&bars[..5], 100.0), 0.1, DEFAULT_EPSILON);
    }

    #[test]
    fn flat_with_high_z_enters_short() {
        let bars = make_bars(&[100.0; 25]);
        let d = decide(
            &reading(1.5),
            &PositionState::Flat,
            &bars,
            &SignalParams::default(),
            &ExecutionParams::default(),
        );
        assert_eq!(
            d,
            Decision::Enter {
                side: OrderSide::Sell,
                price: 100.0,
                stop_distance: 2.0
            }
        );
    }

    #[test]
    fn flat_with_low_z_enters_long() {
        let bars = make_bars(&[100.0; 25]);
        let d = decide(
            &reading(-1.2),
            &PositionState::Flat,
            &bars,
            &SignalParams::default(),
            &ExecutionParams::default(),
        );
        assert!(matches!(d, Decision::Enter { side: OrderSide::Buy, .. }));
    }

    #[test]
    fn flat_inside_band_waits() {
        let d = decide(
            &reading(1.0),
            &PositionState::Flat,
            &[],
            &SignalParams::default(),
            &ExecutionParams::default(),
        );
        assert_eq!(d, Decision::Wait);
        assert!(!d.is_transition());
    }

    #[test]
    fn open_position_exits_near_mean() {
        let d = decide(
            &reading(0.2),
            &long(0.3),
            &[],
            &SignalParams::default(),
            &ExecutionParams::default(),
        );
        assert_eq!(d.label(), "exit");
    }

    #[test]
    fn open_position_holds_and_never_enters() {
        // A z beyond the entry threshold must not stack a second position.
        for z in [0.5, 1.5, -3.0] {
            let d = decide(
                &reading(z),
                &long(0.3),
                &[],
                &SignalParams::default(),
                &ExecutionParams::default(),
            );
            assert_eq!(d, Decision::Hold, "z = {z}");
        }
    }

    #[test]
    fn entry_order_places_levels_around_price() {
        let p = ExecutionParams::default();
        let sell = p.entry_order("BTCUSDm", OrderSide::Sell, 100.0, 2.0, 0.1);
        assert_eq!(sell.stop_loss, Some(102.0));
        assert_eq!(sell.take_profit, Some(97.0));
        assert_eq!(sell.intent, OrderIntent::Entry);
        let buy = p.entry_order("BTCUSDm", OrderSide::Buy, 100.0, 2.0, 0.1);
        assert_eq!(buy.stop_loss, Some(98.0));
        assert_eq!(buy.take_profit, Some(103.0));
    }

    #[test]
    fn exit_order_mirrors_position() {
        let p = ExecutionParams::default();
        let PositionState::Open(pos) = long(0.37) else {
            unreachable!()
        };
        let order = p.exit_order(&pos, 101.0);
        assert_eq!(order.side, OrderSide::Sell);
        assert_eq!(order.volume, 0.37);
        assert_eq!(order.stop_loss, None);
        assert_eq!(order.take_profit, None);
        assert_eq!(order.intent, OrderIntent::Exit);
    }
}
