//! Paper broker: in-process simulated venue for offline runs.
//!
//! Prices follow a seeded mean-reverting random walk of bars. The book holds
//! at most one position; its stop-loss and take-profit are checked against
//! every new bar and filled at the level that was touched (stop first when a
//! bar touches both). Fills happen at the current bid/ask.
//!
//! Outside accelerated mode a new bar is produced for every elapsed
//! timeframe of wall-clock time. In accelerated mode every `fetch_bars` call
//! advances the walk by exactly one bar.

use super::{Broker, BrokerError};
use crate::domain::{
    AccountSnapshot, Bar, OrderIntent, OrderRequest, OrderSide, Position, PositionSide,
    SubmitOutcome, SymbolInfo, Tick, Timeframe,
};
use chrono::{DateTime, DurationRound, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Retcode reported for volumes that violate the lot rules.
const RETCODE_INVALID_VOLUME: i64 = 10014;
/// Retcode reported when the reference price moved beyond the allowed deviation.
const RETCODE_REQUOTE: i64 = 10004;
const MAX_RETAINED_BARS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub seed: u64,
    pub initial_balance: f64,
    pub start_price: f64,
    pub spread_points: f64,
    /// Half-width of the uniform per-bar return shock.
    pub bar_volatility: f64,
    /// Fraction of the gap to `start_price` closed each bar.
    pub reversion: f64,
    /// Bars generated at connect time.
    pub history: usize,
    pub accelerated: bool,
    pub timeframe: Timeframe,
    pub point: f64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            initial_balance: 10_000.0,
            start_price: 60_000.0,
            spread_points: 20.0,
            bar_volatility: 0.001,
            reversion: 0.02,
            history: 500,
            accelerated: false,
            timeframe: Timeframe::M1,
            point: 0.01,
            volume_min: 0.01,
            volume_max: 100.0,
            volume_step: 0.01,
        }
    }
}

#[derive(Debug, Clone)]
struct PaperPosition {
    position: Position,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
}

pub struct PaperBroker {
    symbol: String,
    config: PaperConfig,
    rng: StdRng,
    bars: Vec<Bar>,
    balance: f64,
    open: Option<PaperPosition>,
    next_ticket: u64,
    connected: bool,
}

impl PaperBroker {
    pub fn new(symbol: impl Into<String>, config: PaperConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let balance = config.initial_balance;
        Self {
            symbol: symbol.into(),
            config,
            rng,
            bars: Vec::new(),
            balance,
            open: None,
            next_ticket: 1,
            connected: false,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    fn symbol_info(&self) -> SymbolInfo {
        SymbolInfo {
            symbol: self.symbol.clone(),
            point: self.config.point,
            tick_value: self.config.point,
            tick_size: self.config.point,
            volume_min: self.config.volume_min,
            volume_max: self.config.volume_max,
            volume_step: self.config.volume_step,
        }
    }

    fn ensure_connected(&self) -> Result<(), BrokerError> {
        if self.connected {
            Ok(())
        } else {
            Err(BrokerError::NotConnected)
        }
    }

    fn ensure_symbol(&self, symbol: &str) -> Result<(), BrokerError> {
        if symbol == self.symbol {
            Ok(())
        } else {
            Err(BrokerError::Rejected(format!(
                "unknown symbol {symbol}, paper broker trades {}",
                self.symbol
            )))
        }
    }

    fn last_close(&self) -> f64 {
        self.bars
            .last()
            .map(|b| b.close)
            .unwrap_or(self.config.start_price)
    }

    fn spread(&self) -> f64 {
        self.config.spread_points * self.config.point
    }

    fn current_tick(&self) -> Tick {
        let bid = self.last_close();
        let time = self.bars.last().map(|b| b.time).unwrap_or_else(Utc::now);
        Tick {
            time,
            bid,
            ask: bid + self.spread(),
        }
    }

    fn seed_history(&mut self) {
        let step = self.config.timeframe.step();
        let now = Utc::now();
        let end = now.duration_trunc(step).unwrap_or(now);
        let count = self.config.history.max(1) as i32;
        let start = end - step * (count - 1);
        let mut time = start;
        while time <= end {
            self.push_bar(time);
            time += step;
        }
    }

    /// Append the next bar of the walk and settle any protective level it touches.
    fn push_bar(&mut self, time: DateTime<Utc>) {
        let open = self.last_close();
        let anchor_pull = self.config.reversion * (self.config.start_price / open - 1.0);
        let vol = self.config.bar_volatility.max(f64::EPSILON);
        let shock: f64 = self.rng.gen_range(-vol..vol);
        let close = open * (1.0 + anchor_pull + shock);
        let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..vol / 2.0));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..vol / 2.0));
        let mut bar = Bar::new(time, open, high, low, close);
        bar.tick_volume = self.rng.gen_range(10..500u64);
        self.bars.push(bar);
        if self.bars.len() > MAX_RETAINED_BARS {
            let excess = self.bars.len() - MAX_RETAINED_BARS;
            self.bars.drain(..excess);
        }
        self.settle_protective_levels(&bar);
    }

    fn advance_to_now(&mut self) {
        if self.config.accelerated {
            return;
        }
        let step = self.config.timeframe.step();
        let now = Utc::now();
        while let Some(next) = self.bars.last().map(|b| b.time + step) {
            if next > now {
                break;
            }
            self.push_bar(next);
        }
    }

    fn advance_one(&mut self) {
        let step = self.config.timeframe.step();
        let next = self
            .bars
            .last()
            .map(|b| b.time + step)
            .unwrap_or_else(Utc::now);
        self.push_bar(next);
    }

    fn settle_protective_levels(&mut self, bar: &Bar) {
        let Some(open) = &self.open else {
            return;
        };
        let hit = match open.position.side {
            PositionSide::Long => open
                .stop_loss
                .filter(|sl| bar.low <= *sl)
                .or_else(|| open.take_profit.filter(|tp| bar.high >= *tp)),
            PositionSide::Short => open
                .stop_loss
                .filter(|sl| bar.high >= *sl)
                .or_else(|| open.take_profit.filter(|tp| bar.low <= *tp)),
        };
        if let Some(level) = hit {
            let ticket = open.position.ticket;
            let pnl = self.close_position(level);
            info!(ticket, level, pnl, "paper position closed by protective level");
        }
    }

    /// Realize the open position at `price`; returns the realized P&L.
    fn close_position(&mut self, price: f64) -> f64 {
        let Some(open) = self.open.take() else {
            return 0.0;
        };
        let pnl = open.position.unrealized_pnl_points(price)
            * open.position.volume
            * self.symbol_info().value_per_price_unit();
        self.balance += pnl;
        pnl
    }

    fn equity(&self) -> f64 {
        let Some(open) = &self.open else {
            return self.balance;
        };
        let tick = self.current_tick();
        let mark = match open.position.side {
            PositionSide::Long => tick.bid,
            PositionSide::Short => tick.ask,
        };
        self.balance
            + open.position.unrealized_pnl_points(mark)
                * open.position.volume
                * self.symbol_info().value_per_price_unit()
    }

    fn fill(&mut self, order: &OrderRequest) -> SubmitOutcome {
        let info = self.symbol_info();
        let tick = self.current_tick();
        let price = tick.price_for(order.side);

        if (price - order.price).abs() > f64::from(order.deviation) * info.point + 1e-9 {
            return SubmitOutcome::Rejected {
                code: Some(RETCODE_REQUOTE),
                reason: format!("requote: market {price}, requested {}", order.price),
            };
        }

        match order.intent {
            OrderIntent::Entry => {
                if self.open.is_some() {
                    return SubmitOutcome::Rejected {
                        code: None,
                        reason: "position already open".into(),
                    };
                }
                if !info.accepts_volume(order.volume) {
                    return SubmitOutcome::Rejected {
                        code: Some(RETCODE_INVALID_VOLUME),
                        reason: format!("invalid volume {}", order.volume),
                    };
                }
                let ticket = self.next_ticket;
                self.next_ticket += 1;
                let side = match order.side {
                    OrderSide::Buy => PositionSide::Long,
                    OrderSide::Sell => PositionSide::Short,
                };
                self.open = Some(PaperPosition {
                    position: Position {
                        ticket,
                        symbol: self.symbol.clone(),
                        side,
                        volume: order.volume,
                        open_price: price,
                    },
                    stop_loss: order.stop_loss,
                    take_profit: order.take_profit,
                });
                SubmitOutcome::Filled { ticket, price }
            }
            OrderIntent::Exit => {
                let Some(open) = &self.open else {
                    return SubmitOutcome::Rejected {
                        code: None,
                        reason: "no open position to close".into(),
                    };
                };
                if open.position.closing_side() != order.side {
                    return SubmitOutcome::Rejected {
                        code: None,
                        reason: format!(
                            "{} does not close a {:?} position",
                            order.side, open.position.side
                        ),
                    };
                }
                let ticket = open.position.ticket;
                let pnl = self.close_position(price);
                debug!(ticket, price, pnl, "paper position closed by order");
                SubmitOutcome::Filled { ticket, price }
            }
        }
    }
}

impl Broker for PaperBroker {
    fn name(&self) -> &str {
        "paper"
    }

    fn connect(&mut self) -> Result<(), BrokerError> {
        if self.bars.is_empty() {
            self.seed_history();
        }
        self.connected = true;
        info!(
            symbol = %self.symbol,
            seed = self.config.seed,
            balance = self.balance,
            accelerated = self.config.accelerated,
            "paper broker connected"
        );
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BrokerError> {
        self.connected = false;
        Ok(())
    }

    fn fetch_bars(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, BrokerError> {
        self.ensure_connected()?;
        self.ensure_symbol(symbol)?;
        if timeframe != self.config.timeframe {
            return Err(BrokerError::Rejected(format!(
                "paper broker generates {} bars, {timeframe} requested",
                self.config.timeframe
            )));
        }
        if self.config.accelerated {
            self.advance_one();
        } else {
            self.advance_to_now();
        }
        let start = self.bars.len().saturating_sub(count);
        Ok(self.bars[start..].to_vec())
    }

    fn fetch_tick(&mut self, symbol: &str) -> Result<Tick, BrokerError> {
        self.ensure_connected()?;
        self.ensure_symbol(symbol)?;
        self.advance_to_now();
        Ok(self.current_tick())
    }

    fn fetch_symbol_info(&mut self, symbol: &str) -> Result<SymbolInfo, BrokerError> {
        self.ensure_connected()?;
        self.ensure_symbol(symbol)?;
        Ok(self.symbol_info())
    }

    fn fetch_account(&mut self) -> Result<AccountSnapshot, BrokerError> {
        self.ensure_connected()?;
        self.advance_to_now();
        Ok(AccountSnapshot {
            balance: self.balance,
            equity: self.equity(),
        })
    }

    fn fetch_open_positions(&mut self, symbol: &str) -> Result<Vec<Position>, BrokerError> {
        self.ensure_connected()?;
        self.ensure_symbol(symbol)?;
        self.advance_to_now();
        Ok(self.open.iter().map(|o| o.position.clone()).collect())
    }

    fn submit_order(&mut self, order: &OrderRequest) -> Result<SubmitOutcome, BrokerError> {
        self.ensure_connected()?;
        self.ensure_symbol(&order.symbol)?;
        let outcome = self.fill(order);
        debug!(?outcome, side = %order.side, volume = order.volume, "paper order processed");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validate_series;

    fn accelerated(seed: u64) -> PaperBroker {
        PaperBroker::new(
            "BTCUSDm",
            PaperConfig {
                seed,
                accelerated: true,
                history: 200,
                ..PaperConfig::default()
            },
        )
    }

    fn order(
        broker: &mut PaperBroker,
        side: OrderSide,
        intent: OrderIntent,
        volume: f64,
    ) -> OrderRequest {
        let tick = broker.fetch_tick("BTCUSDm").unwrap();
        OrderRequest {
            symbol: "BTCUSDm".into(),
            side,
            intent,
            volume,
            price: tick.price_for(side),
            stop_loss: None,
            take_profit: None,
            deviation: 20,
            magic: 1,
            comment: "test".into(),
        }
    }

    #[test]
    fn requires_connect() {
        let mut broker = accelerated(1);
        assert_eq!(broker.fetch_account(), Err(BrokerError::NotConnected));
        broker.connect().unwrap();
        assert!(broker.fetch_account().is_ok());
    }

    #[test]
    fn history_is_valid_and_deterministic() {
        let mut a = accelerated(7);
        let mut b = accelerated(7);
        a.connect().unwrap();
        b.connect().unwrap();
        let bars_a = a.fetch_bars("BTCUSDm", Timeframe::M1, 125).unwrap();
        let bars_b = b.fetch_bars("BTCUSDm", Timeframe::M1, 125).unwrap();
        assert_eq!(bars_a.len(), 125);
        validate_series(&bars_a).unwrap();
        let closes_a: Vec<f64> = bars_a.iter().map(|b| b.close).collect();
        let closes_b: Vec<f64> = bars_b.iter().map(|b| b.close).collect();
        assert_eq!(closes_a, closes_b);
    }

    #[test]
    fn accelerated_mode_advances_one_bar_per_fetch() {
        let mut broker = accelerated(3);
        broker.connect().unwrap();
        let before = broker.bar_count();
        broker.fetch_bars("BTCUSDm", Timeframe::M1, 10).unwrap();
        broker.fetch_bars("BTCUSDm", Timeframe::M1, 10).unwrap();
        assert_eq!(broker.bar_count(), before + 2);
    }

    #[test]
    fn rejects_unknown_symbol_and_timeframe() {
        let mut broker = accelerated(3);
        broker.connect().unwrap();
        assert!(matches!(
            broker.fetch_tick("EURUSD"),
            Err(BrokerError::Rejected(_))
        ));
        assert!(broker.fetch_bars("BTCUSDm", Timeframe::H1, 10).is_err());
    }

    #[test]
    fn tick_carries_configured_spread() {
        let mut broker = accelerated(3);
        broker.connect().unwrap();
        let tick = broker.fetch_tick("BTCUSDm").unwrap();
        assert!((tick.spread() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn open_and_close_round_trip_updates_balance() {
        let mut broker = accelerated(11);
        broker.connect().unwrap();
        let entry = order(&mut broker, OrderSide::Buy, OrderIntent::Entry, 0.1);
        let outcome = broker.submit_order(&entry).unwrap();
        assert!(outcome.is_filled());
        assert_eq!(broker.fetch_open_positions("BTCUSDm").unwrap().len(), 1);

        // Closing immediately costs exactly the spread.
        let exit = order(&mut broker, OrderSide::Sell, OrderIntent::Exit, 0.1);
        assert!(broker.submit_order(&exit).unwrap().is_filled());
        assert!(broker.fetch_open_positions("BTCUSDm").unwrap().is_empty());
        let expected = 10_000.0 - 0.2 * 0.1;
        assert!((broker.balance() - expected).abs() < 1e-6);
    }

    #[test]
    fn second_entry_is_rejected() {
        let mut broker = accelerated(11);
        broker.connect().unwrap();
        let entry = order(&mut broker, OrderSide::Sell, OrderIntent::Entry, 0.1);
        broker.submit_order(&entry).unwrap();
        let again = order(&mut broker, OrderSide::Sell, OrderIntent::Entry, 0.1);
        assert!(!broker.submit_order(&again).unwrap().is_filled());
    }

    #[test]
    fn off_step_volume_is_rejected() {
        let mut broker = accelerated(11);
        broker.connect().unwrap();
        let entry = order(&mut broker, OrderSide::Buy, OrderIntent::Entry, 0.015);
        assert_eq!(
            broker.submit_order(&entry).unwrap(),
            SubmitOutcome::Rejected {
                code: Some(RETCODE_INVALID_VOLUME),
                reason: "invalid volume 0.015".into()
            }
        );
    }

    #[test]
    fn stale_price_is_requoted() {
        let mut broker = accelerated(11);
        broker.connect().unwrap();
        let mut entry = order(&mut broker, OrderSide::Buy, OrderIntent::Entry, 0.1);
        entry.price -= 100.0;
        assert!(matches!(
            broker.submit_order(&entry).unwrap(),
            SubmitOutcome::Rejected {
                code: Some(RETCODE_REQUOTE),
                ..
            }
        ));
    }

    #[test]
    fn protective_stop_closes_position_on_next_bar() {
        let mut broker = accelerated(5);
        broker.connect().unwrap();
        let mut entry = order(&mut broker, OrderSide::Buy, OrderIntent::Entry, 0.1);
        // A stop above the market is touched by any following bar.
        entry.stop_loss = Some(entry.price * 2.0);
        broker.submit_order(&entry).unwrap();
        broker.fetch_bars("BTCUSDm", Timeframe::M1, 1).unwrap();
        assert!(broker.fetch_open_positions("BTCUSDm").unwrap().is_empty());
        assert!(broker.balance() > 10_000.0);
    }
}
