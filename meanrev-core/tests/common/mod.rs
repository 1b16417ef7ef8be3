//! Shared fixtures for meanrev-core integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use meanrev_core::broker::{Broker, BrokerError};
use meanrev_core::domain::{
    AccountSnapshot, Bar, OrderRequest, Position, PositionSide, SubmitOutcome, SymbolInfo, Tick,
    Timeframe,
};
use meanrev_core::engine::Pacer;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SYMBOL: &str = "BTCUSDm";

/// Local time on a fixed trading day.
pub fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    day(5).and_hms_opt(hour, minute, second).unwrap()
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
}

/// Contract where one price unit is worth 100 account units per lot.
pub fn symbol_info() -> SymbolInfo {
    SymbolInfo {
        symbol: SYMBOL.into(),
        point: 0.01,
        tick_value: 1.0,
        tick_size: 0.01,
        volume_min: 0.01,
        volume_max: 100.0,
        volume_step: 0.01,
    }
}

/// Minute bars with open = close and a constant 1.0 high-low range.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    let base = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            Bar::new(
                base + chrono::Duration::minutes(i as i64),
                c,
                c + 0.5,
                c - 0.5,
                c,
            )
        })
        .collect()
}

/// 124 quiet closes around 100 followed by `last`.
///
/// A `last` well above 100 gives a large positive z-score, well below a large
/// negative one, while keeping one-bar volatility under the gate ceiling.
pub fn closes_ending_at(last: f64) -> Vec<f64> {
    let mut closes: Vec<f64> = (0..124)
        .map(|i| if i % 2 == 0 { 100.0 } else { 100.02 })
        .collect();
    closes.push(last);
    closes
}

pub fn tick_at(bid: f64) -> Tick {
    Tick {
        time: Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
        bid,
        ask: bid + 0.01,
    }
}

pub fn position(ticket: u64, side: PositionSide, volume: f64) -> Position {
    Position {
        ticket,
        symbol: SYMBOL.into(),
        side,
        volume,
        open_price: 100.0,
    }
}

/// A broker whose every answer is set by the test.
pub struct ScriptedBroker {
    pub account: AccountSnapshot,
    /// Consumed one per `fetch_account`; the last one sticks in `account`.
    pub account_script: VecDeque<AccountSnapshot>,
    /// Returned (one per call) by `fetch_account` before any snapshot.
    pub account_failures: VecDeque<BrokerError>,
    pub info: SymbolInfo,
    pub bars: Vec<Bar>,
    pub tick: Tick,
    pub positions: Vec<Position>,
    pub submit_reply: SubmitOutcome,
    pub submitted: Vec<OrderRequest>,
    pub connected: bool,
    pub disconnects: u32,
}

impl ScriptedBroker {
    /// Quiet market, flat book, 10k account.
    pub fn quiet() -> Self {
        let closes = vec![100.0; 125];
        Self {
            account: AccountSnapshot {
                balance: 10_000.0,
                equity: 10_000.0,
            },
            account_script: VecDeque::new(),
            account_failures: VecDeque::new(),
            info: symbol_info(),
            bars: bars_from_closes(&closes),
            tick: tick_at(100.0),
            positions: Vec::new(),
            submit_reply: SubmitOutcome::Filled {
                ticket: 1,
                price: 100.0,
            },
            submitted: Vec::new(),
            connected: true,
            disconnects: 0,
        }
    }

    pub fn with_closes(mut self, closes: &[f64]) -> Self {
        self.bars = bars_from_closes(closes);
        let last = closes.last().copied().unwrap_or(100.0);
        self.tick = tick_at(last);
        self
    }

    pub fn with_equity(mut self, equity: f64) -> Self {
        self.account = AccountSnapshot {
            balance: equity,
            equity,
        };
        self
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.len()
    }
}

impl Broker for ScriptedBroker {
    fn name(&self) -> &str {
        "scripted"
    }

    fn connect(&mut self) -> Result<(), BrokerError> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BrokerError> {
        self.connected = false;
        self.disconnects += 1;
        Ok(())
    }

    fn fetch_bars(
        &mut self,
        _symbol: &str,
        _timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, BrokerError> {
        let start = self.bars.len().saturating_sub(count);
        Ok(self.bars[start..].to_vec())
    }

    fn fetch_tick(&mut self, _symbol: &str) -> Result<Tick, BrokerError> {
        Ok(self.tick)
    }

    fn fetch_symbol_info(&mut self, _symbol: &str) -> Result<SymbolInfo, BrokerError> {
        Ok(self.info.clone())
    }

    fn fetch_account(&mut self) -> Result<AccountSnapshot, BrokerError> {
        if let Some(err) = self.account_failures.pop_front() {
            return Err(err);
        }
        if let Some(next) = self.account_script.pop_front() {
            self.account = next;
        }
        Ok(self.account)
    }

    fn fetch_open_positions(&mut self, _symbol: &str) -> Result<Vec<Position>, BrokerError> {
        Ok(self.positions.clone())
    }

    fn submit_order(&mut self, order: &OrderRequest) -> Result<SubmitOutcome, BrokerError> {
        self.submitted.push(order.clone());
        Ok(self.submit_reply.clone())
    }
}

/// Records every requested pause instead of sleeping. Optionally raises the
/// shutdown flag after a number of pauses.
#[derive(Clone, Default)]
pub struct RecordingPacer {
    pub pauses: Arc<Mutex<Vec<Duration>>>,
    pub shutdown_after: Option<usize>,
}

impl RecordingPacer {
    pub fn recorded(&self) -> Vec<Duration> {
        self.pauses.lock().unwrap().clone()
    }
}

impl Pacer for RecordingPacer {
    fn pause(&mut self, duration: Duration, shutdown: &AtomicBool) {
        let mut pauses = self.pauses.lock().unwrap();
        pauses.push(duration);
        if self.shutdown_after.is_some_and(|n| pauses.len() >= n) {
            shutdown.store(true, Ordering::SeqCst);
        }
    }
}
