//! Bridge broker: talks JSON over HTTP to a gateway process that sits next
//! to the trading terminal.
//!
//! Endpoints:
//! - `GET  /health`                                  connect check
//! - `GET  /bars?symbol=&timeframe=&count=`          oldest first
//! - `GET  /tick?symbol=`
//! - `GET  /symbol?symbol=`
//! - `GET  /account`
//! - `GET  /positions?symbol=`
//! - `POST /order`                                   body: [`OrderWire`]
//!
//! Transport failures and non-2xx statuses are `Connectivity`; bodies that
//! do not decode or translate are `Protocol`.

use crate::config::BridgeConfig;

use chrono::{DateTime, Utc};
use meanrev_core::broker::{Broker, BrokerError};
use meanrev_core::domain::{
    AccountSnapshot, Bar, OrderIntent, OrderRequest, OrderSide, Position, PositionSide,
    SubmitOutcome, SymbolInfo, Tick, Timeframe,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

// ── Wire types ───────────────────────────────────────────────────────

/// One bar as the gateway reports it (`time` in epoch seconds, bar open).
#[derive(Debug, Clone, Deserialize)]
pub struct BarWire {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub tick_volume: u64,
}

impl BarWire {
    pub fn into_bar(self) -> Result<Bar, BrokerError> {
        let time = epoch(self.time)?;
        Ok(Bar {
            time,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            tick_volume: self.tick_volume,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickWire {
    pub time: i64,
    pub bid: f64,
    pub ask: f64,
}

impl TickWire {
    pub fn into_tick(self) -> Result<Tick, BrokerError> {
        Ok(Tick {
            time: epoch(self.time)?,
            bid: self.bid,
            ask: self.ask,
        })
    }
}

/// Contract metadata, named as the terminal names it.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolWire {
    pub name: String,
    pub point: f64,
    pub trade_tick_value: f64,
    pub trade_tick_size: f64,
    pub volume_min: f64,
    pub volume_max: f64,
    pub volume_step: f64,
}

impl From<SymbolWire> for SymbolInfo {
    fn from(w: SymbolWire) -> Self {
        SymbolInfo {
            symbol: w.name,
            point: w.point,
            tick_value: w.trade_tick_value,
            tick_size: w.trade_tick_size,
            volume_min: w.volume_min,
            volume_max: w.volume_max,
            volume_step: w.volume_step,
        }
    }
}

/// Terminal position type: 0 is buy, 1 is sell.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionWire {
    pub ticket: u64,
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: i64,
    pub volume: f64,
    pub price_open: f64,
}

impl PositionWire {
    pub fn into_position(self) -> Result<Position, BrokerError> {
        let side = match self.kind {
            0 => PositionSide::Long,
            1 => PositionSide::Short,
            other => {
                return Err(BrokerError::Protocol(format!(
                    "position {} has unknown type {other}",
                    self.ticket
                )))
            }
        };
        Ok(Position {
            ticket: self.ticket,
            symbol: self.symbol,
            side,
            volume: self.volume,
            open_price: self.price_open,
        })
    }
}

/// Market order body for `POST /order`. Absent protective levels are sent as 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderWire {
    pub symbol: String,
    #[serde(rename = "type")]
    pub kind: OrderSide,
    pub intent: OrderIntent,
    pub volume: f64,
    pub price: f64,
    pub sl: f64,
    pub tp: f64,
    pub deviation: u32,
    pub magic: u64,
    pub comment: String,
}

impl From<&OrderRequest> for OrderWire {
    fn from(o: &OrderRequest) -> Self {
        OrderWire {
            symbol: o.symbol.clone(),
            kind: o.side,
            intent: o.intent,
            volume: o.volume,
            price: o.price,
            sl: o.stop_loss.unwrap_or(0.0),
            tp: o.take_profit.unwrap_or(0.0),
            deviation: o.deviation,
            magic: o.magic,
            comment: o.comment.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderReply {
    pub retcode: i64,
    pub done: bool,
    #[serde(default)]
    pub ticket: Option<u64>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub comment: String,
}

impl OrderReply {
    /// `fallback_price` is used when a fill reply omits its price.
    pub fn into_outcome(self, fallback_price: f64) -> Result<SubmitOutcome, BrokerError> {
        if !self.done {
            return Ok(SubmitOutcome::Rejected {
                code: Some(self.retcode),
                reason: self.comment,
            });
        }
        let ticket = self.ticket.ok_or_else(|| {
            BrokerError::Protocol(format!("fill reply (retcode {}) without ticket", self.retcode))
        })?;
        Ok(SubmitOutcome::Filled {
            ticket,
            price: self.price.unwrap_or(fallback_price),
        })
    }
}

fn epoch(secs: i64) -> Result<DateTime<Utc>, BrokerError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| BrokerError::Protocol(format!("invalid timestamp: {secs}")))
}

// ── Broker ───────────────────────────────────────────────────────────

pub struct BridgeBroker {
    base_url: String,
    client: reqwest::blocking::Client,
    connected: bool,
}

impl BridgeBroker {
    pub fn new(config: &BridgeConfig) -> Result<Self, BrokerError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .no_proxy()
            .build()
            .map_err(|e| BrokerError::Connectivity(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
            connected: false,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn ensure_connected(&self) -> Result<(), BrokerError> {
        if self.connected {
            Ok(())
        } else {
            Err(BrokerError::NotConnected)
        }
    }

    fn decode<T: DeserializeOwned>(
        path: &str,
        resp: reqwest::blocking::Response,
    ) -> Result<T, BrokerError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(BrokerError::Connectivity(format!("HTTP {status} for {path}")));
        }
        resp.json::<T>()
            .map_err(|e| BrokerError::Protocol(format!("failed to decode {path} response: {e}")))
    }

    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, BrokerError> {
        let resp = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .map_err(|e| BrokerError::Connectivity(format!("GET {path}: {e}")))?;
        Self::decode(path, resp)
    }
}

impl Broker for BridgeBroker {
    fn name(&self) -> &str {
        "bridge"
    }

    fn connect(&mut self) -> Result<(), BrokerError> {
        let resp = self
            .client
            .get(self.url("/health"))
            .send()
            .map_err(|e| BrokerError::Connectivity(format!("GET /health: {e}")))?;
        if !resp.status().is_success() {
            return Err(BrokerError::Connectivity(format!(
                "HTTP {} for /health",
                resp.status()
            )));
        }
        self.connected = true;
        info!(url = %self.base_url, "bridge connected");
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), BrokerError> {
        if self.connected {
            self.connected = false;
            info!(url = %self.base_url, "bridge disconnected");
        }
        Ok(())
    }

    fn fetch_bars(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, BrokerError> {
        self.ensure_connected()?;
        let wire: Vec<BarWire> = self.get(
            "/bars",
            &[
                ("symbol", symbol.to_string()),
                ("timeframe", timeframe.label().to_string()),
                ("count", count.to_string()),
            ],
        )?;
        debug!(symbol, count = wire.len(), "bars received");
        wire.into_iter().map(BarWire::into_bar).collect()
    }

    fn fetch_tick(&mut self, symbol: &str) -> Result<Tick, BrokerError> {
        self.ensure_connected()?;
        let wire: TickWire = self.get("/tick", &[("symbol", symbol.to_string())])?;
        wire.into_tick()
    }

    fn fetch_symbol_info(&mut self, symbol: &str) -> Result<SymbolInfo, BrokerError> {
        self.ensure_connected()?;
        let wire: SymbolWire = self.get("/symbol", &[("symbol", symbol.to_string())])?;
        Ok(wire.into())
    }

    fn fetch_account(&mut self) -> Result<AccountSnapshot, BrokerError> {
        self.ensure_connected()?;
        self.get("/account", &[])
    }

    fn fetch_open_positions(&mut self, symbol: &str) -> Result<Vec<Position>, BrokerError> {
        self.ensure_connected()?;
        let wire: Vec<PositionWire> =
            self.get("/positions", &[("symbol", symbol.to_string())])?;
        wire.into_iter().map(PositionWire::into_position).collect()
    }

    fn submit_order(&mut self, order: &OrderRequest) -> Result<SubmitOutcome, BrokerError> {
        self.ensure_connected()?;
        let resp = self
            .client
            .post(self.url("/order"))
            .json(&OrderWire::from(order))
            .send()
            .map_err(|e| BrokerError::Connectivity(format!("POST /order: {e}")))?;
        let reply: OrderReply = Self::decode("/order", resp)?;
        debug!(retcode = reply.retcode, done = reply.done, "order reply");
        reply.into_outcome(order.price)
    }
}
