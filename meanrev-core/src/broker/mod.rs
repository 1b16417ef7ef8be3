//! Broker abstraction: the trader's only window onto the market.
//!
//! Implementations own all transport concerns. Methods take `&mut self` so
//! simulated brokers can advance their own clock and book.

pub mod paper;

pub use paper::{PaperBroker, PaperConfig};

use crate::domain::{
    AccountSnapshot, Bar, OrderRequest, Position, SubmitOutcome, SymbolInfo, Tick, Timeframe,
};
use thiserror::Error;

/// Transport-level failures. Order rejection by the venue is *not* an error:
/// it comes back as `SubmitOutcome::Rejected`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BrokerError {
    #[error("connectivity failure: {0}")]
    Connectivity(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("broker is not connected")]
    NotConnected,

    #[error("request rejected by broker: {0}")]
    Rejected(String),
}

/// Market data, account queries and order submission for one venue.
pub trait Broker {
    /// Short identifier for logs (e.g., "paper", "bridge").
    fn name(&self) -> &str;

    fn connect(&mut self) -> Result<(), BrokerError>;

    fn disconnect(&mut self) -> Result<(), BrokerError>;

    /// The most recent `count` bars, oldest first.
    fn fetch_bars(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, BrokerError>;

    fn fetch_tick(&mut self, symbol: &str) -> Result<Tick, BrokerError>;

    fn fetch_symbol_info(&mut self, symbol: &str) -> Result<SymbolInfo, BrokerError>;

    fn fetch_account(&mut self) -> Result<AccountSnapshot, BrokerError>;

    fn fetch_open_positions(&mut self, symbol: &str) -> Result<Vec<Position>, BrokerError>;

    fn submit_order(&mut self, order: &OrderRequest) -> Result<SubmitOutcome, BrokerError>;
}

impl<B: Broker + ?Sized> Broker for Box<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn connect(&mut self) -> Result<(), BrokerError> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<(), BrokerError> {
        (**self).disconnect()
    }

    fn fetch_bars(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<Bar>, BrokerError> {
        (**self).fetch_bars(symbol, timeframe, count)
    }

    fn fetch_tick(&mut self, symbol: &str) -> Result<Tick, BrokerError> {
        (**self).fetch_tick(symbol)
    }

    fn fetch_symbol_info(&mut self, symbol: &str) -> Result<SymbolInfo, BrokerError> {
        (**self).fetch_symbol_info(symbol)
    }

    fn fetch_account(&mut self) -> Result<AccountSnapshot, BrokerError> {
        (**self).fetch_account()
    }

    fn fetch_open_positions(&mut self, symbol: &str) -> Result<Vec<Position>, BrokerError> {
        (**self).fetch_open_positions(symbol)
    }

    fn submit_order(&mut self, order: &OrderRequest) -> Result<SubmitOutcome, BrokerError> {
        (**self).submit_order(order)
    }
}
