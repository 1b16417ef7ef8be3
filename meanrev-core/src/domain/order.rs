//! Order requests and broker submission outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Why the order is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderIntent {
    /// Opens a position from flat, always with stop-loss and take-profit.
    Entry,
    /// Closes the open position at market, no stop or target.
    Exit,
}

/// A market order, built and dispatched within a single iteration.
///
/// `price` is the reference price the order was priced against (ask for buys,
/// bid for sells); brokers fill within `deviation` points of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub intent: OrderIntent,
    pub volume: f64,
    pub price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub deviation: u32,
    pub magic: u64,
    pub comment: String,
}

/// What the broker did with a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubmitOutcome {
    Filled { ticket: u64, price: f64 },
    Rejected { code: Option<i64>, reason: String },
}

impl SubmitOutcome {
    pub fn is_filled(&self) -> bool {
        matches!(self, SubmitOutcome::Filled { .. })
    }
}
