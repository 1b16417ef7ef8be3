use super::error::DataError;
use super::order::OrderSide;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

/// An open position as reported by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticket: u64,
    pub symbol: String,
    pub side: PositionSide,
    pub volume: f64,
    pub open_price: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == PositionSide::Short
    }

    /// Side of the market order that flattens this position.
    pub fn closing_side(&self) -> OrderSide {
        match self.side {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }

    pub fn unrealized_pnl_points(&self, current_price: f64) -> f64 {
        match self.side {
            PositionSide::Long => current_price - self.open_price,
            PositionSide::Short => self.open_price - current_price,
        }
    }
}

/// Per-symbol position state: flat or exactly one open position.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionState {
    Flat,
    Open(Position),
}

impl PositionState {
    /// Collapse the broker's position list into the single-position model.
    ///
    /// More than one open position for the symbol is an integrity error.
    pub fn from_positions(symbol: &str, mut positions: Vec<Position>) -> Result<Self, DataError> {
        match positions.len() {
            0 => Ok(PositionState::Flat),
            1 => Ok(PositionState::Open(positions.remove(0))),
            count => Err(DataError::MultiplePositions {
                symbol: symbol.to_string(),
                count,
            }),
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, PositionState::Flat)
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            PositionState::Flat => None,
            PositionState::Open(p) => Some(p),
        }
    }
}
