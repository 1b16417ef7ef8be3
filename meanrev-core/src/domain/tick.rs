use super::error::DataError;
use super::order::OrderSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current best quote for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub time: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
}

impl Tick {
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Price a market order on `side` would execute at: ask for buys, bid for sells.
    pub fn price_for(&self, side: OrderSide) -> f64 {
        match side {
            OrderSide::Buy => self.ask,
            OrderSide::Sell => self.bid,
        }
    }

    pub fn validate(&self) -> Result<(), DataError> {
        let ok = self.bid.is_finite()
            && self.ask.is_finite()
            && self.bid > 0.0
            && self.ask >= self.bid;
        if ok {
            Ok(())
        } else {
            Err(DataError::MalformedTick {
                bid: self.bid,
                ask: self.ask,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(bid: f64, ask: f64) -> Tick {
        Tick {
            time: Utc::now(),
            bid,
            ask,
        }
    }

    #[test]
    fn spread_and_side_price() {
        let t = tick(100.0, 100.5);
        assert_eq!(t.spread(), 0.5);
        assert_eq!(t.price_for(OrderSide::Buy), 100.5);
        assert_eq!(t.price_for(OrderSide::Sell), 100.0);
    }

    #[test]
    fn crossed_or_nan_quotes_are_rejected() {
        assert!(tick(100.0, 100.0).validate().is_ok());
        assert!(tick(100.5, 100.0).validate().is_err());
        assert!(tick(f64::NAN, 100.0).validate().is_err());
        assert!(tick(0.0, 1.0).validate().is_err());
    }
}
