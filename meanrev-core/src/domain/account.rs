use super::error::DataError;
use serde::{Deserialize, Serialize};

/// Account balances at one point in time.
///
/// `balance` moves only on realized P&L; `equity` includes open positions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance: f64,
    pub equity: f64,
}

impl AccountSnapshot {
    pub fn validate(&self) -> Result<(), DataError> {
        if self.balance.is_finite() && self.equity.is_finite() {
            Ok(())
        } else {
            Err(DataError::MalformedAccount {
                balance: self.balance,
                equity: self.equity,
            })
        }
    }
}
