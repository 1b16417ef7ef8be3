//! Order dispatch: prices, validates and sends (or simulates) an order.

use crate::broker::{Broker, BrokerError};
use crate::domain::{DataError, OrderIntent, OrderRequest, OrderSide, SubmitOutcome, SymbolInfo};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Whether orders reach the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Build, validate and log orders without submitting them.
    #[default]
    DryRun,
    Live,
}

impl ExecutionMode {
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            ExecutionMode::DryRun
        } else {
            ExecutionMode::Live
        }
    }
}

/// What became of a dispatched order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExecutionOutcome {
    Filled { ticket: u64, price: f64 },
    /// Refused by the broker, or by local validation (`code` is `None`).
    Rejected { code: Option<i64>, reason: String },
    /// Dry run: the order was valid and logged but never sent.
    Simulated,
}

impl From<SubmitOutcome> for ExecutionOutcome {
    fn from(outcome: SubmitOutcome) -> Self {
        match outcome {
            SubmitOutcome::Filled { ticket, price } => ExecutionOutcome::Filled { ticket, price },
            SubmitOutcome::Rejected { code, reason } => ExecutionOutcome::Rejected { code, reason },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// The order as priced and validated.
    pub order: OrderRequest,
    pub outcome: ExecutionOutcome,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Data(#[from] DataError),
}

#[derive(Debug, Clone)]
pub struct OrderExecutor {
    mode: ExecutionMode,
}

impl OrderExecutor {
    pub fn new(mode: ExecutionMode) -> Self {
        Self { mode }
    }

    /// Price `order` against a fresh tick, validate it, then submit or simulate.
    ///
    /// Validation failures come back as a `Rejected` outcome, not an error.
    pub fn execute(
        &self,
        broker: &mut dyn Broker,
        mut order: OrderRequest,
        symbol: &SymbolInfo,
    ) -> Result<ExecutionReport, DispatchError> {
        let tick = broker.fetch_tick(&order.symbol)?;
        tick.validate()?;
        order.price = tick.price_for(order.side);

        if let Err(reason) = validate_order(&order, symbol) {
            warn!(side = %order.side, volume = order.volume, %reason, "order rejected locally");
            return Ok(ExecutionReport {
                order,
                outcome: ExecutionOutcome::Rejected { code: None, reason },
            });
        }

        let outcome = match self.mode {
            ExecutionMode::DryRun => {
                info!(
                    side = %order.side,
                    intent = ?order.intent,
                    volume = order.volume,
                    price = order.price,
                    stop_loss = ?order.stop_loss,
                    take_profit = ?order.take_profit,
                    "dry run: order not sent"
                );
                ExecutionOutcome::Simulated
            }
            ExecutionMode::Live => {
                let outcome: ExecutionOutcome = broker.submit_order(&order)?.into();
                match &outcome {
                    ExecutionOutcome::Filled { ticket, price } => info!(
                        side = %order.side,
                        intent = ?order.intent,
                        volume = order.volume,
                        ticket,
                        price,
                        "order filled"
                    ),
                    ExecutionOutcome::Rejected { code, reason } => warn!(
                        side = %order.side,
                        intent = ?order.intent,
                        volume = order.volume,
                        code = ?code,
                        %reason,
                        "order rejected by broker"
                    ),
                    ExecutionOutcome::Simulated => {}
                }
                outcome
            }
        };

        Ok(ExecutionReport { order, outcome })
    }
}

/// Local sanity checks before an order leaves the process.
pub fn validate_order(order: &OrderRequest, symbol: &SymbolInfo) -> Result<(), String> {
    if !(order.price.is_finite() && order.price > 0.0) {
        return Err(format!("invalid price {}", order.price));
    }
    if !(order.volume.is_finite() && order.volume > 0.0) {
        return Err(format!("invalid volume {}", order.volume));
    }
    match order.intent {
        OrderIntent::Exit => Ok(()),
        OrderIntent::Entry => {
            if !symbol.accepts_volume(order.volume) {
                return Err(format!(
                    "volume {} outside [{}, {}] or off step {}",
                    order.volume, symbol.volume_min, symbol.volume_max, symbol.volume_step
                ));
            }
            let (Some(sl), Some(tp)) = (order.stop_loss, order.take_profit) else {
                return Err("entry order without stop-loss and take-profit".into());
            };
            let ok = match order.side {
                OrderSide::Buy => sl < order.price && order.price < tp,
                OrderSide::Sell => tp < order.price && order.price < sl,
            };
            if ok {
                Ok(())
            } else {
                Err(format!(
                    "protective levels on the wrong side of price {}: sl={sl}, tp={tp}",
                    order.price
                ))
            }
        }
    }
}
