//! Trade outcome tracking: feeds the loss streak.
//!
//! A position can close by our exit order or by the broker's stop-loss /
//! take-profit, so outcomes are judged from the account balance rather than
//! from our own orders: the balance when the position first appears is
//! compared with the balance once it is gone.

use super::RiskState;
use crate::domain::{Position, PositionSide, PositionState};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::info;

/// The position currently being tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTrade {
    pub ticket: u64,
    pub side: PositionSide,
    pub volume: f64,
    /// Account balance when the position was first seen.
    pub entry_balance: f64,
    pub opened_at: NaiveDateTime,
}

impl OpenTrade {
    fn from_position(position: &Position, balance: f64, now: NaiveDateTime) -> Self {
        Self {
            ticket: position.ticket,
            side: position.side,
            volume: position.volume,
            entry_balance: balance,
            opened_at: now,
        }
    }
}

/// Change observed by the tracker in one iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    Opened(OpenTrade),
    Closed {
        trade: OpenTrade,
        realized: f64,
        loss_streak: u32,
    },
}

impl RiskState {
    /// Reconcile the tracked trade with the broker's view of the position.
    ///
    /// A realized result below zero extends the loss streak; anything else
    /// (including breakeven) resets it.
    pub fn track_outcome(
        &mut self,
        position: &PositionState,
        balance: f64,
        now: NaiveDateTime,
    ) -> Vec<TradeEvent> {
        let mut events = Vec::new();

        let replaced = match (position.position(), &self.open_trade) {
            (Some(current), Some(tracked)) => current.ticket != tracked.ticket,
            (None, Some(_)) => true,
            _ => false,
        };
        if replaced {
            if let Some(trade) = self.open_trade.take() {
                events.push(self.close_trade(trade, balance));
            }
        }

        if let (Some(current), true) = (position.position(), self.open_trade.is_none()) {
            let trade = OpenTrade::from_position(current, balance, now);
            info!(
                ticket = trade.ticket,
                side = ?trade.side,
                volume = trade.volume,
                entry_balance = balance,
                "tracking open trade"
            );
            self.open_trade = Some(trade.clone());
            events.push(TradeEvent::Opened(trade));
        }

        events
    }

    fn close_trade(&mut self, trade: OpenTrade, balance: f64) -> TradeEvent {
        let realized = balance - trade.entry_balance;
        if realized < 0.0 {
            self.loss_streak += 1;
        } else {
            self.loss_streak = 0;
        }
        info!(
            ticket = trade.ticket,
            side = ?trade.side,
            realized,
            loss_streak = self.loss_streak,
            "trade closed"
        );
        TradeEvent::Closed {
            trade,
            realized,
            loss_streak: self.loss_streak,
        }
    }
}
