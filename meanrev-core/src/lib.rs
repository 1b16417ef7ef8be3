//! meanrev core: a single-symbol mean-reversion trading loop.
//!
//! - Domain types (bars, ticks, symbol metadata, positions, orders)
//! - Detrended z-score signal
//! - Safety gate chain (trading hours, cooldown, volatility, spread)
//! - Position sizers
//! - Execution controller and order dispatch (live or dry run)
//! - Risk governor (daily loss and loss-streak breakers)
//! - `Broker` trait plus an in-process paper broker
//! - Iteration pipeline and supervisor loop

pub mod broker;
pub mod domain;
pub mod engine;
pub mod execution;
pub mod gate;
pub mod indicators;
pub mod risk;
pub mod signal;
pub mod sizers;
