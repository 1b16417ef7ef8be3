//! Domain types for the meanrev trading loop.

pub mod account;
pub mod bar;
pub mod error;
pub mod instrument;
pub mod order;
pub mod position;
pub mod tick;
pub mod timeframe;

pub use account::AccountSnapshot;
pub use bar::{validate_series, Bar};
pub use error::DataError;
pub use instrument::SymbolInfo;
pub use order::{OrderIntent, OrderRequest, OrderSide, SubmitOutcome};
pub use position::{Position, PositionSide, PositionState};
pub use tick::Tick;
pub use timeframe::Timeframe;
