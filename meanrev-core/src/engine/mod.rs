//! Trading loop: one iteration at a time, driven by a supervisor.
//!
//! [`Trader::run_iteration`] runs the full decision pipeline once and reports
//! a typed outcome or error. [`Supervisor`] repeats it, choosing how long to
//! wait from the result and stopping on shutdown or a fatal error.

pub mod clock;
pub mod iteration;
pub mod supervisor;

pub use clock::{Clock, ManualClock, Pacer, SimulatedPacer, SystemClock, ThreadPacer};
pub use iteration::{
    IterationError, IterationOutcome, IterationReport, SettingsError, Severity, Trader,
    TraderSettings, TraderState,
};
pub use supervisor::{RunSummary, Schedule, StopReason, Supervisor, SupervisorError};
