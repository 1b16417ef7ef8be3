//! Supervisor: drives iterations and applies the retry policy.
//!
//! | Iteration result       | Next wait                                  |
//! |------------------------|--------------------------------------------|
//! | Completed              | `poll_interval`                            |
//! | GateBlocked            | `gate_retry`                               |
//! | Suspended              | the breaker's pause                        |
//! | Transient error        | `error_retry`, doubling per failure, capped |
//! | Fatal error            | loop stops, error returned                 |
//!
//! The supervisor never connects or disconnects the broker; the caller owns
//! the session around `run`.

use super::clock::{Clock, Pacer};
use super::iteration::{IterationError, IterationOutcome, Trader, TraderState};
use crate::broker::Broker;
use crate::execution::ExecutionOutcome;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, info_span, warn};

/// Loop timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub poll_interval_secs: u64,
    pub gate_retry_secs: u64,
    pub error_retry_secs: u64,
    pub max_error_backoff_secs: u64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            gate_retry_secs: 5,
            error_retry_secs: 10,
            max_error_backoff_secs: 60,
        }
    }
}

impl Schedule {
    pub fn validate(&self) -> Result<(), String> {
        for (name, secs) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("gate_retry_secs", self.gate_retry_secs),
            ("error_retry_secs", self.error_retry_secs),
        ] {
            if secs == 0 {
                return Err(format!("{name} must be >= 1"));
            }
        }
        if self.max_error_backoff_secs < self.error_retry_secs {
            return Err(format!(
                "max_error_backoff_secs ({}) must be >= error_retry_secs ({})",
                self.max_error_backoff_secs, self.error_retry_secs
            ));
        }
        Ok(())
    }

    /// Wait after the `consecutive`-th transient failure in a row (1-based).
    pub fn backoff(&self, consecutive: u32) -> Duration {
        let exponent = consecutive.saturating_sub(1).min(16);
        let secs = self
            .error_retry_secs
            .saturating_mul(1u64 << exponent)
            .min(self.max_error_backoff_secs);
        Duration::from_secs(secs)
    }
}

/// Why the loop ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    Shutdown,
    MaxIterations,
}

/// Counters for one supervised run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub iterations: u64,
    pub completed: u64,
    pub gate_blocked: u64,
    pub suspended: u64,
    pub transient_errors: u64,
    pub orders_filled: u64,
    pub orders_rejected: u64,
    pub orders_simulated: u64,
    pub stop_reason: Option<StopReason>,
}

impl RunSummary {
    fn record(&mut self, outcome: &IterationOutcome) {
        match outcome {
            IterationOutcome::Completed(report) => {
                self.completed += 1;
                match report.execution.as_ref().map(|r| &r.outcome) {
                    Some(ExecutionOutcome::Filled { .. }) => self.orders_filled += 1,
                    Some(ExecutionOutcome::Rejected { .. }) => self.orders_rejected += 1,
                    Some(ExecutionOutcome::Simulated) => self.orders_simulated += 1,
                    None => {}
                }
            }
            IterationOutcome::GateBlocked { .. } => self.gate_blocked += 1,
            IterationOutcome::Suspended { .. } => self.suspended += 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("fatal error in iteration {iteration}: {source}")]
    Fatal {
        iteration: u64,
        #[source]
        source: IterationError,
        summary: RunSummary,
    },
}

pub struct Supervisor {
    trader: Trader,
    schedule: Schedule,
    clock: Box<dyn Clock>,
    pacer: Box<dyn Pacer>,
    shutdown: Arc<AtomicBool>,
    max_iterations: Option<u64>,
}

impl Supervisor {
    pub fn new(
        trader: Trader,
        schedule: Schedule,
        clock: Box<dyn Clock>,
        pacer: Box<dyn Pacer>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            trader,
            schedule,
            clock,
            pacer,
            shutdown,
            max_iterations: None,
        }
    }

    /// Stop after `n` iterations (used by `--max-iterations` and tests).
    pub fn with_max_iterations(mut self, n: Option<u64>) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn trader(&self) -> &Trader {
        &self.trader
    }

    fn limit_reached(&self, done: u64) -> bool {
        self.max_iterations.is_some_and(|max| done >= max)
    }

    /// Run until shutdown, the iteration limit, or a fatal error.
    pub fn run(
        &mut self,
        broker: &mut dyn Broker,
        state: &mut TraderState,
    ) -> Result<RunSummary, SupervisorError> {
        let mut summary = RunSummary::default();
        let mut consecutive_failures: u32 = 0;

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                summary.stop_reason = Some(StopReason::Shutdown);
                break;
            }
            if self.limit_reached(summary.iterations) {
                summary.stop_reason = Some(StopReason::MaxIterations);
                break;
            }

            summary.iterations += 1;
            state.iterations += 1;
            let n = state.iterations;

            let wait = {
                let span = info_span!("iteration", n);
                let _enter = span.enter();

                match self.trader.run_iteration(broker, state, self.clock.as_ref()) {
                    Ok(outcome) => {
                        consecutive_failures = 0;
                        summary.record(&outcome);
                        match outcome {
                            IterationOutcome::Completed(_) => {
                                Duration::from_secs(self.schedule.poll_interval_secs)
                            }
                            IterationOutcome::GateBlocked { .. } => {
                                Duration::from_secs(self.schedule.gate_retry_secs)
                            }
                            IterationOutcome::Suspended { pause, .. } => pause,
                        }
                    }
                    Err(err) if err.is_fatal() => {
                        error!(error = %err, "fatal error, stopping");
                        return Err(SupervisorError::Fatal {
                            iteration: n,
                            source: err,
                            summary,
                        });
                    }
                    Err(err) => {
                        consecutive_failures = consecutive_failures.saturating_add(1);
                        summary.transient_errors += 1;
                        let wait = self.schedule.backoff(consecutive_failures);
                        warn!(
                            error = %err,
                            consecutive_failures,
                            retry_in_secs = wait.as_secs(),
                            "iteration failed"
                        );
                        wait
                    }
                }
            };

            if self.limit_reached(summary.iterations) {
                continue;
            }
            self.pacer.pause(wait, &self.shutdown);
        }

        info!(
            iterations = summary.iterations,
            completed = summary.completed,
            gate_blocked = summary.gate_blocked,
            suspended = summary.suspended,
            transient_errors = summary.transient_errors,
            stop_reason = ?summary.stop_reason,
            "trading loop stopped"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let s = Schedule::default();
        assert_eq!(s.backoff(1), Duration::from_secs(10));
        assert_eq!(s.backoff(2), Duration::from_secs(20));
        assert_eq!(s.backoff(3), Duration::from_secs(40));
        assert_eq!(s.backoff(4), Duration::from_secs(60));
        assert_eq!(s.backoff(400), Duration::from_secs(60));
    }

    #[test]
    fn schedule_validation() {
        assert!(Schedule::default().validate().is_ok());
        let bad = Schedule {
            max_error_backoff_secs: 5,
            ..Schedule::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn zero_retry_waits_are_rejected() {
        let no_gate_wait = Schedule {
            gate_retry_secs: 0,
            ..Schedule::default()
        };
        assert_eq!(
            no_gate_wait.validate(),
            Err("gate_retry_secs must be >= 1".to_string())
        );
        let no_backoff = Schedule {
            error_retry_secs: 0,
            ..Schedule::default()
        };
        assert_eq!(
            no_backoff.validate(),
            Err("error_retry_secs must be >= 1".to_string())
        );
    }
}
