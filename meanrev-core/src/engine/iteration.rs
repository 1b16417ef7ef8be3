//! One pass of the trading loop.
//!
//! Order of work inside an iteration:
//! 1. Account snapshot, day rollover, circuit breakers
//! 2. Market data: symbol info, bars, tick, open positions
//! 3. Trade outcome tracking (loss streak)
//! 4. Safety gate
//! 5. Signal and execution decision
//! 6. Dispatch, recording the cooldown anchor

use crate::broker::{Broker, BrokerError};
use crate::domain::{
    validate_series, AccountSnapshot, DataError, PositionState, SymbolInfo, Timeframe,
};
use crate::execution::{
    decide, Decision, DispatchError, ExecutionMode, ExecutionParams, ExecutionReport,
    OrderExecutor,
};
use crate::gate::{GateContext, GateParams, GateVerdict, SafetyGate};
use crate::risk::{check_breakers, BreakerTrip, DayEvent, RiskLimits, RiskState};
use crate::signal::{self, SignalParams};
use crate::sizers::{Sizer, SizingConfig, SizingError};

use super::clock::Clock;

use chrono::NaiveDateTime;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Bars requested beyond the signal lookback.
const EXTRA_BARS: usize = 5;

/// Everything the trader needs to know about what to trade and how.
#[derive(Debug, Clone, PartialEq)]
pub struct TraderSettings {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub mode: ExecutionMode,
    pub signal: SignalParams,
    pub gate: GateParams,
    pub risk: RiskLimits,
    pub execution: ExecutionParams,
    pub sizing: SizingConfig,
}

impl Default for TraderSettings {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDm".into(),
            timeframe: Timeframe::M1,
            mode: ExecutionMode::DryRun,
            signal: SignalParams::default(),
            gate: GateParams::default(),
            risk: RiskLimits::default(),
            execution: ExecutionParams::default(),
            sizing: SizingConfig::default(),
        }
    }
}

impl TraderSettings {
    /// Bars fetched per iteration: enough for the signal, volatility and range windows.
    pub fn bars_needed(&self) -> usize {
        (self.signal.lookback + EXTRA_BARS)
            .max(self.gate.required_bars())
            .max(self.execution.range_window)
    }

    /// Fewest bars an iteration can decide on: the signal lookback or the
    /// volatility window, whichever is longer.
    pub fn required_history(&self) -> usize {
        self.signal
            .required_bars()
            .max(self.gate.required_bars())
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.symbol.trim().is_empty() {
            return Err(SettingsError::new("trader", "symbol must not be empty"));
        }
        self.signal
            .validate()
            .map_err(|r| SettingsError::new("signal", r))?;
        self.gate
            .validate()
            .map_err(|r| SettingsError::new("safety", r))?;
        self.risk
            .validate()
            .map_err(|r| SettingsError::new("risk", r))?;
        self.execution
            .validate()
            .map_err(|r| SettingsError::new("execution", r))?;
        self.sizing
            .validate()
            .map_err(|r| SettingsError::new("sizing", r))
    }
}

/// A `TraderSettings` value the trader refuses to run with.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {section} settings: {reason}")]
pub struct SettingsError {
    pub section: &'static str,
    pub reason: String,
}

impl SettingsError {
    fn new(section: &'static str, reason: impl Into<String>) -> Self {
        Self {
            section,
            reason: reason.into(),
        }
    }
}

/// State carried across iterations for the lifetime of the process.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TraderState {
    pub risk: RiskState,
    pub iterations: u64,
}

/// Result of an iteration that ran to a decision.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationReport {
    pub z: f64,
    pub close: f64,
    pub decision: Decision,
    /// Present when the decision dispatched an order.
    pub execution: Option<ExecutionReport>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IterationOutcome {
    Completed(IterationReport),
    /// A safety check failed; nothing was evaluated past it.
    GateBlocked { verdict: GateVerdict },
    /// A circuit breaker tripped; trading is paused for `pause`.
    Suspended { trip: BreakerTrip, pause: Duration },
}

impl IterationOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            IterationOutcome::Completed(_) => "completed",
            IterationOutcome::GateBlocked { .. } => "gate_blocked",
            IterationOutcome::Suspended { .. } => "suspended",
        }
    }
}

/// How the supervisor should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Retry after a backoff.
    Transient,
    /// Stop the loop.
    Fatal,
}

#[derive(Debug, Error)]
pub enum IterationError {
    #[error("broker: {0}")]
    Broker(#[from] BrokerError),

    #[error("data: {0}")]
    Data(#[from] DataError),

    #[error("sizing: {0}")]
    Sizing(#[from] SizingError),
}

impl From<DispatchError> for IterationError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Broker(e) => IterationError::Broker(e),
            DispatchError::Data(e) => IterationError::Data(e),
        }
    }
}

impl IterationError {
    pub fn severity(&self) -> Severity {
        match self {
            IterationError::Data(e) if e.is_integrity() => Severity::Fatal,
            _ => Severity::Transient,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// The decision pipeline for one symbol.
pub struct Trader {
    settings: TraderSettings,
    gate: SafetyGate,
    sizer: Box<dyn Sizer>,
    executor: OrderExecutor,
}

impl Trader {
    /// Build the pipeline, rejecting settings it cannot run with.
    pub fn new(settings: TraderSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        let gate = SafetyGate::standard(&settings.gate);
        let sizer = settings.sizing.build();
        let executor = OrderExecutor::new(settings.mode);
        Ok(Self {
            settings,
            gate,
            sizer,
            executor,
        })
    }

    pub fn settings(&self) -> &TraderSettings {
        &self.settings
    }

    pub fn run_iteration(
        &self,
        broker: &mut dyn Broker,
        state: &mut TraderState,
        clock: &dyn Clock,
    ) -> Result<IterationOutcome, IterationError> {
        let symbol = self.settings.symbol.as_str();

        let account = broker.fetch_account()?;
        account.validate()?;
        let now = clock.now();

        match state.risk.observe(now.date(), account.equity) {
            DayEvent::Initialized => info!(
                start_equity = state.risk.start_equity,
                day = %now.date(),
                "risk state initialized"
            ),
            DayEvent::Rollover { previous } => info!(
                previous = %previous,
                day = %now.date(),
                start_equity = state.risk.start_equity,
                "new trading day"
            ),
            DayEvent::SameDay => {}
        }
        debug!(
            equity = account.equity,
            peak = state.risk.peak_equity,
            drawdown = state.risk.drawdown_from_peak(account.equity),
            "equity observed"
        );

        if let Some(trip) = check_breakers(&state.risk, account.equity, &self.settings.risk) {
            let pause = trip.pause(&self.settings.risk);
            warn!(%trip, pause_secs = pause.as_secs(), "circuit breaker tripped");
            return Ok(IterationOutcome::Suspended { trip, pause });
        }

        let info = broker.fetch_symbol_info(symbol)?;
        info.validate()?;
        let bars =
            broker.fetch_bars(symbol, self.settings.timeframe, self.settings.bars_needed())?;
        validate_series(&bars)?;
        let required = self.settings.required_history();
        if bars.len() < required {
            return Err(DataError::InsufficientHistory {
                required,
                available: bars.len(),
            }
            .into());
        }
        let tick = broker.fetch_tick(symbol)?;
        tick.validate()?;
        let positions = broker.fetch_open_positions(symbol)?;
        let position = PositionState::from_positions(symbol, positions)?;

        state.risk.track_outcome(&position, account.balance, now);

        let evaluation = self.gate.evaluate(&GateContext {
            now,
            last_trade_time: state.risk.last_trade_time,
            bars: &bars,
            tick: &tick,
            symbol: &info,
        });
        if !evaluation.is_passed() {
            info!(
                verdict = %evaluation.verdict,
                checks = ?evaluation.evaluated,
                "safety gate blocked"
            );
            return Ok(IterationOutcome::GateBlocked {
                verdict: evaluation.verdict,
            });
        }

        let reading = signal::evaluate(&bars, &self.settings.signal)?;
        let decision = decide(
            &reading,
            &position,
            &bars,
            &self.settings.signal,
            &self.settings.execution,
        );
        debug!(
            z = reading.z,
            close = reading.close,
            decision = decision.label(),
            "signal evaluated"
        );

        let execution =
            self.dispatch(broker, state, &decision, &account, &info, reading.close, now)?;

        Ok(IterationOutcome::Completed(IterationReport {
            z: reading.z,
            close: reading.close,
            decision,
            execution,
        }))
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &self,
        broker: &mut dyn Broker,
        state: &mut TraderState,
        decision: &Decision,
        account: &AccountSnapshot,
        info: &SymbolInfo,
        close: f64,
        now: NaiveDateTime,
    ) -> Result<Option<ExecutionReport>, IterationError> {
        let order = match decision {
            Decision::Wait | Decision::Hold => return Ok(None),
            Decision::Enter {
                side,
                price,
                stop_distance,
            } => {
                let volume = self.sizer.size(account.equity, *stop_distance, info)?;
                info!(
                    side = %side,
                    price,
                    stop_distance,
                    volume,
                    sizer = self.sizer.name(),
                    "entry signal"
                );
                self.settings.execution.entry_order(
                    &self.settings.symbol,
                    *side,
                    *price,
                    *stop_distance,
                    volume,
                )
            }
            Decision::Exit { position } => {
                info!(
                    ticket = position.ticket,
                    side = ?position.side,
                    volume = position.volume,
                    "exit signal"
                );
                self.settings.execution.exit_order(position, close)
            }
        };

        let report = self.executor.execute(broker, order, info)?;
        state.risk.record_trade(now);
        Ok(Some(report))
    }
}
