//! Session wiring: build the broker, connect, run the supervisor, disconnect.
//!
//! A connect failure is fatal before the loop starts. Whatever way the loop
//! ends, the broker is disconnected before returning.

use crate::bridge::BridgeBroker;
use crate::config::{BrokerConfig, ConfigError, TraderConfig};

use meanrev_core::broker::{Broker, BrokerError, PaperBroker};
use meanrev_core::engine::{
    Clock, IterationError, IterationOutcome, ManualClock, Pacer, RunSummary, SettingsError,
    SimulatedPacer, Supervisor, SupervisorError, SystemClock, ThreadPacer, Trader, TraderState,
};
use meanrev_core::execution::ExecutionMode;

use serde::Serialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to connect to {broker} broker: {source}")]
    Connect {
        broker: String,
        #[source]
        source: BrokerError,
    },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("inspection failed: {0}")]
    Inspect(#[source] IterationError),
}

/// How the loop should run, beyond what the config file says.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub max_iterations: Option<u64>,
    pub shutdown: Arc<AtomicBool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub broker: String,
    pub fingerprint: String,
    pub mode: ExecutionMode,
    pub summary: RunSummary,
}

/// Construct the configured broker, not yet connected.
pub fn build_broker(config: &TraderConfig) -> Result<Box<dyn Broker>, SessionError> {
    match &config.broker {
        BrokerConfig::Paper(paper) => {
            let mut paper = paper.clone();
            paper.timeframe = config.trader.timeframe;
            Ok(Box::new(PaperBroker::new(config.trader.symbol.clone(), paper)))
        }
        BrokerConfig::Bridge(bridge) => {
            let broker = BridgeBroker::new(bridge).map_err(|source| SessionError::Connect {
                broker: "bridge".into(),
                source,
            })?;
            Ok(Box::new(broker))
        }
    }
}

fn connect(broker: &mut dyn Broker) -> Result<(), SessionError> {
    broker.connect().map_err(|source| {
        error!(broker = broker.name(), error = %source, "connect failed");
        SessionError::Connect {
            broker: broker.name().to_string(),
            source,
        }
    })
}

fn disconnect(broker: &mut dyn Broker) {
    if let Err(e) = broker.disconnect() {
        warn!(broker = broker.name(), error = %e, "disconnect failed");
    }
}

/// Real time for live brokers; simulated time for an accelerated paper venue.
///
/// Simulated time starts at the opening hour of the configured trading window
/// on the current local date.
fn time_sources(config: &TraderConfig) -> (Box<dyn Clock>, Box<dyn Pacer>) {
    match &config.broker {
        BrokerConfig::Paper(paper) if paper.accelerated => {
            let today = SystemClock.now().date();
            let start = today
                .and_hms_opt(config.safety.trade_hours.0, 0, 0)
                .unwrap_or_else(|| SystemClock.now());
            let clock = ManualClock::new(start);
            let pacer = SimulatedPacer::new(clock.clone());
            (Box::new(clock), Box::new(pacer))
        }
        _ => (Box::new(SystemClock), Box::new(ThreadPacer::default())),
    }
}

/// Run the trading loop until shutdown, the iteration limit, or a fatal error.
pub fn run(config: &TraderConfig, options: SessionOptions) -> Result<SessionReport, SessionError> {
    config.validate()?;
    let fingerprint = config.fingerprint()?;
    let mode = config.mode();
    let trader = Trader::new(config.to_settings())?;

    let mut broker = build_broker(config)?;
    info!(
        symbol = %config.trader.symbol,
        timeframe = %config.trader.timeframe,
        broker = broker.name(),
        mode = ?mode,
        fingerprint = %fingerprint,
        "starting session"
    );
    if mode == ExecutionMode::Live {
        warn!("live mode: orders will be sent to the broker");
    }

    connect(broker.as_mut())?;

    let (clock, pacer) = time_sources(config);
    let mut supervisor = Supervisor::new(
        trader,
        config.schedule.clone(),
        clock,
        pacer,
        options.shutdown,
    )
    .with_max_iterations(options.max_iterations);
    let mut state = TraderState::default();

    let result = supervisor.run(broker.as_mut(), &mut state);
    disconnect(broker.as_mut());

    let summary = result?;
    info!(broker = broker.name(), "session stopped");
    Ok(SessionReport {
        broker: broker.name().to_string(),
        fingerprint,
        mode,
        summary,
    })
}

/// Connect, run one iteration with dry run forced, disconnect.
pub fn inspect(config: &TraderConfig) -> Result<IterationOutcome, SessionError> {
    config.validate()?;
    let mut settings = config.to_settings();
    settings.mode = ExecutionMode::DryRun;
    let trader = Trader::new(settings)?;

    let mut broker = build_broker(config)?;
    connect(broker.as_mut())?;

    let (clock, _) = time_sources(config);
    let mut state = TraderState::default();
    let result = trader.run_iteration(broker.as_mut(), &mut state, clock.as_ref());
    disconnect(broker.as_mut());

    result.map_err(SessionError::Inspect)
}
