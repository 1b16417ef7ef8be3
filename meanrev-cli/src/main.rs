//! meanrev CLI: run, validate and inspect commands.
//!
//! Commands:
//! - `run`: connect and trade until Ctrl-C, the iteration limit, or a fatal error
//! - `validate`: print the resolved config and its fingerprint
//! - `inspect`: one dry-run decision against the configured broker

mod obs;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use meanrev_core::engine::IterationOutcome;
use meanrev_runner::{LogFormat, Overrides, SessionOptions, TraderConfig};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "meanrev",
    about = "meanrev: single-symbol mean-reversion trading loop"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trading loop.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Symbol to trade, overriding [trader] symbol.
        #[arg(long)]
        symbol: Option<String>,

        /// Send orders to the broker.
        #[arg(long, conflicts_with = "dry_run")]
        live: bool,

        /// Build and log orders without sending them.
        #[arg(long)]
        dry_run: bool,

        /// Stop after this many iterations.
        #[arg(long)]
        max_iterations: Option<u64>,

        /// Log level (trace, debug, info, warn, error).
        #[arg(long)]
        log_level: Option<String>,

        /// Log format: text or json.
        #[arg(long)]
        log_format: Option<LogFormat>,
    },
    /// Print the resolved config and its fingerprint.
    Validate {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
    /// Connect, evaluate one decision in dry-run mode, and disconnect.
    Inspect {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Symbol to inspect, overriding [trader] symbol.
        #[arg(long)]
        symbol: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            symbol,
            live,
            dry_run,
            max_iterations,
            log_level,
            log_format,
        } => {
            let dry_run = match (live, dry_run) {
                (true, _) => Some(false),
                (_, true) => Some(true),
                _ => None,
            };
            let overrides = Overrides {
                symbol,
                dry_run,
                log_level,
                log_format,
            };
            run_cmd(&config, &overrides, max_iterations)
        }
        Commands::Validate { config } => validate_cmd(&config),
        Commands::Inspect { config, symbol } => {
            let overrides = Overrides {
                symbol,
                ..Overrides::default()
            };
            inspect_cmd(&config, &overrides)
        }
    }
}

fn load(path: &Path, overrides: &Overrides) -> Result<TraderConfig> {
    let mut config = TraderConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    config.apply(overrides)?;
    Ok(config)
}

fn run_cmd(path: &Path, overrides: &Overrides, max_iterations: Option<u64>) -> Result<()> {
    let config = load(path, overrides)?;
    obs::init_tracing(&config.logging.level, config.logging.format).map_err(|e| anyhow!(e))?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::warn!("received shutdown signal");
        flag.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!(error = %e, "failed to set Ctrl-C handler; stop with --max-iterations");
    }

    let report = meanrev_runner::run(
        &config,
        SessionOptions {
            max_iterations,
            shutdown,
        },
    )?;

    let s = &report.summary;
    println!("broker:            {}", report.broker);
    println!("mode:              {:?}", report.mode);
    println!("fingerprint:       {}", report.fingerprint);
    println!("iterations:        {}", s.iterations);
    println!("completed:         {}", s.completed);
    println!("gate blocked:      {}", s.gate_blocked);
    println!("suspended:         {}", s.suspended);
    println!("transient errors:  {}", s.transient_errors);
    println!(
        "orders:            {} filled, {} rejected, {} simulated",
        s.orders_filled, s.orders_rejected, s.orders_simulated
    );
    if let Some(reason) = s.stop_reason {
        println!("stopped:           {reason:?}");
    }
    Ok(())
}

fn validate_cmd(path: &Path) -> Result<()> {
    let config = load(path, &Overrides::default())?;
    print!("{}", config.to_toml()?);
    println!();
    println!("# fingerprint: {}", config.fingerprint()?);
    Ok(())
}

fn inspect_cmd(path: &Path, overrides: &Overrides) -> Result<()> {
    let config = load(path, overrides)?;
    obs::init_tracing(&config.logging.level, config.logging.format).map_err(|e| anyhow!(e))?;

    let outcome = meanrev_runner::inspect(&config)?;
    println!("symbol:   {}", config.trader.symbol);
    match outcome {
        IterationOutcome::Completed(report) => {
            println!("z-score:  {:.4}", report.z);
            println!("close:    {}", report.close);
            println!("gate:     passed");
            println!("action:   {}", report.decision.label());
            if let Some(exec) = report.execution {
                let o = &exec.order;
                println!(
                    "order:    {} {} @ {} sl={:?} tp={:?}",
                    o.side, o.volume, o.price, o.stop_loss, o.take_profit
                );
                println!("outcome:  {:?}", exec.outcome);
            }
        }
        IterationOutcome::GateBlocked { verdict } => {
            println!("gate:     blocked ({verdict})");
            println!("action:   none");
        }
        IterationOutcome::Suspended { trip, pause } => {
            println!("risk:     suspended ({trip}), pause {}s", pause.as_secs());
            println!("action:   none");
        }
    }
    Ok(())
}
