//! meanrev runner: configuration, broker adapters and session wiring.
//!
//! This crate builds on `meanrev-core` to provide:
//! - TOML configuration with reference defaults, validation and fingerprinting
//! - The HTTP bridge broker
//! - Session lifecycle: connect, supervised loop, disconnect
//! - One-shot dry-run inspection

pub mod bridge;
pub mod config;
pub mod session;

pub use bridge::BridgeBroker;
pub use config::{
    BridgeConfig, BrokerConfig, ConfigError, LogFormat, LoggingConfig, Overrides, TraderConfig,
    TraderSection,
};
pub use session::{build_broker, inspect, run, SessionError, SessionOptions, SessionReport};
