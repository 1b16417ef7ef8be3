//! TOML configuration for a trading session.
//!
//! Every section and field is optional; anything left out takes the
//! reference default. A file containing only `[trader]` is a complete,
//! dry-run paper configuration.

use meanrev_core::broker::PaperConfig;
use meanrev_core::domain::Timeframe;
use meanrev_core::engine::{Schedule, TraderSettings};
use meanrev_core::execution::{ExecutionMode, ExecutionParams};
use meanrev_core::gate::GateParams;
use meanrev_core::risk::RiskLimits;
use meanrev_core::signal::SignalParams;
use meanrev_core::sizers::SizingConfig;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(String),

    #[error("invalid [{section}] config: {reason}")]
    Invalid {
        section: &'static str,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(section: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            section,
            reason: reason.into(),
        }
    }
}

/// `[trader]`: what to trade and whether orders reach the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderSection {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub dry_run: bool,
}

impl Default for TraderSection {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDm".into(),
            timeframe: Timeframe::M1,
            dry_run: true,
        }
    }
}

/// `[broker]`: which venue adapter to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BrokerConfig {
    Paper(PaperConfig),
    Bridge(BridgeConfig),
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig::Paper(PaperConfig::default())
    }
}

impl BrokerConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BrokerConfig::Paper(_) => "paper",
            BrokerConfig::Bridge(_) => "bridge",
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            BrokerConfig::Paper(p) => {
                let positive = [
                    ("initial_balance", p.initial_balance),
                    ("start_price", p.start_price),
                    ("point", p.point),
                    ("volume_min", p.volume_min),
                    ("volume_max", p.volume_max),
                    ("volume_step", p.volume_step),
                ];
                for (name, value) in positive {
                    if !(value.is_finite() && value > 0.0) {
                        return Err(format!("{name} must be > 0, got {value}"));
                    }
                }
                if !(p.spread_points.is_finite() && p.spread_points >= 0.0) {
                    return Err(format!("spread_points must be >= 0, got {}", p.spread_points));
                }
                if !(p.bar_volatility.is_finite() && p.bar_volatility >= 0.0) {
                    return Err(format!("bar_volatility must be >= 0, got {}", p.bar_volatility));
                }
                if !(0.0..=1.0).contains(&p.reversion) {
                    return Err(format!("reversion must be in [0, 1], got {}", p.reversion));
                }
                if p.volume_min > p.volume_max {
                    return Err(format!(
                        "volume_min {} exceeds volume_max {}",
                        p.volume_min, p.volume_max
                    ));
                }
                Ok(())
            }
            BrokerConfig::Bridge(b) => b.validate(),
        }
    }
}

/// Connection settings for the HTTP bridge in front of the trading terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub url: String,
    pub timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8787".into(),
            timeout_secs: 10,
        }
    }
}

impl BridgeConfig {
    fn validate(&self) -> Result<(), String> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(format!("url must start with http:// or https://, got {:?}", self.url));
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be >= 1".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Text => f.write_str("text"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unsupported log format: {other} (expected text or json)")),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    pub symbol: Option<String>,
    pub dry_run: Option<bool>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderConfig {
    pub trader: TraderSection,
    pub signal: SignalParams,
    pub risk: RiskLimits,
    pub safety: GateParams,
    pub execution: ExecutionParams,
    pub sizing: SizingConfig,
    pub schedule: Schedule,
    pub broker: BrokerConfig,
    pub logging: LoggingConfig,
}

impl TraderConfig {
    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: TraderConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trader.symbol.trim().is_empty() {
            return Err(ConfigError::invalid("trader", "symbol must not be empty"));
        }
        self.signal
            .validate()
            .map_err(|r| ConfigError::invalid("signal", r))?;
        self.risk.validate().map_err(|r| ConfigError::invalid("risk", r))?;
        self.safety
            .validate()
            .map_err(|r| ConfigError::invalid("safety", r))?;
        self.execution
            .validate()
            .map_err(|r| ConfigError::invalid("execution", r))?;
        self.sizing
            .validate()
            .map_err(|r| ConfigError::invalid("sizing", r))?;
        self.schedule
            .validate()
            .map_err(|r| ConfigError::invalid("schedule", r))?;
        self.broker
            .validate()
            .map_err(|r| ConfigError::invalid("broker", r))?;
        let level = self.logging.level.to_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::invalid(
                "logging",
                format!(
                    "level must be one of {}, got {:?}",
                    LOG_LEVELS.join(", "),
                    self.logging.level
                ),
            ));
        }
        Ok(())
    }

    /// Apply command-line overrides and re-validate.
    pub fn apply(&mut self, overrides: &Overrides) -> Result<(), ConfigError> {
        if let Some(symbol) = &overrides.symbol {
            self.trader.symbol = symbol.clone();
        }
        if let Some(dry_run) = overrides.dry_run {
            self.trader.dry_run = dry_run;
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(format) = overrides.log_format {
            self.logging.format = format;
        }
        self.validate()
    }

    pub fn mode(&self) -> ExecutionMode {
        ExecutionMode::from_dry_run(self.trader.dry_run)
    }

    /// Deterministic BLAKE3 hash of the resolved configuration.
    ///
    /// Two configs that differ in any field, including defaults filled in
    /// from an empty section, hash differently.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_vec(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        Ok(blake3::hash(&json).to_hex().to_string())
    }

    /// The core crate's view of the configuration.
    pub fn to_settings(&self) -> TraderSettings {
        TraderSettings {
            symbol: self.trader.symbol.clone(),
            timeframe: self.trader.timeframe,
            mode: self.mode(),
            signal: self.signal.clone(),
            gate: self.safety.clone(),
            risk: self.risk.clone(),
            execution: self.execution.clone(),
            sizing: self.sizing.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_the_reference_configuration() {
        let config = TraderConfig::from_toml("").unwrap();
        assert_eq!(config, TraderConfig::default());
        assert_eq!(config.to_settings(), TraderSettings::default());
        assert_eq!(config.broker.kind(), "paper");
    }

    #[test]
    fn fingerprint_is_deterministic_and_sensitive() {
        let a = TraderConfig::default();
        let mut b = a.clone();
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        b.signal.entry_z = 1.3;
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = TraderConfig::default();
        config
            .apply(&Overrides {
                symbol: Some("ETHUSDm".into()),
                dry_run: Some(false),
                log_level: Some("debug".into()),
                log_format: Some(LogFormat::Json),
            })
            .unwrap();
        assert_eq!(config.trader.symbol, "ETHUSDm");
        assert_eq!(config.mode(), ExecutionMode::Live);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn bad_override_is_rejected() {
        let mut config = TraderConfig::default();
        let err = config
            .apply(&Overrides {
                log_level: Some("loud".into()),
                ..Overrides::default()
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { section: "logging", .. }));
    }

    #[test]
    fn resolved_config_round_trips_through_toml() {
        let mut config = TraderConfig::default();
        config.broker = BrokerConfig::Bridge(BridgeConfig::default());
        config.sizing = SizingConfig::FixedVolume { volume: 0.05 };
        let text = config.to_toml().unwrap();
        assert_eq!(TraderConfig::from_toml(&text).unwrap(), config);
    }
}
