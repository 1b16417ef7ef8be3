use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bar period requested from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn step_seconds(self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::M30 => 30 * 60,
            Timeframe::H1 => 60 * 60,
            Timeframe::H4 => 4 * 60 * 60,
            Timeframe::D1 => 24 * 60 * 60,
        }
    }

    pub fn step(self) -> Duration {
        Duration::seconds(self.step_seconds())
    }

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        let tf = match normalized.as_str() {
            "m1" | "1m" | "1min" => Timeframe::M1,
            "m5" | "5m" | "5min" => Timeframe::M5,
            "m15" | "15m" | "15min" => Timeframe::M15,
            "m30" | "30m" | "30min" => Timeframe::M30,
            "h1" | "1h" | "1hour" => Timeframe::H1,
            "h4" | "4h" | "4hour" => Timeframe::H4,
            "d1" | "1d" | "1day" => Timeframe::D1,
            _ => return Err(format!("unsupported timeframe: {value}")),
        };
        Ok(tf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_broker_and_short_labels() {
        assert_eq!("M1".parse::<Timeframe>().unwrap(), Timeframe::M1);
        assert_eq!("1m".parse::<Timeframe>().unwrap(), Timeframe::M1);
        assert_eq!(" h4 ".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert!("2m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn step_seconds() {
        assert_eq!(Timeframe::M1.step_seconds(), 60);
        assert_eq!(Timeframe::D1.step(), Duration::days(1));
    }

    #[test]
    fn display_matches_label() {
        assert_eq!(Timeframe::M15.to_string(), "M15");
    }
}
