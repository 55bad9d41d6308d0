use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Bar size of a candle stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::M1 => "1m",
            Granularity::M5 => "5m",
            Granularity::M15 => "15m",
            Granularity::M30 => "30m",
            Granularity::H1 => "1h",
            Granularity::H4 => "4h",
        }
    }

    pub fn as_duration(&self) -> Duration {
        match self {
            Granularity::M1 => Duration::from_secs(60),
            Granularity::M5 => Duration::from_secs(300),
            Granularity::M15 => Duration::from_secs(900),
            Granularity::M30 => Duration::from_secs(1800),
            Granularity::H1 => Duration::from_secs(3600),
            Granularity::H4 => Duration::from_secs(14400),
        }
    }

    /// Kline interval parameter for Binance-compatible REST APIs.
    pub fn binance_interval(&self) -> &'static str {
        self.as_str()
    }

    pub fn from_str_loose(s: &str) -> Option<Granularity> {
        match s.trim() {
            "1m" => Some(Granularity::M1),
            "5m" => Some(Granularity::M5),
            "15m" => Some(Granularity::M15),
            "30m" => Some(Granularity::M30),
            "1h" => Some(Granularity::H1),
            "4h" => Some(Granularity::H4),
            _ => None,
        }
    }

    pub fn as_seconds(&self) -> u64 {
        self.as_duration().as_secs()
    }

    /// Number of bars covering `hours` of wall-clock time.
    pub fn bars_per_hours(&self, hours: u64) -> usize {
        ((hours * 3600) / self.as_seconds()).max(1) as usize
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
