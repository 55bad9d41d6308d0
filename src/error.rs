use thiserror::Error;

/// Reasons the pipeline skips an instrument for the current tick.
///
/// Neither is fatal: the driving loop logs them at debug level and moves on
/// to the next instrument.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),
    #[error("indicators not ready: have {have} bars, need {need}")]
    IndicatorNotReady { have: usize, need: usize },
}

/// Startup configuration problems. These abort the process before the loop runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    pub fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
