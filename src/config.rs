use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::models::Granularity;

/// Named parameter sets. Strategy variants are configuration, not code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Breakout confirmed by trend, MACD, candle colour and volume.
    Breakout,
    /// Breakout plus RSI confirmation and a small favourable breakeven offset.
    Momentum,
}

impl Preset {
    pub fn from_str_loose(s: &str) -> Option<Preset> {
        match s.trim().to_lowercase().as_str() {
            "breakout" => Some(Preset::Breakout),
            "momentum" => Some(Preset::Momentum),
            _ => None,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preset::Breakout => write!(f, "breakout"),
            Preset::Momentum => write!(f, "momentum"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
}

impl IndicatorConfig {
    /// Bars needed before a snapshot can be produced.
    ///
    /// ATR is not part of this: it degrades to the latest true range instead.
    pub fn required_bars(&self) -> usize {
        self.ema_slow
            .max(self.ema_fast + 1)
            .max(self.macd_slow + self.macd_signal)
            .max(self.rsi_period + 1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Swing window in bars (96 bars of 15m ≈ 24h).
    pub lookback_bars: usize,
    /// Width of the EMA ± k·ATR band.
    pub atr_band_multiple: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    pub volume_multiple: f64,
    pub volume_avg_window: usize,
    pub rsi_confirmation: bool,
    pub rsi_lower: f64,
    pub rsi_upper: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub sl_atr_multiple: f64,
    pub tp1_atr_multiple: f64,
    pub tp2_atr_multiple: f64,
    /// Stop distance as a fraction of entry when ATR is unavailable (0.003 = 0.3%).
    pub fallback_stop_pct: f64,
    pub min_reward_risk: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionConfig {
    pub breakeven_offset_atr: f64,
    /// 0 disables the trailing stop.
    pub trail_atr_multiple: f64,
    pub entry_cooldown_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CooldownConfig {
    pub weak_secs: i64,
    pub strong_secs: i64,
    pub digest_min_gap_secs: i64,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub enabled: bool,
    pub interval_minutes: u32,
    pub timezone: Tz,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Market data
    pub instruments: Vec<String>,
    pub granularity: Granularity,
    pub market_base_url: String,
    pub candle_limit: usize,
    pub window_capacity: usize,
    pub use_ticker_price: bool,

    // Loop
    pub poll_interval_secs: u64,
    pub error_backoff_secs: u64,

    // Strategy
    pub preset: Preset,
    pub indicators: IndicatorConfig,
    pub levels: LevelConfig,
    pub signal: SignalConfig,
    pub risk: RiskConfig,
    pub position: PositionConfig,
    pub cooldown: CooldownConfig,
    pub report: ReportConfig,

    // Alert sink
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub dry_run: bool,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Defaults for a preset, without reading the environment.
    pub fn preset(preset: Preset) -> Self {
        let mut cfg = Config {
            instruments: vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()],
            granularity: Granularity::M15,
            market_base_url: "https://api.binance.com".to_string(),
            candle_limit: 120,
            window_capacity: 200,
            use_ticker_price: true,
            poll_interval_secs: 5,
            error_backoff_secs: 10,
            preset,
            indicators: IndicatorConfig {
                ema_fast: 20,
                ema_slow: 60,
                rsi_period: 14,
                macd_fast: 12,
                macd_slow: 26,
                macd_signal: 9,
                atr_period: 20,
            },
            levels: LevelConfig {
                lookback_bars: 96,
                atr_band_multiple: 1.0,
            },
            signal: SignalConfig {
                volume_multiple: 1.2,
                volume_avg_window: 48,
                rsi_confirmation: false,
                rsi_lower: 30.0,
                rsi_upper: 70.0,
            },
            risk: RiskConfig {
                sl_atr_multiple: 1.0,
                tp1_atr_multiple: 1.0,
                tp2_atr_multiple: 2.0,
                fallback_stop_pct: 0.003,
                min_reward_risk: 1.5,
            },
            position: PositionConfig {
                breakeven_offset_atr: 0.0,
                trail_atr_multiple: 1.0,
                entry_cooldown_secs: 15 * 60,
            },
            cooldown: CooldownConfig {
                weak_secs: 10 * 60,
                strong_secs: 15 * 60,
                digest_min_gap_secs: 12 * 60,
            },
            report: ReportConfig {
                enabled: true,
                interval_minutes: 30,
                timezone: chrono_tz::Europe::Rome,
            },
            telegram_bot_token: String::new(),
            telegram_chat_id: String::new(),
            dry_run: false,
            log_level: "info".to_string(),
        };

        if preset == Preset::Momentum {
            cfg.signal.rsi_confirmation = true;
            cfg.position.breakeven_offset_atr = 0.2;
        }

        cfg
    }

    /// Switches the bar size and rescales the level lookback to one day of bars.
    /// With a short fetched history the detector shrinks the window to what is held.
    pub fn set_granularity(&mut self, granularity: Granularity) {
        self.granularity = granularity;
        self.levels.lookback_bars = granularity.bars_per_hours(24);
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let preset_name = env_str("STRATEGY_PRESET", "breakout");
        let preset = Preset::from_str_loose(&preset_name)
            .ok_or_else(|| ConfigError::invalid("STRATEGY_PRESET", preset_name.clone()))?;
        let mut cfg = Config::preset(preset);

        let instruments = env_str("INSTRUMENTS", &cfg.instruments.join(","));
        cfg.instruments = instruments
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();

        let granularity = env_str("GRANULARITY", cfg.granularity.as_str());
        let granularity = Granularity::from_str_loose(&granularity)
            .ok_or_else(|| ConfigError::invalid("GRANULARITY", granularity.clone()))?;
        cfg.set_granularity(granularity);

        cfg.market_base_url = env_str("MARKET_BASE_URL", &cfg.market_base_url);
        cfg.candle_limit = env_parse("CANDLE_LIMIT", cfg.candle_limit)?;
        cfg.window_capacity = env_parse("WINDOW_CAPACITY", cfg.window_capacity)?;
        cfg.use_ticker_price = env_bool("USE_TICKER_PRICE", cfg.use_ticker_price)?;
        cfg.poll_interval_secs = env_parse("POLL_INTERVAL_SECS", cfg.poll_interval_secs)?;
        cfg.error_backoff_secs = env_parse("ERROR_BACKOFF_SECS", cfg.error_backoff_secs)?;

        let ind = &mut cfg.indicators;
        ind.ema_fast = env_parse("EMA_FAST", ind.ema_fast)?;
        ind.ema_slow = env_parse("EMA_SLOW", ind.ema_slow)?;
        ind.rsi_period = env_parse("RSI_PERIOD", ind.rsi_period)?;
        ind.macd_fast = env_parse("MACD_FAST", ind.macd_fast)?;
        ind.macd_slow = env_parse("MACD_SLOW", ind.macd_slow)?;
        ind.macd_signal = env_parse("MACD_SIGNAL", ind.macd_signal)?;
        ind.atr_period = env_parse("ATR_PERIOD", ind.atr_period)?;

        cfg.levels.lookback_bars = env_parse("LEVEL_LOOKBACK_BARS", cfg.levels.lookback_bars)?;
        cfg.levels.atr_band_multiple =
            env_parse("LEVEL_ATR_MULTIPLE", cfg.levels.atr_band_multiple)?;

        let sig = &mut cfg.signal;
        sig.volume_multiple = env_parse("VOLUME_MULTIPLE", sig.volume_multiple)?;
        sig.volume_avg_window = env_parse("VOLUME_AVG_WINDOW", sig.volume_avg_window)?;
        sig.rsi_confirmation = env_bool("RSI_CONFIRMATION", sig.rsi_confirmation)?;
        sig.rsi_lower = env_parse("RSI_LOWER", sig.rsi_lower)?;
        sig.rsi_upper = env_parse("RSI_UPPER", sig.rsi_upper)?;

        let risk = &mut cfg.risk;
        risk.sl_atr_multiple = env_parse("SL_ATR_MULTIPLE", risk.sl_atr_multiple)?;
        risk.tp1_atr_multiple = env_parse("TP1_ATR_MULTIPLE", risk.tp1_atr_multiple)?;
        risk.tp2_atr_multiple = env_parse("TP2_ATR_MULTIPLE", risk.tp2_atr_multiple)?;
        risk.fallback_stop_pct = env_parse("FALLBACK_STOP_PCT", risk.fallback_stop_pct)?;
        risk.min_reward_risk = env_parse("MIN_REWARD_RISK", risk.min_reward_risk)?;

        let pos = &mut cfg.position;
        pos.breakeven_offset_atr = env_parse("BREAKEVEN_OFFSET_ATR", pos.breakeven_offset_atr)?;
        pos.trail_atr_multiple = env_parse("TRAIL_ATR_MULTIPLE", pos.trail_atr_multiple)?;
        pos.entry_cooldown_secs = env_parse("ENTRY_COOLDOWN_SECS", pos.entry_cooldown_secs)?;

        let cd = &mut cfg.cooldown;
        cd.weak_secs = env_parse("WEAK_COOLDOWN_SECS", cd.weak_secs)?;
        cd.strong_secs = env_parse("STRONG_COOLDOWN_SECS", cd.strong_secs)?;
        cd.digest_min_gap_secs = env_parse("REPORT_MIN_GAP_SECS", cd.digest_min_gap_secs)?;

        cfg.report.enabled = env_bool("REPORT_ENABLED", cfg.report.enabled)?;
        cfg.report.interval_minutes =
            env_parse("REPORT_INTERVAL_MINUTES", cfg.report.interval_minutes)?;
        let tz_name = env_str("REPORT_TIMEZONE", cfg.report.timezone.name());
        cfg.report.timezone = tz_name
            .parse::<Tz>()
            .map_err(|e| ConfigError::invalid("REPORT_TIMEZONE", e.to_string()))?;

        cfg.telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN", "");
        cfg.telegram_chat_id = env_str("TELEGRAM_CHAT_ID", "");
        cfg.dry_run = env_bool("DRY_RUN", cfg.dry_run)?;
        cfg.log_level = env_str("LOG_LEVEL", &cfg.log_level);

        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks cross-field constraints and required credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::Missing("INSTRUMENTS"));
        }
        if !self.dry_run {
            if self.telegram_bot_token.is_empty() {
                return Err(ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
            }
            if self.telegram_chat_id.is_empty() {
                return Err(ConfigError::Missing("TELEGRAM_CHAT_ID"));
            }
        }

        let ind = &self.indicators;
        for (key, period) in [
            ("EMA_FAST", ind.ema_fast),
            ("EMA_SLOW", ind.ema_slow),
            ("RSI_PERIOD", ind.rsi_period),
            ("MACD_FAST", ind.macd_fast),
            ("MACD_SLOW", ind.macd_slow),
            ("MACD_SIGNAL", ind.macd_signal),
            ("ATR_PERIOD", ind.atr_period),
            ("LEVEL_LOOKBACK_BARS", self.levels.lookback_bars),
            ("VOLUME_AVG_WINDOW", self.signal.volume_avg_window),
        ] {
            if period == 0 {
                return Err(ConfigError::invalid(key, "period must be at least 1"));
            }
        }
        if ind.ema_fast >= ind.ema_slow {
            return Err(ConfigError::invalid("EMA_FAST", "must be shorter than EMA_SLOW"));
        }
        if ind.macd_fast >= ind.macd_slow {
            return Err(ConfigError::invalid("MACD_FAST", "must be shorter than MACD_SLOW"));
        }
        if self.window_capacity < ind.required_bars() {
            return Err(ConfigError::invalid(
                "WINDOW_CAPACITY",
                format!("must hold at least {} bars", ind.required_bars()),
            ));
        }

        let risk = &self.risk;
        for (key, value) in [
            ("SL_ATR_MULTIPLE", risk.sl_atr_multiple),
            ("TP1_ATR_MULTIPLE", risk.tp1_atr_multiple),
            ("TP2_ATR_MULTIPLE", risk.tp2_atr_multiple),
            ("FALLBACK_STOP_PCT", risk.fallback_stop_pct),
        ] {
            if !(value > 0.0) {
                return Err(ConfigError::invalid(key, "must be positive"));
            }
        }
        if risk.tp2_atr_multiple < risk.tp1_atr_multiple {
            return Err(ConfigError::invalid(
                "TP2_ATR_MULTIPLE",
                "must not be below TP1_ATR_MULTIPLE",
            ));
        }
        if self.signal.rsi_lower >= self.signal.rsi_upper {
            return Err(ConfigError::invalid("RSI_LOWER", "must be below RSI_UPPER"));
        }
        if self.report.interval_minutes == 0 {
            return Err(ConfigError::invalid(
                "REPORT_INTERVAL_MINUTES",
                "must be at least 1",
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::invalid("POLL_INTERVAL_SECS", "must be at least 1"));
        }

        Ok(())
    }
}

fn env_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(key, format!("{raw:?}: {e}"))),
        _ => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "" => Ok(default),
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::invalid(key, format!("{other:?} is not a boolean"))),
        },
        Err(_) => Ok(default),
    }
}
