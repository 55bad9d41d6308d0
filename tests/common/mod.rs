#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use breakout_alert_bot::config::{Config, Preset};
use breakout_alert_bot::exchange::MarketData;
use breakout_alert_bot::models::{Candle, CandleSeries, Granularity};
use breakout_alert_bot::notify::{AlertSink, Notification};

pub fn base_time() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Create candles from (open, high, low, close) tuples with auto-incrementing 1m timestamps.
pub fn make_candles(data: &[(f64, f64, f64, f64)]) -> CandleSeries {
    let base = base_time();

    let candles: Vec<Candle> = data
        .iter()
        .enumerate()
        .map(|(i, &(o, h, l, c))| Candle {
            open_time: base + Duration::minutes(i as i64),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 100.0,
        })
        .collect();

    CandleSeries::new(candles)
}

/// Accelerating move (`close = start ± i^1.5`) with a constant quote volume of 1000
/// per bar; the last bar trades `last_volume_multiple` times that.
pub fn make_accelerating(n: usize, start: f64, sign: f64, last_volume_multiple: f64) -> CandleSeries {
    let base = base_time();
    let mut prev_close = start - sign;

    let candles: Vec<Candle> = (0..n)
        .map(|i| {
            let close = start + sign * (i as f64).powf(1.5);
            let open = prev_close;
            prev_close = close;
            let multiple = if i + 1 == n { last_volume_multiple } else { 1.0 };
            Candle {
                open_time: base + Duration::minutes(i as i64),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: multiple * 1000.0 / close,
            }
        })
        .collect();

    CandleSeries::new(candles)
}

pub fn make_breakout_series(n: usize, start: f64, last_volume_multiple: f64) -> CandleSeries {
    make_accelerating(n, start, 1.0, last_volume_multiple)
}

pub fn make_breakdown_series(n: usize, start: f64, last_volume_multiple: f64) -> CandleSeries {
    make_accelerating(n, start, -1.0, last_volume_multiple)
}

/// Breakout preset in dry-run mode, no credentials needed.
pub fn test_config(instruments: &[&str]) -> Config {
    let mut cfg = Config::preset(Preset::Breakout);
    cfg.instruments = instruments.iter().map(|s| s.to_string()).collect();
    cfg.dry_run = true;
    cfg
}

/// Canned market data; instruments in `failing` return errors.
#[derive(Default)]
pub struct MockMarket {
    pub candles: HashMap<String, CandleSeries>,
    pub prices: HashMap<String, f64>,
    pub failing: Vec<String>,
}

impl MockMarket {
    pub fn with(mut self, instrument: &str, series: CandleSeries) -> Self {
        self.candles.insert(instrument.to_string(), series);
        self
    }

    pub fn set_price(&mut self, instrument: &str, price: f64) {
        self.prices.insert(instrument.to_string(), price);
    }
}

#[async_trait]
impl MarketData for MockMarket {
    async fn fetch_candles(
        &mut self,
        instrument: &str,
        _granularity: Granularity,
        _limit: usize,
    ) -> Result<CandleSeries> {
        if self.failing.iter().any(|f| f == instrument) {
            anyhow::bail!("connection reset fetching {}", instrument);
        }
        Ok(self.candles.get(instrument).cloned().unwrap_or_default())
    }

    async fn get_current_price(&mut self, instrument: &str) -> Result<f64> {
        if let Some(p) = self.prices.get(instrument) {
            return Ok(*p);
        }
        self.candles
            .get(instrument)
            .and_then(|s| s.last())
            .map(|c| c.close)
            .ok_or_else(|| anyhow::anyhow!("no price for {}", instrument))
    }
}

/// Sink that keeps everything it is handed.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Sink that always fails.
pub struct BrokenSink;

#[async_trait]
impl AlertSink for BrokenSink {
    async fn deliver(&self, _notification: &Notification) -> Result<()> {
        anyhow::bail!("telegram unreachable")
    }
}
