use chrono::{DateTime, Duration, Utc};

use crate::config::{Config, Preset};
use crate::core::indicators::IndicatorSnapshot;
use crate::models::{Candle, CandleSeries};

fn base_time() -> DateTime<Utc> {
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

/// Candles from closes only: each bar opens at the previous close and spans half a unit beyond its body.
pub fn make_closes(closes: &[f64]) -> CandleSeries {
    let mut prev = closes.first().copied().unwrap_or(0.0);
    let data: Vec<(f64, f64, f64, f64)> = closes
        .iter()
        .map(|&c| {
            let o = prev;
            prev = c;
            (o, o.max(c) + 0.5, o.min(c) - 0.5, c)
        })
        .collect();
    make_candles(&data)
}

/// Create n rising (bullish) candles starting from `start` price.
pub fn make_bullish_trend(n: usize, start: f64) -> CandleSeries {
    let base = base_time();

    let candles: Vec<Candle> = (0..n)
        .map(|i| {
            let open = start + i as f64 * 10.0;
            let close = open + 8.0;
            Candle {
                open_time: base + Duration::minutes(i as i64),
                open,
                high: close + 2.0,
                low: open - 1.0,
                close,
                volume: 100.0,
            }
        })
        .collect();

    CandleSeries::new(candles)
}

/// Create n falling (bearish) candles starting from `start` price.
pub fn make_bearish_trend(n: usize, start: f64) -> CandleSeries {
    let base = base_time();

    let candles: Vec<Candle> = (0..n)
        .map(|i| {
            let open = start - i as f64 * 10.0;
            let close = open - 8.0;
            Candle {
                open_time: base + Duration::minutes(i as i64),
                open,
                high: open + 1.0,
                low: close - 2.0,
                close,
                volume: 100.0,
            }
        })
        .collect();

    CandleSeries::new(candles)
}

/// n identical bars with zero range and zero volume.
pub fn make_flat(n: usize, price: f64) -> CandleSeries {
    let base = base_time();

    let candles: Vec<Candle> = (0..n)
        .map(|i| Candle {
            open_time: base + Duration::minutes(i as i64),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        })
        .collect();

    CandleSeries::new(candles)
}

/// Accelerating rally: `close = start + i^1.5`, each bar opening at the previous close.
/// Quote volume is 1000 on every bar except the last, which trades
/// `last_volume_multiple` times that.
pub fn make_breakout_series(n: usize, start: f64, last_volume_multiple: f64) -> CandleSeries {
    make_accelerating(n, start, 1.0, last_volume_multiple)
}

/// Mirror of [`make_breakout_series`]: `close = start - i^1.5`.
pub fn make_breakdown_series(n: usize, start: f64, last_volume_multiple: f64) -> CandleSeries {
    make_accelerating(n, start, -1.0, last_volume_multiple)
}

fn make_accelerating(n: usize, start: f64, sign: f64, last_volume_multiple: f64) -> CandleSeries {
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

/// Hand-built snapshot; RSI is neutral (50).
pub fn snapshot_with(
    ema_fast: f64,
    ema_fast_prev: f64,
    ema_slow: f64,
    macd_histogram: f64,
    atr: Option<f64>,
) -> IndicatorSnapshot {
    IndicatorSnapshot {
        ema_fast,
        ema_fast_prev,
        ema_slow,
        rsi: 50.0,
        macd_histogram,
        atr,
    }
}

/// Breakout preset in dry-run mode with a single instrument, no credentials needed.
pub fn default_test_config() -> Config {
    let mut cfg = Config::preset(Preset::Breakout);
    cfg.instruments = vec!["BTCUSDT".to_string()];
    cfg.dry_run = true;
    cfg.log_level = "error".to_string();
    cfg
}
