//! Indicator engine: EMA, RSI, MACD and ATR over a candle window.
//!
//! Every function here is total. A window that is too short yields `None`
//! ("no value") instead of an error, and no input makes them divide by zero.

use serde::{Deserialize, Serialize};

use crate::config::IndicatorConfig;
use crate::error::EngineError;
use crate::models::{Candle, CandleSeries};

/// Per-tick indicator values derived from the current window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub ema_fast: f64,
    pub ema_fast_prev: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub macd_histogram: f64,
    /// `None` when the window is flat (zero true range) or empty.
    pub atr: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn ema_fast_rising(&self) -> bool {
        self.ema_fast > self.ema_fast_prev
    }

    pub fn ema_fast_falling(&self) -> bool {
        self.ema_fast < self.ema_fast_prev
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// EMA values from the seed onwards.
///
/// Element `i` corresponds to `values[period - 1 + i]`. The seed is the simple
/// mean of the first `period` values, then `ema = x*k + ema_prev*(1-k)` with
/// `k = 2/(period+1)`. Empty when `values` is shorter than `period`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);
    let mut prev = seed;
    for &v in &values[period..] {
        prev = v * k + prev * (1.0 - k);
        out.push(prev);
    }
    out
}

pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    ema_series(values, period).last().copied()
}

/// Simple-average RSI over the last `period` close-to-close deltas.
///
/// Zero average loss reads as 100, including a perfectly flat window.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let tail = &closes[closes.len() - (period + 1)..];
    let (gains, losses) = tail
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;
    if avg_loss == 0.0 {
        return Some(100.0);
    }
    Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
}

/// MACD line (fast EMA - slow EMA), its signal EMA and the histogram between them.
///
/// Needs at least `slow + signal` closes.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if fast == 0 || slow == 0 || signal == 0 || closes.len() < slow + signal {
        return None;
    }

    let fast_series = ema_series(closes, fast);
    let slow_series = ema_series(closes, slow);

    // Align both on the closes where the slow EMA exists.
    let offset = slow.saturating_sub(fast);
    let line: Vec<f64> = slow_series
        .iter()
        .enumerate()
        .filter_map(|(i, s)| fast_series.get(i + offset).map(|f| f - s))
        .collect();

    let signal_value = ema(&line, signal)?;
    let line_value = *line.last()?;

    Some(Macd {
        line: line_value,
        signal: signal_value,
        histogram: line_value - signal_value,
    })
}

/// Average true range as an EMA of true ranges.
///
/// With fewer than `period + 1` bars it falls back to the most recent true
/// range. Only an empty window has no value.
pub fn atr(candles: &[Candle], period: usize) -> Option<f64> {
    let last = candles.last()?;
    if period == 0 || candles.len() < period + 1 {
        let prev_close = candles.len().checked_sub(2).map(|i| candles[i].close);
        return Some(last.true_range(prev_close));
    }

    let trs: Vec<f64> = candles
        .windows(2)
        .map(|w| w[1].true_range(Some(w[0].close)))
        .collect();
    ema(&trs, period)
}

/// Mean of the last `window` values (fewer if that is all there is).
pub fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    if values.is_empty() || window == 0 {
        return None;
    }
    let start = values.len().saturating_sub(window);
    let tail = &values[start..];
    Some(tail.iter().sum::<f64>() / tail.len() as f64)
}

pub struct IndicatorEngine {
    cfg: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(cfg: &IndicatorConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    pub fn required_bars(&self) -> usize {
        self.cfg.required_bars()
    }

    /// Recomputes every indicator from scratch for the given window.
    pub fn snapshot(&self, series: &CandleSeries) -> Result<IndicatorSnapshot, EngineError> {
        let need = self.required_bars();
        let not_ready = || EngineError::IndicatorNotReady {
            have: series.len(),
            need,
        };
        if series.len() < need {
            return Err(not_ready());
        }

        let closes = series.closes();
        let fast = ema_series(&closes, self.cfg.ema_fast);
        let (ema_fast, ema_fast_prev) = match fast.as_slice() {
            [.., prev, last] => (*last, *prev),
            _ => return Err(not_ready()),
        };
        let ema_slow = ema(&closes, self.cfg.ema_slow).ok_or_else(not_ready)?;
        let rsi = rsi(&closes, self.cfg.rsi_period).ok_or_else(not_ready)?;
        let macd = macd(
            &closes,
            self.cfg.macd_fast,
            self.cfg.macd_slow,
            self.cfg.macd_signal,
        )
        .ok_or_else(not_ready)?;
        let atr = atr(series.as_slice(), self.cfg.atr_period).filter(|a| *a > 0.0);

        Ok(IndicatorSnapshot {
            ema_fast,
            ema_fast_prev,
            ema_slow,
            rsi,
            macd_histogram: macd.histogram,
            atr,
        })
    }
}
