use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn total_range(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Traded value of the bar in quote currency (close x base volume).
    pub fn quote_volume(&self) -> f64 {
        self.close * self.volume
    }

    /// True range against the previous close; without one it is the bar's own range.
    pub fn true_range(&self, prev_close: Option<f64>) -> f64 {
        match prev_close {
            Some(pc) => self
                .total_range()
                .max((self.high - pc).abs())
                .max((self.low - pc).abs()),
            None => self.total_range(),
        }
    }
}

/// Wraps Vec<Candle> (oldest first) with the column helpers the indicators need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(candles: Vec<Candle>) -> Self {
        Self { candles }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.candles.get(index)
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn first(&self) -> Option<&Candle> {
        self.candles.first()
    }

    pub fn tail(&self, n: usize) -> CandleSeries {
        let start = self.candles.len().saturating_sub(n);
        CandleSeries::new(self.candles[start..].to_vec())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candle> {
        self.candles.iter()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn highs_max(&self) -> f64 {
        self.candles
            .iter()
            .map(|c| c.high)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn lows_min(&self) -> f64 {
        self.candles
            .iter()
            .map(|c| c.low)
            .fold(f64::INFINITY, f64::min)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn quote_volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.quote_volume()).collect()
    }
}

impl std::ops::Index<usize> for CandleSeries {
    type Output = Candle;
    fn index(&self, index: usize) -> &Self::Output {
        &self.candles[index]
    }
}

impl IntoIterator for CandleSeries {
    type Item = Candle;
    type IntoIter = std::vec::IntoIter<Candle>;
    fn into_iter(self) -> Self::IntoIter {
        self.candles.into_iter()
    }
}

impl<'a> IntoIterator for &'a CandleSeries {
    type Item = &'a Candle;
    type IntoIter = std::slice::Iter<'a, Candle>;
    fn into_iter(self) -> Self::IntoIter {
        self.candles.iter()
    }
}

/// Bounded sliding buffer of bars for one instrument.
///
/// Bars newer than the last held bar are appended, a bar with the same open
/// time replaces the held one (the exchange keeps updating the open bar), and
/// anything older is ignored. Past `capacity` the oldest bars are evicted.
#[derive(Debug, Clone)]
pub struct CandleWindow {
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl CandleWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            candles: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn ingest<'a, I>(&mut self, bars: I)
    where
        I: IntoIterator<Item = &'a Candle>,
    {
        for bar in bars {
            match self.candles.back_mut() {
                Some(last) if bar.open_time == last.open_time => *last = bar.clone(),
                Some(last) if bar.open_time < last.open_time => continue,
                _ => self.candles.push_back(bar.clone()),
            }
            while self.candles.len() > self.capacity {
                self.candles.pop_front();
            }
        }
    }

    pub fn to_series(&self) -> CandleSeries {
        CandleSeries::new(self.candles.iter().cloned().collect())
    }
}
