use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

use crate::exchange::MarketData;
use crate::models::{Candle, CandleSeries, Granularity};

/// A MarketData implementation that replays pre-loaded historical bars.
/// A cursor (`now`) controls which candles are visible: only candles
/// opening at or before `now` are returned, simulating a forward walk.
pub struct HistoricalExchange {
    data: HashMap<String, Vec<Candle>>,
    now: DateTime<Utc>,
}

impl HistoricalExchange {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            now: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// Load candles for one instrument. They are sorted oldest-first here.
    pub fn load(&mut self, instrument: &str, mut candles: Vec<Candle>) {
        candles.sort_by_key(|c| c.open_time);
        candles.dedup_by_key(|c| c.open_time);
        self.data.insert(instrument.to_string(), candles);
    }

    pub fn instruments(&self) -> Vec<String> {
        let mut names: Vec<String> = self.data.keys().cloned().collect();
        names.sort();
        names
    }

    /// Advance the simulation clock.
    pub fn set_time(&mut self, t: DateTime<Utc>) {
        self.now = t;
    }

    pub fn earliest_time(&self) -> Option<DateTime<Utc>> {
        self.data
            .values()
            .filter_map(|v| v.first().map(|c| c.open_time))
            .min()
    }

    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        self.data
            .values()
            .filter_map(|v| v.last().map(|c| c.open_time))
            .max()
    }

    /// Every distinct bar open time across all instruments, oldest first.
    pub fn timeline(&self) -> Vec<DateTime<Utc>> {
        let times: BTreeSet<DateTime<Utc>> = self
            .data
            .values()
            .flat_map(|v| v.iter().map(|c| c.open_time))
            .collect();
        times.into_iter().collect()
    }

    /// Return candles up to `self.now`, capped at `limit`.
    fn visible_candles(&self, instrument: &str, limit: usize) -> CandleSeries {
        let Some(all) = self.data.get(instrument) else {
            return CandleSeries::default();
        };

        let end = match all.partition_point(|c| c.open_time <= self.now) {
            0 => return CandleSeries::default(),
            n => n,
        };

        let start = end.saturating_sub(limit);
        CandleSeries::new(all[start..end].to_vec())
    }
}

impl Default for HistoricalExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketData for HistoricalExchange {
    async fn fetch_candles(
        &mut self,
        instrument: &str,
        _granularity: Granularity,
        limit: usize,
    ) -> Result<CandleSeries> {
        Ok(self.visible_candles(instrument, limit))
    }

    async fn get_current_price(&mut self, instrument: &str) -> Result<f64> {
        self.visible_candles(instrument, 1)
            .last()
            .map(|c| c.close)
            .with_context(|| format!("No {} price at {}", instrument, self.now))
    }
}
