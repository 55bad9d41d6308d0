pub mod binance;
pub mod historical;

pub use binance::BinanceClient;
pub use historical::HistoricalExchange;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CandleSeries, Granularity};

/// Candle and price source for the polling loop and replays.
#[async_trait]
pub trait MarketData: Send + Sync {
    async fn fetch_candles(
        &mut self,
        instrument: &str,
        granularity: Granularity,
        limit: usize,
    ) -> Result<CandleSeries>;
    async fn get_current_price(&mut self, instrument: &str) -> Result<f64>;
}
