use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::exchange::MarketData;
use crate::models::{Candle, CandleSeries, Granularity};

const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(12);
/// Largest page the klines endpoint serves.
pub const MAX_KLINES_PER_REQUEST: usize = 1000;

#[derive(Debug, Deserialize)]
struct TickerResponse {
    price: String,
}

/// Public REST market data from Binance or a Binance-compatible host (e.g. MEXC).
pub struct BinanceClient {
    client: Client,
    base_url: String,
    last_request: Option<Instant>,
}

impl BinanceClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        Self::with_base_url(&cfg.market_base_url)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("breakout-alert-bot")
            .build()
            .context("Failed to build market data HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            last_request: None,
        })
    }

    async fn rate_limit(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < MIN_REQUEST_INTERVAL {
                tokio::time::sleep(MIN_REQUEST_INTERVAL - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    async fn get_klines(&mut self, query: &[(&str, String)]) -> Result<Vec<Candle>> {
        self.rate_limit().await;

        let resp = self
            .client
            .get(format!("{}/api/v3/klines", self.base_url))
            .query(query)
            .send()
            .await
            .context("Failed to fetch klines")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Klines API error {}: {}", status, body);
        }

        let rows: Vec<Vec<Value>> = resp.json().await.context("Failed to parse klines")?;
        let mut candles: Vec<Candle> = rows.iter().filter_map(|row| parse_kline(row)).collect();
        candles.sort_by_key(|c| c.open_time);
        Ok(candles)
    }

    /// Latest `limit` bars. Uncached: the open bar changes between polls.
    pub async fn fetch_candles(
        &mut self,
        instrument: &str,
        granularity: Granularity,
        limit: usize,
    ) -> Result<CandleSeries> {
        let candles = self
            .get_klines(&[
                ("symbol", instrument.to_string()),
                ("interval", granularity.binance_interval().to_string()),
                ("limit", limit.min(MAX_KLINES_PER_REQUEST).to_string()),
            ])
            .await?;

        Ok(CandleSeries::new(candles))
    }

    /// One page of bars opening in `[start, end)`.
    pub async fn fetch_candles_range(
        &mut self,
        instrument: &str,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let end_ms = end.timestamp_millis() - 1;
        self.get_klines(&[
            ("symbol", instrument.to_string()),
            ("interval", granularity.binance_interval().to_string()),
            ("startTime", start.timestamp_millis().to_string()),
            ("endTime", end_ms.to_string()),
            ("limit", MAX_KLINES_PER_REQUEST.to_string()),
        ])
        .await
    }

    pub async fn get_current_price(&mut self, instrument: &str) -> Result<f64> {
        self.rate_limit().await;

        let resp = self
            .client
            .get(format!("{}/api/v3/ticker/price", self.base_url))
            .query(&[("symbol", instrument)])
            .send()
            .await
            .context("Failed to fetch ticker")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Ticker API error {}: {}", status, body);
        }

        let data: TickerResponse = resp.json().await.context("Failed to parse ticker")?;
        data.price
            .parse::<f64>()
            .with_context(|| format!("Invalid ticker price {:?}", data.price))
    }
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// `[open_time_ms, open, high, low, close, volume, ...]`; malformed rows are dropped.
fn parse_kline(row: &[Value]) -> Option<Candle> {
    if row.len() < 6 {
        return None;
    }
    let open_time = DateTime::from_timestamp_millis(row[0].as_i64()?)?;
    Some(Candle {
        open_time,
        open: number(&row[1])?,
        high: number(&row[2])?,
        low: number(&row[3])?,
        close: number(&row[4])?,
        volume: number(&row[5])?,
    })
}

#[async_trait]
impl MarketData for BinanceClient {
    async fn fetch_candles(
        &mut self,
        instrument: &str,
        granularity: Granularity,
        limit: usize,
    ) -> Result<CandleSeries> {
        self.fetch_candles(instrument, granularity, limit).await
    }

    async fn get_current_price(&mut self, instrument: &str) -> Result<f64> {
        self.get_current_price(instrument).await
    }
}
