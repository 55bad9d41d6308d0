use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::exchange::binance::{BinanceClient, MAX_KLINES_PER_REQUEST};
use crate::models::{Candle, Granularity};

const RATE_LIMIT_SLEEP_MS: u64 = 250;

/// Fetch history for every configured instrument and save it to local JSON files.
/// An existing file for the same instrument, granularity and day range is reused.
pub async fn fetch_and_cache(
    cfg: &Config,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    data_dir: &str,
) -> Result<Vec<(String, Vec<Candle>)>> {
    std::fs::create_dir_all(data_dir)?;

    let mut client = BinanceClient::new(cfg)?;
    let mut results = Vec::new();

    for instrument in &cfg.instruments {
        let cache_file = format!(
            "{}/{}_{}_{}_to_{}.json",
            data_dir,
            instrument,
            cfg.granularity,
            start.format("%Y%m%d"),
            end.format("%Y%m%d")
        );

        if Path::new(&cache_file).exists() {
            info!("Loading cached {} data from {}", instrument, cache_file);
            let content = std::fs::read_to_string(&cache_file)?;
            let candles: Vec<Candle> = serde_json::from_str(&content)?;
            info!("  Loaded {} candles", candles.len());
            results.push((instrument.clone(), candles));
            continue;
        }

        info!(
            "Fetching {} {} data ({} to {})...",
            instrument,
            cfg.granularity,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        );

        let candles = fetch_range(&mut client, instrument, cfg.granularity, start, end).await?;
        info!("  Fetched {} candles total", candles.len());

        let json = serde_json::to_string(&candles)?;
        std::fs::write(&cache_file, json)?;
        info!("  Cached to {}", cache_file);

        results.push((instrument.clone(), candles));
    }

    Ok(results)
}

/// Fetch a date range by paginating through the klines endpoint.
async fn fetch_range(
    client: &mut BinanceClient,
    instrument: &str,
    granularity: Granularity,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<Candle>> {
    let mut all_candles: Vec<Candle> = Vec::new();
    let chunk = Duration::seconds((granularity.as_seconds() as usize * MAX_KLINES_PER_REQUEST) as i64);

    let total_chunks = ((end - start).num_seconds() as f64 / chunk.num_seconds() as f64).ceil() as usize;
    let mut chunk_start = start;
    let mut chunk_num = 0;

    while chunk_start < end {
        let chunk_end = (chunk_start + chunk).min(end);
        chunk_num += 1;

        if chunk_num % 10 == 0 || chunk_num == 1 {
            debug!(
                "  {} chunk {}/{} ({} candles so far)",
                instrument,
                chunk_num,
                total_chunks,
                all_candles.len()
            );
        }

        match client
            .fetch_candles_range(instrument, granularity, chunk_start, chunk_end)
            .await
        {
            Ok(candles) => all_candles.extend(candles),
            Err(e) => {
                warn!("  Error fetching {} chunk {}: {}", instrument, chunk_num, e);
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            }
        }

        chunk_start = chunk_end;
        tokio::time::sleep(std::time::Duration::from_millis(RATE_LIMIT_SLEEP_MS)).await;
    }

    all_candles.sort_by_key(|c| c.open_time);
    all_candles.dedup_by_key(|c| c.open_time);

    Ok(all_candles)
}
