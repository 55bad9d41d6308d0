use anyhow::Result;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::{Engine, EngineState};
use crate::exchange::{HistoricalExchange, MarketData};

use super::report::ReplayReport;

/// Steps through historical data bar by bar, running the same engine the
/// live loop uses at each step.
pub struct ReplayRunner {
    pub exchange: HistoricalExchange,
    engine: Engine,
    state: EngineState,
}

impl ReplayRunner {
    pub fn new(exchange: HistoricalExchange, config: &Config) -> Self {
        let engine = Engine::new(config);
        let state = engine.new_state();
        Self {
            exchange,
            engine,
            state,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Replays every bar open time in the loaded data. The price seen on each
    /// step is the close of the newest visible bar.
    pub async fn run(&mut self) -> Result<ReplayReport> {
        let cfg = self.engine.config().clone();
        let timeline = self.exchange.timeline();
        let total_steps = timeline.len();
        let log_interval = total_steps / 20;
        let mut report = ReplayReport::new();

        info!("=== REPLAY START ===");
        info!(
            "{} steps over {} on {}",
            total_steps,
            cfg.instruments.join(", "),
            cfg.granularity
        );
        if let (Some(first), Some(last)) =
            (self.exchange.earliest_time(), self.exchange.latest_time())
        {
            info!(
                "Data: {} -> {}",
                first.format("%Y-%m-%d %H:%M"),
                last.format("%Y-%m-%d %H:%M")
            );
        }
        let loaded = self.exchange.instruments();
        for missing in cfg.instruments.iter().filter(|i| !loaded.contains(i)) {
            warn!("No history loaded for {}, it will be skipped on every step", missing);
        }

        for (step, now) in timeline.into_iter().enumerate() {
            self.exchange.set_time(now);
            report.record_step(now);

            if log_interval > 0 && (step + 1) % log_interval == 0 {
                info!(
                    "  Progress: {:.0}% | {} | Strong alerts: {} | Total R: {:+.2}",
                    (step + 1) as f64 / total_steps as f64 * 100.0,
                    now.format("%Y-%m-%d %H:%M"),
                    report.strong_alerts,
                    report.total_r
                );
            }

            for instrument in &cfg.instruments {
                let candles = self
                    .exchange
                    .fetch_candles(instrument, cfg.granularity, cfg.candle_limit)
                    .await?;
                let price = self.exchange.get_current_price(instrument).await.ok();

                match self
                    .engine
                    .process(&mut self.state, instrument, &candles, price, now)
                {
                    Ok(outcome) => report.record(instrument, now, &outcome),
                    Err(e) => {
                        debug!("{} skipped at {}: {}", instrument, now, e);
                        report.record_skip();
                    }
                }
            }
        }

        info!("=== REPLAY DONE ===");
        Ok(report)
    }
}
