use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use breakout_alert_bot::config::Config;
use breakout_alert_bot::engine::{Engine, EngineState};
use breakout_alert_bot::exchange::MarketData;
use breakout_alert_bot::notify::messages::next_report_at;
use breakout_alert_bot::notify::{AlertSink, Notification};

pub struct AlertBot {
    config: Config,
    market: Box<dyn MarketData>,
    sink: Box<dyn AlertSink>,
    engine: Engine,
    state: EngineState,
    /// `None` until the first digest, which goes out on the first tick.
    next_report: Option<DateTime<Utc>>,
}

impl AlertBot {
    pub fn new(config: Config, market: Box<dyn MarketData>, sink: Box<dyn AlertSink>) -> Self {
        info!("{}", "=".repeat(60));
        info!("Breakout alert bot starting up");
        info!(
            "Mode: {}",
            if config.dry_run { "DRY RUN (log only)" } else { "TELEGRAM" }
        );
        info!("Instruments: {}", config.instruments.join(", "));
        info!(
            "Granularity: {} | Poll: {}s | Preset: {}",
            config.granularity, config.poll_interval_secs, config.preset
        );
        info!(
            "Cooldowns: weak {}s | strong {}s | entry {}s",
            config.cooldown.weak_secs,
            config.cooldown.strong_secs,
            config.position.entry_cooldown_secs
        );
        if config.report.enabled {
            info!(
                "Report every {} min ({})",
                config.report.interval_minutes,
                config.report.timezone.name()
            );
        }
        info!("{}", "=".repeat(60));

        let engine = Engine::new(&config);
        let state = engine.new_state();

        Self {
            config,
            market,
            sink,
            engine,
            state,
            next_report: None,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        info!("Bot is now running. Press Ctrl+C to stop.");
        let startup = self.engine.startup();
        self.deliver(&startup).await;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    self.shutdown();
                    return Ok(());
                }
                _ = self.tick() => {}
            }
        }
    }

    /// One pass over every instrument, then the digest if due, then sleep.
    async fn tick(&mut self) {
        let now = Utc::now();
        let mut failures = 0usize;
        let instruments = self.config.instruments.clone();

        for instrument in &instruments {
            if !self.process_instrument(instrument, now).await {
                failures += 1;
            }
        }

        if self.config.report.enabled && self.next_report.map_or(true, |at| now >= at) {
            if let Some(digest) = self.engine.digest(&mut self.state, now) {
                self.deliver(&digest).await;
            }
            self.next_report = Some(next_report_at(now, self.config.report.interval_minutes));
        }

        let pause = if failures > 0 {
            self.config.error_backoff_secs
        } else {
            self.config.poll_interval_secs
        };
        tokio::time::sleep(tokio::time::Duration::from_secs(pause)).await;
    }

    /// Returns false when market data could not be fetched.
    async fn process_instrument(&mut self, instrument: &str, now: DateTime<Utc>) -> bool {
        let candles = match self
            .market
            .fetch_candles(instrument, self.config.granularity, self.config.candle_limit)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!("Candle fetch failed for {}: {:#}", instrument, e);
                return false;
            }
        };

        let price = if self.config.use_ticker_price {
            match self.market.get_current_price(instrument).await {
                Ok(p) => Some(p),
                Err(e) => {
                    debug!("Ticker failed for {}, using last close: {:#}", instrument, e);
                    None
                }
            }
        } else {
            None
        };

        match self
            .engine
            .process(&mut self.state, instrument, &candles, price, now)
        {
            Ok(outcome) => {
                for n in &outcome.notifications {
                    self.deliver(n).await;
                }
            }
            Err(e) => debug!("Skipping {} this tick: {}", instrument, e),
        }
        true
    }

    async fn deliver(&self, notification: &Notification) {
        if let Err(e) = self.sink.deliver(notification).await {
            warn!("Delivery of {} failed: {:#}", notification.kind, e);
        }
    }

    fn shutdown(&self) {
        info!("Shutting down...");
        info!("Open positions: {}", self.state.open_positions());
        info!("Bot stopped.");
    }
}
