mod bot;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use breakout_alert_bot::config::Config;
use breakout_alert_bot::exchange::BinanceClient;
use breakout_alert_bot::notify::{AlertSink, LogSink, TelegramSink};

use crate::bot::AlertBot;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env().context("Invalid configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let market = Box::new(BinanceClient::new(&cfg)?);
    let sink: Box<dyn AlertSink> = if cfg.dry_run {
        Box::new(LogSink)
    } else {
        Box::new(TelegramSink::new(&cfg.telegram_bot_token, &cfg.telegram_chat_id)?)
    };

    let mut bot = AlertBot::new(cfg, market, sink);
    bot.run().await?;

    Ok(())
}
