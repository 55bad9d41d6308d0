use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tracing_subscriber::{fmt, EnvFilter};

use breakout_alert_bot::backtesting::{data_fetcher, ReplayReport, ReplayRunner};
use breakout_alert_bot::config::Config;
use breakout_alert_bot::exchange::HistoricalExchange;

#[tokio::main]
async fn main() -> Result<()> {
    // Replays never deliver anything, so sink credentials are optional.
    if std::env::var("DRY_RUN").is_err() {
        std::env::set_var("DRY_RUN", "true");
    }
    let cfg = Config::from_env().context("Invalid configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .init();

    let args: Vec<String> = std::env::args().collect();

    let days_back: i64 = args
        .get(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    let end = Utc::now();
    let start = end - Duration::days(days_back);

    println!("{}", "=".repeat(60));
    println!("  BREAKOUT ALERT BOT - REPLAY");
    println!("{}", "=".repeat(60));
    println!("  Instruments: {}", cfg.instruments.join(", "));
    println!("  Granularity: {}", cfg.granularity);
    println!("  Preset:      {}", cfg.preset);
    println!("  Period:      {} days", days_back);
    println!("{}", "=".repeat(60));
    println!();

    let data = data_fetcher::fetch_and_cache(&cfg, start, end, "data").await?;

    let mut exchange = HistoricalExchange::new();
    for (instrument, candles) in data {
        println!("  {}: {} candles", instrument, candles.len());
        exchange.load(&instrument, candles);
    }
    println!();

    if exchange.timeline().is_empty() {
        println!("ERROR: No candle data available. Cannot replay.");
        return Ok(());
    }

    let mut runner = ReplayRunner::new(exchange, &cfg);
    let report = runner.run().await?;
    report.print_summary();

    let report_file = format!("data/replay_{}.txt", end.format("%Y%m%d_%H%M"));
    save_notifications(&report, &report_file)?;
    println!("\nAlert log saved to: {}", report_file);

    Ok(())
}

fn save_notifications(report: &ReplayReport, path: &str) -> Result<()> {
    use std::io::Write;

    let mut f = std::fs::File::create(path)?;
    for (at, n) in &report.notifications {
        writeln!(
            f,
            "{} [{}] {}",
            at.format("%Y-%m-%d %H:%M"),
            n.kind,
            n.text.replace('\n', " | ")
        )?;
    }
    Ok(())
}
