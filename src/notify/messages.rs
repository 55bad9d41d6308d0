//! Plain-text rendering for every notification the bot sends.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::config::{Config, IndicatorConfig};
use crate::core::indicators::IndicatorSnapshot;
use crate::models::{Direction, Trend};
use crate::strategies::signals::Signal;
use crate::trading::PositionEvent;

use super::{Notification, NotificationKind};

pub fn startup(cfg: &Config) -> String {
    format!(
        "✅ Alert bot active | {} preset | {} on {}",
        cfg.preset,
        cfg.instruments.join(", "),
        cfg.granularity
    )
}

pub fn weak_signal(instrument: &str, signal: &Signal, volume: f64) -> String {
    let label = match signal.direction {
        Direction::Long => "Weak breakout",
        Direction::Short => "Weak breakdown",
    };
    format!(
        "⚠️ {} {} | {:.2} | Vol {}",
        label,
        instrument,
        signal.reference_price,
        millions(volume)
    )
}

/// Renders a lifecycle event. Trailing ratchets are not alerted.
pub fn lifecycle(instrument: &str, event: &PositionEvent) -> Option<Notification> {
    let (kind, text) = match event {
        PositionEvent::Opened { position: p } => (
            NotificationKind::StrongSignal,
            format!(
                "🔥 STRONG {} {}\nEntry: {:.2} | TP1: {:.2} | TP2: {:.2} | Stop: {:.2}",
                p.side, instrument, p.entry, p.take_profit_1, p.take_profit_2, p.stop
            ),
        ),
        PositionEvent::TakeProfit1 {
            side,
            price,
            new_stop,
            ..
        } => (
            NotificationKind::TakeProfit1,
            format!(
                "🎯 TP1 {} {} at {:.2} | stop moved to {:.2}",
                side, instrument, price, new_stop
            ),
        ),
        PositionEvent::TakeProfit2 {
            side,
            price,
            r_multiple,
            ..
        } => (
            NotificationKind::TakeProfit2,
            format!(
                "✅ TP2 {} {} at {:.2} ({:+.2}R)",
                side, instrument, price, r_multiple
            ),
        ),
        PositionEvent::StopHit {
            side,
            price,
            after_tp1,
            r_multiple,
            ..
        } => {
            let text = if *after_tp1 {
                format!(
                    "🛡️ STOP {} {} at {:.2} after TP1 ({:+.2}R)",
                    side, instrument, price, r_multiple
                )
            } else {
                format!(
                    "❌ STOP {} {} at {:.2} ({:+.2}R)",
                    side, instrument, price, r_multiple
                )
            };
            (NotificationKind::StopHit, text)
        }
        PositionEvent::TrailRatchet { .. } => return None,
    };

    Some(Notification::new(kind, Some(instrument), text))
}

/// Rounds a level for compact display: step 100 at or above 10k, else 50.
/// Values of a thousand or more use a `k` suffix (`113k`, `111.5k`).
pub fn nice_level(x: f64) -> String {
    let step = if x >= 10_000.0 { 100.0 } else { 50.0 };
    let y = (x / step).round() * step;
    if y >= 1000.0 {
        if (y % 1000.0).abs() < 1e-9 {
            format!("{}k", (y / 1000.0) as i64)
        } else {
            format!("{:.1}k", y / 1000.0)
        }
    } else {
        format!("{}", y as i64)
    }
}

fn millions(v: f64) -> String {
    format!("{:.1}M", v / 1e6)
}

/// Latest per-instrument values used by the periodic digest.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentView {
    pub instrument: String,
    pub price: f64,
    pub snapshot: IndicatorSnapshot,
    pub volume: f64,
    pub volume_avg: f64,
    pub nearest_breakout: Option<f64>,
    pub nearest_breakdown: Option<f64>,
}

impl InstrumentView {
    pub fn trend(&self) -> Trend {
        Trend::from_emas(self.snapshot.ema_fast, self.snapshot.ema_slow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suggestion {
    PreferLong,
    PreferShort,
    Mixed,
}

impl Suggestion {
    pub fn from_views(views: &[InstrumentView]) -> Suggestion {
        if views.is_empty() {
            return Suggestion::Mixed;
        }
        if views.iter().all(|v| v.trend() == Trend::Bullish) {
            Suggestion::PreferLong
        } else if views.iter().all(|v| v.trend() == Trend::Bearish) {
            Suggestion::PreferShort
        } else {
            Suggestion::Mixed
        }
    }

    pub fn text(self) -> &'static str {
        match self {
            Suggestion::PreferLong => "prefer LONG ✅",
            Suggestion::PreferShort => "prefer SHORT ❌",
            Suggestion::Mixed => "mixed trend, wait for confirmation ⚠️",
        }
    }
}

fn digest_line(view: &InstrumentView, ind: &IndicatorConfig) -> String {
    let s = &view.snapshot;
    let mut line = format!(
        "{} {}: {:.2} | EMA{}: {:.2} | EMA{}: {:.2} | RSI: {:.1} | Vol: {} (avg {})",
        view.trend().marker(),
        view.instrument,
        view.price,
        ind.ema_fast,
        s.ema_fast,
        ind.ema_slow,
        s.ema_slow,
        s.rsi,
        millions(view.volume),
        millions(view.volume_avg),
    );
    if let Some(bo) = view.nearest_breakout {
        line.push_str(&format!(" | ▲ {}", nice_level(bo)));
    }
    if let Some(bd) = view.nearest_breakdown {
        line.push_str(&format!(" | ▼ {}", nice_level(bd)));
    }
    line
}

pub fn digest(
    views: &[InstrumentView],
    ind: &IndicatorConfig,
    now: DateTime<Utc>,
    tz: Tz,
) -> String {
    let local = now.with_timezone(&tz).format("%d/%m %H:%M");
    let utc = now.format("%d/%m %H:%M");
    let lines: Vec<String> = views.iter().map(|v| digest_line(v, ind)).collect();

    format!(
        "🕒 Report {} ({}) | {} UTC\n\n{}\n\nSuggestion: {}",
        local,
        tz.name(),
        utc,
        lines.join("\n"),
        Suggestion::from_views(views).text()
    )
}

/// Next wall-clock boundary strictly after `now`, on an `interval_minutes` grid.
pub fn next_report_at(now: DateTime<Utc>, interval_minutes: u32) -> DateTime<Utc> {
    let step = i64::from(interval_minutes.max(1)) * 60;
    let next = (now.timestamp().div_euclid(step) + 1) * step;
    DateTime::from_timestamp(next, 0).unwrap_or(now + Duration::seconds(step))
}
