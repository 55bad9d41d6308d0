use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::engine::TickOutcome;
use crate::models::SignalTier;
use crate::notify::{Notification, NotificationKind};
use crate::trading::PositionEvent;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentStats {
    pub weak_alerts: usize,
    pub strong_alerts: usize,
    pub closed: usize,
    pub wins: usize,
    pub total_r: f64,
}

/// Counts of what a replay produced, plus every emitted notification in order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub steps: usize,
    pub skipped_ticks: usize,

    // Signals
    pub weak_signals: usize,
    pub strong_signals: usize,
    pub weak_alerts: usize,
    pub strong_alerts: usize,

    // Lifecycle
    pub positions_opened: usize,
    pub tp1_hits: usize,
    pub tp2_hits: usize,
    pub stops: usize,
    pub stops_after_tp1: usize,
    pub trail_ratchets: usize,
    pub total_r: f64,

    pub by_instrument: HashMap<String, InstrumentStats>,
    pub notifications: Vec<(DateTime<Utc>, Notification)>,
}

impl Default for ReplayReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayReport {
    pub fn new() -> Self {
        Self {
            start: None,
            end: None,
            steps: 0,
            skipped_ticks: 0,
            weak_signals: 0,
            strong_signals: 0,
            weak_alerts: 0,
            strong_alerts: 0,
            positions_opened: 0,
            tp1_hits: 0,
            tp2_hits: 0,
            stops: 0,
            stops_after_tp1: 0,
            trail_ratchets: 0,
            total_r: 0.0,
            by_instrument: HashMap::new(),
            notifications: Vec::new(),
        }
    }

    pub fn record_step(&mut self, at: DateTime<Utc>) {
        self.start.get_or_insert(at);
        self.end = Some(at);
        self.steps += 1;
    }

    pub fn record_skip(&mut self) {
        self.skipped_ticks += 1;
    }

    pub fn record(&mut self, instrument: &str, at: DateTime<Utc>, outcome: &TickOutcome) {
        let stats = self.by_instrument.entry(instrument.to_string()).or_default();

        if let Some(signal) = &outcome.signal {
            match signal.tier {
                SignalTier::Weak => self.weak_signals += 1,
                SignalTier::Strong => self.strong_signals += 1,
            }
        }

        for event in &outcome.events {
            match event {
                PositionEvent::Opened { .. } => self.positions_opened += 1,
                PositionEvent::TakeProfit1 { .. } => self.tp1_hits += 1,
                PositionEvent::TakeProfit2 { .. } => self.tp2_hits += 1,
                PositionEvent::StopHit { after_tp1, .. } => {
                    self.stops += 1;
                    if *after_tp1 {
                        self.stops_after_tp1 += 1;
                    }
                }
                PositionEvent::TrailRatchet { .. } => self.trail_ratchets += 1,
            }
            if let Some(r) = event.r_multiple() {
                self.total_r += r;
                stats.closed += 1;
                stats.total_r += r;
                if r > 0.0 {
                    stats.wins += 1;
                }
            }
        }

        for n in &outcome.notifications {
            match n.kind {
                NotificationKind::WeakSignal => {
                    self.weak_alerts += 1;
                    stats.weak_alerts += 1;
                }
                NotificationKind::StrongSignal => {
                    self.strong_alerts += 1;
                    stats.strong_alerts += 1;
                }
                _ => {}
            }
            self.notifications.push((at, n.clone()));
        }
    }

    pub fn closed_positions(&self) -> usize {
        self.tp2_hits + self.stops
    }

    pub fn avg_r(&self) -> f64 {
        match self.closed_positions() {
            0 => 0.0,
            n => self.total_r / n as f64,
        }
    }

    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(70));
        println!("  REPLAY REPORT");
        println!("{}", "=".repeat(70));
        if let (Some(start), Some(end)) = (self.start, self.end) {
            println!(
                "  Period:      {} to {} ({} steps, {} skipped ticks)",
                start.format("%Y-%m-%d %H:%M"),
                end.format("%Y-%m-%d %H:%M"),
                self.steps,
                self.skipped_ticks
            );
        }
        println!();
        println!("  SIGNALS");
        println!("  ───────────────────────────────────");
        println!("  Weak:        {} ({} alerted)", self.weak_signals, self.weak_alerts);
        println!("  Strong:      {} ({} alerted)", self.strong_signals, self.strong_alerts);
        println!();
        println!("  POSITIONS");
        println!("  ───────────────────────────────────");
        println!("  Opened:      {}", self.positions_opened);
        println!("  TP1 hits:    {}", self.tp1_hits);
        println!("  TP2 hits:    {}", self.tp2_hits);
        println!(
            "  Stops:       {} ({} after TP1)",
            self.stops, self.stops_after_tp1
        );
        println!("  Trail moves: {}", self.trail_ratchets);
        println!("  Total R:     {:+.2}", self.total_r);
        println!("  Avg R:       {:+.2}", self.avg_r());

        if !self.by_instrument.is_empty() {
            println!();
            println!("  BY INSTRUMENT");
            println!("  ───────────────────────────────────");
            let mut rows: Vec<_> = self.by_instrument.iter().collect();
            rows.sort_by(|a, b| a.0.cmp(b.0));
            for (name, s) in rows {
                println!(
                    "  {:>10}: {} weak | {} strong | {} closed ({} won) | {:+.2}R",
                    name, s.weak_alerts, s.strong_alerts, s.closed, s.wins, s.total_r
                );
            }
        }

        println!("{}", "=".repeat(70));
    }
}
