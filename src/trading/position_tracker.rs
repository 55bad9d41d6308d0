use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PositionConfig;
use crate::core::risk::RiskPlan;
use crate::models::{Direction, PositionState};

/// A paper position. Never backed by an order; it only drives alert content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Direction,
    pub entry: f64,
    pub stop: f64,
    pub initial_stop: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    pub take_profit_1_hit: bool,
    pub opened_at: DateTime<Utc>,
    pub favorable_extreme: f64,
    pub atr_at_entry: Option<f64>,
}

impl Position {
    pub fn state(&self) -> PositionState {
        if self.take_profit_1_hit {
            PositionState::OpenPartial
        } else {
            PositionState::Open
        }
    }

    /// Signed result of exiting at `exit`, in units of the initial risk.
    pub fn r_multiple(&self, exit: f64) -> f64 {
        let risk = (self.entry - self.initial_stop).abs();
        if risk > 0.0 {
            self.side.sign() * (exit - self.entry) / risk
        } else {
            0.0
        }
    }

    fn stop_hit(&self, price: f64) -> bool {
        match self.side {
            Direction::Long => price <= self.stop,
            Direction::Short => price >= self.stop,
        }
    }

    /// Moves the stop to `candidate` only if that tightens it.
    fn tighten_stop(&mut self, candidate: f64) -> bool {
        let tighter = match self.side {
            Direction::Long => candidate > self.stop,
            Direction::Short => candidate < self.stop,
        };
        if tighter {
            self.stop = candidate;
        }
        tighter
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PositionEvent {
    Opened {
        position: Position,
    },
    TakeProfit1 {
        side: Direction,
        entry: f64,
        price: f64,
        new_stop: f64,
    },
    TakeProfit2 {
        side: Direction,
        entry: f64,
        price: f64,
        r_multiple: f64,
    },
    StopHit {
        side: Direction,
        entry: f64,
        price: f64,
        after_tp1: bool,
        r_multiple: f64,
    },
    TrailRatchet {
        side: Direction,
        old_stop: f64,
        new_stop: f64,
    },
}

impl PositionEvent {
    pub fn r_multiple(&self) -> Option<f64> {
        match self {
            PositionEvent::TakeProfit2 { r_multiple, .. }
            | PositionEvent::StopHit { r_multiple, .. } => Some(*r_multiple),
            _ => None,
        }
    }
}

/// Per-instrument position storage: at most one open position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionSlot {
    pub position: Option<Position>,
    pub last_entry_at: Option<DateTime<Utc>>,
}

/// Drives the NONE -> OPEN -> OPEN_PARTIAL -> NONE lifecycle.
pub struct PositionTracker {
    breakeven_offset_atr: f64,
    trail_atr_multiple: f64,
    entry_cooldown: Duration,
}

impl PositionTracker {
    pub fn new(cfg: &PositionConfig) -> Self {
        Self {
            breakeven_offset_atr: cfg.breakeven_offset_atr,
            trail_atr_multiple: cfg.trail_atr_multiple,
            entry_cooldown: Duration::seconds(cfg.entry_cooldown_secs),
        }
    }

    pub fn state(&self, slot: &PositionSlot) -> PositionState {
        slot.position
            .as_ref()
            .map_or(PositionState::None, Position::state)
    }

    pub fn can_open(&self, slot: &PositionSlot, now: DateTime<Utc>) -> bool {
        if slot.position.is_some() {
            return false;
        }
        match slot.last_entry_at {
            Some(at) => now - at >= self.entry_cooldown,
            None => true,
        }
    }

    /// NONE -> OPEN. Returns `None` without touching the slot when opening is not allowed.
    pub fn open(
        &self,
        slot: &mut PositionSlot,
        plan: &RiskPlan,
        now: DateTime<Utc>,
    ) -> Option<PositionEvent> {
        if !self.can_open(slot, now) {
            return None;
        }

        let position = Position {
            side: plan.direction,
            entry: plan.entry,
            stop: plan.stop,
            initial_stop: plan.stop,
            take_profit_1: plan.take_profit_1,
            take_profit_2: plan.take_profit_2,
            take_profit_1_hit: false,
            opened_at: now,
            favorable_extreme: plan.entry,
            atr_at_entry: plan.atr,
        };
        slot.position = Some(position.clone());
        slot.last_entry_at = Some(now);

        Some(PositionEvent::Opened { position })
    }

    /// Advances the open position, if any, on one price observation.
    ///
    /// Stop first, then TP1 (only from OPEN), then TP2. A TP1 tick does not
    /// also evaluate TP2. The trailing stop runs only after TP1 and uses the
    /// current ATR, falling back to the ATR at entry. It never moves to or
    /// past `price`, so a position left open by a tick is always on the right
    /// side of its stop.
    pub fn observe(
        &self,
        slot: &mut PositionSlot,
        price: f64,
        atr: Option<f64>,
    ) -> Vec<PositionEvent> {
        let mut events = Vec::new();
        let Some(pos) = slot.position.as_mut() else {
            return events;
        };

        if pos.stop_hit(price) {
            events.push(PositionEvent::StopHit {
                side: pos.side,
                entry: pos.entry,
                price: pos.stop,
                after_tp1: pos.take_profit_1_hit,
                r_multiple: pos.r_multiple(pos.stop),
            });
            slot.position = None;
            return events;
        }

        if !pos.take_profit_1_hit && pos.side.reached(price, pos.take_profit_1) {
            pos.take_profit_1_hit = true;
            let offset = self.breakeven_offset_atr * pos.atr_at_entry.unwrap_or(0.0);
            let breakeven = pos.entry + pos.side.sign() * offset;
            pos.tighten_stop(breakeven);
            events.push(PositionEvent::TakeProfit1 {
                side: pos.side,
                entry: pos.entry,
                price,
                new_stop: pos.stop,
            });
        } else if pos.side.reached(price, pos.take_profit_2) {
            events.push(PositionEvent::TakeProfit2 {
                side: pos.side,
                entry: pos.entry,
                price: pos.take_profit_2,
                r_multiple: pos.r_multiple(pos.take_profit_2),
            });
            slot.position = None;
            return events;
        }

        if pos.side.reached(price, pos.favorable_extreme) {
            pos.favorable_extreme = price;
        }

        if pos.take_profit_1_hit && self.trail_atr_multiple > 0.0 {
            if let Some(atr) = atr.or(pos.atr_at_entry).filter(|a| *a > 0.0) {
                let old_stop = pos.stop;
                let candidate =
                    pos.favorable_extreme - pos.side.sign() * self.trail_atr_multiple * atr;
                // A stop at or through the observed price would close on a price never traded.
                if !pos.side.reached(candidate, price) && pos.tighten_stop(candidate) {
                    events.push(PositionEvent::TrailRatchet {
                        side: pos.side,
                        old_stop,
                        new_stop: pos.stop,
                    });
                }
            }
        }

        events
    }
}
