use std::collections::HashMap;

use crate::config::Config;
use crate::models::CandleWindow;
use crate::notify::{Deduper, InstrumentView};
use crate::strategies::signals::StrongMemory;
use crate::trading::PositionSlot;

/// Everything the engine remembers about one instrument between ticks.
#[derive(Debug, Clone)]
pub struct InstrumentState {
    pub window: CandleWindow,
    pub memory: StrongMemory,
    pub position: PositionSlot,
    /// Values from the latest successful tick; cleared when a tick is skipped.
    pub last_view: Option<InstrumentView>,
}

impl InstrumentState {
    pub fn new(window_capacity: usize) -> Self {
        Self {
            window: CandleWindow::new(window_capacity),
            memory: StrongMemory::default(),
            position: PositionSlot::default(),
            last_view: None,
        }
    }
}

/// Mutable state owned by the driving loop and lent to the engine on every call.
/// Lives only in memory; a restart starts from scratch.
pub struct EngineState {
    instruments: HashMap<String, InstrumentState>,
    deduper: Deduper,
    window_capacity: usize,
}

impl EngineState {
    pub fn new(cfg: &Config) -> Self {
        let instruments = cfg
            .instruments
            .iter()
            .map(|name| (name.clone(), InstrumentState::new(cfg.window_capacity)))
            .collect();

        Self {
            instruments,
            deduper: Deduper::new(&cfg.cooldown),
            window_capacity: cfg.window_capacity,
        }
    }

    pub fn instrument(&self, name: &str) -> Option<&InstrumentState> {
        self.instruments.get(name)
    }

    /// Borrows one instrument's state together with the shared deduper.
    pub(crate) fn split_mut(&mut self, name: &str) -> (&mut InstrumentState, &mut Deduper) {
        let capacity = self.window_capacity;
        let inst = self
            .instruments
            .entry(name.to_string())
            .or_insert_with(|| InstrumentState::new(capacity));
        (inst, &mut self.deduper)
    }

    pub(crate) fn deduper_mut(&mut self) -> &mut Deduper {
        &mut self.deduper
    }

    pub fn open_positions(&self) -> usize {
        self.instruments
            .values()
            .filter(|s| s.position.position.is_some())
            .count()
    }
}
