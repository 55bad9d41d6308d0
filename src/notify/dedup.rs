//! Decides whether a candidate alert or digest is actually sent.
//!
//! Signal alerts are keyed by instrument and kind. A repeat within the
//! cooldown window is suppressed unless the direction flipped or price
//! crossed the stop carried by the previous alert. Digests are compared by
//! content fingerprint instead.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::CooldownConfig;
use crate::models::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Weak,
    Strong,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub instrument: String,
    pub kind: AlertKind,
}

impl AlertKey {
    pub fn new(instrument: &str, kind: AlertKind) -> Self {
        Self {
            instrument: instrument.to_string(),
            kind,
        }
    }
}

/// What the deduper needs to know about an alert.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertCandidate {
    pub direction: Direction,
    pub price: f64,
    /// Invalidation level reported with the alert, if any.
    pub stop: Option<f64>,
}

#[derive(Debug, Clone, Default)]
struct CooldownState {
    last_emit_time: Option<DateTime<Utc>>,
    last_direction: Option<Direction>,
    last_stop: Option<f64>,
    last_content_fingerprint: Option<String>,
}

pub struct Deduper {
    weak_cooldown: Duration,
    strong_cooldown: Duration,
    digest_min_gap: Duration,
    states: HashMap<AlertKey, CooldownState>,
    digest: CooldownState,
}

impl Deduper {
    pub fn new(cfg: &CooldownConfig) -> Self {
        Self {
            weak_cooldown: Duration::seconds(cfg.weak_secs),
            strong_cooldown: Duration::seconds(cfg.strong_secs),
            digest_min_gap: Duration::seconds(cfg.digest_min_gap_secs),
            states: HashMap::new(),
            digest: CooldownState::default(),
        }
    }

    fn cooldown(&self, kind: AlertKind) -> Duration {
        match kind {
            AlertKind::Weak => self.weak_cooldown,
            AlertKind::Strong => self.strong_cooldown,
        }
    }

    /// Applies the emission rules in order and records the emission when it passes.
    pub fn should_emit(
        &mut self,
        key: &AlertKey,
        candidate: &AlertCandidate,
        now: DateTime<Utc>,
    ) -> bool {
        let cooldown = self.cooldown(key.kind);
        let state = self.states.entry(key.clone()).or_default();

        let emit = match (state.last_emit_time, state.last_direction) {
            (Some(last_time), Some(last_dir)) => {
                let reversed = candidate.direction != last_dir;
                let invalidated = state
                    .last_stop
                    .is_some_and(|stop| last_dir.opposite().reached(candidate.price, stop));
                reversed || invalidated || now - last_time >= cooldown
            }
            _ => true,
        };

        if emit {
            state.last_emit_time = Some(now);
            state.last_direction = Some(candidate.direction);
            state.last_stop = candidate.stop;
        }
        emit
    }

    /// Suppresses a digest whose rendered text matches the last one sent within the minimum gap.
    pub fn should_emit_digest(&mut self, text: &str, now: DateTime<Utc>) -> bool {
        let fingerprint = fingerprint(text);
        let state = &mut self.digest;

        let duplicate = state.last_content_fingerprint.as_deref() == Some(fingerprint.as_str())
            && state
                .last_emit_time
                .is_some_and(|t| now - t < self.digest_min_gap);
        if duplicate {
            return false;
        }

        state.last_emit_time = Some(now);
        state.last_content_fingerprint = Some(fingerprint);
        true
    }

    pub fn last_emit_time(&self, key: &AlertKey) -> Option<DateTime<Utc>> {
        self.states.get(key).and_then(|s| s.last_emit_time)
    }
}

pub fn fingerprint(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}
