//! One tick of the pipeline for one instrument: indicators, levels, position
//! upkeep, signal evaluation, risk planning and alert deduplication.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::Config;
use crate::core::indicators::{trailing_mean, IndicatorEngine};
use crate::core::levels::LevelDetector;
use crate::core::risk::{RiskDecision, RiskPlanner};
use crate::error::EngineError;
use crate::models::{CandleSeries, SignalTier};
use crate::notify::{
    messages, AlertCandidate, AlertKey, AlertKind, InstrumentView, Notification, NotificationKind,
};
use crate::strategies::signals::{Signal, SignalEvaluator, SignalInput};
use crate::trading::{PositionEvent, PositionTracker};

use super::state::EngineState;

/// What a tick produced for one instrument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutcome {
    pub signal: Option<Signal>,
    pub events: Vec<PositionEvent>,
    pub notifications: Vec<Notification>,
}

/// Stateless pipeline; all memory lives in the [`EngineState`] passed in.
pub struct Engine {
    cfg: Config,
    indicators: IndicatorEngine,
    levels: LevelDetector,
    evaluator: SignalEvaluator,
    planner: RiskPlanner,
    tracker: PositionTracker,
}

impl Engine {
    pub fn new(cfg: &Config) -> Self {
        Self {
            cfg: cfg.clone(),
            indicators: IndicatorEngine::new(&cfg.indicators),
            levels: LevelDetector::new(&cfg.levels),
            evaluator: SignalEvaluator::new(&cfg.signal),
            planner: RiskPlanner::new(&cfg.risk),
            tracker: PositionTracker::new(&cfg.position),
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn new_state(&self) -> EngineState {
        EngineState::new(&self.cfg)
    }

    pub fn startup(&self) -> Notification {
        Notification::new(NotificationKind::Startup, None, messages::startup(&self.cfg))
    }

    /// Runs the pipeline for `instrument` on freshly fetched `candles`.
    ///
    /// `price` is the latest traded price; without one the last close is used.
    /// An `Err` means the instrument is skipped this tick and no state
    /// transition happened beyond merging the candles.
    pub fn process(
        &self,
        state: &mut EngineState,
        instrument: &str,
        candles: &CandleSeries,
        price: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, EngineError> {
        let (inst, deduper) = state.split_mut(instrument);
        inst.last_view = None;

        if candles.is_empty() {
            return Err(EngineError::DataUnavailable(format!(
                "no candles for {}",
                instrument
            )));
        }
        inst.window.ingest(candles);
        let series = inst.window.to_series();

        let snapshot = self.indicators.snapshot(&series)?;
        let Some(bar) = series.last() else {
            return Err(EngineError::DataUnavailable(format!(
                "empty window for {}",
                instrument
            )));
        };
        let price = match price.unwrap_or(bar.close) {
            p if p.is_finite() && p > 0.0 => p,
            p => {
                return Err(EngineError::DataUnavailable(format!(
                    "invalid price {} for {}",
                    p, instrument
                )))
            }
        };

        let levels = self.levels.detect(&series, &snapshot);
        let volume = bar.quote_volume();
        let volume_avg =
            trailing_mean(&series.quote_volumes(), self.cfg.signal.volume_avg_window)
                .unwrap_or(0.0);

        inst.last_view = Some(InstrumentView {
            instrument: instrument.to_string(),
            price,
            snapshot,
            volume,
            volume_avg,
            nearest_breakout: levels.nearest_breakout(),
            nearest_breakdown: levels.nearest_breakdown(),
        });

        let mut outcome = TickOutcome::default();

        for event in self.tracker.observe(&mut inst.position, price, snapshot.atr) {
            match messages::lifecycle(instrument, &event) {
                Some(n) => {
                    info!("{} {}: {}", instrument, n.kind, n.text.replace('\n', " | "));
                    outcome.notifications.push(n);
                }
                None => debug!("{} position update: {:?}", instrument, event),
            }
            outcome.events.push(event);
        }

        if inst.memory.observe_price(&levels, price) {
            debug!("{} back inside the level band, strong memory cleared", instrument);
        }

        let input = SignalInput {
            price,
            snapshot: &snapshot,
            levels: &levels,
            candle: bar,
            volume,
            volume_avg,
        };
        let Some(signal) = self.evaluator.evaluate(&input) else {
            return Ok(outcome);
        };
        outcome.signal = Some(signal);

        match signal.tier {
            SignalTier::Weak => {
                let key = AlertKey::new(instrument, AlertKind::Weak);
                let candidate = AlertCandidate {
                    direction: signal.direction,
                    price,
                    stop: None,
                };
                if deduper.should_emit(&key, &candidate, now) {
                    let text = messages::weak_signal(instrument, &signal, volume);
                    info!("{} weak {} at {:.2}", instrument, signal.direction, price);
                    outcome.notifications.push(Notification::new(
                        NotificationKind::WeakSignal,
                        Some(instrument),
                        text,
                    ));
                } else {
                    debug!("{} weak {} suppressed by cooldown", instrument, signal.direction);
                }
            }
            SignalTier::Strong => {
                if !inst.memory.is_armed(signal.direction) {
                    debug!("{} strong {} already alerted", instrument, signal.direction);
                    return Ok(outcome);
                }
                if !self.tracker.can_open(&inst.position, now) {
                    debug!(
                        "{} strong {} ignored: position open or entry cooldown",
                        instrument, signal.direction
                    );
                    return Ok(outcome);
                }

                let plan = match self.planner.plan(signal.direction, price, snapshot.atr) {
                    RiskDecision::Accepted(plan) => plan,
                    RiskDecision::Rejected { reward_risk, .. } => {
                        debug!(
                            "{} strong {} dropped: R:R {:.2} below {:.2}",
                            instrument, signal.direction, reward_risk, self.cfg.risk.min_reward_risk
                        );
                        return Ok(outcome);
                    }
                };

                let key = AlertKey::new(instrument, AlertKind::Strong);
                let candidate = AlertCandidate {
                    direction: signal.direction,
                    price,
                    stop: Some(plan.stop),
                };
                if !deduper.should_emit(&key, &candidate, now) {
                    debug!("{} strong {} suppressed by cooldown", instrument, signal.direction);
                    return Ok(outcome);
                }

                if let Some(event) = self.tracker.open(&mut inst.position, &plan, now) {
                    inst.memory.record(signal.direction);
                    if let Some(n) = messages::lifecycle(instrument, &event) {
                        info!("{} {}: {}", instrument, n.kind, n.text.replace('\n', " | "));
                        outcome.notifications.push(n);
                    }
                    outcome.events.push(event);
                }
            }
        }

        Ok(outcome)
    }

    /// Builds the periodic report once every configured instrument has a fresh view.
    /// Returns `None` when a view is missing or the same text was sent recently.
    pub fn digest(&self, state: &mut EngineState, now: DateTime<Utc>) -> Option<Notification> {
        let mut views = Vec::with_capacity(self.cfg.instruments.len());
        for name in &self.cfg.instruments {
            match state.instrument(name).and_then(|s| s.last_view.clone()) {
                Some(view) => views.push(view),
                None => {
                    debug!("Digest skipped: no fresh data for {}", name);
                    return None;
                }
            }
        }

        let text = messages::digest(&views, &self.cfg.indicators, now, self.cfg.report.timezone);
        if !state.deduper_mut().should_emit_digest(&text, now) {
            debug!("Digest suppressed: identical to the last one");
            return None;
        }

        Some(Notification::new(NotificationKind::Digest, None, text))
    }
}
