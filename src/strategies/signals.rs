use serde::{Deserialize, Serialize};

use crate::config::SignalConfig;
use crate::core::indicators::IndicatorSnapshot;
use crate::core::levels::LevelSet;
use crate::models::{Candle, Direction, SignalTier};

/// A confirmed breakout (LONG) or breakdown (SHORT) for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub direction: Direction,
    pub tier: SignalTier,
    pub reference_price: f64,
    /// The level price reached or crossed.
    pub level: f64,
}

/// Everything the evaluator looks at for one instrument on one tick.
#[derive(Debug, Clone, Copy)]
pub struct SignalInput<'a> {
    pub price: f64,
    pub snapshot: &'a IndicatorSnapshot,
    pub levels: &'a LevelSet,
    /// The bar the price belongs to; its body must point the signal's way.
    pub candle: &'a Candle,
    pub volume: f64,
    pub volume_avg: f64,
}

pub struct SignalEvaluator {
    cfg: SignalConfig,
}

impl SignalEvaluator {
    pub fn new(cfg: &SignalConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    /// Runs the LONG checks, then their SHORT mirror. The trend filter makes
    /// the two mutually exclusive.
    pub fn evaluate(&self, input: &SignalInput<'_>) -> Option<Signal> {
        self.evaluate_side(Direction::Long, input)
            .or_else(|| self.evaluate_side(Direction::Short, input))
    }

    fn evaluate_side(&self, side: Direction, input: &SignalInput<'_>) -> Option<Signal> {
        let snap = input.snapshot;
        let p = input.price;

        let level = match side {
            Direction::Long => input
                .levels
                .breakout_levels
                .iter()
                .copied()
                .find(|l| p >= *l)?,
            Direction::Short => input
                .levels
                .breakdown_levels
                .iter()
                .rev()
                .copied()
                .find(|l| p <= *l)?,
        };

        let confirmed = match side {
            Direction::Long => {
                snap.ema_fast > snap.ema_slow
                    && snap.ema_fast_rising()
                    && snap.macd_histogram > 0.0
                    && input.candle.is_bullish()
                    && p >= snap.ema_fast
                    && (!self.cfg.rsi_confirmation || snap.rsi >= self.cfg.rsi_upper)
            }
            Direction::Short => {
                snap.ema_fast < snap.ema_slow
                    && snap.ema_fast_falling()
                    && snap.macd_histogram < 0.0
                    && input.candle.is_bearish()
                    && p <= snap.ema_fast
                    && (!self.cfg.rsi_confirmation || snap.rsi <= self.cfg.rsi_lower)
            }
        };
        if !confirmed {
            return None;
        }

        Some(Signal {
            direction: side,
            tier: self.tier(input.volume, input.volume_avg),
            reference_price: p,
            level,
        })
    }

    /// STRONG needs real volume at or above the configured multiple of the trailing mean.
    fn tier(&self, volume: f64, volume_avg: f64) -> SignalTier {
        if volume > 0.0 && volume >= self.cfg.volume_multiple * volume_avg {
            SignalTier::Strong
        } else {
            SignalTier::Weak
        }
    }
}

/// Remembers the last STRONG direction for an instrument.
///
/// A direction that already fired stays disarmed until price re-enters the
/// band between the nearest breakdown and breakout levels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrongMemory {
    last_strong: Option<Direction>,
}

impl StrongMemory {
    pub fn last_strong(&self) -> Option<Direction> {
        self.last_strong
    }

    pub fn is_armed(&self, direction: Direction) -> bool {
        self.last_strong != Some(direction)
    }

    pub fn record(&mut self, direction: Direction) {
        self.last_strong = Some(direction);
    }

    /// Clears the memory when price is back inside the band. Returns true on reset.
    pub fn observe_price(&mut self, levels: &LevelSet, price: f64) -> bool {
        if self.last_strong.is_some() && levels.is_inside_band(price) {
            self.last_strong = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Preset};
    use crate::test_helpers::{make_candles, snapshot_with};

    fn evaluator(preset: Preset) -> SignalEvaluator {
        SignalEvaluator::new(&Config::preset(preset).signal)
    }

    fn levels() -> LevelSet {
        LevelSet::new(vec![105.0, 110.0], vec![90.0, 95.0])
    }

    fn bar(open: f64, close: f64) -> Candle {
        let high = open.max(close) + 0.5;
        let low = open.min(close) - 0.5;
        make_candles(&[(open, high, low, close)])[0].clone()
    }

    fn long_input<'a>(
        snap: &'a IndicatorSnapshot,
        levels: &'a LevelSet,
        candle: &'a Candle,
    ) -> SignalInput<'a> {
        SignalInput {
            price: 106.0,
            snapshot: snap,
            levels,
            candle,
            volume: 130.0,
            volume_avg: 100.0,
        }
    }

    #[test]
    fn all_long_conditions_with_volume_is_strong() {
        let snap = snapshot_with(104.0, 103.0, 100.0, 0.5, Some(2.0));
        let lv = levels();
        let up = bar(103.0, 106.0);
        let sig = evaluator(Preset::Breakout).evaluate(&long_input(&snap, &lv, &up)).unwrap();
        assert_eq!(sig.direction, Direction::Long);
        assert_eq!(sig.tier, SignalTier::Strong);
        assert_eq!(sig.level, 105.0);
        assert_eq!(sig.reference_price, 106.0);
    }

    #[test]
    fn low_volume_downgrades_to_weak() {
        let snap = snapshot_with(104.0, 103.0, 100.0, 0.5, Some(2.0));
        let lv = levels();
        let up = bar(103.0, 106.0);
        let mut input = long_input(&snap, &lv, &up);
        input.volume = 119.0;
        let sig = evaluator(Preset::Breakout).evaluate(&input).unwrap();
        assert_eq!(sig.tier, SignalTier::Weak);
    }

    #[test]
    fn negative_macd_yields_nothing() {
        let snap = snapshot_with(104.0, 103.0, 100.0, -0.1, Some(2.0));
        let lv = levels();
        let up = bar(103.0, 106.0);
        assert_eq!(evaluator(Preset::Breakout).evaluate(&long_input(&snap, &lv, &up)), None);
    }

    #[test]
    fn each_long_filter_is_required() {
        let lv = levels();
        let up = bar(103.0, 106.0);
        let ev = evaluator(Preset::Breakout);

        // below every breakout level
        let snap = snapshot_with(104.0, 103.0, 100.0, 0.5, Some(2.0));
        let mut input = long_input(&snap, &lv, &up);
        input.price = 104.5;
        assert_eq!(ev.evaluate(&input), None);

        // EMA fast not rising
        let snap = snapshot_with(104.0, 104.0, 100.0, 0.5, Some(2.0));
        assert_eq!(ev.evaluate(&long_input(&snap, &lv, &up)), None);

        // EMA fast below slow
        let snap = snapshot_with(99.0, 98.0, 100.0, 0.5, Some(2.0));
        assert_eq!(ev.evaluate(&long_input(&snap, &lv, &up)), None);

        // bearish candle
        let snap = snapshot_with(104.0, 103.0, 100.0, 0.5, Some(2.0));
        let bearish = bar(107.0, 106.0);
        let mut input = long_input(&snap, &lv, &up);
        input.candle = &bearish;
        assert_eq!(ev.evaluate(&input), None);

        // price under EMA fast
        let snap = snapshot_with(107.0, 106.0, 100.0, 0.5, Some(2.0));
        assert_eq!(ev.evaluate(&long_input(&snap, &lv, &up)), None);
    }

    #[test]
    fn short_mirror() {
        let snap = snapshot_with(96.0, 97.0, 100.0, -0.5, Some(2.0));
        let lv = levels();
        let candle = bar(97.0, 94.0);
        let input = SignalInput {
            price: 94.0,
            snapshot: &snap,
            levels: &lv,
            candle: &candle,
            volume: 200.0,
            volume_avg: 100.0,
        };
        let sig = evaluator(Preset::Breakout).evaluate(&input).unwrap();
        assert_eq!(sig.direction, Direction::Short);
        assert_eq!(sig.tier, SignalTier::Strong);
        assert_eq!(sig.level, 95.0);
    }

    #[test]
    fn zero_volume_is_never_strong() {
        let snap = snapshot_with(104.0, 103.0, 100.0, 0.5, Some(2.0));
        let lv = levels();
        let up = bar(103.0, 106.0);
        let mut input = long_input(&snap, &lv, &up);
        input.volume = 0.0;
        input.volume_avg = 0.0;
        let sig = evaluator(Preset::Breakout).evaluate(&input).unwrap();
        assert_eq!(sig.tier, SignalTier::Weak);
    }

    #[test]
    fn momentum_preset_requires_rsi() {
        let mut snap = snapshot_with(104.0, 103.0, 100.0, 0.5, Some(2.0));
        let lv = levels();
        let up = bar(103.0, 106.0);
        snap.rsi = 65.0;
        assert_eq!(evaluator(Preset::Momentum).evaluate(&long_input(&snap, &lv, &up)), None);
        snap.rsi = 72.0;
        assert!(evaluator(Preset::Momentum).evaluate(&long_input(&snap, &lv, &up)).is_some());
    }

    #[test]
    fn memory_disarms_until_price_reenters_band() {
        let lv = levels();
        let mut mem = StrongMemory::default();
        assert!(mem.is_armed(Direction::Long));
        mem.record(Direction::Long);
        assert!(!mem.is_armed(Direction::Long));
        assert!(mem.is_armed(Direction::Short));

        // still beyond the breakout level: no reset
        assert!(!mem.observe_price(&lv, 106.0));
        assert!(!mem.is_armed(Direction::Long));

        // back between 95 and 105
        assert!(mem.observe_price(&lv, 100.0));
        assert!(mem.is_armed(Direction::Long));
        assert_eq!(mem.last_strong(), None);
    }
}
