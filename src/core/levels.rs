use serde::{Deserialize, Serialize};

use crate::config::LevelConfig;
use crate::core::indicators::IndicatorSnapshot;
use crate::models::CandleSeries;

/// Trigger prices for the current tick, each list sorted ascending without duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LevelSet {
    pub breakout_levels: Vec<f64>,
    pub breakdown_levels: Vec<f64>,
}

impl LevelSet {
    pub fn new(breakout: Vec<f64>, breakdown: Vec<f64>) -> Self {
        Self {
            breakout_levels: sorted_unique(breakout),
            breakdown_levels: sorted_unique(breakdown),
        }
    }

    /// Lowest breakout level: the first one price meets on the way up.
    pub fn nearest_breakout(&self) -> Option<f64> {
        self.breakout_levels.first().copied()
    }

    /// Highest breakdown level: the first one price meets on the way down.
    pub fn nearest_breakdown(&self) -> Option<f64> {
        self.breakdown_levels.last().copied()
    }

    /// Strictly between the nearest breakdown and the nearest breakout.
    pub fn is_inside_band(&self, price: f64) -> bool {
        match (self.nearest_breakdown(), self.nearest_breakout()) {
            (Some(lo), Some(hi)) => lo < price && price < hi,
            _ => false,
        }
    }
}

fn sorted_unique(mut levels: Vec<f64>) -> Vec<f64> {
    levels.retain(|l| l.is_finite());
    levels.sort_by(f64::total_cmp);
    levels.dedup();
    levels
}

/// Derives breakout/breakdown levels from the swing extremes of the last
/// `lookback_bars` and the EMA ± k·ATR band. Stateless.
pub struct LevelDetector {
    cfg: LevelConfig,
}

impl LevelDetector {
    pub fn new(cfg: &LevelConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    pub fn detect(&self, candles: &CandleSeries, snapshot: &IndicatorSnapshot) -> LevelSet {
        // A short history shrinks the window rather than failing.
        let window = candles.tail(self.cfg.lookback_bars);
        let band = self.cfg.atr_band_multiple * snapshot.atr.unwrap_or(0.0);

        let mut breakout = vec![snapshot.ema_fast + band];
        let mut breakdown = vec![snapshot.ema_fast - band];
        if !window.is_empty() {
            breakout.push(window.highs_max());
            breakdown.push(window.lows_min());
        }

        LevelSet::new(breakout, breakdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Preset};
    use crate::test_helpers::{make_candles, snapshot_with};

    fn detector(lookback: usize) -> LevelDetector {
        let mut cfg = Config::preset(Preset::Breakout).levels;
        cfg.lookback_bars = lookback;
        LevelDetector::new(&cfg)
    }

    #[test]
    fn swing_extremes_and_atr_band() {
        let candles = make_candles(&[
            (100.0, 110.0, 95.0, 105.0),
            (105.0, 120.0, 100.0, 115.0),
            (115.0, 118.0, 90.0, 112.0),
        ]);
        let snap = snapshot_with(108.0, 107.0, 100.0, 1.0, Some(4.0));
        let levels = detector(96).detect(&candles, &snap);
        assert_eq!(levels.breakout_levels, vec![112.0, 120.0]);
        assert_eq!(levels.breakdown_levels, vec![90.0, 104.0]);
        assert_eq!(levels.nearest_breakout(), Some(112.0));
        assert_eq!(levels.nearest_breakdown(), Some(104.0));
    }

    #[test]
    fn lookback_limits_swing_window() {
        let candles = make_candles(&[
            (100.0, 150.0, 50.0, 105.0),
            (105.0, 110.0, 100.0, 108.0),
            (108.0, 112.0, 104.0, 110.0),
        ]);
        let snap = snapshot_with(108.0, 107.0, 100.0, 1.0, Some(1.0));
        let levels = detector(2).detect(&candles, &snap);
        assert_eq!(levels.breakout_levels, vec![109.0, 112.0]);
        assert_eq!(levels.breakdown_levels, vec![100.0, 107.0]);
    }

    #[test]
    fn coincident_levels_collapse_and_missing_atr_uses_ema() {
        let candles = make_candles(&[(100.0, 108.0, 100.0, 104.0)]);
        let snap = snapshot_with(108.0, 107.0, 100.0, 1.0, None);
        let levels = detector(96).detect(&candles, &snap);
        assert_eq!(levels.breakout_levels, vec![108.0]);
        assert_eq!(levels.breakdown_levels, vec![100.0, 108.0]);
    }

    #[test]
    fn inside_band_is_strict() {
        let levels = LevelSet::new(vec![110.0, 120.0], vec![90.0, 100.0]);
        assert!(levels.is_inside_band(105.0));
        assert!(!levels.is_inside_band(110.0));
        assert!(!levels.is_inside_band(100.0));
        assert!(!LevelSet::default().is_inside_band(105.0));
    }
}
