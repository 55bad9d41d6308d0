use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::models::Direction;

/// Exit levels for a prospective position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPlan {
    pub direction: Direction,
    pub entry: f64,
    pub stop: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    /// ATR the plan was sized with; `None` for the percentage fallback.
    pub atr: Option<f64>,
}

impl RiskPlan {
    pub fn risk(&self) -> f64 {
        (self.entry - self.stop).abs()
    }

    /// Reward to risk at the second target.
    pub fn reward_risk(&self) -> f64 {
        let risk = self.risk();
        if risk > 0.0 {
            (self.take_profit_2 - self.entry).abs() / risk
        } else {
            0.0
        }
    }
}

/// Outcome of planning. A rejection is an expected result, not a failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskDecision {
    Accepted(RiskPlan),
    Rejected { plan: RiskPlan, reward_risk: f64 },
}

pub struct RiskPlanner {
    cfg: RiskConfig,
}

impl RiskPlanner {
    pub fn new(cfg: &RiskConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    pub fn plan(&self, direction: Direction, entry: f64, atr: Option<f64>) -> RiskDecision {
        let sign = direction.sign();
        let plan = match atr.filter(|a| *a > 0.0) {
            Some(atr) => RiskPlan {
                direction,
                entry,
                stop: entry - sign * self.cfg.sl_atr_multiple * atr,
                take_profit_1: entry + sign * self.cfg.tp1_atr_multiple * atr,
                take_profit_2: entry + sign * self.cfg.tp2_atr_multiple * atr,
                atr: Some(atr),
            },
            None => {
                let r = entry.abs() * self.cfg.fallback_stop_pct;
                RiskPlan {
                    direction,
                    entry,
                    stop: entry - sign * r,
                    take_profit_1: entry + sign * r,
                    take_profit_2: entry + sign * 2.0 * r,
                    atr: None,
                }
            }
        };

        let reward_risk = plan.reward_risk();
        if reward_risk < self.cfg.min_reward_risk {
            RiskDecision::Rejected { plan, reward_risk }
        } else {
            RiskDecision::Accepted(plan)
        }
    }
}
