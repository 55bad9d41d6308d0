mod common;

use chrono::{DateTime, Duration, Utc};

use breakout_alert_bot::backtesting::{ReplayReport, ReplayRunner};
use breakout_alert_bot::config::{Config, Preset};
use breakout_alert_bot::core::risk::{RiskDecision, RiskPlanner};
use breakout_alert_bot::engine::{Engine, EngineState};
use breakout_alert_bot::exchange::{HistoricalExchange, MarketData};
use breakout_alert_bot::models::{Direction, PositionState, SignalTier};
use breakout_alert_bot::notify::{
    AlertCandidate, AlertKey, AlertKind, AlertSink, Deduper, NotificationKind,
};
use breakout_alert_bot::trading::{PositionEvent, PositionSlot, PositionTracker};

use common::{
    make_breakdown_series, make_breakout_series, test_config, BrokenSink, MockMarket,
    RecordingSink,
};

/// One pass of the polling loop: fetch, process, deliver. Returns the number of fetch failures.
async fn tick(
    cfg: &Config,
    engine: &Engine,
    state: &mut EngineState,
    market: &mut dyn MarketData,
    sink: &dyn AlertSink,
    now: DateTime<Utc>,
) -> usize {
    let mut failures = 0;
    for instrument in &cfg.instruments {
        let candles = match market
            .fetch_candles(instrument, cfg.granularity, cfg.candle_limit)
            .await
        {
            Ok(c) => c,
            Err(_) => {
                failures += 1;
                continue;
            }
        };
        let price = market.get_current_price(instrument).await.ok();
        if let Ok(outcome) = engine.process(state, instrument, &candles, price, now) {
            for n in &outcome.notifications {
                let _ = sink.deliver(n).await;
            }
        }
    }
    failures
}

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-15T14:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[tokio::test]
async fn full_pipeline_from_breakout_to_second_target() {
    let cfg = test_config(&["BTCUSDT"]);
    let engine = Engine::new(&cfg);
    let mut state = engine.new_state();
    let mut market = MockMarket::default().with("BTCUSDT", make_breakout_series(120, 100.0, 2.0));
    let sink = RecordingSink::default();

    sink.deliver(&engine.startup()).await.unwrap();
    tick(&cfg, &engine, &mut state, &mut market, &sink, t0()).await;

    let pos = state
        .instrument("BTCUSDT")
        .and_then(|s| s.position.position.clone())
        .expect("position opened");
    assert_eq!(pos.side, Direction::Long);

    market.set_price("BTCUSDT", pos.take_profit_1 + 0.01);
    tick(&cfg, &engine, &mut state, &mut market, &sink, t0() + Duration::seconds(5)).await;
    market.set_price("BTCUSDT", pos.take_profit_2 + 0.01);
    tick(&cfg, &engine, &mut state, &mut market, &sink, t0() + Duration::seconds(10)).await;

    let kinds: Vec<NotificationKind> = sink.sent().iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NotificationKind::Startup,
            NotificationKind::StrongSignal,
            NotificationKind::TakeProfit1,
            NotificationKind::TakeProfit2,
        ]
    );
    assert!(state
        .instrument("BTCUSDT")
        .unwrap()
        .position
        .position
        .is_none());
}

#[tokio::test]
async fn failing_instrument_does_not_block_the_others() {
    let cfg = test_config(&["BTCUSDT", "ETHUSDT"]);
    let engine = Engine::new(&cfg);
    let mut state = engine.new_state();
    let mut market = MockMarket::default().with("ETHUSDT", make_breakdown_series(120, 5000.0, 2.0));
    market.failing.push("BTCUSDT".to_string());
    let sink = RecordingSink::default();

    let failures = tick(&cfg, &engine, &mut state, &mut market, &sink, t0()).await;
    assert_eq!(failures, 1);

    let sent = sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::StrongSignal);
    assert_eq!(sent[0].instrument.as_deref(), Some("ETHUSDT"));
    assert!(sent[0].text.contains("STRONG SHORT ETHUSDT"));

    // no fresh BTC view, so no digest
    assert!(engine.digest(&mut state, t0()).is_none());
}

#[tokio::test]
async fn delivery_failures_are_swallowed() {
    let cfg = test_config(&["BTCUSDT"]);
    let engine = Engine::new(&cfg);
    let mut state = engine.new_state();
    let mut market = MockMarket::default().with("BTCUSDT", make_breakout_series(120, 100.0, 2.0));

    tick(&cfg, &engine, &mut state, &mut market, &BrokenSink, t0()).await;
    // the position still opened even though nobody heard about it
    assert_eq!(state.open_positions(), 1);
}

async fn replay_once(cfg: &Config) -> ReplayReport {
    let mut exchange = HistoricalExchange::new();
    exchange.load("BTCUSDT", make_breakout_series(150, 100.0, 2.5).as_slice().to_vec());
    exchange.load("ETHUSDT", make_breakdown_series(150, 5000.0, 2.5).as_slice().to_vec());
    let mut runner = ReplayRunner::new(exchange, cfg);
    runner.run().await.unwrap()
}

#[tokio::test]
async fn replay_is_a_pure_function_of_its_input() {
    let cfg = test_config(&["BTCUSDT", "ETHUSDT"]);

    let first = replay_once(&cfg).await;
    let second = replay_once(&cfg).await;
    assert!(!first.notifications.is_empty());
    assert_eq!(first.strong_alerts, 2);
    assert_eq!(first.notifications, second.notifications);
    assert_eq!(first, second);
}

#[test]
fn deduper_suppresses_repeats_but_lets_reversals_through() {
    let cfg = Config::preset(Preset::Breakout);
    let mut deduper = Deduper::new(&cfg.cooldown);
    let key = AlertKey::new("BTCUSDT", AlertKind::Strong);
    let long = AlertCandidate {
        direction: Direction::Long,
        price: 100.0,
        stop: Some(98.0),
    };
    let short = AlertCandidate {
        direction: Direction::Short,
        price: 100.0,
        stop: Some(102.0),
    };

    assert!(deduper.should_emit(&key, &long, t0()));
    assert!(!deduper.should_emit(&key, &long, t0() + Duration::minutes(3)));
    assert!(deduper.should_emit(&key, &short, t0() + Duration::minutes(4)));
}

#[test]
fn planner_rejects_low_reward_to_risk() {
    let mut cfg = Config::preset(Preset::Breakout);
    cfg.risk.sl_atr_multiple = 1.5;
    cfg.risk.tp1_atr_multiple = 1.0;
    cfg.risk.tp2_atr_multiple = 2.0;
    cfg.risk.min_reward_risk = 1.5;

    match RiskPlanner::new(&cfg.risk).plan(Direction::Long, 100.0, Some(2.0)) {
        RiskDecision::Rejected { plan, reward_risk } => {
            assert!((plan.stop - 97.0).abs() < 1e-9);
            assert!((plan.take_profit_1 - 102.0).abs() < 1e-9);
            assert!((plan.take_profit_2 - 104.0).abs() < 1e-9);
            assert!((reward_risk - 4.0 / 3.0).abs() < 1e-9);
        }
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn tracker_walks_the_textbook_long() {
    let cfg = Config::preset(Preset::Breakout);
    let tracker = PositionTracker::new(&cfg.position);
    let mut slot = PositionSlot::default();
    let plan = breakout_alert_bot::core::risk::RiskPlan {
        direction: Direction::Long,
        entry: 100.0,
        stop: 97.0,
        take_profit_1: 101.0,
        take_profit_2: 104.0,
        atr: Some(3.0),
    };
    tracker.open(&mut slot, &plan, t0()).unwrap();

    let mut events = Vec::new();
    for (i, p) in [100.5, 101.2, 103.0, 104.1].into_iter().enumerate() {
        events.extend(tracker.observe(&mut slot, p, Some(3.0)));
        if i == 1 {
            assert_eq!(tracker.state(&slot), PositionState::OpenPartial);
            assert!(slot.position.as_ref().unwrap().stop >= 100.0);
        }
    }

    assert_eq!(tracker.state(&slot), PositionState::None);
    let tp1 = events.iter().filter(|e| matches!(e, PositionEvent::TakeProfit1 { .. })).count();
    let tp2 = events.iter().filter(|e| matches!(e, PositionEvent::TakeProfit2 { .. })).count();
    let stops = events.iter().filter(|e| matches!(e, PositionEvent::StopHit { .. })).count();
    assert_eq!((tp1, tp2, stops), (1, 1, 0));
}

#[test]
fn volume_decides_the_tier() {
    let cfg = test_config(&["BTCUSDT"]);
    let engine = Engine::new(&cfg);

    let mut state = engine.new_state();
    let strong = engine
        .process(&mut state, "BTCUSDT", &make_breakout_series(120, 100.0, 2.0), None, t0())
        .unwrap();
    assert_eq!(strong.signal.map(|s| s.tier), Some(SignalTier::Strong));

    let mut state = engine.new_state();
    let weak = engine
        .process(&mut state, "BTCUSDT", &make_breakout_series(120, 100.0, 1.0), None, t0())
        .unwrap();
    assert_eq!(weak.signal.map(|s| s.tier), Some(SignalTier::Weak));
    assert!(weak.events.is_empty());
}
