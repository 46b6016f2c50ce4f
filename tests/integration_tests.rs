//! End-to-end scenarios driven through synchronizer, analyzer and signal
//! generator without any network transport

use binance_orderflow::{
    analyzer::FlowAnalyzer,
    config::BotConfig,
    data::*,
    signal::SignalGenerator,
    sync::{DiffOutcome, StreamSynchronizer, SyncState},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const T0: i64 = 1_000_000;

/// Offline pipeline: synchronizer feeding analyzer feeding generator,
/// the same wiring the bot task performs on live events
struct Pipeline {
    sync: StreamSynchronizer,
    analyzer: FlowAnalyzer,
    signals: SignalGenerator,
}

impl Pipeline {
    fn new(config: BotConfig) -> Self {
        Self {
            sync: StreamSynchronizer::new(),
            analyzer: FlowAnalyzer::new(config.clone()),
            signals: SignalGenerator::new(config),
        }
    }

    fn snapshot(&mut self, snapshot: DepthSnapshot, now_ms: i64) {
        let drain = self.sync.on_snapshot(&snapshot);
        self.analyzer
            .apply_book_update(&BookUpdate::Snapshot(snapshot), now_ms);
        for diff in drain.applicable {
            self.analyzer
                .apply_book_update(&BookUpdate::Diff(diff), now_ms);
        }
        self.analyzer.set_synced(self.sync.is_synced());
    }

    fn diff(&mut self, diff: DepthDiff, now_ms: i64) -> DiffOutcome {
        let outcome = self.sync.on_diff(diff);
        if let DiffOutcome::Apply(applied) = &outcome {
            self.analyzer
                .apply_book_update(&BookUpdate::Diff(applied.clone()), now_ms);
        }
        self.analyzer.set_synced(self.sync.is_synced());
        outcome
    }

    fn trade(&mut self, price: Decimal, size: Decimal, side: TradeSide, now_ms: i64) -> Option<Signal> {
        self.analyzer.add_trade(
            Trade {
                price,
                size,
                side,
                timestamp_ms: now_ms,
            },
            now_ms,
        );
        let state = self.analyzer.market_state(now_ms);
        self.signals.generate(&state)
    }
}

fn sweep_config() -> BotConfig {
    BotConfig {
        min_delta_flip: 30.0,
        ..Default::default()
    }
}

/// Five adjacent bid levels worth ~$60k plus a thin ask side
fn sweep_book_snapshot() -> DepthSnapshot {
    DepthSnapshot {
        last_update_id: 100,
        bids: vec![
            (dec!(1998.0), dec!(6)),
            (dec!(1998.5), dec!(6)),
            (dec!(1999.0), dec!(6)),
            (dec!(1999.5), dec!(6)),
            (dec!(2000.0), dec!(6)),
        ],
        asks: vec![(dec!(2001), dec!(3)), (dec!(2002), dec!(3))],
    }
}

/// One diff wiping all five bid levels
fn bid_wipe_diff() -> DepthDiff {
    DepthDiff {
        first_update_id: 101,
        final_update_id: 101,
        bids: vec![
            (dec!(1998.0), dec!(0)),
            (dec!(1998.5), dec!(0)),
            (dec!(1999.0), dec!(0)),
            (dec!(1999.5), dec!(0)),
            (dec!(2000.0), dec!(0)),
        ],
        asks: vec![],
    }
}

// S1: snapshot then in-order diff

#[test]
fn test_s1_snapshot_then_in_order_diff() {
    let mut pipeline = Pipeline::new(BotConfig::default());

    pipeline.snapshot(
        DepthSnapshot {
            last_update_id: 100,
            bids: vec![(dec!(2000), dec!(1))],
            asks: vec![(dec!(2001), dec!(1))],
        },
        T0,
    );

    let outcome = pipeline.diff(
        DepthDiff {
            first_update_id: 101,
            final_update_id: 103,
            bids: vec![(dec!(2000), dec!(2))],
            asks: vec![],
        },
        T0 + 100,
    );

    assert!(matches!(outcome, DiffOutcome::Apply(_)));
    let book = pipeline.analyzer.book();
    assert_eq!(book.level(&dec!(2000)).unwrap().bid, dec!(2));
    assert_eq!(book.level(&dec!(2001)).unwrap().ask, dec!(1));
    assert_eq!(book.last_update_id, 103);
    assert_eq!(pipeline.sync.state(), SyncState::Synced);
    assert_eq!(pipeline.sync.stats().last_update_id, 103);
}

// S2: buffered diffs spanning the snapshot

#[test]
fn test_s2_buffered_diffs_span_snapshot() {
    let mut pipeline = Pipeline::new(BotConfig::default());

    // Diffs arrive while no snapshot exists yet
    assert_eq!(
        pipeline.diff(
            DepthDiff {
                first_update_id: 98,
                final_update_id: 99,
                bids: vec![(dec!(1990), dec!(5))],
                asks: vec![],
            },
            T0,
        ),
        DiffOutcome::Buffered
    );
    assert_eq!(
        pipeline.diff(
            DepthDiff {
                first_update_id: 100,
                final_update_id: 102,
                bids: vec![(dec!(1991), dec!(7))],
                asks: vec![],
            },
            T0 + 10,
        ),
        DiffOutcome::Buffered
    );
    assert_eq!(
        pipeline.diff(
            DepthDiff {
                first_update_id: 103,
                final_update_id: 104,
                bids: vec![],
                asks: vec![(dec!(2005), dec!(9))],
            },
            T0 + 20,
        ),
        DiffOutcome::Buffered
    );

    pipeline.snapshot(
        DepthSnapshot {
            last_update_id: 101,
            bids: vec![(dec!(2000), dec!(1))],
            asks: vec![(dec!(2001), dec!(1))],
        },
        T0 + 30,
    );

    // First buffered diff was stale and discarded, the other two applied
    let book = pipeline.analyzer.book();
    assert!(book.level(&dec!(1990)).is_none());
    assert_eq!(book.level(&dec!(1991)).unwrap().bid, dec!(7));
    assert_eq!(book.level(&dec!(2005)).unwrap().ask, dec!(9));
    assert_eq!(book.last_update_id, 104);
    assert!(pipeline.sync.is_synced());
    assert_eq!(pipeline.sync.stats().last_update_id, 104);
}

// S3: repeated gaps trigger a resync

#[test]
fn test_s3_gap_sequence_triggers_resync() {
    let mut pipeline = Pipeline::new(BotConfig::default());

    pipeline.snapshot(
        DepthSnapshot {
            last_update_id: 199,
            bids: vec![(dec!(2000), dec!(1))],
            asks: vec![(dec!(2001), dec!(1))],
        },
        T0,
    );
    assert!(matches!(
        pipeline.diff(
            DepthDiff {
                first_update_id: 200,
                final_update_id: 200,
                bids: vec![],
                asks: vec![],
            },
            T0 + 10,
        ),
        DiffOutcome::Apply(_)
    ));

    // Two tolerated gaps
    for (first, last) in [(205u64, 206u64), (210, 211)] {
        assert!(matches!(
            pipeline.diff(
                DepthDiff {
                    first_update_id: first,
                    final_update_id: last,
                    bids: vec![],
                    asks: vec![],
                },
                T0 + 20,
            ),
            DiffOutcome::Apply(_)
        ));
    }
    assert_eq!(pipeline.sync.stats().desync_count, 2);

    // Third gap forces re-snapshot
    assert_eq!(
        pipeline.diff(
            DepthDiff {
                first_update_id: 214,
                final_update_id: 215,
                bids: vec![],
                asks: vec![],
            },
            T0 + 30,
        ),
        DiffOutcome::ResyncRequired
    );
    assert!(!pipeline.sync.is_synced());
    assert!(!pipeline.analyzer.is_synced());

    // Fresh snapshot rebuilds the book and re-anchors the chain
    pipeline.snapshot(
        DepthSnapshot {
            last_update_id: 300,
            bids: vec![(dec!(1980), dec!(1))],
            asks: vec![(dec!(1981), dec!(1))],
        },
        T0 + 40,
    );
    assert!(matches!(
        pipeline.diff(
            DepthDiff {
                first_update_id: 301,
                final_update_id: 301,
                bids: vec![],
                asks: vec![],
            },
            T0 + 50,
        ),
        DiffOutcome::Apply(_)
    ));
    assert!(pipeline.sync.is_synced());
    let book = pipeline.analyzer.book();
    assert!(book.level(&dec!(2000)).is_none());
    assert_eq!(book.level(&dec!(1980)).unwrap().bid, dec!(1));
}

// S4: confirmed down-sweep produces a BUY

#[test]
fn test_s4_confirmed_down_sweep_buy() {
    let mut pipeline = Pipeline::new(sweep_config());
    pipeline.snapshot(sweep_book_snapshot(), T0);

    // Sell aggression into the bid stack: ~$120k notional, delta -60
    for i in 0..10 {
        let signal = pipeline.trade(
            dec!(1998),
            dec!(6),
            TradeSide::Sell,
            T0 + 100 + i * 50,
        );
        assert!(signal.is_none());
    }

    // The whole bid stack vanishes in one diff (~$60k notional);
    // this diff also bridges the snapshot, establishing sync
    assert!(matches!(
        pipeline.diff(bid_wipe_diff(), T0 + 600),
        DiffOutcome::Apply(_)
    ));
    assert!(pipeline.analyzer.is_synced());

    // A large buy flips normalized delta from -60 to +60
    let signal = pipeline
        .trade(dec!(1998), dec!(120), TradeSide::Buy, T0 + 650)
        .expect("BUY signal");

    assert_eq!(signal.signal_type, SignalType::Buy);
    assert_eq!(signal.confidence, 90);
    assert_eq!(signal.pattern, SignalPattern::Sweep);
    assert_eq!(signal.sweep_levels, 5);
    assert_eq!(signal.price, dec!(1998));
    assert!(signal.reasons.iter().any(|r| r.contains("sweep")));
    assert!(signal.reasons.iter().any(|r| r.contains("delta flip")));
    assert!(signal.reasons.iter().any(|r| r.contains("absorption")));
}

// S5: same removal without in-zone trades emits nothing

#[test]
fn test_s5_sweep_rejected_without_confirmation() {
    let mut pipeline = Pipeline::new(sweep_config());
    pipeline.snapshot(sweep_book_snapshot(), T0);

    // Sells happen far away from the swept zone
    for i in 0..10 {
        pipeline.trade(dec!(2005), dec!(6), TradeSide::Sell, T0 + 100 + i * 50);
    }

    assert!(matches!(
        pipeline.diff(bid_wipe_diff(), T0 + 600),
        DiffOutcome::Apply(_)
    ));

    let signal = pipeline.trade(dec!(1998), dec!(120), TradeSide::Buy, T0 + 650);
    assert!(signal.is_none());
    assert!(pipeline.analyzer.detect_sweep(T0 + 650).is_none());
}

// S6: extreme volatility suppresses signals

#[test]
fn test_s6_extreme_volatility_suppresses_signal() {
    let mut pipeline = Pipeline::new(sweep_config());
    pipeline.snapshot(sweep_book_snapshot(), T0);
    assert!(matches!(
        pipeline.diff(
            DepthDiff {
                first_update_id: 101,
                final_update_id: 101,
                bids: vec![],
                asks: vec![],
            },
            T0 + 10,
        ),
        DiffOutcome::Apply(_)
    ));

    // Whipsaw tape: ~0.2% per-trade moves push the ATR proxy into extreme
    for i in 0..22 {
        let price = if i % 2 == 0 { dec!(1998) } else { dec!(2002) };
        pipeline.trade(price, dec!(0.1), TradeSide::Buy, T0 + 100 + i * 10);
    }
    assert_eq!(pipeline.analyzer.volatility(), VolatilityRegime::Extreme);

    let before = pipeline.signals.statistics().signals_filtered;
    let signal = pipeline.trade(dec!(1998), dec!(0.1), TradeSide::Sell, T0 + 400);
    assert!(signal.is_none());

    let stats = pipeline.signals.statistics();
    assert!(stats.signals_filtered > before);
    assert!(stats.filter_reasons[&FilterReason::ExtremeVolatility] > 0);
    assert_eq!(stats.total_signals, 0);
}

// Cooldown holds across the full pipeline

#[test]
fn test_no_two_signals_within_cooldown() {
    let mut pipeline = Pipeline::new(sweep_config());
    pipeline.snapshot(sweep_book_snapshot(), T0);

    for i in 0..10 {
        pipeline.trade(dec!(1998), dec!(6), TradeSide::Sell, T0 + 100 + i * 50);
    }
    pipeline.diff(bid_wipe_diff(), T0 + 600);
    let first = pipeline.trade(dec!(1998), dec!(120), TradeSide::Buy, T0 + 650);
    assert!(first.is_some());

    // Re-arm the same conditions a second later: cooldown must hold
    for i in 0..10 {
        pipeline.trade(dec!(1998), dec!(6), TradeSide::Sell, T0 + 700 + i * 10);
    }
    let second = pipeline.trade(dec!(1998), dec!(240), TradeSide::Buy, T0 + 900);
    assert!(second.is_none());

    // Every emitted signal respects the confidence bounds
    for signal in pipeline.signals.history() {
        assert!(signal.confidence >= 60 && signal.confidence <= 100);
    }
}
