//! Integration test: strategies driven tick by tick
//!
//! Exercises the public API the way the engine does:
//! 1. Ledger synced from reported inventory
//! 2. Strategy runs against a shared TickContext
//! 3. Orders checked against limits and thresholds

use meridian_core::{InstrumentId, MarketSnapshot, Order, OrderBookSnapshot, Quantity};
use meridian_risk::PositionLedger;
use meridian_strategy::{
    Band, BookView, DirectionalConfig, DirectionalTrader, EstimateError, EstimatorConfig,
    ExecutionConfig, FairValueEstimator, InstrumentConfig, PositionPhase, RegressionConfig,
    RegressionEstimator, RollingStatsConfig, Strategy, StrategyConfig, StrategySlot, TickContext,
    TopOfBook, sizer,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

fn limits() -> BTreeMap<InstrumentId, Quantity> {
    [("AMETHYSTS", 20), ("STARFRUIT", 20)]
        .into_iter()
        .map(|(id, l)| (InstrumentId::from(id), l))
        .collect()
}

/// Run one tick for one slot with a fresh ledger, like the engine does
fn tick(slot: &mut StrategySlot, snapshot: &MarketSnapshot) -> (Vec<Order>, PositionLedger) {
    let mut ledger = PositionLedger::new(limits());
    ledger.sync(&snapshot.positions);
    let mut ctx = TickContext::new(snapshot, &mut ledger);
    let orders = slot.on_tick(&mut ctx);
    (orders, ledger)
}

fn top(bid: Decimal, bid_volume: Quantity, ask: Decimal, ask_volume: Quantity) -> TopOfBook {
    TopOfBook {
        best_bid: bid,
        best_bid_volume: bid_volume,
        best_ask: ask,
        best_ask_volume: ask_volume,
    }
}

/// Empty history: no band and nothing to trade
#[test]
fn test_empty_history_is_insufficient_data() {
    let _ = env_logger::try_init();

    let book = OrderBookSnapshot::from_levels(&[(dec!(9998), 5)], &[(dec!(10002), 5)]);
    let estimator = RegressionEstimator::new(RegressionConfig::default());
    assert!(matches!(
        estimator.estimate(),
        Err(EstimateError::InsufficientData { have: 0, .. })
    ));

    let mut slot = StrategySlot::from_config(StrategyConfig::Instrument(InstrumentConfig::new(
        "STARFRUIT",
    )));
    let snapshot = MarketSnapshot::new(0).with_book("STARFRUIT", book);
    let (orders, _) = tick(&mut slot, &snapshot);
    assert!(orders.is_empty());
}

/// Flat rolling window collapses the band; a bid through it opens a short
#[test]
fn test_flat_window_then_rich_bid_opens_short() {
    let config = InstrumentConfig::new("AMETHYSTS")
        .with_estimator(EstimatorConfig::RollingStats(
            RollingStatsConfig::default()
                .with_window(20)
                .with_multiplier(dec!(2)),
        ))
        .with_execution(ExecutionConfig::Directional(
            DirectionalConfig::default().with_per_trade_cap(20),
        ));
    let mut slot = StrategySlot::from_config(StrategyConfig::Instrument(config));

    let flat = OrderBookSnapshot::from_levels(&[(dec!(10000), 10)], &[(dec!(10000), 10)]);
    for t in 0..20 {
        let snapshot = MarketSnapshot::new(t * 100).with_book("AMETHYSTS", flat.clone());
        assert!(tick(&mut slot, &snapshot).0.is_empty());
    }

    let rich = OrderBookSnapshot::from_levels(&[(dec!(10001), 12)], &[(dec!(10003), 8)]);
    let snapshot = MarketSnapshot::new(2000).with_book("AMETHYSTS", rich);
    let (orders, _) = tick(&mut slot, &snapshot);

    assert_eq!(orders, vec![Order::sell("AMETHYSTS", dec!(10001), 12)]);
}

/// Buy opportunity larger than the remaining room is clamped
#[test]
fn test_buy_clamped_to_limit() {
    let book = OrderBookSnapshot::from_levels(&[], &[(dec!(4990), 10)]);
    let mut ledger = PositionLedger::new(limits());
    let mut reported = BTreeMap::new();
    reported.insert(InstrumentId::from("STARFRUIT"), 15);
    ledger.sync(&reported);

    let band = Band::around(dec!(5000), dec!(2));
    let orders = sizer::take_liquidity(
        &InstrumentId::from("STARFRUIT"),
        &BookView::new(&book),
        &band,
        &mut ledger,
    );

    assert_eq!(orders, vec![Order::buy("STARFRUIT", dec!(4990), 5)]);
}

/// Open, partially close twice, then finish, with fills reported in between
#[test]
fn test_directional_lifecycle_with_partial_closes() {
    let id = InstrumentId::from("AMETHYSTS");
    let band = Band::around(dec!(10000), dec!(0));
    let mut trader = DirectionalTrader::new(DirectionalConfig::default().with_per_trade_cap(10));

    let run = |trader: &mut DirectionalTrader, reported: Quantity, top: TopOfBook| {
        let mut ledger = PositionLedger::new(limits());
        let mut positions = BTreeMap::new();
        positions.insert(id.clone(), reported);
        ledger.sync(&positions);
        trader.on_tick(&id, Some(&band), &top, &mut ledger)
    };

    let orders = run(&mut trader, 0, top(dec!(10001), 15, dec!(10003), 5));
    assert_eq!(orders, vec![Order::sell("AMETHYSTS", dec!(10001), 10)]);
    assert_eq!(trader.state().phase(), PositionPhase::Opening);

    let orders = run(&mut trader, -10, top(dec!(9997), 5, dec!(9999), 3));
    assert_eq!(orders, vec![Order::buy("AMETHYSTS", dec!(9999), 3)]);
    assert_eq!(trader.state().phase(), PositionPhase::PartiallyClosing);
    assert_eq!(trader.state().remaining(), 7);

    let orders = run(&mut trader, -7, top(dec!(10001), 5, dec!(10002), 3));
    assert_eq!(orders, vec![Order::buy("AMETHYSTS", dec!(10002), 3)]);
    assert_eq!(trader.state().phase(), PositionPhase::PartiallyClosing);
    assert_eq!(trader.state().remaining(), 4);

    let orders = run(&mut trader, -4, top(dec!(9997), 5, dec!(9999), 10));
    assert_eq!(orders, vec![Order::buy("AMETHYSTS", dec!(9999), 4)]);
    assert!(trader.state().is_flat());

    let orders = run(&mut trader, 0, top(dec!(9999), 5, dec!(10001), 5));
    assert!(orders.is_empty());
    assert!(trader.state().is_flat());
}

/// Fill reported short of what was closed: external inventory wins
#[test]
fn test_partial_fill_resyncs_remaining() {
    let id = InstrumentId::from("AMETHYSTS");
    let band = Band::around(dec!(10000), dec!(0));
    let mut trader = DirectionalTrader::new(DirectionalConfig::default());
    trader
        .state_mut()
        .open(meridian_core::PositionSide::Long, 8, dec!(9998))
        .unwrap();

    // Only 5 of the 8 filled
    let mut ledger = PositionLedger::new(limits());
    let mut positions = BTreeMap::new();
    positions.insert(id.clone(), 5);
    ledger.sync(&positions);

    let orders = trader.on_tick(&id, Some(&band), &top(dec!(10000), 20, dec!(10002), 5), &mut ledger);
    assert_eq!(orders, vec![Order::sell("AMETHYSTS", dec!(10000), 5)]);
    assert!(trader.state().is_flat());
}

/// Many ticks of shifting books: thresholds and limits always honoured
#[test]
fn test_liquidity_taking_invariants_over_many_books() {
    let id = InstrumentId::from("STARFRUIT");
    let mut position: Quantity = 0;

    for i in 0..200i64 {
        let shift = Decimal::from((i * 7) % 11 - 5);
        let book = OrderBookSnapshot::from_levels(
            &[
                (dec!(5000) + shift, 1 + (i % 9)),
                (dec!(4999) + shift, 2 + (i % 5)),
                (dec!(4997) + shift, 10),
            ],
            &[
                (dec!(5002) + shift, 1 + (i % 7)),
                (dec!(5003) + shift, 3 + (i % 4)),
                (dec!(5006) + shift, 10),
            ],
        );
        let band = Band::around(dec!(5001), Decimal::from(i % 3));

        let mut ledger = PositionLedger::new(limits());
        let mut reported = BTreeMap::new();
        reported.insert(id.clone(), position);
        ledger.sync(&reported);

        let orders = sizer::take_liquidity(&id, &BookView::new(&book), &band, &mut ledger);

        let buys: Quantity = orders.iter().filter(|o| o.is_buy()).map(|o| o.size()).sum();
        let sells: Quantity = orders.iter().filter(|o| o.is_sell()).map(|o| o.size()).sum();
        assert!(position + buys <= 20, "tick {}: {} + {}", i, position, buys);
        assert!(position - sells >= -20, "tick {}: {} - {}", i, position, sells);
        for order in &orders {
            assert_ne!(order.quantity, 0);
            if order.is_buy() {
                assert!(order.price <= band.lower);
            } else {
                assert!(order.price >= band.upper);
            }
        }

        // Pretend everything filled
        position += buys - sells;
    }
}
