//! Replay Session - drive a trader over a sequence of snapshots
//!
//! Stands in for the harness: overwrites each snapshot's positions with the
//! session's own inventory, carries the state blob, fills emitted orders
//! against the snapshot's resting levels and applies conversion requests.

use std::collections::BTreeMap;

use log::{debug, error, info, warn};
use meridian_core::{InstrumentId, MarketSnapshot, Order, OrderBookSnapshot, Quantity};
use meridian_strategy::StrategyConfig;
use serde::{Deserialize, Serialize};

use crate::feed::SyntheticFeed;
use crate::trader::{TickOutput, Trader};

/// Replay results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub ticks: u64,
    /// Orders emitted
    pub orders: u64,
    /// Orders that traded at least one unit
    pub fills: u64,
    pub filled_volume: Quantity,
    /// Net units converted
    pub conversions: Quantity,
    /// Inventory after the last tick
    pub positions: BTreeMap<InstrumentId, Quantity>,
    pub max_abs_position: BTreeMap<InstrumentId, Quantity>,
    /// Ticks on which emitted orders could have pushed an instrument past
    /// its limit
    pub limit_breaches: u64,
}

pub struct ReplaySession {
    trader: Trader,
    trader_data: String,
    positions: BTreeMap<InstrumentId, Quantity>,
    /// Instrument conversion requests apply to
    convertible: Option<InstrumentId>,
    summary: ReplaySummary,
}

impl ReplaySession {
    pub fn new(trader: Trader) -> Self {
        let convertible = trader.config().strategies.iter().find_map(|s| match s {
            StrategyConfig::Conversion(c) => Some(c.instrument_id.clone()),
            _ => None,
        });
        Self {
            trader,
            trader_data: String::new(),
            positions: BTreeMap::new(),
            convertible,
            summary: ReplaySummary::default(),
        }
    }

    pub fn trader(&self) -> &Trader {
        &self.trader
    }

    pub fn trader_data(&self) -> &str {
        &self.trader_data
    }

    pub fn positions(&self) -> &BTreeMap<InstrumentId, Quantity> {
        &self.positions
    }

    pub fn summary(&self) -> &ReplaySummary {
        &self.summary
    }

    /// One tick: decide, check limits, fill, convert
    pub fn step(&mut self, mut snapshot: MarketSnapshot) -> TickOutput {
        snapshot.positions = self.positions.clone();
        let output = self.trader.run(&snapshot, &self.trader_data);
        self.trader_data = output.trader_data.clone();

        self.summary.ticks += 1;
        self.check_limits(&output);

        for (instrument_id, orders) in &output.orders {
            self.summary.orders += orders.len() as u64;
            let Some(book) = snapshot.order_depths.get(instrument_id) else {
                warn!("[Replay] orders for {} without a book", instrument_id);
                continue;
            };
            let mut book = book.clone();
            for order in orders {
                let filled = fill(&mut book, order);
                if filled != 0 {
                    self.summary.fills += 1;
                    self.summary.filled_volume += filled.abs();
                    *self.positions.entry(instrument_id.clone()).or_default() += filled;
                    debug!("[Replay] filled {} of {}", filled, order);
                }
            }
        }

        if output.conversions != 0 {
            match &self.convertible {
                Some(id) => {
                    *self.positions.entry(id.clone()).or_default() += output.conversions;
                    self.summary.conversions += output.conversions;
                }
                None => warn!(
                    "[Replay] conversion of {} requested with no convertible instrument",
                    output.conversions
                ),
            }
        }

        for (id, position) in &self.positions {
            let max = self.summary.max_abs_position.entry(id.clone()).or_default();
            *max = (*max).max(position.abs());
        }
        self.summary.positions = self.positions.clone();
        output
    }

    /// Replay `ticks` snapshots from `feed`
    pub fn run(&mut self, feed: &mut SyntheticFeed, ticks: usize) -> &ReplaySummary {
        for _ in 0..ticks {
            let snapshot = feed.next_snapshot();
            self.step(snapshot);
        }
        info!(
            "[Replay] {} ticks, {} orders, {} fills, {} breaches",
            self.summary.ticks, self.summary.orders, self.summary.fills, self.summary.limit_breaches
        );
        &self.summary
    }

    /// Flag the tick if any instrument could leave its limit once orders
    /// fill and the conversion request is applied
    fn check_limits(&mut self, output: &TickOutput) {
        let mut instruments: Vec<&InstrumentId> = output.orders.keys().collect();
        if output.conversions != 0
            && let Some(id) = &self.convertible
            && !output.orders.contains_key(id)
        {
            instruments.push(id);
        }

        let mut breached = false;
        for id in instruments {
            let orders = output.orders.get(id).map(Vec::as_slice).unwrap_or(&[]);
            let converted = if self.convertible.as_ref() == Some(id) {
                output.conversions
            } else {
                0
            };
            let position = self.positions.get(id).copied().unwrap_or(0);
            let limit = self.trader.config().limit_for(id);
            let buys: Quantity = orders.iter().filter(|o| o.is_buy()).map(Order::size).sum();
            let sells: Quantity = orders.iter().filter(|o| o.is_sell()).map(Order::size).sum();
            let highest = position + buys + converted.max(0);
            let lowest = position - sells + converted.min(0);
            if highest > limit || lowest < -limit {
                error!(
                    "[Replay] {} limit {} breached: position {} buys {} sells {} converted {}",
                    id, limit, position, buys, sells, converted
                );
                breached = true;
            }
        }
        if breached {
            self.summary.limit_breaches += 1;
        }
    }
}

/// Match an order against resting levels at or through its price
///
/// Consumes the matched volume from `book` so later orders in the same tick
/// cannot trade it again. Returns the signed filled quantity.
fn fill(book: &mut OrderBookSnapshot, order: &Order) -> Quantity {
    let mut left = order.size();
    let mut filled = 0;

    if order.is_buy() {
        for (price, volume) in book.sell_orders.iter_mut() {
            if left == 0 || *price > order.price {
                break;
            }
            let traded = left.min(*volume);
            *volume -= traded;
            left -= traded;
            filled += traded;
        }
        book.sell_orders.retain(|_, v| *v > 0);
    } else {
        for (price, volume) in book.buy_orders.iter_mut().rev() {
            if left == 0 || *price < order.price {
                break;
            }
            let traded = left.min(*volume);
            *volume -= traded;
            left -= traded;
            filled += traded;
        }
        book.buy_orders.retain(|_, v| *v > 0);
        filled = -filled;
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use meridian_core::ConversionObservation;
    use meridian_strategy::{ConversionConfig, EstimatorConfig, InstrumentConfig, RollingStatsConfig};
    use rust_decimal_macros::dec;

    fn book() -> OrderBookSnapshot {
        OrderBookSnapshot::from_levels(
            &[(dec!(99), 4), (dec!(98), 6)],
            &[(dec!(101), 3), (dec!(102), 5)],
        )
    }

    #[test]
    fn test_fill_buy_walks_asks() {
        let mut book = book();
        assert_eq!(fill(&mut book, &Order::buy("X", dec!(102), 6)), 6);
        assert_eq!(book.sell_orders.get(&dec!(102)), Some(&2));
        assert!(!book.sell_orders.contains_key(&dec!(101)));
    }

    #[test]
    fn test_fill_respects_limit_price() {
        let mut book = book();
        assert_eq!(fill(&mut book, &Order::buy("X", dec!(101), 10)), 3);
        assert_eq!(fill(&mut book, &Order::buy("X", dec!(100), 10)), 0);
    }

    #[test]
    fn test_fill_sell_walks_bids() {
        let mut book = book();
        assert_eq!(fill(&mut book, &Order::sell("X", dec!(98), 7)), -7);
        assert_eq!(book.buy_orders.get(&dec!(98)), Some(&3));
    }

    #[test]
    fn test_step_fills_and_tracks_positions() {
        let _ = env_logger::try_init();

        let config = EngineConfig::default().with_strategy(StrategyConfig::Instrument(
            InstrumentConfig::new("AMETHYSTS").with_estimator(EstimatorConfig::RollingStats(
                RollingStatsConfig::default().with_window(3),
            )),
        ));
        let mut session = ReplaySession::new(Trader::new(config).unwrap());

        let flat = OrderBookSnapshot::from_levels(&[(dec!(9998), 10)], &[(dec!(10002), 10)]);
        for t in 0..3 {
            session.step(MarketSnapshot::new(t).with_book("AMETHYSTS", flat.clone()));
        }
        assert_eq!(session.summary().orders, 0);

        let cheap = OrderBookSnapshot::from_levels(&[(dec!(9989), 10)], &[(dec!(9990), 7)]);
        let output = session.step(MarketSnapshot::new(3).with_book("AMETHYSTS", cheap));

        assert_eq!(output.orders.len(), 1);
        assert_eq!(session.positions()[&InstrumentId::from("AMETHYSTS")], 7);
        assert_eq!(session.summary().fills, 1);
        assert_eq!(session.summary().limit_breaches, 0);
        assert_eq!(session.summary().max_abs_position[&InstrumentId::from("AMETHYSTS")], 7);
        assert!(!session.trader_data().is_empty());
    }

    fn orchid_session() -> ReplaySession {
        let config = EngineConfig::default()
            .with_limit("ORCHIDS", 100)
            .with_strategy(StrategyConfig::Conversion(
                ConversionConfig::new("ORCHIDS").with_max_conversion(10),
            ));
        ReplaySession::new(Trader::new(config).unwrap())
    }

    fn orchid_observation() -> ConversionObservation {
        ConversionObservation {
            bid_price: dec!(1100),
            ask_price: dec!(1102),
            transport_fees: dec!(1),
            export_tariff: dec!(2),
            import_tariff: dec!(-3),
            sunlight: 3000.0,
            humidity: 70.0,
        }
    }

    #[test]
    fn test_conversion_with_deep_cheap_ask_stays_within_limit() {
        let _ = env_logger::try_init();

        let mut session = orchid_session();
        session.positions.insert(InstrumentId::from("ORCHIDS"), -14);

        let book = OrderBookSnapshot::from_levels(&[(dec!(1088), 5)], &[(dec!(1090), 500)]);
        let output = session.step(
            MarketSnapshot::new(0)
                .with_book("ORCHIDS", book)
                .with_observation("ORCHIDS", orchid_observation()),
        );

        assert_eq!(output.conversions, 10);
        assert_eq!(session.positions()[&InstrumentId::from("ORCHIDS")], 100);
        assert_eq!(session.summary().max_abs_position[&InstrumentId::from("ORCHIDS")], 100);
        assert_eq!(session.summary().limit_breaches, 0);
    }

    #[test]
    fn test_check_limits_counts_conversions() {
        let mut session = orchid_session();
        session.positions.insert(InstrumentId::from("ORCHIDS"), -14);

        // Orders alone reach 100, the conversion pushes past it
        let mut output = TickOutput {
            conversions: 10,
            ..TickOutput::default()
        };
        output
            .orders
            .insert(InstrumentId::from("ORCHIDS"), vec![Order::buy("ORCHIDS", dec!(1090), 114)]);
        session.check_limits(&output);
        assert_eq!(session.summary().limit_breaches, 1);

        // A conversion with no orders is still checked
        session.positions.insert(InstrumentId::from("ORCHIDS"), 95);
        let output = TickOutput {
            conversions: 10,
            ..TickOutput::default()
        };
        session.check_limits(&output);
        assert_eq!(session.summary().limit_breaches, 2);
    }
}
