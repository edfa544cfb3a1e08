//! Synthetic Feed - seeded market snapshots for replay
//!
//! Every instrument follows an integer random walk around which a layered
//! book is drawn. Now and then one side is dislocated through fair value so
//! that the strategies have something to take. Convertible instruments also
//! get a foreign-venue observation.

use std::collections::{BTreeMap, BTreeSet};

use meridian_core::{
    ConversionObservation, InstrumentId, MarketSnapshot, OrderBookSnapshot, Price, Quantity, TICK,
    Timestamp,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Price used for instruments added without a starting price
const DEFAULT_PRICE: Decimal = dec!(10000);

/// Configuration for synthetic snapshot generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Starting fair value per instrument
    pub initial_prices: BTreeMap<InstrumentId, Price>,
    /// Largest fair-value move per tick, in ticks
    pub max_step: i64,
    /// Distance from fair value to the touch on each side
    pub half_spread: Price,
    /// Resting levels per side
    pub levels: usize,
    pub max_volume: Quantity,
    /// Chance per instrument and tick of a level priced through fair value
    pub dislocation_probability: f64,
    /// Instruments that get a conversion observation
    pub observed: BTreeSet<InstrumentId>,
    pub tick_interval: Timestamp,
}

impl Default for FeedConfig {
    fn default() -> Self {
        let initial_prices = [
            ("AMETHYSTS", dec!(10000)),
            ("STARFRUIT", dec!(5000)),
            ("ORCHIDS", dec!(1100)),
            ("CHOCOLATE", dec!(7900)),
            ("STRAWBERRIES", dec!(4000)),
            ("ROSES", dec!(14400)),
            ("GIFT_BASKET", dec!(70380)),
        ]
        .into_iter()
        .map(|(id, price)| (InstrumentId::from(id), price))
        .collect();

        Self {
            initial_prices,
            max_step: 2,
            half_spread: dec!(2),
            levels: 3,
            max_volume: 20,
            dislocation_probability: 0.1,
            observed: [InstrumentId::from("ORCHIDS")].into_iter().collect(),
            tick_interval: 100,
        }
    }
}

impl FeedConfig {
    /// Make sure every instrument in `instruments` has a starting price
    pub fn covering(mut self, instruments: impl IntoIterator<Item = InstrumentId>) -> Self {
        for id in instruments {
            self.initial_prices.entry(id).or_insert(DEFAULT_PRICE);
        }
        self
    }

    pub fn with_price(mut self, instrument_id: impl Into<InstrumentId>, price: Price) -> Self {
        self.initial_prices.insert(instrument_id.into(), price);
        self
    }

    pub fn with_dislocation_probability(mut self, probability: f64) -> Self {
        self.dislocation_probability = probability;
        self
    }
}

/// Generates one snapshot per call
pub struct SyntheticFeed {
    config: FeedConfig,
    fair_values: BTreeMap<InstrumentId, Price>,
    rng: StdRng,
    timestamp: Timestamp,
}

impl SyntheticFeed {
    pub fn new(config: FeedConfig) -> Self {
        Self::from_rng(config, StdRng::from_entropy())
    }

    /// Create with a specific seed for reproducible replays
    pub fn with_seed(config: FeedConfig, seed: u64) -> Self {
        Self::from_rng(config, StdRng::seed_from_u64(seed))
    }

    fn from_rng(config: FeedConfig, rng: StdRng) -> Self {
        Self {
            fair_values: config.initial_prices.clone(),
            config,
            rng,
            timestamp: 0,
        }
    }

    pub fn fair_value(&self, instrument_id: &InstrumentId) -> Option<Price> {
        self.fair_values.get(instrument_id).copied()
    }

    /// Advance every instrument one step and draw the snapshot
    pub fn next_snapshot(&mut self) -> MarketSnapshot {
        let mut snapshot = MarketSnapshot::new(self.timestamp);
        self.timestamp += self.config.tick_interval;

        let max_step = self.config.max_step.abs();
        let ids: Vec<InstrumentId> = self.fair_values.keys().cloned().collect();
        for id in ids {
            let step = self.rng.gen_range(-max_step..=max_step);
            let fair = self.fair_values.get(&id).copied().unwrap_or(DEFAULT_PRICE);
            let fair = (fair + Decimal::from(step)).max(self.config.half_spread + dec!(10));
            self.fair_values.insert(id.clone(), fair);

            let book = self.book(fair);
            snapshot.order_depths.insert(id.clone(), book);
            if self.config.observed.contains(&id) {
                let observation = self.observation(fair);
                snapshot.observations.insert(id, observation);
            }
        }
        snapshot
    }

    fn book(&mut self, fair: Price) -> OrderBookSnapshot {
        let mut book = OrderBookSnapshot::new();
        let max_volume = self.config.max_volume.max(1);
        for level in 0..self.config.levels {
            let offset = self.config.half_spread + Decimal::from(level);
            book.insert_bid(fair - offset, self.rng.gen_range(1..=max_volume));
            book.insert_ask(fair + offset, self.rng.gen_range(1..=max_volume));
        }

        if self.rng.gen_bool(self.config.dislocation_probability.clamp(0.0, 1.0)) {
            let through = Decimal::from(self.rng.gen_range(1..=3));
            let volume = self.rng.gen_range(1..=max_volume);
            if self.rng.gen_bool(0.5) {
                book.insert_ask(fair - through, volume);
            } else {
                book.insert_bid(fair + through, volume);
            }
        }
        book
    }

    fn observation(&mut self, fair: Price) -> ConversionObservation {
        let foreign_mid = fair + Decimal::from(self.rng.gen_range(-3..=3));
        ConversionObservation {
            bid_price: foreign_mid - TICK,
            ask_price: foreign_mid + TICK,
            transport_fees: dec!(1),
            export_tariff: dec!(1),
            import_tariff: dec!(-2),
            sunlight: self.rng.gen_range(1800.0..3200.0),
            humidity: self.rng.gen_range(55.0..90.0),
        }
    }
}
