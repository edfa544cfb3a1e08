use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::values::{Price, Quantity};

/// Resting liquidity for one instrument at one tick
///
/// Both maps store positive volumes. Bids are read best-first by iterating
/// in reverse, asks by iterating forward. Harness input that reports sell
/// volumes as negative numbers is normalised on the way in, and empty
/// levels are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawOrderBook")]
pub struct OrderBookSnapshot {
    pub buy_orders: BTreeMap<Price, Quantity>,
    pub sell_orders: BTreeMap<Price, Quantity>,
}

#[derive(Deserialize)]
struct RawOrderBook {
    #[serde(default)]
    buy_orders: BTreeMap<Price, Quantity>,
    #[serde(default)]
    sell_orders: BTreeMap<Price, Quantity>,
}

impl From<RawOrderBook> for OrderBookSnapshot {
    fn from(raw: RawOrderBook) -> Self {
        let mut book = OrderBookSnapshot::new();
        for (price, volume) in raw.buy_orders {
            book.insert_bid(price, volume);
        }
        for (price, volume) in raw.sell_orders {
            book.insert_ask(price, volume);
        }
        book
    }
}

impl OrderBookSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(price, volume)` level lists
    pub fn from_levels(bids: &[(Price, Quantity)], asks: &[(Price, Quantity)]) -> Self {
        let mut book = Self::new();
        for &(price, volume) in bids {
            book.insert_bid(price, volume);
        }
        for &(price, volume) in asks {
            book.insert_ask(price, volume);
        }
        book
    }

    /// Builder-style bid insert
    pub fn with_bid(mut self, price: Price, volume: Quantity) -> Self {
        self.insert_bid(price, volume);
        self
    }

    /// Builder-style ask insert
    pub fn with_ask(mut self, price: Price, volume: Quantity) -> Self {
        self.insert_ask(price, volume);
        self
    }

    /// Add volume at a bid level
    pub fn insert_bid(&mut self, price: Price, volume: Quantity) {
        Self::insert_level(&mut self.buy_orders, price, volume);
    }

    /// Add volume at an ask level
    pub fn insert_ask(&mut self, price: Price, volume: Quantity) {
        Self::insert_level(&mut self.sell_orders, price, volume);
    }

    fn insert_level(side: &mut BTreeMap<Price, Quantity>, price: Price, volume: Quantity) {
        let volume = volume.saturating_abs();
        if volume == 0 {
            return;
        }
        let level = side.entry(price).or_insert(0);
        *level = level.saturating_add(volume);
    }

    pub fn is_empty(&self) -> bool {
        self.buy_orders.is_empty() && self.sell_orders.is_empty()
    }
}
