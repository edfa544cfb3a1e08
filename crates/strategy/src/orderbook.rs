//! Order Book View
//!
//! Read-only accessors over a tick's `OrderBookSnapshot`. Nothing here
//! fails: an empty side is reported either as `None` or, through
//! [`TopOfBook`], as a sentinel price that disables that trade direction.

use meridian_core::{OrderBookSnapshot, Price, Quantity};
use rust_decimal::Decimal;

/// Bid price reported when no bids rest in the book
pub const NO_BID: Price = Decimal::ZERO;

/// Ask price reported when no asks rest in the book
pub const NO_ASK: Price = Decimal::MAX;

/// Best prices and volumes with sentinel values for empty sides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopOfBook {
    pub best_bid: Price,
    pub best_bid_volume: Quantity,
    pub best_ask: Price,
    pub best_ask_volume: Quantity,
}

impl TopOfBook {
    pub fn has_bid(&self) -> bool {
        self.best_bid != NO_BID && self.best_bid_volume > 0
    }

    pub fn has_ask(&self) -> bool {
        self.best_ask != NO_ASK && self.best_ask_volume > 0
    }

    pub fn is_two_sided(&self) -> bool {
        self.has_bid() && self.has_ask()
    }

    pub fn mid_price(&self) -> Option<Price> {
        self.is_two_sided()
            .then(|| (self.best_bid + self.best_ask) / Decimal::TWO)
    }
}

/// Borrowed view over one instrument's book
#[derive(Debug, Clone, Copy)]
pub struct BookView<'a> {
    book: &'a OrderBookSnapshot,
}

impl<'a> BookView<'a> {
    pub fn new(book: &'a OrderBookSnapshot) -> Self {
        Self { book }
    }

    // === Price Queries ===

    /// Get best bid price and volume
    pub fn best_bid(&self) -> Option<(Price, Quantity)> {
        self.bids().next()
    }

    /// Get best ask price and volume
    pub fn best_ask(&self) -> Option<(Price, Quantity)> {
        self.asks().next()
    }

    /// Second bid level, if the book is that deep
    pub fn second_bid(&self) -> Option<(Price, Quantity)> {
        self.bids().nth(1)
    }

    /// Second ask level, if the book is that deep
    pub fn second_ask(&self) -> Option<(Price, Quantity)> {
        self.asks().nth(1)
    }

    /// Best levels with sentinels (0 bid, `Decimal::MAX` ask) for empty sides
    pub fn top_of_book(&self) -> TopOfBook {
        let (best_bid, best_bid_volume) = self.best_bid().unwrap_or((NO_BID, 0));
        let (best_ask, best_ask_volume) = self.best_ask().unwrap_or((NO_ASK, 0));
        TopOfBook {
            best_bid,
            best_bid_volume,
            best_ask,
            best_ask_volume,
        }
    }

    /// Get mid price (average of best bid and ask)
    pub fn mid_price(&self) -> Option<Price> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Get spread (ask - bid); negative on a crossed book
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask - bid),
            _ => None,
        }
    }

    pub fn is_crossed(&self) -> bool {
        self.spread().is_some_and(|s| s <= Decimal::ZERO)
    }

    // === Level Queries ===

    /// Bid levels, highest price first
    pub fn bids(&self) -> impl Iterator<Item = (Price, Quantity)> + 'a {
        self.book.buy_orders.iter().rev().map(|(p, q)| (*p, *q))
    }

    /// Ask levels, lowest price first
    pub fn asks(&self) -> impl Iterator<Item = (Price, Quantity)> + 'a {
        self.book.sell_orders.iter().map(|(p, q)| (*p, *q))
    }

    /// Get total bid volume over the top `levels` levels
    pub fn total_bid_volume(&self, levels: usize) -> Quantity {
        self.bids().take(levels).map(|(_, q)| q).sum()
    }

    /// Get total ask volume over the top `levels` levels
    pub fn total_ask_volume(&self, levels: usize) -> Quantity {
        self.asks().take(levels).map(|(_, q)| q).sum()
    }

    /// Imbalance ratio: (bid_vol - ask_vol) / (bid_vol + ask_vol)
    /// Returns value between -1 (all asks) and +1 (all bids)
    pub fn imbalance(&self, levels: usize) -> Option<Decimal> {
        let bid_volume = self.total_bid_volume(levels);
        let ask_volume = self.total_ask_volume(levels);
        let total = bid_volume + ask_volume;

        if total == 0 {
            None
        } else {
            Some(Decimal::from(bid_volume - ask_volume) / Decimal::from(total))
        }
    }
}
