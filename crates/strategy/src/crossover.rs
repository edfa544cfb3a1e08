//! Moving-average crossover gated by book imbalance
//!
//! Best bid and best ask are tracked separately. Entries need the short
//! average to cross the long one on the side being taken and the resting
//! volume to lean the same way; exits only need the averages to turn.
//!
//! ```text
//!   flat,  ask short MA > ask long MA, imbalance >  θ ──► buy at best ask
//!   flat,  bid short MA < bid long MA, imbalance < -θ ──► sell at best bid
//!   long,  bid short MA < bid long MA ──► sell the position at best bid
//!   short, ask short MA > ask long MA ──► buy the position at best ask
//! ```

use log::{debug, info};
use meridian_core::{InstrumentId, Order, Quantity};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::history::PriceHistory;
use crate::orderbook::BookView;
use crate::sizer;
use crate::strategy::{Strategy, TickContext};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossoverConfig {
    pub instrument_id: InstrumentId,
    #[serde(default = "default_short_window")]
    pub short_window: usize,
    #[serde(default = "default_long_window")]
    pub long_window: usize,
    /// Book levels per side counted in the imbalance
    #[serde(default = "default_imbalance_levels")]
    pub imbalance_levels: usize,
    /// Entry needs |imbalance| strictly above this
    #[serde(default = "default_imbalance_threshold")]
    pub imbalance_threshold: Decimal,
    /// Size of an opening order
    #[serde(default = "default_order_size")]
    pub order_size: Quantity,
}

fn default_short_window() -> usize {
    5
}

fn default_long_window() -> usize {
    25
}

fn default_imbalance_levels() -> usize {
    3
}

fn default_imbalance_threshold() -> Decimal {
    dec!(0.9)
}

fn default_order_size() -> Quantity {
    1
}

impl CrossoverConfig {
    pub fn new(instrument_id: impl Into<InstrumentId>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            short_window: default_short_window(),
            long_window: default_long_window(),
            imbalance_levels: default_imbalance_levels(),
            imbalance_threshold: default_imbalance_threshold(),
            order_size: default_order_size(),
        }
    }

    pub fn with_windows(mut self, short: usize, long: usize) -> Self {
        self.short_window = short;
        self.long_window = long;
        self
    }

    pub fn with_imbalance(mut self, levels: usize, threshold: Decimal) -> Self {
        self.imbalance_levels = levels;
        self.imbalance_threshold = threshold;
        self
    }

    pub fn with_order_size(mut self, size: Quantity) -> Self {
        self.order_size = size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.short_window == 0 {
            return Err(ConfigError::invalid("short_window", "must be positive"));
        }
        if self.long_window <= self.short_window {
            return Err(ConfigError::invalid(
                "long_window",
                format!(
                    "must exceed short_window {}, got {}",
                    self.short_window, self.long_window
                ),
            ));
        }
        if self.imbalance_levels == 0 {
            return Err(ConfigError::invalid("imbalance_levels", "must be positive"));
        }
        if self.imbalance_threshold.is_sign_negative() || self.imbalance_threshold >= Decimal::ONE {
            return Err(ConfigError::invalid(
                "imbalance_threshold",
                format!("must lie in [0, 1), got {}", self.imbalance_threshold),
            ));
        }
        if self.order_size <= 0 {
            return Err(ConfigError::invalid(
                "order_size",
                format!("must be positive, got {}", self.order_size),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovingAverages {
    pub bid_short: Decimal,
    pub bid_long: Decimal,
    pub ask_short: Decimal,
    pub ask_long: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossoverTrader {
    config: CrossoverConfig,
    bids: PriceHistory,
    asks: PriceHistory,
}

impl CrossoverTrader {
    pub fn new(config: CrossoverConfig) -> Self {
        Self {
            bids: PriceHistory::new(config.long_window),
            asks: PriceHistory::new(config.long_window),
            config,
        }
    }

    pub fn config(&self) -> &CrossoverConfig {
        &self.config
    }

    pub fn bid_history(&self) -> &PriceHistory {
        &self.bids
    }

    pub fn ask_history(&self) -> &PriceHistory {
        &self.asks
    }

    /// Both averages on both sides, once the long window has filled
    pub fn averages(&self) -> Option<MovingAverages> {
        Some(MovingAverages {
            bid_short: self.bids.recent_mean(self.config.short_window)?,
            bid_long: self.bids.recent_mean(self.config.long_window)?,
            ask_short: self.asks.recent_mean(self.config.short_window)?,
            ask_long: self.asks.recent_mean(self.config.long_window)?,
        })
    }
}

impl Strategy for CrossoverTrader {
    fn name(&self) -> &str {
        self.config.instrument_id.as_str()
    }

    fn instruments(&self) -> Vec<InstrumentId> {
        vec![self.config.instrument_id.clone()]
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> Vec<Order> {
        let id = &self.config.instrument_id;
        let Some(book) = ctx.book(id) else {
            return Vec::new();
        };
        let view = BookView::new(book);
        let (Some((bid, bid_volume)), Some((ask, ask_volume))) = (view.best_bid(), view.best_ask())
        else {
            debug!("[Crossover] {} one-sided book, skipping", id);
            return Vec::new();
        };
        self.bids.push(bid);
        self.asks.push(ask);

        let Some(ma) = self.averages() else {
            return Vec::new();
        };
        let imbalance = view.imbalance(self.config.imbalance_levels).unwrap_or(Decimal::ZERO);
        let threshold = self.config.imbalance_threshold;
        let position = ctx.position(id);

        let (price, desired) = if position > 0 && ma.bid_short < ma.bid_long {
            info!("[Crossover] {} bid averages turned down, closing long {}", id, position);
            (bid, -position.min(bid_volume))
        } else if position < 0 && ma.ask_short > ma.ask_long {
            info!("[Crossover] {} ask averages turned up, closing short {}", id, position);
            (ask, position.abs().min(ask_volume))
        } else if position == 0 && ma.ask_short > ma.ask_long && imbalance > threshold {
            info!("[Crossover] {} long signal, imbalance {}", id, imbalance);
            (ask, self.config.order_size.min(ask_volume))
        } else if position == 0 && ma.bid_short < ma.bid_long && imbalance < -threshold {
            info!("[Crossover] {} short signal, imbalance {}", id, imbalance);
            (bid, -self.config.order_size.min(bid_volume))
        } else {
            return Vec::new();
        };

        let mut orders = Vec::new();
        let quantity = ctx.ledger.clamp(id, desired);
        if quantity != 0 {
            let order = Order {
                instrument_id: id.clone(),
                price,
                quantity,
            };
            sizer::commit(ctx.ledger, order, &mut orders);
        }
        orders
    }
}
