//! Directional band trader
//!
//! Takes a position when the touch prints outside the fair-value band and
//! closes it once price comes back. Position bookkeeping lives in
//! [`PositionState`]; this module decides which transition to drive and
//! emits the matching order.

use log::{info, warn};
use meridian_core::{InstrumentId, Order, PositionSide, Price, Quantity};
use meridian_risk::PositionLedger;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::estimator::Band;
use crate::orderbook::TopOfBook;
use crate::position_state::{PositionPhase, PositionState};
use crate::sizer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalConfig {
    /// Largest size a single opening or adding order may carry
    pub per_trade_cap: Quantity,
    /// Keep adding while the entry signal persists
    pub allow_scale_in: bool,
    /// Let a closing order run through flat when the opposite signal holds
    pub allow_flip: bool,
}

impl Default for DirectionalConfig {
    fn default() -> Self {
        Self {
            per_trade_cap: 20,
            allow_scale_in: true,
            allow_flip: true,
        }
    }
}

impl DirectionalConfig {
    pub fn with_per_trade_cap(mut self, cap: Quantity) -> Self {
        self.per_trade_cap = cap;
        self
    }

    pub fn with_scale_in(mut self, allow: bool) -> Self {
        self.allow_scale_in = allow;
        self
    }

    pub fn with_flip(mut self, allow: bool) -> Self {
        self.allow_flip = allow;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.per_trade_cap <= 0 {
            return Err(ConfigError::invalid(
                "per_trade_cap",
                format!("must be positive, got {}", self.per_trade_cap),
            ));
        }
        Ok(())
    }
}

/// Price and volume available to trade against in one direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Opportunity {
    direction: PositionSide,
    price: Price,
    volume: Quantity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionalTrader {
    config: DirectionalConfig,
    state: PositionState,
}

impl DirectionalTrader {
    pub fn new(config: DirectionalConfig) -> Self {
        Self {
            config,
            state: PositionState::new(),
        }
    }

    pub fn config(&self) -> &DirectionalConfig {
        &self.config
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut PositionState {
        &mut self.state
    }

    /// Run one tick
    ///
    /// `band` is `None` when the estimator has nothing to say this tick; a
    /// partial close still proceeds in that case.
    pub fn on_tick(
        &mut self,
        instrument_id: &InstrumentId,
        band: Option<&Band>,
        top: &TopOfBook,
        ledger: &mut PositionLedger,
    ) -> Vec<Order> {
        self.state.resync(ledger.position(instrument_id));

        match (self.state.phase(), band) {
            (PositionPhase::PartiallyClosing, _) => self.unwind(instrument_id, top, ledger),
            (_, None) => Vec::new(),
            (PositionPhase::Flat, Some(band)) => self.try_open(instrument_id, band, top, ledger),
            (PositionPhase::Opening | PositionPhase::Open, Some(band)) => {
                if self.exit_signal(band, top) {
                    self.close(instrument_id, band, top, ledger)
                } else if self.config.allow_scale_in && self.state.phase() == PositionPhase::Open {
                    self.scale_in(instrument_id, band, top, ledger)
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Touch outside the band: a bid above `upper` sells, an ask below
    /// `lower` buys
    fn entry_signal(band: &Band, top: &TopOfBook) -> Option<Opportunity> {
        if top.has_bid() && top.best_bid > band.upper {
            Some(Opportunity {
                direction: PositionSide::Short,
                price: top.best_bid,
                volume: top.best_bid_volume,
            })
        } else if top.has_ask() && top.best_ask < band.lower {
            Some(Opportunity {
                direction: PositionSide::Long,
                price: top.best_ask,
                volume: top.best_ask_volume,
            })
        } else {
            None
        }
    }

    /// Price back at fair value, or better than the entry reference
    fn exit_signal(&self, band: &Band, top: &TopOfBook) -> bool {
        let entry = self.state.entry_price();
        match self.state.direction() {
            Some(PositionSide::Short) => {
                top.has_ask()
                    && (top.best_ask <= band.fair || entry.is_some_and(|e| top.best_ask < e))
            }
            Some(PositionSide::Long) => {
                top.has_bid()
                    && (top.best_bid >= band.fair || entry.is_some_and(|e| top.best_bid > e))
            }
            None => false,
        }
    }

    /// Liquidity that reduces the current position
    fn closing_liquidity(&self, top: &TopOfBook) -> Option<(Price, Quantity)> {
        match self.state.direction()? {
            PositionSide::Short => top.has_ask().then_some((top.best_ask, top.best_ask_volume)),
            PositionSide::Long => top.has_bid().then_some((top.best_bid, top.best_bid_volume)),
        }
    }

    fn try_open(
        &mut self,
        instrument_id: &InstrumentId,
        band: &Band,
        top: &TopOfBook,
        ledger: &mut PositionLedger,
    ) -> Vec<Order> {
        let Some(opportunity) = Self::entry_signal(band, top) else {
            return Vec::new();
        };
        let Some(order) = self.sized_order(instrument_id, opportunity, ledger) else {
            return Vec::new();
        };

        let mut orders = Vec::new();
        if sizer::commit(ledger, order.clone(), &mut orders) {
            info!(
                "[Directional] {} open {:?}: {} (band [{}, {}])",
                instrument_id, opportunity.direction, order, band.lower, band.upper
            );
            if let Err(e) = self
                .state
                .open(opportunity.direction, order.size(), order.price)
            {
                warn!("[Directional] {} state not updated: {}", instrument_id, e);
            }
        }
        orders
    }

    fn scale_in(
        &mut self,
        instrument_id: &InstrumentId,
        band: &Band,
        top: &TopOfBook,
        ledger: &mut PositionLedger,
    ) -> Vec<Order> {
        let Some(opportunity) = Self::entry_signal(band, top)
            .filter(|o| Some(o.direction) == self.state.direction())
        else {
            return Vec::new();
        };
        let Some(order) = self.sized_order(instrument_id, opportunity, ledger) else {
            return Vec::new();
        };

        let mut orders = Vec::new();
        if sizer::commit(ledger, order.clone(), &mut orders) {
            info!("[Directional] {} add: {}", instrument_id, order);
            if let Err(e) = self.state.add(order.size(), order.price) {
                warn!("[Directional] {} state not updated: {}", instrument_id, e);
            }
        }
        orders
    }

    /// Opening-side order capped by the per-trade cap and the ledger
    fn sized_order(
        &self,
        instrument_id: &InstrumentId,
        opportunity: Opportunity,
        ledger: &PositionLedger,
    ) -> Option<Order> {
        let desired = opportunity
            .direction
            .signed(opportunity.volume.min(self.config.per_trade_cap));
        let quantity = ledger.clamp(instrument_id, desired);
        (quantity != 0).then(|| Order {
            instrument_id: instrument_id.clone(),
            price: opportunity.price,
            quantity,
        })
    }

    fn close(
        &mut self,
        instrument_id: &InstrumentId,
        band: &Band,
        top: &TopOfBook,
        ledger: &mut PositionLedger,
    ) -> Vec<Order> {
        let Some(direction) = self.state.direction() else {
            return Vec::new();
        };
        let Some((price, volume)) = self.closing_liquidity(top) else {
            return Vec::new();
        };
        let remaining = self.state.remaining();

        let reopens = self.config.allow_flip
            && Self::entry_signal(band, top).is_some_and(|o| o.direction == direction.opposite());
        let excess = if reopens {
            (volume - remaining).min(self.config.per_trade_cap).max(0)
        } else {
            0
        };

        let desired = direction.closing_side().sign() * (volume.min(remaining) + excess);
        let quantity = ledger.clamp(instrument_id, desired);
        if quantity == 0 {
            return Vec::new();
        }
        let order = Order {
            instrument_id: instrument_id.clone(),
            price,
            quantity,
        };

        let mut orders = Vec::new();
        if sizer::commit(ledger, order.clone(), &mut orders) {
            let size = order.size();
            let result = if size > remaining {
                info!(
                    "[Directional] {} flip {:?} -> {:?}: {}",
                    instrument_id,
                    direction,
                    direction.opposite(),
                    order
                );
                self.state.flip(size, price)
            } else {
                info!(
                    "[Directional] {} close {}/{}: {}",
                    instrument_id, size, remaining, order
                );
                self.state.close(size)
            };
            if let Err(e) = result {
                warn!("[Directional] {} state not updated: {}", instrument_id, e);
            }
        }
        orders
    }

    /// Keep closing a partially closed position regardless of the band
    fn unwind(
        &mut self,
        instrument_id: &InstrumentId,
        top: &TopOfBook,
        ledger: &mut PositionLedger,
    ) -> Vec<Order> {
        let Some(direction) = self.state.direction() else {
            return Vec::new();
        };
        let Some((price, volume)) = self.closing_liquidity(top) else {
            return Vec::new();
        };

        let desired = direction.closing_side().sign() * volume.min(self.state.remaining());
        let quantity = ledger.clamp(instrument_id, desired);
        if quantity == 0 {
            return Vec::new();
        }
        let order = Order {
            instrument_id: instrument_id.clone(),
            price,
            quantity,
        };

        let mut orders = Vec::new();
        if sizer::commit(ledger, order.clone(), &mut orders) {
            info!(
                "[Directional] {} unwind {}/{}: {}",
                instrument_id,
                order.size(),
                self.state.remaining(),
                order
            );
            if let Err(e) = self.state.close(order.size()) {
                warn!("[Directional] {} state not updated: {}", instrument_id, e);
            }
        }
        orders
    }
}
