//! Strategy Trait and Slots
//!
//! Every strategy sees the same tick context and shares one ledger, so
//! limits hold across strategies that touch related instruments. Strategy
//! state is stored in [`StrategySlot`], a serializable enum, because the
//! engine state has to survive an encode/decode between ticks.

use std::collections::BTreeMap;

use meridian_core::{
    ConversionObservation, InstrumentId, MarketSnapshot, Order, OrderBookSnapshot, Quantity,
    Timestamp,
};
use meridian_risk::PositionLedger;
use serde::{Deserialize, Serialize};

use crate::basket::{BasketArbitrage, BasketConfig};
use crate::conversion::{ConversionConfig, ConversionTrader};
use crate::crossover::{CrossoverConfig, CrossoverTrader};
use crate::error::ConfigError;
use crate::instrument::{InstrumentConfig, InstrumentTrader};
use crate::residual::{ResidualCrossConfig, ResidualCrossTrader};

/// Context provided to each strategy on every tick
pub struct TickContext<'a> {
    pub timestamp: Timestamp,
    /// Order books for every instrument in the snapshot
    pub books: &'a BTreeMap<InstrumentId, OrderBookSnapshot>,
    pub observations: &'a BTreeMap<InstrumentId, ConversionObservation>,
    /// Shared ledger, already synced to reported inventory
    pub ledger: &'a mut PositionLedger,
    /// Net conversion request accumulated this tick
    pub conversions: Quantity,
}

impl<'a> TickContext<'a> {
    pub fn new(snapshot: &'a MarketSnapshot, ledger: &'a mut PositionLedger) -> Self {
        Self {
            timestamp: snapshot.timestamp,
            books: &snapshot.order_depths,
            observations: &snapshot.observations,
            ledger,
            conversions: 0,
        }
    }

    /// Get order book for an instrument
    pub fn book(&self, instrument_id: &InstrumentId) -> Option<&'a OrderBookSnapshot> {
        self.books.get(instrument_id)
    }

    pub fn observation(&self, instrument_id: &InstrumentId) -> Option<&'a ConversionObservation> {
        self.observations.get(instrument_id)
    }

    /// Reported position for an instrument
    pub fn position(&self, instrument_id: &InstrumentId) -> Quantity {
        self.ledger.position(instrument_id)
    }

    pub fn request_conversion(&mut self, quantity: Quantity) {
        self.conversions += quantity;
    }
}

/// Strategy trait - one call per tick, strictly sequential
pub trait Strategy {
    /// Strategy name for logging
    fn name(&self) -> &str;

    /// Instruments this strategy emits orders for
    fn instruments(&self) -> Vec<InstrumentId>;

    /// Decide this tick's orders
    fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> Vec<Order>;
}

/// Parameters for one strategy instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    Instrument(InstrumentConfig),
    Basket(BasketConfig),
    Conversion(ConversionConfig),
    Crossover(CrossoverConfig),
    ResidualCross(ResidualCrossConfig),
}

impl StrategyConfig {
    pub fn instruments(&self) -> Vec<InstrumentId> {
        match self {
            StrategyConfig::Instrument(c) => vec![c.instrument_id.clone()],
            StrategyConfig::Basket(c) => c.instruments(),
            StrategyConfig::Conversion(c) => vec![c.instrument_id.clone()],
            StrategyConfig::Crossover(c) => vec![c.instrument_id.clone()],
            StrategyConfig::ResidualCross(c) => vec![c.instrument_id.clone()],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            StrategyConfig::Instrument(c) => c.validate(),
            StrategyConfig::Basket(c) => c.validate(),
            StrategyConfig::Conversion(c) => c.validate(),
            StrategyConfig::Crossover(c) => c.validate(),
            StrategyConfig::ResidualCross(c) => c.validate(),
        }
    }
}

/// A strategy together with the state it carries between ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategySlot {
    Instrument(InstrumentTrader),
    Basket(BasketArbitrage),
    Conversion(ConversionTrader),
    Crossover(CrossoverTrader),
    ResidualCross(ResidualCrossTrader),
}

impl StrategySlot {
    pub fn from_config(config: StrategyConfig) -> Self {
        match config {
            StrategyConfig::Instrument(c) => StrategySlot::Instrument(InstrumentTrader::new(c)),
            StrategyConfig::Basket(c) => StrategySlot::Basket(BasketArbitrage::new(c)),
            StrategyConfig::Conversion(c) => StrategySlot::Conversion(ConversionTrader::new(c)),
            StrategyConfig::Crossover(c) => StrategySlot::Crossover(CrossoverTrader::new(c)),
            StrategyConfig::ResidualCross(c) => {
                StrategySlot::ResidualCross(ResidualCrossTrader::new(c))
            }
        }
    }

    fn inner(&self) -> &dyn Strategy {
        match self {
            StrategySlot::Instrument(s) => s,
            StrategySlot::Basket(s) => s,
            StrategySlot::Conversion(s) => s,
            StrategySlot::Crossover(s) => s,
            StrategySlot::ResidualCross(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Strategy {
        match self {
            StrategySlot::Instrument(s) => s,
            StrategySlot::Basket(s) => s,
            StrategySlot::Conversion(s) => s,
            StrategySlot::Crossover(s) => s,
            StrategySlot::ResidualCross(s) => s,
        }
    }
}

impl Strategy for StrategySlot {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn instruments(&self) -> Vec<InstrumentId> {
        self.inner().instruments()
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> Vec<Order> {
        self.inner_mut().on_tick(ctx)
    }
}
