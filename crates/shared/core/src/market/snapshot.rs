use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{ConversionObservation, OrderBookSnapshot};
use crate::instruments::InstrumentId;
use crate::values::{Quantity, Timestamp};

/// Everything the harness hands the engine for one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSnapshot {
    pub timestamp: Timestamp,
    pub order_depths: BTreeMap<InstrumentId, OrderBookSnapshot>,
    /// Authoritative inventory as reported by the execution side
    pub positions: BTreeMap<InstrumentId, Quantity>,
    pub observations: BTreeMap<InstrumentId, ConversionObservation>,
}

impl MarketSnapshot {
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    pub fn with_book(mut self, instrument: impl Into<InstrumentId>, book: OrderBookSnapshot) -> Self {
        self.order_depths.insert(instrument.into(), book);
        self
    }

    pub fn with_position(mut self, instrument: impl Into<InstrumentId>, position: Quantity) -> Self {
        self.positions.insert(instrument.into(), position);
        self
    }

    pub fn with_observation(
        mut self,
        instrument: impl Into<InstrumentId>,
        observation: ConversionObservation,
    ) -> Self {
        self.observations.insert(instrument.into(), observation);
        self
    }

    pub fn book(&self, instrument: &InstrumentId) -> Option<&OrderBookSnapshot> {
        self.order_depths.get(instrument)
    }

    /// Reported inventory, zero when the harness omits the instrument
    pub fn position(&self, instrument: &InstrumentId) -> Quantity {
        self.positions.get(instrument).copied().unwrap_or(0)
    }
}
