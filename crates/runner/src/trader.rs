//! Harness adapter
//!
//! The harness calls [`Trader::run`] once per tick with the snapshot and the
//! blob it got back last time. Nothing that goes wrong with the blob stops
//! the tick: a bad blob is replaced by a fresh state, a failed encode
//! returns an empty blob.

use std::collections::BTreeMap;

use log::{error, info};
use meridian_core::{InstrumentId, MarketSnapshot, Order, Quantity};
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::config::EngineConfig;
use crate::engine::{EngineState, process_tick};
use crate::error::ConfigError;

/// What the harness gets back for one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickOutput {
    pub orders: BTreeMap<InstrumentId, Vec<Order>>,
    pub conversions: Quantity,
    /// Opaque state to hand back on the next call
    pub trader_data: String,
}

#[derive(Debug, Clone)]
pub struct Trader {
    config: EngineConfig,
}

impl Trader {
    /// Create a trader from a validated config
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "[Trader] {} strategies, {} limits",
            config.strategies.len(),
            config.resolved_limits().len()
        );
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// State the first tick starts from
    pub fn initial_state(&self) -> EngineState {
        EngineState::new(&self.config)
    }

    fn restore(&self, trader_data: &str) -> EngineState {
        if trader_data.trim().is_empty() {
            return self.initial_state();
        }
        match codec::decode(trader_data) {
            Ok(state) => state,
            Err(e) => {
                error!("[Trader] {}, starting from fresh state", e);
                self.initial_state()
            }
        }
    }

    pub fn run(&self, snapshot: &MarketSnapshot, trader_data: &str) -> TickOutput {
        let state = self.restore(trader_data);
        let (state, decision) = process_tick(state, snapshot);

        let trader_data = codec::encode(&state).unwrap_or_else(|e| {
            error!("[Trader] {}, returning empty state", e);
            String::new()
        });

        TickOutput {
            orders: decision.orders,
            conversions: decision.conversions,
            trader_data,
        }
    }
}
