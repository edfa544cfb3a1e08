//! Tick Engine
//!
//! One deterministic step per snapshot. The ledger is rebuilt from the
//! limits and synced to reported inventory, then every strategy runs in
//! configured order against the same ledger, so a later strategy only sees
//! the capacity an earlier one left behind.

use std::collections::BTreeMap;

use log::{debug, warn};
use meridian_core::{InstrumentId, MarketSnapshot, Order, Quantity, Timestamp};
use meridian_risk::PositionLedger;
use meridian_strategy::{Strategy, StrategySlot, TickContext};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

/// Everything the engine remembers between ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    /// Absolute position limit per instrument
    pub limits: BTreeMap<InstrumentId, Quantity>,
    pub strategies: Vec<StrategySlot>,
    pub last_timestamp: Option<Timestamp>,
    /// Ticks processed since the state was created
    pub ticks: u64,
}

impl EngineState {
    /// Fresh state from config: empty histories, every position state Flat
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            limits: config.resolved_limits(),
            strategies: config
                .strategies
                .iter()
                .cloned()
                .map(StrategySlot::from_config)
                .collect(),
            last_timestamp: None,
            ticks: 0,
        }
    }
}

/// Output of one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickDecision {
    /// Orders per instrument, in emission order
    pub orders: BTreeMap<InstrumentId, Vec<Order>>,
    /// Net conversion request (positive imports, negative exports)
    pub conversions: Quantity,
}

impl TickDecision {
    pub fn order_count(&self) -> usize {
        self.orders.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.order_count() == 0 && self.conversions == 0
    }

    /// Orders for one instrument
    pub fn orders_for(&self, instrument_id: &InstrumentId) -> &[Order] {
        self.orders
            .get(instrument_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn push(&mut self, order: Order) {
        self.orders
            .entry(order.instrument_id.clone())
            .or_default()
            .push(order);
    }
}

/// Run every strategy once against `snapshot`
pub fn process_tick(mut state: EngineState, snapshot: &MarketSnapshot) -> (EngineState, TickDecision) {
    if let Some(last) = state.last_timestamp
        && snapshot.timestamp <= last
    {
        warn!(
            "[Engine] timestamp {} not after previous {}",
            snapshot.timestamp, last
        );
    }

    let mut ledger = PositionLedger::new(state.limits.clone());
    ledger.sync(&snapshot.positions);

    let mut decision = TickDecision::default();
    {
        let mut ctx = TickContext::new(snapshot, &mut ledger);
        for slot in state.strategies.iter_mut() {
            let orders = slot.on_tick(&mut ctx);
            if !orders.is_empty() {
                debug!("[Engine] {} emitted {} orders", slot.name(), orders.len());
            }
            for order in orders {
                decision.push(order);
            }
        }
        decision.conversions = ctx.conversions;
    }

    debug!(
        "[Engine] tick {} ts={}: {} orders, conversions {}",
        state.ticks,
        snapshot.timestamp,
        decision.order_count(),
        decision.conversions
    );

    state.last_timestamp = Some(snapshot.timestamp);
    state.ticks += 1;
    (state, decision)
}
