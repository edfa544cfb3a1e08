//! Single-instrument trader
//!
//! Wires one estimator to one execution style:
//!
//! ```text
//!   book ──► TopOfBook ──► estimate (prior ticks) ──► band ──► sizer / directional
//!                  └─────► observe (after deciding)
//! ```

use log::debug;
use meridian_core::{InstrumentId, Order, Quantity};
use serde::{Deserialize, Serialize};

use crate::directional::{DirectionalConfig, DirectionalTrader};
use crate::error::ConfigError;
use crate::estimator::{EstimatorConfig, FairValueEstimator, SignalEstimator};
use crate::orderbook::BookView;
use crate::sizer;
use crate::strategy::{Strategy, TickContext};

/// How a band is turned into orders
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum ExecutionConfig {
    /// Hit every resting level priced through the band
    #[default]
    TakeLiquidity,
    /// Quote one tick inside the touch
    Passive { quote_size: Quantity },
    /// Open and close directional positions through the state machine
    Directional(DirectionalConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub instrument_id: InstrumentId,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl InstrumentConfig {
    pub fn new(instrument_id: impl Into<InstrumentId>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            estimator: EstimatorConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }

    pub fn with_estimator(mut self, estimator: EstimatorConfig) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.estimator.validate()?;
        match &self.execution {
            ExecutionConfig::TakeLiquidity => Ok(()),
            ExecutionConfig::Passive { quote_size } if *quote_size <= 0 => Err(
                ConfigError::invalid("quote_size", format!("must be positive, got {}", quote_size)),
            ),
            ExecutionConfig::Passive { .. } => Ok(()),
            ExecutionConfig::Directional(config) => config.validate(),
        }
    }
}

/// Execution state carried between ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum Execution {
    TakeLiquidity,
    Passive { quote_size: Quantity },
    Directional(DirectionalTrader),
}

impl From<ExecutionConfig> for Execution {
    fn from(config: ExecutionConfig) -> Self {
        match config {
            ExecutionConfig::TakeLiquidity => Execution::TakeLiquidity,
            ExecutionConfig::Passive { quote_size } => Execution::Passive { quote_size },
            ExecutionConfig::Directional(c) => Execution::Directional(DirectionalTrader::new(c)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentTrader {
    instrument_id: InstrumentId,
    estimator: SignalEstimator,
    execution: Execution,
}

impl InstrumentTrader {
    pub fn new(config: InstrumentConfig) -> Self {
        Self {
            instrument_id: config.instrument_id,
            estimator: SignalEstimator::from_config(config.estimator),
            execution: config.execution.into(),
        }
    }

    pub fn instrument_id(&self) -> &InstrumentId {
        &self.instrument_id
    }

    pub fn estimator(&self) -> &SignalEstimator {
        &self.estimator
    }

    pub fn execution(&self) -> &Execution {
        &self.execution
    }
}

impl Strategy for InstrumentTrader {
    fn name(&self) -> &str {
        self.instrument_id.as_str()
    }

    fn instruments(&self) -> Vec<InstrumentId> {
        vec![self.instrument_id.clone()]
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> Vec<Order> {
        let Some(book) = ctx.book(&self.instrument_id) else {
            debug!("[Instrument] {} missing from snapshot", self.instrument_id);
            return Vec::new();
        };
        let view = BookView::new(book);
        let top = view.top_of_book();

        let band = self.estimator.estimate();
        self.estimator.observe(&top);
        if let Err(e) = &band {
            debug!("[Instrument] {} no band this tick: {}", self.instrument_id, e);
        }

        let id = &self.instrument_id;
        match (&mut self.execution, band) {
            (Execution::Directional(trader), band) => {
                trader.on_tick(id, band.as_ref().ok(), &top, ctx.ledger)
            }
            (Execution::TakeLiquidity, Ok(band)) => {
                sizer::take_liquidity(id, &view, &band, ctx.ledger)
            }
            (Execution::Passive { quote_size }, Ok(band)) => {
                sizer::quote_passive(id, &view, &band, *quote_size, ctx.ledger)
            }
            (_, Err(_)) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{RegressionConfig, RollingStatsConfig};
    use meridian_core::{MarketSnapshot, OrderBookSnapshot};
    use meridian_risk::PositionLedger;
    use rust_decimal_macros::dec;

    fn run(trader: &mut InstrumentTrader, snapshot: &MarketSnapshot) -> Vec<Order> {
        let mut ledger = PositionLedger::default()
            .with_limit("STARFRUIT", 20)
            .with_limit("AMETHYSTS", 20);
        ledger.sync(&snapshot.positions);
        let mut ctx = TickContext::new(snapshot, &mut ledger);
        trader.on_tick(&mut ctx)
    }

    #[test]
    fn test_empty_history_emits_nothing() {
        let mut trader = InstrumentTrader::new(InstrumentConfig::new("STARFRUIT"));
        let snapshot = MarketSnapshot::new(0).with_book(
            "STARFRUIT",
            OrderBookSnapshot::from_levels(&[(dec!(9998), 5)], &[(dec!(10002), 5)]),
        );

        assert!(run(&mut trader, &snapshot).is_empty());
        // The tick was still recorded for the next estimate
        assert_eq!(trader.estimator().observations(), 1);
    }

    #[test]
    fn test_missing_book_is_skipped() {
        let mut trader = InstrumentTrader::new(InstrumentConfig::new("STARFRUIT"));
        assert!(run(&mut trader, &MarketSnapshot::new(0)).is_empty());
        assert_eq!(trader.estimator().observations(), 0);
    }

    #[test]
    fn test_takes_mispriced_ask_after_warmup() {
        let config = InstrumentConfig::new("STARFRUIT").with_estimator(EstimatorConfig::Regression(
            RegressionConfig::default().with_window(5),
        ));
        let mut trader = InstrumentTrader::new(config);
        let quiet = OrderBookSnapshot::from_levels(&[(dec!(4998), 5)], &[(dec!(5002), 5)]);
        for t in 0..5 {
            let snapshot = MarketSnapshot::new(t * 100).with_book("STARFRUIT", quiet.clone());
            assert!(run(&mut trader, &snapshot).is_empty());
        }

        // Fair value 5000, band [4999, 5001]; an ask at 4997 is cheap
        let cheap = OrderBookSnapshot::from_levels(&[(dec!(4996), 5)], &[(dec!(4997), 8)]);
        let snapshot = MarketSnapshot::new(500).with_book("STARFRUIT", cheap);
        let orders = run(&mut trader, &snapshot);

        assert_eq!(orders, vec![Order::buy("STARFRUIT", dec!(4997), 8)]);
    }

    #[test]
    fn test_directional_with_rolling_band() {
        let config = InstrumentConfig::new("AMETHYSTS")
            .with_estimator(EstimatorConfig::RollingStats(
                RollingStatsConfig::default().with_window(3),
            ))
            .with_execution(ExecutionConfig::Directional(
                DirectionalConfig::default().with_per_trade_cap(6),
            ));
        let mut trader = InstrumentTrader::new(config);
        let flat = OrderBookSnapshot::from_levels(&[(dec!(10000), 5)], &[(dec!(10000), 5)]);
        for t in 0..3 {
            let snapshot = MarketSnapshot::new(t * 100).with_book("AMETHYSTS", flat.clone());
            assert!(run(&mut trader, &snapshot).is_empty());
        }

        let rich = OrderBookSnapshot::from_levels(&[(dec!(10001), 9)], &[(dec!(10003), 4)]);
        let snapshot = MarketSnapshot::new(300).with_book("AMETHYSTS", rich);
        let orders = run(&mut trader, &snapshot);

        assert_eq!(orders, vec![Order::sell("AMETHYSTS", dec!(10001), 6)]);
    }
}
