//! Meridian Strategy Framework
//!
//! Everything that happens between reading a tick's order books and
//! handing orders to the execution side:
//! - Order book view with explicit handling of empty sides
//! - Rolling price history and pluggable fair-value estimators
//! - Position state machine for directional bets
//! - Order sizing against the shared position ledger
//! - Basket arbitrage and conversion arbitrage pipelines
//! - Signal traders: imbalance-gated average crossover, trend residual
//!   crossing
//!
//! ## Architecture
//!
//! ```text
//!   OrderBookSnapshot
//!          │
//!          ▼
//!      BookView ──► SignalEstimator ──► Band
//!                                        │
//!              ┌─────────────────────────┼──────────────────────┐
//!              ▼                         ▼                      ▼
//!        take_liquidity            quote_passive       DirectionalTrader
//!              │                         │              (PositionState)
//!              └──────────────┬──────────┴──────────────────────┘
//!                             ▼
//!                      PositionLedger ◄──── BasketArbitrage
//!                             │        ◄──── ConversionTrader
//!                             ▼
//!                          Orders
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_strategy::{EstimatorConfig, InstrumentConfig, StrategyConfig, StrategySlot};
//!
//! let config = InstrumentConfig::new("STARFRUIT")
//!     .with_estimator(EstimatorConfig::Regression(RegressionConfig::default()));
//! let slot = StrategySlot::from_config(StrategyConfig::Instrument(config));
//! ```

pub mod basket;
pub mod conversion;
pub mod crossover;
pub mod directional;
pub mod error;
pub mod estimator;
pub mod history;
pub mod instrument;
pub mod orderbook;
pub mod position_state;
pub mod residual;
pub mod sizer;
pub mod strategy;

// Re-export main types
pub use basket::{BasketArbitrage, BasketConfig, BasketLeg, BasketMode, SpreadBands};
pub use conversion::{ConversionConfig, ConversionTrader, FactorHistory, ObservationModel, ar1_forecast};
pub use crossover::{CrossoverConfig, CrossoverTrader, MovingAverages};
pub use directional::{DirectionalConfig, DirectionalTrader};
pub use error::{BasketError, ConfigError, EstimateError, FitError};
pub use estimator::{
    Band, BandWidth, EstimatorConfig, FairValueEstimator, RegressionConfig, RegressionEstimator,
    RollingBandEstimator, RollingStatsConfig, SignalEstimator,
};
pub use history::{Dispersion, PriceHistory};
pub use instrument::{Execution, ExecutionConfig, InstrumentConfig, InstrumentTrader};
pub use orderbook::{BookView, NO_ASK, NO_BID, TopOfBook};
pub use position_state::{PositionPhase, PositionState, TransitionError};
pub use residual::{Candidate, ResidualCrossConfig, ResidualCrossTrader};
pub use strategy::{Strategy, StrategyConfig, StrategySlot, TickContext};
