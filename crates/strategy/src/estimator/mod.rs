//! Signal Estimator
//!
//! Turns a rolling history of book observations into a fair-value band.
//! Two algorithms are provided behind [`FairValueEstimator`] and selected
//! through the tagged [`EstimatorConfig`]:
//!
//! - [`RegressionEstimator`]: polynomial fit of mid-price, optionally
//!   low-pass filtered, extrapolated one step
//! - [`RollingBandEstimator`]: rolling mean/std of best bid and best ask
//!
//! Callers estimate from history gathered on previous ticks and only then
//! observe the current tick, so `estimate` never sees the price it is
//! judging.

pub mod filter;
pub mod regression;
pub mod rolling;

use meridian_core::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, EstimateError};
use crate::orderbook::TopOfBook;

pub use regression::{BandWidth, Polynomial, RegressionConfig, RegressionEstimator, polyfit};
pub use rolling::{RollingBandEstimator, RollingStatsConfig};

/// Acceptable trading range around a fair value
///
/// Liquidity-taking buys only happen at or below `lower` and sells at or
/// above `upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Band {
    pub lower: Price,
    pub fair: Price,
    pub upper: Price,
}

impl Band {
    /// Band from explicit bounds with the fair value at the midpoint
    pub fn new(lower: Price, upper: Price) -> Self {
        Self {
            lower,
            fair: (lower + upper) / Decimal::TWO,
            upper,
        }
    }

    /// Symmetric band of `width` either side of `fair`
    pub fn around(fair: Price, width: Decimal) -> Self {
        let width = width.abs();
        Self {
            lower: fair - width,
            fair,
            upper: fair + width,
        }
    }

    pub fn contains(&self, price: Price) -> bool {
        price >= self.lower && price <= self.upper
    }
}

/// Per-instrument fair-value model
pub trait FairValueEstimator {
    /// Record this tick's top of book
    fn observe(&mut self, top: &TopOfBook);

    /// Band from the observations recorded so far
    fn estimate(&self) -> Result<Band, EstimateError>;

    /// Number of usable observations held
    fn observations(&self) -> usize;
}

/// Which estimator an instrument uses, with its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorConfig {
    Regression(RegressionConfig),
    RollingStats(RollingStatsConfig),
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig::Regression(RegressionConfig::default())
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            EstimatorConfig::Regression(config) => config.validate(),
            EstimatorConfig::RollingStats(config) => config.validate(),
        }
    }
}

/// Estimator state carried between ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalEstimator {
    Regression(RegressionEstimator),
    RollingStats(RollingBandEstimator),
}

impl SignalEstimator {
    pub fn from_config(config: EstimatorConfig) -> Self {
        match config {
            EstimatorConfig::Regression(config) => {
                SignalEstimator::Regression(RegressionEstimator::new(config))
            }
            EstimatorConfig::RollingStats(config) => {
                SignalEstimator::RollingStats(RollingBandEstimator::new(config))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SignalEstimator::Regression(_) => "regression",
            SignalEstimator::RollingStats(_) => "rolling_stats",
        }
    }
}

impl FairValueEstimator for SignalEstimator {
    fn observe(&mut self, top: &TopOfBook) {
        match self {
            SignalEstimator::Regression(e) => e.observe(top),
            SignalEstimator::RollingStats(e) => e.observe(top),
        }
    }

    fn estimate(&self) -> Result<Band, EstimateError> {
        match self {
            SignalEstimator::Regression(e) => e.estimate(),
            SignalEstimator::RollingStats(e) => e.estimate(),
        }
    }

    fn observations(&self) -> usize {
        match self {
            SignalEstimator::Regression(e) => e.observations(),
            SignalEstimator::RollingStats(e) => e.observations(),
        }
    }
}
