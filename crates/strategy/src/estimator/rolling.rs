//! Rolling statistics band estimator
//!
//! Tracks best-bid and best-ask series separately. The band sits `k`
//! standard deviations above the bid mean and below the ask mean, so a
//! bid printing above `upper` or an ask printing below `lower` is an
//! excursion from the recent range.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{Band, FairValueEstimator};
use crate::error::{ConfigError, EstimateError};
use crate::history::{Dispersion, PriceHistory};
use crate::orderbook::TopOfBook;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollingStatsConfig {
    /// Observations per side required and kept
    pub window: usize,
    /// Band multiplier `k`
    pub multiplier: Decimal,
}

impl Default for RollingStatsConfig {
    fn default() -> Self {
        Self {
            window: 20,
            multiplier: dec!(2),
        }
    }
}

impl RollingStatsConfig {
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_multiplier(mut self, multiplier: Decimal) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(ConfigError::invalid("window", "must be at least 1"));
        }
        if self.multiplier.is_sign_negative() {
            return Err(ConfigError::invalid(
                "multiplier",
                format!("must not be negative, got {}", self.multiplier),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingBandEstimator {
    config: RollingStatsConfig,
    bids: PriceHistory,
    asks: PriceHistory,
}

impl RollingBandEstimator {
    pub fn new(config: RollingStatsConfig) -> Self {
        Self {
            bids: PriceHistory::new(config.window),
            asks: PriceHistory::new(config.window),
            config,
        }
    }

    pub fn config(&self) -> &RollingStatsConfig {
        &self.config
    }

    pub fn bid_history(&self) -> &PriceHistory {
        &self.bids
    }

    pub fn ask_history(&self) -> &PriceHistory {
        &self.asks
    }
}

impl FairValueEstimator for RollingBandEstimator {
    fn observe(&mut self, top: &TopOfBook) {
        if top.has_bid() {
            self.bids.push(top.best_bid);
        }
        if top.has_ask() {
            self.asks.push(top.best_ask);
        }
    }

    fn estimate(&self) -> Result<Band, EstimateError> {
        let need = self.config.window;
        let have = self.observations();
        if have < need {
            return Err(EstimateError::InsufficientData { have, need });
        }

        let stats = |history: &PriceHistory| {
            history
                .mean()
                .zip(history.std_dev(Dispersion::Sample))
                .ok_or_else(|| EstimateError::Degenerate("empty series".to_string()))
        };
        let (bid_mean, bid_std) = stats(&self.bids)?;
        let (ask_mean, ask_std) = stats(&self.asks)?;

        let k = self.config.multiplier;
        Ok(Band {
            lower: ask_mean - k * ask_std,
            fair: (bid_mean + ask_mean) / Decimal::TWO,
            upper: bid_mean + k * bid_std,
        })
    }

    /// Observations available on the thinner side
    fn observations(&self) -> usize {
        self.bids.len().min(self.asks.len())
    }
}
