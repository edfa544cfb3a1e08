//! Engine configuration
//!
//! One JSON document describes position limits and the strategy set. Every
//! tunable is copied into the engine state on the first tick and travels in
//! the state blob from then on.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use meridian_core::{InstrumentId, Quantity};
use meridian_strategy::{
    BasketConfig, ConversionConfig, DirectionalConfig, EstimatorConfig, ExecutionConfig,
    InstrumentConfig, RegressionConfig, RollingStatsConfig, StrategyConfig,
};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Root configuration for the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Absolute position limit per instrument
    pub limits: BTreeMap<InstrumentId, Quantity>,

    /// Limit for traded instruments missing from `limits`
    pub default_limit: Quantity,

    /// Strategies, run in this order every tick
    pub strategies: Vec<StrategyConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: BTreeMap::new(),
            default_limit: 20,
            strategies: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Strategy set covering every product type the engine knows
    pub fn with_default_strategies() -> Self {
        Self::default()
            .with_limit("AMETHYSTS", 20)
            .with_limit("STARFRUIT", 20)
            .with_limit("ORCHIDS", 100)
            .with_limit("CHOCOLATE", 250)
            .with_limit("STRAWBERRIES", 350)
            .with_limit("ROSES", 60)
            .with_limit("GIFT_BASKET", 60)
            .with_strategy(StrategyConfig::Instrument(
                InstrumentConfig::new("AMETHYSTS")
                    .with_estimator(EstimatorConfig::RollingStats(
                        RollingStatsConfig::default().with_window(20),
                    ))
                    .with_execution(ExecutionConfig::Directional(DirectionalConfig::default())),
            ))
            .with_strategy(StrategyConfig::Instrument(
                InstrumentConfig::new("STARFRUIT")
                    .with_estimator(EstimatorConfig::Regression(
                        RegressionConfig::default().with_window(10),
                    ))
                    .with_execution(ExecutionConfig::TakeLiquidity),
            ))
            .with_strategy(StrategyConfig::Conversion(
                ConversionConfig::new("ORCHIDS")
                    .with_max_conversion(10)
                    .with_min_edge(dec!(1)),
            ))
            .with_strategy(StrategyConfig::Basket(BasketConfig::default()))
    }

    pub fn with_limit(mut self, instrument_id: impl Into<InstrumentId>, limit: Quantity) -> Self {
        self.limits.insert(instrument_id.into(), limit);
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Limit for an instrument, falling back to `default_limit`
    pub fn limit_for(&self, instrument_id: &InstrumentId) -> Quantity {
        self.limits
            .get(instrument_id)
            .copied()
            .unwrap_or(self.default_limit)
    }

    /// Configured limits plus the default for every traded instrument
    /// without an explicit one
    pub fn resolved_limits(&self) -> BTreeMap<InstrumentId, Quantity> {
        let mut limits = self.limits.clone();
        for id in self.strategies.iter().flat_map(|s| s.instruments()) {
            limits.entry(id).or_insert(self.default_limit);
        }
        limits
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit <= 0 {
            return Err(ConfigError::NonPositiveLimit {
                instrument_id: InstrumentId::from("<default>"),
                limit: self.default_limit,
            });
        }
        if let Some((id, limit)) = self.limits.iter().find(|(_, l)| **l <= 0) {
            return Err(ConfigError::NonPositiveLimit {
                instrument_id: id.clone(),
                limit: *limit,
            });
        }

        let mut owned = BTreeSet::new();
        for (index, strategy) in self.strategies.iter().enumerate() {
            strategy
                .validate()
                .map_err(|source| ConfigError::Strategy { index, source })?;
            for id in strategy.instruments() {
                if !owned.insert(id.clone()) {
                    return Err(ConfigError::SharedInstrument { instrument_id: id });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_strategy::BasketLeg;

    #[test]
    fn test_default_strategies_are_valid() {
        let config = EngineConfig::with_default_strategies();
        assert!(config.validate().is_ok());
        assert_eq!(config.strategies.len(), 4);
        assert_eq!(config.limit_for(&InstrumentId::from("GIFT_BASKET")), 60);
    }

    #[test]
    fn test_from_json_minimal() {
        let json = r#"{
            "limits": { "AMETHYSTS": 20 },
            "strategies": [
                { "type": "instrument", "instrument_id": "AMETHYSTS" },
                { "type": "conversion", "instrument_id": "ORCHIDS" }
            ]
        }"#;

        let config = EngineConfig::from_json(json).unwrap();
        assert_eq!(config.default_limit, 20);
        assert_eq!(config.strategies.len(), 2);
        assert!(config.validate().is_ok());

        let limits = config.resolved_limits();
        assert_eq!(limits.get(&InstrumentId::from("AMETHYSTS")), Some(&20));
        assert_eq!(limits.get(&InstrumentId::from("ORCHIDS")), Some(&20));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            EngineConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file_missing() {
        let result = EngineConfig::from_file("/definitely/not/here.json");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_round_trip_json() {
        let config = EngineConfig::with_default_strategies();
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_validate_non_positive_limit() {
        let config = EngineConfig::default().with_limit("STARFRUIT", 0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveLimit { limit: 0, .. })
        ));
    }

    #[test]
    fn test_validate_shared_instrument() {
        let basket = BasketConfig::new(
            "GIFT_BASKET",
            vec![BasketLeg::new("STARFRUIT", 2), BasketLeg::new("ROSES", 1)],
        );
        let config = EngineConfig::default()
            .with_strategy(StrategyConfig::Instrument(InstrumentConfig::new("STARFRUIT")))
            .with_strategy(StrategyConfig::Basket(basket));

        assert!(matches!(
            config.validate(),
            Err(ConfigError::SharedInstrument { instrument_id }) if instrument_id.as_str() == "STARFRUIT"
        ));
    }

    #[test]
    fn test_validate_bad_strategy() {
        let config = EngineConfig::default().with_strategy(StrategyConfig::Instrument(
            InstrumentConfig::new("STARFRUIT").with_estimator(EstimatorConfig::Regression(
                RegressionConfig::default().with_window(0),
            )),
        ));

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Strategy { index: 0, .. })
        ));
    }
}
