//! Conversion arbitrage
//!
//! Some instruments can be exchanged with a foreign venue at its observed
//! bid/ask plus transport fees and tariffs. Local liquidity priced through
//! those conversion costs is taken, and any inventory is requested back
//! through conversion so the position returns to flat.
//!
//! The environment readings are kept over a rolling window and forecast one
//! tick ahead with a ridge-regularised AR(1) fit; the forecast, not the raw
//! reading, drives the price adjustment.

use std::collections::VecDeque;

use log::{debug, info};
use meridian_core::{ConversionObservation, InstrumentId, Order, Price, Quantity};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::estimator::Band;
use crate::orderbook::BookView;
use crate::sizer;
use crate::strategy::{Strategy, TickContext};

/// Adjustment of foreign prices from the environment readings
///
/// Humidity outside `[humidity_low, humidity_high]` costs `humidity_impact`
/// of the price for every full `humidity_step` of distance; sunlight below
/// `sunlight_threshold` costs a further `sunlight_penalty`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservationModel {
    pub humidity_low: f64,
    pub humidity_high: f64,
    pub humidity_step: f64,
    pub humidity_impact: Decimal,
    pub sunlight_threshold: f64,
    pub sunlight_penalty: Decimal,
}

impl Default for ObservationModel {
    fn default() -> Self {
        Self {
            humidity_low: 60.0,
            humidity_high: 80.0,
            humidity_step: 5.0,
            humidity_impact: dec!(0.002),
            sunlight_threshold: 2500.0,
            sunlight_penalty: dec!(0.004),
        }
    }
}

impl ObservationModel {
    /// Fraction of the price lost to the current environment
    pub fn penalty(&self, observation: &ConversionObservation) -> Decimal {
        let humidity = observation.humidity;
        let distance = if humidity < self.humidity_low {
            self.humidity_low - humidity
        } else if humidity > self.humidity_high {
            humidity - self.humidity_high
        } else {
            0.0
        };
        let steps = if self.humidity_step > 0.0 {
            (distance / self.humidity_step).floor()
        } else {
            0.0
        };
        let mut penalty = Decimal::from_f64(steps).unwrap_or(Decimal::ZERO) * self.humidity_impact;

        if observation.sunlight < self.sunlight_threshold {
            penalty += self.sunlight_penalty;
        }
        penalty.min(Decimal::ONE)
    }

    pub fn adjust(&self, price: Price, observation: &ConversionObservation) -> Price {
        price * (Decimal::ONE - self.penalty(observation))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionConfig {
    pub instrument_id: InstrumentId,
    /// Largest conversion request per tick (absolute)
    #[serde(default = "default_max_conversion")]
    pub max_conversion: Quantity,
    /// Extra margin required beyond conversion costs
    #[serde(default)]
    pub min_edge: Decimal,
    #[serde(default)]
    pub model: ObservationModel,
    /// Readings kept for the environment forecast; 0 uses the latest only
    #[serde(default = "default_forecast_window")]
    pub forecast_window: usize,
    /// Ridge penalty of the forecast regression
    #[serde(default = "default_ridge")]
    pub ridge: f64,
}

fn default_max_conversion() -> Quantity {
    100
}

fn default_forecast_window() -> usize {
    10
}

fn default_ridge() -> f64 {
    0.01
}

impl ConversionConfig {
    pub fn new(instrument_id: impl Into<InstrumentId>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            max_conversion: default_max_conversion(),
            min_edge: Decimal::ZERO,
            model: ObservationModel::default(),
            forecast_window: default_forecast_window(),
            ridge: default_ridge(),
        }
    }

    pub fn with_max_conversion(mut self, max: Quantity) -> Self {
        self.max_conversion = max;
        self
    }

    pub fn with_min_edge(mut self, edge: Decimal) -> Self {
        self.min_edge = edge;
        self
    }

    pub fn with_model(mut self, model: ObservationModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_forecast(mut self, window: usize, ridge: f64) -> Self {
        self.forecast_window = window;
        self.ridge = ridge;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_conversion < 0 {
            return Err(ConfigError::invalid("max_conversion", "must not be negative"));
        }
        if self.min_edge.is_sign_negative() {
            return Err(ConfigError::invalid("min_edge", "must not be negative"));
        }
        if self.model.humidity_low > self.model.humidity_high {
            return Err(ConfigError::invalid("model", "humidity_low above humidity_high"));
        }
        if self.ridge.is_nan() || self.ridge < 0.0 {
            return Err(ConfigError::invalid(
                "ridge",
                format!("must not be negative, got {}", self.ridge),
            ));
        }
        Ok(())
    }
}

/// Rolling humidity and sunlight readings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorHistory {
    humidity: VecDeque<f64>,
    sunlight: VecDeque<f64>,
}

impl FactorHistory {
    pub fn record(&mut self, observation: &ConversionObservation, window: usize) {
        for (series, value) in [
            (&mut self.humidity, observation.humidity),
            (&mut self.sunlight, observation.sunlight),
        ] {
            series.push_back(value);
            while series.len() > window.max(1) {
                series.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.humidity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.humidity.is_empty()
    }

    /// Next-tick humidity and sunlight, each `None` when it cannot be fit
    pub fn forecast(&self, ridge: f64) -> (Option<f64>, Option<f64>) {
        (
            ar1_forecast(&self.humidity, ridge),
            ar1_forecast(&self.sunlight, ridge),
        )
    }
}

/// One-step forecast from `y[t] = a + b·y[t-1]` with a ridge penalty on
/// both coefficients
///
/// Needs at least three values. Returns `None` when the penalised normal
/// equations are singular, e.g. a constant series with `ridge == 0`.
pub fn ar1_forecast(values: &VecDeque<f64>, ridge: f64) -> Option<f64> {
    if values.len() < 3 {
        return None;
    }
    let last = *values.back()?;

    let (mut m, mut sx, mut sxx, mut sy, mut sxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (x, y) in values.iter().zip(values.iter().skip(1)) {
        m += 1.0;
        sx += x;
        sxx += x * x;
        sy += y;
        sxy += x * y;
    }

    let (a, b, d) = (m + ridge, sx, sxx + ridge);
    let det = a * d - b * b;
    if det.abs() < 1e-9 * a.max(d).max(1.0) {
        return None;
    }
    let intercept = (d * sy - b * sxy) / det;
    let slope = (a * sxy - b * sy) / det;
    let forecast = intercept + slope * last;
    forecast.is_finite().then_some(forecast)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionTrader {
    config: ConversionConfig,
    #[serde(default)]
    factors: FactorHistory,
}

impl ConversionTrader {
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            config,
            factors: FactorHistory::default(),
        }
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn factors(&self) -> &FactorHistory {
        &self.factors
    }

    /// `observation` with its environment readings replaced by the forecast
    /// where one is available
    pub fn expected_observation(&self, observation: &ConversionObservation) -> ConversionObservation {
        let mut expected = observation.clone();
        if self.config.forecast_window == 0 {
            return expected;
        }
        let (humidity, sunlight) = self.factors.forecast(self.config.ridge);
        if let Some(humidity) = humidity {
            expected.humidity = humidity;
        }
        if let Some(sunlight) = sunlight {
            expected.sunlight = sunlight;
        }
        expected
    }

    /// Buy below what exporting fetches, sell above what importing costs
    pub fn band(&self, observation: &ConversionObservation) -> Band {
        let model = &self.config.model;
        let proceeds = observation.export_proceeds(model.adjust(observation.bid_price, observation));
        let cost = observation.import_cost(model.adjust(observation.ask_price, observation));
        Band::new(proceeds - self.config.min_edge, cost + self.config.min_edge)
    }
}

impl Strategy for ConversionTrader {
    fn name(&self) -> &str {
        self.config.instrument_id.as_str()
    }

    fn instruments(&self) -> Vec<InstrumentId> {
        vec![self.config.instrument_id.clone()]
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> Vec<Order> {
        let id = &self.config.instrument_id;
        let Some(observation) = ctx.observation(id) else {
            debug!("[Conversion] {} no observation this tick", id);
            return Vec::new();
        };

        self.factors.record(observation, self.config.forecast_window);
        let expected = self.expected_observation(observation);

        // Reserved before any order so fills plus conversion stay in limits
        let position = ctx.position(id);
        if position != 0 {
            let max = self.config.max_conversion;
            let desired = (-position).min(max).max(-max);
            let request = ctx.ledger.reserve_conversion(id, desired);
            if request != 0 {
                info!("[Conversion] {} converting {} (position {})", id, request, position);
                ctx.request_conversion(request);
            }
        }

        let Some(book) = ctx.book(id) else {
            return Vec::new();
        };
        let band = self.band(&expected);
        debug!(
            "[Conversion] {} band [{}, {}] humidity {:.1} sunlight {:.0}",
            id, band.lower, band.upper, expected.humidity, expected.sunlight
        );
        sizer::take_liquidity(id, &BookView::new(book), &band, ctx.ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::{MarketSnapshot, OrderBookSnapshot};
    use approx::assert_relative_eq;
    use meridian_risk::PositionLedger;

    fn observation() -> ConversionObservation {
        ConversionObservation {
            bid_price: dec!(1100),
            ask_price: dec!(1102),
            transport_fees: dec!(1),
            export_tariff: dec!(2),
            import_tariff: dec!(-3),
            sunlight: 3000.0,
            humidity: 70.0,
        }
    }

    fn run(trader: &mut ConversionTrader, snapshot: &MarketSnapshot) -> (Vec<Order>, Quantity) {
        let mut ledger = PositionLedger::default().with_limit("ORCHIDS", 100);
        ledger.sync(&snapshot.positions);
        let mut ctx = TickContext::new(snapshot, &mut ledger);
        let orders = trader.on_tick(&mut ctx);
        (orders, ctx.conversions)
    }

    #[test]
    fn test_band_from_costs() {
        let trader = ConversionTrader::new(ConversionConfig::new("ORCHIDS"));
        let band = trader.band(&observation());

        // export: 1100 - 1 - 2; import: 1102 + 1 - 3
        assert_eq!(band.lower, dec!(1097));
        assert_eq!(band.upper, dec!(1100));
    }

    #[test]
    fn test_penalty_from_environment() {
        let model = ObservationModel::default();
        let mut obs = observation();
        assert_eq!(model.penalty(&obs), Decimal::ZERO);

        obs.humidity = 91.0;
        obs.sunlight = 1000.0;
        // two full steps above 80 plus the sunlight penalty
        assert_eq!(model.penalty(&obs), dec!(0.008));
        assert_eq!(model.adjust(dec!(1000), &obs), dec!(992));
    }

    #[test]
    fn test_inventory_is_converted_back() {
        let mut trader = ConversionTrader::new(ConversionConfig::new("ORCHIDS").with_max_conversion(10));
        let book = OrderBookSnapshot::from_levels(&[(dec!(1095), 5)], &[(dec!(1105), 5)]);
        let snapshot = MarketSnapshot::new(100)
            .with_book("ORCHIDS", book)
            .with_observation("ORCHIDS", observation())
            .with_position("ORCHIDS", -14);

        let (orders, conversions) = run(&mut trader, &snapshot);
        assert!(orders.is_empty());
        assert_eq!(conversions, 10);
    }

    #[test]
    fn test_conversion_and_fills_stay_within_limit() {
        let mut trader = ConversionTrader::new(ConversionConfig::new("ORCHIDS").with_max_conversion(10));
        let book = OrderBookSnapshot::from_levels(&[(dec!(1088), 5)], &[(dec!(1090), 500)]);
        let snapshot = MarketSnapshot::new(200)
            .with_book("ORCHIDS", book)
            .with_observation("ORCHIDS", observation())
            .with_position("ORCHIDS", -14);

        let (orders, conversions) = run(&mut trader, &snapshot);

        // -14 + 10 converted + 104 bought lands exactly on the limit
        assert_eq!(conversions, 10);
        assert_eq!(orders, vec![Order::buy("ORCHIDS", dec!(1090), 104)]);
    }

    #[test]
    fn test_ar1_forecast() {
        let trend: VecDeque<f64> = [60.0, 62.0, 64.0, 66.0, 68.0].into_iter().collect();
        assert_relative_eq!(ar1_forecast(&trend, 0.0).unwrap(), 70.0, epsilon = 1e-6);

        let flat: VecDeque<f64> = [70.0; 4].into_iter().collect();
        assert_eq!(ar1_forecast(&flat, 0.0), None);
        assert_relative_eq!(ar1_forecast(&flat, 0.01).unwrap(), 70.0, epsilon = 0.05);

        let short: VecDeque<f64> = [1.0, 2.0].into_iter().collect();
        assert_eq!(ar1_forecast(&short, 0.01), None);
    }

    #[test]
    fn test_forecast_humidity_drives_band() {
        let mut trader =
            ConversionTrader::new(ConversionConfig::new("ORCHIDS").with_forecast(10, 0.0));
        let book = OrderBookSnapshot::from_levels(&[(dec!(1050), 5)], &[(dec!(1150), 5)]);

        let mut obs = observation();
        for humidity in [76.0, 80.0, 84.0, 88.0] {
            obs.humidity = humidity;
            let snapshot = MarketSnapshot::new(0)
                .with_book("ORCHIDS", book.clone())
                .with_observation("ORCHIDS", obs.clone());
            run(&mut trader, &snapshot);
        }
        assert_eq!(trader.factors().len(), 4);

        // 88 now, 92 forecast: two humidity steps instead of one
        let expected = trader.expected_observation(&obs);
        assert_relative_eq!(expected.humidity, 92.0, epsilon = 1e-6);
        assert_eq!(expected.sunlight, 3000.0);
        assert_eq!(trader.band(&expected).lower, dec!(1092.600));
        assert_eq!(trader.band(&obs).lower, dec!(1094.800));
    }

    #[test]
    fn test_zero_forecast_window_uses_latest_reading() {
        let mut trader =
            ConversionTrader::new(ConversionConfig::new("ORCHIDS").with_forecast(0, 0.01));
        let mut obs = observation();
        for humidity in [60.0, 70.0, 80.0, 90.0] {
            obs.humidity = humidity;
            trader.factors.record(&obs, trader.config.forecast_window);
        }
        assert_eq!(trader.factors().len(), 1);
        assert_eq!(trader.expected_observation(&obs), obs);
    }

    #[test]
    fn test_takes_local_liquidity_through_costs() {
        let mut trader = ConversionTrader::new(ConversionConfig::new("ORCHIDS"));
        let book = OrderBookSnapshot::from_levels(
            &[(dec!(1102), 4), (dec!(1100), 6), (dec!(1099), 9)],
            &[(dec!(1096), 3), (dec!(1098), 7)],
        );
        let snapshot = MarketSnapshot::new(100)
            .with_book("ORCHIDS", book)
            .with_observation("ORCHIDS", observation());

        let (orders, conversions) = run(&mut trader, &snapshot);
        assert_eq!(
            orders,
            vec![
                Order::buy("ORCHIDS", dec!(1096), 3),
                Order::sell("ORCHIDS", dec!(1102), 4),
                Order::sell("ORCHIDS", dec!(1100), 6),
            ]
        );
        assert_eq!(conversions, 0);
    }

    #[test]
    fn test_no_observation_no_orders() {
        let mut trader = ConversionTrader::new(ConversionConfig::new("ORCHIDS"));
        let book = OrderBookSnapshot::from_levels(&[(dec!(2000), 4)], &[(dec!(1), 7)]);
        let snapshot = MarketSnapshot::new(0).with_book("ORCHIDS", book).with_position("ORCHIDS", 3);

        assert_eq!(run(&mut trader, &snapshot), (Vec::new(), 0));
    }
}
