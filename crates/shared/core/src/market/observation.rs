use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::values::Price;

/// Foreign-venue quote and environment readings for a convertible instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionObservation {
    pub bid_price: Price,
    pub ask_price: Price,
    pub transport_fees: Decimal,
    pub export_tariff: Decimal,
    pub import_tariff: Decimal,
    /// Exogenous factor, sunlight units per tick
    pub sunlight: f64,
    /// Exogenous factor, relative humidity in percent
    pub humidity: f64,
}

impl ConversionObservation {
    /// What one unit fetches when exported: foreign bid net of costs
    pub fn export_proceeds(&self, foreign_bid: Price) -> Price {
        foreign_bid - self.transport_fees - self.export_tariff
    }

    /// What one unit costs when imported: foreign ask plus costs
    pub fn import_cost(&self, foreign_ask: Price) -> Price {
        foreign_ask + self.transport_fees + self.import_tariff
    }
}
