use serde::{Deserialize, Serialize};

use super::Side;
use crate::instruments::InstrumentId;
use crate::values::{Price, Quantity};

/// A single limit order intent emitted for one tick
///
/// The quantity is signed: positive buys, negative sells. Orders are handed
/// to the execution collaborator and never retained by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// The instrument being traded
    pub instrument_id: InstrumentId,
    /// Limit price
    pub price: Price,
    /// Signed quantity
    pub quantity: Quantity,
}

impl Order {
    /// Create an order from a side and an unsigned size
    pub fn new(
        instrument_id: impl Into<InstrumentId>,
        side: Side,
        price: Price,
        size: Quantity,
    ) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            price,
            quantity: side.sign() * size.abs(),
        }
    }

    /// Buy `size` at `price`
    pub fn buy(instrument_id: impl Into<InstrumentId>, price: Price, size: Quantity) -> Self {
        Self::new(instrument_id, Side::Buy, price, size)
    }

    /// Sell `size` at `price`
    pub fn sell(instrument_id: impl Into<InstrumentId>, price: Price, size: Quantity) -> Self {
        Self::new(instrument_id, Side::Sell, price, size)
    }

    /// Side implied by the quantity sign
    pub fn side(&self) -> Option<Side> {
        Side::of_quantity(self.quantity)
    }

    pub fn is_buy(&self) -> bool {
        self.quantity > 0
    }

    pub fn is_sell(&self) -> bool {
        self.quantity < 0
    }

    /// Unsigned size
    pub fn size(&self) -> Quantity {
        self.quantity.abs()
    }
}

impl std::fmt::Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let side = if self.is_buy() { "BUY" } else { "SELL" };
        write!(
            f,
            "{} {} {} @ {}",
            side,
            self.size(),
            self.instrument_id,
            self.price
        )
    }
}
