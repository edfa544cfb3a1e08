//! Meridian Core Domain
//!
//! Pure value types shared by every Meridian crate: identifiers, prices,
//! signed quantities, orders and the per-tick market snapshot.
//! This crate contains no I/O and no mutable global state.

pub mod entities;
pub mod instruments;
pub mod market;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{Order, PositionSide, Side};
pub use instruments::InstrumentId;
pub use market::{ConversionObservation, MarketSnapshot, OrderBookSnapshot};
pub use values::{Price, Quantity, TICK, Timestamp};
