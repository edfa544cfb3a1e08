//! Per-tick market input supplied by the harness

mod book;
mod observation;
mod snapshot;

pub use book::OrderBookSnapshot;
pub use observation::ConversionObservation;
pub use snapshot::MarketSnapshot;
