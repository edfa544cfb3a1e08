//! Instrument identifiers

mod instrument;

pub use instrument::InstrumentId;
