//! Runner error types

use meridian_core::InstrumentId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("limit for {instrument_id} must be positive, got {limit}")]
    NonPositiveLimit {
        instrument_id: InstrumentId,
        limit: i64,
    },

    #[error("{instrument_id} is traded by more than one strategy")]
    SharedInstrument { instrument_id: InstrumentId },

    #[error("invalid strategy {index}: {source}")]
    Strategy {
        index: usize,
        source: meridian_strategy::ConfigError,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("failed to encode engine state: {0}")]
    Encode(String),

    #[error("failed to decode engine state: {0}")]
    Decode(String),
}
