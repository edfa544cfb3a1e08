//! Strategy errors

use meridian_core::InstrumentId;
use thiserror::Error;

/// Why a fair-value band could not be produced this tick
///
/// Neither variant is fatal: the caller skips trading the instrument for
/// the tick and tries again on the next one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimateError {
    #[error("insufficient data: have {have} observations, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("degenerate input: {0}")]
    Degenerate(String),
}

/// Polynomial least-squares failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FitError {
    #[error("x and y lengths differ: {xs} vs {ys}")]
    LengthMismatch { xs: usize, ys: usize },

    #[error("need at least {need} points for this degree, have {have}")]
    NotEnoughPoints { have: usize, need: usize },

    #[error("singular system: x values do not span the requested degree")]
    Singular,
}

impl From<FitError> for EstimateError {
    fn from(err: FitError) -> Self {
        EstimateError::Degenerate(err.to_string())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BasketError {
    #[error("leg {instrument_id}: quantity {quantity} is not a multiple of weight {weight}")]
    FractionalLeg {
        instrument_id: InstrumentId,
        quantity: i64,
        weight: i64,
    },

    #[error("leg {instrument_id}: weight must be positive, got {weight}")]
    InvalidWeight { instrument_id: InstrumentId, weight: i64 },

    #[error("basket leg rejected by ledger: {0}")]
    Ledger(#[from] meridian_risk::LedgerError),
}

/// Invalid strategy parameters
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error(transparent)]
    Basket(#[from] BasketError),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
