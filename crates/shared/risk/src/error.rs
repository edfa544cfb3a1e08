//! Ledger errors

use meridian_core::{InstrumentId, Quantity};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(
        "Position limit exceeded for {instrument_id}: projected={projected}, requested={requested}, limit={limit}"
    )]
    LimitExceeded {
        instrument_id: InstrumentId,
        projected: Quantity,
        requested: Quantity,
        limit: Quantity,
    },

    #[error("No position limit configured for {0}")]
    UnknownInstrument(InstrumentId),

    #[error("Zero-quantity order for {0}")]
    EmptyOrder(InstrumentId),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
