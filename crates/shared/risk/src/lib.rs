//! Meridian Risk
//!
//! Owns the authoritative signed inventory per instrument for the duration
//! of a tick and checks every proposed order against the hard position
//! limits before it can be emitted.
//!
//! ```text
//!   reported inventory ──► sync() ──► PositionLedger ◄── commit(order)
//!                                          │
//!                                          ▼
//!                          buy_capacity / sell_capacity / clamp
//! ```

pub mod error;
pub mod ledger;

// Re-export main types
pub use error::{LedgerError, Result};
pub use ledger::{PositionLedger, Reservation};
