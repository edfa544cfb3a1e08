//! Position State Machine
//!
//! Tracks a directional bet on one instrument:
//!
//! ```text
//!   Flat ──open──► Opening ──resync──► Open ──close (partial)──► PartiallyClosing
//!    ▲                                  │                              │
//!    └────────────── close (full) ──────┴──────── close (rest) ───────┘
//!
//!   any open phase ──flip──► Opening (opposite direction)
//! ```
//!
//! Reported inventory always wins: `resync` runs at the start of every
//! tick and overwrites direction and remaining size.

use log::debug;
use meridian_core::{PositionSide, Price, Quantity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionPhase {
    #[default]
    Flat,
    /// Opening order emitted, fill not yet reported
    Opening,
    Open,
    /// A close has started but inventory remains
    PartiallyClosing,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {event} while {phase:?}")]
    InvalidPhase {
        phase: PositionPhase,
        event: &'static str,
    },

    #[error("{event} size must be positive, got {size}")]
    NonPositiveSize { event: &'static str, size: Quantity },

    #[error("closing {size} overshoots remaining {remaining}; use flip")]
    Overshoot { size: Quantity, remaining: Quantity },

    #[error("flip of {size} does not exceed remaining {remaining}")]
    NoOvershoot { size: Quantity, remaining: Quantity },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionState {
    phase: PositionPhase,
    direction: Option<PositionSide>,
    /// Price of the most recent opening or adding fill
    entry_price: Option<Price>,
    /// Open size still to be closed (unsigned)
    remaining: Quantity,
}

impl PositionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> PositionPhase {
        self.phase
    }

    pub fn direction(&self) -> Option<PositionSide> {
        self.direction
    }

    pub fn entry_price(&self) -> Option<Price> {
        self.entry_price
    }

    pub fn remaining(&self) -> Quantity {
        self.remaining
    }

    pub fn is_flat(&self) -> bool {
        self.phase == PositionPhase::Flat
    }

    /// Tracked inventory as a signed quantity
    pub fn inventory(&self) -> Quantity {
        self.direction
            .map(|d| d.signed(self.remaining))
            .unwrap_or(0)
    }

    /// Overwrite tracked inventory with the reported one
    ///
    /// Returns `true` when the tracked state disagreed. An unfilled opening
    /// falls back to Flat; a filled one becomes Open. A partial close stays
    /// partial while inventory remains on the same side.
    pub fn resync(&mut self, reported: Quantity) -> bool {
        let desync = self.inventory() != reported;
        if desync {
            debug!(
                "[PositionState] resync: tracked={} reported={} phase={:?}",
                self.inventory(),
                reported,
                self.phase
            );
        }

        match PositionSide::of_inventory(reported) {
            None => *self = Self::default(),
            Some(side) => {
                let same_side = self.direction == Some(side);
                self.phase = match self.phase {
                    PositionPhase::PartiallyClosing if same_side => PositionPhase::PartiallyClosing,
                    _ => PositionPhase::Open,
                };
                if !same_side {
                    self.entry_price = None;
                }
                self.direction = Some(side);
                self.remaining = reported.abs();
            }
        }
        desync
    }

    /// Flat → Opening
    pub fn open(
        &mut self,
        direction: PositionSide,
        size: Quantity,
        price: Price,
    ) -> Result<(), TransitionError> {
        if self.phase != PositionPhase::Flat {
            return Err(self.invalid("open"));
        }
        if size <= 0 {
            return Err(TransitionError::NonPositiveSize { event: "open", size });
        }
        *self = Self {
            phase: PositionPhase::Opening,
            direction: Some(direction),
            entry_price: Some(price),
            remaining: size,
        };
        Ok(())
    }

    /// Increase an Open position in its current direction
    pub fn add(&mut self, size: Quantity, price: Price) -> Result<(), TransitionError> {
        if self.phase != PositionPhase::Open {
            return Err(self.invalid("add"));
        }
        if size <= 0 {
            return Err(TransitionError::NonPositiveSize { event: "add", size });
        }
        self.remaining += size;
        self.entry_price = Some(price);
        Ok(())
    }

    /// Reduce the position by `size`, at most the remaining size
    pub fn close(&mut self, size: Quantity) -> Result<(), TransitionError> {
        if self.phase == PositionPhase::Flat {
            return Err(self.invalid("close"));
        }
        if size <= 0 {
            return Err(TransitionError::NonPositiveSize { event: "close", size });
        }
        if size > self.remaining {
            return Err(TransitionError::Overshoot {
                size,
                remaining: self.remaining,
            });
        }

        if size == self.remaining {
            *self = Self::default();
        } else {
            self.remaining -= size;
            self.phase = PositionPhase::PartiallyClosing;
        }
        Ok(())
    }

    /// Close through flat and open the excess in the opposite direction
    pub fn flip(&mut self, size: Quantity, price: Price) -> Result<(), TransitionError> {
        let Some(direction) = self.direction else {
            return Err(self.invalid("flip"));
        };
        if self.phase == PositionPhase::Flat {
            return Err(self.invalid("flip"));
        }
        if size <= self.remaining {
            return Err(TransitionError::NoOvershoot {
                size,
                remaining: self.remaining,
            });
        }

        *self = Self {
            phase: PositionPhase::Opening,
            direction: Some(direction.opposite()),
            entry_price: Some(price),
            remaining: size - self.remaining,
        };
        Ok(())
    }

    fn invalid(&self, event: &'static str) -> TransitionError {
        TransitionError::InvalidPhase {
            phase: self.phase,
            event,
        }
    }
}
