use serde::{Deserialize, Serialize};

use super::Side;
use crate::values::Quantity;

/// Position side - long (bought) or short (sold)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    /// Long position - bought the asset, profit when price rises
    Long,
    /// Short position - sold the asset, profit when price falls
    Short,
}

impl PositionSide {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            PositionSide::Long => PositionSide::Short,
            PositionSide::Short => PositionSide::Long,
        }
    }

    /// Direction of a signed inventory; `None` when flat
    pub fn of_inventory(inventory: Quantity) -> Option<Self> {
        match inventory.signum() {
            1 => Some(PositionSide::Long),
            -1 => Some(PositionSide::Short),
            _ => None,
        }
    }

    /// Order side that increases exposure in this direction
    pub fn opening_side(&self) -> Side {
        match self {
            PositionSide::Long => Side::Buy,
            PositionSide::Short => Side::Sell,
        }
    }

    /// Order side that reduces exposure in this direction
    pub fn closing_side(&self) -> Side {
        self.opening_side().opposite()
    }

    /// Signed inventory for an unsigned size held in this direction
    pub fn signed(&self, size: Quantity) -> Quantity {
        match self {
            PositionSide::Long => size,
            PositionSide::Short => -size,
        }
    }
}
