//! Position Ledger
//!
//! Inventory is synced from the execution side at the start of every tick.
//! Orders emitted during the tick are recorded as reservations, kept per
//! side so that the limit holds whether all buys, all sells, or any mix of
//! them end up filling.

use std::collections::BTreeMap;

use log::{debug, warn};
use meridian_core::{InstrumentId, Order, Quantity};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// Quantity already promised to emitted orders this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Total size of emitted buys (unsigned)
    pub buys: Quantity,
    /// Total size of emitted sells (unsigned)
    pub sells: Quantity,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionLedger {
    limits: BTreeMap<InstrumentId, Quantity>,
    positions: BTreeMap<InstrumentId, Quantity>,
    reserved: BTreeMap<InstrumentId, Reservation>,
}

impl PositionLedger {
    /// Create a ledger with absolute position limits per instrument
    pub fn new(limits: BTreeMap<InstrumentId, Quantity>) -> Self {
        Self {
            limits: limits.into_iter().map(|(id, l)| (id, l.abs())).collect(),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, instrument_id: impl Into<InstrumentId>, limit: Quantity) -> Self {
        self.limits.insert(instrument_id.into(), limit.abs());
        self
    }

    /// Replace positions with the authoritative reported inventory
    ///
    /// Reservations from the previous tick are dropped. Instruments missing
    /// from `reported` are treated as flat.
    pub fn sync(&mut self, reported: &BTreeMap<InstrumentId, Quantity>) {
        for (instrument_id, projected) in self.projected_positions() {
            let actual = reported.get(&instrument_id).copied().unwrap_or(0);
            if actual != projected {
                debug!(
                    "[Ledger] {} resynced: projected={} reported={}",
                    instrument_id, projected, actual
                );
            }
        }

        self.positions = reported
            .iter()
            .filter(|(_, q)| **q != 0)
            .map(|(id, q)| (id.clone(), *q))
            .collect();
        self.reserved.clear();

        for (instrument_id, position) in &self.positions {
            if let Some(limit) = self.limits.get(instrument_id)
                && position.abs() > *limit
            {
                warn!(
                    "[Ledger] {} reported position {} already beyond limit {}",
                    instrument_id, position, limit
                );
            }
        }
    }

    pub fn limit(&self, instrument_id: &InstrumentId) -> Option<Quantity> {
        self.limits.get(instrument_id).copied()
    }

    pub fn limits(&self) -> &BTreeMap<InstrumentId, Quantity> {
        &self.limits
    }

    /// Authoritative position as of the last sync
    pub fn position(&self, instrument_id: &InstrumentId) -> Quantity {
        self.positions.get(instrument_id).copied().unwrap_or(0)
    }

    pub fn reservation(&self, instrument_id: &InstrumentId) -> Reservation {
        self.reserved.get(instrument_id).copied().unwrap_or_default()
    }

    /// Position if every order emitted so far this tick fills
    pub fn projected_position(&self, instrument_id: &InstrumentId) -> Quantity {
        let reserved = self.reservation(instrument_id);
        self.position(instrument_id) + reserved.buys - reserved.sells
    }

    fn projected_positions(&self) -> BTreeMap<InstrumentId, Quantity> {
        self.positions
            .keys()
            .chain(self.reserved.keys())
            .map(|id| (id.clone(), self.projected_position(id)))
            .collect()
    }

    /// How much more may be bought this tick
    pub fn buy_capacity(&self, instrument_id: &InstrumentId) -> Quantity {
        let Some(limit) = self.limit(instrument_id) else {
            return 0;
        };
        let reserved = self.reservation(instrument_id);
        (limit - self.position(instrument_id) - reserved.buys).max(0)
    }

    /// How much more may be sold this tick (unsigned)
    pub fn sell_capacity(&self, instrument_id: &InstrumentId) -> Quantity {
        let Some(limit) = self.limit(instrument_id) else {
            return 0;
        };
        let reserved = self.reservation(instrument_id);
        (limit + self.position(instrument_id) - reserved.sells).max(0)
    }

    /// Shrink a signed desired quantity to what the limits still allow
    pub fn clamp(&self, instrument_id: &InstrumentId, desired: Quantity) -> Quantity {
        if desired > 0 {
            desired.min(self.buy_capacity(instrument_id))
        } else {
            -(-desired).min(self.sell_capacity(instrument_id))
        }
    }

    /// Check an order without recording it
    pub fn check(&self, order: &Order) -> Result<()> {
        let instrument_id = &order.instrument_id;
        let Some(limit) = self.limit(instrument_id) else {
            return Err(LedgerError::UnknownInstrument(instrument_id.clone()));
        };
        if order.quantity == 0 {
            return Err(LedgerError::EmptyOrder(instrument_id.clone()));
        }

        let capacity = if order.is_buy() {
            self.buy_capacity(instrument_id)
        } else {
            self.sell_capacity(instrument_id)
        };
        if order.size() > capacity {
            return Err(LedgerError::LimitExceeded {
                instrument_id: instrument_id.clone(),
                projected: self.projected_position(instrument_id),
                requested: order.quantity,
                limit,
            });
        }
        Ok(())
    }

    /// Check and record an order as emitted
    pub fn commit(&mut self, order: &Order) -> Result<()> {
        self.check(order)?;
        self.reserve(&order.instrument_id, order.quantity);
        Ok(())
    }

    /// Reserve capacity for a conversion request made this tick
    ///
    /// A conversion moves inventory just like a fill, so it is held against
    /// the same side as an order of that sign. Returns the part of
    /// `quantity` the limits allow, which is what gets reserved.
    pub fn reserve_conversion(&mut self, instrument_id: &InstrumentId, quantity: Quantity) -> Quantity {
        let allowed = self.clamp(instrument_id, quantity);
        if allowed != quantity {
            warn!(
                "[Ledger] {} conversion {} clamped to {}",
                instrument_id, quantity, allowed
            );
        }
        self.reserve(instrument_id, allowed);
        allowed
    }

    fn reserve(&mut self, instrument_id: &InstrumentId, quantity: Quantity) {
        if quantity == 0 {
            return;
        }
        let reserved = self.reserved.entry(instrument_id.clone()).or_default();
        if quantity > 0 {
            reserved.buys += quantity;
        } else {
            reserved.sells += quantity.saturating_abs();
        }
    }

    /// Check a set of orders as if they were committed together
    pub fn check_all(&self, orders: &[Order]) -> Result<()> {
        let mut scratch = self.clone();
        for order in orders {
            scratch.commit(order)?;
        }
        Ok(())
    }

    /// Commit a set of orders atomically: all of them or none
    pub fn commit_all(&mut self, orders: &[Order]) -> Result<()> {
        self.check_all(orders)?;
        for order in orders {
            self.commit(order)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ledger(limit: Quantity, position: Quantity) -> PositionLedger {
        let mut ledger = PositionLedger::default().with_limit("STARFRUIT", limit);
        let mut reported = BTreeMap::new();
        reported.insert(InstrumentId::from("STARFRUIT"), position);
        ledger.sync(&reported);
        ledger
    }

    #[test]
    fn test_capacity_from_position() {
        let ledger = ledger(20, 15);
        let id = InstrumentId::from("STARFRUIT");

        assert_eq!(ledger.buy_capacity(&id), 5);
        assert_eq!(ledger.sell_capacity(&id), 35);
        assert_eq!(ledger.clamp(&id, 10), 5);
        assert_eq!(ledger.clamp(&id, -50), -35);
    }

    #[test]
    fn test_reservations_reduce_capacity_per_side() {
        let mut ledger = ledger(20, 0);
        let id = InstrumentId::from("STARFRUIT");

        ledger.commit(&Order::buy("STARFRUIT", dec!(100), 12)).unwrap();
        ledger.commit(&Order::sell("STARFRUIT", dec!(102), 20)).unwrap();

        assert_eq!(ledger.buy_capacity(&id), 8);
        assert_eq!(ledger.sell_capacity(&id), 0);
        assert_eq!(ledger.projected_position(&id), -8);
    }

    #[test]
    fn test_conversion_reserves_capacity() {
        let mut ledger = ledger(100, -14);
        let id = InstrumentId::from("STARFRUIT");

        assert_eq!(ledger.reserve_conversion(&id, 10), 10);
        assert_eq!(ledger.buy_capacity(&id), 104);
        assert_eq!(ledger.sell_capacity(&id), 86);
        assert_eq!(ledger.projected_position(&id), -4);

        // Buying the rest still ends at the limit with the conversion applied
        assert!(ledger.commit(&Order::buy("STARFRUIT", dec!(1090), 105)).is_err());
        ledger.commit(&Order::buy("STARFRUIT", dec!(1090), 104)).unwrap();
        assert_eq!(ledger.projected_position(&id), 100);
    }

    #[test]
    fn test_conversion_clamped_to_capacity() {
        let mut ledger = ledger(20, 15);
        let id = InstrumentId::from("STARFRUIT");

        assert_eq!(ledger.reserve_conversion(&id, 8), 5);
        assert_eq!(ledger.buy_capacity(&id), 0);
        assert_eq!(ledger.reserve_conversion(&id, 0), 0);
    }

    #[test]
    fn test_commit_rejects_over_limit() {
        let mut ledger = ledger(20, 15);
        let err = ledger
            .commit(&Order::buy("STARFRUIT", dec!(100), 6))
            .unwrap_err();

        assert!(matches!(err, LedgerError::LimitExceeded { limit: 20, .. }));
        assert_eq!(ledger.reservation(&InstrumentId::from("STARFRUIT")), Reservation::default());
    }

    #[test]
    fn test_unknown_instrument_has_no_capacity() {
        let ledger = PositionLedger::default();
        let id = InstrumentId::from("ORCHIDS");

        assert_eq!(ledger.buy_capacity(&id), 0);
        assert_eq!(ledger.sell_capacity(&id), 0);
        assert!(matches!(
            ledger.check(&Order::buy("ORCHIDS", dec!(1), 1)),
            Err(LedgerError::UnknownInstrument(_))
        ));
    }

    #[test]
    fn test_sync_overrides_projection() {
        let _ = env_logger::try_init();
        let mut ledger = ledger(20, 0);
        let id = InstrumentId::from("STARFRUIT");
        ledger.commit(&Order::buy("STARFRUIT", dec!(100), 10)).unwrap();

        // Only 4 of the 10 filled
        let mut reported = BTreeMap::new();
        reported.insert(id.clone(), 4);
        ledger.sync(&reported);

        assert_eq!(ledger.position(&id), 4);
        assert_eq!(ledger.reservation(&id), Reservation::default());
        assert_eq!(ledger.buy_capacity(&id), 16);
    }

    #[test]
    fn test_commit_all_is_atomic() {
        let mut ledger = PositionLedger::default()
            .with_limit("GIFT_BASKET", 60)
            .with_limit("ROSES", 60);
        let orders = vec![
            Order::sell("GIFT_BASKET", dec!(70000), 2),
            Order::buy("ROSES", dec!(14000), 61),
        ];

        assert!(ledger.commit_all(&orders).is_err());
        assert_eq!(
            ledger.reservation(&InstrumentId::from("GIFT_BASKET")),
            Reservation::default()
        );
    }

    #[test]
    fn test_zero_order_rejected() {
        let ledger = ledger(20, 0);
        let order = Order {
            instrument_id: InstrumentId::from("STARFRUIT"),
            price: dec!(100),
            quantity: 0,
        };
        assert!(matches!(ledger.check(&order), Err(LedgerError::EmptyOrder(_))));
    }
}
