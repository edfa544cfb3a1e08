//! Order Sizer / Router
//!
//! Turns a fair-value band and the current book into concrete limit orders.
//! Levels are visited best price first and every emitted order is committed
//! to the ledger, so later levels (and later strategies in the same tick)
//! see the reduced capacity.

use log::{debug, warn};
use meridian_core::{InstrumentId, Order, Quantity, TICK};
use meridian_risk::PositionLedger;

use crate::estimator::Band;
use crate::orderbook::BookView;

/// Record an order with the ledger; a rejected order is dropped
pub fn commit(ledger: &mut PositionLedger, order: Order, orders: &mut Vec<Order>) -> bool {
    match ledger.commit(&order) {
        Ok(()) => {
            orders.push(order);
            true
        }
        Err(e) => {
            warn!("[Sizer] dropping {}: {}", order, e);
            false
        }
    }
}

/// Hit resting liquidity priced through the band
///
/// Buys every ask at or below `band.lower` and sells into every bid at or
/// above `band.upper`, one order per price level, until the level runs out
/// or the ledger has no capacity left on that side.
pub fn take_liquidity(
    instrument_id: &InstrumentId,
    book: &BookView<'_>,
    band: &Band,
    ledger: &mut PositionLedger,
) -> Vec<Order> {
    let mut orders = Vec::new();

    for (ask, volume) in book.asks().take_while(|(ask, _)| *ask <= band.lower) {
        let quantity = volume.min(ledger.buy_capacity(instrument_id));
        if quantity <= 0 {
            break;
        }
        commit(ledger, Order::buy(instrument_id.clone(), ask, quantity), &mut orders);
    }

    for (bid, volume) in book.bids().take_while(|(bid, _)| *bid >= band.upper) {
        let quantity = volume.min(ledger.sell_capacity(instrument_id));
        if quantity <= 0 {
            break;
        }
        commit(ledger, Order::sell(instrument_id.clone(), bid, quantity), &mut orders);
    }

    if !orders.is_empty() {
        debug!(
            "[Sizer] {} took {} levels against band [{}, {}]",
            instrument_id,
            orders.len(),
            band.lower,
            band.upper
        );
    }
    orders
}

/// Quote one tick inside the touch on each side
///
/// The buy goes at `min(best_bid + 1, lower)` and the sell at
/// `max(best_ask - 1, upper)`. A side with no resting orders gets no quote.
pub fn quote_passive(
    instrument_id: &InstrumentId,
    book: &BookView<'_>,
    band: &Band,
    quote_size: Quantity,
    ledger: &mut PositionLedger,
) -> Vec<Order> {
    let mut orders = Vec::new();
    let top = book.top_of_book();

    if top.has_bid() {
        let price = (top.best_bid + TICK).min(band.lower);
        let quantity = quote_size.min(ledger.buy_capacity(instrument_id));
        if quantity > 0 {
            commit(ledger, Order::buy(instrument_id.clone(), price, quantity), &mut orders);
        }
    }

    if top.has_ask() {
        let price = (top.best_ask - TICK).max(band.upper);
        let quantity = quote_size.min(ledger.sell_capacity(instrument_id));
        if quantity > 0 {
            commit(ledger, Order::sell(instrument_id.clone(), price, quantity), &mut orders);
        }
    }

    orders
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::OrderBookSnapshot;
    use rust_decimal_macros::dec;
    use std::collections::BTreeMap;

    fn ledger(position: Quantity) -> PositionLedger {
        let mut ledger = PositionLedger::default().with_limit("STARFRUIT", 20);
        let mut reported = BTreeMap::new();
        reported.insert(InstrumentId::from("STARFRUIT"), position);
        ledger.sync(&reported);
        ledger
    }

    fn id() -> InstrumentId {
        InstrumentId::from("STARFRUIT")
    }

    #[test]
    fn test_clamps_to_remaining_capacity() {
        let book = OrderBookSnapshot::from_levels(&[(dec!(4990), 4)], &[(dec!(4995), 10)]);
        let mut ledger = ledger(15);
        let band = Band::new(dec!(4996), dec!(5010));

        let orders = take_liquidity(&id(), &BookView::new(&book), &band, &mut ledger);

        assert_eq!(orders, vec![Order::buy("STARFRUIT", dec!(4995), 5)]);
        assert_eq!(ledger.buy_capacity(&id()), 0);
    }

    #[test]
    fn test_walks_levels_in_price_priority() {
        let book = OrderBookSnapshot::from_levels(
            &[(dec!(5012), 3), (dec!(5011), 4), (dec!(5010), 30), (dec!(5009), 8)],
            &[(dec!(5020), 5)],
        );
        let mut ledger = ledger(0);
        let band = Band::new(dec!(5000), dec!(5010));

        let orders = take_liquidity(&id(), &BookView::new(&book), &band, &mut ledger);

        assert_eq!(
            orders,
            vec![
                Order::sell("STARFRUIT", dec!(5012), 3),
                Order::sell("STARFRUIT", dec!(5011), 4),
                Order::sell("STARFRUIT", dec!(5010), 13),
            ]
        );
        // Thresholds honoured and the limit holds if everything fills
        assert!(orders.iter().all(|o| o.price >= band.upper));
        assert_eq!(ledger.projected_position(&id()), -20);
    }

    #[test]
    fn test_nothing_inside_band_emits_nothing() {
        let book = OrderBookSnapshot::from_levels(&[(dec!(9998), 5)], &[(dec!(10002), 5)]);
        let mut ledger = ledger(0);
        let band = Band::around(dec!(10000), dec!(3));

        assert!(take_liquidity(&id(), &BookView::new(&book), &band, &mut ledger).is_empty());
    }

    #[test]
    fn test_no_capacity_emits_no_zero_orders() {
        let book = OrderBookSnapshot::from_levels(&[], &[(dec!(10), 5), (dec!(11), 5)]);
        let mut ledger = ledger(20);
        let band = Band::new(dec!(100), dec!(200));

        assert!(take_liquidity(&id(), &BookView::new(&book), &band, &mut ledger).is_empty());
    }

    #[test]
    fn test_passive_quotes_pick_conservative_price() {
        let book = OrderBookSnapshot::from_levels(&[(dec!(9996), 5)], &[(dec!(10004), 5)]);
        let mut ledger = ledger(0);

        // Band tighter than the undercut on the buy side only
        let band = Band::new(dec!(9995), dec!(10001));
        let orders = quote_passive(&id(), &BookView::new(&book), &band, 8, &mut ledger);

        assert_eq!(
            orders,
            vec![
                Order::buy("STARFRUIT", dec!(9995), 8),
                Order::sell("STARFRUIT", dec!(10003), 8),
            ]
        );
    }

    #[test]
    fn test_passive_skips_empty_side_and_clamps() {
        let book = OrderBookSnapshot::from_levels(&[(dec!(9996), 5)], &[]);
        let mut ledger = ledger(15);
        let band = Band::new(dec!(10000), dec!(10000));

        let orders = quote_passive(&id(), &BookView::new(&book), &band, 8, &mut ledger);

        assert_eq!(orders, vec![Order::buy("STARFRUIT", dec!(9997), 5)]);
    }
}
