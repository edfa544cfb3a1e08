//! Basket Arbitrage Engine
//!
//! A bundle should trade at a fixed linear combination of its components.
//! The spread `bundle_mid - Σ weight·component_mid` is tracked over a
//! rolling window; an excursion beyond `mean ± k·σ` is traded as whole
//! bundle units across every leg, and unwound once the spread comes back
//! inside the narrower reversion band.
//!
//! ```text
//!   spread > upper, bundle flat ──► sell bundle, buy components
//!   spread < lower, bundle flat ──► buy bundle, sell components
//!   bundle open, spread reverted ──► unwind in whole units
//!   unwind short of flat ──► PartiallyClosed: flatten every leg each tick
//!   legs out of proportion ──► PartiallyClosed: flatten every leg each tick
//! ```

use log::{debug, info, warn};
use meridian_core::{InstrumentId, Order, Price, Quantity, Side};
use meridian_risk::PositionLedger;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{BasketError, ConfigError};
use crate::history::{Dispersion, PriceHistory};
use crate::orderbook::BookView;
use crate::sizer;
use crate::strategy::{Strategy, TickContext};

/// One component of a bundle and how many of it a bundle contains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketLeg {
    pub instrument_id: InstrumentId,
    pub weight: Quantity,
}

impl BasketLeg {
    pub fn new(instrument_id: impl Into<InstrumentId>, weight: Quantity) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasketConfig {
    pub bundle: InstrumentId,
    pub components: Vec<BasketLeg>,
    /// Spreads kept and required before trading
    pub window: usize,
    /// Entry band multiplier `k`
    pub entry_multiplier: Decimal,
    /// Reversion band multiplier used for exits
    pub exit_multiplier: Decimal,
    /// Optional cap on bundle units traded per tick
    pub max_units_per_tick: Option<Quantity>,
}

impl Default for BasketConfig {
    fn default() -> Self {
        Self {
            bundle: InstrumentId::from("GIFT_BASKET"),
            components: vec![
                BasketLeg::new("CHOCOLATE", 4),
                BasketLeg::new("STRAWBERRIES", 6),
                BasketLeg::new("ROSES", 1),
            ],
            window: 48,
            entry_multiplier: dec!(3.1),
            exit_multiplier: dec!(0.5),
            max_units_per_tick: None,
        }
    }
}

impl BasketConfig {
    pub fn new(bundle: impl Into<InstrumentId>, components: Vec<BasketLeg>) -> Self {
        Self {
            bundle: bundle.into(),
            components,
            ..Default::default()
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_multipliers(mut self, entry: Decimal, exit: Decimal) -> Self {
        self.entry_multiplier = entry;
        self.exit_multiplier = exit;
        self
    }

    pub fn with_max_units_per_tick(mut self, units: Quantity) -> Self {
        self.max_units_per_tick = Some(units);
        self
    }

    /// Bundle first, then components
    pub fn instruments(&self) -> Vec<InstrumentId> {
        std::iter::once(self.bundle.clone())
            .chain(self.components.iter().map(|l| l.instrument_id.clone()))
            .collect()
    }

    /// Every leg with its weight, bundle first with weight 1
    fn legs(&self) -> impl Iterator<Item = (&InstrumentId, Quantity)> {
        std::iter::once((&self.bundle, 1))
            .chain(self.components.iter().map(|l| (&l.instrument_id, l.weight)))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.components.is_empty() {
            return Err(ConfigError::invalid("components", "basket needs at least one component"));
        }
        for leg in &self.components {
            if leg.weight <= 0 {
                return Err(BasketError::InvalidWeight {
                    instrument_id: leg.instrument_id.clone(),
                    weight: leg.weight,
                }
                .into());
            }
        }
        let mut ids = self.instruments();
        ids.sort();
        ids.dedup();
        if ids.len() != self.components.len() + 1 {
            return Err(ConfigError::invalid("components", "instruments must be distinct"));
        }
        if self.window < 2 {
            return Err(ConfigError::invalid("window", format!("must be at least 2, got {}", self.window)));
        }
        if self.exit_multiplier.is_sign_negative() || self.exit_multiplier > self.entry_multiplier {
            return Err(ConfigError::invalid(
                "exit_multiplier",
                format!(
                    "must be within [0, entry_multiplier={}], got {}",
                    self.entry_multiplier, self.exit_multiplier
                ),
            ));
        }
        if self.max_units_per_tick.is_some_and(|u| u <= 0) {
            return Err(ConfigError::invalid("max_units_per_tick", "must be positive"));
        }
        Ok(())
    }
}

/// Entry and reversion bands from the spread history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpreadBands {
    pub mean: Decimal,
    pub std: Decimal,
    pub upper: Decimal,
    pub lower: Decimal,
    pub exit_upper: Decimal,
    pub exit_lower: Decimal,
}

impl SpreadBands {
    pub fn reverted(&self, spread: Decimal) -> bool {
        spread >= self.exit_lower && spread <= self.exit_upper
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BasketMode {
    #[default]
    Trading,
    /// Flatten every leg each tick until all are zero
    PartiallyClosed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketArbitrage {
    config: BasketConfig,
    spreads: PriceHistory,
    mode: BasketMode,
}

impl BasketArbitrage {
    pub fn new(config: BasketConfig) -> Self {
        Self {
            spreads: PriceHistory::new(config.window),
            config,
            mode: BasketMode::Trading,
        }
    }

    pub fn config(&self) -> &BasketConfig {
        &self.config
    }

    pub fn mode(&self) -> BasketMode {
        self.mode
    }

    pub fn spreads(&self) -> &PriceHistory {
        &self.spreads
    }

    /// Spread from the legs' mid-prices; `None` if any leg lacks a mid
    pub fn spread(&self, ctx: &TickContext<'_>) -> Option<Decimal> {
        let mut spread = Decimal::ZERO;
        for (instrument_id, weight) in self.config.legs() {
            let mid = ctx.book(instrument_id).and_then(|b| BookView::new(b).mid_price());
            let Some(mid) = mid else {
                debug!("[Basket] {} has no mid-price, skipping tick", instrument_id);
                return None;
            };
            if instrument_id == &self.config.bundle {
                spread += mid;
            } else {
                spread -= mid * Decimal::from(weight);
            }
        }
        Some(spread)
    }

    /// Bands from the recorded history, once it spans the window
    pub fn bands(&self) -> Option<SpreadBands> {
        if self.spreads.len() < self.config.window {
            return None;
        }
        let mean = self.spreads.mean()?;
        let std = self.spreads.std_dev(Dispersion::Population)?;
        let entry = self.config.entry_multiplier * std;
        let exit = self.config.exit_multiplier * std;
        Some(SpreadBands {
            mean,
            std,
            upper: mean + entry,
            lower: mean - entry,
            exit_upper: mean + exit,
            exit_lower: mean - exit,
        })
    }

    /// Orders for `units` bundle units, bundle traded on `bundle_side`
    ///
    /// Units are first reduced to what every leg's counter-party volume and
    /// ledger capacity allow, in whole-unit steps. Returns no orders when
    /// nothing whole remains.
    fn unit_orders(
        &self,
        bundle_side: Side,
        units: Quantity,
        ctx: &TickContext<'_>,
    ) -> Result<Vec<Order>, BasketError> {
        let mut units = units;
        let mut quotes = Vec::new();

        for (instrument_id, weight) in self.config.legs() {
            if weight <= 0 {
                return Err(BasketError::InvalidWeight {
                    instrument_id: instrument_id.clone(),
                    weight,
                });
            }
            let side = if instrument_id == &self.config.bundle {
                bundle_side
            } else {
                bundle_side.opposite()
            };
            let Some(book) = ctx.book(instrument_id) else {
                return Ok(Vec::new());
            };
            let view = BookView::new(book);
            let touch = match side {
                Side::Buy => view.best_ask(),
                Side::Sell => view.best_bid(),
            };
            let Some((price, volume)) = touch else {
                return Ok(Vec::new());
            };
            let capacity = match side {
                Side::Buy => ctx.ledger.buy_capacity(instrument_id),
                Side::Sell => ctx.ledger.sell_capacity(instrument_id),
            };

            units = units.min(volume / weight).min(capacity / weight);
            quotes.push((instrument_id, weight, side, price));
        }

        if units <= 0 {
            return Ok(Vec::new());
        }

        quotes
            .into_iter()
            .map(|(instrument_id, weight, side, price)| {
                leg_order(instrument_id, side, price, units * weight, weight)
            })
            .collect()
    }

    /// Emit a set of legs atomically, or nothing
    fn emit(&self, orders: Vec<Order>, ctx: &mut TickContext<'_>) -> Vec<Order> {
        match ctx.ledger.commit_all(&orders) {
            Ok(()) => orders,
            Err(e) => {
                warn!("[Basket] {} dropping leg set: {}", self.config.bundle, e);
                Vec::new()
            }
        }
    }

    fn enter(&self, bundle_side: Side, spread: Decimal, ctx: &mut TickContext<'_>) -> Vec<Order> {
        let units = self.config.max_units_per_tick.unwrap_or(Quantity::MAX);
        match self.unit_orders(bundle_side, units, ctx) {
            Ok(orders) if !orders.is_empty() => {
                info!(
                    "[Basket] {} entry {:?} bundle at spread {}: {} legs",
                    self.config.bundle,
                    bundle_side,
                    spread,
                    orders.len()
                );
                self.emit(orders, ctx)
            }
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!("[Basket] {} entry skipped: {}", self.config.bundle, e);
                Vec::new()
            }
        }
    }

    /// Unwind open bundle units in whole steps
    fn exit(&mut self, bundle_position: Quantity, ctx: &mut TickContext<'_>) -> Vec<Order> {
        let bundle_side = if bundle_position > 0 { Side::Sell } else { Side::Buy };
        let open_units = bundle_position.abs();

        // Components were traded opposite the bundle; only unwind what they hold
        let mut units = open_units;
        for leg in &self.config.components {
            let held = ctx.position(&leg.instrument_id);
            let expected = -bundle_position.signum();
            units = if held.signum() == expected && leg.weight > 0 {
                units.min(held.abs() / leg.weight)
            } else {
                0
            };
        }
        if let Some(cap) = self.config.max_units_per_tick {
            units = units.min(cap);
        }

        let orders = match self.unit_orders(bundle_side, units, ctx) {
            Ok(orders) => orders,
            Err(e) => {
                warn!("[Basket] {} exit skipped: {}", self.config.bundle, e);
                Vec::new()
            }
        };
        let orders = self.emit(orders, ctx);

        let unwound = orders
            .iter()
            .find(|o| o.instrument_id == self.config.bundle)
            .map(|o| o.size())
            .unwrap_or(0);
        let flat_after = unwound == open_units
            && self.config.components.iter().all(|leg| {
                ctx.position(&leg.instrument_id).abs() == unwound * leg.weight
            });
        if !flat_after {
            info!(
                "[Basket] {} unwound {}/{} units, entering partially closed mode",
                self.config.bundle, unwound, open_units
            );
            self.mode = BasketMode::PartiallyClosed;
        } else {
            info!("[Basket] {} unwound {} units", self.config.bundle, unwound);
        }
        orders
    }

    /// Push every non-zero leg toward zero at the touch
    fn flatten(&self, ctx: &mut TickContext<'_>) -> Vec<Order> {
        let mut orders = Vec::new();
        for (instrument_id, _) in self.config.legs() {
            let position = ctx.position(instrument_id);
            if position == 0 {
                continue;
            }
            let Some(book) = ctx.book(instrument_id) else {
                continue;
            };
            let view = BookView::new(book);
            let touch = if position > 0 { view.best_bid() } else { view.best_ask() };
            let Some((price, volume)) = touch else {
                continue;
            };

            let desired = -position.signum() * volume.min(position.abs());
            let quantity = ctx.ledger.clamp(instrument_id, desired);
            if quantity != 0 {
                let order = Order {
                    instrument_id: instrument_id.clone(),
                    price,
                    quantity,
                };
                sizer::commit(ctx.ledger, order, &mut orders);
            }
        }
        if !orders.is_empty() {
            debug!("[Basket] {} flattening {} legs", self.config.bundle, orders.len());
        }
        orders
    }

    fn all_legs_flat(&self, ctx: &TickContext<'_>) -> bool {
        self.config.legs().all(|(id, _)| ctx.position(id) == 0)
    }

    /// Every component holds exactly the offset of the open bundle units
    fn legs_balanced(&self, ctx: &TickContext<'_>) -> bool {
        let bundle_position = ctx.position(&self.config.bundle);
        self.config.components.iter().all(|leg| {
            ctx.position(&leg.instrument_id) == bundle_position.saturating_mul(-leg.weight)
        })
    }
}

/// Build one leg, refusing sizes that are not whole bundle units
fn leg_order(
    instrument_id: &InstrumentId,
    side: Side,
    price: Price,
    size: Quantity,
    weight: Quantity,
) -> Result<Order, BasketError> {
    if weight <= 0 {
        return Err(BasketError::InvalidWeight {
            instrument_id: instrument_id.clone(),
            weight,
        });
    }
    if size % weight != 0 {
        return Err(BasketError::FractionalLeg {
            instrument_id: instrument_id.clone(),
            quantity: size,
            weight,
        });
    }
    Ok(Order::new(instrument_id.clone(), side, price, size))
}

impl Strategy for BasketArbitrage {
    fn name(&self) -> &str {
        self.config.bundle.as_str()
    }

    fn instruments(&self) -> Vec<InstrumentId> {
        self.config.instruments()
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> Vec<Order> {
        if self.mode == BasketMode::Trading && !self.legs_balanced(ctx) {
            info!(
                "[Basket] {} legs out of proportion with bundle position {}, flattening",
                self.config.bundle,
                ctx.position(&self.config.bundle)
            );
            self.mode = BasketMode::PartiallyClosed;
        }

        if self.mode == BasketMode::PartiallyClosed {
            if self.all_legs_flat(ctx) {
                info!("[Basket] {} all legs flat, resuming", self.config.bundle);
                self.mode = BasketMode::Trading;
            } else {
                if let Some(spread) = self.spread(ctx) {
                    self.spreads.push(spread);
                }
                return self.flatten(ctx);
            }
        }

        let Some(spread) = self.spread(ctx) else {
            return Vec::new();
        };
        let bands = self.bands();
        self.spreads.push(spread);
        let Some(bands) = bands else {
            return Vec::new();
        };

        let bundle_position = ctx.position(&self.config.bundle);
        if bundle_position == 0 {
            if spread > bands.upper {
                self.enter(Side::Sell, spread, ctx)
            } else if spread < bands.lower {
                self.enter(Side::Buy, spread, ctx)
            } else {
                Vec::new()
            }
        } else if bands.reverted(spread) {
            self.exit(bundle_position, ctx)
        } else {
            Vec::new()
        }
    }
}
