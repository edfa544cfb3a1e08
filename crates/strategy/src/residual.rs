//! Trend residual crossing trader
//!
//! A straight line is fitted through the recent mids on every tick and the
//! residuals of the window are measured against it. When the latest
//! residual changes sign a candidate is started, and it opens once the
//! residuals it has tracked since the crossing move back toward the line.
//!
//! ```text
//!   residual + → -                         ──► long candidate
//!   residual - → +                         ──► short candidate
//!   long candidate,  mean residual step >= 0 ──► buy at best ask
//!   short candidate, mean residual step <= 0 ──► sell at best bid
//!   long,  residual >= 0                   ──► sell the position at best bid
//!   short, residual <= 0                   ──► buy the position at best ask
//! ```

use std::cmp::Ordering;

use log::{debug, info};
use meridian_core::{InstrumentId, Order, PositionSide, Quantity};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, EstimateError};
use crate::estimator::polyfit;
use crate::history::PriceHistory;
use crate::orderbook::BookView;
use crate::sizer;
use crate::strategy::{Strategy, TickContext};

/// Mids needed before a line says anything about the residuals
pub const MIN_FIT_POINTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualCrossConfig {
    pub instrument_id: InstrumentId,
    /// Mids in the fitted window
    #[serde(default = "default_window")]
    pub window: usize,
    /// Size of an opening order
    #[serde(default = "default_order_size")]
    pub order_size: Quantity,
}

fn default_window() -> usize {
    10
}

fn default_order_size() -> Quantity {
    1
}

impl ResidualCrossConfig {
    pub fn new(instrument_id: impl Into<InstrumentId>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            window: default_window(),
            order_size: default_order_size(),
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_order_size(mut self, size: Quantity) -> Self {
        self.order_size = size;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window < MIN_FIT_POINTS {
            return Err(ConfigError::invalid(
                "window",
                format!("must be at least {}, got {}", MIN_FIT_POINTS, self.window),
            ));
        }
        if self.order_size <= 0 {
            return Err(ConfigError::invalid(
                "order_size",
                format!("must be positive, got {}", self.order_size),
            ));
        }
        Ok(())
    }
}

/// A crossing waiting for confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub direction: PositionSide,
    /// Residuals tracked since the crossing, the crossing one included
    pub tracked: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidualCrossTrader {
    config: ResidualCrossConfig,
    mids: PriceHistory,
    candidate: Option<Candidate>,
}

impl ResidualCrossTrader {
    pub fn new(config: ResidualCrossConfig) -> Self {
        Self {
            mids: PriceHistory::new(config.window),
            candidate: None,
            config,
        }
    }

    pub fn config(&self) -> &ResidualCrossConfig {
        &self.config
    }

    pub fn mids(&self) -> &PriceHistory {
        &self.mids
    }

    pub fn candidate(&self) -> Option<Candidate> {
        self.candidate
    }

    /// Residual of every mid in the window against a fitted line, oldest
    /// first
    pub fn residuals(&self) -> Result<Vec<f64>, EstimateError> {
        let have = self.mids.len();
        if have < MIN_FIT_POINTS {
            return Err(EstimateError::InsufficientData {
                have,
                need: MIN_FIT_POINTS,
            });
        }
        let ys = self.mids.to_f64();
        if ys.len() != have {
            return Err(EstimateError::Degenerate("price outside f64 range".to_string()));
        }
        let xs: Vec<f64> = (0..ys.len()).map(|i| i as f64).collect();
        let line = polyfit(&xs, &ys, 1)?;
        Ok(xs.iter().zip(&ys).map(|(x, y)| y - line.eval(*x)).collect())
    }

    /// Advance a pending candidate by one residual; true once it confirms
    fn confirm(&mut self, residuals: &[f64]) -> bool {
        let Some(candidate) = self.candidate.as_mut() else {
            return false;
        };
        candidate.tracked = (candidate.tracked + 1).min(residuals.len());
        let tracked = &residuals[residuals.len() - candidate.tracked..];
        let steps: Vec<f64> = tracked.windows(2).map(|w| w[1] - w[0]).collect();
        if steps.is_empty() {
            return false;
        }
        let mean_step = steps.iter().sum::<f64>() / steps.len() as f64;
        debug!(
            "[ResidualCross] {} {:?} candidate mean step {:.4}",
            self.config.instrument_id, candidate.direction, mean_step
        );
        match candidate.direction {
            PositionSide::Long => mean_step >= 0.0,
            PositionSide::Short => mean_step <= 0.0,
        }
    }
}

fn sign(value: f64, tolerance: f64) -> i8 {
    if value > tolerance {
        1
    } else if value < -tolerance {
        -1
    } else {
        0
    }
}

impl Strategy for ResidualCrossTrader {
    fn name(&self) -> &str {
        self.config.instrument_id.as_str()
    }

    fn instruments(&self) -> Vec<InstrumentId> {
        vec![self.config.instrument_id.clone()]
    }

    fn on_tick(&mut self, ctx: &mut TickContext<'_>) -> Vec<Order> {
        let id = self.config.instrument_id.clone();
        let Some(book) = ctx.book(&id) else {
            return Vec::new();
        };
        let view = BookView::new(book);
        let (Some((bid, bid_volume)), Some((ask, ask_volume)), Some(mid)) =
            (view.best_bid(), view.best_ask(), view.mid_price())
        else {
            debug!("[ResidualCross] {} one-sided book, skipping", id);
            return Vec::new();
        };
        self.mids.push(mid);

        let residuals = match self.residuals() {
            Ok(residuals) => residuals,
            Err(e) => {
                debug!("[ResidualCross] {} no fit: {}", id, e);
                return Vec::new();
            }
        };
        let current = residuals[residuals.len() - 1];
        let previous = residuals[residuals.len() - 2];
        let tolerance = 1e-9 * mid.to_f64().unwrap_or(1.0).abs().max(1.0);
        let position = ctx.position(&id);

        let (price, desired) = if position != 0 {
            self.candidate = None;
            if position > 0 && current >= -tolerance {
                info!("[ResidualCross] {} residual back above the line, closing long {}", id, position);
                (bid, -position.min(bid_volume))
            } else if position < 0 && current <= tolerance {
                info!("[ResidualCross] {} residual back below the line, closing short {}", id, position);
                (ask, position.abs().min(ask_volume))
            } else {
                return Vec::new();
            }
        } else {
            let crossing = match sign(current, tolerance).cmp(&sign(previous, tolerance)) {
                Ordering::Less => Some(PositionSide::Long),
                Ordering::Greater => Some(PositionSide::Short),
                Ordering::Equal => None,
            };
            if let Some(direction) = crossing {
                debug!("[ResidualCross] {} residual crossed, {:?} candidate", id, direction);
                self.candidate = Some(Candidate { direction, tracked: 1 });
                return Vec::new();
            }
            if !self.confirm(&residuals) {
                return Vec::new();
            }
            let Some(candidate) = self.candidate.take() else {
                return Vec::new();
            };
            info!("[ResidualCross] {} opening {:?}, residual {:.4}", id, candidate.direction, current);
            match candidate.direction {
                PositionSide::Long => (ask, self.config.order_size.min(ask_volume)),
                PositionSide::Short => (bid, -self.config.order_size.min(bid_volume)),
            }
        };

        let mut orders = Vec::new();
        let quantity = ctx.ledger.clamp(&id, desired);
        if quantity != 0 {
            let order = Order {
                instrument_id: id,
                price,
                quantity,
            };
            sizer::commit(ctx.ledger, order, &mut orders);
        }
        orders
    }
}
