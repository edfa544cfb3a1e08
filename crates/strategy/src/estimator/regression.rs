//! Regression band estimator
//!
//! Fits a low-degree polynomial of mid-price against a synthetic time index,
//! optionally after low-pass filtering the window, and extrapolates to the
//! next step.

use meridian_core::{Price, TICK};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{Band, FairValueEstimator, filter::low_pass};
use crate::error::{ConfigError, EstimateError, FitError};
use crate::history::{Dispersion, PriceHistory};
use crate::orderbook::TopOfBook;

/// Highest polynomial degree accepted by the estimator
pub const MAX_DEGREE: usize = 4;

/// How far the band extends either side of the prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BandWidth {
    /// Constant price offset
    Fixed { offset: Decimal },
    /// Rolling population std-dev of the window times a multiplier
    StdDev { multiplier: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionConfig {
    /// Number of mid-prices kept and fitted
    pub window: usize,
    /// Polynomial degree, 1..=4
    pub degree: usize,
    /// Fraction of central frequencies removed before fitting, in [0, 1)
    pub smoothing: f64,
    /// Steps past the newest observation to extrapolate to
    pub lookahead: f64,
    pub band: BandWidth,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            window: 20,
            degree: 1,
            smoothing: 0.0,
            lookahead: 1.0,
            band: BandWidth::Fixed { offset: dec!(1) },
        }
    }
}

impl RegressionConfig {
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = degree;
        self
    }

    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_band(mut self, band: BandWidth) -> Self {
        self.band = band;
        self
    }

    /// Observations needed before a band is produced
    pub fn min_observations(&self) -> usize {
        (self.degree + 1).max(3)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_DEGREE).contains(&self.degree) {
            return Err(ConfigError::invalid(
                "degree",
                format!("must be 1..={}, got {}", MAX_DEGREE, self.degree),
            ));
        }
        if self.window < self.min_observations() {
            return Err(ConfigError::invalid(
                "window",
                format!(
                    "must hold at least {} observations, got {}",
                    self.min_observations(),
                    self.window
                ),
            ));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(ConfigError::invalid(
                "smoothing",
                format!("must be in [0, 1), got {}", self.smoothing),
            ));
        }
        if !self.lookahead.is_finite() || self.lookahead < 0.0 {
            return Err(ConfigError::invalid(
                "lookahead",
                format!("must be a non-negative number, got {}", self.lookahead),
            ));
        }
        let width = match &self.band {
            BandWidth::Fixed { offset } => offset,
            BandWidth::StdDev { multiplier } => multiplier,
        };
        if width.is_sign_negative() {
            return Err(ConfigError::invalid("band", "width must not be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionEstimator {
    config: RegressionConfig,
    history: PriceHistory,
}

impl RegressionEstimator {
    pub fn new(config: RegressionConfig) -> Self {
        let history = PriceHistory::new(config.window);
        Self { config, history }
    }

    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    pub fn history(&self) -> &PriceHistory {
        &self.history
    }

    /// Append a mid-price directly
    pub fn push(&mut self, mid: Price) {
        self.history.push(mid);
    }

    /// Predicted price for the configured lookahead, before rounding
    pub fn predict(&self) -> Result<f64, EstimateError> {
        let need = self.config.min_observations();
        let have = self.history.len();
        if have < need {
            return Err(EstimateError::InsufficientData { have, need });
        }

        let ys = self.history.to_f64();
        if ys.len() != have {
            return Err(EstimateError::Degenerate(
                "price outside f64 range".to_string(),
            ));
        }
        let ys = low_pass(&ys, self.config.smoothing);
        let xs: Vec<f64> = (0..ys.len()).map(|i| i as f64).collect();

        let poly = polyfit(&xs, &ys, self.config.degree)?;
        let x = (have - 1) as f64 + self.config.lookahead;
        let predicted = poly.eval(x);
        if !predicted.is_finite() {
            return Err(EstimateError::Degenerate(format!(
                "non-finite prediction at x={}",
                x
            )));
        }
        Ok(predicted)
    }
}

impl FairValueEstimator for RegressionEstimator {
    fn observe(&mut self, top: &TopOfBook) {
        if let Some(mid) = top.mid_price() {
            self.history.push(mid);
        }
    }

    fn estimate(&self) -> Result<Band, EstimateError> {
        let predicted = self.predict()?;
        let fair = Decimal::from_f64(predicted)
            .map(round_to_tick)
            .ok_or_else(|| EstimateError::Degenerate(format!("prediction {}", predicted)))?;

        let width = match &self.config.band {
            BandWidth::Fixed { offset } => *offset,
            BandWidth::StdDev { multiplier } => {
                self.history
                    .std_dev(Dispersion::Population)
                    .unwrap_or(Decimal::ZERO)
                    * multiplier
            }
        };
        Ok(Band::around(fair, width))
    }

    fn observations(&self) -> usize {
        self.history.len()
    }
}

fn round_to_tick(price: Price) -> Price {
    (price / TICK).round() * TICK
}

/// Fitted polynomial in a centred, scaled coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    /// Coefficients in ascending power order of the scaled coordinate
    coefficients: Vec<f64>,
    center: f64,
    scale: f64,
}

impl Polynomial {
    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Evaluate at an unscaled x
    pub fn eval(&self, x: f64) -> f64 {
        let u = (x - self.center) / self.scale;
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, c| acc * u + c)
    }
}

/// Least-squares polynomial fit of `ys` against `xs`
///
/// x values are mapped onto [-1, 1] before building the normal equations
/// so that degree-4 fits over long windows stay well conditioned. Input
/// that cannot determine the requested degree, such as identical x values,
/// yields `FitError::Singular`.
pub fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Result<Polynomial, FitError> {
    if xs.len() != ys.len() {
        return Err(FitError::LengthMismatch {
            xs: xs.len(),
            ys: ys.len(),
        });
    }
    let terms = degree + 1;
    if xs.len() < terms {
        return Err(FitError::NotEnoughPoints {
            have: xs.len(),
            need: terms,
        });
    }

    let (min, max) = xs
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(*x), hi.max(*x))
        });
    let span = max - min;
    if !span.is_finite() || span <= f64::EPSILON * max.abs().max(1.0) {
        return Err(FitError::Singular);
    }
    let center = (max + min) / 2.0;
    let scale = span / 2.0;

    // Normal equations: A c = b with A[j][k] = Σ u^(j+k), b[j] = Σ u^j y
    let mut power_sums = vec![0.0; 2 * degree + 1];
    let mut rhs = vec![0.0; terms];
    for (x, y) in xs.iter().zip(ys) {
        let u = (x - center) / scale;
        let mut p = 1.0;
        for (k, sum) in power_sums.iter_mut().enumerate() {
            *sum += p;
            if k < terms {
                rhs[k] += p * y;
            }
            p *= u;
        }
    }
    let mut matrix: Vec<Vec<f64>> = (0..terms)
        .map(|j| power_sums[j..j + terms].to_vec())
        .collect();

    let coefficients = solve(&mut matrix, &mut rhs, xs.len() as f64)?;
    Ok(Polynomial {
        coefficients,
        center,
        scale,
    })
}

/// Gaussian elimination with partial pivoting
fn solve(matrix: &mut [Vec<f64>], rhs: &mut [f64], magnitude: f64) -> Result<Vec<f64>, FitError> {
    let n = rhs.len();
    let tolerance = 1e-12 * magnitude.max(1.0);

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|a, b| matrix[*a][col].abs().total_cmp(&matrix[*b][col].abs()))
            .ok_or(FitError::Singular)?;
        if matrix[pivot][col].abs() < tolerance {
            return Err(FitError::Singular);
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in col + 1..n {
            let factor = matrix[row][col] / matrix[col][col];
            for k in col..n {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (rhs[row] - tail) / matrix[row][row];
    }
    Ok(solution)
}
