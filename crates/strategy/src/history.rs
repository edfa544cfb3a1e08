//! Rolling price history
//!
//! Bounded FIFO of observed prices. Only `push` mutates it: new values go
//! on the back and the oldest value falls off the front once the window is
//! full.

use std::collections::VecDeque;

use meridian_core::Price;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

/// Degrees of freedom used when computing a standard deviation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dispersion {
    /// Divide by n
    Population,
    /// Divide by n - 1
    Sample,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistory {
    window: usize,
    values: VecDeque<Price>,
}

impl PriceHistory {
    /// Create an empty history holding at most `window` values
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            values: VecDeque::with_capacity(window.max(1)),
        }
    }

    /// Append a value, evicting the oldest once the window is full
    pub fn push(&mut self, value: Price) {
        if self.values.len() == self.window {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.window
    }

    pub fn latest(&self) -> Option<Price> {
        self.values.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Price> {
        self.values.iter()
    }

    /// Values as `f64`, oldest first
    pub fn to_f64(&self) -> Vec<f64> {
        self.values.iter().filter_map(|v| v.to_f64()).collect()
    }

    pub fn mean(&self) -> Option<Decimal> {
        if self.values.is_empty() {
            return None;
        }
        let sum: Decimal = self.values.iter().sum();
        Some(sum / Decimal::from(self.values.len()))
    }

    /// Mean of the newest `n` values; `None` until `n` have been seen
    pub fn recent_mean(&self, n: usize) -> Option<Decimal> {
        if n == 0 || self.values.len() < n {
            return None;
        }
        let sum: Decimal = self.values.iter().rev().take(n).sum();
        Some(sum / Decimal::from(n))
    }

    /// Standard deviation; zero when there are too few values to measure
    pub fn std_dev(&self, dispersion: Dispersion) -> Option<Decimal> {
        let mean = self.mean()?;
        let n = self.values.len();
        let denominator = match dispersion {
            Dispersion::Population => n,
            Dispersion::Sample => n - 1,
        };
        if denominator == 0 {
            return Some(Decimal::ZERO);
        }

        let squares: Decimal = self
            .values
            .iter()
            .map(|v| {
                let d = *v - mean;
                d * d
            })
            .sum();
        let variance = squares / Decimal::from(denominator);
        Some(variance.sqrt().unwrap_or(Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_recent_mean_uses_newest_values() {
        let mut history = PriceHistory::new(5);
        for v in [dec!(10), dec!(20), dec!(30), dec!(40)] {
            history.push(v);
        }
        assert_eq!(history.recent_mean(2), Some(dec!(35)));
        assert_eq!(history.recent_mean(4), Some(dec!(25)));
        assert_eq!(history.recent_mean(5), None);
        assert_eq!(history.recent_mean(0), None);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut history = PriceHistory::new(3);
        for v in [dec!(1), dec!(2), dec!(3), dec!(4)] {
            history.push(v);
        }

        assert!(history.is_full());
        assert_eq!(history.len(), 3);
        assert_eq!(
            history.iter().copied().collect::<Vec<_>>(),
            vec![dec!(2), dec!(3), dec!(4)]
        );
        assert_eq!(history.latest(), Some(dec!(4)));
    }

    #[test]
    fn test_mean_and_std() {
        let mut history = PriceHistory::new(10);
        for v in [dec!(2), dec!(4), dec!(4), dec!(4), dec!(5), dec!(5), dec!(7), dec!(9)] {
            history.push(v);
        }

        assert_eq!(history.mean(), Some(dec!(5)));
        let std = history.std_dev(Dispersion::Population).unwrap();
        assert!((std - dec!(2)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_sample_std_of_single_value_is_zero() {
        let mut history = PriceHistory::new(5);
        history.push(dec!(10000));

        assert_eq!(history.std_dev(Dispersion::Sample), Some(Decimal::ZERO));
        assert_eq!(PriceHistory::new(5).std_dev(Dispersion::Sample), None);
    }

    #[test]
    fn test_zero_window_holds_one_value() {
        let mut history = PriceHistory::new(0);
        history.push(dec!(1));
        history.push(dec!(2));
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest(), Some(dec!(2)));
    }
}
