//! Frequency-domain low-pass filter
//!
//! Direct O(n²) discrete Fourier transform. Windows are a few dozen points,
//! so the quadratic cost is irrelevant next to the per-tick budget.

use std::f64::consts::PI;

/// Zero the central band of frequency bins and return the real part of the
/// inverse transform.
///
/// Bin `k` is removed when `n/2·(1−s) ≤ k ≤ n/2·(1+s)`. Those bins carry the
/// highest frequencies of a real signal, so a larger `smoothing` removes
/// more noise. `smoothing <= 0` returns the input unchanged.
pub fn low_pass(values: &[f64], smoothing: f64) -> Vec<f64> {
    let n = values.len();
    if n < 2 || smoothing <= 0.0 {
        return values.to_vec();
    }

    let half = n as f64 / 2.0;
    let low = half * (1.0 - smoothing);
    let high = half * (1.0 + smoothing);
    let keep = |k: usize| {
        let k = k as f64;
        k < low || k > high
    };

    let spectrum: Vec<(f64, f64)> = (0..n)
        .map(|k| {
            if !keep(k) {
                return (0.0, 0.0);
            }
            values.iter().enumerate().fold((0.0, 0.0), |(re, im), (j, x)| {
                let theta = 2.0 * PI * (j * k) as f64 / n as f64;
                (re + x * theta.cos(), im - x * theta.sin())
            })
        })
        .collect();

    (0..n)
        .map(|j| {
            let sum: f64 = spectrum
                .iter()
                .enumerate()
                .map(|(k, (re, im))| {
                    let theta = 2.0 * PI * (j * k) as f64 / n as f64;
                    re * theta.cos() - im * theta.sin()
                })
                .sum();
            sum / n as f64
        })
        .collect()
}
