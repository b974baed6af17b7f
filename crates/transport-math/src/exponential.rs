// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Exponential Table
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Linearly interpolated exponential lookup for the characteristic kernel.
//!
//! `exp(-τ)` dominates the cost of a MoC sweep. The table stores `exp` on
//! `n + 1` uniform points over `[min, max]` and interpolates linearly between
//! them. Arguments outside the table fall back to [`f64::exp`]; the first
//! such call logs a warning.

use std::sync::atomic::{AtomicBool, Ordering};

use transport_types::constants::{EXP_TABLE_MAX, EXP_TABLE_MIN, EXP_TABLE_N};
use transport_types::error::{TransportError, TransportResult};

#[derive(Debug)]
pub struct ExponentialTable {
    min: f64,
    max: f64,
    space: f64,
    rspace: f64,
    d: Vec<f64>,
    max_error: f64,
    warned: AtomicBool,
}

impl ExponentialTable {
    /// Build a table of `n` intervals over `[min, max]`.
    pub fn new(min: f64, max: f64, n: usize) -> TransportResult<Self> {
        if !(max > min) || n == 0 {
            return Err(TransportError::numeric(format!(
                "Invalid exponential table [{min}, {max}] with {n} intervals"
            )));
        }
        Ok(Self::build(min, max, n))
    }

    fn build(min: f64, max: f64, n: usize) -> Self {
        let space = (max - min) / n as f64;
        let d: Vec<f64> = (0..=n).map(|i| (min + i as f64 * space).exp()).collect();
        let mut table = ExponentialTable {
            min,
            max,
            space,
            rspace: 1.0 / space,
            d,
            max_error: 0.0,
            warned: AtomicBool::new(false),
        };
        table.max_error = (0..n)
            .map(|i| {
                let x = min + space * (i as f64 + 0.5);
                (table.exp(x) - x.exp()).abs()
            })
            .fold(0.0, f64::max);
        table
    }

    /// Table value at grid point `i`.
    pub fn node(&self, i: usize) -> f64 {
        self.d[i]
    }

    pub fn spacing(&self) -> f64 {
        self.space
    }

    /// Interpolated `exp(x)`.
    #[inline]
    pub fn exp(&self, x: f64) -> f64 {
        if x < self.min || x > self.max || x.is_nan() {
            if !self.warned.swap(true, Ordering::Relaxed) {
                log::warn!(
                    "Exponential argument {x} outside table [{}, {}]; using exp()",
                    self.min,
                    self.max
                );
            }
            return x.exp();
        }
        let i = (((x - self.min) * self.rspace) as usize).min(self.d.len() - 2);
        let frac = (x - self.min - i as f64 * self.space) * self.rspace;
        self.d[i] + (self.d[i + 1] - self.d[i]) * frac
    }

    /// Largest absolute interpolation error at the bin midpoints.
    pub fn max_error(&self) -> f64 {
        self.max_error
    }

    pub fn n_intervals(&self) -> usize {
        self.d.len() - 1
    }

    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }
}

impl Default for ExponentialTable {
    fn default() -> Self {
        Self::build(EXP_TABLE_MIN, EXP_TABLE_MAX, EXP_TABLE_N)
    }
}

impl Clone for ExponentialTable {
    fn clone(&self) -> Self {
        ExponentialTable {
            min: self.min,
            max: self.max,
            space: self.space,
            rspace: self.rspace,
            d: self.d.clone(),
            max_error: self.max_error,
            warned: AtomicBool::new(self.warned.load(Ordering::Relaxed)),
        }
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════
