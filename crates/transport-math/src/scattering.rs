// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Scattering Matrix
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Banded multigroup scattering matrix.
//!
//! Row `g` holds the cross sections for scattering *into* group `g`, indexed
//! by source group. Each row only stores the band between its first and last
//! non-zero source group, which keeps down-scatter-dominated libraries compact
//! while giving O(1) self-scatter lookup.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use transport_types::error::{TransportError, TransportResult};

/// Scattering into one destination group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatteringRow {
    /// First source group in the band.
    pub min_g: usize,
    /// Last source group in the band (inclusive).
    pub max_g: usize,
    /// `from[g - min_g]` = σ_s(g → this row's group).
    pub from: Vec<f64>,
}

impl ScatteringRow {
    /// σ_s from group `g`, zero outside the band.
    #[inline]
    pub fn get(&self, g: usize) -> f64 {
        if g < self.min_g || g > self.max_g {
            0.0
        } else {
            self.from[g - self.min_g]
        }
    }

    /// `(source group, σ_s)` over the band.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.from
            .iter()
            .enumerate()
            .map(move |(i, &v)| (self.min_g + i, v))
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatteringMatrix {
    ng: usize,
    rows: Vec<ScatteringRow>,
    /// Total out-scatter per source group.
    out: Vec<f64>,
}

impl ScatteringMatrix {
    /// Build from a dense `[to, from]` matrix.
    pub fn from_dense(dense: &Array2<f64>) -> TransportResult<Self> {
        let (nto, nfrom) = dense.dim();
        if nto != nfrom {
            return Err(TransportError::config(format!(
                "Scattering matrix must be square, got {nto}x{nfrom}"
            )));
        }
        let ng = nto;
        let mut out = vec![0.0; ng];
        let mut rows = Vec::with_capacity(ng);
        for to in 0..ng {
            let nonzero: Vec<usize> = (0..ng).filter(|&from| dense[[to, from]] != 0.0).collect();
            let row = match (nonzero.first(), nonzero.last()) {
                (Some(&min_g), Some(&max_g)) => ScatteringRow {
                    min_g,
                    max_g,
                    from: (min_g..=max_g).map(|from| dense[[to, from]]).collect(),
                },
                _ => ScatteringRow {
                    min_g: to,
                    max_g: to,
                    from: vec![0.0],
                },
            };
            for from in 0..ng {
                out[from] += dense[[to, from]];
            }
            rows.push(row);
        }
        Ok(ScatteringMatrix { ng, rows, out })
    }

    /// Build from nested rows `rows[to][from]`.
    pub fn from_rows(rows: &[Vec<f64>]) -> TransportResult<Self> {
        let ng = rows.len();
        let mut dense = Array2::zeros((ng, ng));
        for (to, row) in rows.iter().enumerate() {
            if row.len() != ng {
                return Err(TransportError::config(format!(
                    "Scattering row {to} has {} entries, expected {ng}",
                    row.len()
                )));
            }
            for (from, &v) in row.iter().enumerate() {
                dense[[to, from]] = v;
            }
        }
        Self::from_dense(&dense)
    }

    /// An all-zero matrix for `ng` groups.
    pub fn zeros(ng: usize) -> Self {
        let rows = (0..ng)
            .map(|g| ScatteringRow {
                min_g: g,
                max_g: g,
                from: vec![0.0],
            })
            .collect();
        ScatteringMatrix {
            ng,
            rows,
            out: vec![0.0; ng],
        }
    }

    pub fn n_group(&self) -> usize {
        self.ng
    }

    /// Scattering into group `g`.
    #[inline]
    pub fn to(&self, g: usize) -> &ScatteringRow {
        &self.rows[g]
    }

    #[inline]
    pub fn self_scat(&self, g: usize) -> f64 {
        self.rows[g].get(g)
    }

    /// Total scattering out of group `g` (including self-scatter).
    #[inline]
    pub fn out(&self, g: usize) -> f64 {
        self.out[g]
    }

    /// Cumulative distribution of destination groups for a neutron scattering
    /// out of group `g`.
    pub fn out_cdf(&self, g: usize) -> Vec<f64> {
        let total = self.out[g];
        let mut prev = 0.0;
        (0..self.ng)
            .map(|to| {
                if total > 0.0 {
                    prev += self.rows[to].get(g) / total;
                }
                prev
            })
            .collect()
    }

    /// Dense `[to, from]` copy.
    pub fn as_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.ng, self.ng));
        for (to, row) in self.rows.iter().enumerate() {
            for (from, v) in row.iter() {
                dense[[to, from]] = v;
            }
        }
        dense
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScatteringRow> {
        self.rows.iter()
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn three_group() -> Array2<f64> {
        // [to, from]
        array![
            [0.20, 0.00, 0.00],
            [0.10, 0.30, 0.01],
            [0.00, 0.05, 0.40],
        ]
    }

    #[test]
    fn test_band_and_self_scatter() {
        let m = ScatteringMatrix::from_dense(&three_group()).unwrap();
        assert_eq!(m.n_group(), 3);
        assert_eq!((m.to(0).min_g, m.to(0).max_g), (0, 0));
        assert_eq!((m.to(1).min_g, m.to(1).max_g), (0, 2));
        assert_eq!((m.to(2).min_g, m.to(2).max_g), (1, 2));
        assert!((m.self_scat(1) - 0.30).abs() < 1e-15);
        assert!((m.to(2).get(0)).abs() < 1e-15);
    }

    #[test]
    fn test_out_scatter_sums_columns() {
        let m = ScatteringMatrix::from_dense(&three_group()).unwrap();
        assert!((m.out(0) - 0.30).abs() < 1e-15);
        assert!((m.out(1) - 0.35).abs() < 1e-15);
        assert!((m.out(2) - 0.41).abs() < 1e-15);
    }

    #[test]
    fn test_interior_zero_kept() {
        let dense = array![[0.5, 0.0, 0.2], [0.0, 0.1, 0.0], [0.0, 0.0, 0.3]];
        let m = ScatteringMatrix::from_dense(&dense).unwrap();
        assert_eq!((m.to(0).min_g, m.to(0).max_g), (0, 2));
        assert_eq!(m.as_dense(), dense);
    }

    #[test]
    fn test_out_cdf_ends_at_one() {
        let m = ScatteringMatrix::from_dense(&three_group()).unwrap();
        let cdf = m.out_cdf(0);
        assert!((cdf[0] - 0.2 / 0.3).abs() < 1e-14);
        assert!((cdf[2] - 1.0).abs() < 1e-14);
        assert!(cdf.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_non_square_rejected() {
        let dense = Array2::<f64>::zeros((2, 3));
        assert!(ScatteringMatrix::from_dense(&dense).is_err());
        assert!(ScatteringMatrix::from_rows(&[vec![0.1, 0.2], vec![0.3]]).is_err());
    }

    #[test]
    fn test_zero_rows() {
        let m = ScatteringMatrix::zeros(4);
        assert_eq!(m.as_dense(), Array2::<f64>::zeros((4, 4)));
        assert!(m.self_scat(3).abs() < 1e-300);
    }
}
