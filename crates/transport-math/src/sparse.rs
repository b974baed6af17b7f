// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Sparse Matrix
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Compressed sparse row matrix with a fixed sparsity pattern.
//!
//! The CMFD operator keeps the same 7-point structure for every group and
//! every outer iteration; only the values change. The pattern is therefore
//! built once from `(row, col)` pairs and values are rewritten in place.

use transport_types::error::{TransportError, TransportResult};

#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    n: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
    diag_pos: Vec<usize>,
}

impl CsrMatrix {
    /// Build the pattern of an `n`×`n` matrix from `(row, col)` pairs.
    /// Duplicates are merged and every diagonal entry is always present.
    pub fn from_pattern(n: usize, entries: &[(usize, usize)]) -> TransportResult<Self> {
        let mut rows: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        for &(i, j) in entries {
            if i >= n || j >= n {
                return Err(TransportError::linalg(format!(
                    "Entry ({i}, {j}) outside {n}x{n} matrix"
                )));
            }
            rows[i].push(j);
        }
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::new();
        let mut diag_pos = Vec::with_capacity(n);
        row_ptr.push(0);
        for (i, mut cols) in rows.into_iter().enumerate() {
            cols.sort_unstable();
            cols.dedup();
            for c in cols {
                if c == i {
                    diag_pos.push(col_idx.len());
                }
                col_idx.push(c);
            }
            row_ptr.push(col_idx.len());
        }
        let nnz = col_idx.len();
        Ok(CsrMatrix {
            n,
            row_ptr,
            col_idx,
            values: vec![0.0; nnz],
            diag_pos,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Zero every stored value, keeping the pattern.
    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Add `v` to entry `(i, j)`, which must be part of the pattern.
    pub fn add(&mut self, i: usize, j: usize, v: f64) -> TransportResult<()> {
        let pos = self.position(i, j).ok_or_else(|| {
            TransportError::linalg(format!("Entry ({i}, {j}) not in sparsity pattern"))
        })?;
        self.values[pos] += v;
        Ok(())
    }

    #[inline]
    pub fn add_diag(&mut self, i: usize, v: f64) {
        self.values[self.diag_pos[i]] += v;
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.position(i, j).map_or(0.0, |p| self.values[p])
    }

    #[inline]
    pub fn diag(&self, i: usize) -> f64 {
        self.values[self.diag_pos[i]]
    }

    fn position(&self, i: usize, j: usize) -> Option<usize> {
        if i >= self.n {
            return None;
        }
        let start = self.row_ptr[i];
        let cols = &self.col_idx[start..self.row_ptr[i + 1]];
        cols.binary_search(&j).ok().map(|k| start + k)
    }

    /// `(col, value)` pairs of row `i`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        self.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// `y = A x`
    pub fn matvec(&self, x: &[f64], y: &mut [f64]) {
        for (i, yi) in y.iter_mut().enumerate().take(self.n) {
            let mut sum = 0.0;
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                sum += self.values[k] * x[self.col_idx[k]];
            }
            *yi = sum;
        }
    }
}
