// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Coarse Mesh Data
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Coarse flux, net currents and surface fluxes exchanged between the
//! transport sweepers and CMFD.

use ndarray::Array2;

/// Pin-cell data, indexed `[[cell, group]]` and `[[surface, group]]`.
///
/// Currents are net currents through each surface in the direction of
/// its positive normal.
#[derive(Debug, Clone, PartialEq)]
pub struct CoarseData {
    pub flux: Array2<f64>,
    pub old_flux: Array2<f64>,
    pub current: Array2<f64>,
    pub surface_flux: Array2<f64>,
    /// Currents on x- and y-normal surfaces are valid.
    pub has_radial_data: bool,
    /// Currents on z-normal surfaces are valid.
    pub has_axial_data: bool,
}

impl CoarseData {
    pub fn new(n_cell: usize, n_surf: usize, ng: usize) -> Self {
        CoarseData {
            flux: Array2::zeros((n_cell, ng)),
            old_flux: Array2::zeros((n_cell, ng)),
            current: Array2::zeros((n_surf, ng)),
            surface_flux: Array2::zeros((n_surf, ng)),
            has_radial_data: false,
            has_axial_data: false,
        }
    }

    pub fn n_cell(&self) -> usize {
        self.flux.nrows()
    }

    pub fn n_surf(&self) -> usize {
        self.current.nrows()
    }

    pub fn n_group(&self) -> usize {
        self.flux.ncols()
    }

    /// Clear currents and surface fluxes of one group before a tally.
    pub fn zero_group(&mut self, g: usize) {
        self.current.column_mut(g).fill(0.0);
        self.surface_flux.column_mut(g).fill(0.0);
    }

    /// Remember the current coarse flux as the reference for projection.
    pub fn store_old(&mut self) {
        self.old_flux.assign(&self.flux);
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════
