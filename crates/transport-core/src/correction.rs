// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — CDD Correction Factors
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Corrected diamond-difference factors passed from MoC to Sn.
//!
//! For every pin cell, angle and group the MoC sweep measures how the cell
//! average angular flux sits between the incoming and outgoing face values
//! (α, one per radial normal) and how the heterogeneous collision rate
//! compares with the homogenised one (β). With α = ½ and β = 1 the Sn cell
//! equation reduces to plain diamond difference.

use transport_geom::primitives::Normal;

use crate::quadrature::AngularQuadrature;

#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionData {
    n_cell: usize,
    n_angle: usize,
    ng: usize,
    /// `[(cell·n_angle + angle)·ng + g] → [α_x, α_y]`
    alpha: Vec<[f64; 2]>,
    beta: Vec<f64>,
}

impl CorrectionData {
    pub fn new(n_cell: usize, n_angle: usize, ng: usize) -> Self {
        let n = n_cell * n_angle * ng;
        CorrectionData {
            n_cell,
            n_angle,
            ng,
            alpha: vec![[0.5, 0.5]; n],
            beta: vec![1.0; n],
        }
    }

    pub fn n_cell(&self) -> usize {
        self.n_cell
    }

    pub fn n_angle(&self) -> usize {
        self.n_angle
    }

    pub fn n_group(&self) -> usize {
        self.ng
    }

    #[inline]
    fn index(&self, cell: usize, angle: usize, g: usize) -> usize {
        (cell * self.n_angle + angle) * self.ng + g
    }

    /// α for a radial normal; the axial direction always uses ½.
    #[inline]
    pub fn alpha(&self, cell: usize, angle: usize, g: usize, normal: Normal) -> f64 {
        match normal {
            Normal::X => self.alpha[self.index(cell, angle, g)][0],
            Normal::Y => self.alpha[self.index(cell, angle, g)][1],
            Normal::Z => 0.5,
        }
    }

    #[inline]
    pub fn beta(&self, cell: usize, angle: usize, g: usize) -> f64 {
        self.beta[self.index(cell, angle, g)]
    }

    pub fn set_alpha(&mut self, cell: usize, angle: usize, g: usize, normal: Normal, value: f64) {
        let i = self.index(cell, angle, g);
        match normal {
            Normal::X => self.alpha[i][0] = value,
            Normal::Y => self.alpha[i][1] = value,
            Normal::Z => {}
        }
    }

    pub fn set_beta(&mut self, cell: usize, angle: usize, g: usize, value: f64) {
        let i = self.index(cell, angle, g);
        self.beta[i] = value;
    }

    /// Give every lower-hemisphere angle the factors of its mirror image
    /// across the xy plane.
    pub fn mirror_lower_hemisphere(&mut self, quad: &AngularQuadrature, g: usize) {
        let half = 4 * quad.ndir_oct();
        for cell in 0..self.n_cell {
            for angle in 0..half {
                let lower = quad.reflect_normal(angle, Normal::Z);
                let (src, dst) = (self.index(cell, angle, g), self.index(cell, lower, g));
                self.alpha[dst] = self.alpha[src];
                self.beta[dst] = self.beta[src];
            }
        }
    }
}

/// α from a cell-average and two face fluxes, ½ when the faces agree.
pub fn alpha_factor(psi_avg: f64, psi_in: f64, psi_out: f64) -> f64 {
    let diff = psi_out - psi_in;
    if diff.abs() <= 1.0e-10 * psi_avg.abs().max(f64::MIN_POSITIVE) {
        return 0.5;
    }
    let a = (psi_avg - psi_in) / diff;
    if a.is_finite() && a > 0.0 && a < 1.0 {
        a
    } else {
        0.5
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════
