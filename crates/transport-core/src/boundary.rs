// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Angular Flux Boundary Conditions
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Angular flux on the outer faces of the domain.
//!
//! A [`BoundaryCondition`] is one contiguous buffer indexed
//! `(group, angle, normal, face cell)`. Each angle has its own face sizes,
//! which lets the MoC ray ends (whose count depends on the angle) and the
//! Sn face cells share one container.
//!
//! Sweepers keep two instances: the incoming values they read and the
//! outgoing values they write. An update maps the outgoing flux of every
//! angle onto the incoming flux of its reflection, or zeroes it on vacuum
//! faces.

use transport_geom::primitives::{BoundaryConditions, Normal};

use crate::quadrature::AngularQuadrature;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryCondition {
    ng: usize,
    sizes: Vec<[usize; 3]>,
    offsets: Vec<[usize; 3]>,
    group_size: usize,
    data: Vec<f64>,
}

impl BoundaryCondition {
    /// `sizes[angle] = [x faces, y faces, z faces]`.
    pub fn new(ng: usize, sizes: Vec<[usize; 3]>) -> Self {
        let mut offsets = Vec::with_capacity(sizes.len());
        let mut pos = 0;
        for s in &sizes {
            offsets.push([pos, pos + s[0], pos + s[0] + s[1]]);
            pos += s[0] + s[1] + s[2];
        }
        BoundaryCondition {
            ng,
            sizes,
            offsets,
            group_size: pos,
            data: vec![0.0; ng * pos],
        }
    }

    /// Same face sizes for every angle.
    pub fn uniform(ng: usize, n_angle: usize, size: [usize; 3]) -> Self {
        Self::new(ng, vec![size; n_angle])
    }

    pub fn n_group(&self) -> usize {
        self.ng
    }

    pub fn n_angle(&self) -> usize {
        self.sizes.len()
    }

    pub fn face_size(&self, angle: usize, normal: Normal) -> usize {
        self.sizes[angle][normal.index()]
    }

    #[inline]
    fn range(&self, g: usize, angle: usize, normal: Normal) -> std::ops::Range<usize> {
        let lo = g * self.group_size + self.offsets[angle][normal.index()];
        lo..lo + self.sizes[angle][normal.index()]
    }

    pub fn face(&self, g: usize, angle: usize, normal: Normal) -> &[f64] {
        &self.data[self.range(g, angle, normal)]
    }

    pub fn face_mut(&mut self, g: usize, angle: usize, normal: Normal) -> &mut [f64] {
        let r = self.range(g, angle, normal);
        &mut self.data[r]
    }

    /// All faces of one angle, x first, then y, then z.
    pub fn angle_data(&self, g: usize, angle: usize) -> &[f64] {
        let lo = g * self.group_size + self.offsets[angle][0];
        let s = self.sizes[angle];
        &self.data[lo..lo + s[0] + s[1] + s[2]]
    }

    pub fn angle_data_mut(&mut self, g: usize, angle: usize) -> &mut [f64] {
        let lo = g * self.group_size + self.offsets[angle][0];
        let s = self.sizes[angle];
        &mut self.data[lo..lo + s[0] + s[1] + s[2]]
    }

    pub fn fill(&mut self, value: f64) {
        self.data.fill(value);
    }

    pub fn fill_group(&mut self, g: usize, value: f64) {
        let lo = g * self.group_size;
        self.data[lo..lo + self.group_size].fill(value);
    }

    /// Gauss-Seidel update: pass the outgoing flux of `angle` across each of
    /// `normals` to the reflected angle.
    pub fn update_angle(
        &mut self,
        g: usize,
        angle: usize,
        out: &BoundaryCondition,
        quad: &AngularQuadrature,
        bc: &BoundaryConditions,
        normals: &[Normal],
    ) {
        let dir = quad.angle(angle).direction();
        for &normal in normals {
            if self.face_size(angle, normal) == 0 {
                continue;
            }
            let exit = dir.upwind_surface(normal).opposite();
            let target = quad.reflect_normal(angle, normal);
            let r = self.range(g, target, normal);
            if bc.is_reflective(exit) {
                self.data[r].copy_from_slice(out.face(g, angle, normal));
            } else {
                self.data[r].fill(0.0);
            }
        }
    }

    /// Jacobi update of every angle of group `g`.
    pub fn update_group(
        &mut self,
        g: usize,
        out: &BoundaryCondition,
        quad: &AngularQuadrature,
        bc: &BoundaryConditions,
        normals: &[Normal],
    ) {
        for angle in 0..self.n_angle() {
            self.update_angle(g, angle, out, quad, bc, normals);
        }
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use transport_geom::primitives::Surface;
    use transport_types::config::BoundaryKind;

    #[test]
    fn test_layout() {
        let mut bc = BoundaryCondition::new(2, vec![[3, 2, 0], [1, 4, 0]]);
        assert_eq!(bc.face_size(1, Normal::Y), 4);
        bc.face_mut(1, 1, Normal::Y)[3] = 7.0;
        assert_eq!(bc.angle_data(1, 1), &[0.0, 0.0, 0.0, 0.0, 7.0]);
        assert_eq!(bc.face(0, 1, Normal::Y), &[0.0; 4]);
        bc.fill_group(0, 1.0);
        assert_eq!(bc.face(1, 0, Normal::X), &[0.0; 3]);
        assert_eq!(bc.face(0, 1, Normal::X), &[1.0]);
    }

    #[test]
    fn test_reflective_update_moves_flux_to_mirror() {
        let quad = AngularQuadrature::level_symmetric(2).unwrap();
        let mut bcs = BoundaryConditions::uniform(BoundaryKind::Reflect);
        bcs.set(Surface::East, BoundaryKind::Vacuum);
        let size = [2, 2, 2];
        let mut out = BoundaryCondition::uniform(1, 8, size);
        let mut inc = BoundaryCondition::uniform(1, 8, size);
        inc.fill(9.0);
        for a in 0..8 {
            out.face_mut(0, a, Normal::X).fill(a as f64);
            out.face_mut(0, a, Normal::Y).fill(10.0 + a as f64);
        }
        inc.update_group(0, &out, &quad, &bcs, &Normal::ALL);

        // Angle 0 (+x) leaves through the vacuum east face: its mirror
        // (angle 1, -x) enters there with nothing
        assert_eq!(inc.face(0, 1, Normal::X), &[0.0, 0.0]);
        // Angle 1 (-x) leaves west (reflective) into angle 0
        assert_eq!(inc.face(0, 0, Normal::X), &[1.0, 1.0]);
        // Angle 0 leaves north into angle 3
        assert_eq!(inc.face(0, 3, Normal::Y), &[10.0, 10.0]);
    }
}
