// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Characteristic Rays
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! A straight characteristic across one geometrically unique plane.
//!
//! The ray is traced in two stages: the core mesh gives the points where
//! the chord crosses pin boundaries, then each pin mesh splits its piece of
//! the chord into segments. Segment regions are plane-local, so one ray
//! serves every plane that shares the geometry.
//!
//! Alongside the segments the ray keeps its coarse-mesh trail: the pin cell
//! and segment count of every pin it crosses, and the coarse surfaces at
//! every pin-boundary crossing point (one or two; two at a corner). Cells
//! and surfaces are those of plane 0 and must be offset for other planes.

use transport_geom::core_mesh::CoreMesh;
use transport_geom::primitives::{Point2, Position};
use transport_types::error::{TransportError, TransportResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Ray {
    p1: Point2,
    p2: Point2,
    bc: [usize; 2],
    seg_len: Vec<f64>,
    seg_reg: Vec<usize>,
    cm_cell: Vec<usize>,
    cm_nseg: Vec<usize>,
    cm_surf: Vec<usize>,
    cm_npts: Vec<usize>,
}

impl Ray {
    /// Trace `p1 → p2` through plane `iz` (any plane with the wanted
    /// geometry). `bc` holds the boundary indices of the two end points.
    pub fn new(p1: Point2, p2: Point2, bc: [usize; 2], iz: usize, mesh: &CoreMesh) -> TransportResult<Self> {
        let points = mesh.trace(p1, p2);
        if points.len() < 2 {
            return Err(TransportError::geometry(format!(
                "Ray {p1} -> {p2} has no length"
            )));
        }
        let coarse = mesh.coarse();
        let plane_first = mesh.first_reg_plane(iz);

        let mut ray = Ray {
            p1,
            p2,
            bc,
            seg_len: Vec::new(),
            seg_reg: Vec::new(),
            cm_cell: Vec::with_capacity(points.len() - 1),
            cm_nseg: Vec::with_capacity(points.len() - 1),
            cm_surf: Vec::new(),
            cm_npts: Vec::with_capacity(points.len()),
        };

        let first_cell = coarse
            .coarse_cell_point(points[0].midpoint(points[1]))
            .ok_or_else(|| TransportError::geometry(format!("Ray start {p1} is outside the core")))?;
        ray.push_surfaces(coarse.coarse_surf_point(points[0], first_cell));

        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let hit = mesh.get_pinmesh(a.midpoint(b), iz)?;
            let first = hit.first_reg - plane_first;
            let segs = hit.mesh.trace(a - hit.center, b - hit.center);
            ray.cm_nseg.push(segs.len());
            for (reg, len) in segs {
                ray.seg_reg.push(first + reg);
                ray.seg_len.push(len);
            }
            let cell = coarse.coarse_cell(Position::new(hit.position.x, hit.position.y, 0));
            ray.cm_cell.push(cell);
            ray.push_surfaces(coarse.coarse_surf_point(b, cell));
        }
        Ok(ray)
    }

    fn push_surfaces(&mut self, surfs: Vec<usize>) {
        self.cm_npts.push(surfs.len());
        self.cm_surf.extend(surfs);
    }

    pub fn p1(&self) -> Point2 {
        self.p1
    }

    pub fn p2(&self) -> Point2 {
        self.p2
    }

    /// Boundary indices of the start and end points.
    pub fn bc(&self) -> [usize; 2] {
        self.bc
    }

    pub fn nseg(&self) -> usize {
        self.seg_len.len()
    }

    pub fn seg_len(&self) -> &[f64] {
        &self.seg_len
    }

    pub(crate) fn seg_len_mut(&mut self) -> &mut [f64] {
        &mut self.seg_len
    }

    /// Plane-local fine region of each segment.
    pub fn seg_reg(&self) -> &[usize] {
        &self.seg_reg
    }

    /// Coarse cell (plane 0) of each pin crossed.
    pub fn cm_cell(&self) -> &[usize] {
        &self.cm_cell
    }

    /// Number of segments in each pin crossed.
    pub fn cm_nseg(&self) -> &[usize] {
        &self.cm_nseg
    }

    /// Coarse surfaces (plane 0) at every crossing point, flattened.
    pub fn cm_surf(&self) -> &[usize] {
        &self.cm_surf
    }

    /// Number of surfaces at each crossing point, one more than the number
    /// of pins.
    pub fn cm_npts(&self) -> &[usize] {
        &self.cm_npts
    }

    /// Total traced length.
    pub fn length(&self) -> f64 {
        self.seg_len.iter().sum()
    }

    /// Crossing points as `(segments before the point, surfaces)`.
    pub fn crossings(&self) -> Vec<(usize, &[usize])> {
        let mut out = Vec::with_capacity(self.cm_npts.len());
        let mut iseg = 0;
        let mut isurf = 0;
        for (k, &n) in self.cm_npts.iter().enumerate() {
            out.push((iseg, &self.cm_surf[isurf..isurf + n]));
            isurf += n;
            if let Some(&nseg) = self.cm_nseg.get(k) {
                iseg += nseg;
            }
        }
        out
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::three_by_three_case;

    #[test]
    fn test_diagonal_coarse_trail() {
        let mesh = CoreMesh::from_config(&three_by_three_case()).unwrap();
        // Corner to corner through cells 1 and 5
        let ray = Ray::new(Point2::new(1.26, 0.0), Point2::new(3.78, 2.52), [0, 0], 0, &mesh).unwrap();
        assert_eq!(ray.cm_cell(), &[1, 5]);
        assert_eq!(ray.cm_npts(), &[2, 2, 1]);
        assert_eq!(ray.cm_surf(), &[21, 10, 11, 30, 16]);
        let crossings = ray.crossings();
        assert_eq!(crossings.len(), 3);
        assert_eq!(crossings[1].0, ray.cm_nseg()[0]);
        assert_eq!(crossings[2].1, &[16]);
        assert!((ray.length() - 2.52 * 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_segments_are_plane_local() {
        let mesh = CoreMesh::from_config(&three_by_three_case()).unwrap();
        let y = 0.5 * mesh.hy_core() + 0.01;
        let ray = Ray::new(Point2::new(0.0, y), Point2::new(mesh.hx_core(), y), [1, 1], 0, &mesh).unwrap();
        let plane_n_reg = mesh.plane(0).n_reg();
        assert!(ray.seg_reg().iter().all(|&r| r < plane_n_reg));
        assert_eq!(ray.cm_cell(), &[3, 4, 5]);
        let nseg: usize = ray.cm_nseg().iter().sum();
        assert_eq!(nseg, ray.nseg());
        assert_eq!(ray.bc(), [1, 1]);
    }
}
