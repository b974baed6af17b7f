// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Modular Ray Set
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Cyclic ray sets for every geometrically unique plane.
//!
//! Azimuths are adjusted so that rays leaving one face of the domain (or of
//! every pin, under pin modularity) land exactly where a ray of the
//! reflected angle starts. Only angles of octants 1 and 2 get rays; the
//! other half of the radial plane is covered by sweeping each ray in both
//! directions.
//!
//! Ray boundary indices number the `ny` points on the x-normal face first,
//! then the `nx` points on the y-normal face, both counted from the origin.
//! A ray's start index refers to the face it enters through, its end index
//! to the face it leaves through.

use transport_geom::core_mesh::CoreMesh;
use transport_geom::primitives::{Point2, Surface};
use transport_geom::shapes::Box2;
use transport_math::fp::fp_equiv;
use transport_types::config::{Modularity, RayConfig, VolumeCorrection};
use transport_types::constants::VOL_CORR_BAND;
use transport_types::error::{TransportError, TransportResult};

use crate::quadrature::{Angle, AngularQuadrature};
use crate::ray::Ray;

/// End of a ray at which a traversal begins: `Start` for a forward sweep
/// along the ray's angle, `End` for a backward sweep along its reverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayEnd {
    Start,
    End,
}

/// Where the angular flux leaving a ray end continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RayLink {
    /// Angle index in octants 1 and 2.
    pub angle: usize,
    pub ray: usize,
    pub end: RayEnd,
}

#[derive(Debug, Clone)]
pub struct RayData {
    quad: AngularQuadrature,
    spacing: Vec<f64>,
    nx: Vec<usize>,
    ny: Vec<usize>,
    /// `rays[unique plane][angle][ray]`
    rays: Vec<Vec<Vec<Ray>>>,
    next_fw: Vec<Vec<Option<RayLink>>>,
    next_bw: Vec<Vec<Option<RayLink>>>,
    max_seg: usize,
}

impl RayData {
    /// Modularise `quad` and trace the rays of every unique plane.
    pub fn new(mesh: &CoreMesh, quad: &AngularQuadrature, config: &RayConfig) -> TransportResult<Self> {
        if !(config.spacing > 0.0) {
            return Err(TransportError::config(format!(
                "Ray spacing must be positive, got {}",
                config.spacing
            )));
        }
        let (hx_mod, hy_mod, npx, npy) = modular_cell(mesh, config.modularity)?;
        let hx = mesh.hx_core();
        let hy = mesh.hy_core();
        let ndir_oct = quad.ndir_oct();
        let n_angle = 2 * ndir_oct;

        let mut quad = quad.clone();
        let mut nx = vec![0; n_angle];
        let mut ny = vec![0; n_angle];
        let mut spacing = vec![0.0; n_angle];
        for i in 0..ndir_oct {
            let ang = *quad.angle(i);
            let nx_mod = (hx_mod * ang.alpha.sin().abs() / config.spacing).ceil() as usize;
            let ny_mod = (hy_mod * ang.alpha.cos().abs() / config.spacing).ceil() as usize;
            if nx_mod + ny_mod == 0 {
                return Err(TransportError::numeric(format!(
                    "Angle {i} gets no rays at spacing {}",
                    config.spacing
                )));
            }
            let alpha = (hy_mod * nx_mod as f64).atan2(hx_mod * ny_mod as f64);
            quad.modify_angle(i, Angle::from_angles(alpha, ang.theta, ang.weight));
            let space = if ny_mod > 0 {
                alpha.cos() * hy_mod / ny_mod as f64
            } else {
                alpha.sin() * hx_mod / nx_mod as f64
            };
            log::debug!(
                "Angle {i}: azimuth {:.6} -> {:.6}, spacing {:.6}",
                ang.alpha,
                alpha,
                space
            );
            for a in [i, i + ndir_oct] {
                nx[a] = nx_mod * npx;
                ny[a] = ny_mod * npy;
                spacing[a] = space;
            }
        }

        let mut rays = Vec::with_capacity(mesh.n_unique_planes());
        for iu in 0..mesh.n_unique_planes() {
            let iz = (0..mesh.nz())
                .find(|&iz| mesh.unique_plane_of(iz) == iu)
                .ok_or_else(|| TransportError::geometry(format!("Unique plane {iu} has no level")))?;
            let mut plane_rays = Vec::with_capacity(n_angle);
            for a in 0..n_angle {
                plane_rays.push(trace_angle(mesh, iz, quad.angle(a), nx[a], ny[a], hx, hy)?);
            }
            rays.push(plane_rays);
        }

        let mut data = RayData {
            quad,
            spacing,
            nx,
            ny,
            rays,
            next_fw: Vec::new(),
            next_bw: Vec::new(),
            max_seg: 0,
        };
        data.correct_volumes(mesh, config.volume_correction);
        data.link_boundaries(mesh);
        data.max_seg = data
            .rays
            .iter()
            .flatten()
            .flatten()
            .map(Ray::nseg)
            .max()
            .unwrap_or(0);

        let n_rays: usize = data.rays.iter().flatten().map(Vec::len).sum();
        log::info!(
            "Traced {} rays over {} unique planes ({} angles, max {} segments)",
            n_rays,
            data.rays.len(),
            n_angle,
            data.max_seg
        );
        Ok(data)
    }

    /// The quadrature with modularised azimuths.
    pub fn quadrature(&self) -> &AngularQuadrature {
        &self.quad
    }

    /// Number of angles carrying rays (octants 1 and 2).
    pub fn n_angle(&self) -> usize {
        self.spacing.len()
    }

    pub fn spacing(&self, angle: usize) -> f64 {
        self.spacing[angle]
    }

    /// Rays starting on the y-normal face.
    pub fn nx(&self, angle: usize) -> usize {
        self.nx[angle]
    }

    /// Rays starting on the x-normal face.
    pub fn ny(&self, angle: usize) -> usize {
        self.ny[angle]
    }

    pub fn n_planes(&self) -> usize {
        self.rays.len()
    }

    pub fn rays(&self, iu: usize, angle: usize) -> &[Ray] {
        &self.rays[iu][angle]
    }

    pub fn max_seg(&self) -> usize {
        self.max_seg
    }

    /// Continuation of the forward traversal of `ray`, `None` on vacuum.
    pub fn next_fw(&self, angle: usize, ray: usize) -> Option<RayLink> {
        self.next_fw[angle][ray]
    }

    /// Continuation of the backward traversal of `ray`.
    pub fn next_bw(&self, angle: usize, ray: usize) -> Option<RayLink> {
        self.next_bw[angle][ray]
    }

    /// Boundary face sizes of every upper-hemisphere angle, for
    /// [`crate::boundary::BoundaryCondition::new`].
    pub fn boundary_sizes(&self) -> Vec<[usize; 3]> {
        let ndir_oct = self.quad.ndir_oct();
        (0..4 * ndir_oct)
            .map(|a| {
                let i = a % ndir_oct;
                [self.ny[i], self.nx[i], 0]
            })
            .collect()
    }

    fn correct_volumes(&mut self, mesh: &CoreMesh, kind: VolumeCorrection) {
        let n_angle = self.n_angle();
        for (iu, plane_rays) in self.rays.iter_mut().enumerate() {
            let areas = mesh.unique_plane(iu).areas();
            let n = areas.len();
            match kind {
                VolumeCorrection::Flat => {
                    for (a, angle_rays) in plane_rays.iter_mut().enumerate() {
                        let mut traced = vec![0.0; n];
                        tally_lengths(angle_rays, self.spacing[a], 1.0, &mut traced);
                        let factors = correction_factors(areas, &traced, iu, Some(a));
                        scale_segments(angle_rays, &factors);
                    }
                }
                VolumeCorrection::Angle => {
                    let mut traced = vec![0.0; n];
                    for a in 0..n_angle {
                        let w = 0.5 * self.quad.angle(a).weight;
                        tally_lengths(&plane_rays[a], self.spacing[a], w, &mut traced);
                    }
                    let factors = correction_factors(areas, &traced, iu, None);
                    for angle_rays in plane_rays.iter_mut() {
                        scale_segments(angle_rays, &factors);
                    }
                }
            }
        }
    }

    fn link_boundaries(&mut self, mesh: &CoreMesh) {
        let n_angle = self.n_angle();
        let ndir_oct = self.quad.ndir_oct();
        let bc = mesh.boundary();
        // Boundary indices are shared by all planes
        let rays = &self.rays[0];

        let by_start: Vec<Vec<usize>> = rays.iter().map(|r| index_by(r, 0)).collect();
        let by_end: Vec<Vec<usize>> = rays.iter().map(|r| index_by(r, 1)).collect();

        let link = |from_angle: usize, index: usize, exit: Surface| -> Option<RayLink> {
            if !bc.is_reflective(exit) {
                return None;
            }
            let reflected = self.quad.reflect(from_angle, exit);
            if reflected < n_angle {
                Some(RayLink {
                    angle: reflected,
                    ray: by_start[reflected][index],
                    end: RayEnd::Start,
                })
            } else {
                let a = self.quad.reverse(reflected, 2);
                Some(RayLink {
                    angle: a,
                    ray: by_end[a][index],
                    end: RayEnd::End,
                })
            }
        };

        let mut next_fw = Vec::with_capacity(n_angle);
        let mut next_bw = Vec::with_capacity(n_angle);
        for (a, angle_rays) in rays.iter().enumerate() {
            let ny = self.ny[a];
            let east = self.quad.angle(a).ox > 0.0;
            let back = self.quad.reverse(a, 2);
            debug_assert!(back >= n_angle && back < 4 * ndir_oct);
            let mut fw = Vec::with_capacity(angle_rays.len());
            let mut bw = Vec::with_capacity(angle_rays.len());
            for ray in angle_rays {
                let [b0, b1] = ray.bc();
                let exit_fw = if b1 < ny {
                    if east { Surface::East } else { Surface::West }
                } else {
                    Surface::North
                };
                let exit_bw = if b0 < ny {
                    if east { Surface::West } else { Surface::East }
                } else {
                    Surface::South
                };
                fw.push(link(a, b1, exit_fw));
                bw.push(link(back, b0, exit_bw));
            }
            next_fw.push(fw);
            next_bw.push(bw);
        }
        self.next_fw = next_fw;
        self.next_bw = next_bw;
    }
}

/// Size of the cell the rays must be cyclic over, and how many of them
/// tile the core in x and y.
fn modular_cell(mesh: &CoreMesh, modularity: Modularity) -> TransportResult<(f64, f64, usize, usize)> {
    match modularity {
        Modularity::Core => Ok((mesh.hx_core(), mesh.hy_core(), 1, 1)),
        Modularity::Pin => {
            let meshes = mesh.pin_meshes();
            let first = meshes
                .first()
                .ok_or_else(|| TransportError::geometry("Core has no pin meshes"))?;
            let (px, py) = (first.pitch_x(), first.pitch_y());
            if meshes
                .iter()
                .any(|m| !fp_equiv(m.pitch_x(), px) || !fp_equiv(m.pitch_y(), py))
            {
                return Err(TransportError::config(
                    "Pin-modular rays need every pin mesh to have the same pitch",
                ));
            }
            Ok((px, py, mesh.nx(), mesh.ny()))
        }
    }
}

/// Rays of one angle in octant 1 or 2, x-face starts first.
fn trace_angle(
    mesh: &CoreMesh,
    iz: usize,
    angle: &Angle,
    nx: usize,
    ny: usize,
    hx: f64,
    hy: f64,
) -> TransportResult<Vec<Ray>> {
    let domain = Box2::new(Point2::new(0.0, 0.0), Point2::new(hx, hy));
    let space_x = hx / nx.max(1) as f64;
    let space_y = hy / ny.max(1) as f64;
    let x_start = if angle.ox > 0.0 { 0.0 } else { hx };

    let exit_index = |p: Point2| -> usize {
        if fp_equiv(p.x, 0.0) || fp_equiv(p.x, hx) {
            ((p.y / space_y) as usize).min(ny.saturating_sub(1))
        } else {
            ny + ((p.x / space_x) as usize).min(nx.saturating_sub(1))
        }
    };

    let mut rays = Vec::with_capacity(nx + ny);
    let starts = (0..ny)
        .map(|i| (i, Point2::new(x_start, (i as f64 + 0.5) * space_y)))
        .chain((0..nx).map(|i| (ny + i, Point2::new((i as f64 + 0.5) * space_x, 0.0))));
    for (bc1, p1) in starts {
        let p2 = domain.exit_point(p1, angle.alpha);
        rays.push(Ray::new(p1, p2, [bc1, exit_index(p2)], iz, mesh)?);
    }
    Ok(rays)
}

fn tally_lengths(rays: &[Ray], spacing: f64, weight: f64, traced: &mut [f64]) {
    for ray in rays {
        for (&r, &len) in ray.seg_reg().iter().zip(ray.seg_len()) {
            traced[r] += weight * len * spacing;
        }
    }
}

fn correction_factors(areas: &[f64], traced: &[f64], iu: usize, angle: Option<usize>) -> Vec<f64> {
    let mut missed = 0;
    let mut out_of_band = 0;
    let factors: Vec<f64> = areas
        .iter()
        .zip(traced)
        .map(|(&area, &t)| {
            if t > 0.0 {
                let f = area / t;
                if f < VOL_CORR_BAND.0 || f > VOL_CORR_BAND.1 {
                    out_of_band += 1;
                }
                f
            } else {
                missed += 1;
                1.0
            }
        })
        .collect();
    let which = angle.map_or_else(|| "all angles".to_string(), |a| format!("angle {a}"));
    if missed > 0 {
        log::warn!(
            "{missed} regions of unique plane {iu} have no rays for {which}; refine the ray spacing"
        );
    }
    if out_of_band > 0 {
        log::warn!(
            "{out_of_band} regions of unique plane {iu} need volume corrections outside {:?} for {which}",
            VOL_CORR_BAND
        );
    }
    factors
}

fn scale_segments(rays: &mut [Ray], factors: &[f64]) {
    for ray in rays {
        let regs = ray.seg_reg().to_vec();
        for (len, r) in ray.seg_len_mut().iter_mut().zip(regs) {
            *len *= factors[r];
        }
    }
}

/// Ray index of every boundary index, looked up by start (`end = 0`) or
/// end (`end = 1`).
fn index_by(rays: &[Ray], end: usize) -> Vec<usize> {
    let mut out = vec![0; rays.len()];
    for (i, ray) in rays.iter().enumerate() {
        out[ray.bc()[end]] = i;
    }
    out
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{three_by_three_case, two_group_pin_case};
    use transport_types::config::BoundaryKind;

    fn build(config: &transport_types::config::CaseConfig) -> (CoreMesh, RayData) {
        let mesh = CoreMesh::from_config(config).unwrap();
        let quad = AngularQuadrature::from_config(&config.ang_quad).unwrap();
        let rays = RayData::new(&mesh, &quad, &config.rays).unwrap();
        (mesh, rays)
    }

    #[test]
    fn test_modular_azimuths() {
        let (mesh, rd) = build(&three_by_three_case());
        let quad = rd.quadrature();
        for a in 0..quad.ndir_oct() {
            let alpha = quad.angle(a).alpha;
            let expected = (mesh.hy_core() * rd.nx(a) as f64) / (mesh.hx_core() * rd.ny(a) as f64);
            assert!((alpha.tan() - expected).abs() < 1e-10, "angle {}", a);
            let mirror = quad.angle(a + quad.ndir_oct()).alpha;
            assert!((mirror - (std::f64::consts::PI - alpha)).abs() < 1e-12);
            assert_eq!(rd.rays(0, a).len(), rd.nx(a) + rd.ny(a));
        }
        // Weights survive modularisation
        let w: f64 = quad.octant_angles(1).iter().map(|a| a.weight).sum();
        assert!((w - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_flat_correction_reproduces_areas() {
        let (mesh, rd) = build(&two_group_pin_case(2));
        let areas = mesh.unique_plane(0).areas();
        for a in 0..rd.n_angle() {
            let mut traced = vec![0.0; areas.len()];
            tally_lengths(rd.rays(0, a), rd.spacing(a), 1.0, &mut traced);
            for (t, v) in traced.iter().zip(areas) {
                assert!((t - v).abs() < 1e-12 * v.max(1.0), "angle {}: {} vs {}", a, t, v);
            }
        }
    }

    #[test]
    fn test_angle_correction_reproduces_areas() {
        let mut config = two_group_pin_case(2);
        config.rays.volume_correction = VolumeCorrection::Angle;
        let (mesh, rd) = build(&config);
        let areas = mesh.unique_plane(0).areas();
        let mut traced = vec![0.0; areas.len()];
        for a in 0..rd.n_angle() {
            let w = 0.5 * rd.quadrature().angle(a).weight;
            tally_lengths(rd.rays(0, a), rd.spacing(a), w, &mut traced);
        }
        for (t, v) in traced.iter().zip(areas) {
            assert!((t - v).abs() < 1e-12 * v.max(1.0));
        }
    }

    #[test]
    fn test_boundary_links_are_involutions() {
        let (_, rd) = build(&three_by_three_case());
        let partner = |link: RayLink| match link.end {
            RayEnd::Start => rd.next_bw(link.angle, link.ray),
            RayEnd::End => rd.next_fw(link.angle, link.ray),
        };
        for a in 0..rd.n_angle() {
            for r in 0..rd.rays(0, a).len() {
                let fw = rd.next_fw(a, r).unwrap();
                assert_eq!(partner(fw), Some(RayLink { angle: a, ray: r, end: RayEnd::End }));
                let bw = rd.next_bw(a, r).unwrap();
                assert_eq!(partner(bw), Some(RayLink { angle: a, ray: r, end: RayEnd::Start }));
            }
        }
    }

    #[test]
    fn test_links_meet_at_the_same_point() {
        let (_, rd) = build(&three_by_three_case());
        for a in 0..rd.n_angle() {
            for (r, ray) in rd.rays(0, a).iter().enumerate() {
                let link = rd.next_fw(a, r).unwrap();
                let next = &rd.rays(0, link.angle)[link.ray];
                let p = match link.end {
                    RayEnd::Start => next.p1(),
                    RayEnd::End => next.p2(),
                };
                assert!(p.distance(ray.p2()) < 1e-9, "{} vs {}", p, ray.p2());
            }
        }
    }

    #[test]
    fn test_vacuum_ends_have_no_link() {
        let mut config = three_by_three_case();
        config.core.bc_east = BoundaryKind::Vacuum;
        let (mesh, rd) = build(&config);
        for a in 0..rd.n_angle() {
            let east = rd.quadrature().angle(a).ox > 0.0;
            for (r, ray) in rd.rays(0, a).iter().enumerate() {
                let at_east = fp_equiv(ray.p2().x, mesh.hx_core());
                if east && at_east {
                    assert!(rd.next_fw(a, r).is_none());
                } else {
                    assert!(rd.next_fw(a, r).is_some());
                }
            }
        }
    }

    #[test]
    fn test_pin_modularity_repeats_per_pin() {
        let mut config = three_by_three_case();
        config.rays.modularity = Modularity::Pin;
        let (_, rd) = build(&config);
        for a in 0..rd.n_angle() {
            assert_eq!(rd.nx(a) % 3, 0);
            assert_eq!(rd.ny(a) % 3, 0);
        }
        let sizes = rd.boundary_sizes();
        assert_eq!(sizes.len(), 2 * rd.n_angle());
        assert_eq!(sizes[rd.n_angle()][0], rd.ny(0));
    }
}
