// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Coarse-Mesh Finite Difference
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! CMFD acceleration of the outer power iteration.
//!
//! The transport currents tallied on the pin-cell faces are turned into
//! nonlinear diffusion corrections so that the coarse diffusion problem
//! reproduces them exactly:
//!
//! ```text
//! J = −D̂ (φ_R − φ_L) − D̃ (φ_R + φ_L)
//! ```
//!
//! with `D̂ = 2 d_L d_R / (d_L + d_R)` and `d = D / h`. The resulting
//! multigroup eigenproblem is solved by (optionally Wielandt-shifted)
//! power iteration, each group system by restarted GMRES on a CSR matrix.

use ndarray::Array2;
use transport_geom::coarse::CoarseMesh;
use transport_geom::primitives::{Normal, Surface};
use transport_math::gmres::{gmres_solve, vec_norm, GmresConfig};
use transport_math::sparse::CsrMatrix;
use transport_types::config::CmfdConfig;
use transport_types::error::{TransportError, TransportResult};

use crate::coarse_data::CoarseData;
use crate::xs_homogenized::XSMeshHomogenized;

/// `d` standing in for the missing neighbour of a vacuum face. The
/// harmonic mean with the boundary cell gives the half-cell Marshak
/// coupling `J = 2d φ / (1 + 4d)`.
const D_VACUUM: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CmfdOutcome {
    pub k: f64,
    pub iterations: usize,
    pub converged: bool,
    /// The Wielandt shift stayed active to the end.
    pub shifted: bool,
}

pub struct Cmfd<'a> {
    mesh: &'a CoarseMesh,
    config: CmfdConfig,
    /// One operator per group, sharing the 7-point pattern.
    matrices: Vec<CsrMatrix>,
    /// `[n_surf, ng]`
    d_hat: Array2<f64>,
    d_tilde: Array2<f64>,
    /// Last converged eigenvalue; the shift is applied above it.
    k_last: Option<f64>,
}

impl<'a> Cmfd<'a> {
    pub fn new(mesh: &'a CoarseMesh, config: &CmfdConfig, ng: usize) -> TransportResult<Self> {
        let mut pattern = Vec::with_capacity(mesh.n_cell() * 6);
        for cell in 0..mesh.n_cell() {
            for surface in Surface::ALL {
                if let Some(other) = mesh.coarse_neighbor(cell, surface) {
                    pattern.push((cell, other));
                }
            }
        }
        let matrix = CsrMatrix::from_pattern(mesh.n_cell(), &pattern)?;
        log::info!(
            "CMFD: {} cells, {} surfaces, {} non-zeros per group, Wielandt shift {}",
            mesh.n_cell(),
            mesh.n_surf(),
            matrix.nnz(),
            config.wielandt_shift
        );
        Ok(Cmfd {
            mesh,
            config: config.clone(),
            matrices: vec![matrix; ng],
            d_hat: Array2::zeros((mesh.n_surf(), ng)),
            d_tilde: Array2::zeros((mesh.n_surf(), ng)),
            k_last: None,
        })
    }

    pub fn d_hat(&self) -> &Array2<f64> {
        &self.d_hat
    }

    pub fn d_tilde(&self) -> &Array2<f64> {
        &self.d_tilde
    }

    /// Eigenvalue of the last converged solve.
    pub fn k_last(&self) -> Option<f64> {
        self.k_last
    }

    /// Shifted eigenvalue `k_s` for an incoming estimate `k`. The shift is
    /// applied above both `k` and the last converged eigenvalue, so a poor
    /// transport estimate cannot pull `k_s` below the fundamental mode.
    pub fn shifted_k(&self, k: f64) -> Option<f64> {
        let shift = self.config.wielandt_shift;
        (shift > 0.0).then(|| k.max(self.k_last.unwrap_or(k)) + shift)
    }

    /// Solve the coarse eigenproblem starting from `k` and the flux in
    /// `data`. The converged flux keeps the input total fission rate;
    /// flux and currents are written back to `data`.
    pub fn solve(&mut self, k: f64, data: &mut CoarseData, xs: &XSMeshHomogenized) -> TransportResult<CmfdOutcome> {
        let mesh = self.mesh;
        let ng = self.matrices.len();
        if xs.len() != mesh.n_cell() || data.n_cell() != mesh.n_cell() || data.n_group() != ng {
            return Err(TransportError::numeric(format!(
                "CMFD sizes disagree: {} cells, {} XS regions, coarse data {}x{}",
                mesh.n_cell(),
                xs.len(),
                data.n_cell(),
                data.n_group()
            )));
        }

        self.compute_couplings(data, xs);

        let vol = mesh.volumes();
        let mut phi = data.flux.clone();
        let mut fs = fission(xs, &phi);
        let f_total: f64 = fs.iter().zip(vol).map(|(f, v)| f * v).sum();
        if f_total.is_nan() || f_total <= 0.0 {
            log::warn!("CMFD skipped: no fission source on the coarse mesh");
            return Ok(CmfdOutcome {
                k,
                iterations: 0,
                converged: false,
                shifted: false,
            });
        }

        let mut k_shift = self.shifted_k(k);
        self.assemble(xs, k_shift)?;

        let restart = self.config.krylov_restart.max(1);
        let gmres = GmresConfig {
            restart,
            max_iter: self.config.krylov_max_iter.div_ceil(restart).max(1),
            tol: self.config.krylov_tol,
            ..GmresConfig::default()
        };

        let mut k = k;
        let mut converged = false;
        let mut iterations = 0;
        let mut rhs = vec![0.0; mesh.n_cell()];
        let mut x = vec![0.0; mesh.n_cell()];

        for it in 1..=self.config.max_iter {
            iterations = it;
            let k_old = k;
            let fs_old = fs.clone();
            let phi_start = k_shift.map(|_| phi.clone());
            let mut negative = 0;

            for g in 0..ng {
                let fs_now = fission(xs, &phi);
                for cell in 0..mesh.n_cell() {
                    let xsr = xs.region(cell);
                    let fission_src = match k_shift {
                        Some(ks) => {
                            (1.0 / k_old - 1.0 / ks) * fs_old[cell]
                                + (fs_now[cell] - xsr.xsnf()[g] * phi[[cell, g]]) / ks
                        }
                        None => fs_old[cell] / k_old,
                    };
                    let mut src = xsr.xsch()[g] * fission_src;
                    for (from, s) in xsr.scat().to(g).iter() {
                        if from != g {
                            src += s * phi[[cell, from]];
                        }
                    }
                    rhs[cell] = vol[cell] * src;
                    x[cell] = phi[[cell, g]];
                }
                let res = gmres_solve(&self.matrices[g], &rhs, &mut x, &gmres)?;
                if !res.converged {
                    log::debug!(
                        "CMFD group {g}: GMRES stopped after {} iterations, residual {:.3e}",
                        res.iterations,
                        res.residual
                    );
                }
                for (cell, &v) in x.iter().enumerate() {
                    if v < 0.0 {
                        negative += 1;
                    }
                    phi[[cell, g]] = if v < 0.0 && self.config.negative_fixup { v.abs() } else { v };
                }
            }

            // Negative fluxes under the shift mean k_s is not above the
            // fundamental eigenvalue; redo the iteration unshifted.
            if let (Some(ks), Some(start)) = (k_shift, phi_start) {
                if negative > 0 {
                    log::debug!(
                        "CMFD iteration {it}: {negative} negative fluxes at k_s = {ks:.6}, dropping the Wielandt shift"
                    );
                    k_shift = None;
                    self.assemble(xs, None)?;
                    phi = start;
                    fs = fs_old;
                    continue;
                }
            }
            if negative > 0 && self.config.negative_fixup {
                log::debug!("CMFD iteration {it}: {negative} negative fluxes fixed up");
            }

            fs = fission(xs, &phi);
            let f_new: f64 = fs.iter().zip(vol).map(|(f, v)| f * v).sum();
            if !f_new.is_finite() || f_new <= 0.0 {
                return Err(TransportError::numeric(format!(
                    "CMFD iteration {it}: fission source collapsed ({f_new:e})"
                )));
            }
            k = match k_shift {
                Some(ks) => 1.0 / (1.0 / ks + (1.0 / k_old - 1.0 / ks) * f_total / f_new),
                None => k_old * f_new / f_total,
            };

            let scale = f_total / f_new;
            phi.mapv_inplace(|p| p * scale);
            fs.iter_mut().for_each(|f| *f *= scale);

            let diff: Vec<f64> = fs.iter().zip(&fs_old).map(|(a, b)| a - b).collect();
            let norm = vec_norm(&fs);
            let psi_err = if norm > 0.0 { vec_norm(&diff) / norm } else { 0.0 };
            let k_err = (k - k_old).abs();
            log::trace!("CMFD {it:4}: k = {k:.8}, Δk = {k_err:.3e}, ΔF = {psi_err:.3e}");
            if k_err < self.config.k_tol && psi_err < self.config.psi_tol {
                converged = true;
                break;
            }
        }

        if converged {
            log::debug!("CMFD converged in {iterations} iterations, k = {k:.8}");
            self.k_last = Some(k);
        } else {
            log::info!("CMFD reached {iterations} iterations without converging, k = {k:.8}");
        }

        data.flux.assign(&phi);
        self.store_currents(data);
        Ok(CmfdOutcome {
            k,
            iterations,
            converged,
            shifted: k_shift.is_some(),
        })
    }

    /// D̂ and D̃ of every surface and group.
    fn compute_couplings(&mut self, data: &CoarseData, xs: &XSMeshHomogenized) {
        let mesh = self.mesh;
        let bcs = mesh.boundary();
        let ng = self.matrices.len();
        for s in 0..mesh.n_surf() {
            let normal = mesh.surface_normal(s);
            let (left, right) = mesh.coarse_neigh_cells(s);
            let has_data = match normal {
                Normal::Z => data.has_axial_data,
                _ => data.has_radial_data,
            };
            let boundary_face = match (left, right) {
                (Some(_), None) => Some(positive_face(normal)),
                (None, Some(_)) => Some(positive_face(normal).opposite()),
                _ => None,
            };
            // Planes stay decoupled until a 3D sweep provides currents, and
            // a reflective face carries no net current whatever the last
            // sweep tallied there.
            let decoupled = (normal == Normal::Z && !data.has_axial_data)
                || boundary_face.is_some_and(|face| bcs.is_reflective(face));
            if decoupled {
                for g in 0..ng {
                    self.d_hat[[s, g]] = 0.0;
                    self.d_tilde[[s, g]] = 0.0;
                }
                continue;
            }
            for g in 0..ng {
                let d = |cell: usize| {
                    let h = mesh.cell_thickness(cell, normal);
                    1.0 / (3.0 * xs.region(cell).xstr()[g] * h)
                };
                let d_hat = match (left.map(d), right.map(d)) {
                    (Some(dl), Some(dr)) => 2.0 * dl * dr / (dl + dr),
                    (Some(dc), None) | (None, Some(dc)) => 2.0 * dc * D_VACUUM / (dc + D_VACUUM),
                    (None, None) => 0.0,
                };
                let d_tilde = if has_data {
                    let phi_l = left.map_or(0.0, |c| data.flux[[c, g]]);
                    let phi_r = right.map_or(0.0, |c| data.flux[[c, g]]);
                    let dt = -(data.current[[s, g]] + d_hat * (phi_r - phi_l)) / (phi_r + phi_l);
                    if dt.is_finite() {
                        dt
                    } else {
                        0.0
                    }
                } else {
                    0.0
                };
                self.d_hat[[s, g]] = d_hat;
                self.d_tilde[[s, g]] = d_tilde;
            }
        }
    }

    /// Loss operator of every group, with the shifted self-fission moved
    /// to the left-hand side when `k_shift` is set.
    fn assemble(&mut self, xs: &XSMeshHomogenized, k_shift: Option<f64>) -> TransportResult<()> {
        let mesh = self.mesh;
        let vol = mesh.volumes();
        for (g, matrix) in self.matrices.iter_mut().enumerate() {
            matrix.clear();
            for cell in 0..mesh.n_cell() {
                let xsr = xs.region(cell);
                let mut diag = vol[cell] * xsr.xsrm()[g];
                if let Some(ks) = k_shift {
                    diag -= vol[cell] * xsr.xsch()[g] * xsr.xsnf()[g] / ks;
                }
                matrix.add_diag(cell, diag);
            }
            for s in 0..mesh.n_surf() {
                let (d_hat, d_tilde) = (self.d_hat[[s, g]], self.d_tilde[[s, g]]);
                if d_hat == 0.0 && d_tilde == 0.0 {
                    continue;
                }
                let area = mesh.surface_area(s);
                let (left, right) = mesh.coarse_neigh_cells(s);
                if let Some(l) = left {
                    matrix.add_diag(l, area * (d_hat - d_tilde));
                    if let Some(r) = right {
                        matrix.add(l, r, -area * (d_hat + d_tilde))?;
                    }
                }
                if let Some(r) = right {
                    matrix.add_diag(r, area * (d_hat + d_tilde));
                    if let Some(l) = left {
                        matrix.add(r, l, -area * (d_hat - d_tilde))?;
                    }
                }
            }
        }
        Ok(())
    }

    fn store_currents(&self, data: &mut CoarseData) {
        let mesh = self.mesh;
        for s in 0..mesh.n_surf() {
            let (left, right) = mesh.coarse_neigh_cells(s);
            for g in 0..self.matrices.len() {
                let phi_l = left.map_or(0.0, |c| data.flux[[c, g]]);
                let phi_r = right.map_or(0.0, |c| data.flux[[c, g]]);
                data.current[[s, g]] =
                    -self.d_hat[[s, g]] * (phi_r - phi_l) - self.d_tilde[[s, g]] * (phi_r + phi_l);
            }
        }
    }
}

fn positive_face(normal: Normal) -> Surface {
    match normal {
        Normal::X => Surface::East,
        Normal::Y => Surface::North,
        Normal::Z => Surface::Top,
    }
}

/// `Σ_g νσ_f φ` per coarse cell.
fn fission(xs: &XSMeshHomogenized, phi: &Array2<f64>) -> Vec<f64> {
    (0..phi.nrows())
        .map(|cell| {
            let xsr = xs.region(cell);
            (0..phi.ncols()).map(|g| xsr.xsnf()[g] * phi[[cell, g]]).sum()
        })
        .collect()
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::homogeneous_case;
    use crate::xs_mesh::{XSMesh, XSMeshRegion};
    use transport_geom::core_mesh::CoreMesh;
    use transport_math::scattering::ScatteringMatrix;
    use transport_types::config::BoundaryKind;

    /// One group, σ_tr = 1, σ_a = 0.1, νσ_f = 0.12: k∞ = 1.2.
    fn fissile(mesh: &CoreMesh) -> XSMeshHomogenized {
        let scat = ScatteringMatrix::from_rows(&[vec![0.9]]).unwrap();
        let region = XSMeshRegion::new((0..mesh.n_reg()).collect(), vec![1.0], vec![0.12], vec![0.05], vec![1.0], scat);
        XSMeshHomogenized::new(mesh, &XSMesh::from_regions(1, vec![region]))
    }

    fn run(mesh: &CoreMesh, config: &CmfdConfig, data: &mut CoarseData, k: f64) -> CmfdOutcome {
        let xs = fissile(mesh);
        let mut cmfd = Cmfd::new(mesh.coarse(), config, 1).unwrap();
        cmfd.solve(k, data, &xs).unwrap()
    }

    fn flat(mesh: &CoreMesh) -> CoarseData {
        let cmesh = mesh.coarse();
        let mut data = CoarseData::new(cmesh.n_cell(), cmesh.n_surf(), 1);
        data.flux.fill(1.0);
        data
    }

    #[test]
    fn test_reflective_box_gives_k_infinity() {
        let case = homogeneous_case(3, 2, BoundaryKind::Reflect);
        let mesh = CoreMesh::from_config(&case).unwrap();
        let mut data = flat(&mesh);
        let out = run(&mesh, &CmfdConfig::default(), &mut data, 1.0);
        assert!(out.converged);
        assert!((out.k - 1.2).abs() < 1e-8, "k = {}", out.k);
        // Flat flux with unchanged total fission
        assert!(data.flux.iter().all(|&phi| (phi - 1.0).abs() < 1e-8));
    }

    #[test]
    fn test_vacuum_box_leaks() {
        let case = homogeneous_case(3, 1, BoundaryKind::Vacuum);
        let mesh = CoreMesh::from_config(&case).unwrap();
        let mut data = flat(&mesh);
        let out = run(&mesh, &CmfdConfig::default(), &mut data, 1.0);
        assert!(out.converged);
        assert!(out.k < 1.2 && out.k > 0.1, "k = {}", out.k);
        // Centre cell peaks, corners are lowest
        let centre = data.flux[[4, 0]];
        assert!(data.flux.iter().all(|&phi| phi <= centre + 1e-12));
        assert!((data.flux[[0, 0]] - data.flux[[8, 0]]).abs() < 1e-8);
    }

    #[test]
    fn test_wielandt_shift_does_not_move_eigenvalue() {
        let case = homogeneous_case(3, 1, BoundaryKind::Vacuum);
        let mesh = CoreMesh::from_config(&case).unwrap();
        let mut shifted = flat(&mesh);
        let mut plain = flat(&mesh);
        let cfg = CmfdConfig {
            k_tol: 1e-10,
            psi_tol: 1e-9,
            max_iter: 500,
            ..CmfdConfig::default()
        };
        let a = run(&mesh, &cfg, &mut shifted, 1.0);
        let b = run(&mesh, &CmfdConfig { wielandt_shift: 0.0, ..cfg.clone() }, &mut plain, 1.0);
        assert!(a.converged && b.converged);
        assert!((a.k - b.k).abs() < 1e-7);
        assert!(a.iterations <= b.iterations);
    }

    #[test]
    fn test_stored_currents_are_a_fixed_point() {
        let case = homogeneous_case(3, 1, BoundaryKind::Vacuum);
        let mesh = CoreMesh::from_config(&case).unwrap();
        let cmesh = mesh.coarse();
        let mut data = flat(&mesh);
        data.has_radial_data = true;
        // Arbitrary transport currents drive the first solve
        for s in 0..cmesh.n_surf() {
            data.current[[s, 0]] = 0.01 * ((s % 5) as f64 - 2.0);
        }
        let tight = CmfdConfig {
            k_tol: 1e-12,
            psi_tol: 1e-11,
            max_iter: 1000,
            krylov_tol: 1e-14,
            ..CmfdConfig::default()
        };
        let first = run(&mesh, &tight, &mut data, 1.0);
        assert!(first.converged);
        let flux = data.flux.clone();
        let loose = CmfdConfig {
            k_tol: 1e-8,
            psi_tol: 1e-7,
            ..tight
        };
        let second = run(&mesh, &loose, &mut data, first.k);
        assert!((first.k - second.k).abs() < 1e-9);
        assert!(second.iterations <= 2, "{} iterations", second.iterations);
        for (a, b) in flux.iter().zip(data.flux.iter()) {
            assert!((a - b).abs() < 1e-7 * a.abs().max(1.0));
        }
    }

    #[test]
    fn test_reflective_faces_ignore_tallied_currents() {
        // A lagged sweep leaves net current on reflective faces
        let case = homogeneous_case(3, 1, BoundaryKind::Reflect);
        let mesh = CoreMesh::from_config(&case).unwrap();
        let cmesh = mesh.coarse();
        let mut data = flat(&mesh);
        data.has_radial_data = true;
        let boundary: Vec<usize> = (0..cmesh.n_surf())
            .filter(|&s| {
                let (l, r) = cmesh.coarse_neigh_cells(s);
                l.is_none() != r.is_none()
            })
            .collect();
        for &s in &boundary {
            data.current[[s, 0]] = 0.05;
        }
        let out = run(&mesh, &CmfdConfig::default(), &mut data, 1.0);
        assert!(out.converged);
        assert!((out.k - 1.2).abs() < 1e-8, "k = {}", out.k);
        assert!(data.flux.iter().all(|&phi| (phi - 1.0).abs() < 1e-8));
        for &s in &boundary {
            assert_eq!(data.current[[s, 0]], 0.0);
        }
    }

    #[test]
    fn test_vacuum_face_uses_half_cell_marshak_coupling() {
        let case = homogeneous_case(1, 1, BoundaryKind::Vacuum);
        let mesh = CoreMesh::from_config(&case).unwrap();
        let cmesh = mesh.coarse();
        let xs = fissile(&mesh);
        let mut cmfd = Cmfd::new(cmesh, &CmfdConfig::default(), 1).unwrap();
        let mut data = flat(&mesh);
        cmfd.solve(1.0, &mut data, &xs).unwrap();
        // d = 1/(3 σ_tr h) = 1/3, so D̂ = 2d/(1 + 4d) = 2/7
        let east = cmesh.coarse_surf(0, Surface::East);
        assert!((cmfd.d_hat()[[east, 0]] - 2.0 / 7.0).abs() < 1e-14);
    }

    #[test]
    fn test_shift_below_fundamental_falls_back_to_power_iteration() {
        let case = homogeneous_case(2, 1, BoundaryKind::Reflect);
        let mesh = CoreMesh::from_config(&case).unwrap();
        let cfg = CmfdConfig {
            wielandt_shift: 0.5,
            ..CmfdConfig::default()
        };
        // k_s = 0.55 sits below k∞ = 1.2
        let mut data = flat(&mesh);
        let out = run(&mesh, &cfg, &mut data, 0.05);
        assert!(out.converged);
        assert!(!out.shifted);
        assert!((out.k - 1.2).abs() < 1e-8, "k = {}", out.k);
        assert!(data.flux.iter().all(|&phi| phi > 0.0));
    }

    #[test]
    fn test_shift_stays_above_last_converged_k() {
        let case = homogeneous_case(2, 1, BoundaryKind::Reflect);
        let mesh = CoreMesh::from_config(&case).unwrap();
        let cfg = CmfdConfig {
            wielandt_shift: 0.5,
            ..CmfdConfig::default()
        };
        let xs = fissile(&mesh);
        let mut cmfd = Cmfd::new(mesh.coarse(), &cfg, 1).unwrap();
        assert_eq!(cmfd.shifted_k(1.0), Some(1.5));

        let first = cmfd.solve(1.0, &mut flat(&mesh), &xs).unwrap();
        assert!(first.converged && first.shifted);
        let k_last = cmfd.k_last().unwrap();
        assert!((k_last - 1.2).abs() < 1e-8);

        // A collapsed transport estimate no longer drags k_s down
        assert!((cmfd.shifted_k(0.05).unwrap() - (k_last + 0.5)).abs() < 1e-15);
        let second = cmfd.solve(0.05, &mut flat(&mesh), &xs).unwrap();
        assert!(second.converged && second.shifted);
        assert!((second.k - 1.2).abs() < 1e-8, "k = {}", second.k);
    }

    #[test]
    fn test_axial_surfaces_decoupled_without_axial_data() {
        let case = homogeneous_case(2, 2, BoundaryKind::Vacuum);
        let mesh = CoreMesh::from_config(&case).unwrap();
        let cmesh = mesh.coarse();
        let mut data = flat(&mesh);
        run(&mesh, &CmfdConfig::default(), &mut data, 1.0);
        for s in 0..cmesh.n_surf() {
            if cmesh.surface_normal(s) == Normal::Z {
                assert_eq!(data.current[[s, 0]], 0.0);
            }
        }
    }
}
