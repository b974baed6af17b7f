// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — 2D/3D Plane Sweeper
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! 2D/3D coupling of a planar MoC sweep with a 3D Sn sweep.
//!
//! The MoC sweep resolves the pin geometry in each macroplane and sees
//! the axial direction only through a transverse-leakage source built
//! from the coarse axial currents. It hands the Sn sweep a set of
//! correction factors, and the corrected diamond-difference Sn sweep on
//! the pin-cell mesh couples the planes axially and produces the next
//! axial currents.
//!
//! Per group:
//!
//! 1. the Sn cross sections are re-homogenised from the MoC flux;
//! 2. the transverse leakage is added to the MoC source and MoC sweeps,
//!    measuring α and β (skipped for the first `inactive_moc` outers);
//! 3. Sn sweeps with those factors and tallies the coarse currents;
//! 4. optionally, the Sn pin flux is projected onto the fine MoC flux.

use ndarray::Array2;
use transport_geom::core_mesh::CoreMesh;
use transport_geom::primitives::{Normal, Surface};
use transport_types::config::{CaseConfig, SnEquation};
use transport_types::error::TransportResult;

use crate::coarse_data::CoarseData;
use crate::correction::CorrectionData;
use crate::moc::{pin_average_flux, MocSweeper};
use crate::quadrature::AngularQuadrature;
use crate::sn::SnSweeper;
use crate::source::{pin_average, Source2D3D};
use crate::xs_homogenized::XSMeshHomogenized;
use crate::xs_mesh::XSMesh;

pub struct PlaneSweeper<'a> {
    mesh: &'a CoreMesh,
    moc: MocSweeper<'a>,
    sn: SnSweeper<'a>,
    corr: CorrectionData,
    inactive_moc: usize,
    expose_sn: bool,
    sn_project: bool,
    /// Outer iterations started so far.
    outer: usize,
}

impl<'a> PlaneSweeper<'a> {
    /// `sn_xs` is either homogenised from `xs` or read from files; the Sn
    /// sweep always uses the corrected equation and the MoC quadrature.
    pub fn new(
        mesh: &'a CoreMesh,
        xs: XSMesh,
        sn_xs: XSMeshHomogenized,
        config: &CaseConfig,
    ) -> TransportResult<Self> {
        let moc = MocSweeper::new(mesh, xs, config)?;
        let mut sn_config = config.clone();
        sn_config.sweeper.equation = SnEquation::Cdd;
        sn_config.sweeper.n_inner = config.sweeper.n_inner_sn;
        let quad = moc.quadrature().clone();
        let sn = SnSweeper::with_quadrature(mesh, sn_xs, quad, &sn_config)?;
        let corr = CorrectionData::new(mesh.n_pin(), sn.quadrature().ndir(), moc.n_group());
        log::info!(
            "2D3D sweeper: {} inactive MoC outers, exposing the {} flux{}",
            config.sweeper.inactive_moc,
            if config.sweeper.expose_sn { "Sn" } else { "MoC" },
            if config.sweeper.sn_project { ", Sn projection on" } else { "" }
        );
        Ok(PlaneSweeper {
            mesh,
            moc,
            sn,
            corr,
            inactive_moc: config.sweeper.inactive_moc,
            expose_sn: config.sweeper.expose_sn,
            sn_project: config.sweeper.sn_project,
            outer: 0,
        })
    }

    pub fn moc(&self) -> &MocSweeper<'a> {
        &self.moc
    }

    pub fn moc_mut(&mut self) -> &mut MocSweeper<'a> {
        &mut self.moc
    }

    pub fn sn(&self) -> &SnSweeper<'a> {
        &self.sn
    }

    pub fn sn_mut(&mut self) -> &mut SnSweeper<'a> {
        &mut self.sn
    }

    pub fn corrections(&self) -> &CorrectionData {
        &self.corr
    }

    pub fn quadrature(&self) -> &AngularQuadrature {
        self.moc.quadrature()
    }

    pub fn exposes_sn(&self) -> bool {
        self.expose_sn
    }

    pub fn n_group(&self) -> usize {
        self.moc.n_group()
    }

    pub fn initialize(&mut self) {
        self.moc.initialize();
        self.sn.initialize();
        self.corr = CorrectionData::new(self.mesh.n_pin(), self.sn.quadrature().ndir(), self.n_group());
        self.outer = 0;
    }

    pub fn start_outer(&mut self) {
        self.outer += 1;
    }

    /// Whether the MoC half runs in the current outer iteration.
    pub fn moc_active(&self) -> bool {
        self.outer > self.inactive_moc
    }

    /// Re-homogenise the Sn cross sections from the fine MoC flux.
    pub fn homogenize(&mut self) {
        self.sn.xs_mut().update(self.mesh, self.moc.xs(), self.moc.flux());
    }

    pub fn sweep(&mut self, g: usize, source: &mut Source2D3D, coarse: &mut CoarseData) -> TransportResult<()> {
        let mesh = self.mesh;
        self.homogenize();

        if self.moc_active() {
            if coarse.has_axial_data {
                let tl = transverse_leakage(mesh, coarse, g);
                self.moc.apply_transverse_leakage(g, &mut source.moc, &tl);
            } else {
                self.moc.clear_split();
            }
            self.moc.sweep(g, &mut source.moc, None, Some(&mut self.corr))?;
            self.corr.mirror_lower_hemisphere(self.moc.quadrature(), g);
        }

        self.sn.sweep(g, &mut source.sn, Some(coarse), Some(&self.corr))?;

        if self.sn_project {
            self.project_sn(g);
        }
        Ok(())
    }

    /// Scale the fine MoC flux of group `g` so each pin cell carries the
    /// Sn pin flux.
    fn project_sn(&mut self, g: usize) {
        let mesh = self.mesh;
        let moc_pin = pin_average_flux(mesh, self.moc.flux());
        let sn_flux = self.sn.flux();
        let flux = self.moc.flux_mut();
        for cell in 0..mesh.n_pin() {
            let old = moc_pin[[cell, g]];
            if old == 0.0 {
                continue;
            }
            let ratio = sn_flux[[cell, g]] / old;
            for r in mesh.cell_regions(cell) {
                flux[[r, g]] *= ratio;
            }
        }
    }

    /// Fine-mesh fission rate. With the Sn solution exposed, each pin keeps
    /// the MoC shape but carries the Sn pin-cell rate.
    pub fn fission_rate(&self) -> Vec<f64> {
        let fine = self.moc.fission_rate();
        if !self.expose_sn {
            return fine;
        }
        let mesh = self.mesh;
        let sn = self.sn.fission_rate();
        let avg = pin_average(mesh, &fine);
        let mut out = fine;
        for cell in 0..mesh.n_pin() {
            if avg[cell] == 0.0 {
                continue;
            }
            let ratio = sn[cell] / avg[cell];
            for r in mesh.cell_regions(cell) {
                out[r] *= ratio;
            }
        }
        out
    }

    pub fn flux(&self) -> &Array2<f64> {
        if self.expose_sn {
            self.sn.flux()
        } else {
            self.moc.flux()
        }
    }

    pub fn pin_flux(&self) -> Array2<f64> {
        if self.expose_sn {
            self.sn.pin_flux()
        } else {
            self.moc.pin_flux()
        }
    }

    pub fn pin_powers(&self) -> Vec<f64> {
        if self.expose_sn {
            self.sn.pin_powers()
        } else {
            self.moc.pin_powers()
        }
    }

    /// Apply a CMFD update: the Sn flux takes the new coarse flux, the
    /// fine flux is rescaled to the same pin averages and both boundary
    /// flux sets follow `ratio`.
    pub fn project_coarse(&mut self, coarse: &CoarseData, ratio: &Array2<f64>) {
        self.sn.flux_mut().assign(&coarse.flux);
        self.sn.scale_boundary(ratio);
        self.moc.set_pin_flux(&coarse.flux);
        self.moc.scale_boundary(ratio);
    }
}

/// Axial leakage source `−(J_top − J_bottom)/Δz` of every pin cell,
/// spread over its fine regions.
pub(crate) fn transverse_leakage(mesh: &CoreMesh, coarse: &CoarseData, g: usize) -> Vec<f64> {
    let cmesh = mesh.coarse();
    let mut tl = vec![0.0; mesh.n_reg()];
    for cell in 0..mesh.n_pin() {
        let top = cmesh.coarse_surf(cell, Surface::Top);
        let bottom = cmesh.coarse_surf(cell, Surface::Bottom);
        let dz = cmesh.cell_thickness(cell, Normal::Z);
        let leak = -(coarse.current[[top, g]] - coarse.current[[bottom, g]]) / dz;
        for r in mesh.cell_regions(cell) {
            tl[r] = leak;
        }
    }
    tl
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{SourceIsotropic, SourceKind};
    use crate::test_support::homogeneous_case;
    use crate::xs_mesh::XSMeshRegion;
    use transport_math::scattering::ScatteringMatrix;
    use transport_types::config::{BoundaryKind, NegativeSourcePolicy};

    fn scatterer(mesh: &CoreMesh) -> XSMesh {
        let scat = ScatteringMatrix::from_rows(&[vec![0.5]]).unwrap();
        let region = XSMeshRegion::new((0..mesh.n_reg()).collect(), vec![1.0], vec![0.0], vec![0.0], vec![0.0], scat);
        XSMesh::from_regions(1, vec![region])
    }

    fn source(mesh: &CoreMesh, value: f64) -> Source2D3D {
        let mut moc = SourceIsotropic::new(SourceKind::Moc, mesh.n_reg(), NegativeSourcePolicy::Warn);
        moc.set_external(Array2::from_elem((mesh.n_reg(), 1), value)).unwrap();
        let mut sn = SourceIsotropic::new(SourceKind::Sn, mesh.n_pin(), NegativeSourcePolicy::Warn);
        sn.set_external(Array2::from_elem((mesh.n_pin(), 1), value)).unwrap();
        Source2D3D::new(moc, sn)
    }

    fn sweeper<'a>(mesh: &'a CoreMesh, config: &CaseConfig) -> PlaneSweeper<'a> {
        let xs = scatterer(mesh);
        let sn_xs = XSMeshHomogenized::new(mesh, &xs);
        PlaneSweeper::new(mesh, xs, sn_xs, config).unwrap()
    }

    #[test]
    fn test_reflective_box_converges_to_infinite_medium() {
        let config = homogeneous_case(2, 2, BoundaryKind::Reflect);
        let mesh = CoreMesh::from_config(&config).unwrap();
        let mut ps = sweeper(&mesh, &config);
        ps.initialize();
        let cmesh = mesh.coarse();
        let mut coarse = CoarseData::new(cmesh.n_cell(), cmesh.n_surf(), 1);
        let mut src = source(&mesh, 1.0);
        for _ in 0..60 {
            ps.start_outer();
            src.initialize_group(0);
            ps.sweep(0, &mut src, &mut coarse).unwrap();
        }
        for &phi in ps.sn().flux().iter() {
            assert!((phi - 2.0).abs() < 1e-6, "Sn phi = {phi}");
        }
        for &phi in ps.moc().flux().iter() {
            assert!((phi - 2.0).abs() < 1e-6, "MoC phi = {phi}");
        }
        // No net axial flow in a uniform solution
        for s in 0..cmesh.n_surf() {
            assert!(coarse.current[[s, 0]].abs() < 1e-8);
        }
    }

    #[test]
    fn test_transverse_leakage_uses_axial_currents() {
        let config = homogeneous_case(2, 2, BoundaryKind::Reflect);
        let mesh = CoreMesh::from_config(&config).unwrap();
        let cmesh = mesh.coarse();
        let mut coarse = CoarseData::new(cmesh.n_cell(), cmesh.n_surf(), 1);
        let top = cmesh.coarse_surf(0, Surface::Top);
        coarse.current[[top, 0]] = 0.3;
        let tl = transverse_leakage(&mesh, &coarse, 0);
        for r in mesh.cell_regions(0) {
            assert!((tl[r] + 0.3).abs() < 1e-15);
        }
        // The cell above gains what the lower one loses
        let above = cmesh.coarse_neighbor(0, Surface::Top).unwrap();
        for r in mesh.cell_regions(above) {
            assert!((tl[r] - 0.3).abs() < 1e-15);
        }
        let avg = pin_average(&mesh, &tl);
        assert_eq!(avg[1], 0.0);
    }

    #[test]
    fn test_inactive_outers_skip_moc() {
        let mut config = homogeneous_case(2, 1, BoundaryKind::Reflect);
        config.sweeper.inactive_moc = 1;
        config.sweeper.sn_project = false;
        let mesh = CoreMesh::from_config(&config).unwrap();
        let mut ps = sweeper(&mesh, &config);
        ps.initialize();
        let cmesh = mesh.coarse();
        let mut coarse = CoarseData::new(cmesh.n_cell(), cmesh.n_surf(), 1);
        let mut src = source(&mesh, 1.0);

        ps.start_outer();
        assert!(!ps.moc_active());
        src.initialize_group(0);
        ps.sweep(0, &mut src, &mut coarse).unwrap();
        assert!(ps.moc().flux().iter().all(|&phi| phi == 1.0));

        ps.start_outer();
        assert!(ps.moc_active());
        src.initialize_group(0);
        ps.sweep(0, &mut src, &mut coarse).unwrap();
        assert!(ps.moc().flux().iter().any(|&phi| phi != 1.0));
    }

    #[test]
    fn test_sn_uses_moc_quadrature() {
        let config = homogeneous_case(2, 1, BoundaryKind::Reflect);
        let mesh = CoreMesh::from_config(&config).unwrap();
        let ps = sweeper(&mesh, &config);
        assert_eq!(ps.sn().quadrature(), ps.moc().quadrature());
        assert_eq!(ps.sn().equation(), SnEquation::Cdd);
        assert_eq!(ps.corrections().n_angle(), ps.quadrature().ndir());
    }
}
