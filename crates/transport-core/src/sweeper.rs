// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Sweeper Dispatch
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! The transport sweeper seen by the solvers.
//!
//! Each engine is paired with the source type it consumes, so a MoC
//! sweeper can never be handed an Sn source. The coarse data used by CMFD
//! lives here and is lent to the engine on every sweep.

use ndarray::Array2;
use transport_geom::core_mesh::CoreMesh;
use transport_types::config::{CaseConfig, SnEquation, SourceConfig, SweeperKind};
use transport_types::error::{TransportError, TransportResult};

use crate::coarse_data::CoarseData;
use crate::material::MaterialLib;
use crate::moc::MocSweeper;
use crate::plane_sweeper::PlaneSweeper;
use crate::quadrature::AngularQuadrature;
use crate::sn::SnSweeper;
use crate::source::{pin_average, Source2D3D, SourceIsotropic, SourceKind};
use crate::xs_homogenized::XSMeshHomogenized;
use crate::xs_mesh::XSMesh;

pub enum Engine<'a> {
    Moc {
        sweeper: MocSweeper<'a>,
        source: SourceIsotropic,
    },
    Sn {
        sweeper: SnSweeper<'a>,
        source: SourceIsotropic,
    },
    TwoDThreeD {
        sweeper: PlaneSweeper<'a>,
        source: Source2D3D,
    },
}

pub struct Sweeper<'a> {
    mesh: &'a CoreMesh,
    engine: Engine<'a>,
    coarse: Option<CoarseData>,
}

impl<'a> Sweeper<'a> {
    pub fn from_config(mesh: &'a CoreMesh, lib: &MaterialLib, config: &CaseConfig) -> TransportResult<Self> {
        let xs = XSMesh::new(mesh, lib)?;
        let ng = xs.n_group();
        let policy = config.sweeper.negative_source;
        let kind = config.sweeper.kind;

        if kind == SweeperKind::TwoDThreeD && !config.cmfd.enabled {
            return Err(TransportError::config(
                "The 2D3D sweeper needs CMFD; set cmfd.enabled = true",
            ));
        }

        let external = match &config.source {
            Some(src) => Some(external_source(mesh, &xs, src)?),
            None => None,
        };
        let coarse_external = external.as_ref().map(|ext| pin_average_source(mesh, ext));

        let sn_xs = |xs: &XSMesh| -> TransportResult<XSMeshHomogenized> {
            if config.sweeper.xs_files.is_empty() {
                Ok(XSMeshHomogenized::new(mesh, xs))
            } else {
                XSMeshHomogenized::from_files(mesh, config)
            }
        };

        let engine = match kind {
            SweeperKind::Moc => {
                let mut source = SourceIsotropic::new(SourceKind::Moc, mesh.n_reg(), policy);
                if let Some(ext) = external {
                    source.set_external(ext)?;
                }
                Engine::Moc {
                    sweeper: MocSweeper::new(mesh, xs, config)?,
                    source,
                }
            }
            SweeperKind::Sn => {
                if config.sweeper.equation == SnEquation::Cdd {
                    log::warn!("Stand-alone Sn sweeps have no correction factors; using diamond difference");
                }
                let mut source = SourceIsotropic::new(SourceKind::Sn, mesh.n_pin(), policy);
                if let Some(ext) = coarse_external {
                    source.set_external(ext)?;
                }
                Engine::Sn {
                    sweeper: SnSweeper::new(mesh, sn_xs(&xs)?, config)?,
                    source,
                }
            }
            SweeperKind::TwoDThreeD => {
                let mut moc = SourceIsotropic::new(SourceKind::Moc, mesh.n_reg(), policy);
                let mut sn = SourceIsotropic::new(SourceKind::Sn, mesh.n_pin(), policy);
                if let (Some(fine), Some(coarse)) = (external, coarse_external) {
                    moc.set_external(fine)?;
                    sn.set_external(coarse)?;
                }
                let hom = sn_xs(&xs)?;
                Engine::TwoDThreeD {
                    sweeper: PlaneSweeper::new(mesh, xs, hom, config)?,
                    source: Source2D3D::new(moc, sn),
                }
            }
        };

        let coarse = if config.cmfd.enabled {
            let cmesh = mesh.coarse();
            Some(CoarseData::new(cmesh.n_cell(), cmesh.n_surf(), ng))
        } else {
            None
        };

        Ok(Sweeper { mesh, engine, coarse })
    }

    pub fn mesh(&self) -> &'a CoreMesh {
        self.mesh
    }

    pub fn engine(&self) -> &Engine<'a> {
        &self.engine
    }

    pub fn kind(&self) -> SweeperKind {
        match self.engine {
            Engine::Moc { .. } => SweeperKind::Moc,
            Engine::Sn { .. } => SweeperKind::Sn,
            Engine::TwoDThreeD { .. } => SweeperKind::TwoDThreeD,
        }
    }

    pub fn n_group(&self) -> usize {
        match &self.engine {
            Engine::Moc { sweeper, .. } => sweeper.n_group(),
            Engine::Sn { sweeper, .. } => sweeper.n_group(),
            Engine::TwoDThreeD { sweeper, .. } => sweeper.n_group(),
        }
    }

    /// Size of the mesh the fission source lives on.
    pub fn n_reg(&self) -> usize {
        self.volumes().len()
    }

    pub fn volumes(&self) -> &'a [f64] {
        match self.engine {
            Engine::Sn { .. } => self.mesh.coarse().volumes(),
            _ => self.mesh.volumes(),
        }
    }

    pub fn quadrature(&self) -> &AngularQuadrature {
        match &self.engine {
            Engine::Moc { sweeper, .. } => sweeper.quadrature(),
            Engine::Sn { sweeper, .. } => sweeper.quadrature(),
            Engine::TwoDThreeD { sweeper, .. } => sweeper.quadrature(),
        }
    }

    pub fn has_external_source(&self) -> bool {
        match &self.engine {
            Engine::Moc { source, .. } | Engine::Sn { source, .. } => source.has_external(),
            Engine::TwoDThreeD { source, .. } => source.moc.has_external(),
        }
    }

    pub fn coarse_data(&self) -> Option<&CoarseData> {
        self.coarse.as_ref()
    }

    pub fn initialize(&mut self) {
        match &mut self.engine {
            Engine::Moc { sweeper, .. } => sweeper.initialize(),
            Engine::Sn { sweeper, .. } => sweeper.initialize(),
            Engine::TwoDThreeD { sweeper, .. } => sweeper.initialize(),
        }
        if let Some(data) = self.coarse.as_mut() {
            *data = CoarseData::new(data.n_cell(), data.n_surf(), data.n_group());
        }
    }

    pub fn start_outer(&mut self) {
        if let Engine::TwoDThreeD { sweeper, .. } = &mut self.engine {
            sweeper.start_outer();
        }
    }

    pub fn initialize_group(&mut self, g: usize) {
        match &mut self.engine {
            Engine::Moc { source, .. } | Engine::Sn { source, .. } => source.initialize_group(g),
            Engine::TwoDThreeD { source, .. } => source.initialize_group(g),
        }
    }

    /// Add `χ_g F` with `fs` on the mesh of [`Self::volumes`], already
    /// divided by k.
    pub fn fission(&mut self, fs: &[f64], g: usize) {
        let mesh = self.mesh;
        match &mut self.engine {
            Engine::Moc { sweeper, source } => source.fission(sweeper.xs().regions(), fs, g),
            Engine::Sn { sweeper, source } => source.fission(sweeper.xs().regions(), fs, g),
            Engine::TwoDThreeD { sweeper, source } => source.fission(
                mesh,
                sweeper.moc().xs().regions(),
                sweeper.sn().xs().regions(),
                fs,
                g,
            ),
        }
    }

    pub fn in_scatter(&mut self, g: usize) {
        match &mut self.engine {
            Engine::Moc { sweeper, source } => source.in_scatter(sweeper.xs().regions(), sweeper.flux(), g),
            Engine::Sn { sweeper, source } => source.in_scatter(sweeper.xs().regions(), sweeper.flux(), g),
            Engine::TwoDThreeD { sweeper, source } => source.in_scatter(
                sweeper.moc().xs().regions(),
                sweeper.moc().flux(),
                sweeper.sn().xs().regions(),
                sweeper.sn().flux(),
                g,
            ),
        }
    }

    pub fn sweep(&mut self, g: usize) -> TransportResult<()> {
        match &mut self.engine {
            Engine::Moc { sweeper, source } => sweeper.sweep(g, source, self.coarse.as_mut(), None),
            Engine::Sn { sweeper, source } => sweeper.sweep(g, source, self.coarse.as_mut(), None),
            Engine::TwoDThreeD { sweeper, source } => {
                let coarse = self
                    .coarse
                    .as_mut()
                    .ok_or_else(|| TransportError::config("2D3D sweep without coarse data"))?;
                sweeper.sweep(g, source, coarse)
            }
        }
    }

    /// Scalar flux of the solution mesh.
    pub fn flux(&self) -> &Array2<f64> {
        match &self.engine {
            Engine::Moc { sweeper, .. } => sweeper.flux(),
            Engine::Sn { sweeper, .. } => sweeper.flux(),
            Engine::TwoDThreeD { sweeper, .. } => sweeper.flux(),
        }
    }

    /// `Σ_g νσ_f φ` on the mesh of [`Self::volumes`].
    pub fn fission_rate(&self) -> Vec<f64> {
        match &self.engine {
            Engine::Moc { sweeper, .. } => sweeper.fission_rate(),
            Engine::Sn { sweeper, .. } => sweeper.fission_rate(),
            Engine::TwoDThreeD { sweeper, .. } => sweeper.fission_rate(),
        }
    }

    pub fn pin_flux(&self) -> Array2<f64> {
        match &self.engine {
            Engine::Moc { sweeper, .. } => sweeper.pin_flux(),
            Engine::Sn { sweeper, .. } => sweeper.pin_flux(),
            Engine::TwoDThreeD { sweeper, .. } => sweeper.pin_flux(),
        }
    }

    pub fn pin_powers(&self) -> Vec<f64> {
        match &self.engine {
            Engine::Moc { sweeper, .. } => sweeper.pin_powers(),
            Engine::Sn { sweeper, .. } => sweeper.pin_powers(),
            Engine::TwoDThreeD { sweeper, .. } => sweeper.pin_powers(),
        }
    }

    /// Load the current pin flux into the coarse data, remember it as the
    /// projection reference and hand out the matching homogenised cross
    /// sections. `None` without coarse data.
    pub fn prepare_coarse(&mut self) -> Option<(&mut CoarseData, &XSMeshHomogenized)> {
        let data = self.coarse.as_mut()?;
        let xs = match &mut self.engine {
            Engine::Moc { sweeper, .. } => {
                sweeper.homogenize();
                data.flux.assign(&sweeper.pin_flux());
                sweeper.xs_hom()
            }
            Engine::Sn { sweeper, .. } => {
                data.flux.assign(sweeper.flux());
                sweeper.xs()
            }
            Engine::TwoDThreeD { sweeper, .. } => {
                sweeper.homogenize();
                data.flux.assign(sweeper.sn().flux());
                sweeper.sn().xs()
            }
        };
        data.store_old();
        Some((data, xs))
    }

    /// Carry the coarse flux left by CMFD back to the transport flux. The
    /// incoming boundary flux is scaled by the same pin-wise ratio.
    pub fn project_coarse(&mut self) {
        let Some(data) = self.coarse.as_ref() else {
            return;
        };
        let ratio = projection_ratio(data);
        match &mut self.engine {
            Engine::Moc { sweeper, .. } => {
                sweeper.set_pin_flux(&data.flux);
                sweeper.scale_boundary(&ratio);
            }
            Engine::Sn { sweeper, .. } => {
                sweeper.flux_mut().assign(&data.flux);
                sweeper.scale_boundary(&ratio);
            }
            Engine::TwoDThreeD { sweeper, .. } => sweeper.project_coarse(data, &ratio),
        }
    }
}

/// `φ_new / φ_old` of every coarse cell and group, one where the old flux
/// vanishes.
fn projection_ratio(data: &CoarseData) -> Array2<f64> {
    let mut ratio = Array2::from_elem(data.flux.raw_dim(), 1.0);
    ndarray::Zip::from(&mut ratio)
        .and(&data.flux)
        .and(&data.old_flux)
        .for_each(|r, &new, &old| {
            if old != 0.0 {
                *r = new / old;
            }
        });
    ratio
}

/// Volumetric external source per fine region, from per-material group
/// strengths.
fn external_source(mesh: &CoreMesh, xs: &XSMesh, config: &SourceConfig) -> TransportResult<Array2<f64>> {
    let ng = xs.n_group();
    let mut ext = Array2::zeros((mesh.n_reg(), ng));
    for entry in &config.materials {
        if entry.strength.len() != ng {
            return Err(TransportError::config(format!(
                "Source for material {} has {} groups, expected {ng}",
                entry.material,
                entry.strength.len()
            )));
        }
        let mut found = false;
        for (xsr, &id) in xs.regions().iter().zip(xs.material_ids()) {
            if id != entry.material {
                continue;
            }
            found = true;
            for &r in xsr.reg() {
                for (g, &s) in entry.strength.iter().enumerate() {
                    ext[[r, g]] = s;
                }
            }
        }
        if !found {
            log::warn!("Source material {} does not appear in the core", entry.material);
        }
    }
    Ok(ext)
}

fn pin_average_source(mesh: &CoreMesh, fine: &Array2<f64>) -> Array2<f64> {
    let mut coarse = Array2::zeros((mesh.n_pin(), fine.ncols()));
    for g in 0..fine.ncols() {
        let column = fine.column(g).to_vec();
        for (cell, v) in pin_average(mesh, &column).into_iter().enumerate() {
            coarse[[cell, g]] = v;
        }
    }
    coarse
}

// ═══════════════════════════════ tests ═══════════════════════════════
