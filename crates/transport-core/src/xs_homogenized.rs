// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Homogenized Cross Sections
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Pin-cell homogenized cross sections for the coarse (Sn and CMFD) mesh.
//!
//! One XS region per coarse cell, in coarse-cell order. Cross sections are
//! volume weighted at construction and flux-volume weighted by
//! [`XSMeshHomogenized::update`]; scattering is weighted by the source-group
//! flux and χ by the fission rate. Alternatively the data can be read from
//! JSON files, one per axial range, in which case updates are skipped.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use transport_geom::core_mesh::CoreMesh;
use transport_math::scattering::ScatteringMatrix;
use transport_types::config::CaseConfig;
use transport_types::error::{TransportError, TransportResult};

use crate::xs_mesh::{XSMesh, XSMeshRegion};

/// Cross sections of one pin cell as stored in a homogenized XS file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CellXsData {
    pub xstr: Vec<f64>,
    pub xsnf: Vec<f64>,
    pub xskf: Vec<f64>,
    pub xsch: Vec<f64>,
    /// `scat[to][from]`
    pub scat: Vec<Vec<f64>>,
}

/// Homogenized cross sections of every pin cell of one plane, x fastest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaneXsFile {
    pub ng: usize,
    pub cells: Vec<CellXsData>,
}

#[derive(Debug, Clone)]
pub struct XSMeshHomogenized {
    ng: usize,
    regions: Vec<XSMeshRegion>,
    /// Data came from files and must not be overwritten.
    fixed: bool,
}

impl XSMeshHomogenized {
    /// Volume-weighted homogenization of `xs` over each pin cell.
    pub fn new(mesh: &CoreMesh, xs: &XSMesh) -> Self {
        let ng = xs.n_group();
        let ones = Array2::from_elem((mesh.n_reg(), ng), 1.0);
        let regions = homogenize(mesh, xs, &ones);
        XSMeshHomogenized {
            ng,
            regions,
            fixed: false,
        }
    }

    /// Read per-plane data from the files listed in the sweeper config.
    pub fn from_files(mesh: &CoreMesh, config: &CaseConfig) -> TransportResult<Self> {
        let files = &config.sweeper.xs_files;
        let n_cell_plane = mesh.coarse().n_cell_plane();
        let mut regions = Vec::with_capacity(mesh.n_pin());
        let mut ng = 0;
        let mut next_plane = 0;
        for entry in files {
            if entry.top_plane < next_plane || entry.top_plane >= mesh.nz() {
                return Err(TransportError::config(format!(
                    "Homogenized XS file {} covers planes up to {}, expected {}..{}",
                    entry.file,
                    entry.top_plane,
                    next_plane,
                    mesh.nz()
                )));
            }
            let path = config.resolve(&entry.file);
            let text =
                std::fs::read_to_string(&path).map_err(|e| TransportError::file(&path, e))?;
            let data: PlaneXsFile = serde_json::from_str(&text)?;
            if data.cells.len() != n_cell_plane {
                return Err(TransportError::config(format!(
                    "{} lists {} cells, the plane has {n_cell_plane}",
                    path.display(),
                    data.cells.len()
                )));
            }
            if ng != 0 && data.ng != ng {
                return Err(TransportError::config(format!(
                    "{} has {} groups, earlier files have {ng}",
                    path.display(),
                    data.ng
                )));
            }
            ng = data.ng;
            for iz in next_plane..=entry.top_plane {
                for (i, cell) in data.cells.iter().enumerate() {
                    let icell = iz * n_cell_plane + i;
                    regions.push(cell_region(icell, cell, ng)?);
                }
            }
            log::info!(
                "Homogenized XS for planes {}..={} from {}",
                next_plane,
                entry.top_plane,
                path.display()
            );
            next_plane = entry.top_plane + 1;
        }
        if next_plane != mesh.nz() {
            return Err(TransportError::config(format!(
                "Homogenized XS files cover {next_plane} of {} planes",
                mesh.nz()
            )));
        }
        Ok(XSMeshHomogenized {
            ng,
            regions,
            fixed: true,
        })
    }

    /// Flux-volume weighted update. Does nothing for file-backed data.
    pub fn update(&mut self, mesh: &CoreMesh, xs: &XSMesh, flux: &Array2<f64>) {
        if self.fixed {
            return;
        }
        self.regions = homogenize(mesh, xs, flux);
    }

    pub fn n_group(&self) -> usize {
        self.ng
    }

    pub fn regions(&self) -> &[XSMeshRegion] {
        &self.regions
    }

    pub fn region(&self, cell: usize) -> &XSMeshRegion {
        &self.regions[cell]
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// File representation of plane `iz`.
    pub fn plane_data(&self, n_cell_plane: usize, iz: usize) -> PlaneXsFile {
        let cells = self.regions[iz * n_cell_plane..(iz + 1) * n_cell_plane]
            .iter()
            .map(|r| CellXsData {
                xstr: r.xstr().to_vec(),
                xsnf: r.xsnf().to_vec(),
                xskf: r.xskf().to_vec(),
                xsch: r.xsch().to_vec(),
                scat: r.scat().as_dense().outer_iter().map(|row| row.to_vec()).collect(),
            })
            .collect();
        PlaneXsFile { ng: self.ng, cells }
    }
}

fn cell_region(icell: usize, cell: &CellXsData, ng: usize) -> TransportResult<XSMeshRegion> {
    if cell.xstr.len() != ng
        || cell.xsnf.len() != ng
        || cell.xskf.len() != ng
        || cell.xsch.len() != ng
    {
        return Err(TransportError::config(format!(
            "Homogenized cell {icell} does not have {ng} groups"
        )));
    }
    Ok(XSMeshRegion::new(
        vec![icell],
        cell.xstr.clone(),
        cell.xsnf.clone(),
        cell.xskf.clone(),
        cell.xsch.clone(),
        ScatteringMatrix::from_rows(&cell.scat)?,
    ))
}

/// Weighted homogenization over every pin cell. `flux` is `[n_reg, ng]`.
fn homogenize(mesh: &CoreMesh, xs: &XSMesh, flux: &Array2<f64>) -> Vec<XSMeshRegion> {
    let ng = xs.n_group();
    let vol = mesh.volumes();
    let mut reg_xs = vec![0usize; mesh.n_reg()];
    for (ixs, xsr) in xs.regions().iter().enumerate() {
        for &r in xsr.reg() {
            reg_xs[r] = ixs;
        }
    }

    (0..mesh.n_pin())
        .map(|cell| {
            let mut fvol = vec![0.0; ng];
            let mut xstr = vec![0.0; ng];
            let mut xsnf = vec![0.0; ng];
            let mut xskf = vec![0.0; ng];
            let mut xsch = vec![0.0; ng];
            let mut scat = Array2::<f64>::zeros((ng, ng));
            let mut fission_total = 0.0;

            for r in mesh.cell_regions(cell) {
                let xsr = &xs.regions()[reg_xs[r]];
                let fission: f64 = (0..ng).map(|g| xsr.xsnf()[g] * flux[[r, g]]).sum::<f64>() * vol[r];
                fission_total += fission;
                for g in 0..ng {
                    let w = vol[r] * flux[[r, g]];
                    fvol[g] += w;
                    xstr[g] += w * xsr.xstr()[g];
                    xsnf[g] += w * xsr.xsnf()[g];
                    xskf[g] += w * xsr.xskf()[g];
                    xsch[g] += fission * xsr.xsch()[g];
                    for (from, s) in xsr.scat().to(g).iter() {
                        scat[[g, from]] += vol[r] * flux[[r, from]] * s;
                    }
                }
            }

            for g in 0..ng {
                if fvol[g] > 0.0 {
                    xstr[g] /= fvol[g];
                    xsnf[g] /= fvol[g];
                    xskf[g] /= fvol[g];
                }
                if fission_total > 0.0 {
                    xsch[g] /= fission_total;
                }
            }
            for to in 0..ng {
                for from in 0..ng {
                    if fvol[from] > 0.0 {
                        scat[[to, from]] /= fvol[from];
                    }
                }
            }
            let scat = ScatteringMatrix::from_dense(&scat).unwrap_or_else(|_| ScatteringMatrix::zeros(ng));
            XSMeshRegion::new(vec![cell], xstr, xsnf, xskf, xsch, scat)
        })
        .collect()
}

// ═══════════════════════════════ tests ═══════════════════════════════
