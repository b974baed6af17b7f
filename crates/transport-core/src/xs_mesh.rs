// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Cross-Section Mesh
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Cross sections grouped by material over the fine mesh.
//!
//! Each [`XSMeshRegion`] carries one set of cross sections and the list of
//! mesh regions using it. Sources and sweepers loop over XS regions and
//! then over their member regions, so a material lookup happens once per
//! region set rather than once per fine region.

use ndarray::Array2;
use rand::Rng;
use transport_geom::core_mesh::CoreMesh;
use transport_math::scattering::ScatteringMatrix;
use transport_types::error::{TransportError, TransportResult};

use crate::material::MaterialLib;

/// Outcome of a sampled collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Scatter,
    Fission,
    Capture,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XSMeshRegion {
    reg: Vec<usize>,
    xstr: Vec<f64>,
    xsnf: Vec<f64>,
    xskf: Vec<f64>,
    xsch: Vec<f64>,
    xsrm: Vec<f64>,
    scat: ScatteringMatrix,
    reaction_cdf: Vec<[f64; 3]>,
    scatter_cdf: Vec<Vec<f64>>,
    chi_cdf: Vec<f64>,
}

impl XSMeshRegion {
    pub fn new(
        reg: Vec<usize>,
        xstr: Vec<f64>,
        xsnf: Vec<f64>,
        xskf: Vec<f64>,
        xsch: Vec<f64>,
        scat: ScatteringMatrix,
    ) -> Self {
        let ng = xstr.len();
        let xsrm = (0..ng).map(|g| xstr[g] - scat.self_scat(g)).collect();
        let reaction_cdf = (0..ng)
            .map(|g| {
                let (s, f) = if xstr[g] > 0.0 {
                    (scat.out(g) / xstr[g], xskf[g] / xstr[g])
                } else {
                    (0.0, 0.0)
                };
                [s, s + f, 1.0]
            })
            .collect();
        let scatter_cdf = (0..ng).map(|g| scat.out_cdf(g)).collect();
        let mut acc = 0.0;
        let chi_cdf = xsch
            .iter()
            .map(|&c| {
                acc += c;
                acc
            })
            .collect();
        XSMeshRegion {
            reg,
            xstr,
            xsnf,
            xskf,
            xsch,
            xsrm,
            scat,
            reaction_cdf,
            scatter_cdf,
            chi_cdf,
        }
    }

    /// Mesh regions using these cross sections.
    pub fn reg(&self) -> &[usize] {
        &self.reg
    }

    pub fn xstr(&self) -> &[f64] {
        &self.xstr
    }

    pub fn xsnf(&self) -> &[f64] {
        &self.xsnf
    }

    /// Energy-release cross section; σ_f stands in for κσ_f.
    pub fn xskf(&self) -> &[f64] {
        &self.xskf
    }

    pub fn xsch(&self) -> &[f64] {
        &self.xsch
    }

    /// Removal cross section σ_tr − σ_s(g ← g).
    pub fn xsrm(&self) -> &[f64] {
        &self.xsrm
    }

    pub fn scat(&self) -> &ScatteringMatrix {
        &self.scat
    }

    /// Cumulative `[scatter, scatter + fission, 1]` probabilities of a
    /// collision in group `g`.
    pub fn reaction_cdf(&self, g: usize) -> [f64; 3] {
        self.reaction_cdf[g]
    }

    pub fn chi_cdf(&self) -> &[f64] {
        &self.chi_cdf
    }

    pub fn sample_reaction<R: Rng + ?Sized>(&self, g: usize, rng: &mut R) -> Reaction {
        let u: f64 = rng.gen();
        let cdf = self.reaction_cdf[g];
        if u < cdf[0] {
            Reaction::Scatter
        } else if u < cdf[1] {
            Reaction::Fission
        } else {
            Reaction::Capture
        }
    }

    /// Destination group of a neutron scattering out of group `g`.
    pub fn sample_scatter_group<R: Rng + ?Sized>(&self, g: usize, rng: &mut R) -> usize {
        sample_cdf(&self.scatter_cdf[g], rng.gen())
    }

    /// Birth group of a fission neutron.
    pub fn sample_fission_group<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        sample_cdf(&self.chi_cdf, rng.gen())
    }
}

fn sample_cdf(cdf: &[f64], u: f64) -> usize {
    cdf.iter()
        .position(|&c| u < c)
        .unwrap_or(cdf.len().saturating_sub(1))
}

/// Cross sections of the fine mesh, one region per material in use.
#[derive(Debug, Clone)]
pub struct XSMesh {
    ng: usize,
    regions: Vec<XSMeshRegion>,
    material_ids: Vec<u32>,
}

impl XSMesh {
    pub fn new(mesh: &CoreMesh, lib: &MaterialLib) -> TransportResult<Self> {
        let ng = lib.n_group();
        // Material ids in first-seen order with their fine regions
        let mut material_ids: Vec<u32> = Vec::new();
        let mut members: Vec<Vec<usize>> = Vec::new();
        for pin in mesh.all_pins() {
            for reg in 0..pin.mesh.n_reg() {
                let id = pin.pin.material_of(pin.mesh, reg);
                let slot = match material_ids.iter().position(|&m| m == id) {
                    Some(i) => i,
                    None => {
                        material_ids.push(id);
                        members.push(Vec::new());
                        material_ids.len() - 1
                    }
                };
                members[slot].push(pin.first_reg + reg);
            }
        }

        let mut regions = Vec::with_capacity(material_ids.len());
        for (&id, reg) in material_ids.iter().zip(members) {
            let mat = lib.get(id)?;
            if mat.n_group() != ng {
                return Err(TransportError::config(format!(
                    "Material {} has {} groups, library has {ng}",
                    mat.name(),
                    mat.n_group()
                )));
            }
            regions.push(XSMeshRegion::new(
                reg,
                mat.xstr().to_vec(),
                mat.xsnf().to_vec(),
                mat.xsf().to_vec(),
                mat.xsch().to_vec(),
                mat.scat().clone(),
            ));
        }
        log::debug!(
            "XS mesh: {} materials over {} fine regions",
            regions.len(),
            mesh.n_reg()
        );
        Ok(XSMesh {
            ng,
            regions,
            material_ids,
        })
    }

    /// Build directly from regions, e.g. for homogenised or synthetic
    /// problems.
    pub fn from_regions(ng: usize, regions: Vec<XSMeshRegion>) -> Self {
        XSMesh {
            ng,
            regions,
            material_ids: Vec::new(),
        }
    }

    pub fn n_group(&self) -> usize {
        self.ng
    }

    pub fn regions(&self) -> &[XSMeshRegion] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Material id of each XS region (empty for synthetic meshes).
    pub fn material_ids(&self) -> &[u32] {
        &self.material_ids
    }

    /// σ_tr per mesh region, `[n_reg, ng]`.
    pub fn expand_xstr(&self, n_reg: usize) -> Array2<f64> {
        let mut out = Array2::zeros((n_reg, self.ng));
        for xsr in &self.regions {
            for &r in xsr.reg() {
                for g in 0..self.ng {
                    out[[r, g]] = xsr.xstr()[g];
                }
            }
        }
        out
    }

    /// Fission source `Σ_g νσ_f φ` per mesh region.
    pub fn fission_rate(&self, flux: &Array2<f64>) -> Vec<f64> {
        let mut fs = vec![0.0; flux.nrows()];
        for xsr in &self.regions {
            for &r in xsr.reg() {
                fs[r] = (0..self.ng).map(|g| xsr.xsnf()[g] * flux[[r, g]]).sum();
            }
        }
        fs
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════
