// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Isotropic Group Sources
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Group-wise isotropic source assembly.
//!
//! A group source is built in stages: [`SourceIsotropic::initialize_group`]
//! starts from the external source (or zero), then fission, in-scatter and
//! any auxiliary (transverse leakage) contributions are added. The sweeper
//! finishes it once per inner iteration with [`SourceIsotropic::self_scatter`],
//! which yields the angular source per steradian the sweep consumes.

use ndarray::{Array2, ArrayView1};
use transport_geom::core_mesh::CoreMesh;
use transport_types::config::NegativeSourcePolicy;
use transport_types::constants::RFPI;
use transport_types::error::{TransportError, TransportResult};

use crate::xs_mesh::XSMeshRegion;

/// Whether the final source is divided by σ_tr (MoC) or not (Sn).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Moc,
    Sn,
}

#[derive(Debug, Clone)]
pub struct SourceIsotropic {
    kind: SourceKind,
    source_1g: Vec<f64>,
    q: Vec<f64>,
    /// Volumetric external source, `[n_reg, ng]`.
    external: Option<Array2<f64>>,
    policy: NegativeSourcePolicy,
}

impl SourceIsotropic {
    pub fn new(kind: SourceKind, n_reg: usize, policy: NegativeSourcePolicy) -> Self {
        SourceIsotropic {
            kind,
            source_1g: vec![0.0; n_reg],
            q: vec![0.0; n_reg],
            external: None,
            policy,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn n_reg(&self) -> usize {
        self.source_1g.len()
    }

    pub fn set_external(&mut self, external: Array2<f64>) -> TransportResult<()> {
        if external.nrows() != self.n_reg() {
            return Err(TransportError::config(format!(
                "External source covers {} regions, expected {}",
                external.nrows(),
                self.n_reg()
            )));
        }
        self.external = Some(external);
        Ok(())
    }

    pub fn has_external(&self) -> bool {
        self.external.is_some()
    }

    /// Start group `g` from the external source, or from zero.
    pub fn initialize_group(&mut self, g: usize) {
        match &self.external {
            Some(ext) => {
                for (s, &e) in self.source_1g.iter_mut().zip(ext.column(g)) {
                    *s = e;
                }
            }
            None => self.source_1g.fill(0.0),
        }
    }

    /// Add `χ_g · F`, with `fs` already divided by k.
    pub fn fission(&mut self, xs: &[XSMeshRegion], fs: &[f64], g: usize) {
        for xsr in xs {
            let chi = xsr.xsch()[g];
            if chi == 0.0 {
                continue;
            }
            for &r in xsr.reg() {
                self.source_1g[r] += chi * fs[r];
            }
        }
    }

    /// Add scattering into `g` from every other group.
    pub fn in_scatter(&mut self, xs: &[XSMeshRegion], flux: &Array2<f64>, g: usize) {
        for xsr in xs {
            for (from, s) in xsr.scat().to(g).iter() {
                if from == g {
                    continue;
                }
                for &r in xsr.reg() {
                    self.source_1g[r] += s * flux[[r, from]];
                }
            }
        }
    }

    /// Add an arbitrary one-group source.
    pub fn auxiliary(&mut self, aux: &[f64]) {
        for (s, a) in self.source_1g.iter_mut().zip(aux) {
            *s += a;
        }
    }

    /// Add `aux` wherever the sum stays non-negative. Elsewhere the source
    /// is zeroed and `split` takes the removal `−s/φ` that carries the
    /// deficit instead; regions without a positive flux keep the negative
    /// sum. Returns the number of split regions.
    pub fn auxiliary_split(&mut self, aux: &[f64], flux_1g: ArrayView1<'_, f64>, split: &mut [f64]) -> usize {
        let mut n_split = 0;
        for (r, (s, a)) in self.source_1g.iter_mut().zip(aux).enumerate() {
            let total = *s + a;
            split[r] = 0.0;
            if total < 0.0 && flux_1g[r] > 0.0 {
                split[r] = -total / flux_1g[r];
                *s = 0.0;
                n_split += 1;
            } else {
                *s = total;
            }
        }
        n_split
    }

    /// Finish the source with self-scatter from `flux_1g`.
    ///
    /// MoC gets `(S + σ_s,gg φ) / (4π σ_tr)`, Sn gets `(S + σ_s,gg φ) / 4π`.
    pub fn self_scatter(
        &mut self,
        xs: &[XSMeshRegion],
        flux_1g: ArrayView1<'_, f64>,
        g: usize,
    ) -> TransportResult<&[f64]> {
        let mut negative = 0usize;
        for xsr in xs {
            let self_scat = xsr.scat().self_scat(g);
            let scale = match self.kind {
                SourceKind::Moc => RFPI / xsr.xstr()[g],
                SourceKind::Sn => RFPI,
            };
            for &r in xsr.reg() {
                let total = self.source_1g[r] + flux_1g[r] * self_scat;
                if total < 0.0 {
                    negative += 1;
                }
                self.q[r] = total * scale;
            }
        }
        if negative > 0 {
            match self.policy {
                NegativeSourcePolicy::Ignore => {}
                NegativeSourcePolicy::Warn => {
                    log::warn!("Group {g}: negative source in {negative} regions");
                }
                NegativeSourcePolicy::Error => {
                    return Err(TransportError::numeric(format!(
                        "Group {g}: negative source in {negative} regions"
                    )));
                }
            }
        }
        Ok(&self.q)
    }

    /// Group source before self-scatter.
    pub fn source_1g(&self) -> &[f64] {
        &self.source_1g
    }

    /// Source per steradian from the last [`Self::self_scatter`].
    pub fn q(&self) -> &[f64] {
        &self.q
    }
}

/// Paired MoC (fine mesh) and Sn (pin-cell mesh) sources of the 2D3D
/// method.
#[derive(Debug, Clone)]
pub struct Source2D3D {
    pub moc: SourceIsotropic,
    pub sn: SourceIsotropic,
}

impl Source2D3D {
    pub fn new(moc: SourceIsotropic, sn: SourceIsotropic) -> Self {
        Source2D3D { moc, sn }
    }

    pub fn initialize_group(&mut self, g: usize) {
        self.moc.initialize_group(g);
        self.sn.initialize_group(g);
    }

    /// Fine fission source to the MoC source and its pin-cell volume average
    /// to the Sn source.
    pub fn fission(
        &mut self,
        mesh: &CoreMesh,
        moc_xs: &[XSMeshRegion],
        sn_xs: &[XSMeshRegion],
        fs: &[f64],
        g: usize,
    ) {
        self.moc.fission(moc_xs, fs, g);
        let coarse = pin_average(mesh, fs);
        self.sn.fission(sn_xs, &coarse, g);
    }

    pub fn in_scatter(
        &mut self,
        moc_xs: &[XSMeshRegion],
        moc_flux: &Array2<f64>,
        sn_xs: &[XSMeshRegion],
        sn_flux: &Array2<f64>,
        g: usize,
    ) {
        self.moc.in_scatter(moc_xs, moc_flux, g);
        self.sn.in_scatter(sn_xs, sn_flux, g);
    }

    /// The two halves need different fluxes and cross sections; sweepers
    /// finish them separately through `moc` and `sn`.
    pub fn self_scatter(&self, g: usize) -> ! {
        panic!(
            "self_scatter(group {g}) called on the composite 2D3D source; \
             finish the MoC and Sn sources individually"
        )
    }
}

/// Volume-weighted pin-cell average of a fine-mesh field.
pub fn pin_average(mesh: &CoreMesh, field: &[f64]) -> Vec<f64> {
    let vol = mesh.volumes();
    (0..mesh.n_pin())
        .map(|cell| {
            let (mut sum, mut v) = (0.0, 0.0);
            for r in mesh.cell_regions(cell) {
                sum += vol[r] * field[r];
                v += vol[r];
            }
            if v > 0.0 {
                sum / v
            } else {
                0.0
            }
        })
        .collect()
}

// ═══════════════════════════════ tests ═══════════════════════════════
