// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Method of Characteristics Sweeper
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Method-of-characteristics sweeper on the fine pin mesh.
//!
//! Each macroplane is swept as a 2D problem with the height-weighted mean
//! source and cross sections of its member planes. The rays of one angle
//! are split into a fixed number of blocks processed in parallel; each
//! block accumulates into private buffers and the blocks are reduced in
//! order, so results do not depend on the thread count.
//!
//! With coarse data attached, the last inner iteration tallies net
//! currents and surface fluxes on every pin-cell face crossed by a ray.
//! With correction data attached it also measures the α/β factors that
//! let the coarse Sn sweep reproduce the MoC solution.

use ndarray::Array2;
use rayon::prelude::*;
use transport_geom::core_mesh::CoreMesh;
use transport_geom::primitives::{BoundaryConditions, Normal, Surface};
use transport_math::exponential::ExponentialTable;
use transport_types::config::{BoundaryUpdate, CaseConfig};
use transport_types::constants::{FPI, RFPI};
use transport_types::error::{TransportError, TransportResult};

use crate::boundary::BoundaryCondition;
use crate::coarse_data::CoarseData;
use crate::correction::{alpha_factor, CorrectionData};
use crate::quadrature::AngularQuadrature;
use crate::ray::Ray;
use crate::ray_data::{RayData, RayEnd};
use crate::source::SourceIsotropic;
use crate::xs_homogenized::XSMeshHomogenized;
use crate::xs_mesh::XSMesh;

/// Number of blocks the rays of one angle are split into.
const N_BLOCKS: usize = 16;

/// Optical thickness below which a segment is treated as transparent.
const TAU_MIN: f64 = 1.0e-10;

pub struct MocSweeper<'a> {
    mesh: &'a CoreMesh,
    rays: RayData,
    xs: XSMesh,
    xs_hom: XSMeshHomogenized,
    /// σ_tr of every fine region, `[n_reg, ng]`.
    xstr: Array2<f64>,
    /// Extra removal of the group being swept, from transverse leakage
    /// source splitting.
    split: Vec<f64>,
    tl_splitting: bool,
    flux: Array2<f64>,
    /// Radial area of every fine region.
    areas: Vec<f64>,
    /// Incoming ray-end flux, one per macroplane.
    bc_in: Vec<BoundaryCondition>,
    bc_out: Vec<BoundaryCondition>,
    exp: ExponentialTable,
    n_inner: usize,
    update: BoundaryUpdate,
}

impl<'a> MocSweeper<'a> {
    pub fn new(mesh: &'a CoreMesh, xs: XSMesh, config: &CaseConfig) -> TransportResult<Self> {
        let quad = AngularQuadrature::from_config(&config.ang_quad)?;
        let rays = RayData::new(mesh, &quad, &config.rays)?;
        let ng = xs.n_group();
        let n_reg = mesh.n_reg();

        let mut areas = vec![0.0; n_reg];
        for iz in 0..mesh.nz() {
            let dz = mesh.dz()[iz];
            for r in mesh.plane_regions(iz) {
                areas[r] = mesh.volumes()[r] / dz;
            }
        }

        let sizes = rays.boundary_sizes();
        let n_mp = mesh.macroplanes().len();
        let bc_in = (0..n_mp)
            .map(|_| BoundaryCondition::new(ng, sizes.clone()))
            .collect();
        let bc_out = (0..n_mp)
            .map(|_| BoundaryCondition::new(ng, sizes.clone()))
            .collect();

        let xs_hom = XSMeshHomogenized::new(mesh, &xs);
        let xstr = xs.expand_xstr(n_reg);
        log::info!(
            "MoC sweeper: {} regions, {} groups, {} macroplanes, {} inner iterations",
            n_reg,
            ng,
            n_mp,
            config.sweeper.n_inner
        );
        Ok(MocSweeper {
            mesh,
            rays,
            xs,
            xs_hom,
            xstr,
            split: vec![0.0; n_reg],
            tl_splitting: config.sweeper.tl_splitting,
            flux: Array2::from_elem((n_reg, ng), 1.0),
            areas,
            bc_in,
            bc_out,
            exp: ExponentialTable::default(),
            n_inner: config.sweeper.n_inner.max(1),
            update: config.sweeper.boundary_update,
        })
    }

    pub fn mesh(&self) -> &'a CoreMesh {
        self.mesh
    }

    pub fn rays(&self) -> &RayData {
        &self.rays
    }

    /// The modularised quadrature actually swept.
    pub fn quadrature(&self) -> &AngularQuadrature {
        self.rays.quadrature()
    }

    pub fn xs(&self) -> &XSMesh {
        &self.xs
    }

    pub fn xs_hom(&self) -> &XSMeshHomogenized {
        &self.xs_hom
    }

    pub fn xs_hom_mut(&mut self) -> &mut XSMeshHomogenized {
        &mut self.xs_hom
    }

    /// Refresh the pin-cell cross sections from the current fine flux.
    pub fn homogenize(&mut self) {
        self.xs_hom.update(self.mesh, &self.xs, &self.flux);
    }

    pub fn n_reg(&self) -> usize {
        self.flux.nrows()
    }

    pub fn n_group(&self) -> usize {
        self.flux.ncols()
    }

    pub fn flux(&self) -> &Array2<f64> {
        &self.flux
    }

    pub fn flux_mut(&mut self) -> &mut Array2<f64> {
        &mut self.flux
    }

    /// Add the axial transverse leakage `tl` to the source of group `g`.
    /// With splitting on, regions whose source would turn negative get
    /// the deficit as extra removal for this group instead.
    pub fn apply_transverse_leakage(&mut self, g: usize, source: &mut SourceIsotropic, tl: &[f64]) {
        if !self.tl_splitting {
            self.split.fill(0.0);
            source.auxiliary(tl);
            return;
        }
        let n_split = source.auxiliary_split(tl, self.flux.column(g), &mut self.split);
        if n_split > 0 {
            log::debug!("Group {g}: split {n_split} region sources");
        }
    }

    pub fn clear_split(&mut self) {
        self.split.fill(0.0);
    }

    pub fn split(&self) -> &[f64] {
        &self.split
    }

    pub fn set_n_inner(&mut self, n_inner: usize) {
        self.n_inner = n_inner.max(1);
    }

    /// Flat unit flux and isotropic 1/4π boundary flux, zero on vacuum
    /// faces.
    pub fn initialize(&mut self) {
        self.flux.fill(1.0);
        let bcs = self.mesh.boundary();
        for bc in self.bc_in.iter_mut() {
            bc.fill(RFPI);
            zero_vacuum_entries(bc, &self.rays, bcs);
        }
        for bc in self.bc_out.iter_mut() {
            bc.fill(0.0);
        }
    }

    /// `n_inner` sweeps of group `g`, refreshing the self-scatter source
    /// before each. Currents and corrections come from the last one.
    pub fn sweep(
        &mut self,
        g: usize,
        source: &mut SourceIsotropic,
        mut coarse: Option<&mut CoarseData>,
        mut corr: Option<&mut CorrectionData>,
    ) -> TransportResult<()> {
        if source.n_reg() != self.n_reg() {
            return Err(TransportError::numeric(format!(
                "MoC source has {} regions, mesh has {}",
                source.n_reg(),
                self.n_reg()
            )));
        }
        if corr.is_some() {
            self.homogenize();
        }
        if let Some(data) = coarse.as_deref_mut() {
            data.zero_group(g);
        }
        for inner in 0..self.n_inner {
            let last = inner + 1 == self.n_inner;
            let q = source
                .self_scatter(self.xs.regions(), self.flux.column(g), g)?
                .to_vec();
            let tally = if last { coarse.as_deref_mut() } else { None };
            let factors = if last { corr.as_deref_mut() } else { None };
            let change = self.sweep1g(g, &q, tally, factors);
            log::trace!("MoC group {g} inner {inner}: max flux change {change:.3e}");
        }
        if let Some(data) = coarse {
            data.has_radial_data = true;
        }
        Ok(())
    }

    /// One transport sweep of group `g` with the angular source `q`.
    /// Returns the largest relative change of the scalar flux.
    fn sweep1g(
        &mut self,
        g: usize,
        q: &[f64],
        mut coarse: Option<&mut CoarseData>,
        mut corr: Option<&mut CorrectionData>,
    ) -> f64 {
        let mesh = self.mesh;
        let cmesh = mesh.coarse();
        let quad = self.rays.quadrature();
        let n_cell_plane = cmesh.n_cell_plane();
        let n_surf_plane = cmesh.n_surf_plane();
        let mut max_change: f64 = 0.0;

        for (imp, mp) in mesh.macroplanes().iter().enumerate() {
            let iu = mp.plane;
            let n_reg_plane = mesh.unique_plane(iu).n_reg();

            // Height-weighted source and cross sections of the macroplane.
            // A split region attenuates with σ_tr + split.
            let mut q_mp = vec![0.0; n_reg_plane];
            let mut xstr_mp = vec![0.0; n_reg_plane];
            let mut sigma_mp = vec![0.0; n_reg_plane];
            for iz in mp.iz_min..=mp.iz_max {
                let h = mesh.dz()[iz] / mp.height;
                let first = mesh.first_reg_plane(iz);
                for i in 0..n_reg_plane {
                    let r = first + i;
                    let sigma = self.xstr[[r, g]];
                    let total = sigma + self.split[r];
                    q_mp[i] += h * q[r] * sigma / total;
                    xstr_mp[i] += h * total;
                    sigma_mp[i] += h * sigma;
                }
            }

            let tally = coarse.is_some() || corr.is_some();
            let mut t_flux = vec![0.0; n_reg_plane];
            let mut current = vec![0.0; if tally { n_surf_plane } else { 0 }];
            let mut surface_flux = vec![0.0; if tally { n_surf_plane } else { 0 }];

            for a in 0..self.rays.n_angle() {
                let angle = quad.angle(a);
                let back = quad.reverse(a, 2);
                let sin_theta = 1.0 / angle.rsintheta;
                let ctx = AngleSweep {
                    ox: angle.ox,
                    oy: angle.oy,
                    rsin: angle.rsintheta,
                    wt: angle.weight * std::f64::consts::PI * self.rays.spacing(a) * sin_theta,
                    xstr: &xstr_mp,
                    sigma: &sigma_mp,
                    q: &q_mp,
                    exp: &self.exp,
                    bc_fw: self.bc_in[imp].angle_data(g, a),
                    bc_bw: self.bc_in[imp].angle_data(g, back),
                    n_cell: if corr.is_some() { n_cell_plane } else { 0 },
                    n_surf: if tally { n_surf_plane } else { 0 },
                    cmesh,
                };

                let rays = self.rays.rays(iu, a);
                let chunk = rays.len().div_ceil(N_BLOCKS).max(1);
                let blocks: Vec<BlockTally> = rays
                    .par_chunks(chunk)
                    .enumerate()
                    .map(|(ib, block)| ctx.sweep_block(ib * chunk, block, n_reg_plane))
                    .collect();

                let mut corr_fw = CorrTally::new(ctx.n_cell, ctx.n_surf, corr.is_some());
                let mut corr_bw = CorrTally::new(ctx.n_cell, ctx.n_surf, corr.is_some());
                for block in &blocks {
                    for (t, b) in t_flux.iter_mut().zip(&block.t_flux) {
                        *t += b;
                    }
                    for (c, b) in current.iter_mut().zip(&block.current) {
                        *c += b;
                    }
                    for (s, b) in surface_flux.iter_mut().zip(&block.surface_flux) {
                        *s += b;
                    }
                    corr_fw.add(&block.corr[0]);
                    corr_bw.add(&block.corr[1]);
                }

                // Outgoing flux at the ray ends, indexed by the exit point
                for block in &blocks {
                    for &(r, out_fw, out_bw) in &block.exits {
                        let [b0, b1] = rays[r].bc();
                        self.bc_out[imp].angle_data_mut(g, a)[b1] = out_fw;
                        self.bc_out[imp].angle_data_mut(g, back)[b0] = out_bw;
                    }
                }
                if self.update == BoundaryUpdate::Gs {
                    propagate(&mut self.bc_in[imp], &self.bc_out[imp], &self.rays, g, a);
                }

                if let Some(c) = corr.as_deref_mut() {
                    let ctx_dirs = [(a, angle.ox, angle.oy, &corr_fw), (back, -angle.ox, -angle.oy, &corr_bw)];
                    for (dir, ox, oy, tally) in ctx_dirs {
                        store_corrections(c, mesh, &self.xs_hom, mp.iz_min..=mp.iz_max, dir, g, ox, oy, tally);
                    }
                }
            }

            if self.update == BoundaryUpdate::Jacobi {
                for a in 0..self.rays.n_angle() {
                    propagate(&mut self.bc_in[imp], &self.bc_out[imp], &self.rays, g, a);
                }
            }

            // Scalar flux of the macroplane, copied to every member plane
            let first_mp = mesh.first_reg_plane(mp.iz_min);
            let mut flux_mp = vec![0.0; n_reg_plane];
            for i in 0..n_reg_plane {
                let area = self.areas[first_mp + i];
                flux_mp[i] = t_flux[i] / (xstr_mp[i] * area) + FPI * q_mp[i];
            }
            for iz in mp.iz_min..=mp.iz_max {
                let first = mesh.first_reg_plane(iz);
                for (i, &phi) in flux_mp.iter().enumerate() {
                    let old = self.flux[[first + i, g]];
                    if phi.abs() > 0.0 {
                        max_change = max_change.max(((phi - old) / phi).abs());
                    }
                    self.flux[[first + i, g]] = phi;
                }
            }

            if let Some(data) = coarse.as_deref_mut() {
                for iz in mp.iz_min..=mp.iz_max {
                    let offset = cmesh.plane_surf_offset(iz);
                    for s in cmesh.n_cell_plane()..n_surf_plane {
                        // Face length: area of the plane-0 surface over its height
                        let len = cmesh.surface_area(s) / cmesh.dz()[0];
                        if len > 0.0 {
                            data.current[[offset + s, g]] = current[s] / len;
                            data.surface_flux[[offset + s, g]] = surface_flux[s] / len;
                        }
                    }
                }
            }
        }
        max_change
    }

    /// Volume-averaged flux of every pin cell, `[n_pin, ng]`.
    pub fn pin_flux(&self) -> Array2<f64> {
        pin_average_flux(self.mesh, &self.flux)
    }

    /// Scale the fine flux of every pin cell so that its volume average
    /// becomes `new` (group-wise).
    pub fn set_pin_flux(&mut self, new: &Array2<f64>) {
        set_pin_flux(self.mesh, &mut self.flux, new);
    }

    /// Scale the incoming ray-end flux by `ratio[[cell, g]]` of the pin
    /// cell each ray enters through, so a projected flux does not meet
    /// boundary values from before the projection.
    pub fn scale_boundary(&mut self, ratio: &Array2<f64>) {
        let mesh = self.mesh;
        let cmesh = mesh.coarse();
        let quad = self.rays.quadrature();
        for (imp, mp) in mesh.macroplanes().iter().enumerate() {
            let mp_ratio = |c: usize, g: usize| -> f64 {
                (mp.iz_min..=mp.iz_max)
                    .map(|iz| mesh.dz()[iz] / mp.height * ratio[[cmesh.plane_cell_offset(iz) + c, g]])
                    .sum()
            };
            for a in 0..self.rays.n_angle() {
                let back = quad.reverse(a, 2);
                for ray in self.rays.rays(mp.plane, a) {
                    let [b0, b1] = ray.bc();
                    let (Some(&first), Some(&last)) = (ray.cm_cell().first(), ray.cm_cell().last()) else {
                        continue;
                    };
                    for g in 0..ratio.ncols() {
                        self.bc_in[imp].angle_data_mut(g, a)[b0] *= mp_ratio(first, g);
                        self.bc_in[imp].angle_data_mut(g, back)[b1] *= mp_ratio(last, g);
                    }
                }
            }
        }
    }

    pub fn boundary_in(&self, imp: usize) -> &BoundaryCondition {
        &self.bc_in[imp]
    }

    /// Pin powers `Σ_g κσ_f φ V`, normalised to an average of one over
    /// the pins that produce power.
    pub fn pin_powers(&self) -> Vec<f64> {
        pin_powers(self.mesh, &self.xs, &self.flux)
    }

    /// Fission rate `Σ_g νσ_f φ` of every fine region.
    pub fn fission_rate(&self) -> Vec<f64> {
        self.xs.fission_rate(&self.flux)
    }

    /// Radial neutron balance of every pin cell for group `g`: leakage
    /// through the tallied currents plus removal minus source, per unit
    /// height. `q` is the angular source of the last sweep.
    pub fn check_balance(&self, g: usize, q: &[f64], coarse: &CoarseData) -> Vec<f64> {
        let mesh = self.mesh;
        let cmesh = mesh.coarse();
        let mut residual = Vec::with_capacity(mesh.n_pin());
        for cell in 0..mesh.n_pin() {
            let pos = cmesh.coarse_position(cell);
            let mut balance = 0.0;
            for surface in [Surface::East, Surface::West, Surface::North, Surface::South] {
                let s = cmesh.coarse_surf(cell, surface);
                let len = cmesh.surface_area(s) / cmesh.dz()[pos.z];
                let sign = if surface.is_positive() { 1.0 } else { -1.0 };
                balance += sign * coarse.current[[s, g]] * len;
            }
            for r in mesh.cell_regions(cell) {
                let sigma = self.xstr[[r, g]];
                balance += self.areas[r] * sigma * (self.flux[[r, g]] - FPI * q[r]);
            }
            residual.push(balance);
        }
        let worst = residual.iter().fold(0.0f64, |m, r| m.max(r.abs()));
        log::debug!("Group {g} pin balance: worst residual {worst:.3e}");
        residual
    }
}

// ── Ray kernel ───────────────────────────────────────────────────────

/// Everything one angle of one macroplane needs, shared by all blocks.
struct AngleSweep<'s> {
    ox: f64,
    oy: f64,
    rsin: f64,
    /// w·π·Δ·sinθ
    wt: f64,
    xstr: &'s [f64],
    /// σ_tr without split removal, weighting the correction tallies.
    sigma: &'s [f64],
    q: &'s [f64],
    exp: &'s ExponentialTable,
    bc_fw: &'s [f64],
    bc_bw: &'s [f64],
    /// Zero when corrections are not tallied.
    n_cell: usize,
    /// Zero when currents are not tallied.
    n_surf: usize,
    cmesh: &'s transport_geom::coarse::CoarseMesh,
}

/// Per-traversal tallies for the correction factors.
#[derive(Debug, Clone, Default)]
struct CorrTally {
    /// Σ ℓ, Σ ψ̄ℓ and Σ σψ̄ℓ per pin cell
    cell: Vec<[f64; 3]>,
    /// Σ ψ and crossing count per surface
    surf: Vec<[f64; 2]>,
}

impl CorrTally {
    fn new(n_cell: usize, n_surf: usize, active: bool) -> Self {
        if !active {
            return CorrTally::default();
        }
        CorrTally {
            cell: vec![[0.0; 3]; n_cell],
            surf: vec![[0.0; 2]; n_surf],
        }
    }

    fn add(&mut self, other: &CorrTally) {
        for (a, b) in self.cell.iter_mut().zip(&other.cell) {
            for k in 0..3 {
                a[k] += b[k];
            }
        }
        for (a, b) in self.surf.iter_mut().zip(&other.surf) {
            a[0] += b[0];
            a[1] += b[1];
        }
    }
}

struct BlockTally {
    t_flux: Vec<f64>,
    current: Vec<f64>,
    surface_flux: Vec<f64>,
    corr: [CorrTally; 2],
    /// `(ray, forward exit flux, backward exit flux)`
    exits: Vec<(usize, f64, f64)>,
}

impl AngleSweep<'_> {
    fn sweep_block(&self, first: usize, rays: &[Ray], n_reg: usize) -> BlockTally {
        let active = self.n_cell > 0;
        let mut tally = BlockTally {
            t_flux: vec![0.0; n_reg],
            current: vec![0.0; self.n_surf],
            surface_flux: vec![0.0; self.n_surf],
            corr: [
                CorrTally::new(self.n_cell, self.n_surf, active),
                CorrTally::new(self.n_cell, self.n_surf, active),
            ],
            exits: Vec::with_capacity(rays.len()),
        };
        for (k, ray) in rays.iter().enumerate() {
            let [b0, b1] = ray.bc();
            let out_fw = self.forward(ray, self.bc_fw[b0], &mut tally);
            let out_bw = self.backward(ray, self.bc_bw[b1], &mut tally);
            tally.exits.push((first + k, out_fw, out_bw));
        }
        tally
    }

    #[inline]
    fn segment(&self, reg: usize, len: f64, psi: &mut f64, t_flux: &mut [f64]) -> f64 {
        let sigma = self.xstr[reg];
        let tau = sigma * len * self.rsin;
        let dpsi = (*psi - self.q[reg]) * (1.0 - self.exp.exp(-tau));
        t_flux[reg] += dpsi * self.wt;
        let avg = if tau > TAU_MIN {
            self.q[reg] + dpsi / tau
        } else {
            *psi
        };
        *psi -= dpsi;
        avg
    }

    #[inline]
    fn crossing(&self, surfs: &[usize], psi: f64, ox: f64, oy: f64, tally: &mut BlockTally, dir: usize) {
        if self.n_surf == 0 {
            return;
        }
        for &s in surfs {
            let omega = match self.cmesh.surface_normal(s) {
                Normal::X => ox,
                Normal::Y => oy,
                Normal::Z => continue,
            };
            tally.current[s] += omega.signum() * psi * self.wt;
            tally.surface_flux[s] += psi * self.wt / omega.abs();
            if let Some(acc) = tally.corr[dir].surf.get_mut(s) {
                acc[0] += psi;
                acc[1] += 1.0;
            }
        }
    }

    fn forward(&self, ray: &Ray, psi_in: f64, tally: &mut BlockTally) -> f64 {
        let mut psi = psi_in;
        let (seg_reg, seg_len) = (ray.seg_reg(), ray.seg_len());
        let (npts, surfs) = (ray.cm_npts(), ray.cm_surf());
        let n_pin = ray.cm_cell().len();
        let (mut iseg, mut isurf) = (0, 0);
        for k in 0..=n_pin {
            self.crossing(&surfs[isurf..isurf + npts[k]], psi, self.ox, self.oy, tally, 0);
            isurf += npts[k];
            if k == n_pin {
                break;
            }
            let nseg = ray.cm_nseg()[k];
            let mut acc = [0.0; 3];
            for s in iseg..iseg + nseg {
                let (reg, len) = (seg_reg[s], seg_len[s]);
                let avg = self.segment(reg, len, &mut psi, &mut tally.t_flux);
                acc[0] += len;
                acc[1] += avg * len;
                acc[2] += self.sigma[reg] * avg * len;
            }
            if let Some(c) = tally.corr[0].cell.get_mut(ray.cm_cell()[k]) {
                for j in 0..3 {
                    c[j] += acc[j];
                }
            }
            iseg += nseg;
        }
        psi
    }

    fn backward(&self, ray: &Ray, psi_in: f64, tally: &mut BlockTally) -> f64 {
        let mut psi = psi_in;
        let (seg_reg, seg_len) = (ray.seg_reg(), ray.seg_len());
        let (npts, surfs) = (ray.cm_npts(), ray.cm_surf());
        let n_pin = ray.cm_cell().len();
        let (mut iseg, mut isurf) = (ray.nseg(), surfs.len());
        for k in (0..=n_pin).rev() {
            self.crossing(&surfs[isurf - npts[k]..isurf], psi, -self.ox, -self.oy, tally, 1);
            isurf -= npts[k];
            if k == 0 {
                break;
            }
            let nseg = ray.cm_nseg()[k - 1];
            let mut acc = [0.0; 3];
            for s in (iseg - nseg..iseg).rev() {
                let (reg, len) = (seg_reg[s], seg_len[s]);
                let avg = self.segment(reg, len, &mut psi, &mut tally.t_flux);
                acc[0] += len;
                acc[1] += avg * len;
                acc[2] += self.sigma[reg] * avg * len;
            }
            if let Some(c) = tally.corr[1].cell.get_mut(ray.cm_cell()[k - 1]) {
                for j in 0..3 {
                    c[j] += acc[j];
                }
            }
            iseg -= nseg;
        }
        psi
    }
}

// ── Boundary handling ────────────────────────────────────────────────

/// Pass the exit flux of both traversals of every ray of angle `a` to the
/// ray ends they continue into.
fn propagate(bc_in: &mut BoundaryCondition, bc_out: &BoundaryCondition, rays: &RayData, g: usize, a: usize) {
    let quad = rays.quadrature();
    let back = quad.reverse(a, 2);
    let target = |end: RayEnd, angle: usize| match end {
        RayEnd::Start => angle,
        RayEnd::End => quad.reverse(angle, 2),
    };
    for (r, ray) in rays.rays(0, a).iter().enumerate() {
        let [b0, b1] = ray.bc();
        if let Some(link) = rays.next_fw(a, r) {
            let v = bc_out.angle_data(g, a)[b1];
            bc_in.angle_data_mut(g, target(link.end, link.angle))[b1] = v;
        }
        if let Some(link) = rays.next_bw(a, r) {
            let v = bc_out.angle_data(g, back)[b0];
            bc_in.angle_data_mut(g, target(link.end, link.angle))[b0] = v;
        }
    }
}

/// Zero the incoming flux of every ray end entering through a vacuum face.
fn zero_vacuum_entries(bc: &mut BoundaryCondition, rays: &RayData, bcs: &BoundaryConditions) {
    let quad = rays.quadrature();
    for a in 0..rays.n_angle() {
        let back = quad.reverse(a, 2);
        let ny = rays.ny(a);
        let east = quad.angle(a).ox > 0.0;
        for ray in rays.rays(0, a) {
            let [b0, b1] = ray.bc();
            let entry_fw = if b0 < ny {
                if east { Surface::West } else { Surface::East }
            } else {
                Surface::South
            };
            let entry_bw = if b1 < ny {
                if east { Surface::East } else { Surface::West }
            } else {
                Surface::North
            };
            for g in 0..bc.n_group() {
                if !bcs.is_reflective(entry_fw) {
                    bc.angle_data_mut(g, a)[b0] = 0.0;
                }
                if !bcs.is_reflective(entry_bw) {
                    bc.angle_data_mut(g, back)[b1] = 0.0;
                }
            }
        }
    }
}

// ── Corrections ──────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn store_corrections(
    corr: &mut CorrectionData,
    mesh: &CoreMesh,
    xs_hom: &XSMeshHomogenized,
    planes: std::ops::RangeInclusive<usize>,
    angle: usize,
    g: usize,
    ox: f64,
    oy: f64,
    tally: &CorrTally,
) {
    let cmesh = mesh.coarse();
    let face_avg = |s: usize| -> Option<f64> {
        let [sum, n] = tally.surf[s];
        (n > 0.0).then(|| sum / n)
    };
    let iz0 = *planes.start();
    for (c, &[len, psi_len, sig_psi_len]) in tally.cell.iter().enumerate() {
        if len <= 0.0 || psi_len <= 0.0 {
            continue;
        }
        let psi_avg = psi_len / len;
        let sigma = xs_hom.region(cmesh.plane_cell_offset(iz0) + c).xstr()[g];
        let beta = if sigma > 0.0 {
            sig_psi_len / (sigma * psi_len)
        } else {
            1.0
        };
        let mut alpha = [0.5; 2];
        for (k, (normal, omega)) in [(Normal::X, ox), (Normal::Y, oy)].into_iter().enumerate() {
            let (lo, hi) = match normal {
                Normal::X => (Surface::West, Surface::East),
                _ => (Surface::South, Surface::North),
            };
            let (up, down) = if omega > 0.0 { (lo, hi) } else { (hi, lo) };
            let faces = (
                face_avg(cmesh.coarse_surf(c, up)),
                face_avg(cmesh.coarse_surf(c, down)),
            );
            if let (Some(psi_in), Some(psi_out)) = faces {
                alpha[k] = alpha_factor(psi_avg, psi_in, psi_out);
            }
        }
        for iz in planes.clone() {
            let cell = cmesh.plane_cell_offset(iz) + c;
            corr.set_alpha(cell, angle, g, Normal::X, alpha[0]);
            corr.set_alpha(cell, angle, g, Normal::Y, alpha[1]);
            corr.set_beta(cell, angle, g, beta);
        }
    }
}

// ── Pin-cell helpers ─────────────────────────────────────────────────

pub(crate) fn pin_average_flux(mesh: &CoreMesh, flux: &Array2<f64>) -> Array2<f64> {
    let ng = flux.ncols();
    let vol = mesh.volumes();
    let mut out = Array2::zeros((mesh.n_pin(), ng));
    for cell in 0..mesh.n_pin() {
        let v: f64 = mesh.cell_regions(cell).map(|r| vol[r]).sum();
        if v <= 0.0 {
            continue;
        }
        for g in 0..ng {
            let sum: f64 = mesh.cell_regions(cell).map(|r| vol[r] * flux[[r, g]]).sum();
            out[[cell, g]] = sum / v;
        }
    }
    out
}

pub(crate) fn set_pin_flux(mesh: &CoreMesh, flux: &mut Array2<f64>, new: &Array2<f64>) {
    let old = pin_average_flux(mesh, flux);
    for cell in 0..mesh.n_pin() {
        for g in 0..flux.ncols() {
            let o = old[[cell, g]];
            if o == 0.0 {
                continue;
            }
            let ratio = new[[cell, g]] / o;
            for r in mesh.cell_regions(cell) {
                flux[[r, g]] *= ratio;
            }
        }
    }
}

pub(crate) fn pin_powers(mesh: &CoreMesh, xs: &XSMesh, flux: &Array2<f64>) -> Vec<f64> {
    let vol = mesh.volumes();
    let mut reg_power = vec![0.0; mesh.n_reg()];
    for xsr in xs.regions() {
        for &r in xsr.reg() {
            reg_power[r] = (0..xs.n_group())
                .map(|g| xsr.xskf()[g] * flux[[r, g]] * vol[r])
                .sum();
        }
    }
    let mut power: Vec<f64> = (0..mesh.n_pin())
        .map(|cell| mesh.cell_regions(cell).map(|r| reg_power[r]).sum())
        .collect();
    let hot: Vec<f64> = power.iter().copied().filter(|&p| p > 0.0).collect();
    if !hot.is_empty() {
        let mean = hot.iter().sum::<f64>() / hot.len() as f64;
        for p in power.iter_mut() {
            *p /= mean;
        }
    }
    power
}

// ═══════════════════════════════ tests ═══════════════════════════════
