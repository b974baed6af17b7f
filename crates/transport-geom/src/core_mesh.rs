// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Core Mesh
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! The whole problem geometry.
//!
//! `CoreMesh` owns every pin mesh, pin, lattice, assembly and plane and
//! exposes the flat fine-region numbering used by the sweepers. Fine
//! regions are numbered plane by plane from the bottom; the pin cells of
//! all planes form the coarse mesh.
//!
//! Pins are addressed globally by their coarse cell index, so `ipin`,
//! `index_lex(pin_position(ipin))` and the coarse cell coincide.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::ops::Range;

use transport_types::config::{CaseConfig, HeightSpec};
use transport_types::error::{TransportError, TransportResult};

use crate::assembly::Assembly;
use crate::coarse::CoarseMesh;
use crate::core_layout::Core;
use crate::lattice::Lattice;
use crate::pin::Pin;
use crate::pin_mesh::PinMesh;
use crate::plane::{MacroPlane, Plane};
use crate::primitives::{BoundaryConditions, Point2, Position};
use crate::shapes::{intersect_line, Line};

/// A pin placed in the core.
#[derive(Debug, Clone, Copy)]
pub struct PinInstance<'a> {
    pub pin: &'a Pin,
    pub mesh: &'a PinMesh,
    /// Global index of the pin's first fine region.
    pub first_reg: usize,
    pub position: Position,
    /// Coarse cell (and global pin) index.
    pub cell: usize,
}

/// A point resolved to the pin containing it.
#[derive(Debug, Clone, Copy)]
pub struct PinMeshHit<'a> {
    pub mesh: &'a PinMesh,
    /// Global index of the pin's first fine region.
    pub first_reg: usize,
    /// Centre of the pin in core coordinates.
    pub center: Point2,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct CoreMesh {
    meshes: Vec<PinMesh>,
    pins: Vec<Pin>,
    lattices: Vec<Lattice>,
    assemblies: Vec<Assembly>,
    core: Core,
    /// One plane per axial level, bottom-up.
    planes: Vec<Plane>,
    /// Representative axial level of each geometrically unique plane.
    unique_planes: Vec<usize>,
    /// Unique plane of each axial level.
    plane_unique: Vec<usize>,
    first_reg_plane: Vec<usize>,
    macroplanes: Vec<MacroPlane>,
    /// Macroplane of each axial level.
    plane_macroplane: Vec<usize>,
    coarse: CoarseMesh,
    /// Internal pin boundaries spanning the core.
    lines: Vec<Line>,
    /// Fine regions of each coarse cell. Cells are not contiguous in
    /// region order since regions follow lattices.
    cell_regions: Vec<Range<usize>>,
    volumes: Vec<f64>,
    n_reg: usize,
    n_xsreg: usize,
}

impl CoreMesh {
    /// Assemble the core from already indexed components. Per-plane data of
    /// every component is bottom-up.
    pub fn new(
        meshes: Vec<PinMesh>,
        pins: Vec<Pin>,
        lattices: Vec<Lattice>,
        assemblies: Vec<Assembly>,
        core: Core,
    ) -> TransportResult<Self> {
        let first_asy = &assemblies[core.at(0, 0)];
        let nz = first_asy.nz();
        let dz = first_asy.dz().to_vec();

        let mut planes = Vec::with_capacity(nz);
        for iz in 0..nz {
            let lattice_ids: Vec<usize> = core
                .assemblies()
                .iter()
                .map(|&ia| assemblies[ia].lattice(iz))
                .collect();
            planes.push(Plane::new(
                core.nx(),
                core.ny(),
                lattice_ids,
                &lattices,
                &pins,
                &meshes,
            )?);
        }

        let mut unique_planes: Vec<usize> = Vec::new();
        let mut plane_unique = Vec::with_capacity(nz);
        for iz in 0..nz {
            match unique_planes
                .iter()
                .position(|&u| planes[u].geometrically_equivalent(&planes[iz]))
            {
                Some(u) => plane_unique.push(u),
                None => {
                    plane_unique.push(unique_planes.len());
                    unique_planes.push(iz);
                }
            }
        }

        let mut macroplanes = Vec::new();
        let mut plane_macroplane = Vec::with_capacity(nz);
        let mut iz = 0;
        for &n in first_asy.subplane() {
            let (iz_min, iz_max) = (iz, iz + n - 1);
            let plane = plane_unique[iz_min];
            if let Some(bad) = (iz_min..=iz_max).find(|&k| plane_unique[k] != plane) {
                return Err(TransportError::geometry(format!(
                    "Planes {iz_min} and {bad} are merged into one macroplane but differ geometrically"
                )));
            }
            plane_macroplane.extend(std::iter::repeat(macroplanes.len()).take(n));
            macroplanes.push(MacroPlane {
                plane,
                iz_min,
                iz_max,
                height: dz[iz_min..=iz_max].iter().sum(),
            });
            iz += n;
        }

        let x_vec = planes[0].x_vec().to_vec();
        let y_vec = planes[0].y_vec().to_vec();
        let dx: Vec<f64> = x_vec.windows(2).map(|w| w[1] - w[0]).collect();
        let dy: Vec<f64> = y_vec.windows(2).map(|w| w[1] - w[0]).collect();
        let coarse = CoarseMesh::new(dx, dy, dz.clone(), *core.boundary())?;

        let (hx, hy) = (coarse.hx(), coarse.hy());
        let mut lines = Vec::new();
        for &x in &x_vec[1..x_vec.len() - 1] {
            lines.push(Line::new(Point2::new(x, 0.0), Point2::new(x, hy)));
        }
        for &y in &y_vec[1..y_vec.len() - 1] {
            lines.push(Line::new(Point2::new(0.0, y), Point2::new(hx, y)));
        }

        let mut first_reg_plane = Vec::with_capacity(nz + 1);
        let mut n_reg = 0;
        let mut n_xsreg = 0;
        let mut volumes = Vec::new();
        for (plane, h) in planes.iter().zip(&dz) {
            first_reg_plane.push(n_reg);
            n_reg += plane.n_reg();
            n_xsreg += plane.n_xsreg();
            volumes.extend(plane.areas().iter().map(|a| a * h));
        }
        first_reg_plane.push(n_reg);

        let mut cell_regions = Vec::with_capacity(coarse.n_cell());
        for (iz, plane) in planes.iter().enumerate() {
            for pp in plane.pins() {
                let first = first_reg_plane[iz] + pp.first_reg;
                cell_regions.push(first..first + meshes[pp.mesh].n_reg());
            }
        }

        log::info!(
            "Core mesh: {}x{}x{} pin cells, {} fine regions, {} unique planes, {} macroplanes",
            coarse.nx(),
            coarse.ny(),
            nz,
            n_reg,
            unique_planes.len(),
            macroplanes.len()
        );

        Ok(CoreMesh {
            meshes,
            pins,
            lattices,
            assemblies,
            core,
            planes,
            unique_planes,
            plane_unique,
            first_reg_plane,
            macroplanes,
            plane_macroplane,
            coarse,
            lines,
            cell_regions,
            volumes,
            n_reg,
            n_xsreg,
        })
    }

    /// Build the geometry described by a case, translating user ids to
    /// indices and drawn (top-first) layouts to bottom-up storage.
    pub fn from_config(config: &CaseConfig) -> TransportResult<Self> {
        let meshes = config
            .meshes
            .iter()
            .map(PinMesh::from_config)
            .collect::<TransportResult<Vec<_>>>()?;
        let mesh_index = index_by_id(meshes.iter().map(PinMesh::id));

        let mut pins = Vec::with_capacity(config.pins.len());
        for pc in &config.pins {
            let im = lookup(&mesh_index, pc.mesh, "mesh", "pin", pc.id)?;
            pins.push(Pin::new(pc.id, im, &meshes, pc.materials.clone())?);
        }
        let pin_index = index_by_id(pins.iter().map(Pin::id));

        let mut lattices = Vec::with_capacity(config.lattices.len());
        for lc in &config.lattices {
            let drawn = lc
                .pins
                .iter()
                .map(|&id| lookup(&pin_index, id, "pin", "lattice", lc.id))
                .collect::<TransportResult<Vec<_>>>()?;
            lattices.push(Lattice::from_drawn(lc.id, lc.nx, lc.ny, &drawn, &pins, &meshes)?);
        }
        let lattice_index = index_by_id(lattices.iter().map(Lattice::id));

        let mut assemblies = Vec::with_capacity(config.assemblies.len());
        for ac in &config.assemblies {
            let mut lats = Vec::with_capacity(ac.np);
            let mut subplane = Vec::with_capacity(ac.lattices.len());
            for group in &ac.lattices {
                let ids = group.ids();
                subplane.push(ids.len());
                for id in ids {
                    lats.push(lookup(&lattice_index, id, "lattice", "assembly", ac.id)?);
                }
            }
            lats.reverse();
            subplane.reverse();
            let dz = match &ac.hz {
                HeightSpec::Uniform(h) => vec![*h; ac.np],
                HeightSpec::PerPlane(hz) => hz.iter().rev().copied().collect(),
            };
            assemblies.push(Assembly::new(ac.id, lats, dz, subplane, &lattices)?);
        }
        let assembly_index = index_by_id(assemblies.iter().map(Assembly::id));

        let cc = &config.core;
        if cc.nx == 0 || cc.assemblies.len() != cc.nx * cc.ny {
            return Err(TransportError::config(format!(
                "Core lists {} assemblies, expected {}x{}",
                cc.assemblies.len(),
                cc.nx,
                cc.ny
            )));
        }
        let mut layout = Vec::with_capacity(cc.assemblies.len());
        for row in cc.assemblies.chunks(cc.nx).rev() {
            for &id in row {
                layout.push(lookup(&assembly_index, id, "assembly", "core", 0)?);
            }
        }
        let core = Core::new(
            cc.nx,
            cc.ny,
            layout,
            BoundaryConditions::from_config(cc),
            &assemblies,
        )?;

        Self::new(meshes, pins, lattices, assemblies, core)
    }

    // ── Counts and extents ───────────────────────────────────────────

    pub fn n_reg(&self) -> usize {
        self.n_reg
    }

    pub fn n_xsreg(&self) -> usize {
        self.n_xsreg
    }

    pub fn nx(&self) -> usize {
        self.coarse.nx()
    }

    pub fn ny(&self) -> usize {
        self.coarse.ny()
    }

    pub fn nz(&self) -> usize {
        self.planes.len()
    }

    /// Number of pin cells in the whole core.
    pub fn n_pin(&self) -> usize {
        self.coarse.n_cell()
    }

    pub fn hx_core(&self) -> f64 {
        self.coarse.hx()
    }

    pub fn hy_core(&self) -> f64 {
        self.coarse.hy()
    }

    pub fn hz_core(&self) -> f64 {
        self.coarse.hz()
    }

    pub fn dz(&self) -> &[f64] {
        self.coarse.dz()
    }

    pub fn boundary(&self) -> &BoundaryConditions {
        self.core.boundary()
    }

    pub fn coarse(&self) -> &CoarseMesh {
        &self.coarse
    }

    // ── Components ───────────────────────────────────────────────────

    pub fn pin_meshes(&self) -> &[PinMesh] {
        &self.meshes
    }

    pub fn pin_list(&self) -> &[Pin] {
        &self.pins
    }

    pub fn lattices(&self) -> &[Lattice] {
        &self.lattices
    }

    pub fn assemblies(&self) -> &[Assembly] {
        &self.assemblies
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn plane(&self, iz: usize) -> &Plane {
        &self.planes[iz]
    }

    pub fn n_unique_planes(&self) -> usize {
        self.unique_planes.len()
    }

    /// Representative plane of unique plane `iu`.
    pub fn unique_plane(&self, iu: usize) -> &Plane {
        &self.planes[self.unique_planes[iu]]
    }

    /// Unique plane index of axial level `iz`.
    pub fn unique_plane_of(&self, iz: usize) -> usize {
        self.plane_unique[iz]
    }

    pub fn macroplanes(&self) -> &[MacroPlane] {
        &self.macroplanes
    }

    pub fn macroplane_of(&self, iz: usize) -> usize {
        self.plane_macroplane[iz]
    }

    pub fn first_reg_plane(&self, iz: usize) -> usize {
        self.first_reg_plane[iz]
    }

    /// Fine regions of axial level `iz`.
    pub fn plane_regions(&self, iz: usize) -> Range<usize> {
        self.first_reg_plane[iz]..self.first_reg_plane[iz + 1]
    }

    /// Volume of every fine region.
    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    // ── Pins ─────────────────────────────────────────────────────────

    /// Pins of plane `iz` in lexicographic order, x fastest.
    pub fn pins(&self, iz: usize) -> impl Iterator<Item = PinInstance<'_>> + '_ {
        let plane = &self.planes[iz];
        let offset = self.coarse.plane_cell_offset(iz);
        let first = self.first_reg_plane[iz];
        let npx = plane.npin_x();
        plane.pins().iter().enumerate().map(move |(lex, pp)| PinInstance {
            pin: &self.pins[pp.pin],
            mesh: &self.meshes[pp.mesh],
            first_reg: first + pp.first_reg,
            position: Position::new(lex % npx, lex / npx, iz),
            cell: offset + lex,
        })
    }

    /// Every pin of the core, plane by plane.
    pub fn all_pins(&self) -> impl Iterator<Item = PinInstance<'_>> + '_ {
        (0..self.nz()).flat_map(move |iz| self.pins(iz))
    }

    pub fn pin_position(&self, ipin: usize) -> Position {
        self.coarse.coarse_position(ipin)
    }

    /// Lower-left corner of pin `ipin`.
    pub fn pin_origin(&self, ipin: usize) -> Point2 {
        let pos = self.pin_position(ipin);
        Point2::new(self.coarse.x_vec()[pos.x], self.coarse.y_vec()[pos.y])
    }

    pub fn index_lex(&self, pos: Position) -> usize {
        self.coarse.coarse_cell(pos)
    }

    /// Fine regions inside pin cell `cell`.
    pub fn cell_regions(&self, cell: usize) -> Range<usize> {
        self.cell_regions[cell].clone()
    }

    /// Coarse cell of every fine region.
    pub fn region_cells(&self) -> Vec<usize> {
        let mut cells = vec![0; self.n_reg];
        for cell in 0..self.n_pin() {
            for r in self.cell_regions(cell) {
                cells[r] = cell;
            }
        }
        cells
    }

    /// Pin mesh containing `p` in plane `iz`, the global offset of its
    /// regions and the pin centre. Points on a pin edge resolve to the pin
    /// below or to the left.
    pub fn get_pinmesh(&self, p: Point2, iz: usize) -> TransportResult<PinMeshHit<'_>> {
        let plane = self.planes.get(iz).ok_or_else(|| {
            TransportError::geometry(format!("Plane {iz} is outside the core"))
        })?;
        let loc = plane.locate(p).ok_or_else(|| {
            TransportError::geometry(format!("Point {p} is outside the core"))
        })?;
        Ok(PinMeshHit {
            mesh: &self.meshes[loc.pin.mesh],
            first_reg: self.first_reg_plane[iz] + loc.pin.first_reg,
            center: loc.center,
            position: Position::new(loc.position.x, loc.position.y, iz),
        })
    }

    /// Points where the chord `p1 → p2` crosses pin boundaries, including
    /// both end points, ordered from `p1`.
    pub fn trace(&self, p1: Point2, p2: Point2) -> Vec<Point2> {
        let chord = Line::new(p1, p2);
        let mut ts: Vec<(f64, Point2)> = vec![(0.0, p1), (1.0, p2)];
        ts.extend(self.lines.iter().filter_map(|li| intersect_line(&chord, li)));
        ts.sort_by(|a, b| a.0.total_cmp(&b.0));
        ts.dedup_by(|b, a| b.1.approx_eq(&a.1));
        ts.into_iter().map(|(_, p)| p).collect()
    }

    /// Python/Cairo script drawing every pin of the bottom plane.
    pub fn draw(&self) -> String {
        let mut buf = String::new();
        let _ = writeln!(buf, "import cairo");
        let _ = writeln!(buf, "from math import pi");
        let _ = writeln!(buf, "twopi = 2.0 * pi");
        let _ = writeln!(
            buf,
            "surface = cairo.PDFSurface(\"geometry.pdf\", {}, {})",
            self.hx_core() * 100.0,
            self.hy_core() * 100.0
        );
        let _ = writeln!(buf, "ctx = cairo.Context(surface)");
        let _ = writeln!(buf, "ctx.scale(100, -100)");
        let _ = writeln!(buf, "ctx.translate(0, -{})", self.hy_core());
        let _ = writeln!(buf, "ctx.set_line_width(0.002)");
        let _ = writeln!(buf, "ctx.rectangle(0, 0, {}, {})", self.hx_core(), self.hy_core());
        let _ = writeln!(buf, "ctx.stroke()");
        for inst in self.pins(0) {
            let origin = self.pin_origin(inst.cell);
            let cx = origin.x + 0.5 * inst.mesh.pitch_x();
            let cy = origin.y + 0.5 * inst.mesh.pitch_y();
            let _ = writeln!(buf, "ctx.save()");
            let _ = writeln!(buf, "ctx.translate({cx}, {cy})");
            let _ = writeln!(
                buf,
                "ctx.rectangle({}, {}, {}, {})",
                -0.5 * inst.mesh.pitch_x(),
                -0.5 * inst.mesh.pitch_y(),
                inst.mesh.pitch_x(),
                inst.mesh.pitch_y()
            );
            let _ = writeln!(buf, "{}", inst.mesh.draw());
            let _ = writeln!(buf, "ctx.restore()");
        }
        let _ = writeln!(buf, "surface.finish()");
        buf
    }
}

fn index_by_id(ids: impl Iterator<Item = u32>) -> HashMap<u32, usize> {
    ids.enumerate().map(|(i, id)| (id, i)).collect()
}

fn lookup(
    index: &HashMap<u32, usize>,
    id: u32,
    kind: &str,
    owner: &str,
    owner_id: u32,
) -> TransportResult<usize> {
    index.get(&id).copied().ok_or_else(|| {
        TransportError::config(format!("{owner} {owner_id} refers to undefined {kind} {id}"))
    })
}

// ═══════════════════════════════ tests ═══════════════════════════════
