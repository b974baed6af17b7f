// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Planes and Macroplanes
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! One axial slice of the core: a grid of lattices.
//!
//! Fine regions of a plane are numbered lattice by lattice (lattices
//! row-major from the bottom), and pin by pin within each lattice. The
//! plane also keeps a lexicographic pin table so a point resolves to its
//! pin with two binary searches.

use transport_types::error::{TransportError, TransportResult};

use crate::lattice::{cumulative, Lattice};
use crate::pin::Pin;
use crate::pin_mesh::PinMesh;
use crate::primitives::{Point2, Position};

/// A pin as seen from a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanePin {
    /// Index into the core pin list.
    pub pin: usize,
    /// Index into the core pin-mesh list.
    pub mesh: usize,
    /// Plane-local index of the pin's first fine region.
    pub first_reg: usize,
}

/// Result of locating a point in a plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinLocation {
    /// Position of the pin (z is left at 0).
    pub position: Position,
    pub pin: PlanePin,
    /// Plane coordinates of the pin centre.
    pub center: Point2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    /// Lattices across the plane.
    nx: usize,
    ny: usize,
    lattices: Vec<usize>,
    first_reg_lattice: Vec<usize>,
    /// Pin edges across the whole plane.
    x_vec: Vec<f64>,
    y_vec: Vec<f64>,
    /// Pins in lexicographic order (x fastest, from the bottom-left).
    pins: Vec<PlanePin>,
    /// Lexicographic index of each pin in fine-region order.
    region_order: Vec<usize>,
    areas: Vec<f64>,
    n_reg: usize,
    n_xsreg: usize,
}

impl Plane {
    /// Build from `nx × ny` lattice indices, row-major from the bottom.
    pub fn new(
        nx: usize,
        ny: usize,
        lattice_ids: Vec<usize>,
        lattices: &[Lattice],
        pins: &[Pin],
        meshes: &[PinMesh],
    ) -> TransportResult<Self> {
        if lattice_ids.len() != nx * ny {
            return Err(TransportError::geometry(format!(
                "Plane needs {} lattices, got {}",
                nx * ny,
                lattice_ids.len()
            )));
        }
        let lat = |ix: usize, iy: usize| &lattices[lattice_ids[iy * nx + ix]];

        let mut hx_vec = Vec::new();
        for ix in 0..nx {
            hx_vec.extend_from_slice(lat(ix, 0).hx_vec());
        }
        let mut hy_vec = Vec::new();
        for iy in 0..ny {
            hy_vec.extend_from_slice(lat(0, iy).hy_vec());
        }
        let npx = hx_vec.len();
        let npy = hy_vec.len();

        // Pin column/row offset of each lattice
        let mut col0 = vec![0usize; nx + 1];
        for ix in 0..nx {
            col0[ix + 1] = col0[ix] + lat(ix, 0).nx();
        }
        let mut row0 = vec![0usize; ny + 1];
        for iy in 0..ny {
            row0[iy + 1] = row0[iy] + lat(0, iy).ny();
        }

        let placeholder = PlanePin {
            pin: usize::MAX,
            mesh: usize::MAX,
            first_reg: 0,
        };
        let mut table = vec![placeholder; npx * npy];
        let mut region_order = Vec::with_capacity(npx * npy);
        let mut areas = Vec::new();
        let mut first_reg_lattice = Vec::with_capacity(nx * ny);
        let mut n_reg = 0;
        let mut n_xsreg = 0;
        for iy in 0..ny {
            for ix in 0..nx {
                let l = lat(ix, iy);
                if l.nx() != col0[ix + 1] - col0[ix] || l.ny() != row0[iy + 1] - row0[iy] {
                    return Err(TransportError::geometry(format!(
                        "Lattice {} at ({ix}, {iy}) does not line up with its plane row or column",
                        l.id()
                    )));
                }
                first_reg_lattice.push(n_reg);
                for py in 0..l.ny() {
                    for px in 0..l.nx() {
                        let ipin = l.at(px, py);
                        let mesh = &meshes[pins[ipin].mesh()];
                        let lex = (row0[iy] + py) * npx + col0[ix] + px;
                        table[lex] = PlanePin {
                            pin: ipin,
                            mesh: pins[ipin].mesh(),
                            first_reg: n_reg + l.first_reg(px, py),
                        };
                        region_order.push(lex);
                        areas.extend_from_slice(mesh.vols());
                    }
                }
                n_reg += l.n_reg();
                n_xsreg += l.n_xsreg();
            }
        }

        Ok(Plane {
            nx,
            ny,
            lattices: lattice_ids,
            first_reg_lattice,
            x_vec: cumulative(&hx_vec),
            y_vec: cumulative(&hy_vec),
            pins: table,
            region_order,
            areas,
            n_reg,
            n_xsreg,
        })
    }

    pub fn n_reg(&self) -> usize {
        self.n_reg
    }

    pub fn n_xsreg(&self) -> usize {
        self.n_xsreg
    }

    pub fn n_pin(&self) -> usize {
        self.pins.len()
    }

    pub fn npin_x(&self) -> usize {
        self.x_vec.len() - 1
    }

    pub fn npin_y(&self) -> usize {
        self.y_vec.len() - 1
    }

    pub fn hx(&self) -> f64 {
        self.x_vec[self.x_vec.len() - 1]
    }

    pub fn hy(&self) -> f64 {
        self.y_vec[self.y_vec.len() - 1]
    }

    pub fn x_vec(&self) -> &[f64] {
        &self.x_vec
    }

    pub fn y_vec(&self) -> &[f64] {
        &self.y_vec
    }

    /// Area of each fine region of the plane.
    pub fn areas(&self) -> &[f64] {
        &self.areas
    }

    pub fn lattice_at(&self, ix: usize, iy: usize) -> usize {
        self.lattices[iy * self.nx + ix]
    }

    pub fn first_reg_lattice(&self, ix: usize, iy: usize) -> usize {
        self.first_reg_lattice[iy * self.nx + ix]
    }

    /// Pin at lexicographic index `lex`.
    pub fn pin(&self, lex: usize) -> &PlanePin {
        &self.pins[lex]
    }

    /// Pins in lexicographic order.
    pub fn pins(&self) -> &[PlanePin] {
        &self.pins
    }

    /// Lexicographic index of the `ipin`-th pin in fine-region order.
    pub fn lex_of_region_pin(&self, ipin: usize) -> usize {
        self.region_order[ipin]
    }

    /// Pin containing `p`. Points on a pin edge resolve to the pin below or
    /// to the left; `None` outside the plane.
    pub fn locate(&self, p: Point2) -> Option<PinLocation> {
        let ix = edge_bucket(&self.x_vec, p.x)?;
        let iy = edge_bucket(&self.y_vec, p.y)?;
        let lex = iy * self.npin_x() + ix;
        Some(PinLocation {
            position: Position::new(ix, iy, 0),
            pin: self.pins[lex],
            center: Point2::new(
                0.5 * (self.x_vec[ix] + self.x_vec[ix + 1]),
                0.5 * (self.y_vec[iy] + self.y_vec[iy + 1]),
            ),
        })
    }

    /// Planes that trace identically: same pin edges and the same pin mesh
    /// at every position. Materials may differ.
    pub fn geometrically_equivalent(&self, other: &Plane) -> bool {
        self.x_vec == other.x_vec
            && self.y_vec == other.y_vec
            && self.pins.len() == other.pins.len()
            && self
                .pins
                .iter()
                .zip(&other.pins)
                .all(|(a, b)| a.mesh == b.mesh && a.first_reg == b.first_reg)
    }
}

/// Index `i` with `edges[i] < x <= edges[i + 1]`, with `x == edges[0]`
/// mapped to the first interval.
fn edge_bucket(edges: &[f64], x: f64) -> Option<usize> {
    let n = edges.len();
    if n < 2 || x < edges[0] || x > edges[n - 1] {
        return None;
    }
    let i = edges.partition_point(|&e| e < x);
    Some(i.saturating_sub(1).min(n - 2))
}

/// A contiguous span of identical planes swept once by the 2D solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacroPlane {
    /// Index of the geometrically unique plane.
    pub plane: usize,
    pub iz_min: usize,
    pub iz_max: usize,
    pub height: f64,
}

impl MacroPlane {
    pub fn n_planes(&self) -> usize {
        self.iz_max - self.iz_min + 1
    }

    pub fn contains(&self, iz: usize) -> bool {
        (self.iz_min..=self.iz_max).contains(&iz)
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════
