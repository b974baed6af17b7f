// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Lattices
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Rectangular arrays of pins.
//!
//! Pins are stored row-major from the bottom-left. Every pin in a column
//! shares its x pitch and every pin in a row its y pitch, so the lattice
//! reduces to column widths `hx_vec` and row heights `hy_vec`.

use transport_types::error::{TransportError, TransportResult};

use crate::pin::Pin;
use crate::pin_mesh::PinMesh;

#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    id: u32,
    nx: usize,
    ny: usize,
    /// Pin indices, row-major from the bottom.
    pins: Vec<usize>,
    hx_vec: Vec<f64>,
    hy_vec: Vec<f64>,
    /// Cumulative column edges, `nx + 1` entries starting at 0.
    x_vec: Vec<f64>,
    y_vec: Vec<f64>,
    /// Lattice-local index of the first fine region of each pin.
    first_reg_pin: Vec<usize>,
    n_reg: usize,
    n_xsreg: usize,
}

impl Lattice {
    /// Build from pin indices given row-major with the bottom row first.
    pub fn new(
        id: u32,
        nx: usize,
        ny: usize,
        pins_bottom_up: Vec<usize>,
        pins: &[Pin],
        meshes: &[PinMesh],
    ) -> TransportResult<Self> {
        if nx == 0 || ny == 0 || pins_bottom_up.len() != nx * ny {
            return Err(TransportError::config(format!(
                "Lattice {id}: {} pins given for a {nx}x{ny} lattice",
                pins_bottom_up.len()
            )));
        }
        let pms: Vec<&PinMesh> = pins_bottom_up
            .iter()
            .map(|&ip| {
                pins.get(ip)
                    .map(|pin| &meshes[pin.mesh()])
                    .ok_or_else(|| {
                        TransportError::config(format!(
                            "Lattice {id} refers to unknown pin index {ip}"
                        ))
                    })
            })
            .collect::<TransportResult<_>>()?;

        let hx_vec: Vec<f64> = (0..nx).map(|ix| pms[ix].pitch_x()).collect();
        let hy_vec: Vec<f64> = (0..ny).map(|iy| pms[iy * nx].pitch_y()).collect();

        let mut first_reg_pin = Vec::with_capacity(nx * ny);
        let mut n_reg = 0;
        let mut n_xsreg = 0;
        for iy in 0..ny {
            for ix in 0..nx {
                let pm = pms[iy * nx + ix];
                if pm.pitch_x() != hx_vec[ix] || pm.pitch_y() != hy_vec[iy] {
                    return Err(TransportError::geometry(format!(
                        "Lattice {id}: pin at ({ix}, {iy}) has pitch {}x{}, column/row expect {}x{}",
                        pm.pitch_x(),
                        pm.pitch_y(),
                        hx_vec[ix],
                        hy_vec[iy]
                    )));
                }
                first_reg_pin.push(n_reg);
                n_reg += pm.n_reg();
                n_xsreg += pm.n_xsreg();
            }
        }

        Ok(Lattice {
            id,
            nx,
            ny,
            pins: pins_bottom_up,
            x_vec: cumulative(&hx_vec),
            y_vec: cumulative(&hy_vec),
            hx_vec,
            hy_vec,
            first_reg_pin,
            n_reg,
            n_xsreg,
        })
    }

    /// Build from pin indices as drawn, top row first.
    pub fn from_drawn(
        id: u32,
        nx: usize,
        ny: usize,
        drawn: &[usize],
        pins: &[Pin],
        meshes: &[PinMesh],
    ) -> TransportResult<Self> {
        if drawn.len() != nx * ny || nx == 0 {
            return Err(TransportError::config(format!(
                "Lattice {id}: {} pins given for a {nx}x{ny} lattice",
                drawn.len()
            )));
        }
        let bottom_up: Vec<usize> = drawn.chunks(nx).rev().flatten().copied().collect();
        Self::new(id, nx, ny, bottom_up, pins, meshes)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn n_pin(&self) -> usize {
        self.pins.len()
    }

    pub fn n_reg(&self) -> usize {
        self.n_reg
    }

    pub fn n_xsreg(&self) -> usize {
        self.n_xsreg
    }

    pub fn hx(&self) -> f64 {
        self.x_vec[self.nx]
    }

    pub fn hy(&self) -> f64 {
        self.y_vec[self.ny]
    }

    pub fn hx_vec(&self) -> &[f64] {
        &self.hx_vec
    }

    pub fn hy_vec(&self) -> &[f64] {
        &self.hy_vec
    }

    pub fn x_vec(&self) -> &[f64] {
        &self.x_vec
    }

    pub fn y_vec(&self) -> &[f64] {
        &self.y_vec
    }

    /// Pin index at column `ix`, row `iy`.
    pub fn at(&self, ix: usize, iy: usize) -> usize {
        self.pins[iy * self.nx + ix]
    }

    pub fn pins(&self) -> &[usize] {
        &self.pins
    }

    pub fn first_reg(&self, ix: usize, iy: usize) -> usize {
        self.first_reg_pin[iy * self.nx + ix]
    }

    /// Lattices with the same column widths and row heights can be
    /// stacked.
    pub fn compatible(&self, other: &Lattice) -> bool {
        self.hx_vec == other.hx_vec && self.hy_vec == other.hy_vec
    }
}

pub(crate) fn cumulative(widths: &[f64]) -> Vec<f64> {
    let mut edges = Vec::with_capacity(widths.len() + 1);
    let mut acc = 0.0;
    edges.push(acc);
    for w in widths {
        acc += w;
        edges.push(acc);
    }
    edges
}

// ═══════════════════════════════ tests ═══════════════════════════════
