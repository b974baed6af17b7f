// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Coarse Mesh
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Pin-cell coarse mesh: cell and surface indexing shared by CMFD, the Sn
//! sweeper and the coarse ray trail.
//!
//! Cells are numbered x fastest, then y, then z. Surfaces are numbered plane
//! by plane. Within a plane the bottom faces come first (x fastest, then y),
//! then the x-normal faces (x fastest, then y), then the y-normal faces
//! (y fastest, then x). The top faces of a plane are the bottom faces of the
//! plane above; the top faces of the last plane close the numbering.

use transport_math::fp::fp_equiv;
use transport_types::config::BoundaryKind;
use transport_types::error::{TransportError, TransportResult};

use crate::lattice::cumulative;
use crate::primitives::{BoundaryConditions, Normal, Point2, Position, Surface};

#[derive(Debug, Clone, PartialEq)]
pub struct CoarseMesh {
    nx: usize,
    ny: usize,
    nz: usize,
    dx: Vec<f64>,
    dy: Vec<f64>,
    dz: Vec<f64>,
    x_vec: Vec<f64>,
    y_vec: Vec<f64>,
    z_vec: Vec<f64>,
    vol: Vec<f64>,
    n_surf_plane: usize,
    bc: BoundaryConditions,
}

impl CoarseMesh {
    /// Build from column widths, row heights and plane heights.
    pub fn new(dx: Vec<f64>, dy: Vec<f64>, dz: Vec<f64>, bc: BoundaryConditions) -> TransportResult<Self> {
        if dx.is_empty() || dy.is_empty() || dz.is_empty() {
            return Err(TransportError::geometry("Coarse mesh needs at least one cell"));
        }
        if dx.iter().chain(&dy).chain(&dz).any(|&h| !(h > 0.0)) {
            return Err(TransportError::geometry(
                "Coarse mesh cell widths must be positive",
            ));
        }
        let (nx, ny, nz) = (dx.len(), dy.len(), dz.len());
        let mut vol = Vec::with_capacity(nx * ny * nz);
        for hz in &dz {
            for hy in &dy {
                for hx in &dx {
                    vol.push(hx * hy * hz);
                }
            }
        }
        Ok(CoarseMesh {
            nx,
            ny,
            nz,
            x_vec: cumulative(&dx),
            y_vec: cumulative(&dy),
            z_vec: cumulative(&dz),
            dx,
            dy,
            dz,
            vol,
            n_surf_plane: nx * ny + (nx + 1) * ny + (ny + 1) * nx,
            bc,
        })
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn nz(&self) -> usize {
        self.nz
    }

    pub fn n_cell(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn n_cell_plane(&self) -> usize {
        self.nx * self.ny
    }

    /// Offset between the same plane-local surface in adjacent planes.
    pub fn n_surf_plane(&self) -> usize {
        self.n_surf_plane
    }

    pub fn n_surf(&self) -> usize {
        self.n_surf_plane * self.nz + self.nx * self.ny
    }

    pub fn dx(&self) -> &[f64] {
        &self.dx
    }

    pub fn dy(&self) -> &[f64] {
        &self.dy
    }

    pub fn dz(&self) -> &[f64] {
        &self.dz
    }

    pub fn x_vec(&self) -> &[f64] {
        &self.x_vec
    }

    pub fn y_vec(&self) -> &[f64] {
        &self.y_vec
    }

    pub fn z_vec(&self) -> &[f64] {
        &self.z_vec
    }

    pub fn hx(&self) -> f64 {
        self.x_vec[self.nx]
    }

    pub fn hy(&self) -> f64 {
        self.y_vec[self.ny]
    }

    pub fn hz(&self) -> f64 {
        self.z_vec[self.nz]
    }

    pub fn boundary(&self) -> &BoundaryConditions {
        &self.bc
    }

    pub fn boundary_condition(&self, surface: Surface) -> BoundaryKind {
        self.bc.get(surface)
    }

    pub fn plane_cell_offset(&self, iz: usize) -> usize {
        self.nx * self.ny * iz
    }

    pub fn plane_surf_offset(&self, iz: usize) -> usize {
        self.n_surf_plane * iz
    }

    /// First x-normal surface of plane `iz`; the x- and y-normal surfaces of
    /// a plane are contiguous up to the next plane's offset.
    pub fn plane_surf_xy_begin(&self, iz: usize) -> usize {
        self.n_surf_plane * iz + self.nx * self.ny
    }

    // ── Cells ────────────────────────────────────────────────────────

    pub fn coarse_cell(&self, pos: Position) -> usize {
        pos.z * self.nx * self.ny + pos.y * self.nx + pos.x
    }

    pub fn coarse_position(&self, cell: usize) -> Position {
        let n_plane = self.nx * self.ny;
        Position::new(cell % self.nx, (cell % n_plane) / self.nx, cell / n_plane)
    }

    /// Cell of plane 0 containing `p`; points on an interface resolve to
    /// the lower cell.
    pub fn coarse_cell_point(&self, p: Point2) -> Option<usize> {
        let ix = lower_cell(&self.x_vec, p.x)?;
        let iy = lower_cell(&self.y_vec, p.y)?;
        Some(self.coarse_cell(Position::new(ix, iy, 0)))
    }

    pub fn coarse_volume(&self, cell: usize) -> f64 {
        self.vol[cell]
    }

    pub fn volumes(&self) -> &[f64] {
        &self.vol
    }

    pub fn cell_thickness(&self, cell: usize, normal: Normal) -> f64 {
        let pos = self.coarse_position(cell);
        match normal {
            Normal::X => self.dx[pos.x],
            Normal::Y => self.dy[pos.y],
            Normal::Z => self.dz[pos.z],
        }
    }

    /// Neighbouring cell across a face, `None` on the domain boundary.
    pub fn coarse_neighbor(&self, cell: usize, surface: Surface) -> Option<usize> {
        let pos = self.coarse_position(cell);
        let neighbor = match surface {
            Surface::East if pos.x + 1 < self.nx => Position::new(pos.x + 1, pos.y, pos.z),
            Surface::West if pos.x > 0 => Position::new(pos.x - 1, pos.y, pos.z),
            Surface::North if pos.y + 1 < self.ny => Position::new(pos.x, pos.y + 1, pos.z),
            Surface::South if pos.y > 0 => Position::new(pos.x, pos.y - 1, pos.z),
            Surface::Top if pos.z + 1 < self.nz => Position::new(pos.x, pos.y, pos.z + 1),
            Surface::Bottom if pos.z > 0 => Position::new(pos.x, pos.y, pos.z - 1),
            _ => return None,
        };
        Some(self.coarse_cell(neighbor))
    }

    // ── Surfaces ─────────────────────────────────────────────────────

    pub fn coarse_surf(&self, cell: usize, surface: Surface) -> usize {
        let Position { x: ix, y: iy, z: iz } = self.coarse_position(cell);
        let (nx, ny) = (self.nx, self.ny);
        let offset = self.n_surf_plane * iz;
        let x_base = offset + nx * ny;
        let y_base = x_base + (nx + 1) * ny;
        match surface {
            Surface::Bottom => offset + nx * iy + ix,
            Surface::Top => offset + self.n_surf_plane + nx * iy + ix,
            Surface::West => x_base + (nx + 1) * iy + ix,
            Surface::East => x_base + (nx + 1) * iy + ix + 1,
            Surface::South => y_base + (ny + 1) * ix + iy,
            Surface::North => y_base + (ny + 1) * ix + iy + 1,
        }
    }

    pub fn surface_normal(&self, surf: usize) -> Normal {
        let local = surf % self.n_surf_plane;
        let n_plane = self.nx * self.ny;
        if surf >= self.n_surf_plane * self.nz || local < n_plane {
            Normal::Z
        } else if local < n_plane + (self.nx + 1) * self.ny {
            Normal::X
        } else {
            Normal::Y
        }
    }

    /// Cells on either side of a surface, in order of increasing position.
    /// Positive current flows from the first to the second.
    pub fn coarse_neigh_cells(&self, surf: usize) -> (Option<usize>, Option<usize>) {
        let (nx, ny, nz) = (self.nx, self.ny, self.nz);
        let iz = (surf / self.n_surf_plane).min(nz);
        let local = surf - iz * self.n_surf_plane;
        let cell = |ix: usize, iy: usize, iz: usize| self.coarse_cell(Position::new(ix, iy, iz));
        match self.surface_normal(surf) {
            Normal::X => {
                let local = local - nx * ny;
                let (iy, ix) = (local / (nx + 1), local % (nx + 1));
                (
                    (ix > 0).then(|| cell(ix - 1, iy, iz)),
                    (ix < nx).then(|| cell(ix, iy, iz)),
                )
            }
            Normal::Y => {
                let local = local - nx * ny - (nx + 1) * ny;
                let (ix, iy) = (local / (ny + 1), local % (ny + 1));
                (
                    (iy > 0).then(|| cell(ix, iy - 1, iz)),
                    (iy < ny).then(|| cell(ix, iy, iz)),
                )
            }
            Normal::Z => {
                let (iy, ix) = (local / nx, local % nx);
                (
                    (iz > 0).then(|| cell(ix, iy, iz - 1)),
                    (iz < nz).then(|| cell(ix, iy, iz)),
                )
            }
        }
    }

    /// Surface shared by two neighbouring cells and the face of `cell1` it
    /// forms.
    pub fn coarse_interface(&self, cell1: usize, cell2: usize) -> Option<(usize, Surface)> {
        Surface::ALL
            .iter()
            .find(|&&s| self.coarse_neighbor(cell1, s) == Some(cell2))
            .map(|&s| (self.coarse_surf(cell1, s), s))
    }

    pub fn coarse_area(&self, cell: usize, surface: Surface) -> f64 {
        let pos = self.coarse_position(cell);
        match surface.normal() {
            Normal::X => self.dy[pos.y] * self.dz[pos.z],
            Normal::Y => self.dx[pos.x] * self.dz[pos.z],
            Normal::Z => self.dx[pos.x] * self.dy[pos.y],
        }
    }

    /// Area of a surface by its global index.
    pub fn surface_area(&self, surf: usize) -> f64 {
        match self.coarse_neigh_cells(surf) {
            (Some(c), _) | (None, Some(c)) => {
                let surface = match self.surface_normal(surf) {
                    Normal::X => Surface::East,
                    Normal::Y => Surface::North,
                    Normal::Z => Surface::Top,
                };
                self.coarse_area(c, surface)
            }
            (None, None) => 0.0,
        }
    }

    /// Coarse surfaces of plane 0 that `p` lies on, as seen from `cell`
    /// (the cell the ray is leaving, or entering at its start).
    ///
    /// A point on a cell corner crosses two surfaces. The crossing is
    /// booked as a move into the x-neighbour followed by a move in y into
    /// the diagonal cell, so sibling rays reflected across either face see
    /// the same surfaces. On the domain boundary only the surfaces of the
    /// glancing path that stay inside the domain are reported.
    pub fn coarse_surf_point(&self, p: Point2, cell: usize) -> Vec<usize> {
        let cell = cell % self.n_cell_plane();
        let (ix, on_x) = edge_index(&self.x_vec, p.x);
        let (iy, on_y) = edge_index(&self.y_vec, p.y);
        let (nx, ny) = (self.nx, self.ny);

        match (on_x, on_y) {
            (false, false) => Vec::new(),
            (true, false) => vec![nx * ny + (nx + 1) * iy + ix],
            (false, true) => vec![nx * ny + (nx + 1) * ny + (ny + 1) * ix + iy],
            (true, true) => {
                let pos = self.coarse_position(cell);
                let corner_x = if ix == pos.x { Surface::West } else { Surface::East };
                let corner_y = if iy == pos.y { Surface::South } else { Surface::North };

                // On an outer x face: cross in y first through the neighbour
                if ix == 0 || ix == nx {
                    return match (corner_y, self.coarse_neighbor(cell, corner_y)) {
                        (Surface::South, Some(n)) => {
                            vec![self.coarse_surf(n, corner_x), self.coarse_surf(cell, corner_y)]
                        }
                        _ => vec![self.coarse_surf(cell, corner_x)],
                    };
                }
                // On an outer y face
                if iy == 0 || iy == ny {
                    let leading = if iy == 0 { Surface::South } else { Surface::North };
                    let glancing = if iy == 0 { Surface::West } else { Surface::East };
                    return match self.coarse_neighbor(cell, corner_x) {
                        Some(n) if corner_x == glancing && corner_y == leading => {
                            vec![self.coarse_surf(n, corner_y), self.coarse_surf(cell, corner_x)]
                        }
                        _ => vec![self.coarse_surf(cell, corner_y)],
                    };
                }
                let mut surfs = vec![self.coarse_surf(cell, corner_x)];
                if let Some(n) = self.coarse_neighbor(cell, corner_x) {
                    surfs.push(self.coarse_surf(n, corner_y));
                }
                surfs
            }
        }
    }
}

/// Interval index of `x` among `edges` and whether `x` lies on an edge. On
/// an edge the index is that of the edge itself.
fn edge_index(edges: &[f64], x: f64) -> (usize, bool) {
    match edges.iter().position(|&e| fp_equiv(x, e)) {
        Some(i) => (i, true),
        None => (edges.partition_point(|&e| e < x).saturating_sub(1), false),
    }
}

fn lower_cell(edges: &[f64], x: f64) -> Option<usize> {
    let n = edges.len();
    if x < edges[0] || x > edges[n - 1] {
        return None;
    }
    Some(edges.partition_point(|&e| e < x).saturating_sub(1).min(n - 2))
}

// ═══════════════════════════════ tests ═══════════════════════════════
