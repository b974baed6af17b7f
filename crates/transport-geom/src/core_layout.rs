// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Core Layout
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Radial arrangement of assemblies and the outer boundary conditions.

use transport_types::error::{TransportError, TransportResult};

use crate::assembly::Assembly;
use crate::primitives::BoundaryConditions;

#[derive(Debug, Clone, PartialEq)]
pub struct Core {
    nx: usize,
    ny: usize,
    /// Assembly indices, row-major from the bottom.
    assemblies: Vec<usize>,
    bc: BoundaryConditions,
}

impl Core {
    /// `assemblies_bottom_up` is row-major with the bottom row first.
    pub fn new(
        nx: usize,
        ny: usize,
        assemblies_bottom_up: Vec<usize>,
        bc: BoundaryConditions,
        all: &[Assembly],
    ) -> TransportResult<Self> {
        if nx == 0 || ny == 0 || assemblies_bottom_up.len() != nx * ny {
            return Err(TransportError::config(format!(
                "Core: {} assemblies given for a {nx}x{ny} core",
                assemblies_bottom_up.len()
            )));
        }
        if let Some(&bad) = assemblies_bottom_up.iter().find(|&&ia| ia >= all.len()) {
            return Err(TransportError::config(format!(
                "Core refers to unknown assembly index {bad}"
            )));
        }

        let at = |ix: usize, iy: usize| &all[assemblies_bottom_up[iy * nx + ix]];
        let first = at(0, 0);
        for iy in 0..ny {
            for ix in 0..nx {
                let asy = at(ix, iy);
                if !asy.compatible(first) {
                    return Err(TransportError::geometry(format!(
                        "Core: assembly {} at ({ix}, {iy}) is not axially compatible with assembly {}",
                        asy.id(),
                        first.id()
                    )));
                }
                if asy.hx() != at(ix, 0).hx() || asy.hy() != at(0, iy).hy() {
                    return Err(TransportError::geometry(format!(
                        "Core: assembly {} at ({ix}, {iy}) does not line up with its row or column",
                        asy.id()
                    )));
                }
            }
        }

        Ok(Core {
            nx,
            ny,
            assemblies: assemblies_bottom_up,
            bc,
        })
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Assembly index at column `ix`, row `iy`.
    pub fn at(&self, ix: usize, iy: usize) -> usize {
        self.assemblies[iy * self.nx + ix]
    }

    pub fn assemblies(&self) -> &[usize] {
        &self.assemblies
    }

    pub fn boundary(&self) -> &BoundaryConditions {
        &self.bc
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════
