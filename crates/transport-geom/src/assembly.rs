// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Assemblies
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Axial stacks of lattices.
//!
//! Planes are stored bottom-up. The subplane list gives the number of
//! consecutive planes bound into each macroplane, also bottom-up.

use transport_types::error::{TransportError, TransportResult};

use crate::lattice::Lattice;

#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    id: u32,
    /// Lattice index per plane, bottom-up.
    lattices: Vec<usize>,
    dz: Vec<f64>,
    subplane: Vec<usize>,
    hx: f64,
    hy: f64,
    n_reg: usize,
    n_xsreg: usize,
}

impl Assembly {
    /// All per-plane vectors are bottom-up.
    pub fn new(
        id: u32,
        lattices_bottom_up: Vec<usize>,
        dz: Vec<f64>,
        subplane: Vec<usize>,
        all_lattices: &[Lattice],
    ) -> TransportResult<Self> {
        let nz = lattices_bottom_up.len();
        if nz == 0 {
            return Err(TransportError::config(format!("Assembly {id} has no planes")));
        }
        if dz.len() != nz {
            return Err(TransportError::config(format!(
                "Assembly {id}: {} plane heights for {nz} planes",
                dz.len()
            )));
        }
        if let Some(h) = dz.iter().find(|&&h| !(h > 0.0)) {
            return Err(TransportError::config(format!(
                "Assembly {id}: plane height {h} must be positive"
            )));
        }
        if subplane.iter().sum::<usize>() != nz || subplane.iter().any(|&n| n == 0) {
            return Err(TransportError::config(format!(
                "Assembly {id}: subplane grouping {subplane:?} does not cover {nz} planes"
            )));
        }

        let lats: Vec<&Lattice> = lattices_bottom_up
            .iter()
            .map(|&il| {
                all_lattices.get(il).ok_or_else(|| {
                    TransportError::config(format!("Assembly {id} refers to unknown lattice {il}"))
                })
            })
            .collect::<TransportResult<_>>()?;
        let first = lats[0];
        if let Some(bad) = lats.iter().find(|l| !l.compatible(first)) {
            return Err(TransportError::geometry(format!(
                "Assembly {id}: lattice {} is not compatible with lattice {}",
                bad.id(),
                first.id()
            )));
        }

        Ok(Assembly {
            id,
            hx: first.hx(),
            hy: first.hy(),
            n_reg: lats.iter().map(|l| l.n_reg()).sum(),
            n_xsreg: lats.iter().map(|l| l.n_xsreg()).sum(),
            lattices: lattices_bottom_up,
            dz,
            subplane,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn nz(&self) -> usize {
        self.lattices.len()
    }

    /// Lattice index of plane `iz`.
    pub fn lattice(&self, iz: usize) -> usize {
        self.lattices[iz]
    }

    pub fn dz(&self) -> &[f64] {
        &self.dz
    }

    pub fn hz(&self) -> f64 {
        self.dz.iter().sum()
    }

    pub fn subplane(&self) -> &[usize] {
        &self.subplane
    }

    pub fn hx(&self) -> f64 {
        self.hx
    }

    pub fn hy(&self) -> f64 {
        self.hy
    }

    pub fn n_reg(&self) -> usize {
        self.n_reg
    }

    pub fn n_xsreg(&self) -> usize {
        self.n_xsreg
    }

    /// Same plane heights and the same macroplane grouping.
    pub fn compatible(&self, other: &Assembly) -> bool {
        self.dz.len() == other.dz.len()
            && self
                .dz
                .iter()
                .zip(&other.dz)
                .all(|(a, b)| (a - b).abs() <= 1e-12 * a.abs().max(b.abs()).max(1.0))
            && self.subplane == other.subplane
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::Pin;
    use crate::pin_mesh::PinMesh;

    fn lattices() -> Vec<Lattice> {
        let meshes = vec![
            PinMesh::rect(1, 1.26, 1, 1).unwrap(),
            PinMesh::rect(2, 2.0, 1, 1).unwrap(),
        ];
        let pins = vec![
            Pin::new(1, 0, &meshes, vec![1]).unwrap(),
            Pin::new(2, 1, &meshes, vec![1]).unwrap(),
        ];
        vec![
            Lattice::new(1, 3, 5, vec![0; 15], &pins, &meshes).unwrap(),
            Lattice::new(2, 3, 5, vec![0; 15], &pins, &meshes).unwrap(),
            Lattice::new(3, 1, 1, vec![1], &pins, &meshes).unwrap(),
        ]
    }

    #[test]
    fn test_compatible_assemblies() {
        let lats = lattices();
        let a = Assembly::new(1, vec![0, 1, 0], vec![1.0, 2.0, 1.0], vec![1, 1, 1], &lats).unwrap();
        let b = Assembly::new(2, vec![1, 1, 1], vec![1.0, 2.0, 1.0], vec![1, 1, 1], &lats).unwrap();
        let c = Assembly::new(3, vec![0, 1, 0], vec![1.0, 1.0, 2.0], vec![1, 1, 1], &lats).unwrap();
        let d = Assembly::new(4, vec![0, 1, 0], vec![1.0, 2.0, 1.0], vec![2, 1], &lats).unwrap();
        assert!(a.compatible(&b));
        assert!(!a.compatible(&c));
        assert!(!a.compatible(&d));
        assert!((a.hz() - 4.0).abs() < 1e-14);
        assert_eq!(a.n_reg(), 45);
    }

    #[test]
    fn test_incompatible_lattices_rejected() {
        let lats = lattices();
        let err = Assembly::new(1, vec![0, 2], vec![1.0, 1.0], vec![1, 1], &lats).unwrap_err();
        assert!(err.to_string().contains("not compatible"), "{}", err);
    }

    #[test]
    fn test_bad_heights_rejected() {
        let lats = lattices();
        assert!(Assembly::new(1, vec![0, 1], vec![1.0], vec![1, 1], &lats).is_err());
        assert!(Assembly::new(1, vec![0, 1], vec![1.0, 0.0], vec![1, 1], &lats).is_err());
        assert!(Assembly::new(1, vec![0, 1], vec![1.0, 1.0], vec![3], &lats).is_err());
    }
}
