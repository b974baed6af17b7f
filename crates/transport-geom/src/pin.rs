// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Pins
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! A pin mesh paired with one material per cross-section region.

use transport_types::error::{TransportError, TransportResult};

use crate::pin_mesh::PinMesh;

#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    id: u32,
    /// Index into the owning pin-mesh list.
    mesh: usize,
    /// Material id per cross-section region, inside out.
    materials: Vec<u32>,
}

impl Pin {
    pub fn new(id: u32, mesh: usize, meshes: &[PinMesh], materials: Vec<u32>) -> TransportResult<Self> {
        let pm = meshes.get(mesh).ok_or_else(|| {
            TransportError::config(format!("Pin {id} refers to unknown mesh index {mesh}"))
        })?;
        if materials.len() != pm.n_xsreg() {
            return Err(TransportError::config(format!(
                "Pin {id}: mesh {} has {} cross-section regions but {} materials were given",
                pm.id(),
                pm.n_xsreg(),
                materials.len()
            )));
        }
        Ok(Pin { id, mesh, materials })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn mesh(&self) -> usize {
        self.mesh
    }

    pub fn materials(&self) -> &[u32] {
        &self.materials
    }

    /// Material of pin-local fine region `reg`.
    pub fn material_of(&self, mesh: &PinMesh, reg: usize) -> u32 {
        self.materials[mesh.xs_region(reg)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_lookup() {
        let meshes = vec![PinMesh::cyl(1, 1.26, &[0.54], &[2], 4).unwrap()];
        let pin = Pin::new(7, 0, &meshes, vec![1, 2]).unwrap();
        assert_eq!(pin.material_of(&meshes[0], 0), 1);
        assert_eq!(pin.material_of(&meshes[0], 7), 1);
        assert_eq!(pin.material_of(&meshes[0], 8), 2);
        assert!(Pin::new(8, 0, &meshes, vec![1]).is_err());
        assert!(Pin::new(9, 3, &meshes, vec![1, 2]).is_err());
    }
}
