//! Reactor core geometry: pin meshes, lattices, assemblies, planes and the
//! pin-cell coarse mesh.

pub mod assembly;
pub mod coarse;
pub mod core_layout;
pub mod core_mesh;
pub mod lattice;
pub mod pin;
pub mod pin_mesh;
pub mod plane;
pub mod primitives;
pub mod shapes;
