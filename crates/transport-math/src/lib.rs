//! Numerical kernels for the transport solver.

pub mod exponential;
pub mod fp;
pub mod gmres;
pub mod scattering;
pub mod sparse;
