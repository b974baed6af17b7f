//! Deterministic neutron transport: cross sections, ray tracing, MoC, Sn
//! and 2D/3D sweepers, CMFD acceleration, the eigenvalue and fixed-source
//! solvers, result output.

pub mod boundary;
pub mod cmfd;
pub mod coarse_data;
pub mod correction;
pub mod driver;
pub mod eigen;
pub mod fixed_source;
pub mod material;
pub mod moc;
pub mod output;
pub mod plane_sweeper;
pub mod quadrature;
pub mod ray;
pub mod ray_data;
pub mod sn;
pub mod source;
pub mod sweeper;
pub mod xs_homogenized;
pub mod xs_mesh;

#[cfg(test)]
pub(crate) mod test_support;
