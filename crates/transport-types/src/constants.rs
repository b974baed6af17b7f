// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use std::f64::consts::PI;

/// 4π, the solid angle of the unit sphere. Isotropic sources are divided by it.
pub const FPI: f64 = 4.0 * PI;

/// 1/(4π)
pub const RFPI: f64 = 1.0 / FPI;

/// π/2, the per-direction solid-angle factor of octant-normalised Sn weights
/// (8 octants × π/2 = 4π).
pub const HPI: f64 = 0.5 * PI;

/// 2π
pub const TWOPI: f64 = 2.0 * PI;

/// Relative tolerance used when comparing geometric positions (cm).
pub const GEOM_EPS: f64 = 1.0e-12;

/// Distance a boundary point is advanced along the query direction before
/// locating its region.
pub const NUDGE: f64 = 1.0e-10;

/// Volume correction factors outside this band indicate rays that are too
/// coarse for the mesh.
pub const VOL_CORR_BAND: (f64, f64) = (0.5, 2.0);

/// Default exponential table: [-10, 0] with 10000 intervals.
pub const EXP_TABLE_MIN: f64 = -10.0;
pub const EXP_TABLE_MAX: f64 = 0.0;
pub const EXP_TABLE_N: usize = 10_000;

/// Maximum level-symmetric order.
pub const MAX_LS_ORDER: usize = 16;

/// Maximum number of azimuthal subdivisions of a cylindrical pin ring.
pub const MAX_SUB_AZI: usize = 8;
