// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Floating-Point Comparison
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Tolerant float comparison for geometric positions.

/// Absolute tolerance for positions of order 1 cm, scaled up for larger
/// magnitudes.
pub const FP_TOL: f64 = 1.0e-11;

/// Equivalence of two coordinates within [`FP_TOL`] relative to their
/// magnitude (absolute below 1).
#[inline]
pub fn fp_equiv(a: f64, b: f64) -> bool {
    let scale = 1.0_f64.max(a.abs()).max(b.abs());
    (a - b).abs() <= FP_TOL * scale
}

/// Equivalence within `max_ulps` units in the last place. Values of opposite
/// sign only compare equal when both are zero.
pub fn fp_equiv_ulp(a: f64, b: f64, max_ulps: u64) -> bool {
    if a == b {
        return true;
    }
    if a.is_sign_negative() != b.is_sign_negative() {
        return false;
    }
    let ia = a.abs().to_bits();
    let ib = b.abs().to_bits();
    ia.abs_diff(ib) < max_ulps
}
