// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Angular Quadrature
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Discrete ordinates over the unit sphere.
//!
//! Angles are stored octant by octant. Octant `k` (1-based) has the sign
//! pattern of row `k` below; the angles of every octant are the images of
//! the first-octant angles, in the same order.
//!
//! | octant | 1 | 2 | 3 | 4 | 5 | 6 | 7 | 8 |
//! |--------|---|---|---|---|---|---|---|---|
//! | ox     | + | − | − | + | + | − | − | + |
//! | oy     | + | + | − | − | + | + | − | − |
//! | oz     | + | + | + | + | − | − | − | − |
//!
//! First-octant weights sum to 1, so the whole set sums to 8.

use ndarray::Array2;
use transport_geom::primitives::{Direction, Normal, Surface};
use transport_types::config::{AngQuadConfig, QuadratureKind};
use transport_types::constants::MAX_LS_ORDER;
use transport_types::error::{TransportError, TransportResult};

use std::f64::consts::PI;

// ── Level-symmetric tables ───────────────────────────────────────────

/// Smallest direction cosine of each order, S2..S16.
const LS_MU_BASE: [f64; 8] = [
    0.577350269189626,
    0.350021,
    0.266636,
    0.218218218218218,
    0.192450089729876,
    0.174077655955702,
    0.161575,
    0.149071198499989,
];

/// Unique point weights of every order, concatenated.
const LS_W_UNIQUE: [f64; 31] = [
    1.0,
    1.0 / 3.0,
    0.1761262,
    0.1572071,
    0.1209876,
    0.0907408,
    0.0925925,
    0.0893043,
    0.0725281,
    0.0450455,
    0.0539274,
    0.0707734,
    0.0558760,
    0.0373436,
    0.0502654,
    0.0258553,
    0.0580031,
    0.0488943,
    0.0228095,
    0.0393955,
    0.0380920,
    0.0258382,
    0.0082759,
    0.0489967,
    0.0413235,
    0.0203158,
    0.0265468,
    0.0378883,
    0.0135404,
    0.0326129,
    0.0103825,
];

/// Offset of each order's weights in `LS_W_UNIQUE`.
const LS_W_OFFSET: [usize; 8] = [0, 1, 2, 4, 7, 11, 16, 23];

/// 1-based weight class of each first-octant angle, in generation order.
const LS_W_MAP: [&[usize]; 8] = [
    &[1],
    &[1, 1, 1],
    &[1, 2, 2, 1, 2, 1],
    &[1, 2, 2, 2, 3, 2, 1, 2, 2, 1],
    &[1, 2, 2, 3, 4, 3, 2, 4, 4, 2, 1, 2, 3, 2, 1],
    &[1, 2, 2, 3, 4, 3, 3, 5, 5, 3, 2, 4, 5, 4, 2, 1, 2, 3, 3, 2, 1],
    &[
        1, 2, 2, 3, 5, 3, 4, 6, 6, 4, 3, 6, 7, 6, 3, 2, 5, 6, 6, 5, 2, 1, 2, 3, 4, 3, 2, 1,
    ],
    &[
        1, 2, 2, 3, 5, 3, 4, 6, 6, 4, 4, 7, 8, 7, 4, 3, 6, 8, 8, 6, 3, 2, 5, 6, 7, 6, 5, 2, 1,
        2, 3, 4, 4, 3, 2, 1,
    ],
];

/// Yamamoto–Tabuchi optimal polar angles (from +z) and weights.
const YAMAMOTO_POLAR: [(f64, f64); 3] = [
    (0.167429147795, 0.046233),
    (0.567715121084, 0.283619),
    (1.202533146789, 0.670148),
];

// Octant maps, 0-based
const REFLECT_X: [usize; 8] = [1, 0, 3, 2, 5, 4, 7, 6];
const REFLECT_Y: [usize; 8] = [3, 2, 1, 0, 7, 6, 5, 4];
const REFLECT_Z: [usize; 8] = [4, 5, 6, 7, 0, 1, 2, 3];
const ANTIPODE: [usize; 8] = [6, 7, 4, 5, 2, 3, 0, 1];

const OCTANT_SIGNS: [(f64, f64, f64); 8] = [
    (1.0, 1.0, 1.0),
    (-1.0, 1.0, 1.0),
    (-1.0, -1.0, 1.0),
    (1.0, -1.0, 1.0),
    (1.0, 1.0, -1.0),
    (-1.0, 1.0, -1.0),
    (-1.0, -1.0, -1.0),
    (1.0, -1.0, -1.0),
];

// ── Angle ────────────────────────────────────────────────────────────

/// One discrete ordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Angle {
    pub ox: f64,
    pub oy: f64,
    pub oz: f64,
    /// Azimuth from +x in `[0, 2π)`.
    pub alpha: f64,
    /// Polar angle from +z.
    pub theta: f64,
    pub weight: f64,
    /// 1 / sin θ
    pub rsintheta: f64,
}

impl Angle {
    /// Build from (not necessarily normalised) direction cosines.
    pub fn new(ox: f64, oy: f64, oz: f64, weight: f64) -> Self {
        let norm = (ox * ox + oy * oy + oz * oz).sqrt();
        let (ox, oy, oz) = (ox / norm, oy / norm, oz / norm);
        let theta = oz.clamp(-1.0, 1.0).acos();
        let mut alpha = oy.atan2(ox);
        if alpha < 0.0 {
            alpha += 2.0 * PI;
        }
        Angle {
            ox,
            oy,
            oz,
            alpha,
            theta,
            weight,
            rsintheta: 1.0 / theta.sin(),
        }
    }

    pub fn from_angles(alpha: f64, theta: f64, weight: f64) -> Self {
        Angle {
            ox: theta.sin() * alpha.cos(),
            oy: theta.sin() * alpha.sin(),
            oz: theta.cos(),
            alpha,
            theta,
            weight,
            rsintheta: 1.0 / theta.sin(),
        }
    }

    /// Image of this angle in `octant` (1-based), taking magnitudes from
    /// this angle's cosines.
    pub fn to_octant(&self, octant: usize) -> Angle {
        let (sx, sy, sz) = OCTANT_SIGNS[octant - 1];
        Angle::new(
            sx * self.ox.abs(),
            sy * self.oy.abs(),
            sz * self.oz.abs(),
            self.weight,
        )
    }

    pub fn direction(&self) -> Direction {
        Direction {
            ox: self.ox,
            oy: self.oy,
            oz: self.oz,
            alpha: self.alpha,
            theta: self.theta,
        }
    }

    pub fn component(&self, normal: Normal) -> f64 {
        match normal {
            Normal::X => self.ox,
            Normal::Y => self.oy,
            Normal::Z => self.oz,
        }
    }
}

// ── Quadrature ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct AngularQuadrature {
    kind: QuadratureKind,
    ndir_oct: usize,
    angles: Vec<Angle>,
}

impl AngularQuadrature {
    pub fn from_config(config: &AngQuadConfig) -> TransportResult<Self> {
        let quad = match config.kind {
            QuadratureKind::LevelSymmetric => Self::level_symmetric(config.order)?,
            QuadratureKind::ChebyshevGauss => {
                Self::chebyshev_gauss(config.n_azimuthal, config.n_polar)?
            }
            QuadratureKind::ChebyshevYamamoto => {
                if config.n_polar != YAMAMOTO_POLAR.len() {
                    log::warn!(
                        "Chebyshev-Yamamoto quadrature always has {} polar angles; ignoring n_polar = {}",
                        YAMAMOTO_POLAR.len(),
                        config.n_polar
                    );
                }
                Self::chebyshev_yamamoto(config.n_azimuthal)?
            }
            QuadratureKind::User => Self::user(&config.angles)?,
        };
        log::info!(
            "Angular quadrature {:?}: {} angles per octant",
            quad.kind,
            quad.ndir_oct
        );
        Ok(quad)
    }

    /// Level-symmetric S_N set of even order `2 ≤ N ≤ 16`.
    pub fn level_symmetric(order: usize) -> TransportResult<Self> {
        if order < 2 || order % 2 != 0 || order > MAX_LS_ORDER {
            return Err(TransportError::numeric(format!(
                "Level-symmetric order must be even and between 2 and {MAX_LS_ORDER}, got {order}"
            )));
        }
        let half = order / 2;
        let mu0 = LS_MU_BASE[half - 1];
        let mu: Vec<f64> = if order == 2 {
            vec![mu0]
        } else {
            let delta = 2.0 * (1.0 - 3.0 * mu0 * mu0) / (order as f64 - 2.0);
            (0..half)
                .map(|i| (mu0 * mu0 + i as f64 * delta).sqrt())
                .collect()
        };

        let map = LS_W_MAP[half - 1];
        let offset = LS_W_OFFSET[half - 1];
        let mut angles = Vec::with_capacity(map.len());
        for i in 0..half {
            for j in 0..=i {
                let w = LS_W_UNIQUE[offset + map[angles.len()] - 1];
                angles.push(Angle::new(mu[i - j], mu[j], mu[half - i - 1], w));
            }
        }
        Ok(Self::from_first_octant(QuadratureKind::LevelSymmetric, angles))
    }

    /// Product set: `n_azi` Chebyshev azimuths and `n_polar` Gauss-Legendre
    /// polar cosines per octant.
    pub fn chebyshev_gauss(n_azi: usize, n_polar: usize) -> TransportResult<Self> {
        if n_polar == 0 {
            return Err(TransportError::numeric(
                "Chebyshev-Gauss quadrature needs at least one polar angle",
            ));
        }
        // Positive half of a 2n-point rule; its weights sum to 1
        let polar: Vec<(f64, f64)> = gauss_legendre(2 * n_polar)
            .into_iter()
            .filter(|&(mu, _)| mu > 0.0)
            .map(|(mu, w)| (mu.acos(), w))
            .collect();
        Self::product(QuadratureKind::ChebyshevGauss, n_azi, &polar)
    }

    /// Product set with Chebyshev azimuths and the three Yamamoto polar
    /// angles.
    pub fn chebyshev_yamamoto(n_azi: usize) -> TransportResult<Self> {
        Self::product(QuadratureKind::ChebyshevYamamoto, n_azi, &YAMAMOTO_POLAR)
    }

    /// First-octant angles given as `[ox, oy, oz, weight]`.
    pub fn user(list: &[[f64; 4]]) -> TransportResult<Self> {
        if list.is_empty() {
            return Err(TransportError::config("User quadrature lists no angles"));
        }
        let mut angles = Vec::with_capacity(list.len());
        for &[ox, oy, oz, w] in list {
            if ox <= 0.0 || oy <= 0.0 || oz <= 0.0 || w <= 0.0 {
                return Err(TransportError::config(format!(
                    "User angle [{ox}, {oy}, {oz}, {w}] is not a positive first-octant ordinate"
                )));
            }
            angles.push(Angle::new(ox, oy, oz, w));
        }
        Ok(Self::from_first_octant(QuadratureKind::User, angles))
    }

    fn product(kind: QuadratureKind, n_azi: usize, polar: &[(f64, f64)]) -> TransportResult<Self> {
        if n_azi == 0 {
            return Err(TransportError::numeric(
                "Product quadrature needs at least one azimuthal angle",
            ));
        }
        let mut angles = Vec::with_capacity(n_azi * polar.len());
        for i in 0..n_azi {
            let alpha = (2 * i + 1) as f64 * PI / (4 * n_azi) as f64;
            for &(theta, wp) in polar {
                angles.push(Angle::from_angles(alpha, theta, wp / n_azi as f64));
            }
        }
        Ok(Self::from_first_octant(kind, angles))
    }

    fn from_first_octant(kind: QuadratureKind, first: Vec<Angle>) -> Self {
        let ndir_oct = first.len();
        let mut angles = Vec::with_capacity(8 * ndir_oct);
        for oct in 1..=8 {
            angles.extend(first.iter().map(|a| a.to_octant(oct)));
        }
        let mut quad = AngularQuadrature {
            kind,
            ndir_oct,
            angles,
        };
        quad.update_weights();
        quad
    }

    pub fn kind(&self) -> QuadratureKind {
        self.kind
    }

    pub fn ndir(&self) -> usize {
        self.angles.len()
    }

    pub fn ndir_oct(&self) -> usize {
        self.ndir_oct
    }

    pub fn angles(&self) -> &[Angle] {
        &self.angles
    }

    pub fn angle(&self, iang: usize) -> &Angle {
        &self.angles[iang]
    }

    /// Angles of octant `octant` (1-based).
    pub fn octant_angles(&self, octant: usize) -> &[Angle] {
        let lo = (octant - 1) * self.ndir_oct;
        &self.angles[lo..lo + self.ndir_oct]
    }

    /// Octant (1-based) of angle `iang`.
    pub fn octant(&self, iang: usize) -> usize {
        iang / self.ndir_oct + 1
    }

    /// Angle after specular reflection across a face with this normal.
    pub fn reflect_normal(&self, iang: usize, normal: Normal) -> usize {
        let oct = iang / self.ndir_oct;
        let table = match normal {
            Normal::X => &REFLECT_X,
            Normal::Y => &REFLECT_Y,
            Normal::Z => &REFLECT_Z,
        };
        table[oct] * self.ndir_oct + iang % self.ndir_oct
    }

    pub fn reflect(&self, iang: usize, surface: Surface) -> usize {
        self.reflect_normal(iang, surface.normal())
    }

    /// Opposite direction. In 2D only the radial components flip, so the
    /// reverse of an upper-hemisphere angle stays in the upper hemisphere.
    pub fn reverse(&self, iang: usize, dim: usize) -> usize {
        let n = self.ndir_oct;
        if dim == 2 {
            (iang + 2 * n) % (4 * n)
        } else {
            ANTIPODE[iang / n] * n + iang % n
        }
    }

    /// Replace angle `iang` and its images in every other octant by
    /// `angle`, keeping the stored weight.
    pub fn modify_angle(&mut self, iang: usize, angle: Angle) {
        let i0 = iang % self.ndir_oct;
        let weight = self.angles[i0].weight;
        let base = Angle { weight, ..angle };
        for oct in 1..=8 {
            self.angles[(oct - 1) * self.ndir_oct + i0] = base.to_octant(oct);
        }
    }

    /// Renormalise so the first octant sums to 1 and copy the first-octant
    /// weights to every octant.
    pub fn update_weights(&mut self) {
        let n = self.ndir_oct;
        let sum: f64 = self.angles[..n].iter().map(|a| a.weight).sum();
        if sum <= 0.0 {
            return;
        }
        for i in 0..n {
            let w = self.angles[i].weight / sum;
            for oct in 0..8 {
                self.angles[oct * n + i].weight = w;
            }
        }
    }

    /// `(ndir, 4)` table of `[ox, oy, oz, weight]`.
    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.ndir(), 4), |(i, j)| {
            let a = &self.angles[i];
            [a.ox, a.oy, a.oz, a.weight][j]
        })
    }
}

/// Gauss-Legendre nodes and weights on `[-1, 1]`, by Newton iteration on
/// the Legendre recurrence.
fn gauss_legendre(n: usize) -> Vec<(f64, f64)> {
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        let mut dp = 1.0;
        for _ in 0..100 {
            let (mut p0, mut p1) = (1.0, x);
            for k in 2..=n {
                let p2 = ((2 * k - 1) as f64 * x * p1 - (k - 1) as f64 * p0) / k as f64;
                p0 = p1;
                p1 = p2;
            }
            dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);
            let dx = p1 / dp;
            x -= dx;
            if dx.abs() < 1e-15 {
                break;
            }
        }
        out.push((x, 2.0 / ((1.0 - x * x) * dp * dp)));
    }
    out
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_sums(q: &AngularQuadrature) -> (f64, f64, f64) {
        let n = q.ndir_oct();
        let first: f64 = q.angles()[..n].iter().map(|a| a.weight).sum();
        let all: f64 = q.angles().iter().map(|a| a.weight).sum();
        let upper: f64 = q.angles()[..4 * n].iter().map(|a| a.weight).sum();
        (first, all, upper)
    }

    #[test]
    fn test_ls_weights_normalised_every_order() {
        for order in (2..=16).step_by(2) {
            let q = AngularQuadrature::level_symmetric(order).unwrap();
            assert_eq!(q.ndir_oct(), order * (order + 2) / 8);
            let (first, all, upper) = weight_sums(&q);
            assert!((first - 1.0).abs() < 1e-14, "S{} first octant {}", order, first);
            assert!((all - 8.0).abs() < 1e-13, "S{} all {}", order, all);
            assert!((upper * PI - 4.0 * PI).abs() < 1e-12, "S{}", order);
        }
    }

    #[test]
    fn test_ls_directions_are_unit() {
        for order in (2..=16).step_by(2) {
            let q = AngularQuadrature::level_symmetric(order).unwrap();
            for a in q.angles() {
                let n = a.ox * a.ox + a.oy * a.oy + a.oz * a.oz;
                assert!((n - 1.0).abs() < 1e-12, "S{} |Ω|² = {}", order, n);
            }
        }
    }

    #[test]
    fn test_s4_values() {
        let q = AngularQuadrature::level_symmetric(4).unwrap();
        let a = q.angle(0);
        assert!((a.ox - 0.350021).abs() < 1e-5);
        assert!((a.oz - 0.868890).abs() < 1e-4, "{}", a.oz);
        assert!((a.weight - 1.0 / 3.0).abs() < 1e-12);
        // Octant 7 mirrors everything
        let b = q.angle(6 * q.ndir_oct());
        assert!((b.ox + a.ox).abs() < 1e-15 && (b.oz + a.oz).abs() < 1e-15);
    }

    #[test]
    fn test_invalid_orders_rejected() {
        assert!(AngularQuadrature::level_symmetric(5).is_err());
        assert!(AngularQuadrature::level_symmetric(18).is_err());
        assert!(AngularQuadrature::level_symmetric(0).is_err());
    }

    #[test]
    fn test_reflection_tables() {
        let q = AngularQuadrature::level_symmetric(6).unwrap();
        for iang in 0..q.ndir() {
            let a = q.angle(iang);
            for normal in Normal::ALL {
                let r = q.reflect_normal(iang, normal);
                assert_eq!(q.reflect_normal(r, normal), iang);
                let b = q.angle(r);
                let (ca, cb) = (a.component(normal), b.component(normal));
                assert!((ca + cb).abs() < 1e-14, "normal {:?}", normal);
            }
        }
    }

    #[test]
    fn test_reverse() {
        let q = AngularQuadrature::chebyshev_yamamoto(4).unwrap();
        let n = q.ndir_oct();
        for iang in 0..4 * n {
            let r = q.reverse(iang, 2);
            assert!(r < 4 * n);
            assert!((q.angle(r).ox + q.angle(iang).ox).abs() < 1e-14);
            assert!((q.angle(r).oz - q.angle(iang).oz).abs() < 1e-14);
        }
        for iang in 0..8 * n {
            let r = q.reverse(iang, 3);
            assert_eq!(q.reverse(r, 3), iang);
            assert!((q.angle(r).oz + q.angle(iang).oz).abs() < 1e-14);
        }
    }

    #[test]
    fn test_product_quadratures() {
        let cg = AngularQuadrature::chebyshev_gauss(4, 2).unwrap();
        assert_eq!(cg.ndir_oct(), 8);
        let (first, all, _) = weight_sums(&cg);
        assert!((first - 1.0).abs() < 1e-14 && (all - 8.0).abs() < 1e-13);
        // Gauss weights of the positive half of the 4-point rule
        let w_polar: f64 = cg.angles()[..2].iter().map(|a| a.weight).sum::<f64>() * 4.0;
        assert!((w_polar - 1.0).abs() < 1e-12, "{}", w_polar);

        let cy = AngularQuadrature::chebyshev_yamamoto(2).unwrap();
        assert_eq!(cy.ndir_oct(), 6);
        assert!((cy.angle(0).alpha - PI / 8.0).abs() < 1e-14);
    }

    #[test]
    fn test_gauss_legendre_integrates_polynomials() {
        let rule = gauss_legendre(4);
        let sum_w: f64 = rule.iter().map(|p| p.1).sum();
        assert!((sum_w - 2.0).abs() < 1e-13);
        // ∫ x⁶ dx over [-1, 1] = 2/7, exact for 4 points
        let x6: f64 = rule.iter().map(|&(x, w)| w * x.powi(6)).sum();
        assert!((x6 - 2.0 / 7.0).abs() < 1e-13, "{}", x6);
    }

    #[test]
    fn test_user_quadrature_normalised() {
        let q = AngularQuadrature::user(&[[1.0, 1.0, 1.0, 3.0], [1.0, 2.0, 0.5, 1.0]]).unwrap();
        let (first, _, _) = weight_sums(&q);
        assert!((first - 1.0).abs() < 1e-15);
        assert!((q.angle(0).weight - 0.75).abs() < 1e-15);
        assert!((q.angle(0).ox - 1.0 / 3f64.sqrt()).abs() < 1e-14);
        assert!(AngularQuadrature::user(&[[-1.0, 1.0, 1.0, 1.0]]).is_err());
    }

    #[test]
    fn test_modify_angle_updates_every_octant() {
        let mut q = AngularQuadrature::chebyshev_gauss(2, 1).unwrap();
        let n = q.ndir_oct();
        let theta = q.angle(1).theta;
        let new_alpha = 1.2;
        q.modify_angle(n + 1, Angle::from_angles(PI - new_alpha, theta, 99.0));
        let a = q.angle(1);
        assert!((a.alpha - new_alpha).abs() < 1e-13, "{}", a.alpha);
        assert!((a.weight - 0.5).abs() < 1e-14, "weight must be kept");
        let c = q.angle(2 * n + 1);
        assert!((c.alpha - (PI + new_alpha)).abs() < 1e-13);
        let (first, _, _) = weight_sums(&q);
        assert!((first - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_to_array_layout() {
        let q = AngularQuadrature::level_symmetric(2).unwrap();
        let arr = q.to_array();
        assert_eq!(arr.dim(), (8, 4));
        assert!((arr[[0, 3]] - 1.0).abs() < 1e-15);
        assert!(arr[[2, 0]] < 0.0 && arr[[2, 1]] < 0.0 && arr[[2, 2]] > 0.0);
    }
}
