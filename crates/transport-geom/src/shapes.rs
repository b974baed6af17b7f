// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Lines, Circles and Boxes
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Intersection kernels used by the ray tracer.
//!
//! Chord parameters are returned alongside points so callers can order
//! crossings along a ray without relying on a coordinate being monotone.

use crate::primitives::Point2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub p1: Point2,
    pub p2: Point2,
}

impl Line {
    pub const fn new(p1: Point2, p2: Point2) -> Self {
        Line { p1, p2 }
    }

    pub fn length(&self) -> f64 {
        self.p1.distance(self.p2)
    }

    pub fn at(&self, t: f64) -> Point2 {
        Point2::new(
            self.p1.x + t * (self.p2.x - self.p1.x),
            self.p1.y + t * (self.p2.y - self.p1.y),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub c: Point2,
    pub r: f64,
}

impl Circle {
    pub const fn new(c: Point2, r: f64) -> Self {
        Circle { c, r }
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Box2 {
    pub lo: Point2,
    pub hi: Point2,
}

impl Box2 {
    pub fn new(a: Point2, b: Point2) -> Self {
        Box2 {
            lo: Point2::new(a.x.min(b.x), a.y.min(b.y)),
            hi: Point2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn contains(&self, p: Point2) -> bool {
        p.x >= self.lo.x && p.x <= self.hi.x && p.y >= self.lo.y && p.y <= self.hi.y
    }

    /// First exit point of the ray from `p` (inside the box) at azimuth
    /// `alpha`.
    pub fn exit_point(&self, p: Point2, alpha: f64) -> Point2 {
        let (ox, oy) = (alpha.cos(), alpha.sin());
        let mut d_min = f64::INFINITY;
        let candidates = [
            (self.lo.x - p.x) / ox,
            (self.hi.x - p.x) / ox,
            (self.lo.y - p.y) / oy,
            (self.hi.y - p.y) / oy,
        ];
        for d in candidates {
            if d.is_finite() && d > 0.0 && d < d_min {
                d_min = d;
            }
        }
        Point2::new(p.x + ox * d_min, p.y + oy * d_min)
    }
}

/// Crossings of a chord with a circle, strictly inside the chord.
///
/// Tangent contacts are ignored. Returns `(t, point)` pairs with `t` the
/// fraction along `l`.
pub fn intersect_circle(l: &Line, circ: &Circle) -> Vec<(f64, Point2)> {
    let u1 = l.p2.x - l.p1.x;
    let u2 = l.p2.y - l.p1.y;
    let w1 = l.p1.x - circ.c.x;
    let w2 = l.p1.y - circ.c.y;

    let b = w1 * u1 + w2 * u2;
    let c = w1 * w1 + w2 * w2 - circ.r * circ.r;
    let a = u1 * u1 + u2 * u2;
    if a <= 0.0 {
        return Vec::new();
    }
    let disc = b * b - a * c;
    if disc <= 1e-14 * a * circ.r * circ.r {
        return Vec::new();
    }
    let sq = disc.sqrt();
    [(-b - sq) / a, (-b + sq) / a]
        .into_iter()
        .filter(|&t| t > 0.0 && t < 1.0)
        .map(|t| (t, l.at(t)))
        .collect()
}

/// Crossing of chord `l` with segment `m`, if the two are not parallel.
/// The returned parameter is the fraction along `l`.
pub fn intersect_line(l: &Line, m: &Line) -> Option<(f64, Point2)> {
    let u1 = l.p2.x - l.p1.x;
    let u2 = l.p2.y - l.p1.y;
    let v1 = m.p2.x - m.p1.x;
    let v2 = m.p2.y - m.p1.y;
    let w1 = l.p1.x - m.p1.x;
    let w2 = l.p1.y - m.p1.y;

    let d = v1 * u2 - v2 * u1;
    if d.abs() < 1e-300 {
        return None;
    }
    let s = (v2 * w1 - v1 * w2) / d;
    let t = (u2 * w1 - u1 * w2) / d;

    if (0.0..=1.0).contains(&s) && (0.0..=1.0).contains(&t) {
        Some((s, l.at(s)))
    } else {
        None
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chord_through_circle() {
        let l = Line::new(Point2::new(-1.0, 0.0), Point2::new(1.0, 0.0));
        let hits = intersect_circle(&l, &Circle::new(Point2::default(), 0.5));
        assert_eq!(hits.len(), 2);
        assert!((hits[0].1.x + 0.5).abs() < 1e-14);
        assert!((hits[1].1.x - 0.5).abs() < 1e-14);
        assert!(hits[0].0 < hits[1].0);
    }

    #[test]
    fn test_chord_missing_circle() {
        let l = Line::new(Point2::new(-1.0, 0.7), Point2::new(1.0, 0.7));
        assert!(intersect_circle(&l, &Circle::new(Point2::default(), 0.5)).is_empty());
        let tangent = Line::new(Point2::new(-1.0, 0.5), Point2::new(1.0, 0.5));
        assert!(intersect_circle(&tangent, &Circle::new(Point2::default(), 0.5)).is_empty());
    }

    #[test]
    fn test_line_crossing() {
        let l = Line::new(Point2::new(0.0, 0.0), Point2::new(2.0, 2.0));
        let m = Line::new(Point2::new(1.0, -1.0), Point2::new(1.0, 3.0));
        let (t, p) = intersect_line(&l, &m).unwrap();
        assert!((t - 0.5).abs() < 1e-14);
        assert!((p.x - 1.0).abs() < 1e-14 && (p.y - 1.0).abs() < 1e-14);

        let parallel = Line::new(Point2::new(0.0, 1.0), Point2::new(2.0, 3.0));
        assert!(intersect_line(&l, &parallel).is_none());
        let short = Line::new(Point2::new(3.0, -1.0), Point2::new(3.0, 3.0));
        assert!(intersect_line(&l, &short).is_none());
    }

    #[test]
    fn test_box_exit() {
        let b = Box2::new(Point2::new(-0.63, -0.63), Point2::new(0.63, 0.63));
        let p = b.exit_point(Point2::default(), std::f64::consts::FRAC_PI_4);
        assert!((p.x - 0.63).abs() < 1e-12 && (p.y - 0.63).abs() < 1e-12);
        let q = b.exit_point(Point2::default(), 0.0);
        assert!((q.x - 0.63).abs() < 1e-12 && q.y.abs() < 1e-12);
    }
}
