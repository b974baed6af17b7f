// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Pin Meshes
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Subdivision of a single square pin cell into flat-source regions.
//!
//! Pin-local coordinates put the origin at the pin centre, so the pin
//! occupies `[-pitch/2, pitch/2]²`.
//!
//! * [`RectMesh`]: `sub_x × sub_y` uniform cells, indexed `sub_x·iy + ix`
//!   from the lower-left corner.
//! * [`CylMesh`]: equal-volume rings inside each material radius plus the
//!   outer region, each cut into `sub_azi` sectors. Regions run ring-major
//!   from the centre out and counter-clockwise from +x within a ring.

use std::f64::consts::PI;
use std::fmt::Write as _;

use transport_types::config::MeshConfig;
use transport_types::constants::{MAX_SUB_AZI, NUDGE, TWOPI};
use transport_types::error::{TransportError, TransportResult};

use crate::primitives::{Direction, Point2};
use crate::shapes::{intersect_circle, intersect_line, Box2, Circle, Line};

/// One `(pin-local region, length)` piece of a traced chord.
pub type Segment = (usize, f64);

#[derive(Debug, Clone, PartialEq)]
pub struct RectMesh {
    /// Internal x division lines (pin-local).
    hx: Vec<f64>,
    /// Internal y division lines (pin-local).
    hy: Vec<f64>,
    lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CylMesh {
    /// Material radii, ascending.
    xs_radii: Vec<f64>,
    /// Mesh radii (all rings), ascending.
    radii: Vec<f64>,
    /// Number of mesh rings per material ring.
    sub_radii: Vec<usize>,
    sub_azi: usize,
    circles: Vec<Circle>,
    lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PinMeshKind {
    Rect(RectMesh),
    Cyl(CylMesh),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PinMesh {
    id: u32,
    pitch_x: f64,
    pitch_y: f64,
    n_reg: usize,
    n_xsreg: usize,
    vol: Vec<f64>,
    kind: PinMeshKind,
}

impl PinMesh {
    pub fn from_config(config: &MeshConfig) -> TransportResult<Self> {
        match config {
            MeshConfig::Rect {
                id,
                pitch,
                sub_x,
                sub_y,
            } => Self::rect(*id, *pitch, *sub_x, *sub_y),
            MeshConfig::Cyl {
                id,
                pitch,
                radii,
                sub_radii,
                sub_azi,
            } => Self::cyl(*id, *pitch, radii, sub_radii, *sub_azi),
        }
    }

    pub fn rect(id: u32, pitch: f64, sub_x: usize, sub_y: usize) -> TransportResult<Self> {
        if pitch <= 0.0 || sub_x == 0 || sub_y == 0 {
            return Err(TransportError::config(format!(
                "Rectangular mesh {id}: pitch {pitch} and divisions {sub_x}x{sub_y} must be positive"
            )));
        }
        let half = 0.5 * pitch;
        let dx = pitch / sub_x as f64;
        let dy = pitch / sub_y as f64;
        let hx: Vec<f64> = (1..sub_x).map(|i| i as f64 * dx - half).collect();
        let hy: Vec<f64> = (1..sub_y).map(|i| i as f64 * dy - half).collect();

        let mut lines = Vec::with_capacity(hx.len() + hy.len());
        for &x in &hx {
            lines.push(Line::new(Point2::new(x, -half), Point2::new(x, half)));
        }
        for &y in &hy {
            lines.push(Line::new(Point2::new(-half, y), Point2::new(half, y)));
        }

        let n_reg = sub_x * sub_y;
        Ok(PinMesh {
            id,
            pitch_x: pitch,
            pitch_y: pitch,
            n_reg,
            n_xsreg: n_reg,
            vol: vec![dx * dy; n_reg],
            kind: PinMeshKind::Rect(RectMesh { hx, hy, lines }),
        })
    }

    pub fn cyl(
        id: u32,
        pitch: f64,
        xs_radii: &[f64],
        sub_radii: &[usize],
        sub_azi: usize,
    ) -> TransportResult<Self> {
        if pitch <= 0.0 {
            return Err(TransportError::config(format!(
                "Cylindrical mesh {id}: pitch must be positive"
            )));
        }
        if xs_radii.is_empty() {
            return Err(TransportError::config(format!(
                "Cylindrical mesh {id}: at least one radius is required"
            )));
        }
        if xs_radii.windows(2).any(|w| w[0] >= w[1]) || xs_radii[0] <= 0.0 {
            return Err(TransportError::config(format!(
                "Cylindrical mesh {id}: radii must be positive and ascending"
            )));
        }
        if xs_radii[xs_radii.len() - 1] > 0.5 * pitch {
            return Err(TransportError::config(format!(
                "Cylindrical mesh {id}: largest radius exceeds half the pitch"
            )));
        }
        if sub_radii.len() != xs_radii.len() || sub_radii.iter().any(|&n| n == 0) {
            return Err(TransportError::config(format!(
                "Cylindrical mesh {id}: need one positive ring count per radius"
            )));
        }
        if sub_azi == 0 || sub_azi % 2 != 0 || sub_azi > MAX_SUB_AZI {
            return Err(TransportError::config(format!(
                "Cylindrical mesh {id}: azimuthal divisions must be even and <= {MAX_SUB_AZI}, got {sub_azi}"
            )));
        }

        // Equal-volume rings within each material ring
        let mut radii = Vec::new();
        let mut r_xs_prev = 0.0_f64;
        let mut r_prev = 0.0_f64;
        for (&r_xs, &n) in xs_radii.iter().zip(sub_radii) {
            let dv = (r_xs * r_xs - r_xs_prev * r_xs_prev) / n as f64;
            for i in 0..n {
                let r = if i + 1 == n {
                    r_xs
                } else {
                    (dv + r_prev * r_prev).sqrt()
                };
                radii.push(r);
                r_prev = r;
            }
            r_xs_prev = r_xs;
        }

        let origin = Point2::default();
        let circles = radii.iter().map(|&r| Circle::new(origin, r)).collect();

        let half = 0.5 * pitch;
        let pin_box = Box2::new(Point2::new(-half, -half), Point2::new(half, half));
        let sep = TWOPI / sub_azi as f64;
        let lines = (0..sub_azi)
            .map(|i| Line::new(origin, pin_box.exit_point(origin, i as f64 * sep)))
            .collect();

        let n_azi = sub_azi as f64;
        let mut vol = Vec::with_capacity((radii.len() + 1) * sub_azi);
        let mut prev = 0.0_f64;
        for &r in &radii {
            let v = PI * (r * r - prev * prev) / n_azi;
            vol.extend(std::iter::repeat(v).take(sub_azi));
            prev = r;
        }
        let v_outer = (pitch * pitch - PI * prev * prev) / n_azi;
        vol.extend(std::iter::repeat(v_outer).take(sub_azi));

        let n_reg = (radii.len() + 1) * sub_azi;
        Ok(PinMesh {
            id,
            pitch_x: pitch,
            pitch_y: pitch,
            n_reg,
            n_xsreg: xs_radii.len() + 1,
            vol,
            kind: PinMeshKind::Cyl(CylMesh {
                xs_radii: xs_radii.to_vec(),
                radii,
                sub_radii: sub_radii.to_vec(),
                sub_azi,
                circles,
                lines,
            }),
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn pitch_x(&self) -> f64 {
        self.pitch_x
    }

    pub fn pitch_y(&self) -> f64 {
        self.pitch_y
    }

    pub fn n_reg(&self) -> usize {
        self.n_reg
    }

    pub fn n_xsreg(&self) -> usize {
        self.n_xsreg
    }

    /// Area of each flat-source region.
    pub fn vols(&self) -> &[f64] {
        &self.vol
    }

    pub fn kind(&self) -> &PinMeshKind {
        &self.kind
    }

    /// Cross-section region containing fine region `reg`.
    pub fn xs_region(&self, reg: usize) -> usize {
        match &self.kind {
            PinMeshKind::Rect(_) => reg,
            PinMeshKind::Cyl(c) => {
                let ring = reg / c.sub_azi;
                let mut acc = 0;
                for (ixs, &n) in c.sub_radii.iter().enumerate() {
                    acc += n;
                    if ring < acc {
                        return ixs;
                    }
                }
                self.n_xsreg - 1
            }
        }
    }

    /// Region containing `p`, or `None` outside the pin.
    ///
    /// The point is advanced a small distance along `dir` before
    /// bucketing, so points on an internal boundary resolve to the region
    /// the direction points into and points on the pin boundary resolve
    /// to `None` when the direction leaves the pin.
    pub fn find_region(&self, p: Point2, dir: &Direction) -> Option<usize> {
        let (ox, oy) = (dir.alpha.cos(), dir.alpha.sin());
        let q = Point2::new(p.x + NUDGE * ox, p.y + NUDGE * oy);
        self.find_reg(q)
    }

    /// Region containing `p` without boundary disambiguation.
    fn find_reg(&self, p: Point2) -> Option<usize> {
        if p.x.abs() > 0.5 * self.pitch_x || p.y.abs() > 0.5 * self.pitch_y {
            return None;
        }
        match &self.kind {
            PinMeshKind::Rect(m) => {
                let ix = m.hx.iter().take_while(|&&h| h <= p.x).count();
                let iy = m.hy.iter().take_while(|&&h| h <= p.y).count();
                Some((m.hx.len() + 1) * iy + ix)
            }
            PinMeshKind::Cyl(m) => {
                let r = p.norm();
                let ir = m.radii.partition_point(|&ri| ri <= r);
                let ia = ((p.alpha() / (TWOPI / m.sub_azi as f64)) as usize).min(m.sub_azi - 1);
                Some(ir * m.sub_azi + ia)
            }
        }
    }

    /// Split the chord `p1 → p2` (pin-local) into regions.
    ///
    /// Crossings with internal lines and circles are ordered along the
    /// chord, coincident points are merged and each piece is assigned the
    /// region of its midpoint.
    pub fn trace(&self, p1: Point2, p2: Point2) -> Vec<Segment> {
        let chord = Line::new(p1, p2);
        let mut ts: Vec<(f64, Point2)> = vec![(0.0, p1), (1.0, p2)];
        match &self.kind {
            PinMeshKind::Rect(m) => {
                ts.extend(m.lines.iter().filter_map(|li| intersect_line(&chord, li)));
            }
            PinMeshKind::Cyl(m) => {
                for c in &m.circles {
                    ts.extend(intersect_circle(&chord, c));
                }
                ts.extend(m.lines.iter().filter_map(|li| intersect_line(&chord, li)));
            }
        }
        ts.sort_by(|a, b| a.0.total_cmp(&b.0));
        ts.dedup_by(|b, a| b.1.approx_eq(&a.1));

        let mut segments = Vec::with_capacity(ts.len().saturating_sub(1));
        for w in ts.windows(2) {
            let (a, b) = (w[0].1, w[1].1);
            let len = a.distance(b);
            if let Some(reg) = self.find_reg(a.midpoint(b)) {
                segments.push((reg, len));
            } else {
                log::warn!(
                    "Chord piece {} -> {} falls outside pin mesh {}",
                    a,
                    b,
                    self.id
                );
            }
        }
        segments
    }

    /// Cairo drawing commands for the internal mesh lines.
    pub fn draw(&self) -> String {
        let mut buf = String::new();
        match &self.kind {
            PinMeshKind::Rect(m) => {
                for l in &m.lines {
                    draw_line(&mut buf, l);
                }
            }
            PinMeshKind::Cyl(m) => {
                let _ = writeln!(buf, "ctx.move_to(0, 0)");
                for c in &m.circles {
                    let _ = writeln!(buf, "ctx.arc({}, {}, {}, 0, twopi)", c.c.x, c.c.y, c.r);
                }
                for l in &m.lines {
                    draw_line(&mut buf, l);
                }
            }
        }
        buf.push_str("ctx.stroke()");
        buf
    }

    /// Meshes with identical subdivisions trace identically.
    pub fn geometrically_equivalent(&self, other: &PinMesh) -> bool {
        self.pitch_x == other.pitch_x && self.pitch_y == other.pitch_y && self.kind == other.kind
    }
}

impl CylMesh {
    pub fn xs_radii(&self) -> &[f64] {
        &self.xs_radii
    }

    pub fn radii(&self) -> &[f64] {
        &self.radii
    }

    pub fn sub_azi(&self) -> usize {
        self.sub_azi
    }
}

fn draw_line(buf: &mut String, l: &Line) {
    let _ = writeln!(buf, "ctx.move_to({}, {})", l.p1.x, l.p1.y);
    let _ = writeln!(buf, "ctx.line_to({}, {})", l.p2.x, l.p2.y);
    let _ = writeln!(buf, "ctx.close_path()");
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_4;

    fn fuel_mesh() -> PinMesh {
        PinMesh::cyl(1, 1.26, &[0.54, 0.62], &[4, 2], 8).unwrap()
    }

    #[test]
    fn test_cyl_region_count_and_volume() {
        let pm = fuel_mesh();
        assert_eq!(pm.n_reg(), 56);
        assert_eq!(pm.n_xsreg(), 3);
        let total: f64 = pm.vols().iter().sum();
        assert!((total - 1.26 * 1.26).abs() < 1e-12, "total = {}", total);
    }

    #[test]
    fn test_cyl_equal_volume_rings() {
        let pm = fuel_mesh();
        // The four fuel rings share the fuel volume equally
        for ring in 0..4 {
            let v = pm.vols()[ring * 8];
            assert!((v - PI * 0.54 * 0.54 / 32.0).abs() < 1e-14);
        }
    }

    #[test]
    fn test_find_region_cylinder() {
        let pm = fuel_mesh();
        let at = |x: f64, y: f64, a: f64| pm.find_region(Point2::new(x, y), &Direction::radial(a));
        assert_eq!(at(0.0, 0.0, 0.01), Some(0));
        assert_eq!(at(0.01, 0.0, TWOPI - 0.01), Some(7));
        assert_eq!(at(0.62, 0.0, FRAC_PI_4), Some(48));
        assert_eq!(at(0.62, 0.0, 3.0 * FRAC_PI_4), Some(40));
        assert_eq!(at(0.62, 0.0, 5.0 * FRAC_PI_4), Some(47));
        assert_eq!(at(0.62, 0.0, 7.0 * FRAC_PI_4), Some(55));
    }

    #[test]
    fn test_find_region_pin_boundary() {
        let pm = fuel_mesh();
        let edge = Point2::new(0.63, 0.1);
        assert_eq!(pm.find_region(edge, &Direction::radial(0.0)), None);
        assert!(pm.find_region(edge, &Direction::radial(PI)).is_some());
        assert_eq!(pm.find_region(Point2::new(0.7, 0.0), &Direction::radial(PI)), None);
    }

    #[test]
    fn test_rect_regions() {
        let pm = PinMesh::rect(2, 1.26, 3, 2).unwrap();
        assert_eq!(pm.n_reg(), 6);
        let d = Direction::radial(FRAC_PI_4);
        assert_eq!(pm.find_region(Point2::new(-0.6, -0.6), &d), Some(0));
        assert_eq!(pm.find_region(Point2::new(0.6, 0.6), &d), Some(5));
        // On the internal x-line at -0.21, moving in +x lands in column 1
        assert_eq!(pm.find_region(Point2::new(-0.21, -0.3), &d), Some(1));
        assert_eq!(
            pm.find_region(Point2::new(-0.21, -0.3), &Direction::radial(PI)),
            Some(0)
        );
    }

    #[test]
    fn test_trace_lengths_sum_to_chord() {
        let pm = fuel_mesh();
        let p1 = Point2::new(-0.63, -0.2);
        let p2 = Point2::new(0.63, 0.35);
        let segs = pm.trace(p1, p2);
        let total: f64 = segs.iter().map(|s| s.1).sum();
        assert!((total - p1.distance(p2)).abs() < 1e-12);
        assert!(segs.len() > 10);
        assert!(segs.iter().all(|&(r, l)| r < pm.n_reg() && l > 0.0));
    }

    #[test]
    fn test_trace_through_centre() {
        let pm = fuel_mesh();
        // A diameter crosses every ring twice; the sector lines all meet
        // at the centre and merge into one crossing.
        let segs = pm.trace(Point2::new(-0.63, 0.0), Point2::new(0.63, 0.0));
        assert_eq!(segs.len(), 2 * 7);
        let rings: Vec<usize> = segs.iter().map(|s| s.0 / 8).collect();
        assert_eq!(rings, vec![6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_xs_region_map() {
        let pm = fuel_mesh();
        assert_eq!(pm.xs_region(0), 0);
        assert_eq!(pm.xs_region(31), 0);
        assert_eq!(pm.xs_region(32), 1);
        assert_eq!(pm.xs_region(47), 1);
        assert_eq!(pm.xs_region(48), 2);
        assert_eq!(pm.xs_region(55), 2);
    }

    #[test]
    fn test_invalid_meshes() {
        assert!(PinMesh::cyl(1, 1.26, &[0.7], &[1], 8).is_err());
        assert!(PinMesh::cyl(1, 1.26, &[0.5, 0.4], &[1, 1], 8).is_err());
        assert!(PinMesh::cyl(1, 1.26, &[0.5], &[1], 3).is_err());
        assert!(PinMesh::cyl(1, 1.26, &[0.5], &[1], 10).is_err());
        assert!(PinMesh::rect(1, 1.26, 0, 1).is_err());
    }

    #[test]
    fn test_draw_mentions_arcs() {
        let text = fuel_mesh().draw();
        assert_eq!(text.matches("ctx.arc").count(), 6);
        assert!(text.ends_with("ctx.stroke()"));
    }
}
