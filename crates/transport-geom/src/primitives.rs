// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Geometric Primitives
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Points, directions, cell faces and mesh positions.

use std::fmt;
use std::ops::{Add, Sub};

use transport_types::config::{BoundaryKind, CoreConfig};
use transport_types::constants::{GEOM_EPS, TWOPI};

/// A point in the radial plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Point2 { x, y }
    }

    pub fn distance(&self, other: Point2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Angle from +x to the point, in `[0, 2π)`.
    pub fn alpha(&self) -> f64 {
        let a = self.y.atan2(self.x);
        if a < 0.0 {
            a + TWOPI
        } else {
            a
        }
    }

    pub fn midpoint(&self, other: Point2) -> Point2 {
        Point2::new(0.5 * (self.x + other.x), 0.5 * (self.y + other.y))
    }

    /// Coordinates agree within [`GEOM_EPS`].
    pub fn approx_eq(&self, other: &Point2) -> bool {
        (self.x - other.x).abs() < GEOM_EPS && (self.y - other.y).abs() < GEOM_EPS
    }
}

impl Add for Point2 {
    type Output = Point2;
    fn add(self, rhs: Point2) -> Point2 {
        Point2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point2 {
    type Output = Point2;
    fn sub(self, rhs: Point2) -> Point2 {
        Point2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for Point2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

// ── Faces and normals ────────────────────────────────────────────────

/// Face of a Cartesian cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Surface {
    East,
    North,
    West,
    South,
    Top,
    Bottom,
}

impl Surface {
    pub const ALL: [Surface; 6] = [
        Surface::East,
        Surface::North,
        Surface::West,
        Surface::South,
        Surface::Top,
        Surface::Bottom,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn normal(self) -> Normal {
        match self {
            Surface::East | Surface::West => Normal::X,
            Surface::North | Surface::South => Normal::Y,
            Surface::Top | Surface::Bottom => Normal::Z,
        }
    }

    pub fn opposite(self) -> Surface {
        match self {
            Surface::East => Surface::West,
            Surface::West => Surface::East,
            Surface::North => Surface::South,
            Surface::South => Surface::North,
            Surface::Top => Surface::Bottom,
            Surface::Bottom => Surface::Top,
        }
    }

    /// Whether the outward normal of the face points along +axis.
    pub fn is_positive(self) -> bool {
        matches!(self, Surface::East | Surface::North | Surface::Top)
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Surface::East => "east",
            Surface::North => "north",
            Surface::West => "west",
            Surface::South => "south",
            Surface::Top => "top",
            Surface::Bottom => "bottom",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Normal {
    X,
    Y,
    Z,
}

impl Normal {
    pub const ALL: [Normal; 3] = [Normal::X, Normal::Y, Normal::Z];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Integer location of a coarse (pin) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: usize,
    pub y: usize,
    pub z: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize, z: usize) -> Self {
        Position { x, y, z }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ── Directions ───────────────────────────────────────────────────────

/// A unit direction with its spherical angles.
///
/// `alpha` is the azimuth from +x in the radial plane, `theta` the polar
/// angle from +z.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction {
    pub ox: f64,
    pub oy: f64,
    pub oz: f64,
    pub alpha: f64,
    pub theta: f64,
}

impl Direction {
    pub fn from_angles(alpha: f64, theta: f64) -> Self {
        Direction {
            ox: theta.sin() * alpha.cos(),
            oy: theta.sin() * alpha.sin(),
            oz: theta.cos(),
            alpha,
            theta,
        }
    }

    /// In-plane direction at azimuth `alpha`.
    pub fn radial(alpha: f64) -> Self {
        Self::from_angles(alpha, 0.5 * std::f64::consts::PI)
    }

    pub fn from_cosines(ox: f64, oy: f64, oz: f64) -> Self {
        let theta = oz.clamp(-1.0, 1.0).acos();
        let alpha = Point2::new(ox, oy).alpha();
        Direction {
            ox,
            oy,
            oz,
            alpha,
            theta,
        }
    }

    pub fn rsintheta(&self) -> f64 {
        1.0 / self.theta.sin()
    }

    /// Mirror image across a face.
    pub fn reflect(&self, surface: Surface) -> Direction {
        match surface.normal() {
            Normal::X => Direction::from_cosines(-self.ox, self.oy, self.oz),
            Normal::Y => Direction::from_cosines(self.ox, -self.oy, self.oz),
            Normal::Z => Direction::from_cosines(self.ox, self.oy, -self.oz),
        }
    }

    /// Face through which a ray travelling along this direction enters a
    /// cell.
    pub fn upwind_surface(&self, normal: Normal) -> Surface {
        match normal {
            Normal::X if self.ox > 0.0 => Surface::West,
            Normal::X => Surface::East,
            Normal::Y if self.oy > 0.0 => Surface::South,
            Normal::Y => Surface::North,
            Normal::Z if self.oz > 0.0 => Surface::Bottom,
            Normal::Z => Surface::Top,
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

// ── Boundary conditions ──────────────────────────────────────────────

/// Boundary condition on each of the six outer faces of the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryConditions([BoundaryKind; 6]);

impl BoundaryConditions {
    pub fn uniform(kind: BoundaryKind) -> Self {
        BoundaryConditions([kind; 6])
    }

    pub fn from_config(core: &CoreConfig) -> Self {
        let mut bc = [BoundaryKind::Reflect; 6];
        bc[Surface::East.index()] = core.bc_east;
        bc[Surface::North.index()] = core.bc_north;
        bc[Surface::West.index()] = core.bc_west;
        bc[Surface::South.index()] = core.bc_south;
        bc[Surface::Top.index()] = core.bc_top;
        bc[Surface::Bottom.index()] = core.bc_bottom;
        BoundaryConditions(bc)
    }

    pub fn get(&self, surface: Surface) -> BoundaryKind {
        self.0[surface.index()]
    }

    pub fn set(&mut self, surface: Surface, kind: BoundaryKind) {
        self.0[surface.index()] = kind;
    }

    pub fn is_reflective(&self, surface: Surface) -> bool {
        self.get(surface) == BoundaryKind::Reflect
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════
