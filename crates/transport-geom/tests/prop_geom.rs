// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Property-Based Tests (proptest) for transport-geom
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for transport-geom using proptest.
//!
//! Covers: pin-mesh volume partition, chord tracing, boundary
//! disambiguation, direction reflection, coarse surface indexing.

use proptest::prelude::*;
use std::f64::consts::PI;
use transport_geom::coarse::CoarseMesh;
use transport_geom::pin_mesh::PinMesh;
use transport_geom::primitives::{BoundaryConditions, Direction, Point2, Surface};
use transport_types::config::BoundaryKind;

fn cyl_mesh() -> impl Strategy<Value = PinMesh> {
    (
        0.8f64..2.0,
        prop::collection::vec(0.05f64..1.0, 1..4),
        prop::collection::vec(1usize..4, 3),
        prop::sample::select(vec![2usize, 4, 8]),
    )
        .prop_map(|(pitch, fracs, subs, azi)| {
            // Ascending radii below half the pitch
            let total: f64 = fracs.iter().sum::<f64>() * 1.05;
            let mut acc = 0.0;
            let radii: Vec<f64> = fracs
                .iter()
                .map(|f| {
                    acc += f;
                    0.5 * pitch * acc / total
                })
                .collect();
            let subs = subs[..radii.len()].to_vec();
            PinMesh::cyl(1, pitch, &radii, &subs, azi).unwrap()
        })
}

// ── Pin Mesh Properties ──────────────────────────────────────────────

proptest! {
    /// Region volumes partition the pitch square.
    #[test]
    fn cyl_volumes_partition_pin(mesh in cyl_mesh()) {
        let total: f64 = mesh.vols().iter().sum();
        let area = mesh.pitch_x() * mesh.pitch_y();
        prop_assert!((total - area).abs() < 1e-12 * area, "{} vs {}", total, area);
        prop_assert!(mesh.vols().iter().all(|&v| v > 0.0));
    }

    #[test]
    fn rect_volumes_partition_pin(pitch in 0.5f64..3.0, sx in 1usize..6, sy in 1usize..6) {
        let mesh = PinMesh::rect(1, pitch, sx, sy).unwrap();
        let total: f64 = mesh.vols().iter().sum();
        prop_assert!((total - pitch * pitch).abs() < 1e-12);
        prop_assert_eq!(mesh.n_reg(), sx * sy);
    }

    /// Segment lengths of a chord through the pin add up to the chord.
    #[test]
    fn trace_preserves_chord_length(
        mesh in cyl_mesh(),
        a in 0.0f64..1.0, b in 0.0f64..1.0,
        c in 0.0f64..1.0, d in 0.0f64..1.0,
    ) {
        let h = 0.5 * mesh.pitch_x();
        let p1 = Point2::new((2.0 * a - 1.0) * h, (2.0 * b - 1.0) * h);
        let p2 = Point2::new((2.0 * c - 1.0) * h, (2.0 * d - 1.0) * h);
        prop_assume!(p1.distance(p2) > 1e-6);
        let segs = mesh.trace(p1, p2);
        let total: f64 = segs.iter().map(|s| s.1).sum();
        prop_assert!((total - p1.distance(p2)).abs() < 1e-10);
        prop_assert!(segs.iter().all(|s| s.0 < mesh.n_reg()));
    }

    /// Interior points always resolve to a region; points on the pin edge
    /// resolve only when the direction points inwards.
    #[test]
    fn find_region_on_pin_edge(mesh in cyl_mesh(), t in -0.99f64..0.99) {
        let h = 0.5 * mesh.pitch_x();
        let p = Point2::new(h, t * h);
        prop_assert!(mesh.find_region(p, &Direction::radial(PI)).is_some());
        prop_assert!(mesh.find_region(p, &Direction::radial(0.0)).is_none());
        let inner = Point2::new(0.5 * h, t * 0.5 * h);
        prop_assert!(mesh.find_region(inner, &Direction::radial(1.0)).is_some());
    }

    #[test]
    fn xs_region_within_bounds(mesh in cyl_mesh()) {
        for reg in 0..mesh.n_reg() {
            prop_assert!(mesh.xs_region(reg) < mesh.n_xsreg());
        }
        prop_assert_eq!(mesh.xs_region(mesh.n_reg() - 1), mesh.n_xsreg() - 1);
    }
}

// ── Direction Properties ─────────────────────────────────────────────

proptest! {
    /// Reflecting twice across the same face restores the direction.
    #[test]
    fn reflection_is_involutive(alpha in 0.0f64..(2.0 * PI), theta in 0.01f64..(PI - 0.01)) {
        let d = Direction::from_angles(alpha, theta);
        for s in Surface::ALL {
            let r = d.reflect(s).reflect(s);
            prop_assert!((r.ox - d.ox).abs() < 1e-14);
            prop_assert!((r.oy - d.oy).abs() < 1e-14);
            prop_assert!((r.oz - d.oz).abs() < 1e-14);
        }
    }
}

// ── Coarse Mesh Properties ───────────────────────────────────────────

proptest! {
    /// Every cell face has one global index shared with the neighbour and
    /// maps back to the cell through `coarse_neigh_cells`.
    #[test]
    fn coarse_surfaces_consistent(nx in 1usize..5, ny in 1usize..5, nz in 1usize..4) {
        let mesh = CoarseMesh::new(
            vec![1.0; nx],
            vec![1.5; ny],
            vec![2.0; nz],
            BoundaryConditions::uniform(BoundaryKind::Vacuum),
        ).unwrap();
        let mut seen = vec![0usize; mesh.n_surf()];
        for cell in 0..mesh.n_cell() {
            prop_assert_eq!(mesh.coarse_cell(mesh.coarse_position(cell)), cell);
            for s in Surface::ALL {
                let surf = mesh.coarse_surf(cell, s);
                prop_assert!(surf < mesh.n_surf());
                seen[surf] += 1;
                let (l, r) = mesh.coarse_neigh_cells(surf);
                let mine = if s.is_positive() { l } else { r };
                prop_assert_eq!(mine, Some(cell));
                let other = if s.is_positive() { r } else { l };
                prop_assert_eq!(other, mesh.coarse_neighbor(cell, s));
            }
        }
        // Every surface belongs to one or two cells
        prop_assert!(seen.iter().all(|&n| n == 1 || n == 2));
    }
}
