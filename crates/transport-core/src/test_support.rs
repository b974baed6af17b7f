// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Unit Test Fixtures
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Small cases and libraries shared by the unit tests.

use serde_json::json;
use transport_types::config::{BoundaryKind, CaseConfig};

use crate::material::MaterialLib;

pub const TWO_GROUP_LIB: &str = "\
Two-group fixture
2 2
2.0e7 0.625
XSMACRO fuel 0
0.01 0.02 0.008 1.0
0.10 0.30 0.12 0.0
0.20 0.00
0.02 0.50
XSMACRO water 0
0.0002 0.0 0.0 0.0
0.02 0.0 0.0 0.0
0.30 0.00
0.05 1.20
";

/// One group: `fissile` has k∞ = 1.2, `absorber` has c = 0.5.
pub const ONE_GROUP_LIB: &str = "\
One-group fixture
1 2
2.0e7
XSMACRO fissile 0
0.1 0.12 0.05 1.0
0.3
XSMACRO absorber 0
0.5 0.0 0.0 0.0
0.5
";

/// Fuel is material 1, water material 2.
pub fn two_group_lib() -> MaterialLib {
    let mut lib = MaterialLib::parse(TWO_GROUP_LIB).unwrap();
    lib.assign_id(1, "fuel").unwrap();
    lib.assign_id(2, "water").unwrap();
    lib
}

/// `fissile` is material 1, `absorber` material 2.
pub fn one_group_lib() -> MaterialLib {
    let mut lib = MaterialLib::parse(ONE_GROUP_LIB).unwrap();
    lib.assign_id(1, "fissile").unwrap();
    lib.assign_id(2, "absorber").unwrap();
    lib
}

/// n×n lattice of 1.26 cm fuel pins in water, reflective all round, one
/// 1 cm plane.
pub fn two_group_pin_case(n: usize) -> CaseConfig {
    case(
        json!([{"type": "cyl", "id": 1, "pitch": 1.26,
                "radii": [0.54], "sub_radii": [1], "sub_azi": 4}]),
        json!([{"id": 1, "mesh": 1, "materials": [1, 2]}]),
        n,
        vec![1; n * n],
        1,
        BoundaryKind::Reflect,
    )
}

/// 3×3 lattice of water cells around one fuel pin.
pub fn three_by_three_case() -> CaseConfig {
    case(
        json!([
            {"type": "cyl", "id": 1, "pitch": 1.26,
             "radii": [0.54], "sub_radii": [1], "sub_azi": 4},
            {"type": "rect", "id": 2, "pitch": 1.26, "sub_x": 2, "sub_y": 2}
        ]),
        json!([
            {"id": 1, "mesh": 1, "materials": [1, 2]},
            {"id": 2, "mesh": 2, "materials": [2, 2, 2, 2]}
        ]),
        3,
        vec![2, 2, 2, 2, 1, 2, 2, 2, 2],
        1,
        BoundaryKind::Reflect,
    )
}

/// n×n lattice of square cells of material 1, `nz` 1 cm planes.
pub fn homogeneous_case(n: usize, nz: usize, bc: BoundaryKind) -> CaseConfig {
    case(
        json!([{"type": "rect", "id": 1, "pitch": 1.0, "sub_x": 2, "sub_y": 2}]),
        json!([{"id": 1, "mesh": 1, "materials": [1, 1, 1, 1]}]),
        n,
        vec![1; n * n],
        nz,
        bc,
    )
}

fn case(
    meshes: serde_json::Value,
    pins: serde_json::Value,
    n: usize,
    lattice: Vec<u32>,
    nz: usize,
    bc: BoundaryKind,
) -> CaseConfig {
    let mut config: CaseConfig = serde_json::from_value(json!({
        "case_name": "fixture",
        "meshes": meshes,
        "material_lib": {"path": "fixture.xsl",
                         "materials": [{"id": 1, "name": "m1"}, {"id": 2, "name": "m2"}]},
        "pins": pins,
        "lattices": [{"id": 1, "nx": n, "ny": n, "pins": lattice}],
        "assemblies": [{"id": 1, "np": nz, "hz": 1.0, "lattices": vec![1; nz]}],
        "core": {"nx": 1, "ny": 1, "assemblies": [1]},
        "ang_quad": {"type": "ls", "order": 4},
        "rays": {"spacing": 0.05}
    }))
    .unwrap();
    config.core.bc_north = bc;
    config.core.bc_south = bc;
    config.core.bc_east = bc;
    config.core.bc_west = bc;
    config.core.bc_top = bc;
    config.core.bc_bottom = bc;
    config
}
