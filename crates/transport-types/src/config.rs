// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Case Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Structured case input.
//!
//! A case file is a JSON document whose top-level keys mirror the elements of
//! a transport case: pin meshes, material library, pins, lattices,
//! assemblies, the core layout, then the angular quadrature, ray, sweeper,
//! CMFD and solver options. Everything below `core` has defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{TransportError, TransportResult};

/// Top-level case description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseConfig {
    #[serde(default = "default_case_name")]
    pub case_name: String,
    pub meshes: Vec<MeshConfig>,
    pub material_lib: MaterialLibConfig,
    pub pins: Vec<PinConfig>,
    pub lattices: Vec<LatticeConfig>,
    pub assemblies: Vec<AssemblyConfig>,
    pub core: CoreConfig,
    #[serde(default)]
    pub ang_quad: AngQuadConfig,
    #[serde(default)]
    pub rays: RayConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
    #[serde(default)]
    pub cmfd: CmfdConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    /// External isotropic source, required for fixed-source problems.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    /// Directory relative paths inside the case are resolved against. Set by
    /// [`CaseConfig::from_file`].
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_case_name() -> String {
    "case".to_string()
}

// ── Geometry ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MeshConfig {
    /// Uniform Cartesian subdivision of a square pin.
    Rect {
        id: u32,
        pitch: f64,
        sub_x: usize,
        sub_y: usize,
    },
    /// Rings and azimuthal sectors inside a square pin.
    Cyl {
        id: u32,
        pitch: f64,
        /// Outer radius of each material ring, ascending.
        radii: Vec<f64>,
        /// Number of equal-volume mesh rings per material ring.
        sub_radii: Vec<usize>,
        /// Number of azimuthal sectors, shared by every ring.
        sub_azi: usize,
    },
}

impl MeshConfig {
    pub fn id(&self) -> u32 {
        match self {
            MeshConfig::Rect { id, .. } | MeshConfig::Cyl { id, .. } => *id,
        }
    }

    pub fn pitch(&self) -> f64 {
        match self {
            MeshConfig::Rect { pitch, .. } | MeshConfig::Cyl { pitch, .. } => *pitch,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialLibConfig {
    /// Path to the cross-section library, relative to the case file.
    pub path: String,
    pub materials: Vec<MaterialRef>,
}

/// Binds a library material name to the integer id pins refer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialRef {
    pub id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinConfig {
    pub id: u32,
    pub mesh: u32,
    /// One material id per cross-section region of the mesh, inside out.
    pub materials: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatticeConfig {
    pub id: u32,
    pub nx: usize,
    pub ny: usize,
    /// nx·ny pin ids, row-major as drawn (top row first).
    pub pins: Vec<u32>,
}

/// Plane heights: a single value for every plane or one per plane, top first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum HeightSpec {
    Uniform(f64),
    PerPlane(Vec<f64>),
}

/// A lattice id, or a group of lattice ids bound into one macroplane.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LatticeGroup {
    Single(u32),
    Group(Vec<u32>),
}

impl LatticeGroup {
    pub fn ids(&self) -> Vec<u32> {
        match self {
            LatticeGroup::Single(id) => vec![*id],
            LatticeGroup::Group(ids) => ids.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyConfig {
    pub id: u32,
    /// Number of planes.
    pub np: usize,
    pub hz: HeightSpec,
    /// Lattice ids top first. Grouped entries are merged into one macroplane.
    pub lattices: Vec<LatticeGroup>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryKind {
    #[default]
    Reflect,
    Vacuum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub nx: usize,
    pub ny: usize,
    #[serde(default)]
    pub bc_north: BoundaryKind,
    #[serde(default)]
    pub bc_south: BoundaryKind,
    #[serde(default)]
    pub bc_east: BoundaryKind,
    #[serde(default)]
    pub bc_west: BoundaryKind,
    #[serde(default)]
    pub bc_top: BoundaryKind,
    #[serde(default)]
    pub bc_bottom: BoundaryKind,
    /// nx·ny assembly ids, row-major as drawn (top row first).
    pub assemblies: Vec<u32>,
}

// ── Angular quadrature and rays ──────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum QuadratureKind {
    /// Level-symmetric
    #[serde(rename = "ls")]
    LevelSymmetric,
    /// Chebyshev azimuthal × Gauss-Legendre polar
    #[serde(rename = "cg")]
    ChebyshevGauss,
    /// Chebyshev azimuthal × Yamamoto 3-angle polar
    #[serde(rename = "cy")]
    ChebyshevYamamoto,
    /// Explicit first-octant list
    #[serde(rename = "user")]
    User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AngQuadConfig {
    #[serde(rename = "type", default = "default_quad_kind")]
    pub kind: QuadratureKind,
    /// Level-symmetric order N.
    #[serde(default = "default_order")]
    pub order: usize,
    /// Azimuthal angles per octant for product quadratures.
    #[serde(default = "default_n_azimuthal")]
    pub n_azimuthal: usize,
    /// Polar angles per octant for product quadratures.
    #[serde(default = "default_n_polar")]
    pub n_polar: usize,
    /// First-octant angles for `user`: `[ox, oy, oz, weight]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub angles: Vec<[f64; 4]>,
}

fn default_quad_kind() -> QuadratureKind {
    QuadratureKind::LevelSymmetric
}
fn default_order() -> usize {
    4
}
fn default_n_azimuthal() -> usize {
    4
}
fn default_n_polar() -> usize {
    3
}

impl Default for AngQuadConfig {
    fn default() -> Self {
        AngQuadConfig {
            kind: default_quad_kind(),
            order: default_order(),
            n_azimuthal: default_n_azimuthal(),
            n_polar: default_n_polar(),
            angles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Modularity {
    /// Rays are cyclic over the whole core.
    #[default]
    Core,
    /// Rays are cyclic over every pin cell (all pins share one pitch).
    Pin,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VolumeCorrection {
    /// Per-angle correction factors.
    #[default]
    Flat,
    /// One angle-integrated factor per region.
    Angle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RayConfig {
    /// Target perpendicular ray spacing (cm).
    #[serde(default = "default_spacing")]
    pub spacing: f64,
    #[serde(default)]
    pub modularity: Modularity,
    #[serde(default)]
    pub volume_correction: VolumeCorrection,
}

fn default_spacing() -> f64 {
    0.05
}

impl Default for RayConfig {
    fn default() -> Self {
        RayConfig {
            spacing: default_spacing(),
            modularity: Modularity::default(),
            volume_correction: VolumeCorrection::default(),
        }
    }
}

// ── Sweepers ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SweeperKind {
    #[default]
    Moc,
    Sn,
    #[serde(rename = "2d3d")]
    TwoDThreeD,
}

/// How outgoing boundary fluxes become incoming ones.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryUpdate {
    /// After every angle.
    #[default]
    Gs,
    /// After the whole group sweep.
    Jacobi,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnEquation {
    /// Diamond difference
    #[default]
    Dd,
    /// Corrected diamond difference
    Cdd,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NegativeSourcePolicy {
    Ignore,
    #[default]
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    #[serde(rename = "type", default)]
    pub kind: SweeperKind,
    /// Inner iterations per group sweep.
    #[serde(default = "default_n_inner")]
    pub n_inner: usize,
    #[serde(default)]
    pub boundary_update: BoundaryUpdate,
    /// Sn spatial discretisation. `cdd` is implied for 2D3D.
    #[serde(default)]
    pub equation: SnEquation,
    /// Zero negative outgoing Sn face fluxes and rebalance the cell.
    #[serde(default = "default_true")]
    pub sn_fixup: bool,
    #[serde(default)]
    pub negative_source: NegativeSourcePolicy,
    /// 2D3D: number of outer iterations during which the MoC sweep is skipped.
    #[serde(default)]
    pub inactive_moc: usize,
    /// 2D3D: report the Sn flux to the solver instead of the MoC flux.
    #[serde(default)]
    pub expose_sn: bool,
    /// 2D3D: project the Sn pin flux onto the MoC fine mesh after each sweep.
    #[serde(default = "default_true")]
    pub sn_project: bool,
    /// 2D3D: move negative MoC sources caused by transverse leakage into
    /// an extra removal term.
    #[serde(default = "default_true")]
    pub tl_splitting: bool,
    /// 2D3D: number of inner iterations for the Sn sweep.
    #[serde(default = "default_n_inner_sn")]
    pub n_inner_sn: usize,
    /// Homogenised XS files for the Sn sweeper, by axial range.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xs_files: Vec<XsFileConfig>,
}

fn default_n_inner() -> usize {
    5
}
fn default_n_inner_sn() -> usize {
    1
}
fn default_true() -> bool {
    true
}

impl Default for SweeperConfig {
    fn default() -> Self {
        SweeperConfig {
            kind: SweeperKind::default(),
            n_inner: default_n_inner(),
            boundary_update: BoundaryUpdate::default(),
            equation: SnEquation::default(),
            sn_fixup: true,
            negative_source: NegativeSourcePolicy::default(),
            inactive_moc: 0,
            expose_sn: false,
            sn_project: true,
            tl_splitting: true,
            n_inner_sn: default_n_inner_sn(),
            xs_files: Vec::new(),
        }
    }
}

/// Homogenised cross sections for planes `..=top_plane` not covered by a
/// lower entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XsFileConfig {
    pub top_plane: usize,
    pub file: String,
}

// ── CMFD and solvers ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmfdConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_k_tol")]
    pub k_tol: f64,
    #[serde(default = "default_psi_tol")]
    pub psi_tol: f64,
    #[serde(default = "default_cmfd_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_true")]
    pub negative_fixup: bool,
    /// Wielandt shift added to k; non-positive disables shifting.
    #[serde(default = "default_shift")]
    pub wielandt_shift: f64,
    #[serde(default = "default_krylov_tol")]
    pub krylov_tol: f64,
    #[serde(default = "default_krylov_restart")]
    pub krylov_restart: usize,
    #[serde(default = "default_krylov_max_iter")]
    pub krylov_max_iter: usize,
}

fn default_k_tol() -> f64 {
    1.0e-6
}
fn default_psi_tol() -> f64 {
    1.0e-5
}
fn default_cmfd_max_iter() -> usize {
    100
}
fn default_shift() -> f64 {
    1.0
}
fn default_krylov_tol() -> f64 {
    1.0e-10
}
fn default_krylov_restart() -> usize {
    30
}
fn default_krylov_max_iter() -> usize {
    300
}

impl Default for CmfdConfig {
    fn default() -> Self {
        CmfdConfig {
            enabled: true,
            k_tol: default_k_tol(),
            psi_tol: default_psi_tol(),
            max_iter: default_cmfd_max_iter(),
            negative_fixup: true,
            wielandt_shift: default_shift(),
            krylov_tol: default_krylov_tol(),
            krylov_restart: default_krylov_restart(),
            krylov_max_iter: default_krylov_max_iter(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    #[default]
    Eigenvalue,
    FixedSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(rename = "type", default)]
    pub kind: SolverKind,
    #[serde(default = "default_k_tol")]
    pub k_tol: f64,
    #[serde(default = "default_psi_tol")]
    pub psi_tol: f64,
    /// Fixed-source convergence on the relative flux change.
    #[serde(default = "default_flux_tol")]
    pub flux_tol: f64,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default)]
    pub min_iter: usize,
    /// Fail the run when tolerances are not met within `max_iter`.
    #[serde(default)]
    pub require_convergence: bool,
}

fn default_flux_tol() -> f64 {
    1.0e-6
}
fn default_max_iter() -> usize {
    1000
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            kind: SolverKind::default(),
            k_tol: default_k_tol(),
            psi_tol: default_psi_tol(),
            flux_tol: default_flux_tol(),
            max_iter: default_max_iter(),
            min_iter: 0,
            require_convergence: false,
        }
    }
}

/// Volumetric isotropic source strength per material and group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub materials: Vec<MaterialSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialSource {
    pub material: u32,
    /// n/cm³/s per group.
    pub strength: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// Base path of the result files; defaults to the case file stem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Also write a Python/Cairo script drawing the pin meshes.
    #[serde(default)]
    pub draw_geometry: bool,
}

impl CaseConfig {
    /// Load a case from a JSON file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> TransportResult<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| TransportError::file(path, e))?;
        let mut config: Self = serde_json::from_str(&contents)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Resolve a path found inside the case against the case directory.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        let p = Path::new(relative);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }

    /// Structural checks that do not need the geometry to be built.
    pub fn validate(&self) -> TransportResult<()> {
        check_unique("mesh", self.meshes.iter().map(MeshConfig::id))?;
        check_unique("pin", self.pins.iter().map(|p| p.id))?;
        check_unique("lattice", self.lattices.iter().map(|l| l.id))?;
        check_unique("assembly", self.assemblies.iter().map(|a| a.id))?;
        check_unique(
            "material",
            self.material_lib.materials.iter().map(|m| m.id),
        )?;

        for mesh in &self.meshes {
            if mesh.pitch() <= 0.0 {
                return Err(TransportError::config(format!(
                    "Mesh {} has non-positive pitch",
                    mesh.id()
                )));
            }
        }
        for lat in &self.lattices {
            if lat.pins.len() != lat.nx * lat.ny {
                return Err(TransportError::config(format!(
                    "Lattice {} lists {} pins, expected {}x{}",
                    lat.id,
                    lat.pins.len(),
                    lat.nx,
                    lat.ny
                )));
            }
        }
        for asy in &self.assemblies {
            if asy.np == 0 {
                return Err(TransportError::config(format!(
                    "Assembly {} has no planes",
                    asy.id
                )));
            }
            let n_lat: usize = asy.lattices.iter().map(|g| g.ids().len()).sum();
            if n_lat != asy.np {
                return Err(TransportError::config(format!(
                    "Assembly {} lists {} lattices for {} planes",
                    asy.id, n_lat, asy.np
                )));
            }
            if let HeightSpec::PerPlane(hz) = &asy.hz {
                if hz.len() != asy.np {
                    return Err(TransportError::config(format!(
                        "Assembly {} lists {} plane heights for {} planes",
                        asy.id,
                        hz.len(),
                        asy.np
                    )));
                }
            }
        }
        if self.core.assemblies.len() != self.core.nx * self.core.ny {
            return Err(TransportError::config(format!(
                "Core lists {} assemblies, expected {}x{}",
                self.core.assemblies.len(),
                self.core.nx,
                self.core.ny
            )));
        }
        if self.rays.spacing <= 0.0 {
            return Err(TransportError::config("Ray spacing must be positive"));
        }
        if self.sweeper.n_inner == 0 {
            return Err(TransportError::config(
                "Sweeper needs at least one inner iteration",
            ));
        }
        if self.cmfd.k_tol <= 0.0 || self.cmfd.psi_tol <= 0.0 {
            return Err(TransportError::config("CMFD tolerances must be positive"));
        }
        if self.solver.k_tol <= 0.0 || self.solver.psi_tol <= 0.0 {
            return Err(TransportError::config(
                "Solver tolerances must be positive",
            ));
        }
        if self.sweeper.kind == SweeperKind::TwoDThreeD && !self.cmfd.enabled {
            return Err(TransportError::config(
                "The 2D3D sweeper requires CMFD to be enabled",
            ));
        }
        if self.solver.kind == SolverKind::FixedSource && self.source.is_none() {
            return Err(TransportError::config(
                "Fixed-source problems need a `source` entry",
            ));
        }
        Ok(())
    }
}

fn check_unique(kind: &str, ids: impl Iterator<Item = u32>) -> TransportResult<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(TransportError::config(format!(
                "Duplicate {kind} id {id}"
            )));
        }
    }
    Ok(())
}
