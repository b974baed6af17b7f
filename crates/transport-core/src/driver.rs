// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Case Driver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! End-to-end run of a case: load, build the mesh and sweeper, solve,
//! write the results.

use std::path::{Path, PathBuf};
use std::time::Instant;

use transport_geom::core_mesh::CoreMesh;
use transport_types::config::{CaseConfig, SolverKind};
use transport_types::error::TransportResult;

use crate::eigen::EigenSolver;
use crate::fixed_source::FixedSourceSolver;
use crate::material::MaterialLib;
use crate::output::{output_base, with_suffix, write_geometry, ResultArrays, RunSummary};
use crate::sweeper::Sweeper;

/// Where the results of a run went.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub npz_path: PathBuf,
    pub json_path: PathBuf,
}

/// Load the case file and run it. `output` overrides the result base path.
pub fn run_case(path: impl AsRef<Path>, output: Option<&Path>) -> TransportResult<RunOutcome> {
    let path = path.as_ref();
    log::info!("Reading case {}", path.display());
    let config = CaseConfig::from_file(path)?;
    let lib = MaterialLib::from_config(&config)?;
    let base = match output {
        Some(base) => base.to_path_buf(),
        None => output_base(&config, Some(path)),
    };
    run_with_lib(&config, &lib, &base)
}

/// Run an already loaded case against `lib`, writing `<base>.npz` and
/// `<base>.json`.
pub fn run_with_lib(config: &CaseConfig, lib: &MaterialLib, base: &Path) -> TransportResult<RunOutcome> {
    let start = Instant::now();
    config.validate()?;
    let mesh = CoreMesh::from_config(config)?;
    log::info!(
        "Core mesh: {} x {} x {} pins, {} regions",
        mesh.nx(),
        mesh.ny(),
        mesh.nz(),
        mesh.n_reg()
    );
    if config.output.draw_geometry {
        write_geometry(&mesh, with_suffix(base, "_geometry.py"))?;
    }

    let sweeper = Sweeper::from_config(&mesh, lib, config)?;
    let n_group = sweeper.n_group();
    let n_reg = sweeper.n_reg();

    let (arrays, mut summary) = match config.solver.kind {
        SolverKind::Eigenvalue => {
            let mut solver = EigenSolver::new(sweeper, config)?;
            let result = solver.solve()?;
            let arrays = ResultArrays::from_sweeper(solver.sweeper(), Some(result.k), &result.k_history)?;
            let final_error = match result.k_history.as_slice() {
                [.., a, b] => (b - a).abs(),
                _ => f64::NAN,
            };
            let summary = RunSummary {
                case_name: config.case_name.clone(),
                sweeper: format!("{:?}", config.sweeper.kind),
                solver: format!("{:?}", config.solver.kind),
                n_group,
                n_reg,
                n_pin: mesh.n_pin(),
                k_eff: Some(result.k),
                iterations: result.iterations,
                converged: result.converged,
                final_error,
                error_history: result.psi_error_history,
                cmfd_iterations: result.cmfd_iterations,
                max_pin_power: 0.0,
                wall_time_s: 0.0,
            };
            (arrays, summary)
        }
        SolverKind::FixedSource => {
            let mut solver = FixedSourceSolver::new(sweeper, &config.solver);
            let result = solver.solve()?;
            let arrays = ResultArrays::from_sweeper(solver.sweeper(), None, &[])?;
            let summary = RunSummary {
                case_name: config.case_name.clone(),
                sweeper: format!("{:?}", config.sweeper.kind),
                solver: format!("{:?}", config.solver.kind),
                n_group,
                n_reg,
                n_pin: mesh.n_pin(),
                k_eff: None,
                iterations: result.iterations,
                converged: result.converged,
                final_error: result.flux_error.last().copied().unwrap_or(f64::NAN),
                error_history: result.flux_error,
                cmfd_iterations: 0,
                max_pin_power: 0.0,
                wall_time_s: 0.0,
            };
            (arrays, summary)
        }
    };

    summary.max_pin_power = arrays.pin_powers.iter().copied().fold(0.0, f64::max);
    summary.wall_time_s = start.elapsed().as_secs_f64();

    let npz_path = with_suffix(base, ".npz");
    let json_path = with_suffix(base, ".json");
    arrays.write_npz(&npz_path)?;
    summary.write(&json_path)?;
    log::info!(
        "Case '{}' done in {:.2} s (max pin power {:.4})",
        summary.case_name,
        summary.wall_time_s,
        summary.max_pin_power
    );
    Ok(RunOutcome {
        summary,
        npz_path,
        json_path,
    })
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{homogeneous_case, one_group_lib, ONE_GROUP_LIB};
    use transport_types::config::{BoundaryKind, MaterialSource, SourceConfig};

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("transport_driver_{tag}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_eigen_run_writes_results() {
        let dir = temp_dir("eigen");
        let config = homogeneous_case(2, 1, BoundaryKind::Reflect);
        let outcome = run_with_lib(&config, &one_group_lib(), &dir.join("box")).unwrap();
        assert!(outcome.npz_path.exists());
        let summary = RunSummary::read(&outcome.json_path).unwrap();
        assert!(summary.converged);
        assert!((summary.k_eff.unwrap() - 1.2).abs() < 1e-5);
        assert!((summary.max_pin_power - 1.0).abs() < 1e-6);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_fixed_source_run_has_no_eigenvalue() {
        let dir = temp_dir("fixed");
        let mut config = homogeneous_case(1, 1, BoundaryKind::Reflect);
        config.solver.kind = SolverKind::FixedSource;
        config.cmfd.enabled = false;
        config.pins[0].materials = vec![2; 4];
        config.source = Some(SourceConfig {
            materials: vec![MaterialSource { material: 2, strength: vec![1.0] }],
        });
        let outcome = run_with_lib(&config, &one_group_lib(), &dir.join("src")).unwrap();
        assert!(outcome.summary.k_eff.is_none());
        assert!(outcome.summary.converged);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_run_case_from_files() {
        let dir = temp_dir("files");
        std::fs::write(dir.join("one.xsl"), ONE_GROUP_LIB).unwrap();
        let mut config = homogeneous_case(1, 1, BoundaryKind::Reflect);
        config.material_lib.path = "one.xsl".into();
        config.material_lib.materials[0].name = "fissile".into();
        config.material_lib.materials[1].name = "absorber".into();
        config.output.draw_geometry = true;
        let case_path = dir.join("box.json");
        std::fs::write(&case_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let outcome = run_case(&case_path, None).unwrap();
        assert_eq!(outcome.npz_path, dir.join("box.npz"));
        assert!(dir.join("box_geometry.py").exists());
        std::fs::remove_dir_all(&dir).ok();
    }
}
