// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Fixed-Source Solver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! One multigroup transport step for a given fission source, and the
//! source iteration for problems driven by an external source.

use ndarray::Array2;
use transport_types::config::SolverConfig;
use transport_types::error::{TransportError, TransportResult};

use crate::sweeper::Sweeper;

#[derive(Debug, Clone, PartialEq)]
pub struct FixedSourceResult {
    pub iterations: usize,
    pub converged: bool,
    /// Relative flux change of every iteration.
    pub flux_error: Vec<f64>,
}

pub struct FixedSourceSolver<'a> {
    sweeper: Sweeper<'a>,
    config: SolverConfig,
}

impl<'a> FixedSourceSolver<'a> {
    pub fn new(sweeper: Sweeper<'a>, config: &SolverConfig) -> Self {
        FixedSourceSolver {
            sweeper,
            config: config.clone(),
        }
    }

    pub fn sweeper(&self) -> &Sweeper<'a> {
        &self.sweeper
    }

    pub fn sweeper_mut(&mut self) -> &mut Sweeper<'a> {
        &mut self.sweeper
    }

    pub fn into_sweeper(self) -> Sweeper<'a> {
        self.sweeper
    }

    /// Flat unit flux and isotropic boundary flux.
    pub fn initialize(&mut self) {
        self.sweeper.initialize();
    }

    /// Sweep every group in ascending order with the fission source `fs`
    /// (already divided by k), or without fission.
    pub fn step(&mut self, fs: Option<&[f64]>) -> TransportResult<()> {
        if let Some(fs) = fs {
            if fs.len() != self.sweeper.n_reg() {
                return Err(TransportError::numeric(format!(
                    "Fission source has {} entries, sweeper mesh has {}",
                    fs.len(),
                    self.sweeper.n_reg()
                )));
            }
        }
        for g in 0..self.sweeper.n_group() {
            self.sweeper.initialize_group(g);
            if let Some(fs) = fs {
                self.sweeper.fission(fs, g);
            }
            self.sweeper.in_scatter(g);
            self.sweeper.sweep(g)?;
        }
        Ok(())
    }

    /// Iterate [`Self::step`] until the flux settles. Fission, if any, is
    /// treated as a source with k = 1.
    pub fn solve(&mut self) -> TransportResult<FixedSourceResult> {
        if !self.sweeper.has_external_source() {
            return Err(TransportError::config(
                "Fixed-source solve requested without an external source",
            ));
        }
        self.initialize();
        let mut history = Vec::new();
        let mut converged = false;
        let mut iterations = 0;
        for it in 1..=self.config.max_iter {
            iterations = it;
            let old: Array2<f64> = self.sweeper.flux().clone();
            let fs = self.sweeper.fission_rate();
            let fissile = fs.iter().any(|&f| f > 0.0);
            self.step(fissile.then_some(fs.as_slice()))?;

            let flux = self.sweeper.flux();
            let norm = flux.iter().map(|v| v * v).sum::<f64>().sqrt();
            let diff = flux
                .iter()
                .zip(old.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt();
            let err = if norm > 0.0 { diff / norm } else { diff };
            history.push(err);
            log::info!("Source iteration {it:4}: flux change {err:.3e}");
            if it >= self.config.min_iter && err < self.config.flux_tol {
                converged = true;
                break;
            }
        }
        if !converged {
            let message = format!(
                "flux change {:.3e} above tolerance {:.1e}",
                history.last().copied().unwrap_or(f64::NAN),
                self.config.flux_tol
            );
            if self.config.require_convergence {
                return Err(TransportError::NotConverged { iterations, message });
            }
            log::warn!("Fixed-source solve stopped after {iterations} iterations: {message}");
        }
        Ok(FixedSourceResult {
            iterations,
            converged,
            flux_error: history,
        })
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{homogeneous_case, one_group_lib};
    use transport_geom::core_mesh::CoreMesh;
    use transport_types::config::{BoundaryKind, MaterialSource, SourceConfig, SweeperKind};

    #[test]
    fn test_absorber_with_source_reaches_infinite_medium_flux() {
        // absorber: σ_tr = 1, c = 0.5 → φ = S / σ_a = 2
        let mut config = homogeneous_case(2, 1, BoundaryKind::Reflect);
        config.source = Some(SourceConfig {
            materials: vec![MaterialSource { material: 2, strength: vec![1.0] }],
        });
        config.cmfd.enabled = false;
        config.pins[0].materials = vec![2; 4];
        for kind in [SweeperKind::Moc, SweeperKind::Sn] {
            config.sweeper.kind = kind;
            let mesh = CoreMesh::from_config(&config).unwrap();
            let sweeper = Sweeper::from_config(&mesh, &one_group_lib(), &config).unwrap();
            let mut solver = FixedSourceSolver::new(sweeper, &config.solver);
            let result = solver.solve().unwrap();
            assert!(result.converged, "{kind:?} did not converge");
            for &phi in solver.sweeper().flux().iter() {
                assert!((phi - 2.0).abs() < 1e-4, "{kind:?}: phi = {phi}");
            }
        }
    }

    #[test]
    fn test_missing_external_source_is_rejected() {
        let config = homogeneous_case(1, 1, BoundaryKind::Reflect);
        let mesh = CoreMesh::from_config(&config).unwrap();
        let sweeper = Sweeper::from_config(&mesh, &one_group_lib(), &config).unwrap();
        let mut solver = FixedSourceSolver::new(sweeper, &config.solver);
        assert!(matches!(solver.solve(), Err(TransportError::Config { .. })));
    }

    #[test]
    fn test_step_checks_fission_source_length() {
        let config = homogeneous_case(1, 1, BoundaryKind::Reflect);
        let mesh = CoreMesh::from_config(&config).unwrap();
        let sweeper = Sweeper::from_config(&mesh, &one_group_lib(), &config).unwrap();
        let mut solver = FixedSourceSolver::new(sweeper, &config.solver);
        solver.initialize();
        assert!(solver.step(Some(&[1.0])).is_err());
        let fs = vec![0.0; mesh.n_reg()];
        assert!(solver.step(Some(&fs)).is_ok());
    }
}
