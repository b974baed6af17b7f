// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Eigenvalue Solver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Power iteration for k-effective with optional CMFD acceleration.
//!
//! Each outer iteration:
//!
//! 1. CMFD (when enabled) solves the coarse eigenproblem, updates k and
//!    rescales the transport flux pin by pin. A diverged or non-finite
//!    CMFD result is discarded and the outer continues from transport;
//! 2. the fission source `F = νσ_f φ / k` drives one transport step;
//! 3. k is updated by the ratio of volume-integrated fission rates.
//!
//! Convergence needs both |Δk| < `k_tol` and a relative change of the
//! normalised fission source below `psi_tol`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ndarray::Array2;
use transport_types::config::{CaseConfig, SolverConfig};
use transport_types::error::{TransportError, TransportResult};

use crate::cmfd::{Cmfd, CmfdOutcome};
use crate::fixed_source::FixedSourceSolver;
use crate::sweeper::Sweeper;

#[derive(Debug, Clone, PartialEq)]
pub struct EigenResult {
    pub k: f64,
    pub iterations: usize,
    pub converged: bool,
    pub k_history: Vec<f64>,
    pub psi_error_history: Vec<f64>,
    /// CMFD iterations summed over all outers.
    pub cmfd_iterations: usize,
}

pub struct EigenSolver<'a> {
    fss: FixedSourceSolver<'a>,
    cmfd: Option<Cmfd<'a>>,
    config: SolverConfig,
    k: f64,
    cancel: Arc<AtomicBool>,
}

impl<'a> EigenSolver<'a> {
    pub fn new(sweeper: Sweeper<'a>, config: &CaseConfig) -> TransportResult<Self> {
        let cmfd = if config.cmfd.enabled {
            let coarse = sweeper.mesh().coarse();
            Some(Cmfd::new(coarse, &config.cmfd, sweeper.n_group())?)
        } else {
            None
        };
        Ok(EigenSolver {
            fss: FixedSourceSolver::new(sweeper, &config.solver),
            cmfd,
            config: config.solver.clone(),
            k: 1.0,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag polled between outer iterations; setting it stops the solve.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    pub fn sweeper(&self) -> &Sweeper<'a> {
        self.fss.sweeper()
    }

    pub fn initialize(&mut self) {
        self.fss.initialize();
        self.k = 1.0;
    }

    pub fn solve(&mut self) -> TransportResult<EigenResult> {
        self.initialize();
        let volumes = self.fss.sweeper().volumes();
        let total = |fs: &[f64]| -> f64 { fs.iter().zip(volumes).map(|(f, v)| f * v).sum() };

        let mut k_history = Vec::new();
        let mut psi_history = Vec::new();
        let mut cmfd_iterations = 0;
        let mut converged = false;
        let mut iterations = 0;
        let mut last_dk = f64::NAN;

        for it in 1..=self.config.max_iter {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(TransportError::NotConverged {
                    iterations,
                    message: format!("cancelled at k = {:.8}", self.k),
                });
            }
            iterations = it;
            let k_old = self.k;
            self.fss.sweeper_mut().start_outer();

            if let Some(cmfd) = self.cmfd.as_mut() {
                let sweeper = self.fss.sweeper_mut();
                if let Some((data, xs)) = sweeper.prepare_coarse() {
                    let current = data.current.clone();
                    let outcome = cmfd.solve(self.k, data, xs)?;
                    cmfd_iterations += outcome.iterations;
                    if outcome.iterations > 0 {
                        if cmfd_consistent(self.k, &outcome, &data.flux) {
                            self.k = outcome.k;
                            sweeper.project_coarse();
                        } else {
                            log::warn!(
                                "Outer {it}: discarding CMFD update (k = {:.6e}, converged = {}), keeping k = {:.8}",
                                outcome.k,
                                outcome.converged,
                                self.k
                            );
                            data.current.assign(&current);
                            data.flux.assign(&data.old_flux);
                        }
                    }
                }
            }

            let fs_old = self.fss.sweeper().fission_rate();
            let f_old = total(&fs_old);
            if f_old.is_nan() || f_old <= 0.0 {
                return Err(TransportError::config(
                    "Eigenvalue solve without any fission source",
                ));
            }
            let scaled: Vec<f64> = fs_old.iter().map(|f| f / self.k).collect();
            self.fss.step(Some(&scaled))?;

            let fs_new = self.fss.sweeper().fission_rate();
            let f_new = total(&fs_new);
            if !f_new.is_finite() || f_new <= 0.0 {
                return Err(TransportError::numeric(format!(
                    "Outer {it}: fission source collapsed ({f_new:e})"
                )));
            }
            self.k *= f_new / f_old;

            let psi_err = normalized_change(&fs_old, f_old, &fs_new, f_new);
            let dk = (self.k - k_old).abs();
            last_dk = dk;
            k_history.push(self.k);
            psi_history.push(psi_err);
            log::info!("Outer {it:4}: k = {:.8}  Δk = {dk:.3e}  ΔF = {psi_err:.3e}", self.k);

            if it >= self.config.min_iter && dk < self.config.k_tol && psi_err < self.config.psi_tol {
                converged = true;
                break;
            }
        }

        if converged {
            log::info!("Converged in {iterations} outer iterations, k = {:.8}", self.k);
        } else {
            let message = format!(
                "k = {:.8}, Δk = {last_dk:.3e}, ΔF = {:.3e}",
                self.k,
                psi_history.last().copied().unwrap_or(f64::NAN)
            );
            if self.config.require_convergence {
                return Err(TransportError::NotConverged { iterations, message });
            }
            log::warn!("Not converged after {iterations} outer iterations: {message}");
        }

        Ok(EigenResult {
            k: self.k,
            iterations,
            converged,
            k_history,
            psi_error_history: psi_history,
            cmfd_iterations,
        })
    }
}

/// Whether a CMFD result may replace the transport k and flux: finite,
/// positive and either converged or within half of `k`.
fn cmfd_consistent(k: f64, outcome: &CmfdOutcome, flux: &Array2<f64>) -> bool {
    let k_ok = outcome.k.is_finite() && outcome.k > 0.0;
    let flux_ok = flux.iter().all(|f| f.is_finite() && *f >= 0.0);
    k_ok && flux_ok && (outcome.converged || (outcome.k / k - 1.0).abs() < 0.5)
}

/// Relative L2 change between two fission sources, each normalised to
/// unit integral.
fn normalized_change(old: &[f64], old_total: f64, new: &[f64], new_total: f64) -> f64 {
    let mut diff = 0.0;
    let mut norm = 0.0;
    for (o, n) in old.iter().zip(new) {
        let (o, n) = (o / old_total, n / new_total);
        diff += (n - o) * (n - o);
        norm += n * n;
    }
    if norm > 0.0 {
        (diff / norm).sqrt()
    } else {
        0.0
    }
}

// ═══════════════════════════════ tests ═══════════════════════════════
