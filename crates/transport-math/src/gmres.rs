// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — GMRES
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Restarted GMRES(m) Krylov subspace solver for sparse coarse-mesh
//! diffusion systems.
//!
//! GMRES (Generalised Minimal RESidual) builds an orthonormal Krylov
//! basis via Arnoldi iteration with modified Gram-Schmidt, then solves
//! the projected least-squares problem using Givens rotations on the
//! upper Hessenberg matrix.  When the basis reaches size `m` without
//! convergence the solver restarts from the current approximate
//! solution.
//!
//! A left-preconditioner is applied: instead of solving `A x = b`, we
//! solve `M⁻¹ A x = M⁻¹ b`, where `M⁻¹` is approximated by a few
//! damped Jacobi sweeps on the [`CsrMatrix`] diagonal.

use transport_types::error::{TransportError, TransportResult};

use crate::sparse::CsrMatrix;

// ───────────────────────────── configuration ─────────────────────────

/// Configuration for the GMRES(m) solver.
#[derive(Debug, Clone)]
pub struct GmresConfig {
    /// Krylov subspace dimension before restart (default: 30).
    pub restart: usize,
    /// Maximum number of outer (restart) iterations (default: 100).
    pub max_iter: usize,
    /// Convergence tolerance on the relative residual norm (default: 1e-8).
    pub tol: f64,
    /// Number of Jacobi sweeps used by the left preconditioner (default: 1).
    pub precond_sweeps: usize,
    /// Jacobi damping factor for the preconditioner (default: 1.0).
    pub precond_omega: f64,
}

impl Default for GmresConfig {
    fn default() -> Self {
        GmresConfig {
            restart: 30,
            max_iter: 100,
            tol: 1e-8,
            precond_sweeps: 1,
            precond_omega: 1.0,
        }
    }
}

/// Result of a GMRES solve.
#[derive(Debug, Clone)]
pub struct GmresResult {
    /// Total number of matrix-vector products (inner iterations summed
    /// over all restarts).
    pub iterations: usize,
    /// Final L2 residual norm.
    pub residual: f64,
    /// Whether convergence was achieved.
    pub converged: bool,
}

// ───────────────────────── BLAS-like helpers ─────────────────────────

/// Euclidean (L2) norm of a slice.
#[inline]
pub fn vec_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Dot product.
#[inline]
pub fn vec_dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// `y = y + alpha * x` (axpy).
#[inline]
fn vec_axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi += alpha * xi;
    }
}

/// `y = alpha * x` (scale-copy).
#[inline]
fn vec_scale(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, &xi) in y.iter_mut().zip(x.iter()) {
        *yi = alpha * xi;
    }
}

/// `out = a - b`.
#[inline]
fn vec_sub(a: &[f64], b: &[f64], out: &mut [f64]) {
    for ((oi, &ai), &bi) in out.iter_mut().zip(a.iter()).zip(b.iter()) {
        *oi = ai - bi;
    }
}

// ────────────────────────── Jacobi preconditioner ────────────────────

/// Approximately solve `A z = r` with damped Jacobi sweeps from zero.
fn precondition(
    a: &CsrMatrix,
    r: &[f64],
    sweeps: usize,
    omega: f64,
    scratch: &mut [f64],
) -> Vec<f64> {
    let n = a.n();
    let mut z: Vec<f64> = (0..n).map(|i| omega * r[i] / a.diag(i)).collect();
    for _ in 1..sweeps {
        a.matvec(&z, scratch);
        for i in 0..n {
            z[i] += omega * (r[i] - scratch[i]) / a.diag(i);
        }
    }
    z
}

// ───────────────────── Givens rotation helpers ──────────────────────

/// A single Givens rotation storing (c, s) such that
/// ```text
/// | c  s | | a |   | r |
/// |-s  c | | b | = | 0 |
/// ```
#[derive(Clone, Copy)]
struct GivensRotation {
    c: f64,
    s: f64,
}

impl GivensRotation {
    /// Compute the rotation that zeroes `b` in (a, b).
    fn compute(a: f64, b: f64) -> Self {
        if b.abs() < 1e-300 {
            GivensRotation { c: 1.0, s: 0.0 }
        } else if b.abs() > a.abs() {
            let tau = -a / b;
            let s = 1.0 / (1.0 + tau * tau).sqrt();
            let c = s * tau;
            GivensRotation { c, s }
        } else {
            let tau = -b / a;
            let c = 1.0 / (1.0 + tau * tau).sqrt();
            let s = c * tau;
            GivensRotation { c, s }
        }
    }

    /// Apply this rotation to (a, b) in place.
    #[inline]
    fn apply(&self, a: &mut f64, b: &mut f64) {
        let ta = *a;
        let tb = *b;
        *a = self.c * ta - self.s * tb;
        *b = self.s * ta + self.c * tb;
    }
}

// ─────────────────────────── main solver ─────────────────────────────

/// Solve `A x = b` using restarted GMRES(m) with a left Jacobi
/// preconditioner.
///
/// `x` is the initial guess on entry and the solution on exit. The
/// tolerance is relative to `‖b‖`, so a converged warm start returns
/// without any Krylov iterations.
pub fn gmres_solve(
    a: &CsrMatrix,
    b: &[f64],
    x: &mut [f64],
    config: &GmresConfig,
) -> TransportResult<GmresResult> {
    let n = a.n();
    if b.len() != n || x.len() != n {
        return Err(TransportError::linalg(format!(
            "GMRES dimension mismatch: matrix {n}, rhs {}, solution {}",
            b.len(),
            x.len()
        )));
    }
    if let Some(i) = (0..n).find(|&i| a.diag(i).abs() < 1e-300) {
        return Err(TransportError::linalg(format!(
            "Zero diagonal in row {i}; Jacobi preconditioner undefined"
        )));
    }

    if n == 0 {
        return Ok(GmresResult {
            iterations: 0,
            residual: 0.0,
            converged: true,
        });
    }

    let m = config.restart.min(n).max(1); // Krylov dimension cannot exceed n

    let mut av = vec![0.0; n];
    let mut scratch = vec![0.0; n];
    let mut r = vec![0.0; n];

    let mut total_iters: usize = 0;

    let abs_tol = config.tol * vec_norm(b);

    a.matvec(x, &mut av);
    vec_sub(b, &av, &mut r);
    let initial_res_norm = vec_norm(&r);
    if initial_res_norm <= abs_tol {
        return Ok(GmresResult {
            iterations: 0,
            residual: initial_res_norm,
            converged: true,
        });
    }

    // ───── outer restart loop ─────
    for _restart in 0..config.max_iter {
        a.matvec(x, &mut av);
        vec_sub(b, &av, &mut r);

        let z = precondition(a, &r, config.precond_sweeps, config.precond_omega, &mut scratch);

        let beta = vec_norm(&z);
        if beta < 1e-300 {
            let residual = vec_norm(&r);
            return Ok(GmresResult {
                iterations: total_iters,
                residual,
                converged: residual <= abs_tol,
            });
        }

        // Krylov basis V[0..m+1], each of length n
        let mut v_basis: Vec<Vec<f64>> = Vec::with_capacity(m + 1);
        {
            let mut v0 = vec![0.0; n];
            vec_scale(1.0 / beta, &z, &mut v0);
            v_basis.push(v0);
        }

        // Upper Hessenberg matrix H[(m+1) x m] stored column-major
        // H[i][j] => h_store[j * (m+1) + i]
        let h_rows = m + 1;
        let mut h_store = vec![0.0; h_rows * m];
        let mut givens: Vec<GivensRotation> = Vec::with_capacity(m);

        // Right-hand side of the Hessenberg least-squares: g = beta * e_1
        let mut g = vec![0.0; m + 1];
        g[0] = beta;

        let mut inner_iters: usize = 0;

        // ───── Arnoldi iteration ─────
        for j in 0..m {
            inner_iters = j + 1;
            total_iters += 1;

            a.matvec(&v_basis[j], &mut av);
            let mut w = precondition(
                a,
                &av,
                config.precond_sweeps,
                config.precond_omega,
                &mut scratch,
            );

            // Modified Gram-Schmidt orthogonalisation
            for (i, vi) in v_basis.iter().enumerate().take(j + 1) {
                let h_ij = vec_dot(&w, vi);
                h_store[j * h_rows + i] = h_ij;
                vec_axpy(-h_ij, vi, &mut w);
            }

            let h_jp1_j = vec_norm(&w);
            h_store[j * h_rows + (j + 1)] = h_jp1_j;

            if h_jp1_j > 1e-300 {
                let mut vj1 = vec![0.0; n];
                vec_scale(1.0 / h_jp1_j, &w, &mut vj1);
                v_basis.push(vj1);
            } else {
                v_basis.push(vec![0.0; n]);
            }

            // Apply all previous Givens rotations to column j of H
            for (i, rot) in givens.iter().enumerate() {
                let a_ptr = j * h_rows + i;
                let b_ptr = j * h_rows + i + 1;
                let mut ha = h_store[a_ptr];
                let mut hb = h_store[b_ptr];
                rot.apply(&mut ha, &mut hb);
                h_store[a_ptr] = ha;
                h_store[b_ptr] = hb;
            }

            let rot =
                GivensRotation::compute(h_store[j * h_rows + j], h_store[j * h_rows + (j + 1)]);
            {
                let a_ptr = j * h_rows + j;
                let b_ptr = j * h_rows + (j + 1);
                let mut ha = h_store[a_ptr];
                let mut hb = h_store[b_ptr];
                rot.apply(&mut ha, &mut hb);
                h_store[a_ptr] = ha;
                h_store[b_ptr] = hb;
            }
            {
                let mut ga = g[j];
                let mut gb = g[j + 1];
                rot.apply(&mut ga, &mut gb);
                g[j] = ga;
                g[j + 1] = gb;
            }
            givens.push(rot);

            // |g[j+1]| is the preconditioned residual; the true
            // residual decides convergence after the update.
            if g[j + 1].abs() < config.tol * beta {
                break;
            }

            // Happy breakdown: can't extend Krylov space
            if h_jp1_j < 1e-300 {
                break;
            }
        }

        // ───── back-substitution for H y = g ─────
        let k = inner_iters;
        let mut y = vec![0.0; k];
        for i in (0..k).rev() {
            let mut sum = g[i];
            for jj in (i + 1)..k {
                sum -= h_store[jj * h_rows + i] * y[jj];
            }
            let diag = h_store[i * h_rows + i];
            y[i] = if diag.abs() > 1e-300 { sum / diag } else { 0.0 };
        }

        // ───── update solution: x = x + V * y ─────
        for (i, yi) in y.iter().enumerate() {
            vec_axpy(*yi, &v_basis[i], x);
        }

        a.matvec(x, &mut av);
        vec_sub(b, &av, &mut r);
        let residual = vec_norm(&r);
        if residual <= abs_tol {
            return Ok(GmresResult {
                iterations: total_iters,
                residual,
                converged: true,
            });
        }
    }

    // Exhausted restarts, report the true residual
    a.matvec(x, &mut av);
    vec_sub(b, &av, &mut r);
    let residual = vec_norm(&r);

    Ok(GmresResult {
        iterations: total_iters,
        residual,
        converged: residual <= abs_tol,
    })
}

// ═══════════════════════════════ tests ═══════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    /// 2D five-point Laplacian plus a removal term on an n×n grid.
    fn diffusion_matrix(n: usize, removal: f64) -> CsrMatrix {
        let idx = |i: usize, j: usize| j * n + i;
        let mut pattern = Vec::new();
        for j in 0..n {
            for i in 0..n {
                if i + 1 < n {
                    pattern.push((idx(i, j), idx(i + 1, j)));
                    pattern.push((idx(i + 1, j), idx(i, j)));
                }
                if j + 1 < n {
                    pattern.push((idx(i, j), idx(i, j + 1)));
                    pattern.push((idx(i, j + 1), idx(i, j)));
                }
            }
        }
        let mut a = CsrMatrix::from_pattern(n * n, &pattern).unwrap();
        for j in 0..n {
            for i in 0..n {
                let c = idx(i, j);
                a.add_diag(c, removal);
                for (ni, nj, ok) in [
                    (i.wrapping_sub(1), j, i > 0),
                    (i + 1, j, i + 1 < n),
                    (i, j.wrapping_sub(1), j > 0),
                    (i, j + 1, j + 1 < n),
                ] {
                    if ok {
                        a.add_diag(c, 1.0);
                        a.add(c, idx(ni, nj), -1.0).unwrap();
                    }
                }
            }
        }
        a
    }

    #[test]
    fn test_gmres_convergence_16() {
        let a = diffusion_matrix(16, 0.1);
        let b = vec![1.0; 256];
        let mut x = vec![0.0; 256];

        let result = gmres_solve(&a, &b, &mut x, &GmresConfig::default()).unwrap();

        assert!(
            result.converged,
            "GMRES should converge on 16x16: residual = {}, iters = {}",
            result.residual, result.iterations
        );
        // Reflective Laplacian: the exact solution is uniform 1/removal.
        for (i, v) in x.iter().enumerate() {
            assert!((v - 10.0).abs() < 1e-5, "x[{}] = {}", i, v);
        }
    }

    #[test]
    fn test_gmres_matches_direct_small() {
        let a = diffusion_matrix(3, 0.5);
        let b: Vec<f64> = (0..9).map(|i| 1.0 + i as f64).collect();
        let mut x = vec![0.0; 9];
        let config = GmresConfig {
            tol: 1e-12,
            ..GmresConfig::default()
        };
        let result = gmres_solve(&a, &b, &mut x, &config).unwrap();
        assert!(result.converged);

        let mut ax = vec![0.0; 9];
        a.matvec(&x, &mut ax);
        for i in 0..9 {
            assert!(
                (ax[i] - b[i]).abs() < 1e-9,
                "row {}: Ax = {}, b = {}",
                i,
                ax[i],
                b[i]
            );
        }
    }

    #[test]
    fn test_gmres_zero_rhs() {
        let a = diffusion_matrix(4, 1.0);
        let b = vec![0.0; 16];
        let mut x = vec![0.0; 16];

        let result = gmres_solve(&a, &b, &mut x, &GmresConfig::default()).unwrap();

        let max_val = x.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        assert!(max_val < 1e-14, "Zero rhs should give zero solution: max = {}", max_val);
        assert!(result.converged, "Zero rhs should converge immediately");
        assert_eq!(result.iterations, 0);
    }

    #[test]
    fn test_gmres_warm_start_reduces_work() {
        let a = diffusion_matrix(12, 0.2);
        let b: Vec<f64> = (0..144).map(|i| (i % 7) as f64).collect();
        let mut x = vec![0.0; 144];
        let cold = gmres_solve(&a, &b, &mut x, &GmresConfig::default()).unwrap();
        let warm = gmres_solve(&a, &b, &mut x, &GmresConfig::default()).unwrap();
        assert!(cold.converged);
        assert!(
            warm.iterations <= cold.iterations,
            "warm {} vs cold {}",
            warm.iterations,
            cold.iterations
        );
    }

    #[test]
    fn test_gmres_rejects_bad_input() {
        let a = diffusion_matrix(2, 1.0);
        let mut x = vec![0.0; 3];
        assert!(gmres_solve(&a, &[1.0; 4], &mut x, &GmresConfig::default()).is_err());

        let singular = CsrMatrix::from_pattern(2, &[]).unwrap();
        let mut x = vec![0.0; 2];
        assert!(gmres_solve(&singular, &[1.0, 1.0], &mut x, &GmresConfig::default()).is_err());
    }
}
