use log::debug;
use sprs::CsMat;

use super::preconditioner::{IdentityPreconditioner, JacobiPreconditioner, Preconditioner};
use super::residual::mat_vec;
use super::solver::{dot, norm, zero_rhs_stats, Solver, SolverStats};

/// Preconditioned Conjugate Gradient for symmetric positive definite systems
pub struct ConjugateGradient {
    max_iterations: usize,
    tolerance: f64,
    abs_tolerance: f64,
    use_preconditioner: bool,
    name: String,
}

impl ConjugateGradient {
    pub fn new() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-8,
            abs_tolerance: 1e-12,
            use_preconditioner: true,
            name: "ConjugateGradient".to_string(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_abs_tolerance(mut self, abs_tolerance: f64) -> Self {
        self.abs_tolerance = abs_tolerance;
        self
    }

    pub fn with_preconditioner(mut self, use_precond: bool) -> Self {
        self.use_preconditioner = use_precond;
        self
    }

    fn solve_preconditioned<P: Preconditioner>(
        &self,
        a: &CsMat<f64>,
        b: &[f64],
        precond: &P,
    ) -> (Vec<f64>, SolverStats) {
        let n = b.len();
        let b_norm = norm(b);

        if b_norm < 1e-25 {
            return (vec![0.0; n], zero_rhs_stats());
        }

        let mut x = vec![0.0; n];
        let mut r = b.to_vec();
        let mut z = precond.apply(&r);
        let mut p = z.clone();
        let mut rz = dot(&r, &z);

        let mut iteration = 0;
        let mut converged = false;
        let mut final_res = b_norm;

        while iteration < self.max_iterations {
            let ap = mat_vec(a, &p);
            let p_ap = dot(&p, &ap);

            if p_ap.abs() < 1e-30 {
                break;
            }
            let alpha = rz / p_ap;

            for i in 0..n {
                x[i] += alpha * p[i];
                r[i] -= alpha * ap[i];
            }
            iteration += 1;

            final_res = norm(&r);
            if final_res < self.tolerance * b_norm || final_res < self.abs_tolerance {
                converged = true;
                break;
            }

            z = precond.apply(&r);
            let rz_new = dot(&r, &z);
            let beta = rz_new / rz;
            rz = rz_new;

            for i in 0..n {
                p[i] = z[i] + beta * p[i];
            }
        }

        debug!(
            "{}: {} iterations, ||r|| = {:.3e}, converged = {}",
            self.name, iteration, final_res, converged
        );

        (
            x,
            SolverStats {
                iterations: iteration,
                residual_norm: final_res,
                relative_residual: final_res / b_norm,
                converged,
            },
        )
    }
}

impl Solver for ConjugateGradient {
    fn solve(&mut self, a: &CsMat<f64>, b: &[f64]) -> (Vec<f64>, SolverStats) {
        if self.use_preconditioner {
            self.solve_preconditioned(a, b, &JacobiPreconditioner::new(a))
        } else {
            self.solve_preconditioned(a, b, &IdentityPreconditioner)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn abs_tolerance(&self) -> f64 {
        self.abs_tolerance
    }

    fn set_abs_tolerance(&mut self, tolerance: f64) {
        self.abs_tolerance = tolerance;
    }

    fn tolerance(&self) -> f64 {
        self.tolerance
    }

    fn set_tolerance(&mut self, tolerance: f64) {
        self.tolerance = tolerance;
    }
}

/// Right-preconditioned BiCGSTAB for general nonsymmetric systems
pub struct BiCGSTAB {
    max_iterations: usize,
    tolerance: f64,
    abs_tolerance: f64,
    use_preconditioner: bool,
    name: String,
}

impl BiCGSTAB {
    pub fn new() -> Self {
        Self {
            max_iterations: 1000,
            tolerance: 1e-8,
            abs_tolerance: 1e-12,
            use_preconditioner: true,
            name: "BiCGSTAB".to_string(),
        }
    }

    pub fn with_max_iterations(mut self, max_iter: usize) -> Self { self.max_iterations = max_iter; self }
    pub fn with_tolerance(mut self, tol: f64) -> Self { self.tolerance = tol; self }
    pub fn with_abs_tolerance(mut self, abs_tol: f64) -> Self { self.abs_tolerance = abs_tol; self }
    pub fn with_preconditioner(mut self, use_precond: bool) -> Self { self.use_preconditioner = use_precond; self }

    fn solve_preconditioned<P: Preconditioner>(
        &self,
        a: &CsMat<f64>,
        b: &[f64],
        precond: &P,
    ) -> (Vec<f64>, SolverStats) {
        let n = b.len();
        let b_norm = norm(b);

        if b_norm < 1e-25 {
            return (vec![0.0; n], zero_rhs_stats());
        }

        let mut x = vec![0.0; n];
        let mut r = b.to_vec();
        let r_hat = r.clone();

        let mut rho = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;
        let mut v = vec![0.0; n];
        let mut p = vec![0.0; n];

        let mut iteration = 0;
        let mut converged = false;
        let mut final_res = b_norm;

        while iteration < self.max_iterations {
            let rho_prev = rho;
            rho = dot(&r_hat, &r);
            if rho.abs() < 1e-40 { break; }

            if iteration == 0 {
                p.copy_from_slice(&r);
            } else {
                let beta = (rho / rho_prev) * (alpha / omega);
                for i in 0..n {
                    p[i] = r[i] + beta * (p[i] - omega * v[i]);
                }
            }

            let p_hat = precond.apply(&p);
            v = mat_vec(a, &p_hat);

            let rhat_v = dot(&r_hat, &v);
            if rhat_v.abs() < 1e-40 { break; }
            alpha = rho / rhat_v;

            let s: Vec<f64> = r.iter().zip(v.iter()).map(|(&ri, &vi)| ri - alpha * vi).collect();
            iteration += 1;

            let s_norm = norm(&s);
            if s_norm < self.tolerance * b_norm || s_norm < self.abs_tolerance {
                for i in 0..n { x[i] += alpha * p_hat[i]; }
                final_res = s_norm;
                converged = true;
                break;
            }

            let s_hat = precond.apply(&s);
            let t = mat_vec(a, &s_hat);

            let t_t = dot(&t, &t);
            if t_t.abs() < 1e-40 { break; }
            omega = dot(&t, &s) / t_t;

            for i in 0..n {
                x[i] += alpha * p_hat[i] + omega * s_hat[i];
                r[i] = s[i] - omega * t[i];
            }

            final_res = norm(&r);
            if final_res < self.tolerance * b_norm || final_res < self.abs_tolerance {
                converged = true;
                break;
            }
            if omega.abs() < 1e-40 { break; }
        }

        debug!(
            "{}: {} iterations, ||r|| = {:.3e}, converged = {}",
            self.name, iteration, final_res, converged
        );

        (
            x,
            SolverStats {
                iterations: iteration,
                residual_norm: final_res,
                relative_residual: final_res / b_norm,
                converged,
            },
        )
    }
}

impl Solver for BiCGSTAB {
    fn solve(&mut self, a: &CsMat<f64>, b: &[f64]) -> (Vec<f64>, SolverStats) {
        if self.use_preconditioner {
            self.solve_preconditioned(a, b, &JacobiPreconditioner::new(a))
        } else {
            self.solve_preconditioned(a, b, &IdentityPreconditioner)
        }
    }

    fn name(&self) -> &str { &self.name }
    fn abs_tolerance(&self) -> f64 { self.abs_tolerance }
    fn set_abs_tolerance(&mut self, tolerance: f64) { self.abs_tolerance = tolerance; }
    fn tolerance(&self) -> f64 { self.tolerance }
    fn set_tolerance(&mut self, tolerance: f64) { self.tolerance = tolerance; }
}

impl Default for BiCGSTAB { fn default() -> Self { Self::new() } }
impl Default for ConjugateGradient { fn default() -> Self { Self::new() } }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::solver::residual_norm;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    /// 1D Laplacian with Dirichlet ends, size n
    fn laplacian(n: usize) -> CsMat<f64> {
        let mut t = TriMat::new((n, n));
        for i in 0..n {
            t.add_triplet(i, i, 2.0);
            if i > 0 {
                t.add_triplet(i, i - 1, -1.0);
            }
            if i + 1 < n {
                t.add_triplet(i, i + 1, -1.0);
            }
        }
        t.to_csr()
    }

    #[test]
    fn test_cg_laplacian() {
        let a = laplacian(20);
        let b = vec![1.0; 20];

        let mut cg = ConjugateGradient::new().with_tolerance(1e-12);
        let (x, stats) = cg.solve(&a, &b);

        assert!(stats.converged);
        assert!(residual_norm(&a, &x, &b) < 1e-9);
    }

    #[test]
    fn test_bicgstab_nonsymmetric() {
        let mut t = TriMat::new((3, 3));
        t.add_triplet(0, 0, 4.0);
        t.add_triplet(0, 1, 1.0);
        t.add_triplet(1, 0, 2.0);
        t.add_triplet(1, 1, 5.0);
        t.add_triplet(1, 2, 1.0);
        t.add_triplet(2, 1, -1.0);
        t.add_triplet(2, 2, 3.0);
        let a: CsMat<f64> = t.to_csr();
        let b = vec![1.0, 2.0, 3.0];

        let mut solver = BiCGSTAB::new().with_tolerance(1e-12);
        let (x, stats) = solver.solve(&a, &b);

        assert!(stats.converged);
        let ax = mat_vec(&a, &x);
        for i in 0..3 {
            assert_relative_eq!(ax[i], b[i], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_cg_reports_iteration_limit() {
        let a = laplacian(50);
        let b = vec![1.0; 50];

        let mut cg = ConjugateGradient::new()
            .with_preconditioner(false)
            .with_max_iterations(2)
            .with_tolerance(1e-14);
        let (_, stats) = cg.solve(&a, &b);

        assert!(!stats.converged);
        assert_eq!(stats.iterations, 2);
    }

    #[test]
    fn test_zero_rhs_returns_zero() {
        let a = laplacian(4);
        let mut cg = ConjugateGradient::new();
        let (x, stats) = cg.solve(&a, &[0.0; 4]);
        assert!(stats.converged);
        assert!(x.iter().all(|&v| v == 0.0));
    }
}
