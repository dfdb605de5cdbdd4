use log::info;

use super::options::NonlinearSolverConfig;
use super::residual::{eliminate_constrained, NonlinearOperator};
use super::solver::{norm, Solver};
use crate::error::{Result, SolverError};

/// Newton iteration state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewtonState {
    Evaluating,
    Converged,
    MaxIterationsExceeded,
    LinearSolveFailed,
}

/// Statistics of a converged Newton solve
#[derive(Debug, Clone, Default)]
pub struct NewtonStats {
    /// Residual evaluations performed, counting the initial one
    pub iterations: usize,
    pub linear_solves: usize,
    pub linear_iterations: usize,
    pub initial_norm: f64,
    pub residual_norm: f64,
}

/// Newton-Raphson solver with essential-dof elimination
///
/// Iteration `k` evaluates the residual at the current iterate and checks
/// `||r|| <= max(rel_tol * ||r0||, abs_tol)`. If that fails and the budget
/// allows another iteration, the Jacobian is formed, constrained rows and
/// columns are replaced by identity, and the correction is applied. A zero
/// residual converges immediately without a linear solve.
pub struct NewtonSolver {
    config: NonlinearSolverConfig,
    linear_solver: Box<dyn Solver + Send>,
    state: NewtonState,
}

impl NewtonSolver {
    pub fn new(config: NonlinearSolverConfig) -> Result<Self> {
        config.validate()?;
        let linear_solver = config.linear.build();
        Ok(Self {
            config,
            linear_solver,
            state: NewtonState::Evaluating,
        })
    }

    pub fn config(&self) -> &NonlinearSolverConfig {
        &self.config
    }

    /// State reached by the most recent solve
    pub fn state(&self) -> NewtonState {
        self.state
    }

    /// Solve `op(x) = 0` in place, starting from the given `x`
    ///
    /// On failure `x` holds the last iterate, which callers must not commit.
    pub fn solve<O>(&mut self, op: &mut O, x: &mut [f64]) -> std::result::Result<NewtonStats, SolverError>
    where
        O: NonlinearOperator + ?Sized,
    {
        assert_eq!(x.len(), op.size(), "Newton iterate has the wrong size");

        let mut constrained = vec![false; x.len()];
        for &dof in op.constrained_dofs() {
            constrained[dof] = true;
        }

        let rel_tol = self.config.rel_tol;
        let abs_tol = self.config.abs_tol;
        let max_iterations = self.config.max_iterations;
        let print_level = self.config.print_level;

        self.state = NewtonState::Evaluating;
        let mut initial_norm = 0.0;
        let mut residual_norm;
        let mut linear_solves = 0;
        let mut linear_iterations = 0;
        let mut iteration = 0;

        loop {
            iteration += 1;

            let mut r = op.residual(x);
            for (ri, &c) in r.iter_mut().zip(&constrained) {
                if c {
                    *ri = 0.0;
                }
            }
            residual_norm = norm(&r);
            if iteration == 1 {
                initial_norm = residual_norm;
            }

            if print_level >= 2 {
                let relative = if initial_norm > 0.0 { residual_norm / initial_norm } else { 0.0 };
                info!(
                    "  Newton iteration {:3}: ||r|| = {:.6e}, ||r||/||r0|| = {:.6e}",
                    iteration, residual_norm, relative
                );
            }

            let goal = (rel_tol * initial_norm).max(abs_tol);
            if residual_norm == 0.0 || residual_norm <= goal {
                self.state = NewtonState::Converged;
                break;
            }

            if iteration >= max_iterations {
                self.state = NewtonState::MaxIterationsExceeded;
                if print_level >= 1 {
                    info!(
                        "Newton: no convergence after {} iterations, ||r|| = {:.6e}",
                        iteration, residual_norm
                    );
                }
                return Err(SolverError::MaxIterationsExceeded {
                    iterations: iteration,
                    residual_norm,
                    initial_norm,
                    rel_tol,
                    abs_tol,
                });
            }

            let jacobian = eliminate_constrained(&op.jacobian(x), &constrained);
            let (dx, stats) = self.linear_solver.solve(&jacobian, &r);
            linear_solves += 1;
            linear_iterations += stats.iterations;

            if self.config.linear.print_level >= 1 {
                info!(
                    "    {}: {} iterations, residual {:.3e}",
                    self.linear_solver.name(),
                    stats.iterations,
                    stats.residual_norm
                );
            }

            if !stats.converged {
                self.state = NewtonState::LinearSolveFailed;
                return Err(SolverError::LinearSolveFailed {
                    solver: self.linear_solver.name().to_string(),
                    iteration,
                    residual_norm,
                    linear_residual: stats.residual_norm,
                    linear_iterations: stats.iterations,
                });
            }

            for (xi, dxi) in x.iter_mut().zip(dx.iter()) {
                *xi -= dxi;
            }
        }

        if print_level >= 1 {
            info!(
                "Newton converged in {} iterations ({} linear solves), ||r|| = {:.6e}",
                iteration, linear_solves, residual_norm
            );
        }

        Ok(NewtonStats {
            iterations: iteration,
            linear_solves,
            linear_iterations,
            initial_norm,
            residual_norm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::LinearSolverKind;
    use approx::assert_relative_eq;
    use sprs::{CsMat, TriMat};

    /// r(x) = x^2 - c, componentwise
    struct Squares {
        targets: Vec<f64>,
        fixed: Vec<usize>,
    }

    impl NonlinearOperator for Squares {
        fn size(&self) -> usize {
            self.targets.len()
        }

        fn residual(&mut self, x: &[f64]) -> Vec<f64> {
            x.iter().zip(&self.targets).map(|(xi, c)| xi * xi - c).collect()
        }

        fn jacobian(&mut self, x: &[f64]) -> CsMat<f64> {
            let n = x.len();
            let mut t = TriMat::new((n, n));
            for (i, xi) in x.iter().enumerate() {
                t.add_triplet(i, i, 2.0 * xi);
            }
            t.to_csr()
        }

        fn constrained_dofs(&self) -> &[usize] {
            &self.fixed
        }
    }

    /// Strictly positive constant residual with identity Jacobian
    struct Unreachable {
        calls: usize,
    }

    impl NonlinearOperator for Unreachable {
        fn size(&self) -> usize {
            2
        }

        fn residual(&mut self, _x: &[f64]) -> Vec<f64> {
            self.calls += 1;
            vec![1.0, 1.0]
        }

        fn jacobian(&mut self, _x: &[f64]) -> CsMat<f64> {
            CsMat::eye(2)
        }
    }

    /// Nonzero residual with a singular Jacobian
    struct Singular;

    impl NonlinearOperator for Singular {
        fn size(&self) -> usize {
            2
        }

        fn residual(&mut self, _x: &[f64]) -> Vec<f64> {
            vec![1.0, 2.0]
        }

        fn jacobian(&mut self, _x: &[f64]) -> CsMat<f64> {
            let mut t = TriMat::new((2, 2));
            for i in 0..2 {
                for j in 0..2 {
                    t.add_triplet(i, j, 1.0);
                }
            }
            t.to_csr()
        }
    }

    fn direct_config() -> NonlinearSolverConfig {
        let mut config = NonlinearSolverConfig {
            rel_tol: 1e-12,
            abs_tol: 1e-12,
            max_iterations: 50,
            ..Default::default()
        };
        config.linear.solver = LinearSolverKind::Direct;
        config
    }

    #[test]
    fn test_newton_square_roots() {
        let mut newton = NewtonSolver::new(direct_config()).unwrap();
        let mut op = Squares { targets: vec![2.0, 9.0], fixed: vec![] };
        let mut x = vec![1.0, 1.0];

        let stats = newton.solve(&mut op, &mut x).unwrap();

        assert_eq!(newton.state(), NewtonState::Converged);
        assert_relative_eq!(x[0], 2.0_f64.sqrt(), epsilon = 1e-10);
        assert_relative_eq!(x[1], 3.0, epsilon = 1e-10);
        assert!(stats.iterations > 2);
        assert_eq!(stats.linear_solves, stats.iterations - 1);
    }

    #[test]
    fn test_already_converged_takes_one_iteration() {
        let mut newton = NewtonSolver::new(NonlinearSolverConfig::default()).unwrap();
        let mut op = Squares { targets: vec![4.0], fixed: vec![] };

        // Exact root: zero residual short-circuits
        let mut x = vec![2.0];
        let stats = newton.solve(&mut op, &mut x).unwrap();
        assert_eq!(stats.iterations, 1);
        assert_eq!(stats.linear_solves, 0);

        // Below abs_tol but not zero
        let mut x = vec![2.0 + 1e-10];
        let stats = newton.solve(&mut op, &mut x).unwrap();
        assert_eq!(stats.iterations, 1);
        assert_eq!(stats.linear_solves, 0);
        assert_eq!(x[0], 2.0 + 1e-10);
    }

    #[test]
    fn test_constant_residual_exhausts_budget() {
        let mut config = direct_config();
        config.max_iterations = 5;
        let mut newton = NewtonSolver::new(config).unwrap();
        let mut op = Unreachable { calls: 0 };
        let mut x = vec![0.0, 0.0];

        let err = newton.solve(&mut op, &mut x).unwrap_err();

        assert!(matches!(err, SolverError::MaxIterationsExceeded { iterations: 5, .. }));
        assert_eq!(newton.state(), NewtonState::MaxIterationsExceeded);
        assert_eq!(op.calls, 5);
    }

    #[test]
    fn test_singular_jacobian_fails_immediately() {
        let mut newton = NewtonSolver::new(direct_config()).unwrap();
        let mut x = vec![0.0, 0.0];

        let err = newton.solve(&mut Singular, &mut x).unwrap_err();

        assert!(matches!(err, SolverError::LinearSolveFailed { iteration: 1, .. }));
        assert_eq!(newton.state(), NewtonState::LinearSolveFailed);
    }

    #[test]
    fn test_constrained_dofs_are_not_corrected() {
        let mut newton = NewtonSolver::new(direct_config()).unwrap();
        let mut op = Squares { targets: vec![4.0, 9.0], fixed: vec![0] };
        let mut x = vec![5.0, 1.0];

        newton.solve(&mut op, &mut x).unwrap();

        assert_eq!(x[0], 5.0);
        assert_relative_eq!(x[1], 3.0, epsilon = 1e-10);
    }
}
