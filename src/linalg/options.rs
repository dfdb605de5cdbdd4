use serde::{Deserialize, Serialize};

use super::direct::DirectSolver;
use super::iterative::{BiCGSTAB, ConjugateGradient};
use super::preconditioner::PreconditionerKind;
use super::solver::Solver;
use crate::error::{Result, SimError};

/// Linear solver method used for the Newton correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinearSolverKind {
    #[serde(rename = "cg")]
    Cg,
    #[serde(rename = "bicgstab")]
    BiCgStab,
    #[serde(rename = "direct")]
    Direct,
}

/// Options for the linear solve inside each Newton iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearSolverOptions {
    pub solver: LinearSolverKind,
    pub preconditioner: PreconditionerKind,
    pub rel_tol: f64,
    pub abs_tol: f64,
    pub max_iterations: usize,
    pub print_level: u32,
}

impl Default for LinearSolverOptions {
    fn default() -> Self {
        Self {
            solver: LinearSolverKind::Cg,
            preconditioner: PreconditionerKind::Jacobi,
            rel_tol: 1.0e-6,
            abs_tol: 1.0e-12,
            max_iterations: 200,
            print_level: 0,
        }
    }
}

impl LinearSolverOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.rel_tol >= 0.0 && self.abs_tol >= 0.0) {
            return Err(SimError::configuration(
                "linear solver",
                format!("tolerances must be non-negative (rel {}, abs {})", self.rel_tol, self.abs_tol),
            ));
        }
        if self.solver != LinearSolverKind::Direct && self.max_iterations == 0 {
            return Err(SimError::configuration(
                "linear solver",
                "max_iterations must be at least 1 for an iterative solver",
            ));
        }
        Ok(())
    }

    /// Construct the configured solver
    pub fn build(&self) -> Box<dyn Solver + Send> {
        let use_precond = self.preconditioner == PreconditionerKind::Jacobi;
        match self.solver {
            LinearSolverKind::Cg => Box::new(
                ConjugateGradient::new()
                    .with_tolerance(self.rel_tol)
                    .with_abs_tolerance(self.abs_tol)
                    .with_max_iterations(self.max_iterations)
                    .with_preconditioner(use_precond),
            ),
            LinearSolverKind::BiCgStab => Box::new(
                BiCGSTAB::new()
                    .with_tolerance(self.rel_tol)
                    .with_abs_tolerance(self.abs_tol)
                    .with_max_iterations(self.max_iterations)
                    .with_preconditioner(use_precond),
            ),
            LinearSolverKind::Direct => {
                let mut direct = DirectSolver::new();
                direct.set_tolerance(self.rel_tol);
                direct.set_abs_tolerance(self.abs_tol);
                Box::new(direct)
            }
        }
    }
}

/// Newton solver configuration
///
/// Immutable once a `NewtonSolver` has been built from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlinearSolverConfig {
    pub rel_tol: f64,
    pub abs_tol: f64,
    pub max_iterations: usize,
    pub print_level: u32,
    pub linear: LinearSolverOptions,
}

impl Default for NonlinearSolverConfig {
    fn default() -> Self {
        Self {
            rel_tol: 1.0e-4,
            abs_tol: 1.0e-8,
            max_iterations: 500,
            print_level: 0,
            linear: LinearSolverOptions::default(),
        }
    }
}

impl NonlinearSolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(SimError::configuration(
                "nonlinear solver",
                "max_iterations must be at least 1",
            ));
        }
        if !(self.rel_tol >= 0.0 && self.abs_tol >= 0.0) {
            return Err(SimError::configuration(
                "nonlinear solver",
                format!("tolerances must be non-negative (rel {}, abs {})", self.rel_tol, self.abs_tol),
            ));
        }
        self.linear.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NonlinearSolverConfig::default();
        assert_eq!(config.max_iterations, 500);
        assert_eq!(config.linear.solver, LinearSolverKind::Cg);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_iteration_budget_is_rejected() {
        let config = NonlinearSolverConfig {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SimError::Configuration { .. })));
    }

    #[test]
    fn test_build_names_solver() {
        let mut options = LinearSolverOptions::default();
        assert_eq!(options.build().name(), "ConjugateGradient");
        options.solver = LinearSolverKind::BiCgStab;
        assert_eq!(options.build().name(), "BiCGSTAB");
    }

    #[test]
    fn test_build_forwards_tolerances() {
        for solver in [LinearSolverKind::Cg, LinearSolverKind::BiCgStab, LinearSolverKind::Direct] {
            let options = LinearSolverOptions {
                solver,
                rel_tol: 3.0e-9,
                abs_tol: 4.0e-15,
                ..Default::default()
            };
            let built = options.build();
            assert_eq!(built.tolerance(), 3.0e-9, "{solver:?}");
            assert_eq!(built.abs_tolerance(), 4.0e-15, "{solver:?}");
        }
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: NonlinearSolverConfig = toml::from_str(
            r#"
            rel_tol = 1e-6
            [linear]
            solver = "direct"
            "#,
        )
        .unwrap();
        assert_eq!(config.rel_tol, 1e-6);
        assert_eq!(config.abs_tol, 1e-8);
        assert_eq!(config.linear.solver, LinearSolverKind::Direct);
        assert_eq!(config.linear.max_iterations, 200);
    }
}
