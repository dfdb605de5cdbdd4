//! Error taxonomy for setup, convergence and coupling failures
//!
//! Configuration problems surface from `complete_setup`, convergence problems
//! from the Newton solver through `advance_timestep`, and coupling-invariant
//! violations from the multiphysics coupler. None of them is recoverable once
//! a run is past setup.

use thiserror::Error;

use crate::physics::CouplingScheme;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SimError>;

/// Terminal failure of a Newton solve.
#[derive(Debug, Clone, Error)]
pub enum SolverError {
    #[error(
        "Newton solver exceeded {iterations} iterations: ||r|| = {residual_norm:.3e} \
         (initial {initial_norm:.3e}), required <= max(rel_tol {rel_tol:.1e} * ||r0||, abs_tol {abs_tol:.1e})"
    )]
    MaxIterationsExceeded {
        iterations: usize,
        residual_norm: f64,
        initial_norm: f64,
        rel_tol: f64,
        abs_tol: f64,
    },

    #[error(
        "{solver} failed at Newton iteration {iteration}: linear residual {linear_residual:.3e} \
         after {linear_iterations} iterations (||r|| = {residual_norm:.3e})"
    )]
    LinearSolveFailed {
        solver: String,
        iteration: usize,
        residual_norm: f64,
        linear_residual: f64,
        linear_iterations: usize,
    },
}

impl SolverError {
    /// Newton iteration at which the solve stopped.
    pub fn iteration(&self) -> usize {
        match self {
            SolverError::MaxIterationsExceeded { iterations, .. } => *iterations,
            SolverError::LinearSolveFailed { iteration, .. } => *iteration,
        }
    }
}

/// Crate-level error.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error in {context}: {message}")]
    Configuration { context: String, message: String },

    #[error("coupling scheme {0:?} is not implemented; only operator split is supported")]
    UnsupportedCoupling(CouplingScheme),

    #[error("field '{field}' has {actual} values but its space has {expected} true dofs")]
    FieldSize {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("{physics} failed to converge in cycle {cycle}: {source}")]
    Convergence {
        physics: String,
        cycle: usize,
        #[source]
        source: SolverError,
    },

    #[error(
        "operator-split coupling requires a fixed timestep, but '{module}' changed dt from {requested:e} to {actual:e}"
    )]
    TimestepAltered {
        module: String,
        requested: f64,
        actual: f64,
    },

    #[error("{context}: {message}")]
    SetupState { context: String, message: String },

    #[error("failed to read input file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse input file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl SimError {
    pub fn configuration(context: impl Into<String>, message: impl Into<String>) -> Self {
        SimError::Configuration {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn setup_state(context: impl Into<String>, message: impl Into<String>) -> Self {
        SimError::SetupState {
            context: context.into(),
            message: message.into(),
        }
    }
}
