pub mod solver;
pub mod preconditioner;
pub mod iterative;
pub mod direct;
pub mod options;
pub mod residual;
pub mod newton;

pub use solver::{dot, norm, residual_norm, Solver, SolverStats};
pub use preconditioner::{IdentityPreconditioner, JacobiPreconditioner, Preconditioner, PreconditionerKind};
pub use iterative::{BiCGSTAB, ConjugateGradient};
pub use direct::DirectSolver;
pub use options::{LinearSolverKind, LinearSolverOptions, NonlinearSolverConfig};
pub use residual::{eliminate_constrained, linear_combination, mat_vec, NonlinearOperator, ResidualOperator};
pub use newton::{NewtonSolver, NewtonState, NewtonStats};
