//! Linear solver interface used inside each Newton iteration

use sprs::CsMat;

use super::residual::mat_vec;

/// Outcome of one linear solve
#[derive(Debug, Clone, Default)]
pub struct SolverStats {
    /// Iterations taken, 0 for a direct factorization
    pub iterations: usize,
    /// ||b - Ax|| at exit
    pub residual_norm: f64,
    /// ||b - Ax|| / ||b||
    pub relative_residual: f64,
    pub converged: bool,
}

/// Sparse solver for `A x = b`
///
/// A solver never panics on a bad system; it reports `converged = false` and
/// the Newton solver decides what that means.
pub trait Solver {
    fn solve(&mut self, a: &CsMat<f64>, b: &[f64]) -> (Vec<f64>, SolverStats);

    fn name(&self) -> &str;

    fn abs_tolerance(&self) -> f64;

    fn set_abs_tolerance(&mut self, tolerance: f64);

    /// Tolerance relative to ||b||
    fn tolerance(&self) -> f64;

    fn set_tolerance(&mut self, tolerance: f64);
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

/// ||b - A x||
pub fn residual_norm(a: &CsMat<f64>, x: &[f64], b: &[f64]) -> f64 {
    let ax = mat_vec(a, x);
    b.iter()
        .zip(&ax)
        .map(|(bi, axi)| (bi - axi) * (bi - axi))
        .sum::<f64>()
        .sqrt()
}

/// Stats for the trivial solve `x = 0` of a vanishing right-hand side
pub(crate) fn zero_rhs_stats() -> SolverStats {
    SolverStats {
        converged: true,
        ..Default::default()
    }
}
