use nalgebra::{DMatrix, DVector};
use sprs::CsMat;

use super::solver::{norm, residual_norm, Solver, SolverStats};

/// Dense LU solver for small systems
///
/// Converts the sparse matrix to a dense nalgebra matrix, so it is meant for
/// verification runs and meshes of a few thousand dofs.
pub struct DirectSolver {
    name: String,
    tolerance: f64,
    abs_tolerance: f64,
}

impl DirectSolver {
    pub fn new() -> Self {
        Self {
            name: "Direct (dense LU)".to_string(),
            tolerance: 1e-8,
            abs_tolerance: 1e-12,
        }
    }
}

impl Default for DirectSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver for DirectSolver {
    #[allow(non_snake_case)]
    fn solve(&mut self, A: &CsMat<f64>, b: &[f64]) -> (Vec<f64>, SolverStats) {
        let n = b.len();

        let mut a_dense = DMatrix::zeros(n, n);
        for (row_idx, row) in A.outer_iterator().enumerate() {
            for (col_idx, &val) in row.iter() {
                a_dense[(row_idx, col_idx)] += val;
            }
        }

        let b_vec = DVector::from_column_slice(b);
        let Some(x_vec) = a_dense.lu().solve(&b_vec) else {
            // Singular matrix
            return (
                vec![0.0; n],
                SolverStats {
                    iterations: 0,
                    residual_norm: norm(b),
                    relative_residual: 1.0,
                    converged: false,
                },
            );
        };

        let x: Vec<f64> = x_vec.iter().copied().collect();
        let residual_norm = residual_norm(A, &x, b);
        let b_norm = norm(b);
        let relative_residual = if b_norm > 0.0 { residual_norm / b_norm } else { residual_norm };
        let converged = x.iter().all(|v| v.is_finite())
            && (relative_residual < self.tolerance || residual_norm < self.abs_tolerance);

        let stats = SolverStats {
            iterations: 0,
            residual_norm,
            relative_residual,
            converged,
        };

        (x, stats)
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
