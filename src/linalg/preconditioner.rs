use serde::{Deserialize, Serialize};
use sprs::CsMat;

/// Preconditioner for iterative solvers
///
/// Solves M z = r approximately (where M ≈ A)
pub trait Preconditioner {
    fn apply(&self, r: &[f64]) -> Vec<f64>;
}

/// Preconditioner selection for the Krylov solvers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreconditionerKind {
    None,
    Jacobi,
}

impl Default for PreconditionerKind {
    fn default() -> Self {
        PreconditionerKind::Jacobi
    }
}

/// Jacobi (diagonal) preconditioner, M = diag(A)
pub struct JacobiPreconditioner {
    /// 1/A_ii, or 1 where the diagonal vanishes
    diag_inv: Vec<f64>,
}

impl JacobiPreconditioner {
    #[allow(non_snake_case)]
    pub fn new(A: &CsMat<f64>) -> Self {
        let n = A.rows();
        let mut diag_inv = vec![1.0; n];

        for (i, d) in diag_inv.iter_mut().enumerate() {
            if let Some(&val) = A.get(i, i) {
                if val.abs() > 1e-14 {
                    *d = 1.0 / val;
                }
            }
        }

        Self { diag_inv }
    }
}

impl Preconditioner for JacobiPreconditioner {
    fn apply(&self, r: &[f64]) -> Vec<f64> {
        r.iter()
            .zip(self.diag_inv.iter())
            .map(|(&ri, &di)| ri * di)
            .collect()
    }
}

/// No preconditioning
pub struct IdentityPreconditioner;

impl Preconditioner for IdentityPreconditioner {
    fn apply(&self, r: &[f64]) -> Vec<f64> {
        r.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use sprs::TriMat;

    #[test]
    fn test_jacobi_scales_by_diagonal() {
        let mut triplets = TriMat::new((2, 2));
        triplets.add_triplet(0, 0, 4.0);
        triplets.add_triplet(0, 1, 1.0);
        triplets.add_triplet(1, 1, 0.0);
        let a: CsMat<f64> = triplets.to_csr();

        let z = JacobiPreconditioner::new(&a).apply(&[2.0, 3.0]);
        assert_relative_eq!(z[0], 0.5);
        // Zero diagonal falls back to identity
        assert_relative_eq!(z[1], 3.0);
    }
}
