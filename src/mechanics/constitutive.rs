//! Hyperelastic constitutive models
//!
//! Stress is the first Piola-Kirchhoff tensor P as a function of the
//! deformation gradient F; the tangent is the fourth-order ∂P/∂F.

use nalgebra::Matrix3;

/// Fourth-order tensor A[i][J][k][L] = ∂P_iJ / ∂F_kL
pub type Tangent = [[[[f64; 3]; 3]; 3]; 3];

/// Compressible neo-Hookean material
///
/// ψ(F) = μ/2 (tr C - 3) - μ ln J + λ/2 (ln J)²,   λ = K - 2μ/3
///
/// Reduces to isotropic linear elasticity with shear modulus μ and bulk
/// modulus K for small strains.
#[derive(Debug, Clone)]
pub struct NeoHookean {
    /// Shear modulus μ
    pub shear_modulus: f64,
    /// Bulk modulus K
    pub bulk_modulus: f64,
}

impl NeoHookean {
    /// # Panics
    /// Panics if μ ≤ 0 or K ≤ 0
    pub fn new(shear_modulus: f64, bulk_modulus: f64) -> Self {
        assert!(shear_modulus > 0.0, "Shear modulus must be positive");
        assert!(bulk_modulus > 0.0, "Bulk modulus must be positive");

        Self {
            shear_modulus,
            bulk_modulus,
        }
    }

    /// First Lamé parameter λ = K - 2μ/3
    pub fn lambda(&self) -> f64 {
        self.bulk_modulus - 2.0 * self.shear_modulus / 3.0
    }

    /// First Piola-Kirchhoff stress
    ///
    /// P = μ F + (λ ln J - μ) F⁻ᵀ
    ///
    /// An inverted element (J ≤ 0) gives a non-finite stress, which the
    /// Newton solve reports as a failure.
    #[allow(non_snake_case)]
    pub fn stress(&self, F: &Matrix3<f64>) -> Matrix3<f64> {
        let mu = self.shear_modulus;
        let J = F.determinant();
        let Some(F_inv) = F.try_inverse() else {
            return Matrix3::from_element(f64::NAN);
        };

        mu * F + (self.lambda() * J.ln() - mu) * F_inv.transpose()
    }

    /// Material tangent
    ///
    /// A_iJkL = μ δ_ik δ_JL + λ F⁻¹_Lk F⁻¹_Ji - (λ ln J - μ) F⁻¹_Jk F⁻¹_Li
    #[allow(non_snake_case)]
    pub fn tangent(&self, F: &Matrix3<f64>) -> Tangent {
        let mu = self.shear_modulus;
        let lambda = self.lambda();
        let J = F.determinant();
        let Some(Fi) = F.try_inverse() else {
            return [[[[f64::NAN; 3]; 3]; 3]; 3];
        };
        let c = lambda * J.ln() - mu;

        let mut A = [[[[0.0; 3]; 3]; 3]; 3];
        for i in 0..3 {
            for jj in 0..3 {
                for k in 0..3 {
                    for l in 0..3 {
                        let identity = if i == k && jj == l { mu } else { 0.0 };
                        A[i][jj][k][l] = identity + lambda * Fi[(l, k)] * Fi[(jj, i)] - c * Fi[(jj, k)] * Fi[(l, i)];
                    }
                }
            }
        }
        A
    }

    /// Strain energy density ψ(F)
    #[allow(non_snake_case)]
    pub fn energy(&self, F: &Matrix3<f64>) -> f64 {
        let mu = self.shear_modulus;
        let ln_j = F.determinant().ln();
        let trace_c = (F.transpose() * F).trace();
        0.5 * mu * (trace_c - 3.0) - mu * ln_j + 0.5 * self.lambda() * ln_j * ln_j
    }
}
