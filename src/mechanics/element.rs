//! Element residual and tangent for large-deformation solids
//!
//! Total-Lagrangian formulation on linear tetrahedra: all integrals are over
//! the reference configuration, and the deformation gradient is constant
//! per element.

use nalgebra::{Matrix3, Point3, SMatrix, SVector, Vector3};
use crate::fem::{ElementMatrix, Tet4Basis};
use super::NeoHookean;

/// Element computations for total-Lagrangian Tet4 solids
pub struct TotalLagrangianElement;

impl TotalLagrangianElement {
    /// Deformation gradient F = I + Σ_a u_a ⊗ ∇N_a
    #[allow(non_snake_case)]
    pub fn deformation_gradient(grads: &[Vector3<f64>; 4], u_local: &[f64; 12]) -> Matrix3<f64> {
        let mut F = Matrix3::identity();
        for (a, grad) in grads.iter().enumerate() {
            let u_a = Vector3::new(u_local[3 * a], u_local[3 * a + 1], u_local[3 * a + 2]);
            F += u_a * grad.transpose();
        }
        F
    }

    /// Internal force f_ai = ∫ P_iJ ∂N_a/∂X_J dV
    ///
    /// Local dof ordering is node-major: [u_0x, u_0y, u_0z, u_1x, ...].
    #[allow(non_snake_case)]
    pub fn internal_force(
        vertices: &[Point3<f64>; 4],
        u_local: &[f64; 12],
        material: &NeoHookean,
    ) -> SVector<f64, 12> {
        let grads = Tet4Basis::gradients(vertices);
        let volume = Tet4Basis::signed_volume(vertices).abs();
        let F = Self::deformation_gradient(&grads, u_local);
        let P = material.stress(&F);

        let mut f_elem = SVector::<f64, 12>::zeros();
        for (a, grad) in grads.iter().enumerate() {
            let force = volume * P * grad;
            for i in 0..3 {
                f_elem[3 * a + i] = force[i];
            }
        }
        f_elem
    }

    /// Tangent stiffness K_(ai)(bk) = ∫ A_iJkL ∂N_a/∂X_J ∂N_b/∂X_L dV
    #[allow(non_snake_case)]
    pub fn tangent_stiffness(
        vertices: &[Point3<f64>; 4],
        u_local: &[f64; 12],
        material: &NeoHookean,
    ) -> SMatrix<f64, 12, 12> {
        let grads = Tet4Basis::gradients(vertices);
        let volume = Tet4Basis::signed_volume(vertices).abs();
        let F = Self::deformation_gradient(&grads, u_local);
        let A = material.tangent(&F);

        let mut K_elem = SMatrix::<f64, 12, 12>::zeros();
        for a in 0..4 {
            for b in 0..4 {
                for i in 0..3 {
                    for k in 0..3 {
                        let mut sum = 0.0;
                        for J in 0..3 {
                            for L in 0..3 {
                                sum += A[i][J][k][L] * grads[a][J] * grads[b][L];
                            }
                        }
                        K_elem[(3 * a + i, 3 * b + k)] = volume * sum;
                    }
                }
            }
        }
        K_elem
    }

    /// Consistent mass M = M_scalar ⊗ I₃
    pub fn mass(vertices: &[Point3<f64>; 4], density: f64) -> SMatrix<f64, 12, 12> {
        let m = ElementMatrix::mass(vertices, density);
        SMatrix::<f64, 12, 12>::from_fn(|r, c| if r % 3 == c % 3 { m[(r / 3, c / 3)] } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn create_unit_tet() -> [Point3<f64>; 4] {
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ]
    }

    fn sample_displacement() -> [f64; 12] {
        [0.0, 0.01, -0.02, 0.05, 0.0, 0.01, -0.01, 0.03, 0.0, 0.02, 0.0, 0.04]
    }

    #[test]
    fn test_rigid_translation_is_force_free() {
        let material = NeoHookean::new(1.0, 3.0);
        let mut u = [0.0; 12];
        for a in 0..4 {
            u[3 * a] = 0.3;
            u[3 * a + 2] = -0.1;
        }
        let f = TotalLagrangianElement::internal_force(&create_unit_tet(), &u, &material);
        assert_relative_eq!(f.norm(), 0.0, epsilon = 1e-14);
    }

    #[test]
    fn test_internal_forces_balance() {
        let material = NeoHookean::new(1.0, 3.0);
        let f = TotalLagrangianElement::internal_force(&create_unit_tet(), &sample_displacement(), &material);
        for i in 0..3 {
            let total: f64 = (0..4).map(|a| f[3 * a + i]).sum();
            assert_relative_eq!(total, 0.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn test_tangent_matches_finite_difference() {
        let material = NeoHookean::new(1.0, 3.0);
        let verts = create_unit_tet();
        let u = sample_displacement();
        let k = TotalLagrangianElement::tangent_stiffness(&verts, &u, &material);
        let h = 1e-7;

        for col in 0..12 {
            let mut up = u;
            let mut um = u;
            up[col] += h;
            um[col] -= h;
            let fd = (TotalLagrangianElement::internal_force(&verts, &up, &material)
                - TotalLagrangianElement::internal_force(&verts, &um, &material))
                / (2.0 * h);
            for row in 0..12 {
                assert_relative_eq!(k[(row, col)], fd[row], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_mass_total() {
        let m = TotalLagrangianElement::mass(&create_unit_tet(), 6.0);
        // Sum over one component block is ρV
        let total: f64 = (0..4).flat_map(|a| (0..4).map(move |b| (a, b))).map(|(a, b)| m[(3 * a, 3 * b)]).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-14);
    }
}
