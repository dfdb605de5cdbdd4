use nalgebra::{Point3, SMatrix, SVector};

use crate::fem::{FaceQuadrature, GaussQuadrature, Tet4Basis, Tri3Basis};

/// Element matrices and vectors for scalar Tet4 fields
pub struct ElementMatrix;

impl ElementMatrix {
    /// Diffusion stiffness
    ///
    /// K_ij = ∫ k ∇N_i · ∇N_j dV
    ///
    /// Gradients are constant on a linear element, so with a piecewise
    /// constant conductivity the integral is exact: K_ij = k V ∇N_i · ∇N_j.
    pub fn diffusion(vertices: &[Point3<f64>; 4], conductivity: f64) -> SMatrix<f64, 4, 4> {
        let grads = Tet4Basis::gradients(vertices);
        let volume = Tet4Basis::signed_volume(vertices).abs();

        SMatrix::<f64, 4, 4>::from_fn(|i, j| conductivity * volume * grads[i].dot(&grads[j]))
    }

    /// Consistent mass matrix
    ///
    /// M_ij = ∫ ρ N_i N_j dV = ρ V (1 + δ_ij) / 20
    pub fn mass(vertices: &[Point3<f64>; 4], density: f64) -> SMatrix<f64, 4, 4> {
        let volume = Tet4Basis::signed_volume(vertices).abs();
        let scale = density * volume / 20.0;

        SMatrix::<f64, 4, 4>::from_fn(|i, j| if i == j { 2.0 * scale } else { scale })
    }

    /// Load vector f_i = ∫ f N_i dV
    pub fn load<F>(vertices: &[Point3<f64>; 4], f: F) -> SVector<f64, 4>
    where
        F: Fn(&Point3<f64>) -> f64,
    {
        let quad = GaussQuadrature::tet_4point();
        let det_j = Tet4Basis::jacobian(vertices).determinant().abs();

        let mut f_elem = SVector::<f64, 4>::zeros();
        for (qp, weight) in quad.points.iter().zip(quad.weights.iter()) {
            let x = Tet4Basis::map_to_physical(qp, vertices);
            let n = Tet4Basis::shape_functions(qp);
            let fx = f(&x) * weight * det_j;
            for i in 0..4 {
                f_elem[i] += fx * n[i];
            }
        }
        f_elem
    }

    /// Nonlinear reaction residual r_i = ∫ q(u_h) N_i dV
    pub fn reaction<Q>(vertices: &[Point3<f64>; 4], u_local: &[f64; 4], q: Q) -> SVector<f64, 4>
    where
        Q: Fn(f64) -> f64,
    {
        let quad = GaussQuadrature::tet_4point();
        let det_j = Tet4Basis::jacobian(vertices).determinant().abs();

        let mut r_elem = SVector::<f64, 4>::zeros();
        for (qp, weight) in quad.points.iter().zip(quad.weights.iter()) {
            let n = Tet4Basis::shape_functions(qp);
            let u_q: f64 = (0..4).map(|a| n[a] * u_local[a]).sum();
            let qv = q(u_q) * weight * det_j;
            for i in 0..4 {
                r_elem[i] += qv * n[i];
            }
        }
        r_elem
    }

    /// Reaction tangent ∂r_i/∂u_j = ∫ q'(u_h) N_i N_j dV
    pub fn reaction_gradient<D>(vertices: &[Point3<f64>; 4], u_local: &[f64; 4], dq: D) -> SMatrix<f64, 4, 4>
    where
        D: Fn(f64) -> f64,
    {
        let quad = GaussQuadrature::tet_4point();
        let det_j = Tet4Basis::jacobian(vertices).determinant().abs();

        let mut k_elem = SMatrix::<f64, 4, 4>::zeros();
        for (qp, weight) in quad.points.iter().zip(quad.weights.iter()) {
            let n = Tet4Basis::shape_functions(qp);
            let u_q: f64 = (0..4).map(|a| n[a] * u_local[a]).sum();
            let dv = dq(u_q) * weight * det_j;
            for i in 0..4 {
                for j in 0..4 {
                    k_elem[(i, j)] += dv * n[i] * n[j];
                }
            }
        }
        k_elem
    }

    /// Boundary face load g_i = ∫ g N_i dA on a linear triangle
    pub fn face_load<G>(vertices: &[Point3<f64>; 3], g: G) -> SVector<f64, 3>
    where
        G: Fn(&Point3<f64>) -> f64,
    {
        let quad = FaceQuadrature::tri_3point();
        let two_area = 2.0 * Tri3Basis::area(vertices);

        let mut g_elem = SVector::<f64, 3>::zeros();
        for (qp, weight) in quad.points.iter().zip(quad.weights.iter()) {
            let x = Tri3Basis::map_to_physical(qp, vertices);
            let gx = g(&x) * weight * two_area;
            for i in 0..3 {
                g_elem[i] += gx * qp[i];
            }
        }
        g_elem
    }
}
