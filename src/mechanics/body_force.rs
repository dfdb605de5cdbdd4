//! External loads for solid mechanics
//!
//! Body forces act per unit reference volume and tractions per unit
//! reference area (dead loads).

use nalgebra::{Point3, SVector, Vector3};
use crate::fem::ElementMatrix;

/// Body force and traction load vectors
pub struct BodyForce;

impl BodyForce {
    /// Element body force vector
    ///
    /// f_e = ∫ N^T b dV
    ///
    /// # Returns
    /// 12×1 element load vector: [f_0x, f_0y, f_0z, ..., f_3x, f_3y, f_3z]
    pub fn volume_load<B>(vertices: &[Point3<f64>; 4], body_force: B) -> SVector<f64, 12>
    where
        B: Fn(&Point3<f64>) -> Vector3<f64>,
    {
        let mut f_elem = SVector::<f64, 12>::zeros();
        for c in 0..3 {
            let f_c = ElementMatrix::load(vertices, |x| body_force(x)[c]);
            for a in 0..4 {
                f_elem[3 * a + c] = f_c[a];
            }
        }
        f_elem
    }

    /// Boundary face traction vector f_e = ∫ N^T t dA
    pub fn traction_load<T>(vertices: &[Point3<f64>; 3], traction: T) -> SVector<f64, 9>
    where
        T: Fn(&Point3<f64>) -> Vector3<f64>,
    {
        let mut f_elem = SVector::<f64, 9>::zeros();
        for c in 0..3 {
            let f_c = ElementMatrix::face_load(vertices, |x| traction(x)[c]);
            for a in 0..3 {
                f_elem[3 * a + c] = f_c[a];
            }
        }
        f_elem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gravity_load_total_equals_weight() {
        let vertices = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let density = 3000.0;
        let g = Vector3::new(0.0, 0.0, -9.81);

        let f = BodyForce::volume_load(&vertices, |_| density * g);

        let total_fz: f64 = (0..4).map(|a| f[3 * a + 2]).sum();
        let total_fx: f64 = (0..4).map(|a| f[3 * a]).sum();
        assert_relative_eq!(total_fz, -density * 9.81 / 6.0, epsilon = 1e-9);
        assert_relative_eq!(total_fx, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_traction_total_equals_force() {
        let face = [
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let f = BodyForce::traction_load(&face, |_| Vector3::new(2.0, 0.0, 0.0));
        let total_fx: f64 = (0..3).map(|a| f[3 * a]).sum();
        assert_relative_eq!(total_fx, 1.0, epsilon = 1e-14);
    }
}
