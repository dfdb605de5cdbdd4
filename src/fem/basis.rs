use nalgebra::{Matrix3, Point3, Vector3};

/// Tet4 (4-node linear tetrahedral) element basis functions
///
/// Reference element (in barycentric coordinates):
///   Node 0: (1, 0, 0, 0) at origin
///   Node 1: (0, 1, 0, 0) at (1, 0, 0)
///   Node 2: (0, 0, 1, 0) at (0, 1, 0)
///   Node 3: (0, 0, 0, 1) at (0, 0, 1)
///
/// The shape functions are the barycentric coordinates themselves, so the
/// gradients are constant over the element.
pub struct Tet4Basis;

impl Tet4Basis {
    /// N_i = L_i
    #[allow(non_snake_case)]
    pub fn shape_functions(L: &[f64; 4]) -> [f64; 4] {
        *L
    }

    /// Reference-to-physical Jacobian, columns x1 - x0, x2 - x0, x3 - x0
    pub fn jacobian(vertices: &[Point3<f64>; 4]) -> Matrix3<f64> {
        let [p0, p1, p2, p3] = vertices;
        Matrix3::from_columns(&[p1 - p0, p2 - p0, p3 - p0])
    }

    pub fn signed_volume(vertices: &[Point3<f64>; 4]) -> f64 {
        Self::jacobian(vertices).determinant() / 6.0
    }

    /// Cartesian gradients ∇N_i
    ///
    /// ∇_x N = J^{-T} ∇_ξ N. A degenerate element yields zero gradients.
    pub fn gradients(vertices: &[Point3<f64>; 4]) -> [Vector3<f64>; 4] {
        let Some(j_inv) = Self::jacobian(vertices).try_inverse() else {
            return [Vector3::zeros(); 4];
        };
        let j_inv_t = j_inv.transpose();

        let reference = [
            Vector3::new(-1.0, -1.0, -1.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        ];
        reference.map(|g| j_inv_t * g)
    }

    /// Physical point at barycentric coordinates
    #[allow(non_snake_case)]
    pub fn map_to_physical(L: &[f64; 4], vertices: &[Point3<f64>; 4]) -> Point3<f64> {
        let mut x = Vector3::zeros();
        for (l, p) in L.iter().zip(vertices.iter()) {
            x += *l * p.coords;
        }
        Point3::from(x)
    }

    pub fn centroid(vertices: &[Point3<f64>; 4]) -> Point3<f64> {
        Self::map_to_physical(&[0.25; 4], vertices)
    }
}

/// Linear triangle on a boundary face
pub struct Tri3Basis;

impl Tri3Basis {
    pub fn area(vertices: &[Point3<f64>; 3]) -> f64 {
        let [p0, p1, p2] = vertices;
        0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
    }

    #[allow(non_snake_case)]
    pub fn map_to_physical(L: &[f64; 3], vertices: &[Point3<f64>; 3]) -> Point3<f64> {
        let mut x = Vector3::zeros();
        for (l, p) in L.iter().zip(vertices.iter()) {
            x += *l * p.coords;
        }
        Point3::from(x)
    }
}
