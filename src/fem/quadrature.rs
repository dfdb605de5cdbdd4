/// Gaussian quadrature rules for tetrahedral elements
///
/// Weights are for the reference tetrahedron (volume 1/6); multiply by
/// `|det J|` to integrate over a physical element.
pub struct GaussQuadrature {
    /// Integration point coordinates in barycentric form [L0, L1, L2, L3]
    pub points: Vec<[f64; 4]>,
    /// Integration weights
    pub weights: Vec<f64>,
}

impl GaussQuadrature {
    /// 1-point centroid rule, exact for linear polynomials
    pub fn tet_1point() -> Self {
        Self {
            points: vec![[0.25, 0.25, 0.25, 0.25]],
            weights: vec![1.0 / 6.0],
        }
    }

    /// 4-point rule, exact for quadratic polynomials
    pub fn tet_4point() -> Self {
        let a = 0.5854101966249685; // (5 + √5) / 20
        let b = 0.1381966011250105; // (5 - √5) / 20
        let w = 1.0 / 24.0;

        Self {
            points: vec![
                [a, b, b, b],
                [b, a, b, b],
                [b, b, a, b],
                [b, b, b, a],
            ],
            weights: vec![w, w, w, w],
        }
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }
}

/// Quadrature on the reference triangle (area 1/2)
pub struct FaceQuadrature {
    /// Barycentric coordinates [L0, L1, L2]
    pub points: Vec<[f64; 3]>,
    pub weights: Vec<f64>,
}

impl FaceQuadrature {
    /// 3-point rule, exact for quadratic polynomials
    pub fn tri_3point() -> Self {
        let a = 2.0 / 3.0;
        let b = 1.0 / 6.0;
        let w = 1.0 / 6.0;

        Self {
            points: vec![[a, b, b], [b, a, b], [b, b, a]],
            weights: vec![w, w, w],
        }
    }
}
