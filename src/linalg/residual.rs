//! Time-parameterized residual operators
//!
//! A `ResidualOperator` packages the spatial discretization of one physics
//! module as two owned closures of `(u, t)`: the residual `F(u, t)` and its
//! Jacobian `∂F/∂u`. The closures are built by the physics module in
//! `complete_setup` and live exactly as long as that module; they capture the
//! module's shared mesh, space and coefficients by `Arc` and hold no mutable
//! state, so repeated evaluation with different trial vectors is side-effect
//! free.

use sprs::{CsMat, TriMat};


pub type ResidualFn = Box<dyn Fn(&[f64], f64) -> Vec<f64> + Send + Sync>;
pub type JacobianFn = Box<dyn Fn(&[f64], f64) -> CsMat<f64> + Send + Sync>;
/// Writes the prescribed essential values at time `t` into a full-size vector
pub type EssentialFn = Box<dyn Fn(f64, &mut [f64]) + Send + Sync>;

/// Anything the Newton solver can drive to zero
pub trait NonlinearOperator {
    fn size(&self) -> usize;

    fn residual(&mut self, x: &[f64]) -> Vec<f64>;

    fn jacobian(&mut self, x: &[f64]) -> CsMat<f64>;

    /// Dofs eliminated from the Newton correction
    fn constrained_dofs(&self) -> &[usize] {
        &[]
    }
}

/// Residual `F(u, t)` of a semi-discrete system, plus essential dof data
pub struct ResidualOperator {
    size: usize,
    residual: ResidualFn,
    jacobian: JacobianFn,
    essential_dofs: Vec<usize>,
    prescribe: Option<EssentialFn>,
}

impl ResidualOperator {
    pub fn new(size: usize, residual: ResidualFn, jacobian: JacobianFn) -> Self {
        Self {
            size,
            residual,
            jacobian,
            essential_dofs: Vec::new(),
            prescribe: None,
        }
    }

    /// Attach the essential dofs and the function writing their values
    pub fn with_essential(mut self, mut dofs: Vec<usize>, prescribe: EssentialFn) -> Self {
        dofs.sort_unstable();
        dofs.dedup();
        assert!(
            dofs.last().map_or(true, |&d| d < self.size),
            "Essential dof out of range"
        );
        self.essential_dofs = dofs;
        self.prescribe = Some(prescribe);
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Sorted essential dofs
    pub fn essential_dofs(&self) -> &[usize] {
        &self.essential_dofs
    }

    pub fn residual(&self, u: &[f64], t: f64) -> Vec<f64> {
        assert_eq!(u.len(), self.size, "Trial vector has the wrong size");
        (self.residual)(u, t)
    }

    pub fn jacobian(&self, u: &[f64], t: f64) -> CsMat<f64> {
        assert_eq!(u.len(), self.size, "Trial vector has the wrong size");
        (self.jacobian)(u, t)
    }

    /// Overwrite the essential entries of `u` with their values at time `t`
    pub fn prescribe(&self, t: f64, u: &mut [f64]) {
        if let Some(prescribe) = &self.prescribe {
            prescribe(t, u);
        }
    }

    /// Freeze time, giving the algebraic system `F(u, t) = 0`
    pub fn at_time(&self, t: f64) -> FrozenResidual<'_> {
        FrozenResidual { op: self, time: t }
    }
}

/// `F(·, t)` at a fixed time, used for quasi-static solves
pub struct FrozenResidual<'a> {
    op: &'a ResidualOperator,
    time: f64,
}

impl NonlinearOperator for FrozenResidual<'_> {
    fn size(&self) -> usize {
        self.op.size()
    }

    fn residual(&mut self, x: &[f64]) -> Vec<f64> {
        self.op.residual(x, self.time)
    }

    fn jacobian(&mut self, x: &[f64]) -> CsMat<f64> {
        self.op.jacobian(x, self.time)
    }

    fn constrained_dofs(&self) -> &[usize] {
        self.op.essential_dofs()
    }
}

/// Replace constrained rows and columns by identity rows and columns
///
/// With a zero right-hand side on those rows, the correction at constrained
/// dofs is exactly zero, so the iterate keeps its prescribed values.
pub fn eliminate_constrained(a: &CsMat<f64>, constrained: &[bool]) -> CsMat<f64> {
    let n = a.rows();
    assert_eq!(constrained.len(), n, "Constraint mask has the wrong size");

    let mut triplets = TriMat::with_capacity((n, a.cols()), a.nnz());
    for (i, row) in a.outer_iterator().enumerate() {
        if constrained[i] {
            continue;
        }
        for (j, &val) in row.iter() {
            if !constrained[j] {
                triplets.add_triplet(i, j, val);
            }
        }
    }
    for (i, _) in constrained.iter().enumerate().filter(|(_, &c)| c) {
        triplets.add_triplet(i, i, 1.0);
    }

    let out: CsMat<f64> = triplets.to_csr();
    if a.is_csr() {
        out
    } else {
        out.to_csc()
    }
}

/// Sparse `alpha * A + beta * B`
pub fn linear_combination(alpha: f64, a: &CsMat<f64>, beta: f64, b: &CsMat<f64>) -> CsMat<f64> {
    assert_eq!(a.shape(), b.shape(), "Matrix shapes differ");

    let mut triplets = TriMat::with_capacity(a.shape(), a.nnz() + b.nnz());
    for (scale, m) in [(alpha, a), (beta, b)] {
        for (val, (i, j)) in m.iter() {
            triplets.add_triplet(i, j, scale * val);
        }
    }
    triplets.to_csr()
}

/// y = A x
pub fn mat_vec(a: &CsMat<f64>, x: &[f64]) -> Vec<f64> {
    assert_eq!(a.cols(), x.len(), "Vector length does not match matrix");
    if a.is_csr() {
        return a
            .outer_iterator()
            .map(|row| row.iter().map(|(j, v)| v * x[j]).sum())
            .collect();
    }
    let mut y = vec![0.0; a.rows()];
    for (j, col) in a.outer_iterator().enumerate() {
        for (i, v) in col.iter() {
            y[i] += v * x[j];
        }
    }
    y
}
