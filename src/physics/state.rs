use std::sync::Arc;

use crate::error::{Result, SimError};
use crate::fem::{Coefficient, FiniteElementSpace};
use crate::mesh::Mesh;

/// A named discrete field on a finite element space
///
/// The value vector always has exactly `space.true_dofs()` entries.
#[derive(Debug, Clone)]
pub struct FieldState {
    name: String,
    space: Arc<FiniteElementSpace>,
    values: Vec<f64>,
}

impl FieldState {
    /// Zero-initialized field
    pub fn new(name: &str, space: Arc<FiniteElementSpace>) -> Self {
        let values = vec![0.0; space.true_dofs()];
        Self {
            name: name.to_string(),
            space,
            values,
        }
    }

    pub fn from_values(name: &str, space: Arc<FiniteElementSpace>, values: Vec<f64>) -> Result<Self> {
        let mut state = Self::new(name, space);
        state.set_values(values)?;
        Ok(state)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn space(&self) -> &Arc<FiniteElementSpace> {
        &self.space
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Replace all values, checking the size against the space
    pub fn set_values(&mut self, values: Vec<f64>) -> Result<()> {
        if values.len() != self.space.true_dofs() {
            return Err(SimError::FieldSize {
                field: self.name.clone(),
                expected: self.space.true_dofs(),
                actual: values.len(),
            });
        }
        self.values = values;
        Ok(())
    }

    /// Interpolate a coefficient at time `t`
    pub fn project(&mut self, mesh: &Mesh, coefficient: &Coefficient, t: f64) {
        self.values = self.space.project(mesh, coefficient, t);
    }

    /// Euclidean norm of the dof vector
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// (min, max) over all dofs
    pub fn min_max(&self) -> (f64, f64) {
        self.values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}
