//! Spatially and temporally varying coefficients
//!
//! Coefficients are shared closures of `(position, time)`. They are cloned
//! into the residual closures of a physics module, so they must be
//! `Send + Sync` and free of interior state.

use std::fmt;
use std::sync::Arc;

use nalgebra::{Point3, Vector3};

pub type ScalarCoefficient = Arc<dyn Fn(&Point3<f64>, f64) -> f64 + Send + Sync>;
pub type VectorCoefficient = Arc<dyn Fn(&Point3<f64>, f64) -> Vector3<f64> + Send + Sync>;

pub fn constant_scalar(value: f64) -> ScalarCoefficient {
    Arc::new(move |_: &Point3<f64>, _: f64| value)
}

pub fn constant_vector(value: Vector3<f64>) -> VectorCoefficient {
    Arc::new(move |_: &Point3<f64>, _: f64| value)
}

/// Scalar or vector coefficient, as carried by boundary conditions
#[derive(Clone)]
pub enum Coefficient {
    Scalar(ScalarCoefficient),
    Vector(VectorCoefficient),
}

impl Coefficient {
    pub fn constant_scalar(value: f64) -> Self {
        Coefficient::Scalar(constant_scalar(value))
    }

    pub fn constant_vector(value: Vector3<f64>) -> Self {
        Coefficient::Vector(constant_vector(value))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Coefficient::Vector(_))
    }

    /// Component `c` at `(x, t)`; a scalar coefficient ignores `c`
    pub fn component(&self, x: &Point3<f64>, t: f64, c: usize) -> f64 {
        match self {
            Coefficient::Scalar(f) => f(x, t),
            Coefficient::Vector(f) => f(x, t)[c],
        }
    }
}

impl fmt::Debug for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coefficient::Scalar(_) => write!(f, "Coefficient::Scalar(..)"),
            Coefficient::Vector(_) => write!(f, "Coefficient::Vector(..)"),
        }
    }
}
