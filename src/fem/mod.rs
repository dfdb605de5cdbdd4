pub mod basis;
pub mod quadrature;
pub mod coefficient;
pub mod space;
pub mod element;
pub mod assembly;
pub mod boundary;
pub mod time_integration;

pub use basis::{Tet4Basis, Tri3Basis};
pub use quadrature::{FaceQuadrature, GaussQuadrature};
pub use coefficient::{constant_scalar, constant_vector, Coefficient, ScalarCoefficient, VectorCoefficient};
pub use space::FiniteElementSpace;
pub use element::ElementMatrix;
pub use assembly::Assembler;
pub use boundary::{BcKind, BoundaryCondition, BoundaryConditionManager};
pub use time_integration::{DirichletEnforcement, FirstOrderOde, SecondOrderOde, TimeStepStats, TimestepMethod};
