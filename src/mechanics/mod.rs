//! Solid mechanics for large-deformation hyperelasticity
//!
//! This module provides:
//! - The compressible neo-Hookean constitutive model
//! - Total-Lagrangian element residual and tangent
//! - Body force and traction load vectors

pub mod constitutive;
pub mod element;
pub mod body_force;

pub use constitutive::{NeoHookean, Tangent};
pub use element::TotalLagrangianElement;
pub use body_force::BodyForce;
