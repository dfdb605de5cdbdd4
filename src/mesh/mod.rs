pub mod topology;
pub mod geometry;
pub mod generator;

pub use topology::{TetElement, BoundaryFace, Connectivity};
pub use geometry::{Mesh, Geometry};
pub use generator::MeshGenerator;
