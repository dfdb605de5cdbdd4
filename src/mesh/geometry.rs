use std::collections::BTreeSet;

use nalgebra::Point3;

use super::topology::Connectivity;

/// Geometric information for the mesh
#[derive(Debug, Clone)]
pub struct Geometry {
    /// Node coordinates in the reference configuration
    pub nodes: Vec<Point3<f64>>,
}

impl Geometry {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn add_node(&mut self, x: f64, y: f64, z: f64) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Point3::new(x, y, z));
        idx
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn get_node(&self, idx: usize) -> Option<&Point3<f64>> {
        self.nodes.get(idx)
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

/// Complete mesh with geometry, volume connectivity and attributed boundary faces
///
/// Physics modules share one mesh read-only (behind an `Arc`); nothing in the
/// time-stepping core mutates it after construction.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub geometry: Geometry,
    pub connectivity: Connectivity,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            geometry: Geometry::new(),
            connectivity: Connectivity::new(),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.geometry.num_nodes()
    }

    pub fn num_elements(&self) -> usize {
        self.connectivity.num_elements()
    }

    pub fn num_boundary_faces(&self) -> usize {
        self.connectivity.boundary_faces.len()
    }

    /// Vertex coordinates of element `elem_idx`
    pub fn element_vertices(&self, elem_idx: usize) -> [Point3<f64>; 4] {
        let elem = &self.connectivity.elements[elem_idx];
        elem.nodes.map(|n| self.geometry.nodes[n])
    }

    /// Vertex coordinates of boundary face `face_idx`
    pub fn face_vertices(&self, face_idx: usize) -> [Point3<f64>; 3] {
        let face = &self.connectivity.boundary_faces[face_idx];
        face.nodes.map(|n| self.geometry.nodes[n])
    }

    /// All boundary attributes present on the mesh
    pub fn boundary_attributes(&self) -> BTreeSet<usize> {
        self.connectivity
            .boundary_faces
            .iter()
            .map(|f| f.attribute)
            .collect()
    }

    /// Nodes lying on any boundary face tagged with one of `attributes`
    pub fn boundary_nodes(&self, attributes: &BTreeSet<usize>) -> BTreeSet<usize> {
        self.connectivity
            .boundary_faces
            .iter()
            .filter(|f| attributes.contains(&f.attribute))
            .flat_map(|f| f.nodes)
            .collect()
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}
