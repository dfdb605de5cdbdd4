/// A 4-node linear tetrahedral element (Tet4)
///
/// Vertices 0, 1, 2, 3 are ordered so the signed volume is positive.
#[derive(Debug, Clone)]
pub struct TetElement {
    /// Global node indices for this element
    pub nodes: [usize; 4],
    /// Material attribute
    pub attribute: usize,
}

impl TetElement {
    pub fn new(nodes: [usize; 4], attribute: usize) -> Self {
        Self { nodes, attribute }
    }

    /// Local faces as vertex triples, face `i` being opposite vertex `i`
    pub fn faces(&self) -> [[usize; 3]; 4] {
        let [a, b, c, d] = self.nodes;
        [[b, c, d], [a, c, d], [a, b, d], [a, b, c]]
    }
}

/// A linear triangle on the domain boundary
#[derive(Debug, Clone)]
pub struct BoundaryFace {
    pub nodes: [usize; 3],
    /// Boundary attribute used to select boundary conditions
    pub attribute: usize,
}

impl BoundaryFace {
    pub fn new(nodes: [usize; 3], attribute: usize) -> Self {
        Self { nodes, attribute }
    }
}

/// Connectivity information for the mesh
#[derive(Debug, Clone)]
pub struct Connectivity {
    pub elements: Vec<TetElement>,
    pub boundary_faces: Vec<BoundaryFace>,
}

impl Connectivity {
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            boundary_faces: Vec::new(),
        }
    }

    pub fn add_element(&mut self, element: TetElement) {
        self.elements.push(element);
    }

    pub fn add_boundary_face(&mut self, face: BoundaryFace) {
        self.boundary_faces.push(face);
    }

    pub fn num_elements(&self) -> usize {
        self.elements.len()
    }

    /// Faces referenced by exactly one element, in element order
    pub fn exterior_faces(&self) -> Vec<[usize; 3]> {
        use std::collections::HashMap;

        let key = |f: &[usize; 3]| {
            let mut k = *f;
            k.sort_unstable();
            k
        };

        let mut counts: HashMap<[usize; 3], usize> = HashMap::new();
        for elem in &self.elements {
            for face in elem.faces() {
                *counts.entry(key(&face)).or_insert(0) += 1;
            }
        }

        self.elements
            .iter()
            .flat_map(|elem| elem.faces())
            .filter(|face| counts.get(&key(face)) == Some(&1))
            .collect()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new()
    }
}
