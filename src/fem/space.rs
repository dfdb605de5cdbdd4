use std::collections::BTreeSet;

use crate::fem::Coefficient;
use crate::mesh::Mesh;

/// Continuous P1 nodal finite element space
///
/// DOF numbering is node-major: `dof = node * components + component`.
/// Every node owns `components` true dofs; there are no hanging or shared
/// entries to remove in a serial mesh.
#[derive(Debug, Clone)]
pub struct FiniteElementSpace {
    num_nodes: usize,
    components: usize,
}

impl FiniteElementSpace {
    pub fn new(mesh: &Mesh, components: usize) -> Self {
        assert!(components > 0, "A space needs at least one component");
        Self {
            num_nodes: mesh.num_nodes(),
            components,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub fn components(&self) -> usize {
        self.components
    }

    /// Number of true dofs
    pub fn true_dofs(&self) -> usize {
        self.num_nodes * self.components
    }

    #[inline]
    pub fn dof(&self, node: usize, component: usize) -> usize {
        node * self.components + component
    }

    /// Node and component owning a true dof
    #[inline]
    pub fn node_component(&self, dof: usize) -> (usize, usize) {
        (dof / self.components, dof % self.components)
    }

    /// Element dofs for `nodes`, node-major
    pub fn local_dofs<const N: usize>(&self, nodes: &[usize]) -> [usize; N] {
        assert_eq!(N, nodes.len() * self.components, "Local dof count mismatch");
        let mut dofs = [0; N];
        for (a, &node) in nodes.iter().enumerate() {
            for c in 0..self.components {
                dofs[a * self.components + c] = self.dof(node, c);
            }
        }
        dofs
    }

    /// Sorted dofs on boundary faces with the given attributes
    ///
    /// `component = None` selects every component of each boundary node.
    pub fn boundary_dofs(
        &self,
        mesh: &Mesh,
        attributes: &BTreeSet<usize>,
        component: Option<usize>,
    ) -> Vec<usize> {
        let nodes = mesh.boundary_nodes(attributes);
        let components: Vec<usize> = match component {
            Some(c) => vec![c],
            None => (0..self.components).collect(),
        };

        let mut dofs: Vec<usize> = nodes
            .iter()
            .flat_map(|&n| components.iter().map(move |&c| self.dof(n, c)))
            .collect();
        dofs.sort_unstable();
        dofs
    }

    /// Nodal interpolation of a coefficient at time `t`
    pub fn project(&self, mesh: &Mesh, coefficient: &Coefficient, t: f64) -> Vec<f64> {
        let mut values = vec![0.0; self.true_dofs()];
        for (node, x) in mesh.geometry.nodes.iter().enumerate() {
            for c in 0..self.components {
                values[self.dof(node, c)] = coefficient.component(x, t, c);
            }
        }
        values
    }
}
