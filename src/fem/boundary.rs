//! Boundary condition bookkeeping for one physics module
//!
//! Essential conditions prescribe dof values, either on boundary attributes
//! (optionally a single vector component) or on an explicit list of true
//! dofs; natural conditions contribute boundary integrals to the residual.
//! Definitions are collected before setup and resolved against the mesh and
//! space in `complete_setup`.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use nalgebra::Point3;

use crate::error::{Result, SimError};
use crate::fem::{Coefficient, FiniteElementSpace};
use crate::linalg::residual::EssentialFn;
use crate::mesh::Mesh;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BcKind {
    Essential,
    Natural,
}

/// One boundary condition definition
#[derive(Debug, Clone)]
pub struct BoundaryCondition {
    pub name: String,
    pub kind: BcKind,
    pub attributes: BTreeSet<usize>,
    pub coefficient: Coefficient,
    /// Restrict an essential condition to one component
    pub component: Option<usize>,
}

/// A dof with its prescribed-value source
#[derive(Debug, Clone)]
struct PrescribedDof {
    dof: usize,
    position: Point3<f64>,
    component: usize,
    coefficient: Coefficient,
}

/// Essential values on explicit true dofs
#[derive(Debug, Clone)]
struct TrueDofCondition {
    name: String,
    dofs: Vec<usize>,
    coefficient: Coefficient,
}

/// Definition order of essential conditions, for first-wins resolution
#[derive(Debug, Clone, Copy)]
enum EssentialSource {
    Boundary(usize),
    TrueDofs(usize),
}

#[derive(Debug, Clone, Default)]
pub struct BoundaryConditionManager {
    essential: Vec<BoundaryCondition>,
    true_dof_conditions: Vec<TrueDofCondition>,
    order: Vec<EssentialSource>,
    natural: Vec<BoundaryCondition>,
    prescribed: Vec<PrescribedDof>,
    essential_dofs: Vec<usize>,
}

impl BoundaryConditionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an essential condition
    ///
    /// An attribute (and component) that already carries an essential
    /// condition keeps its first definition; the duplicate is dropped with a
    /// warning.
    pub fn add_essential(
        &mut self,
        name: &str,
        attributes: BTreeSet<usize>,
        coefficient: Coefficient,
        component: Option<usize>,
    ) {
        let overlaps = |existing: &BoundaryCondition, attr: usize| {
            existing.attributes.contains(&attr)
                && (existing.component.is_none() || component.is_none() || existing.component == component)
        };

        let mut kept = BTreeSet::new();
        for attr in attributes {
            if self.essential.iter().any(|bc| overlaps(bc, attr)) {
                warn!(
                    "Multiple definition of essential boundary on attribute {} ({}); using first definition given",
                    attr, name
                );
            } else {
                kept.insert(attr);
            }
        }

        if !kept.is_empty() {
            self.order.push(EssentialSource::Boundary(self.essential.len()));
            self.essential.push(BoundaryCondition {
                name: name.to_string(),
                kind: BcKind::Essential,
                attributes: kept,
                coefficient,
                component,
            });
        }
    }

    /// Add an essential condition on explicit true dofs
    ///
    /// The coefficient is evaluated at the node owning each dof, for the
    /// component the dof carries. Dofs already prescribed by an earlier
    /// definition keep it.
    pub fn add_true_dofs(&mut self, name: &str, dofs: Vec<usize>, coefficient: Coefficient) {
        self.order.push(EssentialSource::TrueDofs(self.true_dof_conditions.len()));
        self.true_dof_conditions.push(TrueDofCondition {
            name: name.to_string(),
            dofs,
            coefficient,
        });
    }

    pub fn add_natural(&mut self, name: &str, attributes: BTreeSet<usize>, coefficient: Coefficient) {
        self.natural.push(BoundaryCondition {
            name: name.to_string(),
            kind: BcKind::Natural,
            attributes,
            coefficient,
            component: None,
        });
    }

    pub fn natural(&self) -> &[BoundaryCondition] {
        &self.natural
    }

    pub fn has_essential(&self) -> bool {
        !self.order.is_empty()
    }

    /// Validate definitions and compute the essential dof list
    pub fn complete_setup(&mut self, context: &str, mesh: &Mesh, space: &FiniteElementSpace) -> Result<()> {
        let available = mesh.boundary_attributes();

        for bc in self.essential.iter().chain(self.natural.iter()) {
            if let Some(missing) = bc.attributes.iter().find(|a| !available.contains(*a)) {
                return Err(SimError::configuration(
                    context,
                    format!(
                        "boundary condition '{}' references attribute {} which is not on the mesh (available: {:?})",
                        bc.name, missing, available
                    ),
                ));
            }
            if let Some(c) = bc.component {
                if c >= space.components() {
                    return Err(SimError::configuration(
                        context,
                        format!(
                            "boundary condition '{}' restricts to component {} but the field has {}",
                            bc.name,
                            c,
                            space.components()
                        ),
                    ));
                }
            }
            if bc.coefficient.is_vector() && space.components() == 1 {
                return Err(SimError::configuration(
                    context,
                    format!("boundary condition '{}' is vector valued on a scalar field", bc.name),
                ));
            }
        }

        for tc in &self.true_dof_conditions {
            if let Some(&bad) = tc.dofs.iter().find(|&&d| d >= space.true_dofs()) {
                return Err(SimError::configuration(
                    context,
                    format!(
                        "boundary condition '{}' names true dof {} but the field has {}",
                        tc.name,
                        bad,
                        space.true_dofs()
                    ),
                ));
            }
            if tc.coefficient.is_vector() && space.components() == 1 {
                return Err(SimError::configuration(
                    context,
                    format!("boundary condition '{}' is vector valued on a scalar field", tc.name),
                ));
            }
        }

        // First definition wins on shared edges and corners
        let mut by_dof: BTreeMap<usize, PrescribedDof> = BTreeMap::new();
        let mut insert = |dof: usize, node: usize, component: usize, coefficient: &Coefficient, name: &str| {
            if by_dof.contains_key(&dof) {
                debug!("essential dof {} already prescribed, ignoring '{}'", dof, name);
                return;
            }
            by_dof.insert(
                dof,
                PrescribedDof {
                    dof,
                    position: mesh.geometry.nodes[node],
                    component,
                    coefficient: coefficient.clone(),
                },
            );
        };

        for source in &self.order {
            match *source {
                EssentialSource::Boundary(i) => {
                    let bc = &self.essential[i];
                    let components: Vec<usize> = match bc.component {
                        Some(c) => vec![c],
                        None => (0..space.components()).collect(),
                    };
                    for node in mesh.boundary_nodes(&bc.attributes) {
                        for &c in &components {
                            insert(space.dof(node, c), node, c, &bc.coefficient, &bc.name);
                        }
                    }
                }
                EssentialSource::TrueDofs(i) => {
                    let tc = &self.true_dof_conditions[i];
                    for &dof in &tc.dofs {
                        let (node, c) = space.node_component(dof);
                        insert(dof, node, c, &tc.coefficient, &tc.name);
                    }
                }
            }
        }

        self.essential_dofs = by_dof.keys().copied().collect();
        self.prescribed = by_dof.into_values().collect();
        Ok(())
    }

    /// Sorted, unique essential true dofs (empty before `complete_setup`)
    pub fn essential_dofs(&self) -> &[usize] {
        &self.essential_dofs
    }

    /// Write the essential values at time `t` into `u`
    pub fn prescribe(&self, t: f64, u: &mut [f64]) {
        for p in &self.prescribed {
            u[p.dof] = p.coefficient.component(&p.position, t, p.component);
        }
    }

    /// Owned prescriber for a residual operator
    pub fn prescriber(&self) -> EssentialFn {
        let prescribed = self.prescribed.clone();
        Box::new(move |t: f64, u: &mut [f64]| {
            for p in &prescribed {
                u[p.dof] = p.coefficient.component(&p.position, t, p.component);
            }
        })
    }
}
