//! Heat conduction
//!
//! ρ c_p ∂T/∂t - ∇·(κ ∇T) + q(T) = f(x, t)
//!
//! with prescribed temperatures on essential boundaries and an inward heat
//! flux on natural boundaries. The semi-discrete residual is
//!
//! F(T, t) = K T + R(T) - f(t) - g(t)
//!
//! where K is the conductivity matrix, R the assembled reaction term, f the
//! source load and g the boundary flux load.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info};
use sprs::CsMat;

use super::{BasePhysics, FieldState, PhysicsModule, SolverOptions};
use crate::error::{Result, SimError};
use crate::fem::{
    constant_scalar, Assembler, BoundaryCondition, BoundaryConditionManager, Coefficient, DirichletEnforcement,
    ElementMatrix, FiniteElementSpace, FirstOrderOde, ScalarCoefficient, Tet4Basis, TimeStepStats, TimestepMethod,
};
use crate::linalg::{linear_combination, mat_vec, NonlinearSolverConfig, ResidualOperator};
use crate::mesh::Mesh;

/// Reaction q(T) or its derivative dq/dT
pub type ReactionFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Nonlinear heat conduction module
pub struct ThermalConduction {
    base: BasePhysics,
    space: Arc<FiniteElementSpace>,
    temperature: FieldState,
    options: SolverOptions,

    conductivity: ScalarCoefficient,
    density: ScalarCoefficient,
    specific_heat: ScalarCoefficient,
    source: Option<ScalarCoefficient>,
    reaction: Option<(ReactionFn, ReactionFn)>,
    bcs: BoundaryConditionManager,

    residual: Option<ResidualOperator>,
    ode: Option<FirstOrderOde>,
}

impl ThermalConduction {
    pub fn new(mesh: Arc<Mesh>, options: SolverOptions) -> Self {
        let space = Arc::new(FiniteElementSpace::new(&mesh, 1));
        let temperature = FieldState::new("temperature", space.clone());

        Self {
            base: BasePhysics::new("thermal", mesh),
            space,
            temperature,
            options,
            conductivity: constant_scalar(1.0),
            density: constant_scalar(1.0),
            specific_heat: constant_scalar(1.0),
            source: None,
            reaction: None,
            bcs: BoundaryConditionManager::new(),
            residual: None,
            ode: None,
        }
    }

    /// Quasi-static defaults: CG with Jacobi, Newton rel 1e-4 / abs 1e-8
    pub fn default_quasistatic_options() -> SolverOptions {
        SolverOptions {
            method: TimestepMethod::QuasiStatic,
            enforcement: DirichletEnforcement::RateControl,
            nonlinear: NonlinearSolverConfig {
                print_level: 1,
                ..Default::default()
            },
        }
    }

    /// Transient defaults: backward Euler with the quasi-static solvers
    pub fn default_dynamic_options() -> SolverOptions {
        SolverOptions {
            method: TimestepMethod::BackwardEuler,
            ..Self::default_quasistatic_options()
        }
    }

    pub fn set_temperature_bcs(&mut self, attributes: BTreeSet<usize>, value: ScalarCoefficient) {
        self.bcs.add_essential("temperature", attributes, Coefficient::Scalar(value), None);
    }

    /// Prescribed temperature on explicit true dofs
    pub fn set_temperature_true_dofs(&mut self, dofs: Vec<usize>, value: ScalarCoefficient) {
        self.bcs.add_true_dofs("temperature", dofs, Coefficient::Scalar(value));
    }

    /// Inward heat flux on the given boundary attributes
    pub fn set_flux_bcs(&mut self, attributes: BTreeSet<usize>, flux: ScalarCoefficient) {
        self.bcs.add_natural("flux", attributes, Coefficient::Scalar(flux));
    }

    pub fn set_conductivity(&mut self, kappa: ScalarCoefficient) {
        self.conductivity = kappa;
    }

    pub fn set_density(&mut self, rho: ScalarCoefficient) {
        self.density = rho;
    }

    pub fn set_specific_heat(&mut self, cp: ScalarCoefficient) {
        self.specific_heat = cp;
    }

    pub fn set_source(&mut self, source: ScalarCoefficient) {
        self.source = Some(source);
    }

    /// Nonlinear reaction q(T) with its derivative dq/dT
    pub fn set_reaction(&mut self, q: ReactionFn, dq_dt: ReactionFn) {
        self.reaction = Some((q, dq_dt));
    }

    /// Initialize the temperature from a coefficient at the current time
    pub fn set_temperature(&mut self, temperature: ScalarCoefficient) {
        let mesh = self.base.mesh().clone();
        self.temperature
            .project(&mesh, &Coefficient::Scalar(temperature), self.base.time());
    }

    /// Initialize the temperature from raw true-dof values
    pub fn set_temperature_values(&mut self, values: Vec<f64>) -> Result<()> {
        self.temperature.set_values(values)
    }

    pub fn temperature(&self) -> &FieldState {
        &self.temperature
    }

    pub fn space(&self) -> &Arc<FiniteElementSpace> {
        &self.space
    }

    /// Rate du/dt of the last committed step
    pub fn previous_rate(&self) -> Option<&[f64]> {
        self.ode.as_ref().map(|ode| ode.previous_du_dt())
    }

    /// Time and Newton statistics of the last committed step
    pub fn last_step_stats(&self) -> Option<&TimeStepStats> {
        self.ode.as_ref().and_then(|ode| ode.last_stats())
    }

    fn validate(&self) -> Result<()> {
        let method = self.options.method;
        if !method.is_first_order() {
            return Err(SimError::configuration(
                self.base.name(),
                format!("timestepper {:?} is not available for heat conduction", method),
            ));
        }
        if method == TimestepMethod::QuasiStatic && !self.bcs.has_essential() && self.reaction.is_none() {
            return Err(SimError::configuration(
                self.base.name(),
                "a quasi-static solve needs at least one temperature boundary condition",
            ));
        }
        Ok(())
    }

    fn build_residual(&self) -> ResidualOperator {
        let mesh = self.base.mesh().clone();
        let n = self.space.true_dofs();

        let kappa = &self.conductivity;
        let stiffness = Arc::new(Assembler::assemble_matrix::<4, _>(n, mesh.num_elements(), |e| {
            let verts = mesh.element_vertices(e);
            let k = kappa(&Tet4Basis::centroid(&verts), 0.0);
            (mesh.connectivity.elements[e].nodes, ElementMatrix::diffusion(&verts, k))
        }));

        let source = self.source.clone();
        let flux: Vec<BoundaryCondition> = self.bcs.natural().to_vec();
        let reaction = self.reaction.clone();

        let residual = {
            let mesh = mesh.clone();
            let stiffness = stiffness.clone();
            let reaction = reaction.clone();
            move |u: &[f64], t: f64| -> Vec<f64> {
                let mut r = mat_vec(&stiffness, u);

                if let Some((q, _)) = &reaction {
                    let react = Assembler::assemble_vector::<4, _>(n, mesh.num_elements(), |e| {
                        let nodes = mesh.connectivity.elements[e].nodes;
                        let u_local = nodes.map(|i| u[i]);
                        (nodes, ElementMatrix::reaction(&mesh.element_vertices(e), &u_local, |v| q(v)))
                    });
                    for (ri, qi) in r.iter_mut().zip(react) {
                        *ri += qi;
                    }
                }

                if let Some(f) = &source {
                    let load = Assembler::assemble_vector::<4, _>(n, mesh.num_elements(), |e| {
                        let verts = mesh.element_vertices(e);
                        (mesh.connectivity.elements[e].nodes, ElementMatrix::load(&verts, |x| f(x, t)))
                    });
                    for (ri, fi) in r.iter_mut().zip(load) {
                        *ri -= fi;
                    }
                }

                if !flux.is_empty() {
                    for (ri, gi) in r.iter_mut().zip(flux_load(&mesh, n, &flux, t)) {
                        *ri -= gi;
                    }
                }

                r
            }
        };

        let jacobian = move |u: &[f64], _t: f64| -> CsMat<f64> {
            match &reaction {
                Some((_, dq)) => {
                    let dr = Assembler::assemble_matrix::<4, _>(n, mesh.num_elements(), |e| {
                        let nodes = mesh.connectivity.elements[e].nodes;
                        let u_local = nodes.map(|i| u[i]);
                        let verts = mesh.element_vertices(e);
                        (nodes, ElementMatrix::reaction_gradient(&verts, &u_local, |v| dq(v)))
                    });
                    linear_combination(1.0, &stiffness, 1.0, &dr)
                }
                None => (*stiffness).clone(),
            }
        };

        ResidualOperator::new(n, Box::new(residual), Box::new(jacobian))
            .with_essential(self.bcs.essential_dofs().to_vec(), self.bcs.prescriber())
    }

    fn build_mass(&self) -> CsMat<f64> {
        let mesh = self.base.mesh();
        let rho = &self.density;
        let cp = &self.specific_heat;

        Assembler::assemble_matrix::<4, _>(self.space.true_dofs(), mesh.num_elements(), |e| {
            let verts = mesh.element_vertices(e);
            let c = Tet4Basis::centroid(&verts);
            let capacity = rho(&c, 0.0) * cp(&c, 0.0);
            (mesh.connectivity.elements[e].nodes, ElementMatrix::mass(&verts, capacity))
        })
    }
}

/// Boundary flux load g_i = Σ ∫ g N_i dA over all flux conditions
fn flux_load(mesh: &Mesh, n: usize, flux: &[BoundaryCondition], t: f64) -> Vec<f64> {
    Assembler::assemble_vector_filtered::<3, _>(n, mesh.num_boundary_faces(), |f| {
        let face = &mesh.connectivity.boundary_faces[f];
        let active: Vec<&BoundaryCondition> = flux
            .iter()
            .filter(|bc| bc.attributes.contains(&face.attribute))
            .collect();
        if active.is_empty() {
            return None;
        }
        let verts = mesh.face_vertices(f);
        let g = ElementMatrix::face_load(&verts, |x| {
            active.iter().map(|bc| bc.coefficient.component(x, t, 0)).sum()
        });
        Some((face.nodes, g))
    })
}

impl PhysicsModule for ThermalConduction {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn complete_setup(&mut self) -> Result<()> {
        self.base.ensure_not_setup()?;
        self.validate()?;

        let mesh = self.base.mesh().clone();
        self.bcs.complete_setup(self.base.name(), &mesh, &self.space)?;

        let residual = self.build_residual();
        let mass = self.build_mass();
        let ode = FirstOrderOde::new(self.options.method, self.options.nonlinear.clone(), mass)?
            .with_enforcement(self.options.enforcement);

        info!(
            "{}: {} dofs, {} essential, method {:?} with {:?}",
            self.base.name(),
            self.space.true_dofs(),
            self.bcs.essential_dofs().len(),
            self.options.method,
            self.options.enforcement
        );

        self.residual = Some(residual);
        self.ode = Some(ode);
        self.base.mark_setup_complete();
        Ok(())
    }

    fn advance_timestep(&mut self, dt: &mut f64) -> Result<()> {
        self.base.ensure_setup()?;
        self.base.ensure_valid_dt(*dt)?;
        let (Some(ode), Some(residual)) = (self.ode.as_mut(), self.residual.as_ref()) else {
            return Err(SimError::setup_state(self.base.name(), "operators missing after setup"));
        };

        let mut t = self.base.time();
        let mut u = self.temperature.values().to_vec();
        let stats = ode
            .step(residual, &mut u, &mut t, dt)
            .map_err(|source| self.base.convergence_error(source))?;

        self.temperature.values_mut().copy_from_slice(&u);
        self.base.commit_step(t);

        debug!(
            "{}: cycle {} t = {:.6e}, {} Newton iterations",
            self.base.name(),
            self.base.cycle(),
            t,
            stats.iterations
        );
        Ok(())
    }

    fn time(&self) -> f64 {
        self.base.time()
    }

    fn set_time(&mut self, time: f64) {
        self.base.set_time(time);
    }

    fn cycle(&self) -> usize {
        self.base.cycle()
    }

    fn states(&self) -> Vec<&FieldState> {
        vec![&self.temperature]
    }
}
