//! Large-deformation solid mechanics
//!
//! Total-Lagrangian hyperelasticity with a neo-Hookean material:
//!
//! ρ ü - ∇·P(F) = b,   P·N = t on traction boundaries
//!
//! Semi-discrete residual F(u, t) = f_int(u) - f_body(t) - f_traction(t).

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{debug, info};
use sprs::CsMat;

use super::{BasePhysics, FieldState, PhysicsModule, SolverOptions};
use crate::error::{Result, SimError};
use crate::fem::{
    constant_scalar, Assembler, BoundaryCondition, BoundaryConditionManager, Coefficient, DirichletEnforcement,
    FiniteElementSpace, ScalarCoefficient, SecondOrderOde, Tet4Basis, TimeStepStats, TimestepMethod,
    VectorCoefficient,
};
use crate::linalg::{NonlinearSolverConfig, ResidualOperator};
use crate::mechanics::{BodyForce, NeoHookean, TotalLagrangianElement};
use crate::mesh::Mesh;

/// Nonlinear hyperelastic solid module
pub struct NonlinearSolid {
    base: BasePhysics,
    space: Arc<FiniteElementSpace>,
    displacement: FieldState,
    velocity: FieldState,
    options: SolverOptions,

    material: NeoHookean,
    density: ScalarCoefficient,
    body_force: Option<VectorCoefficient>,
    bcs: BoundaryConditionManager,

    residual: Option<ResidualOperator>,
    ode: Option<SecondOrderOde>,
}

impl NonlinearSolid {
    pub fn new(mesh: Arc<Mesh>, options: SolverOptions) -> Self {
        let space = Arc::new(FiniteElementSpace::new(&mesh, 3));

        Self {
            base: BasePhysics::new("solid", mesh),
            displacement: FieldState::new("displacement", space.clone()),
            velocity: FieldState::new("velocity", space.clone()),
            space,
            options,
            material: NeoHookean::new(0.25, 5.0),
            density: constant_scalar(1.0),
            body_force: None,
            bcs: BoundaryConditionManager::new(),
            residual: None,
            ode: None,
        }
    }

    pub fn default_quasistatic_options() -> SolverOptions {
        SolverOptions {
            method: TimestepMethod::QuasiStatic,
            enforcement: DirichletEnforcement::RateControl,
            nonlinear: NonlinearSolverConfig {
                rel_tol: 1.0e-6,
                abs_tol: 1.0e-10,
                max_iterations: 50,
                print_level: 1,
                ..Default::default()
            },
        }
    }

    pub fn default_dynamic_options() -> SolverOptions {
        SolverOptions {
            method: TimestepMethod::AverageAcceleration,
            ..Self::default_quasistatic_options()
        }
    }

    /// Prescribe all displacement components
    pub fn set_displacement_bcs(&mut self, attributes: BTreeSet<usize>, value: VectorCoefficient) {
        self.bcs.add_essential("displacement", attributes, Coefficient::Vector(value), None);
    }

    /// Prescribe one displacement component
    pub fn set_displacement_component_bcs(
        &mut self,
        attributes: BTreeSet<usize>,
        value: ScalarCoefficient,
        component: usize,
    ) {
        self.bcs
            .add_essential("displacement", attributes, Coefficient::Scalar(value), Some(component));
    }

    /// Prescribe displacement on explicit true dofs
    ///
    /// Each dof takes the coefficient component it carries.
    pub fn set_displacement_true_dofs(&mut self, dofs: Vec<usize>, value: VectorCoefficient) {
        self.bcs.add_true_dofs("displacement", dofs, Coefficient::Vector(value));
    }

    /// Dead-load traction per unit reference area
    pub fn set_traction_bcs(&mut self, attributes: BTreeSet<usize>, traction: VectorCoefficient) {
        self.bcs.add_natural("traction", attributes, Coefficient::Vector(traction));
    }

    pub fn set_material(&mut self, material: NeoHookean) {
        self.material = material;
    }

    pub fn set_density(&mut self, rho: ScalarCoefficient) {
        self.density = rho;
    }

    pub fn set_body_force(&mut self, body_force: VectorCoefficient) {
        self.body_force = Some(body_force);
    }

    pub fn set_displacement(&mut self, displacement: VectorCoefficient) {
        let mesh = self.base.mesh().clone();
        self.displacement
            .project(&mesh, &Coefficient::Vector(displacement), self.base.time());
    }

    pub fn set_velocity(&mut self, velocity: VectorCoefficient) {
        let mesh = self.base.mesh().clone();
        self.velocity
            .project(&mesh, &Coefficient::Vector(velocity), self.base.time());
    }

    pub fn set_displacement_values(&mut self, values: Vec<f64>) -> Result<()> {
        self.displacement.set_values(values)
    }

    pub fn set_velocity_values(&mut self, values: Vec<f64>) -> Result<()> {
        self.velocity.set_values(values)
    }

    pub fn displacement(&self) -> &FieldState {
        &self.displacement
    }

    pub fn velocity(&self) -> &FieldState {
        &self.velocity
    }

    pub fn material(&self) -> &NeoHookean {
        &self.material
    }

    pub fn last_step_stats(&self) -> Option<&TimeStepStats> {
        self.ode.as_ref().and_then(|ode| ode.last_stats())
    }

    fn validate(&self) -> Result<()> {
        let method = self.options.method;
        if !method.is_second_order() {
            return Err(SimError::configuration(
                self.base.name(),
                format!("timestepper {:?} is not available for solid mechanics", method),
            ));
        }
        if method == TimestepMethod::QuasiStatic && !self.bcs.has_essential() {
            return Err(SimError::configuration(
                self.base.name(),
                "a quasi-static solid needs displacement boundary conditions to remove rigid body modes",
            ));
        }
        Ok(())
    }

    fn build_residual(&self) -> ResidualOperator {
        let mesh = self.base.mesh().clone();
        let space = self.space.clone();
        let n = space.true_dofs();
        let body_force = self.body_force.clone();
        let traction: Vec<BoundaryCondition> = self.bcs.natural().to_vec();

        let residual = {
            let mesh = mesh.clone();
            let space = space.clone();
            let material = self.material.clone();
            move |u: &[f64], t: f64| -> Vec<f64> {
                let mut r = Assembler::assemble_vector::<12, _>(n, mesh.num_elements(), |e| {
                    let dofs: [usize; 12] = space.local_dofs(&mesh.connectivity.elements[e].nodes);
                    let u_local = dofs.map(|d| u[d]);
                    let f = TotalLagrangianElement::internal_force(&mesh.element_vertices(e), &u_local, &material);
                    (dofs, f)
                });

                if let Some(b) = &body_force {
                    let load = Assembler::assemble_vector::<12, _>(n, mesh.num_elements(), |e| {
                        let dofs: [usize; 12] = space.local_dofs(&mesh.connectivity.elements[e].nodes);
                        (dofs, BodyForce::volume_load(&mesh.element_vertices(e), |x| b(x, t)))
                    });
                    for (ri, fi) in r.iter_mut().zip(load) {
                        *ri -= fi;
                    }
                }

                if !traction.is_empty() {
                    for (ri, gi) in r.iter_mut().zip(traction_load(&mesh, &space, &traction, t)) {
                        *ri -= gi;
                    }
                }

                r
            }
        };

        let material = self.material.clone();
        let jacobian = move |u: &[f64], _t: f64| -> CsMat<f64> {
            Assembler::assemble_matrix::<12, _>(n, mesh.num_elements(), |e| {
                let dofs: [usize; 12] = space.local_dofs(&mesh.connectivity.elements[e].nodes);
                let u_local = dofs.map(|d| u[d]);
                let k = TotalLagrangianElement::tangent_stiffness(&mesh.element_vertices(e), &u_local, &material);
                (dofs, k)
            })
        };

        ResidualOperator::new(n, Box::new(residual), Box::new(jacobian))
            .with_essential(self.bcs.essential_dofs().to_vec(), self.bcs.prescriber())
    }

    fn build_mass(&self) -> CsMat<f64> {
        let mesh = self.base.mesh();
        let rho = &self.density;
        let space = &self.space;

        Assembler::assemble_matrix::<12, _>(space.true_dofs(), mesh.num_elements(), |e| {
            let verts = mesh.element_vertices(e);
            let density = rho(&Tet4Basis::centroid(&verts), 0.0);
            let dofs: [usize; 12] = space.local_dofs(&mesh.connectivity.elements[e].nodes);
            (dofs, TotalLagrangianElement::mass(&verts, density))
        })
    }
}

/// Traction load Σ ∫ N^T t dA over all traction conditions
fn traction_load(mesh: &Mesh, space: &FiniteElementSpace, traction: &[BoundaryCondition], t: f64) -> Vec<f64> {
    Assembler::assemble_vector_filtered::<9, _>(space.true_dofs(), mesh.num_boundary_faces(), |f| {
        let face = &mesh.connectivity.boundary_faces[f];
        let active: Vec<&BoundaryCondition> = traction
            .iter()
            .filter(|bc| bc.attributes.contains(&face.attribute))
            .collect();
        if active.is_empty() {
            return None;
        }
        let load = BodyForce::traction_load(&mesh.face_vertices(f), |x| {
            let mut total = nalgebra::Vector3::zeros();
            for bc in &active {
                for c in 0..3 {
                    total[c] += bc.coefficient.component(x, t, c);
                }
            }
            total
        });
        let dofs: [usize; 9] = space.local_dofs(&face.nodes);
        Some((dofs, load))
    })
}

impl PhysicsModule for NonlinearSolid {
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
        let ode = SecondOrderOde::new(self.options.method, self.options.nonlinear.clone(), mass)?
            .with_enforcement(self.options.enforcement);

        info!(
            "{}: {} dofs, {} essential, method {:?}, mu = {}, K = {}",
            self.base.name(),
            self.space.true_dofs(),
            self.bcs.essential_dofs().len(),
            self.options.method,
            self.material.shear_modulus,
            self.material.bulk_modulus
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
        let mut u = self.displacement.values().to_vec();
        let mut v = self.velocity.values().to_vec();
        let stats = ode
            .step(residual, &mut u, &mut v, &mut t, dt)
            .map_err(|source| self.base.convergence_error(source))?;

        self.displacement.values_mut().copy_from_slice(&u);
        self.velocity.values_mut().copy_from_slice(&v);
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
        vec![&self.displacement, &self.velocity]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fem::constant_vector;
    use crate::linalg::LinearSolverKind;
    use crate::mesh::MeshGenerator;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    fn attrs(list: &[usize]) -> BTreeSet<usize> {
        list.iter().copied().collect()
    }

    fn direct_options(method: TimestepMethod) -> SolverOptions {
        let mut nonlinear = NonlinearSolverConfig {
            rel_tol: 1e-10,
            abs_tol: 1e-12,
            max_iterations: 25,
            ..Default::default()
        };
        nonlinear.linear.solver = LinearSolverKind::Direct;
        SolverOptions {
            method,
            enforcement: DirichletEnforcement::RateControl,
            nonlinear,
        }
    }

    #[test]
    fn test_quasistatic_without_displacement_bc_is_rejected() {
        let mesh = Arc::new(MeshGenerator::generate_box(1, 1, 1, 1.0, 1.0, 1.0));
        let mut solid = NonlinearSolid::new(mesh, direct_options(TimestepMethod::QuasiStatic));
        solid.set_traction_bcs(attrs(&[3]), constant_vector(Vector3::new(0.1, 0.0, 0.0)));

        assert!(matches!(solid.complete_setup(), Err(SimError::Configuration { .. })));
    }

    #[test]
    fn test_first_order_method_is_rejected() {
        let mesh = Arc::new(MeshGenerator::generate_box(1, 1, 1, 1.0, 1.0, 1.0));
        let mut solid = NonlinearSolid::new(mesh, direct_options(TimestepMethod::BackwardEuler));
        solid.set_displacement_bcs(attrs(&[5]), constant_vector(Vector3::zeros()));

        assert!(matches!(solid.complete_setup(), Err(SimError::Configuration { .. })));
    }

    #[test]
    fn test_prescribed_homogeneous_deformation() {
        // Uniform stretch imposed on the whole boundary: every node follows it
        let mesh = Arc::new(MeshGenerator::generate_box(2, 2, 2, 1.0, 1.0, 1.0));
        let mut solid = NonlinearSolid::new(mesh.clone(), direct_options(TimestepMethod::QuasiStatic));
        solid.set_material(NeoHookean::new(1.0, 10.0));
        let stretch: VectorCoefficient =
            Arc::new(|x: &Point3<f64>, t: f64| Vector3::new(0.1 * t * x.x, -0.02 * t * x.y, 0.0));
        solid.set_displacement_bcs(attrs(&[1, 2, 3, 4, 5, 6]), stretch);
        solid.complete_setup().unwrap();

        let mut dt = 1.0;
        solid.advance_timestep(&mut dt).unwrap();

        let u = solid.displacement().values();
        for (node, x) in mesh.geometry.nodes.iter().enumerate() {
            assert!((u[3 * node] - 0.1 * x.x).abs() < 1e-9);
            assert!((u[3 * node + 1] + 0.02 * x.y).abs() < 1e-9);
            assert!(u[3 * node + 2].abs() < 1e-9);
        }
    }

    #[test]
    fn test_traction_pulls_bar() {
        // Roller supports on x = 0, y = 0, z = 0 and a traction on x = lx
        let mesh = Arc::new(MeshGenerator::generate_box(2, 1, 1, 2.0, 1.0, 1.0));
        let mut solid = NonlinearSolid::new(mesh.clone(), direct_options(TimestepMethod::QuasiStatic));
        solid.set_displacement_component_bcs(attrs(&[5]), constant_scalar(0.0), 0);
        solid.set_displacement_component_bcs(attrs(&[2]), constant_scalar(0.0), 1);
        solid.set_displacement_component_bcs(attrs(&[1]), constant_scalar(0.0), 2);
        solid.set_traction_bcs(attrs(&[3]), constant_vector(Vector3::new(0.01, 0.0, 0.0)));
        solid.complete_setup().unwrap();

        let mut dt = 1.0;
        solid.advance_timestep(&mut dt).unwrap();

        let u = solid.displacement().values();
        for (node, x) in mesh.geometry.nodes.iter().enumerate() {
            if (x.x - 2.0).abs() < 1e-12 {
                assert!(u[3 * node] > 0.0);
            }
            if x.x.abs() < 1e-12 {
                assert_eq!(u[3 * node], 0.0);
            }
        }
    }

    #[test]
    fn test_dynamic_step_keeps_rest_state() {
        // No loads and zero initial data: the body stays at rest
        let mesh = Arc::new(MeshGenerator::generate_box(1, 1, 1, 1.0, 1.0, 1.0));
        let mut solid = NonlinearSolid::new(mesh, direct_options(TimestepMethod::AverageAcceleration));
        solid.set_displacement_bcs(attrs(&[1]), constant_vector(Vector3::zeros()));
        solid.complete_setup().unwrap();

        for _ in 0..3 {
            let mut dt = 0.1;
            solid.advance_timestep(&mut dt).unwrap();
        }

        assert!(solid.displacement().norm() < 1e-14);
        assert!(solid.velocity().norm() < 1e-14);
        assert_eq!(solid.cycle(), 3);
    }

    fn ramped_base(enforcement: DirichletEnforcement) -> (Arc<Mesh>, NonlinearSolid) {
        let mesh = Arc::new(MeshGenerator::generate_box(1, 1, 2, 1.0, 1.0, 1.0));
        let mut options = direct_options(TimestepMethod::AverageAcceleration);
        options.enforcement = enforcement;
        let mut solid = NonlinearSolid::new(mesh.clone(), options);
        solid.set_displacement_component_bcs(attrs(&[1]), Arc::new(|_: &Point3<f64>, t: f64| 0.01 * t), 2);
        (mesh, solid)
    }

    #[test]
    fn test_newmark_essential_velocity_matches_boundary_rate() {
        let (mesh, mut solid) = ramped_base(DirichletEnforcement::RateControl);
        solid.complete_setup().unwrap();
        let bottom = solid.space.boundary_dofs(&mesh, &attrs(&[1]), Some(2));
        assert_eq!(bottom.len(), 4);

        for _ in 0..4 {
            let mut dt = 0.1;
            solid.advance_timestep(&mut dt).unwrap();
            for &d in &bottom {
                assert_relative_eq!(solid.displacement().values()[d], 0.01 * solid.time(), epsilon = 1e-15);
                assert_relative_eq!(solid.velocity().values()[d], 0.01, epsilon = 1e-9);
            }
        }
        assert!(solid.last_step_stats().unwrap().newton.iterations >= 1);
    }

    #[test]
    fn test_full_control_matches_rate_control_for_consistent_start() {
        // Initial velocity matches the base ramp, so the body translates rigidly
        let (_, mut rate) = ramped_base(DirichletEnforcement::RateControl);
        let (_, mut full) = ramped_base(DirichletEnforcement::FullControl);
        for solid in [&mut rate, &mut full] {
            solid.set_velocity(constant_vector(Vector3::new(0.0, 0.0, 0.01)));
            solid.complete_setup().unwrap();
        }

        for _ in 0..3 {
            let mut dt = 0.1;
            rate.advance_timestep(&mut dt).unwrap();
            full.advance_timestep(&mut dt).unwrap();
        }
        for (a, b) in rate.displacement().values().iter().zip(full.displacement().values()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
        for (i, v) in full.velocity().values().iter().enumerate() {
            let expected = if i % 3 == 2 { 0.01 } else { 0.0 };
            assert_relative_eq!(*v, expected, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_true_dof_displacement_is_held() {
        let mesh = Arc::new(MeshGenerator::generate_box(1, 1, 1, 1.0, 1.0, 1.0));
        let mut solid = NonlinearSolid::new(mesh.clone(), direct_options(TimestepMethod::QuasiStatic));
        solid.set_displacement_bcs(attrs(&[1]), constant_vector(Vector3::zeros()));
        let top = solid.space.boundary_dofs(&mesh, &attrs(&[6]), Some(2));
        solid.set_displacement_true_dofs(top.clone(), constant_vector(Vector3::new(0.0, 0.0, 0.02)));
        solid.complete_setup().unwrap();

        let mut dt = 1.0;
        solid.advance_timestep(&mut dt).unwrap();
        for &d in &top {
            assert_eq!(solid.displacement().values()[d], 0.02);
        }
    }

    #[test]
    fn test_invalid_step_size_is_rejected() {
        let mesh = Arc::new(MeshGenerator::generate_box(1, 1, 1, 1.0, 1.0, 1.0));
        let mut solid = NonlinearSolid::new(mesh, direct_options(TimestepMethod::AverageAcceleration));
        solid.set_displacement_bcs(attrs(&[1]), constant_vector(Vector3::zeros()));
        solid.complete_setup().unwrap();

        for bad in [-1.0, 0.0, f64::INFINITY] {
            let mut dt = bad;
            assert!(matches!(solid.advance_timestep(&mut dt), Err(SimError::Configuration { .. })));
        }
        assert_eq!(solid.cycle(), 0);
        assert_eq!(solid.time(), 0.0);
        assert!(solid.last_step_stats().is_none());
    }
}
