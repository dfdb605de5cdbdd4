//! Input configuration for coupled simulations
//!
//! Reads a TOML input file and builds the mesh and physics modules from it.
//! All values have defaults, so a minimal input only names the physics and
//! its boundary conditions.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::info;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::fem::{constant_scalar, constant_vector, DirichletEnforcement, TimestepMethod};
use crate::linalg::NonlinearSolverConfig;
use crate::mechanics::NeoHookean;
use crate::mesh::{Mesh, MeshGenerator};
use crate::physics::{
    CouplingScheme, MultiphysicsCoupler, NonlinearSolid, SolverOptions, ThermalConduction,
};

/// Main simulation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Final time
    #[serde(default = "default_t_final")]
    pub t_final: f64,
    /// Time step
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default)]
    pub coupling: CouplingScheme,
    #[serde(default)]
    pub mesh: MeshConfig,
    pub thermal: Option<ThermalConfig>,
    pub solid: Option<SolidConfig>,
}

fn default_t_final() -> f64 { 1.0 }
fn default_dt() -> f64 { 0.25 }

/// Box mesh `[0,lx] × [0,ly] × [0,lz]` with `nx × ny × nz` cells
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MeshConfig {
    pub lx: f64,
    pub ly: f64,
    pub lz: f64,
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self { lx: 1.0, ly: 1.0, lz: 1.0, nx: 4, ny: 4, nz: 4 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThermalConfig {
    /// Conductivity κ
    #[serde(default = "default_one")]
    pub kappa: f64,
    #[serde(default = "default_one")]
    pub rho: f64,
    /// Specific heat c_p
    #[serde(default = "default_one")]
    pub cp: f64,
    /// Volumetric heat source
    #[serde(default)]
    pub source: f64,
    #[serde(default)]
    pub initial_temperature: f64,
    #[serde(default = "default_thermal_method")]
    pub timestepper: TimestepMethod,
    /// How prescribed values enter the implicit solves
    #[serde(default)]
    pub enforcement: DirichletEnforcement,
    #[serde(default)]
    pub nonlinear: NonlinearSolverConfig,
    #[serde(default)]
    pub boundary_conditions: Vec<BoundaryConditionConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolidConfig {
    /// Shear modulus μ
    #[serde(default = "default_mu")]
    pub mu: f64,
    /// Bulk modulus K
    #[serde(default = "default_bulk")]
    pub bulk: f64,
    #[serde(default = "default_one")]
    pub density: f64,
    #[serde(default)]
    pub body_force: Option<[f64; 3]>,
    #[serde(default = "default_solid_method")]
    pub timestepper: TimestepMethod,
    /// How prescribed values enter the implicit solves
    #[serde(default)]
    pub enforcement: DirichletEnforcement,
    #[serde(default)]
    pub nonlinear: NonlinearSolverConfig,
    #[serde(default)]
    pub boundary_conditions: Vec<BoundaryConditionConfig>,
}

fn default_one() -> f64 { 1.0 }
fn default_mu() -> f64 { 0.25 }
fn default_bulk() -> f64 { 5.0 }
fn default_thermal_method() -> TimestepMethod { TimestepMethod::BackwardEuler }
fn default_solid_method() -> TimestepMethod { TimestepMethod::QuasiStatic }

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BcConfigKind {
    Temperature,
    Flux,
    Displacement,
    Traction,
}

/// Constant boundary value, scalar or vector
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum BcValue {
    Scalar(f64),
    Vector([f64; 3]),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoundaryConditionConfig {
    pub kind: BcConfigKind,
    pub attributes: Vec<usize>,
    pub value: BcValue,
    /// Restrict a displacement condition to one component
    #[serde(default)]
    pub component: Option<usize>,
}

impl BoundaryConditionConfig {
    fn attribute_set(&self) -> BTreeSet<usize> {
        self.attributes.iter().copied().collect()
    }
}

impl SimulationConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<()> {
        crate::physics::validate_timestep("input", self.dt)?;
        if !(self.t_final > 0.0) {
            return Err(SimError::configuration("input", format!("t_final must be positive, got {}", self.t_final)));
        }
        let m = &self.mesh;
        if m.nx == 0 || m.ny == 0 || m.nz == 0 {
            return Err(SimError::configuration("mesh", "nx, ny and nz must be at least 1"));
        }
        if !(m.lx > 0.0 && m.ly > 0.0 && m.lz > 0.0) {
            return Err(SimError::configuration("mesh", "box lengths must be positive"));
        }
        if self.thermal.is_none() && self.solid.is_none() {
            return Err(SimError::configuration("input", "no physics configured"));
        }
        Ok(())
    }

    pub fn build_mesh(&self) -> Mesh {
        let m = &self.mesh;
        MeshGenerator::generate_box(m.nx, m.ny, m.nz, m.lx, m.ly, m.lz)
    }

    pub fn build_thermal(&self, mesh: Arc<Mesh>) -> Result<Option<ThermalConduction>> {
        let Some(cfg) = &self.thermal else {
            return Ok(None);
        };

        let options = SolverOptions {
            method: cfg.timestepper,
            enforcement: cfg.enforcement,
            nonlinear: cfg.nonlinear.clone(),
        };
        let mut thermal = ThermalConduction::new(mesh, options);
        thermal.set_conductivity(constant_scalar(cfg.kappa));
        thermal.set_density(constant_scalar(cfg.rho));
        thermal.set_specific_heat(constant_scalar(cfg.cp));
        if cfg.source != 0.0 {
            thermal.set_source(constant_scalar(cfg.source));
        }
        thermal.set_temperature(constant_scalar(cfg.initial_temperature));

        for bc in &cfg.boundary_conditions {
            let BcValue::Scalar(value) = bc.value else {
                return Err(SimError::configuration("thermal", format!("{:?} condition needs a scalar value", bc.kind)));
            };
            match bc.kind {
                BcConfigKind::Temperature => thermal.set_temperature_bcs(bc.attribute_set(), constant_scalar(value)),
                BcConfigKind::Flux => thermal.set_flux_bcs(bc.attribute_set(), constant_scalar(value)),
                other => {
                    return Err(SimError::configuration("thermal", format!("{:?} is not a thermal boundary condition", other)));
                }
            }
        }

        Ok(Some(thermal))
    }

    pub fn build_solid(&self, mesh: Arc<Mesh>) -> Result<Option<NonlinearSolid>> {
        let Some(cfg) = &self.solid else {
            return Ok(None);
        };
        if !(cfg.mu > 0.0 && cfg.bulk > 0.0) {
            return Err(SimError::configuration("solid", "mu and bulk must be positive"));
        }

        let options = SolverOptions {
            method: cfg.timestepper,
            enforcement: cfg.enforcement,
            nonlinear: cfg.nonlinear.clone(),
        };
        let mut solid = NonlinearSolid::new(mesh, options);
        solid.set_material(NeoHookean::new(cfg.mu, cfg.bulk));
        solid.set_density(constant_scalar(cfg.density));
        if let Some(b) = cfg.body_force {
            solid.set_body_force(constant_vector(Vector3::from(b)));
        }

        for bc in &cfg.boundary_conditions {
            match (bc.kind, bc.value, bc.component) {
                (BcConfigKind::Displacement, BcValue::Vector(v), None) => {
                    solid.set_displacement_bcs(bc.attribute_set(), constant_vector(Vector3::from(v)));
                }
                (BcConfigKind::Displacement, BcValue::Scalar(v), Some(c)) if c < 3 => {
                    solid.set_displacement_component_bcs(bc.attribute_set(), constant_scalar(v), c);
                }
                (BcConfigKind::Traction, BcValue::Vector(v), None) => {
                    solid.set_traction_bcs(bc.attribute_set(), constant_vector(Vector3::from(v)));
                }
                _ => {
                    return Err(SimError::configuration(
                        "solid",
                        format!(
                            "unsupported boundary condition {:?} with value {:?} and component {:?}",
                            bc.kind, bc.value, bc.component
                        ),
                    ));
                }
            }
        }

        Ok(Some(solid))
    }

    /// Build the mesh and all configured modules, in thermal-then-solid order
    pub fn build_coupler(&self) -> Result<MultiphysicsCoupler> {
        self.validate()?;
        let mesh = Arc::new(self.build_mesh());

        let mut coupler = MultiphysicsCoupler::new(self.coupling);
        if let Some(thermal) = self.build_thermal(mesh.clone())? {
            coupler.add_module(Box::new(thermal))?;
        }
        if let Some(solid) = self.build_solid(mesh)? {
            coupler.add_module(Box::new(solid))?;
        }
        Ok(coupler)
    }

    /// Log a summary of the configuration
    pub fn print_summary(&self) {
        let m = &self.mesh;
        info!("═══════════════════════════════════════════════════════════════");
        info!("  Simulation Configuration");
        info!("═══════════════════════════════════════════════════════════════");
        info!("Mesh:");
        info!("  Size: {} × {} × {}", m.lx, m.ly, m.lz);
        info!("  Grid: {} × {} × {} cells ({} tetrahedra)", m.nx, m.ny, m.nz, 6 * m.nx * m.ny * m.nz);
        info!("Time:");
        info!("  t_final = {}, dt = {}", self.t_final, self.dt);
        info!("  Coupling: {:?}", self.coupling);

        if let Some(t) = &self.thermal {
            info!("Thermal:");
            info!("  κ = {}, ρ = {}, c_p = {}, source = {}", t.kappa, t.rho, t.cp, t.source);
            info!("  Timestepper: {:?}", t.timestepper);
            info!("  Boundary conditions: {}", t.boundary_conditions.len());
        }
        if let Some(s) = &self.solid {
            info!("Solid:");
            info!("  μ = {}, K = {}, ρ = {}", s.mu, s.bulk, s.density);
            info!("  Timestepper: {:?}", s.timestepper);
            info!("  Boundary conditions: {}", s.boundary_conditions.len());
        }
        info!("═══════════════════════════════════════════════════════════════");
    }
}
