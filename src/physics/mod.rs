//! Physics modules and their composition
//!
//! Every physics kind implements [`PhysicsModule`]: it is configured through
//! setters, finalized once with `complete_setup`, and then advanced one step
//! at a time. Modules share the mesh read-only and own their fields, residual
//! operator and time integrator exclusively.

pub mod state;
pub mod thermal;
pub mod solid;
pub mod coupled;

use std::sync::Arc;

use crate::error::{Result, SimError};
use crate::fem::{DirichletEnforcement, TimestepMethod};
use crate::linalg::NonlinearSolverConfig;
use crate::mesh::Mesh;

pub use state::FieldState;
pub use thermal::ThermalConduction;
pub use solid::NonlinearSolid;
pub use coupled::{CouplingScheme, MultiphysicsCoupler};

/// Common interface of all physics modules
pub trait PhysicsModule {
    fn name(&self) -> &str;

    /// Validate configuration and build operators; callable exactly once
    fn complete_setup(&mut self) -> Result<()>;

    /// Advance the committed state by `dt`
    ///
    /// On return `dt` holds the step actually taken. Fixed-step modules leave
    /// it unchanged.
    fn advance_timestep(&mut self, dt: &mut f64) -> Result<()>;

    fn time(&self) -> f64;

    fn set_time(&mut self, time: f64);

    /// Number of committed steps
    fn cycle(&self) -> usize;

    /// Committed fields
    fn states(&self) -> Vec<&FieldState>;
}

/// Time-integration method and Newton configuration of a module
#[derive(Debug, Clone)]
pub struct SolverOptions {
    pub method: TimestepMethod,
    pub enforcement: DirichletEnforcement,
    pub nonlinear: NonlinearSolverConfig,
}

/// Rejects a step size that is not a positive finite number
pub fn validate_timestep(owner: &str, dt: f64) -> Result<()> {
    if dt > 0.0 && dt.is_finite() {
        return Ok(());
    }
    Err(SimError::configuration(
        owner,
        format!("time step must be positive and finite, got {}", dt),
    ))
}

/// Bookkeeping shared by the concrete physics modules
#[derive(Debug, Clone)]
pub struct BasePhysics {
    name: String,
    mesh: Arc<Mesh>,
    time: f64,
    cycle: usize,
    setup_complete: bool,
}

impl BasePhysics {
    pub fn new(name: &str, mesh: Arc<Mesh>) -> Self {
        Self {
            name: name.to_string(),
            mesh,
            time: 0.0,
            cycle: 0,
            setup_complete: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn cycle(&self) -> usize {
        self.cycle
    }

    /// Fails if `complete_setup` already ran
    pub fn ensure_not_setup(&self) -> Result<()> {
        if self.setup_complete {
            return Err(SimError::setup_state(&self.name, "complete_setup called more than once"));
        }
        Ok(())
    }

    /// Fails unless `complete_setup` ran
    pub fn ensure_setup(&self) -> Result<()> {
        if !self.setup_complete {
            return Err(SimError::setup_state(
                &self.name,
                "advance_timestep called before complete_setup",
            ));
        }
        Ok(())
    }

    pub fn ensure_valid_dt(&self, dt: f64) -> Result<()> {
        validate_timestep(&self.name, dt)
    }

    pub fn mark_setup_complete(&mut self) {
        self.setup_complete = true;
    }

    /// Record a committed step ending at `time`
    pub fn commit_step(&mut self, time: f64) {
        self.time = time;
        self.cycle += 1;
    }

    /// Convergence failure of the step being attempted (cycle `cycle() + 1`)
    pub fn convergence_error(&self, source: crate::error::SolverError) -> SimError {
        SimError::Convergence {
            physics: self.name.clone(),
            cycle: self.cycle + 1,
            source,
        }
    }
}
