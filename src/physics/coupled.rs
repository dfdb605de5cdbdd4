//! Composition of physics modules
//!
//! The coupler owns an ordered list of modules sharing one mesh and
//! advances them together. Only operator splitting is implemented: each
//! module is advanced in declared order over the same step, seeing the other
//! modules' state as of the end of their own sub-step. No fields are
//! exchanged between modules here; a module that depends on another one's
//! field reads it through coefficients the caller wires up.

use log::debug;
use serde::{Deserialize, Serialize};

use super::{validate_timestep, FieldState, PhysicsModule};
use crate::error::{Result, SimError};

/// Largest difference between the requested and the taken sub-step that
/// operator splitting tolerates
pub const DT_TOLERANCE: f64 = 1.0e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouplingScheme {
    /// Sequential sub-steps with a shared fixed dt
    #[default]
    OperatorSplit,
    FixedPoint,
    FullyCoupled,
}

/// An ordered collection of physics modules advanced as one
pub struct MultiphysicsCoupler {
    name: String,
    scheme: CouplingScheme,
    modules: Vec<Box<dyn PhysicsModule>>,
    time: f64,
    cycle: usize,
    setup_complete: bool,
}

impl MultiphysicsCoupler {
    pub fn new(scheme: CouplingScheme) -> Self {
        Self {
            name: "coupled".to_string(),
            scheme,
            modules: Vec::new(),
            time: 0.0,
            cycle: 0,
            setup_complete: false,
        }
    }

    pub fn scheme(&self) -> CouplingScheme {
        self.scheme
    }

    /// Append a module; modules are advanced in the order they are added
    pub fn add_module(&mut self, module: Box<dyn PhysicsModule>) -> Result<()> {
        if self.setup_complete {
            return Err(SimError::setup_state(
                &self.name,
                format!("cannot add '{}' after complete_setup", module.name()),
            ));
        }
        self.modules.push(module);
        Ok(())
    }

    pub fn modules(&self) -> &[Box<dyn PhysicsModule>] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&dyn PhysicsModule> {
        self.modules.iter().find(|m| m.name() == name).map(|m| m.as_ref())
    }

    fn advance_operator_split(&mut self, dt: &mut f64) -> Result<()> {
        let requested = *dt;

        for module in self.modules.iter_mut() {
            let mut sub_dt = requested;
            module.advance_timestep(&mut sub_dt)?;

            if (sub_dt - requested).abs() > DT_TOLERANCE {
                return Err(SimError::TimestepAltered {
                    module: module.name().to_string(),
                    requested,
                    actual: sub_dt,
                });
            }
            debug!("{}: advanced '{}' by {:e}", self.name, module.name(), requested);
        }

        self.time += requested;
        self.cycle += 1;
        Ok(())
    }
}

impl PhysicsModule for MultiphysicsCoupler {
    fn name(&self) -> &str {
        &self.name
    }

    fn complete_setup(&mut self) -> Result<()> {
        if self.setup_complete {
            return Err(SimError::setup_state(&self.name, "complete_setup called more than once"));
        }

        match self.scheme {
            CouplingScheme::OperatorSplit => {}
            CouplingScheme::FixedPoint | CouplingScheme::FullyCoupled => {
                return Err(SimError::UnsupportedCoupling(self.scheme));
            }
        }

        if self.modules.is_empty() {
            return Err(SimError::configuration(&self.name, "no physics modules to couple"));
        }

        for module in self.modules.iter_mut() {
            module.complete_setup()?;
        }

        // The coupled clock starts where the modules are; they must agree
        let start = self.modules[0].time();
        if let Some(other) = self
            .modules
            .iter()
            .find(|m| (m.time() - start).abs() > DT_TOLERANCE)
        {
            return Err(SimError::configuration(
                &self.name,
                format!(
                    "module '{}' starts at t = {} but '{}' starts at t = {}",
                    other.name(),
                    other.time(),
                    self.modules[0].name(),
                    start
                ),
            ));
        }
        self.time = start;

        self.setup_complete = true;
        Ok(())
    }

    fn advance_timestep(&mut self, dt: &mut f64) -> Result<()> {
        if !self.setup_complete {
            return Err(SimError::setup_state(
                &self.name,
                "advance_timestep called before complete_setup",
            ));
        }
        validate_timestep(&self.name, *dt)?;

        match self.scheme {
            CouplingScheme::OperatorSplit => self.advance_operator_split(dt),
            CouplingScheme::FixedPoint | CouplingScheme::FullyCoupled => {
                Err(SimError::UnsupportedCoupling(self.scheme))
            }
        }
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn set_time(&mut self, time: f64) {
        self.time = time;
        for module in self.modules.iter_mut() {
            module.set_time(time);
        }
    }

    fn cycle(&self) -> usize {
        self.cycle
    }

    fn states(&self) -> Vec<&FieldState> {
        self.modules.iter().flat_map(|m| m.states()).collect()
    }
}
