//! Time loop shared by the binary and the integration tests

use log::info;

use crate::error::Result;
use crate::output::OutputSink;
use crate::physics::{validate_timestep, PhysicsModule};

/// Summary of a completed run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub final_time: f64,
}

/// Advance `module` from its current time to `t_final` with steps of at most `dt`
///
/// The last step is shortened so the run lands on `t_final`. Every sink sees
/// the committed state after each successful step.
pub fn run_to_final_time(
    module: &mut dyn PhysicsModule,
    t_final: f64,
    dt: f64,
    sinks: &mut [&mut dyn OutputSink],
) -> Result<RunSummary> {
    validate_timestep("driver", dt)?;

    let mut steps = 0;
    let mut t = module.time();
    let mut last_step = t >= t_final - 1e-8 * dt;

    while !last_step {
        let mut dt_real = dt.min(t_final - t);
        module.advance_timestep(&mut dt_real)?;
        t = module.time();
        steps += 1;

        let states = module.states();
        for sink in sinks.iter_mut() {
            sink.write_state(module.cycle(), t, &states);
        }

        last_step = t >= t_final - 1e-8 * dt;
    }

    info!("Completed {} steps, t = {:.6e}", steps, t);
    Ok(RunSummary { steps, final_time: t })
}
