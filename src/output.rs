//! Sinks for committed simulation state
//!
//! The driver hands every sink the committed fields after each successful
//! step. No file formats are written here.

use log::info;

use crate::physics::FieldState;

/// Receives committed state after each successful step
pub trait OutputSink {
    fn write_state(&mut self, cycle: usize, time: f64, states: &[&FieldState]);
}

/// Logs a one-line summary per field
#[derive(Debug, Default)]
pub struct LogSink;

impl OutputSink for LogSink {
    fn write_state(&mut self, cycle: usize, time: f64, states: &[&FieldState]) {
        for state in states {
            let (lo, hi) = state.min_max();
            info!(
                "cycle {:4}  t = {:.6e}  {:<14} min = {:+.6e}  max = {:+.6e}  |u| = {:.6e}",
                cycle,
                time,
                state.name(),
                lo,
                hi,
                state.norm()
            );
        }
    }
}

/// A copy of one field at one step
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub cycle: usize,
    pub time: f64,
    pub field: String,
    pub values: Vec<f64>,
}

/// Keeps every written field in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    snapshots: Vec<Snapshot>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Snapshots of one field, in write order
    pub fn field_history(&self, field: &str) -> Vec<&Snapshot> {
        self.snapshots.iter().filter(|s| s.field == field).collect()
    }
}

impl OutputSink for MemorySink {
    fn write_state(&mut self, cycle: usize, time: f64, states: &[&FieldState]) {
        for state in states {
            self.snapshots.push(Snapshot {
                cycle,
                time,
                field: state.name().to_string(),
                values: state.values().to_vec(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fem::FiniteElementSpace;
    use crate::mesh::MeshGenerator;
    use std::sync::Arc;

    #[test]
    fn test_memory_sink_keeps_history() {
        let mesh = MeshGenerator::generate_box(1, 1, 1, 1.0, 1.0, 1.0);
        let space = Arc::new(FiniteElementSpace::new(&mesh, 1));
        let state = FieldState::from_values("temperature", space, vec![2.0; 8]).unwrap();

        let mut sink = MemorySink::new();
        sink.write_state(1, 0.25, &[&state]);
        sink.write_state(2, 0.5, &[&state]);

        let history = sink.field_history("temperature");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].cycle, 2);
        assert_eq!(history[0].values, vec![2.0; 8]);
    }
}
