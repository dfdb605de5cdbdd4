pub mod error;
pub mod config;
pub mod mesh;
pub mod fem;
pub mod linalg;
pub mod mechanics;
pub mod physics;
pub mod output;
pub mod driver;

pub use error::{Result, SimError, SolverError};
pub use config::SimulationConfig;
pub use mesh::{Mesh, MeshGenerator};
pub use fem::{
    Coefficient, DirichletEnforcement, FiniteElementSpace, FirstOrderOde, ScalarCoefficient, SecondOrderOde,
    TimeStepStats, TimestepMethod, VectorCoefficient,
};
pub use linalg::{
    LinearSolverKind, LinearSolverOptions, NewtonSolver, NewtonState, NonlinearOperator, NonlinearSolverConfig,
    ResidualOperator,
};
pub use mechanics::NeoHookean;
pub use physics::{
    CouplingScheme, FieldState, MultiphysicsCoupler, NonlinearSolid, PhysicsModule, SolverOptions,
    ThermalConduction,
};
pub use output::{LogSink, MemorySink, OutputSink};
pub use driver::{run_to_final_time, RunSummary};
