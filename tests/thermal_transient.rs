use std::collections::BTreeSet;
use std::sync::Arc;

use approx::assert_relative_eq;

use nalgebra::Point3;

use coupled_fem::fem::constant_scalar;
use coupled_fem::{
    run_to_final_time, DirichletEnforcement, LinearSolverKind, MemorySink, MeshGenerator, OutputSink, PhysicsModule,
    ThermalConduction, TimestepMethod,
};

fn attrs(list: &[usize]) -> BTreeSet<usize> {
    list.iter().copied().collect()
}

fn cooling_block(method: TimestepMethod) -> ThermalConduction {
    cooling_block_with(method, LinearSolverKind::Cg)
}

fn cooling_block_with(method: TimestepMethod, linear: LinearSolverKind) -> ThermalConduction {
    let mesh = Arc::new(MeshGenerator::generate_box(2, 2, 2, 1.0, 1.0, 1.0));
    let mut options = ThermalConduction::default_dynamic_options();
    options.method = method;
    options.nonlinear.print_level = 0;
    options.nonlinear.linear.solver = linear;

    let mut thermal = ThermalConduction::new(mesh, options);
    thermal.set_conductivity(constant_scalar(1.0));
    thermal.set_temperature(constant_scalar(1.0));
    thermal.set_temperature_bcs(attrs(&[1]), constant_scalar(0.0));
    thermal
}

#[test]
fn test_cooling_decays_monotonically() {
    let mut thermal = cooling_block(TimestepMethod::BackwardEuler);
    thermal.complete_setup().unwrap();

    let mut memory = MemorySink::new();
    let mut sinks: [&mut dyn OutputSink; 1] = [&mut memory];
    let summary = run_to_final_time(&mut thermal, 1.0, 0.25, &mut sinks).unwrap();

    assert_eq!(summary.steps, 4);
    assert_relative_eq!(summary.final_time, 1.0, epsilon = 1e-12);
    assert_eq!(thermal.cycle(), 4);

    let history = memory.field_history("temperature");
    assert_eq!(history.len(), 4);
    for (i, snapshot) in history.iter().enumerate() {
        assert_eq!(snapshot.cycle, i + 1);
        assert_relative_eq!(snapshot.time, 0.25 * (i + 1) as f64, epsilon = 1e-12);
    }

    let norms: Vec<f64> = history
        .iter()
        .map(|s| s.values.iter().map(|v| v * v).sum::<f64>().sqrt())
        .collect();
    let initial_norm = (thermal.space().true_dofs() as f64).sqrt();
    assert!(norms[0] < initial_norm);
    for pair in norms.windows(2) {
        assert!(pair[1] < pair[0], "norm grew: {:?}", norms);
    }
}

#[test]
fn test_essential_dofs_hold_prescribed_value() {
    let mesh = MeshGenerator::generate_box(2, 2, 2, 1.0, 1.0, 1.0);

    for method in [
        TimestepMethod::BackwardEuler,
        TimestepMethod::ImplicitMidpoint,
        TimestepMethod::Sdirk23,
        TimestepMethod::Sdirk33,
        TimestepMethod::Sdirk34,
        TimestepMethod::GeneralizedAlpha,
    ] {
        let mut thermal = cooling_block(method);
        thermal.complete_setup().unwrap();

        let mut dt = 0.25;
        thermal.advance_timestep(&mut dt).unwrap();
        thermal.advance_timestep(&mut dt).unwrap();
        assert_eq!(dt, 0.25);

        let bottom = thermal.space().boundary_dofs(&mesh, &attrs(&[1]), None);
        assert_eq!(bottom.len(), 9);
        for &dof in &bottom {
            assert_eq!(thermal.temperature().values()[dof], 0.0, "{:?}", method);
        }
    }
}

#[test]
fn test_insulated_face_stays_between_bounds() {
    let mut thermal = cooling_block(TimestepMethod::BackwardEuler);
    thermal.complete_setup().unwrap();

    let mut dt = 0.25;
    thermal.advance_timestep(&mut dt).unwrap();
    thermal.advance_timestep(&mut dt).unwrap();

    let mesh = MeshGenerator::generate_box(2, 2, 2, 1.0, 1.0, 1.0);
    let values = thermal.temperature().values();
    let top = thermal.space().boundary_dofs(&mesh, &attrs(&[6]), None);
    for &dof in &top {
        assert!(values[dof] > 0.0 && values[dof] < 1.0);
    }
}

#[test]
fn test_restart_from_accessor_matches_continued_run() {
    let mut reference = cooling_block_with(TimestepMethod::BackwardEuler, LinearSolverKind::Direct);
    reference.complete_setup().unwrap();
    let mut dt = 0.25;
    reference.advance_timestep(&mut dt).unwrap();

    let snapshot = reference.temperature().values().to_vec();

    let mut restarted = cooling_block_with(TimestepMethod::BackwardEuler, LinearSolverKind::Direct);
    restarted.set_temperature_values(snapshot.clone()).unwrap();
    restarted.complete_setup().unwrap();
    restarted.set_time(reference.time());
    assert_eq!(restarted.temperature().values(), snapshot.as_slice());

    let mut dt_a = 0.25;
    let mut dt_b = 0.25;
    reference.advance_timestep(&mut dt_a).unwrap();
    restarted.advance_timestep(&mut dt_b).unwrap();

    for (a, b) in reference.temperature().values().iter().zip(restarted.temperature().values()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-10);
    }
    assert_relative_eq!(reference.time(), restarted.time(), epsilon = 1e-14);
}

#[test]
fn test_enforcement_modes_agree_for_consistent_start() {
    // T = z already satisfies T = 0 on the bottom, so every mode takes the same step
    let mesh = Arc::new(MeshGenerator::generate_box(2, 2, 2, 1.0, 1.0, 1.0));
    let mut finals: Vec<Vec<f64>> = Vec::new();
    for enforcement in [
        DirichletEnforcement::RateControl,
        DirichletEnforcement::DirectControl,
        DirichletEnforcement::FullControl,
    ] {
        let mut options = ThermalConduction::default_dynamic_options();
        options.enforcement = enforcement;
        options.nonlinear.print_level = 0;
        options.nonlinear.rel_tol = 1e-10;
        options.nonlinear.linear.solver = LinearSolverKind::Direct;

        let mut thermal = ThermalConduction::new(mesh.clone(), options);
        thermal.set_temperature(Arc::new(|x: &Point3<f64>, _t: f64| x.z));
        thermal.set_temperature_bcs(attrs(&[1]), constant_scalar(0.0));
        thermal.complete_setup().unwrap();

        for _ in 0..2 {
            let mut dt = 0.1;
            thermal.advance_timestep(&mut dt).unwrap();
        }
        finals.push(thermal.temperature().values().to_vec());
    }

    for other in &finals[1..] {
        for (a, b) in finals[0].iter().zip(other) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }
}

#[test]
fn test_wrong_size_seed_is_rejected() {
    let mut thermal = cooling_block(TimestepMethod::BackwardEuler);
    assert!(thermal.set_temperature_values(vec![0.0; 3]).is_err());
}
