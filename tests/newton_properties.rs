use approx::assert_relative_eq;
use sprs::{CsMat, TriMat};

use coupled_fem::linalg::LinearSolverOptions;
use coupled_fem::{
    LinearSolverKind, NewtonSolver, NewtonState, NonlinearSolverConfig, ResidualOperator, SolverError,
};

/// r_i = x_i³ + x_i - b_i, coupled through a weak tridiagonal term
fn cubic_chain(b: Vec<f64>) -> ResidualOperator {
    let n = b.len();
    let residual = move |x: &[f64], _t: f64| -> Vec<f64> {
        (0..n)
            .map(|i| {
                let left = if i > 0 { x[i - 1] } else { 0.0 };
                let right = if i + 1 < n { x[i + 1] } else { 0.0 };
                x[i].powi(3) + 2.0 * x[i] - 0.5 * (left + right) - b[i]
            })
            .collect()
    };
    let jacobian = move |x: &[f64], _t: f64| -> CsMat<f64> {
        let mut t = TriMat::new((n, n));
        for i in 0..n {
            t.add_triplet(i, i, 3.0 * x[i] * x[i] + 2.0);
            if i > 0 {
                t.add_triplet(i, i - 1, -0.5);
            }
            if i + 1 < n {
                t.add_triplet(i, i + 1, -0.5);
            }
        }
        t.to_csr()
    };
    ResidualOperator::new(n, Box::new(residual), Box::new(jacobian))
}

fn config(rel_tol: f64, abs_tol: f64, max_iterations: usize) -> NonlinearSolverConfig {
    NonlinearSolverConfig {
        rel_tol,
        abs_tol,
        max_iterations,
        print_level: 0,
        linear: LinearSolverOptions {
            solver: LinearSolverKind::BiCgStab,
            rel_tol: 1e-12,
            ..Default::default()
        },
    }
}

#[test]
fn test_converged_residual_meets_tolerance() {
    let op = cubic_chain(vec![1.0, 4.0, -2.0, 0.5, 3.0]);
    let cfg = config(1e-10, 1e-14, 50);
    let mut newton = NewtonSolver::new(cfg.clone()).unwrap();

    let mut x = vec![0.0; 5];
    let stats = newton.solve(&mut op.at_time(0.0), &mut x).unwrap();

    assert_eq!(newton.state(), NewtonState::Converged);
    assert!(stats.residual_norm <= (cfg.rel_tol * stats.initial_norm).max(cfg.abs_tol));
    assert_eq!(stats.linear_solves, stats.iterations - 1);

    let r = op.residual(&x, 0.0);
    assert!(r.iter().all(|v| v.abs() < 1e-8));
}

#[test]
fn test_exhausted_budget_reports_last_residual() {
    let op = cubic_chain(vec![10.0; 4]);
    let mut newton = NewtonSolver::new(config(1e-14, 0.0, 2)).unwrap();

    let mut x = vec![0.0; 4];
    let err = newton.solve(&mut op.at_time(0.0), &mut x).unwrap_err();

    match err {
        SolverError::MaxIterationsExceeded {
            iterations,
            residual_norm,
            initial_norm,
            ..
        } => {
            assert_eq!(iterations, 2);
            assert!(residual_norm > 0.0);
            assert_relative_eq!(initial_norm, 20.0, epsilon = 1e-12);
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(newton.state(), NewtonState::MaxIterationsExceeded);
}

#[test]
fn test_essential_entries_are_left_alone() {
    let op = cubic_chain(vec![1.0, 1.0, 1.0]).with_essential(
        vec![2],
        Box::new(|_t: f64, u: &mut [f64]| u[2] = 0.25),
    );
    let mut newton = NewtonSolver::new(config(1e-12, 1e-14, 30)).unwrap();

    let mut x = vec![0.0; 3];
    op.prescribe(0.0, &mut x);
    newton.solve(&mut op.at_time(0.0), &mut x).unwrap();

    assert_eq!(x[2], 0.25);
    let r = op.residual(&x, 0.0);
    assert!(r[0].abs() < 1e-10 && r[1].abs() < 1e-10);
}

#[test]
fn test_zero_iteration_budget_is_a_configuration_error() {
    assert!(NewtonSolver::new(config(1e-6, 1e-8, 0)).is_err());
}
