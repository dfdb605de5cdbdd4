//! Implicit time integration of semi-discrete systems
//!
//! First-order systems `M du/dt + F(u, t) = 0` (thermal) and second-order
//! systems `M d²u/dt² + F(u, t) = 0` (solid) are turned into one nonlinear
//! algebraic system per step, solved with Newton, and the committed state is
//! recovered from the solved unknown. The caller's state is only written
//! once Newton has converged.

use serde::{Deserialize, Serialize};
use sprs::CsMat;

use crate::error::{Result, SimError, SolverError};
use crate::linalg::{
    linear_combination, mat_vec, NewtonSolver, NewtonStats, NonlinearOperator, NonlinearSolverConfig,
    ResidualOperator,
};

/// Time-stepping method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestepMethod {
    /// Solve F(u, t + dt) = 0, no inertia
    QuasiStatic,
    BackwardEuler,
    ImplicitMidpoint,
    /// Two-stage, third-order SDIRK
    Sdirk23,
    /// Three-stage, third-order L-stable SDIRK
    Sdirk33,
    /// Three-stage, fourth-order SDIRK
    Sdirk34,
    /// First-order generalized-α with ρ∞ = 1/2
    GeneralizedAlpha,
    /// Newmark β = 1/4, γ = 1/2
    AverageAcceleration,
}

impl TimestepMethod {
    pub fn is_first_order(&self) -> bool {
        !matches!(self, TimestepMethod::AverageAcceleration)
    }

    pub fn is_second_order(&self) -> bool {
        matches!(self, TimestepMethod::QuasiStatic | TimestepMethod::AverageAcceleration)
    }
}

/// How essential (Dirichlet) values enter the implicit stage solves
///
/// Every method commits `u_d = g(t_{n+1})` exactly at the end of a step. The
/// choice only changes what the unknown rate or acceleration is pinned to at
/// essential dofs while Newton runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirichletEnforcement {
    /// Pin the unknown to the time derivative of `g`
    #[default]
    RateControl,
    /// Pin the unknown so the stage state equals `g` at the stage time
    DirectControl,
    /// Rate control with the stage state also moved onto `g`
    FullControl,
}

/// Time integration statistics for a single step
#[derive(Debug, Clone)]
pub struct TimeStepStats {
    /// Time at the end of the step
    pub time: f64,
    /// Time step size used
    pub dt: f64,
    /// Newton statistics summed over the stages of the step
    pub newton: NewtonStats,
}

/// Step used for the central differences of the essential data
const EPSILON: f64 = 1.0e-4;

/// Essential data `g(t)` with central-difference derivatives
///
/// Only entries at essential dofs are meaningful.
struct EssentialSample {
    value: Vec<f64>,
    rate: Vec<f64>,
    acceleration: Vec<f64>,
}

impl EssentialSample {
    fn at(op: &ResidualOperator, t: f64) -> Self {
        let n = op.size();
        let mut minus = vec![0.0; n];
        let mut value = vec![0.0; n];
        let mut plus = vec![0.0; n];
        op.prescribe(t - EPSILON, &mut minus);
        op.prescribe(t, &mut value);
        op.prescribe(t + EPSILON, &mut plus);

        let mut rate = vec![0.0; n];
        let mut acceleration = vec![0.0; n];
        for &d in op.essential_dofs() {
            rate[d] = (plus[d] - minus[d]) / (2.0 * EPSILON);
            acceleration[d] = (plus[d] - 2.0 * value[d] + minus[d]) / (EPSILON * EPSILON);
        }
        Self {
            value,
            rate,
            acceleration,
        }
    }
}

/// Pin essential entries of the stage unknown `x` before a shifted solve
///
/// `base + scale · x` is the stage state at `time`, and `x` approximates
/// d^order u / dt^order there. Full control rewrites `base` as well.
fn pin_essential(
    op: &ResidualOperator,
    enforcement: DirichletEnforcement,
    order: usize,
    time: f64,
    base: &mut [f64],
    scale: f64,
    x: &mut [f64],
) {
    if op.essential_dofs().is_empty() {
        return;
    }
    let g = EssentialSample::at(op, time);
    let derivative = if order == 1 { &g.rate } else { &g.acceleration };
    for &d in op.essential_dofs() {
        match enforcement {
            DirichletEnforcement::DirectControl => x[d] = (g.value[d] - base[d]) / scale,
            DirichletEnforcement::RateControl => x[d] = derivative[d],
            DirichletEnforcement::FullControl => {
                x[d] = derivative[d];
                base[d] = g.value[d] - scale * x[d];
            }
        }
    }
}

/// Diagonally implicit Runge-Kutta coefficients
///
/// Row `i` of `a` holds `a_i0 ..= a_ii`.
struct ButcherTableau {
    a: Vec<Vec<f64>>,
    b: Vec<f64>,
    c: Vec<f64>,
}

impl ButcherTableau {
    fn of(method: TimestepMethod) -> Option<Self> {
        let tableau = match method {
            TimestepMethod::BackwardEuler => Self {
                a: vec![vec![1.0]],
                b: vec![1.0],
                c: vec![1.0],
            },
            TimestepMethod::ImplicitMidpoint => Self {
                a: vec![vec![0.5]],
                b: vec![1.0],
                c: vec![0.5],
            },
            TimestepMethod::Sdirk23 => {
                let gamma = (3.0 + 3.0_f64.sqrt()) / 6.0;
                Self {
                    a: vec![vec![gamma], vec![1.0 - 2.0 * gamma, gamma]],
                    b: vec![0.5, 0.5],
                    c: vec![gamma, 1.0 - gamma],
                }
            }
            TimestepMethod::Sdirk33 => {
                let a = 0.435866521508458999416019451193556843;
                let b = 1.20849664917601007033647768876780107;
                let c = 0.717933260754229499708009725596778422;
                Self {
                    a: vec![vec![a], vec![c - a, a], vec![b, 1.0 - a - b, a]],
                    b: vec![b, 1.0 - a - b, a],
                    c: vec![a, c, 1.0],
                }
            }
            TimestepMethod::Sdirk34 => {
                let gamma = 1.06857902130162881842131266471407070;
                let delta = 0.128886400515720462925022636093359660;
                Self {
                    a: vec![
                        vec![gamma],
                        vec![0.5 - gamma, gamma],
                        vec![2.0 * gamma, 1.0 - 4.0 * gamma, gamma],
                    ],
                    b: vec![delta, 1.0 - 2.0 * delta, delta],
                    c: vec![gamma, 0.5, 1.0 - gamma],
                }
            }
            _ => return None,
        };
        Some(tableau)
    }
}

/// Sum the Newton work of several solves within one step
fn accumulate(total: Option<NewtonStats>, stage: NewtonStats) -> NewtonStats {
    match total {
        None => stage,
        Some(mut total) => {
            total.iterations += stage.iterations;
            total.linear_solves += stage.linear_solves;
            total.linear_iterations += stage.linear_iterations;
            total.residual_norm = stage.residual_norm;
            total
        }
    }
}

/// `M x + F(base + scale · x, time)` as a function of `x`
///
/// Covers every implicit scheme here: `x` is a stage rate (Runge-Kutta,
/// generalized-α) or the acceleration (Newmark), and `scale` maps it onto
/// the stage state.
struct ShiftedOperator<'a> {
    op: &'a ResidualOperator,
    mass: &'a CsMat<f64>,
    base: &'a [f64],
    scale: f64,
    time: f64,
    stage: Vec<f64>,
}

impl<'a> ShiftedOperator<'a> {
    fn new(op: &'a ResidualOperator, mass: &'a CsMat<f64>, base: &'a [f64], scale: f64, time: f64) -> Self {
        Self {
            op,
            mass,
            base,
            scale,
            time,
            stage: vec![0.0; base.len()],
        }
    }

    fn update_stage(&mut self, x: &[f64]) {
        for ((s, b), xi) in self.stage.iter_mut().zip(self.base).zip(x) {
            *s = b + self.scale * xi;
        }
    }
}

impl NonlinearOperator for ShiftedOperator<'_> {
    fn size(&self) -> usize {
        self.op.size()
    }

    fn residual(&mut self, x: &[f64]) -> Vec<f64> {
        self.update_stage(x);
        let mut r = self.op.residual(&self.stage, self.time);
        for (ri, mi) in r.iter_mut().zip(mat_vec(self.mass, x)) {
            *ri += mi;
        }
        r
    }

    fn jacobian(&mut self, x: &[f64]) -> CsMat<f64> {
        self.update_stage(x);
        let k = self.op.jacobian(&self.stage, self.time);
        linear_combination(1.0, self.mass, self.scale, &k)
    }

    fn constrained_dofs(&self) -> &[usize] {
        self.op.essential_dofs()
    }
}

/// Quasi-static step shared by both integrators
fn quasi_static_step(
    newton: &mut NewtonSolver,
    op: &ResidualOperator,
    u: &mut [f64],
    t_next: f64,
) -> std::result::Result<NewtonStats, SolverError> {
    let mut x = u.to_vec();
    op.prescribe(t_next, &mut x);
    let stats = newton.solve(&mut op.at_time(t_next), &mut x)?;
    u.copy_from_slice(&x);
    Ok(stats)
}

/// Integrator for `M du/dt + F(u, t) = 0`
///
/// The Runge-Kutta methods (backward Euler, implicit midpoint and the SDIRK
/// family) solve one nonlinear system per stage for the stage rate `k_i`:
///
/// M k_i + F(u_n + dt Σ_{j<i} a_ij k_j + a_ii·dt·k_i, t_n + c_i·dt) = 0
///
/// and commit `u_{n+1} = u_n + dt Σ b_i k_i`. Generalized-α solves for the
/// rate at `t_n + α_m·dt` and keeps its own rate history. The last rate
/// seeds Newton on the next step.
pub struct FirstOrderOde {
    method: TimestepMethod,
    enforcement: DirichletEnforcement,
    newton: NewtonSolver,
    mass: CsMat<f64>,
    previous_du_dt: Vec<f64>,
    rate_initialized: bool,
    started: bool,
    last_stats: Option<TimeStepStats>,
}

impl FirstOrderOde {
    /// Spectral radius at infinity of the generalized-α scheme
    const RHO_INFINITY: f64 = 0.5;

    pub fn new(method: TimestepMethod, config: NonlinearSolverConfig, mass: CsMat<f64>) -> Result<Self> {
        if !method.is_first_order() {
            return Err(SimError::configuration(
                "first-order time integration",
                format!("{:?} is not a first-order method", method),
            ));
        }
        let n = mass.rows();
        Ok(Self {
            method,
            enforcement: DirichletEnforcement::default(),
            newton: NewtonSolver::new(config)?,
            mass,
            previous_du_dt: vec![0.0; n],
            rate_initialized: false,
            started: false,
            last_stats: None,
        })
    }

    pub fn with_enforcement(mut self, enforcement: DirichletEnforcement) -> Self {
        self.enforcement = enforcement;
        self
    }

    pub fn enforcement(&self) -> DirichletEnforcement {
        self.enforcement
    }

    /// Rate of the last committed step, used as the next initial guess
    pub fn previous_du_dt(&self) -> &[f64] {
        &self.previous_du_dt
    }

    pub fn last_stats(&self) -> Option<&TimeStepStats> {
        self.last_stats.as_ref()
    }

    /// Advance `u` and `t` by `dt`
    ///
    /// `dt` is never changed by these fixed-step schemes; it is taken by
    /// reference so an adaptive scheme could report the step it took.
    pub fn step(
        &mut self,
        op: &ResidualOperator,
        u: &mut [f64],
        t: &mut f64,
        dt: &mut f64,
    ) -> std::result::Result<NewtonStats, SolverError> {
        assert_eq!(u.len(), op.size(), "State has the wrong size");
        assert!(*dt > 0.0 && dt.is_finite(), "Time step must be positive and finite");
        let h = *dt;
        let t_next = *t + h;

        // Rate-based enforcement moves essential dofs from their current value
        if !self.started {
            if self.enforcement != DirichletEnforcement::DirectControl {
                op.prescribe(*t, u);
            }
            self.started = true;
        }

        let stats = match self.method {
            TimestepMethod::QuasiStatic => {
                let u_n = u.to_vec();
                let stats = quasi_static_step(&mut self.newton, op, u, t_next)?;
                for ((k, a), b) in self.previous_du_dt.iter_mut().zip(u.iter()).zip(&u_n) {
                    *k = (a - b) / h;
                }
                stats
            }
            TimestepMethod::GeneralizedAlpha => self.generalized_alpha_step(op, u, *t, h)?,
            method => match ButcherTableau::of(method) {
                Some(tableau) => self.runge_kutta_step(&tableau, op, u, *t, h)?,
                None => unreachable!("rejected in FirstOrderOde::new"),
            },
        };

        *t = t_next;
        self.last_stats = Some(TimeStepStats {
            time: t_next,
            dt: h,
            newton: stats.clone(),
        });
        Ok(stats)
    }

    fn runge_kutta_step(
        &mut self,
        tableau: &ButcherTableau,
        op: &ResidualOperator,
        u: &mut [f64],
        t: f64,
        h: f64,
    ) -> std::result::Result<NewtonStats, SolverError> {
        let mut rates: Vec<Vec<f64>> = Vec::with_capacity(tableau.b.len());
        let mut total = None;

        for (i, row) in tableau.a.iter().enumerate() {
            let mut base = u.to_vec();
            for (a_ij, k_j) in row.iter().zip(&rates) {
                for (bi, kj) in base.iter_mut().zip(k_j) {
                    *bi += h * a_ij * kj;
                }
            }
            let scale = row[i] * h;
            let time = t + tableau.c[i] * h;

            let mut k = rates.last().unwrap_or(&self.previous_du_dt).clone();
            pin_essential(op, self.enforcement, 1, time, &mut base, scale, &mut k);

            let stats = {
                let mut shifted = ShiftedOperator::new(op, &self.mass, &base, scale, time);
                self.newton.solve(&mut shifted, &mut k)?
            };
            total = Some(accumulate(total, stats));
            rates.push(k);
        }

        for (b_i, k_i) in tableau.b.iter().zip(&rates) {
            for (uj, kj) in u.iter_mut().zip(k_i) {
                *uj += h * b_i * kj;
            }
        }
        op.prescribe(t + h, u);
        if let Some(k) = rates.pop() {
            self.previous_du_dt = k;
        }
        Ok(total.unwrap_or_default())
    }

    fn generalized_alpha_step(
        &mut self,
        op: &ResidualOperator,
        u: &mut [f64],
        t: f64,
        h: f64,
    ) -> std::result::Result<NewtonStats, SolverError> {
        let rho = Self::RHO_INFINITY;
        let alpha_m = 0.5 * (3.0 - rho) / (1.0 + rho);
        let alpha_f = 1.0 / (1.0 + rho);
        let gamma = 0.5 + alpha_m - alpha_f;
        let mut total = None;

        if !self.rate_initialized {
            // Consistent initial rate: M k_0 + F(u_0, t_0) = 0
            let mut k0 = self.previous_du_dt.clone();
            let g = EssentialSample::at(op, t);
            for &d in op.essential_dofs() {
                k0[d] = g.rate[d];
            }
            let stats = {
                let mut initial = ShiftedOperator::new(op, &self.mass, u, 0.0, t);
                self.newton.solve(&mut initial, &mut k0)?
            };
            total = Some(stats);
            self.previous_du_dt = k0;
            self.rate_initialized = true;
        }

        let rate_n = &self.previous_du_dt;
        let mut base: Vec<f64> = u
            .iter()
            .zip(rate_n)
            .map(|(ui, vi)| ui + alpha_f * h * (1.0 - gamma / alpha_m) * vi)
            .collect();
        let scale = alpha_f * gamma / alpha_m * h;

        let mut k = rate_n.clone();
        match self.enforcement {
            DirichletEnforcement::DirectControl => {
                pin_essential(op, self.enforcement, 1, t + alpha_f * h, &mut base, scale, &mut k)
            }
            DirichletEnforcement::RateControl | DirichletEnforcement::FullControl => {
                let g_rate = EssentialSample::at(op, t + alpha_m * h).rate;
                let g_stage = EssentialSample::at(op, t + alpha_f * h).value;
                for &d in op.essential_dofs() {
                    k[d] = g_rate[d];
                    if self.enforcement == DirichletEnforcement::FullControl {
                        base[d] = g_stage[d] - scale * k[d];
                    }
                }
            }
        }

        let stats = {
            let mut shifted = ShiftedOperator::new(op, &self.mass, &base, scale, t + alpha_f * h);
            self.newton.solve(&mut shifted, &mut k)?
        };
        let total = accumulate(total, stats);

        let mut rate_next = vec![0.0; u.len()];
        for i in 0..u.len() {
            u[i] += h * ((1.0 - gamma / alpha_m) * rate_n[i] + gamma / alpha_m * k[i]);
            rate_next[i] = (1.0 - 1.0 / alpha_m) * rate_n[i] + k[i] / alpha_m;
        }
        op.prescribe(t + h, u);
        if self.enforcement != DirichletEnforcement::DirectControl && !op.essential_dofs().is_empty() {
            let g = EssentialSample::at(op, t + h);
            for &d in op.essential_dofs() {
                rate_next[d] = g.rate[d];
            }
        }
        self.previous_du_dt = rate_next;
        Ok(total)
    }
}

/// Integrator for `M d²u/dt² + F(u, t) = 0`
///
/// Average acceleration (Newmark, β = 1/4, γ = 1/2) solves for the new
/// acceleration `a`:
///
/// M a + F(ũ + β·dt²·a, t_{n+1}) = 0,   ũ = u_n + dt·v_n + dt²(1/2 - β)·a_n
///
/// Before the first step the initial acceleration is made consistent with
/// the initial state by solving `M a_0 + F(u_0, t_0) = 0`. Under rate or full
/// control the essential displacement and velocity are first set from `g` and
/// `dg/dt`, and after every step the essential velocity and acceleration
/// follow `dg/dt` and `d²g/dt²`.
pub struct SecondOrderOde {
    method: TimestepMethod,
    enforcement: DirichletEnforcement,
    newton: NewtonSolver,
    mass: CsMat<f64>,
    previous_acceleration: Vec<f64>,
    initialized: bool,
    last_stats: Option<TimeStepStats>,
}

impl SecondOrderOde {
    const BETA: f64 = 0.25;
    const GAMMA: f64 = 0.5;

    pub fn new(method: TimestepMethod, config: NonlinearSolverConfig, mass: CsMat<f64>) -> Result<Self> {
        if !method.is_second_order() {
            return Err(SimError::configuration(
                "second-order time integration",
                format!("{:?} is not a second-order method", method),
            ));
        }
        let n = mass.rows();
        Ok(Self {
            method,
            enforcement: DirichletEnforcement::default(),
            newton: NewtonSolver::new(config)?,
            mass,
            previous_acceleration: vec![0.0; n],
            initialized: false,
            last_stats: None,
        })
    }

    pub fn with_enforcement(mut self, enforcement: DirichletEnforcement) -> Self {
        self.enforcement = enforcement;
        self
    }

    pub fn previous_acceleration(&self) -> &[f64] {
        &self.previous_acceleration
    }

    pub fn last_stats(&self) -> Option<&TimeStepStats> {
        self.last_stats.as_ref()
    }

    /// Advance displacement `u`, velocity `v` and `t` by `dt`
    pub fn step(
        &mut self,
        op: &ResidualOperator,
        u: &mut [f64],
        v: &mut [f64],
        t: &mut f64,
        dt: &mut f64,
    ) -> std::result::Result<NewtonStats, SolverError> {
        assert_eq!(u.len(), op.size(), "Displacement has the wrong size");
        assert_eq!(v.len(), op.size(), "Velocity has the wrong size");
        assert!(*dt > 0.0 && dt.is_finite(), "Time step must be positive and finite");
        let h = *dt;
        let t_next = *t + h;

        let stats = match self.method {
            TimestepMethod::QuasiStatic => quasi_static_step(&mut self.newton, op, u, t_next)?,
            TimestepMethod::AverageAcceleration => self.newmark_step(op, u, v, *t, h)?,
            _ => unreachable!("rejected in SecondOrderOde::new"),
        };

        *t = t_next;
        self.last_stats = Some(TimeStepStats {
            time: t_next,
            dt: h,
            newton: stats.clone(),
        });
        Ok(stats)
    }

    fn newmark_step(
        &mut self,
        op: &ResidualOperator,
        u: &mut [f64],
        v: &mut [f64],
        t: f64,
        h: f64,
    ) -> std::result::Result<NewtonStats, SolverError> {
        let t_next = t + h;
        let mut total = None;

        if !self.initialized {
            let mut a0 = vec![0.0; u.len()];
            if self.enforcement != DirichletEnforcement::DirectControl && !op.essential_dofs().is_empty() {
                let g = EssentialSample::at(op, t);
                for &d in op.essential_dofs() {
                    u[d] = g.value[d];
                    v[d] = g.rate[d];
                    a0[d] = g.acceleration[d];
                }
            }
            let stats = {
                let mut initial = ShiftedOperator::new(op, &self.mass, u, 0.0, t);
                self.newton.solve(&mut initial, &mut a0)?
            };
            total = Some(stats);
            self.previous_acceleration = a0;
            self.initialized = true;
        }

        let beta_dt2 = Self::BETA * h * h;
        let a_n = &self.previous_acceleration;

        let mut predictor: Vec<f64> = (0..u.len())
            .map(|i| u[i] + h * v[i] + h * h * (0.5 - Self::BETA) * a_n[i])
            .collect();

        let mut a = a_n.clone();
        pin_essential(op, self.enforcement, 2, t_next, &mut predictor, beta_dt2, &mut a);

        let stats = {
            let mut shifted = ShiftedOperator::new(op, &self.mass, &predictor, beta_dt2, t_next);
            self.newton.solve(&mut shifted, &mut a)?
        };
        let total = accumulate(total, stats);

        for i in 0..u.len() {
            u[i] = predictor[i] + beta_dt2 * a[i];
            v[i] += h * ((1.0 - Self::GAMMA) * a_n[i] + Self::GAMMA * a[i]);
        }
        op.prescribe(t_next, u);
        if self.enforcement != DirichletEnforcement::DirectControl && !op.essential_dofs().is_empty() {
            let g = EssentialSample::at(op, t_next);
            for &d in op.essential_dofs() {
                v[d] = g.rate[d];
                a[d] = g.acceleration[d];
            }
        }
        self.previous_acceleration = a;
        Ok(total)
    }
}
