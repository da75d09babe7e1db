// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Reference Robot Fleet Plant
// ─────────────────────────────────────────────────────────────────────
//! Discrete-time point-mass robots tethered to target positions x̄.
//!
//! Per agent the state is `[px, py, vx, vy]` and the input a planar force:
//!
//!   x⁺ = A(x)·(x − x̄) + B·u + x̄
//!   A(x) = I + h·(A2 + A3(x))
//!
//! A2 is the spring/damper block, A3 an optional quadratic drag that
//! scales with each agent's speed. Not part of the certified core; it
//! gives controllers and interconnections something real to close around.

use ren_types::{RenError, RenResult};

use crate::controller::PlantDynamics;
use crate::matrix::{ensure_len, kron, Mat, Vector};

const STATE_PER_AGENT: usize = 4;
const INPUT_PER_AGENT: usize = 2;

/// Fleet of identical point-mass robots.
#[derive(Debug, Clone)]
pub struct RobotFleet {
    n_agents: usize,
    xbar: Vector,
    /// Sampling period.
    pub h: f64,
    pub mass: f64,
    /// Spring constant toward x̄.
    pub k: f64,
    /// Linear damping.
    pub b: f64,
    /// Quadratic drag; 0 for the linear fleet.
    pub b2: f64,
    a_linear: Mat,
    b_input: Mat,
}

impl RobotFleet {
    /// Fleet sized from `xbar` (4 entries per agent). `linear = false`
    /// enables drag `b2 = 0.1`.
    pub fn new(xbar: Vector, linear: bool) -> RenResult<Self> {
        if xbar.is_empty() || xbar.len() % STATE_PER_AGENT != 0 {
            return Err(RenError::Validation(format!(
                "target state length must be a positive multiple of {STATE_PER_AGENT}, got {}",
                xbar.len()
            )));
        }
        let n_agents = xbar.len() / STATE_PER_AGENT;
        let mut fleet = Self {
            n_agents,
            xbar,
            h: 0.05,
            mass: 1.0,
            k: 1.0,
            b: 1.0,
            b2: if linear { 0.0 } else { 0.1 },
            a_linear: Mat::zeros(0, 0),
            b_input: Mat::zeros(0, 0),
        };
        fleet.rebuild();
        Ok(fleet)
    }

    /// Recompute the constant blocks after changing `mass`, `k`, or `b`.
    pub fn rebuild(&mut self) {
        let (m, k, b) = (self.mass, self.k, self.b);
        let eye = Mat::identity(self.n_agents, self.n_agents);
        #[rustfmt::skip]
        let a2 = Mat::from_row_slice(4, 4, &[
            0.0,     0.0,     1.0,     0.0,
            0.0,     0.0,     0.0,     1.0,
            -k / m,  0.0,     -b / m,  0.0,
            0.0,     -k / m,  0.0,     -b / m,
        ]);
        #[rustfmt::skip]
        let b_agent = Mat::from_row_slice(4, 2, &[
            0.0,     0.0,
            0.0,     0.0,
            1.0 / m, 0.0,
            0.0,     1.0 / m,
        ]);
        self.a_linear = kron(&eye, &a2);
        self.b_input = kron(&eye, &b_agent);
    }

    pub fn n_agents(&self) -> usize {
        self.n_agents
    }

    pub fn state_dim(&self) -> usize {
        STATE_PER_AGENT * self.n_agents
    }

    pub fn input_dim(&self) -> usize {
        INPUT_PER_AGENT * self.n_agents
    }

    pub fn xbar(&self) -> &Vector {
        &self.xbar
    }

    pub fn input_matrix(&self) -> &Mat {
        &self.b_input
    }

    /// State-dependent transition matrix `A(x)`.
    pub fn a(&self, x: &Vector) -> RenResult<Mat> {
        ensure_len(x, self.state_dim(), "fleet state")?;
        let mut drag = Vector::zeros(self.state_dim());
        for agent in 0..self.n_agents {
            let base = agent * STATE_PER_AGENT;
            let speed = x[base + 2].hypot(x[base + 3]);
            drag[base + 2] = speed;
            drag[base + 3] = speed;
        }
        let a3 = Mat::from_diagonal(&(drag * (-self.b2 / self.mass)));
        let n = self.state_dim();
        Ok(Mat::identity(n, n) + (&self.a_linear + a3) * self.h)
    }

    /// Noise-free transition.
    pub fn f(&self, _t: f64, x: &Vector, u: &Vector) -> RenResult<Vector> {
        ensure_len(u, self.input_dim(), "fleet input")?;
        let a = self.a(x)?;
        Ok(a * (x - &self.xbar) + &self.b_input * u + &self.xbar)
    }

    /// Transition with additive disturbance `w`; the output is the full state.
    pub fn step(&self, t: f64, x: &Vector, u: &Vector, w: &Vector) -> RenResult<(Vector, Vector)> {
        ensure_len(w, self.state_dim(), "fleet disturbance")?;
        let x_next = self.f(t, x, u)? + w;
        Ok((x_next.clone(), x_next))
    }
}

impl PlantDynamics for RobotFleet {
    fn predict(&self, t: f64, y: &Vector, u: &Vector) -> RenResult<Vector> {
        self.f(t, y, u)
    }
}
