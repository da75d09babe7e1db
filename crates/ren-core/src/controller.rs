// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Equilibrium Controller
// ─────────────────────────────────────────────────────────────────────
//! Wraps an equilibrium unit around a plant model: the unit is driven by
//! the residual between the target output and the plant's prediction.

use nalgebra::DVector;

use ren_types::RenResult;

use crate::matrix::{ensure_len, Vector};
use crate::unit::EquilibriumUnit;

/// Plant dynamics `(t, y, u) → ŷ`, supplied by the caller.
///
/// Implemented for any plain closure of that shape; a closure is assumed
/// to accept the widths it is handed.
pub trait PlantDynamics {
    fn predict(&self, t: f64, y: &Vector, u: &Vector) -> RenResult<Vector>;
}

impl<F> PlantDynamics for F
where
    F: Fn(f64, &DVector<f64>, &DVector<f64>) -> DVector<f64>,
{
    fn predict(&self, t: f64, y: &Vector, u: &Vector) -> RenResult<Vector> {
        Ok(self(t, y, u))
    }
}

/// Last plant output and control fed to the plant model.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerMemory {
    pub y: Vector,
    pub u: Vector,
}

impl ControllerMemory {
    pub fn new(y: Vector, u: Vector) -> Self {
        Self { y, u }
    }

    /// Zero output of width `n` and zero control of width `m`.
    pub fn zeros(n: usize, m: usize) -> Self {
        Self::new(Vector::zeros(n), Vector::zeros(m))
    }
}

/// Result of one controller step.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerOutput {
    pub u: Vector,
    pub xi: Vector,
    pub memory: ControllerMemory,
}

/// Equilibrium unit closed around a plant model.
pub struct Controller<P> {
    unit: EquilibriumUnit,
    plant: P,
}

impl<P: PlantDynamics> Controller<P> {
    pub fn new(unit: EquilibriumUnit, plant: P) -> Self {
        Self { unit, plant }
    }

    pub fn unit(&self) -> &EquilibriumUnit {
        &self.unit
    }

    /// Mutable access for parameter updates; the unit re-certifies itself.
    pub fn unit_mut(&mut self) -> &mut EquilibriumUnit {
        &mut self.unit
    }

    pub fn plant(&self) -> &P {
        &self.plant
    }

    /// `w = y_target − f(t, y, u)`, then one unit step on `(w, xi)`.
    pub fn step(
        &self,
        t: f64,
        y_target: &Vector,
        xi: &Vector,
        memory: &ControllerMemory,
    ) -> RenResult<ControllerOutput> {
        let shape = self.unit.shape();
        ensure_len(y_target, shape.n, "controller target")?;
        ensure_len(&memory.y, shape.n, "controller memory y")?;
        ensure_len(&memory.u, shape.m, "controller memory u")?;

        let predicted = self.plant.predict(t, &memory.y, &memory.u)?;
        ensure_len(&predicted, shape.n, "plant prediction")?;

        let w = y_target - predicted;
        let (u, xi_next) = self.unit.step(&w, xi)?;
        Ok(ControllerOutput {
            memory: ControllerMemory::new(y_target.clone(), u.clone()),
            u,
            xi: xi_next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::CertificateMode;
    use crate::params::UnitShape;
    use crate::plant::RobotFleet;
    use ren_types::{RenError, UnitConfig};

    fn unit(n: usize, m: usize) -> EquilibriumUnit {
        EquilibriumUnit::new(
            UnitShape::new(n, m, 4, 3),
            CertificateMode::Contracting,
            &UnitConfig::seeded(42),
        )
        .unwrap()
    }

    #[test]
    fn test_step_feeds_residual() {
        let ctrl = Controller::new(unit(2, 1), |_t: f64, y: &Vector, _u: &Vector| y * 0.5);
        let memory = ControllerMemory::new(Vector::from_vec(vec![2.0, -2.0]), Vector::zeros(1));
        let target = Vector::from_vec(vec![1.5, 0.0]);
        let xi = Vector::from_vec(vec![0.1, 0.2, 0.3, 0.4]);
        let out = ctrl.step(0.0, &target, &xi, &memory).unwrap();

        // Residual: [1.5 - 1.0, 0.0 + 1.0]
        let w = Vector::from_vec(vec![0.5, 1.0]);
        let (u, xi_next) = ctrl.unit().step(&w, &xi).unwrap();
        assert_eq!(out.u, u);
        assert_eq!(out.xi, xi_next);
        assert_eq!(out.memory.y, target);
        assert_eq!(out.memory.u, u);
    }

    #[test]
    fn test_plant_sees_time_and_memory() {
        let plant = |t: f64, y: &Vector, u: &Vector| {
            assert_eq!(t, 3.5);
            assert_eq!(u.len(), 1);
            y.clone()
        };
        let ctrl = Controller::new(unit(2, 1), plant);
        let memory = ControllerMemory::zeros(2, 1);
        let out = ctrl
            .step(3.5, &Vector::zeros(2), &Vector::zeros(4), &memory)
            .unwrap();
        assert_eq!(out.u.len(), 1);
    }

    #[test]
    fn test_prediction_width_checked() {
        let ctrl = Controller::new(unit(2, 1), |_t: f64, _y: &Vector, _u: &Vector| {
            Vector::zeros(3)
        });
        let err = ctrl
            .step(0.0, &Vector::zeros(2), &Vector::zeros(4), &ControllerMemory::zeros(2, 1))
            .unwrap_err();
        assert!(matches!(err, RenError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_memory_width_checked() {
        let ctrl = Controller::new(unit(2, 1), |_t: f64, y: &Vector, _u: &Vector| y.clone());
        assert!(ctrl
            .step(0.0, &Vector::zeros(2), &Vector::zeros(4), &ControllerMemory::zeros(2, 2))
            .is_err());
    }

    #[test]
    fn test_closed_loop_with_robot_fleet() {
        // Two robots: plant state width 8, control width 4.
        let xbar = Vector::from_vec(vec![1.0, 1.0, 0.0, 0.0, -1.0, 1.0, 0.0, 0.0]);
        let fleet = RobotFleet::new(xbar.clone(), false).unwrap();
        let ctrl = Controller::new(unit(8, 4), fleet);

        let mut xi = Vector::zeros(4);
        let mut memory = ControllerMemory::new(
            Vector::from_vec(vec![2.0, 0.0, 0.0, 0.0, -2.0, 0.0, 0.0, 0.0]),
            Vector::zeros(4),
        );
        // Track the fixed formation x̄; the residual against the plant's
        // prediction drives the unit.
        let mut driven_steps = 0;
        for k in 0..50 {
            let t = k as f64 * 0.05;
            let w = &xbar - ctrl.plant().predict(t, &memory.y, &memory.u).unwrap();
            if w.norm() > 1e-12 {
                driven_steps += 1;
            }
            if k == 0 {
                // Start displaced from x̄ with zero force
                assert!(w.norm() > 0.1);
            }
            let out = ctrl.step(t, &xbar, &xi, &memory).unwrap();
            let (u, xi_next) = ctrl.unit().step(&w, &xi).unwrap();
            assert_eq!(out.u, u);
            assert_eq!(out.xi, xi_next);
            assert!(out.u.iter().all(|v| v.is_finite()));
            xi = out.xi;
            memory = out.memory;
        }
        assert!(driven_steps > 1);
        assert_eq!(memory.y, xbar);
    }
}
