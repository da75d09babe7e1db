// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Equilibrium Unit
// ─────────────────────────────────────────────────────────────────────
//! One recurrent equilibrium unit: free parameters, the certificate
//! derived from them, and the forward recurrence
//!
//!   ε_i    = φ((C1·ξ + D11·ε + D12·w)_i / Λ_i),   i = 0..l−1 in order
//!   E·ξ⁺   = F·ξ + B1·ε + B2·w
//!   u      = C2·ξ + D21·ε + D22·w
//!
//! D11 is strictly lower triangular, so channel i only reads channels
//! below it and the implicit equation resolves by forward substitution.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use ren_types::{RenError, RenResult, UnitConfig};

use crate::certificate::{derive_certificate, CertificateMode, DerivedCertificate};
use crate::matrix::{ensure_len, Vector};
use crate::params::{FreeParameters, UnitShape};

/// A certified recurrent equilibrium unit.
///
/// Parameters and certificate are only ever replaced together, after a
/// successful rebuild. A failed rebuild leaves the unit untouched.
#[derive(Debug, Clone)]
pub struct EquilibriumUnit {
    shape: UnitShape,
    epsilon: f64,
    params: FreeParameters,
    certificate: DerivedCertificate,
}

impl EquilibriumUnit {
    /// Randomly initialised unit.
    pub fn new(shape: UnitShape, mode: CertificateMode, config: &UnitConfig) -> RenResult<Self> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let params = FreeParameters::random(&shape, &mode, config.init_std, &mut rng);
        Self::from_parameters(shape, mode, params, config.epsilon)
    }

    /// Unit built from injected free parameters.
    pub fn from_parameters(
        shape: UnitShape,
        mode: CertificateMode,
        params: FreeParameters,
        epsilon: f64,
    ) -> RenResult<Self> {
        let certificate = derive_certificate(&shape, &params, mode, epsilon)?;
        Ok(Self {
            shape,
            epsilon,
            params,
            certificate,
        })
    }

    pub fn shape(&self) -> &UnitShape {
        &self.shape
    }

    pub fn mode(&self) -> CertificateMode {
        self.certificate.mode()
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn parameters(&self) -> &FreeParameters {
        &self.params
    }

    pub fn certificate(&self) -> &DerivedCertificate {
        &self.certificate
    }

    /// Apply `update` to a copy of the free parameters, re-derive the
    /// certificate, and commit both on success.
    pub fn update_parameters<F>(&mut self, update: F) -> RenResult<()>
    where
        F: FnOnce(&mut FreeParameters),
    {
        let mut params = self.params.clone();
        update(&mut params);
        let certificate = derive_certificate(&self.shape, &params, self.mode(), self.epsilon)
            .map_err(|e| {
                log::warn!("parameter update rejected: {e}");
                e
            })?;
        self.params = params;
        self.certificate = certificate;
        Ok(())
    }

    /// Copy of this unit re-certified for gain budget `gamma`.
    pub fn with_gamma(&self, gamma: f64) -> RenResult<Self> {
        if self.mode() == CertificateMode::Contracting {
            return Err(RenError::Validation(
                "contracting unit has no gain budget to rescale".to_string(),
            ));
        }
        let mode = CertificateMode::GainBounded { gamma };
        let certificate = derive_certificate(&self.shape, &self.params, mode, self.epsilon)?;
        Ok(Self {
            shape: self.shape,
            epsilon: self.epsilon,
            params: self.params.clone(),
            certificate,
        })
    }

    /// Re-certify in place for gain budget `gamma`.
    pub fn set_gamma(&mut self, gamma: f64) -> RenResult<()> {
        *self = self.with_gamma(gamma)?;
        Ok(())
    }

    /// Resolve the equilibrium channels for state `xi` and input `w`.
    fn equilibrium(&self, w: &Vector, xi: &Vector) -> Vector {
        let cert = &self.certificate;
        let l = self.shape.l;
        let act = cert.activation();
        let d11 = cert.d11();
        let lambda = cert.lambda();
        // C1·ξ + D12·w does not depend on ε; only the D11 term is sequential.
        let drive = cert.c1() * xi + &self.params.d12 * w;
        let mut eps = Vector::zeros(l);
        for i in 0..l {
            let feedback: f64 = (0..i).map(|k| d11[(i, k)] * eps[k]).sum();
            eps[i] = act.apply((drive[i] + feedback) / lambda[i]);
        }
        eps
    }

    /// One forward step: `(w, ξ) → (u, ξ⁺)`.
    pub fn step(&self, w: &Vector, xi: &Vector) -> RenResult<(Vector, Vector)> {
        ensure_len(w, self.shape.n, "unit input w")?;
        ensure_len(xi, self.shape.n_xi, "unit state xi")?;

        let cert = &self.certificate;
        let eps = self.equilibrium(w, xi);

        let e_xi_next = cert.f() * xi + cert.b1() * &eps + &self.params.b2 * w;
        let xi_next = cert.e_inv() * e_xi_next;
        let u = &self.params.c2 * xi + &self.params.d21 * &eps + cert.d22() * w;

        log::trace!(
            "unit step: |w|={:.4e} |xi|={:.4e} -> |u|={:.4e} |xi+|={:.4e}",
            w.norm(),
            xi.norm(),
            u.norm(),
            xi_next.norm()
        );
        Ok((u, xi_next))
    }

    /// Roll the recurrence over `inputs` starting from `xi0`.
    ///
    /// Returns the output at every step and the final state.
    pub fn step_sequence(&self, inputs: &[Vector], xi0: &Vector) -> RenResult<(Vec<Vector>, Vector)> {
        let mut xi = xi0.clone();
        let mut outputs = Vec::with_capacity(inputs.len());
        for w in inputs {
            let (u, xi_next) = self.step(w, &xi)?;
            outputs.push(u);
            xi = xi_next;
        }
        Ok((outputs, xi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Mat;

    fn contracting(shape: UnitShape, seed: u64) -> EquilibriumUnit {
        EquilibriumUnit::new(shape, CertificateMode::Contracting, &UnitConfig::seeded(seed)).unwrap()
    }

    fn gain_bounded(shape: UnitShape, gamma: f64, seed: u64) -> EquilibriumUnit {
        let cfg = UnitConfig {
            init_std: 1.0,
            ..UnitConfig::seeded(seed)
        };
        EquilibriumUnit::new(shape, CertificateMode::GainBounded { gamma }, &cfg).unwrap()
    }

    #[test]
    fn test_end_to_end_zero_input() {
        let unit = contracting(UnitShape::new(2, 2, 4, 3), 42);
        let w = Vector::zeros(2);
        let xi = Vector::zeros(4);
        let (u, xi_next) = unit.step(&w, &xi).unwrap();
        assert_eq!(u.len(), 2);
        assert_eq!(xi_next.len(), 4);
        assert!(u.iter().chain(xi_next.iter()).all(|v| v.is_finite()));

        let (u2, xi_next2) = unit.step(&w, &xi).unwrap();
        assert_eq!(u, u2);
        assert_eq!(xi_next, xi_next2);
    }

    #[test]
    fn test_forward_determinism() {
        let unit = gain_bounded(UnitShape::new(3, 2, 4, 5), 0.7, 7);
        let w = Vector::from_vec(vec![0.3, -1.2, 0.8]);
        let xi = Vector::from_vec(vec![0.1, 0.2, -0.3, 0.4]);
        let a = unit.step(&w, &xi).unwrap();
        let b = unit.clone().step(&w, &xi).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_same_seed_same_unit() {
        let shape = UnitShape::new(2, 2, 3, 2);
        let a = contracting(shape, 5);
        let b = contracting(shape, 5);
        assert_eq!(a.parameters(), b.parameters());
    }

    #[test]
    fn test_zero_channels_is_linear() {
        for mode in [
            CertificateMode::Contracting,
            CertificateMode::GainBounded { gamma: 1.5 },
        ] {
            let shape = UnitShape::new(2, 3, 3, 0);
            let cfg = UnitConfig::seeded(3);
            let unit = EquilibriumUnit::new(shape, mode, &cfg).unwrap();
            let w = Vector::from_vec(vec![0.5, -0.25]);
            let xi = Vector::from_vec(vec![1.0, -1.0, 0.5]);
            let (u, xi_next) = unit.step(&w, &xi).unwrap();

            let cert = unit.certificate();
            let p = unit.parameters();
            let expected_xi = cert.e_inv() * (cert.f() * &xi + &p.b2 * &w);
            let expected_u = &p.c2 * &xi + cert.d22() * &w;
            assert!((xi_next - expected_xi).amax() < 1e-9);
            assert!((u - expected_u).amax() < 1e-9);
        }
    }

    #[test]
    fn test_equilibrium_satisfies_implicit_equation() {
        let unit = contracting(UnitShape::new(2, 2, 3, 5), 13);
        let w = Vector::from_vec(vec![0.7, -0.4]);
        let xi = Vector::from_vec(vec![0.2, 0.0, -0.6]);
        let eps = unit.equilibrium(&w, &xi);
        let cert = unit.certificate();
        let v = cert.c1() * &xi + cert.d11() * &eps + &unit.parameters().d12 * &w;
        for i in 0..5 {
            let expected = (v[i] / cert.lambda()[i]).tanh();
            assert!((eps[i] - expected).abs() < 1e-12, "channel {i}");
        }
    }

    #[test]
    fn test_relu_channels_non_negative() {
        let unit = gain_bounded(UnitShape::new(2, 2, 3, 6), 0.5, 21);
        let w = Vector::from_vec(vec![2.0, -3.0]);
        let xi = Vector::from_vec(vec![1.0, -2.0, 0.5]);
        let eps = unit.equilibrium(&w, &xi);
        assert!(eps.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_state_update_solves_e() {
        let unit = contracting(UnitShape::new(1, 1, 4, 2), 17);
        let w = Vector::from_vec(vec![0.9]);
        let xi = Vector::from_vec(vec![0.1, -0.2, 0.3, -0.4]);
        let (_, xi_next) = unit.step(&w, &xi).unwrap();
        let eps = unit.equilibrium(&w, &xi);
        let cert = unit.certificate();
        let rhs = cert.f() * &xi + cert.b1() * &eps + &unit.parameters().b2 * &w;
        assert!((cert.e() * xi_next - rhs).amax() < 1e-9);
    }

    #[test]
    fn test_step_rejects_bad_widths() {
        let unit = contracting(UnitShape::new(2, 2, 4, 3), 1);
        assert!(matches!(
            unit.step(&Vector::zeros(3), &Vector::zeros(4)),
            Err(RenError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            unit.step(&Vector::zeros(2), &Vector::zeros(5)),
            Err(RenError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_update_parameters_rebuilds() {
        let mut unit = contracting(UnitShape::new(2, 2, 3, 2), 9);
        let before = unit.certificate().f().clone();
        unit.update_parameters(|p| p.x *= 2.0).unwrap();
        assert!((unit.certificate().f() - before * 4.0).amax() < 1e-12);
    }

    #[test]
    fn test_failed_update_leaves_unit_untouched() {
        let mut unit = contracting(UnitShape::new(2, 2, 3, 2), 9);
        let params = unit.parameters().clone();
        let f = unit.certificate().f().clone();
        let err = unit.update_parameters(|p| p.c2 = Mat::zeros(1, 1)).unwrap_err();
        assert!(matches!(err, RenError::DimensionMismatch { .. }));
        assert_eq!(unit.parameters(), &params);
        assert_eq!(unit.certificate().f(), &f);
    }

    #[test]
    fn test_set_gamma_changes_d22() {
        let mut unit = gain_bounded(UnitShape::new(2, 2, 2, 2), 1.0, 4);
        let d22 = unit.certificate().d22().clone();
        unit.set_gamma(0.5).unwrap();
        assert_eq!(unit.mode(), CertificateMode::GainBounded { gamma: 0.5 });
        assert!((unit.certificate().d22() - d22 * 0.5).amax() < 1e-12);
    }

    #[test]
    fn test_contracting_rejects_gamma() {
        let unit = contracting(UnitShape::new(1, 1, 1, 1), 2);
        assert!(matches!(unit.with_gamma(1.0), Err(RenError::Validation(_))));
    }

    #[test]
    fn test_invalid_gamma_leaves_unit_untouched() {
        let mut unit = gain_bounded(UnitShape::new(1, 1, 2, 1), 1.0, 6);
        assert!(unit.set_gamma(-1.0).is_err());
        assert_eq!(unit.mode(), CertificateMode::GainBounded { gamma: 1.0 });
    }

    #[test]
    fn test_step_sequence_matches_manual_loop() {
        let unit = gain_bounded(UnitShape::new(2, 1, 2, 3), 0.9, 12);
        let inputs = vec![
            Vector::from_vec(vec![1.0, 0.0]),
            Vector::from_vec(vec![0.0, 1.0]),
            Vector::from_vec(vec![-1.0, 0.5]),
        ];
        let xi0 = Vector::zeros(2);
        let (outs, last) = unit.step_sequence(&inputs, &xi0).unwrap();
        let mut xi = xi0;
        for (w, out) in inputs.iter().zip(&outs) {
            let (u, next) = unit.step(w, &xi).unwrap();
            assert_eq!(&u, out);
            xi = next;
        }
        assert_eq!(xi, last);
    }
}
