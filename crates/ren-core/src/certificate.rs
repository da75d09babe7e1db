// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Equilibrium Kernel Certificate Construction
// ─────────────────────────────────────────────────────────────────────
//! Free parameters → certified state-space matrices.
//!
//! Construction:
//!   1. (gain-bounded only) Cayley transform of X3, Y3 → D22, then the
//!      bounded-real correction built from C2, D21, D12, B2, D22
//!   2. H = XᵗX + εI [+ correction], symmetric positive definite
//!   3. Partition H on (n_xi, l, n_xi) and read off
//!        F = H31, B1 = H32, E = ½(H11 + H33 + Y − Yᵗ),
//!        Λ = s·diag(H22), D11 = −tril₋₁(H22), C1 = −H21
//!      with s = ½ for contracting units and s = 1 for gain-bounded ones.
//!
//! Any singular inverse along the way (E, R_cap, I + M) aborts the
//! construction with `CertificateInfeasible`; a partially built
//! certificate never escapes this module.

use serde::{Deserialize, Serialize};

use ren_types::{RenError, RenResult};

use crate::matrix::{diag_vec, inverse, regularised_gram, split3, strict_lower, vstack, Mat, Vector};
use crate::params::{Feedthrough, FreeParameters, UnitShape};

/// Which certificate a unit carries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CertificateMode {
    /// Contraction only; tanh equilibrium channels.
    Contracting,
    /// Contraction plus an L2-gain bound `gamma`; relu equilibrium channels.
    GainBounded { gamma: f64 },
}

impl CertificateMode {
    pub fn activation(&self) -> Activation {
        match self {
            CertificateMode::Contracting => Activation::Tanh,
            CertificateMode::GainBounded { .. } => Activation::Relu,
        }
    }

    pub fn gamma(&self) -> Option<f64> {
        match self {
            CertificateMode::Contracting => None,
            CertificateMode::GainBounded { gamma } => Some(*gamma),
        }
    }

    /// Factor `s` in `Λ = s·diag(H22)`: ½ when contracting, 1 when gain-bounded.
    fn lambda_scale(&self) -> f64 {
        match self {
            CertificateMode::Contracting => 0.5,
            CertificateMode::GainBounded { .. } => 1.0,
        }
    }
}

/// Saturating nonlinearity applied to each equilibrium channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Tanh,
    Relu,
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
        }
    }
}

/// Immutable bundle of certified matrices for one unit.
///
/// Only [`derive_certificate`] can build one, so every instance in
/// circulation satisfies the positive-definiteness condition it was
/// derived from.
#[derive(Debug, Clone)]
pub struct DerivedCertificate {
    shape: UnitShape,
    mode: CertificateMode,
    f: Mat,
    b1: Mat,
    e: Mat,
    e_inv: Mat,
    lambda: Vector,
    c1: Mat,
    d11: Mat,
    d22: Mat,
}

impl DerivedCertificate {
    pub fn shape(&self) -> &UnitShape {
        &self.shape
    }
    pub fn mode(&self) -> CertificateMode {
        self.mode
    }
    pub fn activation(&self) -> Activation {
        self.mode.activation()
    }
    /// `n_xi × n_xi`.
    pub fn f(&self) -> &Mat {
        &self.f
    }
    /// `n_xi × l`.
    pub fn b1(&self) -> &Mat {
        &self.b1
    }
    /// `n_xi × n_xi`, invertible.
    pub fn e(&self) -> &Mat {
        &self.e
    }
    pub fn e_inv(&self) -> &Mat {
        &self.e_inv
    }
    /// Strictly positive channel scales, length `l`.
    pub fn lambda(&self) -> &Vector {
        &self.lambda
    }
    /// `l × n_xi`.
    pub fn c1(&self) -> &Mat {
        &self.c1
    }
    /// `l × l`, strictly lower triangular.
    pub fn d11(&self) -> &Mat {
        &self.d11
    }
    /// `m × n`.
    pub fn d22(&self) -> &Mat {
        &self.d22
    }
}

fn infeasible(err: RenError) -> RenError {
    match err {
        RenError::SingularMatrix(msg) => RenError::CertificateInfeasible(msg),
        other => other,
    }
}

/// Bounded-real correction for a gain-bounded unit.
///
/// Returns `(correction, D22)` where `correction` is added to
/// `XᵗX + εI` before partitioning.
fn bounded_real_correction(
    shape: &UnitShape,
    params: &FreeParameters,
    x3: &Mat,
    y3: &Mat,
    gamma: f64,
    epsilon: f64,
) -> RenResult<(Mat, Mat)> {
    let UnitShape { n, m, n_xi, .. } = *shape;
    let s = shape.s();
    let eye_s = Mat::identity(s, s);

    // Cayley transform: M + Mᵗ ≻ 0 makes M̃ a strict contraction.
    let m_cayley = x3 * x3.transpose() + y3 - y3.transpose() + &eye_s * epsilon;
    let plus_inv = inverse(&(&eye_s + &m_cayley), "I+M").map_err(infeasible)?;
    let m_tilde = (&eye_s - &m_cayley) * plus_inv;
    let d22 = m_tilde.view((0, 0), (m, n)).into_owned() * gamma;

    let q = Mat::identity(m, m) * (-1.0 / gamma);
    let r_cap = Mat::identity(n, n) * gamma - d22.tr_mul(&d22) / gamma;
    let r_cap_inv = inverse(&r_cap, "R_cap").map_err(infeasible)?;

    let d22t_q = d22.transpose() * &q;
    let c2_cap = &d22t_q * &params.c2;
    let d21_cap = &d22t_q * &params.d21 - params.d12.transpose();

    let vec_r = vstack(&[&c2_cap.transpose(), &d21_cap.transpose(), &params.b2])?;
    let vec_q = vstack(&[
        &params.c2.transpose(),
        &params.d21.transpose(),
        &Mat::zeros(n_xi, m),
    ])?;

    let correction = &vec_r * r_cap_inv * vec_r.transpose() - &vec_q * q * vec_q.transpose();
    Ok((correction, d22))
}

/// Build the certificate matrix `H` and the feed-through `D22`.
///
/// Exposed so callers can verify positive definiteness independently
/// of the partitioned blocks.
pub fn certificate_matrix(
    shape: &UnitShape,
    params: &FreeParameters,
    mode: &CertificateMode,
    epsilon: f64,
) -> RenResult<(Mat, Mat)> {
    params.validate(shape)?;
    if !epsilon.is_finite() || epsilon <= 0.0 {
        return Err(RenError::Config(format!(
            "epsilon must be finite and > 0, got {epsilon}"
        )));
    }

    let base = regularised_gram(&params.x, epsilon);
    let (h, d22) = match (mode, &params.feedthrough) {
        (CertificateMode::Contracting, Feedthrough::Direct { d22 }) => (base, d22.clone()),
        (CertificateMode::GainBounded { gamma }, Feedthrough::Cayley { x3, y3 }) => {
            if !gamma.is_finite() || *gamma <= 0.0 {
                return Err(RenError::CertificateInfeasible(format!(
                    "gain budget must be finite and > 0, got {gamma}"
                )));
            }
            let (correction, d22) =
                bounded_real_correction(shape, params, x3, y3, *gamma, epsilon)?;
            (base + correction, d22)
        }
        (CertificateMode::Contracting, Feedthrough::Cayley { .. }) => {
            return Err(RenError::Validation(
                "contracting unit needs a direct D22, got Cayley feed-through".to_string(),
            ))
        }
        (CertificateMode::GainBounded { .. }, Feedthrough::Direct { .. }) => {
            return Err(RenError::Validation(
                "gain-bounded unit needs Cayley feed-through, got a direct D22".to_string(),
            ))
        }
    };

    if h.iter().chain(d22.iter()).any(|v| !v.is_finite()) {
        return Err(RenError::CertificateInfeasible(
            "certificate matrix has non-finite entries".to_string(),
        ));
    }
    Ok((h, d22))
}

/// Derive the certified state-space matrices from free parameters.
pub fn derive_certificate(
    shape: &UnitShape,
    params: &FreeParameters,
    mode: CertificateMode,
    epsilon: f64,
) -> RenResult<DerivedCertificate> {
    let (h, d22) = certificate_matrix(shape, params, &mode, epsilon)?;
    let [[h11, _, _], [h21, h22, _], [h31, h32, h33]] =
        split3(&h, [shape.n_xi, shape.l, shape.n_xi])?;

    let e = (h11 + h33 + &params.y - params.y.transpose()) * 0.5;
    let e_inv = inverse(&e, "E").map_err(infeasible)?;

    let lambda = diag_vec(&h22) * mode.lambda_scale();
    if let Some((i, v)) = lambda
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v <= 0.0)
    {
        return Err(RenError::CertificateInfeasible(format!(
            "channel scale Lambda[{i}] = {v} is not strictly positive"
        )));
    }

    let d11 = -strict_lower(&h22);
    let c1 = -h21;

    log::debug!(
        "certificate rebuilt: mode={mode:?} n={} m={} n_xi={} l={} min_lambda={:.4e}",
        shape.n,
        shape.m,
        shape.n_xi,
        shape.l,
        lambda.iter().copied().fold(f64::INFINITY, f64::min),
    );

    Ok(DerivedCertificate {
        shape: *shape,
        mode,
        f: h31,
        b1: h32,
        e,
        e_inv,
        lambda,
        c1,
        d11,
        d22,
    })
}
