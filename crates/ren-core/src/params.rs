// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Equilibrium Kernel Free Parameters
// ─────────────────────────────────────────────────────────────────────
//! Structural sizes and the unconstrained (trainable) parameter bundle
//! of one equilibrium unit.
//!
//! Nothing here carries a stability guarantee on its own; the
//! certificate is produced from these matrices by
//! [`derive_certificate`](crate::certificate::derive_certificate).

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use ren_types::{RenError, RenResult};

use crate::certificate::CertificateMode;
use crate::matrix::{ensure_shape, Mat};

/// Structural integers of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitShape {
    /// External input width.
    pub n: usize,
    /// Output width.
    pub m: usize,
    /// Internal memory width.
    pub n_xi: usize,
    /// Number of equilibrium channels.
    pub l: usize,
}

impl UnitShape {
    pub fn new(n: usize, m: usize, n_xi: usize, l: usize) -> Self {
        Self { n, m, n_xi, l }
    }

    /// Side of the square `X` / `H` matrices: `2·n_xi + l`.
    pub fn x_dim(&self) -> usize {
        2 * self.n_xi + self.l
    }

    /// Side of the square `X3` / `Y3` matrices: `max(n, m)`.
    pub fn s(&self) -> usize {
        self.n.max(self.m)
    }

    /// Zip per-unit size arrays into shapes.
    pub fn from_size_arrays(
        n: &[usize],
        m: &[usize],
        n_xi: &[usize],
        l: &[usize],
    ) -> RenResult<Vec<UnitShape>> {
        let count = n.len();
        for (name, len) in [("m[]", m.len()), ("n_xi[]", n_xi.len()), ("l[]", l.len())] {
            if len != count {
                return Err(RenError::dimension(
                    format!("size array {name}"),
                    (count, 1),
                    (len, 1),
                ));
            }
        }
        Ok((0..count)
            .map(|j| UnitShape::new(n[j], m[j], n_xi[j], l[j]))
            .collect())
    }
}

/// How the direct feed-through `D22` is parameterised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Feedthrough {
    /// `D22` (`m×n`) is itself a free matrix. Used by contracting units.
    Direct { d22: Mat },
    /// `D22` is derived from a Cayley transform of `X3`, `Y3` (`s×s`).
    /// Used by gain-bounded units.
    Cayley { x3: Mat, y3: Mat },
}

/// Free (trainable) parameters of one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeParameters {
    /// `(2·n_xi + l)` square.
    pub x: Mat,
    /// `n_xi` square; only its skew part enters `E`.
    pub y: Mat,
    /// `n_xi × n`.
    pub b2: Mat,
    /// `m × n_xi`.
    pub c2: Mat,
    /// `m × l`.
    pub d21: Mat,
    /// `l × n`.
    pub d12: Mat,
    pub feedthrough: Feedthrough,
}

fn randn<R: Rng + ?Sized>(rows: usize, cols: usize, std: f64, rng: &mut R) -> Mat {
    Mat::from_fn(rows, cols, |_, _| std * rng.sample::<f64, _>(StandardNormal))
}

impl FreeParameters {
    /// Draw every entry from `N(0, std²)`. The feed-through variant
    /// follows `mode`.
    pub fn random<R: Rng + ?Sized>(
        shape: &UnitShape,
        mode: &CertificateMode,
        std: f64,
        rng: &mut R,
    ) -> Self {
        let UnitShape { n, m, n_xi, l } = *shape;
        let x = randn(shape.x_dim(), shape.x_dim(), std, rng);
        let y = randn(n_xi, n_xi, std, rng);
        let b2 = randn(n_xi, n, std, rng);
        let c2 = randn(m, n_xi, std, rng);
        let d21 = randn(m, l, std, rng);
        let feedthrough = match mode {
            CertificateMode::Contracting => Feedthrough::Direct {
                d22: randn(m, n, std, rng),
            },
            CertificateMode::GainBounded { .. } => Feedthrough::Cayley {
                x3: randn(shape.s(), shape.s(), std, rng),
                y3: randn(shape.s(), shape.s(), std, rng),
            },
        };
        let d12 = randn(l, n, std, rng);
        Self {
            x,
            y,
            b2,
            c2,
            d21,
            d12,
            feedthrough,
        }
    }

    /// All-zero parameters of the right shapes. Useful as a starting
    /// point for injected values.
    pub fn zeros(shape: &UnitShape, mode: &CertificateMode) -> Self {
        let UnitShape { n, m, n_xi, l } = *shape;
        let feedthrough = match mode {
            CertificateMode::Contracting => Feedthrough::Direct {
                d22: Mat::zeros(m, n),
            },
            CertificateMode::GainBounded { .. } => Feedthrough::Cayley {
                x3: Mat::zeros(shape.s(), shape.s()),
                y3: Mat::zeros(shape.s(), shape.s()),
            },
        };
        Self {
            x: Mat::zeros(shape.x_dim(), shape.x_dim()),
            y: Mat::zeros(n_xi, n_xi),
            b2: Mat::zeros(n_xi, n),
            c2: Mat::zeros(m, n_xi),
            d21: Mat::zeros(m, l),
            d12: Mat::zeros(l, n),
            feedthrough,
        }
    }

    /// Check every block against `shape`.
    pub fn validate(&self, shape: &UnitShape) -> RenResult<()> {
        let UnitShape { n, m, n_xi, l } = *shape;
        ensure_shape(&self.x, shape.x_dim(), shape.x_dim(), "X")?;
        ensure_shape(&self.y, n_xi, n_xi, "Y")?;
        ensure_shape(&self.b2, n_xi, n, "B2")?;
        ensure_shape(&self.c2, m, n_xi, "C2")?;
        ensure_shape(&self.d21, m, l, "D21")?;
        ensure_shape(&self.d12, l, n, "D12")?;
        match &self.feedthrough {
            Feedthrough::Direct { d22 } => ensure_shape(d22, m, n, "D22")?,
            Feedthrough::Cayley { x3, y3 } => {
                ensure_shape(x3, shape.s(), shape.s(), "X3")?;
                ensure_shape(y3, shape.s(), shape.s(), "Y3")?;
            }
        }
        let mut blocks = vec![&self.x, &self.y, &self.b2, &self.c2, &self.d21, &self.d12];
        match &self.feedthrough {
            Feedthrough::Direct { d22 } => blocks.push(d22),
            Feedthrough::Cayley { x3, y3 } => blocks.extend([x3, y3]),
        }
        let finite = blocks
            .iter()
            .all(|mat| mat.iter().all(|v| v.is_finite()));
        if !finite {
            return Err(RenError::Numerical(
                "free parameters contain NaN or Inf".to_string(),
            ));
        }
        Ok(())
    }
}
