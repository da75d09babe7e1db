// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Equilibrium Kernel Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all Equilibrium Kernel failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenError {
    /// An operand shape violates the declared `(n, m, n_xi, l)` contract
    /// or the mixing-matrix partitioning.
    #[error("dimension mismatch in {context}: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        context: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// A matrix inverse was requested for a singular (or numerically
    /// singular) operand.
    #[error("singular matrix: {0}")]
    SingularMatrix(String),

    /// The free parameters, at the current gain, cannot yield a valid
    /// stability certificate.
    #[error("certificate infeasible: {0}")]
    CertificateInfeasible(String),

    /// The small-gain rescaling produced a non-positive or non-finite
    /// gain for one unit of an interconnection.
    #[error("gain budget exhausted for unit {unit}: gamma = {gamma}")]
    GainBudgetExhausted { unit: usize, gamma: f64 },

    /// Invalid input (parameters, mode, index).
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Numerical error (NaN/Inf in computation).
    #[error("numerical error: {0}")]
    Numerical(String),
}

impl RenError {
    /// Shorthand for a shape check failure.
    pub fn dimension(
        context: impl Into<String>,
        expected: (usize, usize),
        actual: (usize, usize),
    ) -> Self {
        RenError::DimensionMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}

pub type RenResult<T> = Result<T, RenError>;
