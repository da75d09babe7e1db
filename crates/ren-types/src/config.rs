// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Equilibrium Kernel Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{RenError, RenResult};

/// Construction-time configuration for a single equilibrium unit.
///
/// Threaded explicitly through every constructor; nothing in the kernel
/// reads numeric settings from global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    /// Diagonal regularisation ε added to every Gram matrix so that the
    /// certificate blocks are strictly positive definite.
    /// Default: 0.001.
    pub epsilon: f64,

    /// Standard deviation of the Gaussian used to draw free parameters.
    /// Default: 0.1.
    pub init_std: f64,

    /// RNG seed for parameter initialisation. `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.001,
            init_std: 0.1,
            seed: None,
        }
    }
}

impl UnitConfig {
    /// Same defaults with a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> RenResult<()> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(RenError::Config(format!(
                "epsilon must be finite and > 0, got {}",
                self.epsilon
            )));
        }
        if !self.init_std.is_finite() || self.init_std <= 0.0 {
            return Err(RenError::Config(format!(
                "init_std must be finite and > 0, got {}",
                self.init_std
            )));
        }
        Ok(())
    }

    /// Load from JSON string.
    pub fn from_json(json: &str) -> RenResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| RenError::Config(format!("JSON parse error: {e}")))
    }
}

/// Construction-time configuration for an interconnection of units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Settings shared by every unit. With a seed `s`, unit `j` is
    /// initialised from `s + j + 1` and the gain budgets from `s`.
    pub unit: UnitConfig,

    /// Standard deviation of the initial gain budgets `y[j]` and `z`.
    /// Default: 1.0.
    pub budget_std: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            unit: UnitConfig::default(),
            budget_std: 1.0,
        }
    }
}

impl NetworkConfig {
    pub fn seeded(seed: u64) -> Self {
        Self {
            unit: UnitConfig::seeded(seed),
            ..Self::default()
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> RenResult<()> {
        self.unit.validate()?;
        if !self.budget_std.is_finite() || self.budget_std <= 0.0 {
            return Err(RenError::Config(format!(
                "budget_std must be finite and > 0, got {}",
                self.budget_std
            )));
        }
        Ok(())
    }

    /// Load from JSON string.
    pub fn from_json(json: &str) -> RenResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| RenError::Config(format!("JSON parse error: {e}")))
    }

    /// Seed for unit `j`, derived from the network seed.
    pub fn unit_config(&self, j: usize) -> UnitConfig {
        UnitConfig {
            seed: self.unit.seed.map(|s| s.wrapping_add(j as u64 + 1)),
            ..self.unit.clone()
        }
    }
}
