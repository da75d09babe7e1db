// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Equilibrium Kernel Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Configuration and error hierarchy for the Equilibrium Kernel —
//! certified recurrent equilibrium units and their interconnections.

pub mod config;
pub mod error;

pub use config::{NetworkConfig, UnitConfig};
pub use error::{RenError, RenResult};
