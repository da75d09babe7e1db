// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Equilibrium Kernel Core
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Recurrent equilibrium units whose free parameters are mapped onto a
//! contraction (and optionally L2-gain) certificate, plus a controller
//! wrapper and a reference robot plant.
//!
//! # Certificate Invariants
//!
//! 1. **Derived matrices are never assigned directly**: a
//!    `DerivedCertificate` can only come out of `derive_certificate`,
//!    which builds it from `H = XᵗX + εI [+ bounded-real correction]`.
//!
//! 2. **Parameters and certificate move together**: an
//!    `EquilibriumUnit` replaces both in one assignment after a
//!    successful rebuild. A rejected rebuild leaves the old pair in place.
//!
//! 3. **Equilibrium channels resolve in ascending order**: `D11` is
//!    strictly lower triangular, so channel `i` reads only channels `< i`.
//!
//! 4. **No inversion on the hot path**: `E⁻¹` is computed once per
//!    rebuild; a forward step is matrix-vector products plus `l` scalar
//!    activations.

pub mod certificate;
pub mod controller;
pub mod matrix;
pub mod params;
pub mod plant;
pub mod unit;

pub use certificate::{
    certificate_matrix, derive_certificate, Activation, CertificateMode, DerivedCertificate,
};
pub use controller::{Controller, ControllerMemory, ControllerOutput, PlantDynamics};
pub use matrix::{Mat, Vector};
pub use params::{Feedthrough, FreeParameters, UnitShape};
pub use plant::RobotFleet;
pub use unit::EquilibriumUnit;
