// ─────────────────────────────────────────────────────────────────────
// Director-Class AI — Equilibrium Network
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Interconnection of gain-bounded equilibrium units over a fixed mixing
//! matrix, with per-unit gain budgets chosen so the joint operator keeps
//! a finite L2 gain.
//!
//! Units are evaluated in order within a step; each one reads only its
//! own slice of the mixed input, so the order does not affect results.

pub mod interconnect;

pub use interconnect::{build_layout, unit_gamma, NetworkInterconnection, NetworkOutput, UnitLayout};
