//! Shared utilities for syncphony
//!
//! Tracing setup and structured event helpers used by both binaries, plus
//! the spawn hardening applied to every musician process.

pub mod process;
pub mod tracing;
