//! Command-line front end for syncphony
//!
//! The `syncphony` binary loads a symphony, assembles the orchestra and
//! conducts the run; `syncphony-musician` is the reference worker it launches
//! by default.

pub mod perform;

pub use perform::{exit_status, perform, PerformOptions, EXIT_INTERRUPTED};
