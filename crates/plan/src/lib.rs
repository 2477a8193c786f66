//! The plan store for syncphony
//!
//! This crate loads a symphony document into an immutable [`TaskGraph`].
//! Dependency ids are not checked here; readiness is decided at run time
//! and [`TaskGraph::diagnostics`] explains tasks that can never start.

pub mod diagnostics;
pub mod graph;
pub mod loader;

pub use diagnostics::PlanDiagnostic;
pub use graph::{TaskGraph, TaskSpec};
pub use loader::{load, load_with_roster, parse_document};
