//! Core domain types, wire messages and errors for `syncphony`.
//!
//! This crate establishes the vocabulary shared by the plan store, the
//! conductor and the musicians.
//!
//! ## Key Components
//!
//! - **`errors`**: The `LoadError` raised while reading a symphony and the
//!   general `Error` enum with its `Result` alias.
//! - **`types`**: Identifiers (`TaskId`), the closed `Role` roster, the
//!   per-task `TaskState` machine and the derived `RunOutcome`.
//! - **`messages`**: The dispatch and report messages exchanged with worker
//!   processes, validated at the serialization boundary.
//! - **`constants`**: Environment variable names and default timings.

pub mod constants;
pub mod errors;
pub mod messages;
pub mod types;

pub use self::{
    constants::*,
    errors::{Error, LoadError, Result},
    messages::{DispatchMessage, Parameters, Report, ReportError, ReportStatus},
    types::*,
};
