//! Core domain types for `syncphony`.
//!
//! - **`ids`**: The `TaskId` key used by plans, messages and state tables
//! - **`role`**: The closed enumeration of musician capability roles
//! - **`state`**: The per-task state machine and the derived run outcome

pub mod ids;
pub mod role;
pub mod state;

pub use ids::*;
pub use role::*;
pub use state::*;
