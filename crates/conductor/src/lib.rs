//! The syncphony conductor
//!
//! This crate drives a loaded [`TaskGraph`](syncphony_plan::TaskGraph) to
//! completion. It starts one musician process per role, dispatches each task
//! once all of its dependencies have completed, consumes the musicians'
//! reports and halts the run on the first failure or when the time budget
//! runs out.
//!
//! The worker side of the message contract lives in [`musician`].

pub mod conductor;
pub mod config;
pub mod dispatch;
pub mod listener;
pub mod musician;
pub mod pool;
pub mod queue;
pub mod state;

pub use conductor::{run_with, Conductor, RunReport, RunTiming};
pub use config::{ConductorConfig, ConductorConfigBuilder, ConfigSource, WorkerSpec};
pub use dispatch::{dispatch_ready, is_ready};
pub use listener::{drain, drain_reports, DrainSummary};
pub use pool::{MusicianExit, WorkerPool};
pub use queue::{report_channel, RawReport, ReportInbox, ReportSender, WorkQueue};
pub use state::{TaskRecord, TaskStates, TransitionError};
