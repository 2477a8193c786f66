//! The run loop and halt policy
//!
//! Each iteration dispatches every ready task, drains the report queue, and
//! then decides: halt on the first failure, finish once every task has
//! completed, or give up when the time budget is spent. Between iterations
//! the loop sleeps until a report arrives or the poll interval elapses.

use crate::config::ConductorConfig;
use crate::dispatch::dispatch_ready;
use crate::listener::drain;
use crate::pool::{MusicianExit, WorkerPool};
use crate::queue::{report_channel, ReportInbox, WorkQueue};
use crate::state::TaskStates;
use std::time::Duration;
use syncphony_core::{Result, RunOutcome, TaskId, TaskState};
use syncphony_plan::TaskGraph;
use syncphony_utils::tracing::{run_finished, run_span, RunTally};
use tokio::time::Instant;
use tracing::{debug, info, Instrument};

/// Timing knobs for a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunTiming {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl From<&ConductorConfig> for RunTiming {
    fn from(config: &ConductorConfig) -> Self {
        Self {
            timeout: config.timeout,
            poll_interval: config.poll_interval,
        }
    }
}

/// Everything known about a run once it has ended
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Final state of every task
    pub states: TaskStates,
    /// Task ids in the order they were handed to musicians
    pub dispatch_order: Vec<TaskId>,
    pub elapsed: Duration,
    /// How each musician exited; empty for runs without a pool
    pub musicians: Vec<MusicianExit>,
}

impl RunReport {
    /// Failed tasks and their error messages, in document order
    pub fn errors(&self) -> Vec<(TaskId, String)> {
        self.states
            .iter()
            .filter(|(_, record)| record.state == TaskState::Failed)
            .map(|(id, record)| {
                (
                    id.clone(),
                    record.error_message.clone().unwrap_or_default(),
                )
            })
            .collect()
    }

    pub fn tally(&self) -> RunTally {
        self.states.tally()
    }
}

/// Drive `graph` to an outcome using any work queue and report inbox.
///
/// This never returns an error: failures of individual tasks and of the
/// transport end up in the returned [`RunReport`].
pub async fn run_with<Q>(
    graph: &TaskGraph,
    queue: &mut Q,
    inbox: &mut ReportInbox,
    timing: RunTiming,
) -> RunReport
where
    Q: WorkQueue + ?Sized,
{
    let started = Instant::now();
    let deadline = started + timing.timeout;
    let mut states = TaskStates::for_graph(graph);
    let mut dispatch_order = Vec::new();

    let outcome = loop {
        dispatch_order.extend(dispatch_ready(graph, &mut states, queue));

        let failure_reported = drain(inbox, &mut states);
        if failure_reported || states.any_failed() {
            break RunOutcome::HaltedOnFailure;
        }
        if states.all_completed() {
            break RunOutcome::Completed;
        }

        let now = Instant::now();
        if now >= deadline {
            break RunOutcome::HaltedOnTimeout;
        }

        let wake_at = (now + timing.poll_interval).min(deadline);
        if !inbox.wait_until(wake_at).await {
            debug!(
                dispatched = states.count(TaskState::Dispatched),
                pending = states.count(TaskState::Pending),
                "no reports this interval"
            );
        }
    };

    let elapsed = started.elapsed();
    run_finished(
        outcome,
        states.tally(),
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
    );

    RunReport {
        outcome,
        states,
        dispatch_order,
        elapsed,
        musicians: Vec::new(),
    }
}

/// Runs one symphony with a pool of real musician processes
pub struct Conductor {
    graph: TaskGraph,
    config: ConductorConfig,
    name: String,
}

impl Conductor {
    pub fn new(graph: TaskGraph, config: ConductorConfig) -> Self {
        Self {
            graph,
            config,
            name: "symphony".to_string(),
        }
    }

    /// Name used for the run's log span, usually the plan path
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn config(&self) -> &ConductorConfig {
        &self.config
    }

    /// Start the orchestra, run the symphony and dismiss every musician.
    ///
    /// Errors only when the orchestra cannot be assembled. Musicians are
    /// stopped on every outcome; dropping this future kills them too.
    pub async fn perform(self) -> Result<RunReport> {
        self.config.validate()?;

        let (reports, mut inbox) = report_channel();
        let mut pool = WorkerPool::start(&self.config.roster, reports)?;
        info!(
            roles = ?pool.roles(),
            tasks = self.graph.len(),
            "orchestra assembled"
        );

        let timing = RunTiming::from(&self.config);
        let span = run_span(&self.name, self.graph.len());
        let mut report = run_with(&self.graph, &mut pool, &mut inbox, timing)
            .instrument(span)
            .await;

        report.musicians = pool.shutdown().await;
        Ok(report)
    }
}
