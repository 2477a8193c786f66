use syncphony_core::{RunOutcome, TaskId, SYNCPHONY_LOG_VAR};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Initialize the tracing system
///
/// Log lines go to stderr so that stdout stays free for the musician wire
/// protocol. The filter is read from `SYNCPHONY_LOG`, then `RUST_LOG`, and
/// defaults to `info`.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_env(SYNCPHONY_LOG_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new("info"))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Check if we're running in a TTY environment
fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Create the span a whole run executes in
pub fn run_span(plan: &str, total_tasks: usize) -> Span {
    span!(Level::INFO, "conductor", plan = %plan, total_tasks = %total_tasks)
}

/// Create the span a musician process executes in
pub fn musician_span(role: &str) -> Span {
    span!(Level::INFO, "musician", role = %role)
}

/// Counts of task states at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTally {
    pub completed: usize,
    pub failed: usize,
    pub dispatched: usize,
    pub pending: usize,
}

/// Emit the single summary event that closes a run
pub fn run_finished(outcome: RunOutcome, tally: RunTally, elapsed_ms: u64) {
    match outcome {
        RunOutcome::Completed => info!(
            outcome = %outcome,
            completed = tally.completed,
            elapsed_ms = elapsed_ms,
            "run finished: all tasks executed successfully"
        ),
        RunOutcome::HaltedOnFailure => error!(
            outcome = %outcome,
            completed = tally.completed,
            failed = tally.failed,
            dispatched = tally.dispatched,
            pending = tally.pending,
            elapsed_ms = elapsed_ms,
            "run finished: a critical failure occurred, symphony halted"
        ),
        RunOutcome::HaltedOnTimeout => error!(
            outcome = %outcome,
            completed = tally.completed,
            dispatched = tally.dispatched,
            pending = tally.pending,
            elapsed_ms = elapsed_ms,
            "run finished: performance timed out, symphony halted"
        ),
    }
}

/// Emit a structured event for a task reaching a terminal state
pub fn task_finished(task_id: &TaskId, role: &str, error_message: Option<&str>) {
    match error_message {
        None => info!(task_id = %task_id, role = %role, "task completed"),
        Some(message) => error!(
            task_id = %task_id,
            role = %role,
            error_message = %message,
            "task failed"
        ),
    }
}
