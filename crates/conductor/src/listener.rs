//! The report listener
//!
//! Drains whatever reports are already queued, applies them to the task
//! table and returns immediately. A report that does not parse, names an
//! unknown task or asks for an impossible transition is logged and skipped;
//! it never stops the run.

use crate::queue::{RawReport, ReportInbox};
use crate::state::TaskStates;
use syncphony_core::{Report, ReportStatus, TaskState};
use syncphony_utils::tracing::task_finished;
use tracing::{debug, info, warn};

/// What one drain pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    /// Reports applied to the task table
    pub applied: usize,
    /// Reports logged and dropped
    pub skipped: usize,
    /// Whether some task moved to `failed` during this pass
    pub failure_detected: bool,
}

/// Drain every available report; `true` if a task failed during this pass
pub fn drain(inbox: &mut ReportInbox, states: &mut TaskStates) -> bool {
    drain_reports(inbox, states).failure_detected
}

/// Drain every available report and summarise what happened
pub fn drain_reports(inbox: &mut ReportInbox, states: &mut TaskStates) -> DrainSummary {
    let mut summary = DrainSummary::default();

    while let Some(raw) = inbox.try_next() {
        match apply(&raw, states) {
            Applied::Progress | Applied::Completed => summary.applied += 1,
            Applied::Failed => {
                summary.applied += 1;
                summary.failure_detected = true;
            }
            Applied::Skipped => summary.skipped += 1,
        }
    }

    if summary.applied + summary.skipped > 0 {
        debug!(
            applied = summary.applied,
            skipped = summary.skipped,
            "drained report queue"
        );
    }
    summary
}

enum Applied {
    Progress,
    Completed,
    Failed,
    Skipped,
}

fn apply(raw: &RawReport, states: &mut TaskStates) -> Applied {
    let report = match Report::from_json_line(&raw.line) {
        Ok(report) => report,
        Err(e) => {
            warn!(
                sender = %raw.sender,
                error = %e,
                line = %truncate(&raw.line, 200),
                "malformed report"
            );
            return Applied::Skipped;
        }
    };

    if report.sender_role != raw.sender {
        warn!(
            task_id = %report.task_id,
            sender = %raw.sender,
            claimed_role = %report.sender_role,
            "report claims a different role than the musician that sent it"
        );
    }

    if !states.contains(&report.task_id) {
        warn!(
            task_id = %report.task_id,
            sender = %report.sender_role,
            "report for unknown task"
        );
        return Applied::Skipped;
    }

    info!(
        task_id = %report.task_id,
        role = %report.sender_role,
        status = report.status.as_str(),
        progress = report.progress,
        "task report"
    );

    let outcome = match &report.status {
        ReportStatus::Progress => states
            .set_progress(&report.task_id, report.progress)
            .map(|()| Applied::Progress),
        ReportStatus::Success => states
            .transition(&report.task_id, TaskState::Completed)
            .map(|_| Applied::Completed),
        ReportStatus::Failure { error_message } => states
            .fail(&report.task_id, error_message.clone())
            .map(|()| Applied::Failed),
    };

    match outcome {
        Ok(applied) => {
            if report.status.is_terminal() {
                task_finished(
                    &report.task_id,
                    report.sender_role.as_str(),
                    report.error_message(),
                );
            }
            applied
        }
        Err(e) => {
            warn!(
                task_id = %report.task_id,
                status = report.status.as_str(),
                error = %e,
                "invalid state transition"
            );
            Applied::Skipped
        }
    }
}

fn truncate(line: &str, max: usize) -> &str {
    match line.char_indices().nth(max) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}
