//! Messages exchanged between the conductor and its musicians
//!
//! Both directions travel as newline-delimited JSON. The `action` and
//! `parameters` of a dispatch are opaque to the conductor; only the
//! musician interprets them. Reports are validated into a tagged union on
//! decode so that a `failure` always carries its error message.

use crate::constants::PROGRESS_MAX;
use crate::types::{Role, TaskId};
use serde::{Deserialize, Serialize};

/// Opaque key/value payload passed through to the musician unexamined
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// Work handed to the musician playing `recipient_role`, once per task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchMessage {
    pub recipient_role: Role,
    pub task_id: TaskId,
    pub action: String,
    pub parameters: Parameters,
}

impl DispatchMessage {
    /// Encode as a single JSON line, without the trailing newline
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }
}

/// The status carried by a report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    Success,
    Failure { error_message: String },
    Progress,
}

impl ReportStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Success => "success",
            ReportStatus::Failure { .. } => "failure",
            ReportStatus::Progress => "progress",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportStatus::Progress)
    }
}

/// A status update from a musician about one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireReport", into = "WireReport")]
pub struct Report {
    pub task_id: TaskId,
    pub sender_role: Role,
    pub status: ReportStatus,
    pub progress: u8,
}

impl Report {
    pub fn success(task_id: impl Into<TaskId>, sender_role: Role) -> Self {
        Self {
            task_id: task_id.into(),
            sender_role,
            status: ReportStatus::Success,
            progress: PROGRESS_MAX,
        }
    }

    pub fn failure(
        task_id: impl Into<TaskId>,
        sender_role: Role,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            sender_role,
            status: ReportStatus::Failure {
                error_message: error_message.into(),
            },
            progress: 0,
        }
    }

    /// A progress update; values above 100 are clamped
    pub fn progress(task_id: impl Into<TaskId>, sender_role: Role, progress: u8) -> Self {
        Self {
            task_id: task_id.into(),
            sender_role,
            status: ReportStatus::Progress,
            progress: progress.min(PROGRESS_MAX),
        }
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            ReportStatus::Failure { error_message } => Some(error_message),
            _ => None,
        }
    }

    /// Encode as a single JSON line, without the trailing newline
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }
}

/// Reasons a decoded report is rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error("failure report for '{0}' is missing error_message")]
    MissingErrorMessage(TaskId),

    #[error("progress {progress} for '{task_id}' is outside 0-100")]
    ProgressOutOfRange { task_id: TaskId, progress: i64 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireStatus {
    Success,
    Failure,
    Progress,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireReport {
    task_id: TaskId,
    sender_role: Role,
    status: WireStatus,
    #[serde(default)]
    progress: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl TryFrom<WireReport> for Report {
    type Error = ReportError;

    fn try_from(wire: WireReport) -> Result<Self, Self::Error> {
        if !(0..=i64::from(PROGRESS_MAX)).contains(&wire.progress) {
            return Err(ReportError::ProgressOutOfRange {
                task_id: wire.task_id,
                progress: wire.progress,
            });
        }

        let status = match wire.status {
            WireStatus::Success => ReportStatus::Success,
            WireStatus::Progress => ReportStatus::Progress,
            WireStatus::Failure => match wire.error_message {
                Some(error_message) => ReportStatus::Failure { error_message },
                None => return Err(ReportError::MissingErrorMessage(wire.task_id)),
            },
        };

        Ok(Report {
            task_id: wire.task_id,
            sender_role: wire.sender_role,
            status,
            progress: wire.progress as u8,
        })
    }
}

impl From<Report> for WireReport {
    fn from(report: Report) -> Self {
        let (status, error_message) = match report.status {
            ReportStatus::Success => (WireStatus::Success, None),
            ReportStatus::Progress => (WireStatus::Progress, None),
            ReportStatus::Failure { error_message } => (WireStatus::Failure, Some(error_message)),
        };
        WireReport {
            task_id: report.task_id,
            sender_role: report.sender_role,
            status,
            progress: i64::from(report.progress),
            error_message,
        }
    }
}
