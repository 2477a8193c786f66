//! The worker side of the message contract
//!
//! A musician reads dispatch messages as JSON lines, performs the ones
//! addressed to its own role one at a time, and writes progress and a final
//! success or failure report for each. Action handlers return
//! `anyhow::Result`; any error becomes a `failure` report carrying the full
//! error chain.

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use std::time::Duration;
use syncphony_core::{DispatchMessage, Error, Report, Result, Role, TaskId};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Something that can carry out the actions of one role
#[async_trait]
pub trait Performer: Send + Sync {
    async fn perform(
        &self,
        message: &DispatchMessage,
        progress: &ProgressReporter,
    ) -> anyhow::Result<()>;
}

/// Lets an action publish progress for the task it is performing
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    task_id: TaskId,
    role: Role,
    tx: mpsc::UnboundedSender<Report>,
}

impl ProgressReporter {
    /// Report `progress` percent; values above 100 are clamped
    pub fn report(&self, progress: u8) {
        let _ = self
            .tx
            .send(Report::progress(self.task_id.clone(), self.role, progress));
    }
}

/// Counters for one [`serve`] session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeStats {
    pub succeeded: usize,
    pub failed: usize,
    /// Lines that were malformed or addressed to another role
    pub ignored: usize,
}

/// Serve dispatch messages from `input` until it reaches end of file.
///
/// Only I/O errors on the streams end the session early.
pub async fn serve<P, R, W>(role: Role, performer: &P, input: R, mut output: W) -> Result<ServeStats>
where
    P: Performer + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = ServeStats::default();
    let mut lines = input.lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| Error::io("reading dispatch stream", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let message = match DispatchMessage::from_json_line(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "malformed dispatch message");
                stats.ignored += 1;
                continue;
            }
        };
        if message.recipient_role != role {
            debug!(
                task_id = %message.task_id,
                recipient_role = %message.recipient_role,
                "message for another role ignored"
            );
            stats.ignored += 1;
            continue;
        }

        let report = perform_one(role, performer, &message, &mut output).await?;
        match report.error_message() {
            None => stats.succeeded += 1,
            Some(_) => stats.failed += 1,
        }
        write_report(&mut output, &report).await?;
    }

    debug!(?stats, "dispatch stream closed");
    Ok(stats)
}

/// Run one action, streaming its progress, and build its final report
async fn perform_one<P, W>(
    role: Role,
    performer: &P,
    message: &DispatchMessage,
    output: &mut W,
) -> Result<Report>
where
    P: Performer + ?Sized,
    W: AsyncWrite + Unpin,
{
    info!(task_id = %message.task_id, action = %message.action, "performing task");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let reporter = ProgressReporter {
        task_id: message.task_id.clone(),
        role,
        tx,
    };

    let work = performer.perform(message, &reporter);
    tokio::pin!(work);
    let result = loop {
        tokio::select! {
            result = &mut work => break result,
            Some(progress) = rx.recv() => write_report(output, &progress).await?,
        }
    };
    while let Ok(progress) = rx.try_recv() {
        write_report(output, &progress).await?;
    }

    Ok(match result {
        Ok(()) => {
            info!(task_id = %message.task_id, "task performed");
            Report::success(message.task_id.clone(), role)
        }
        Err(e) => {
            let error_message = format!("{e:#}");
            warn!(task_id = %message.task_id, error = %error_message, "task failed");
            Report::failure(message.task_id.clone(), role, error_message)
        }
    })
}

async fn write_report<W>(output: &mut W, report: &Report) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = report.to_json_line()?;
    async {
        output.write_all(line.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await
    }
    .await
    .map_err(|e| Error::io("writing report", e))
}

/// Stand-in actions for rehearsals and end-to-end tests
///
/// | action  | behaviour |
/// |---------|-----------|
/// | `noop`  | succeeds immediately |
/// | `fail`  | fails with `parameters.message` |
/// | `sleep` | waits `parameters.millis` (default 100), reporting 50% halfway |
/// | `hang`  | never finishes |
///
/// Any other action fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct RehearsalPerformer;

const DEFAULT_SLEEP_MILLIS: u64 = 100;

#[async_trait]
impl Performer for RehearsalPerformer {
    async fn perform(
        &self,
        message: &DispatchMessage,
        progress: &ProgressReporter,
    ) -> anyhow::Result<()> {
        match message.action.as_str() {
            "noop" => Ok(()),
            "fail" => {
                let reason = message
                    .parameters
                    .get("message")
                    .and_then(|value| value.as_str())
                    .unwrap_or("task failed on request");
                bail!("{reason}")
            }
            "sleep" => {
                let millis = match message.parameters.get("millis") {
                    None => DEFAULT_SLEEP_MILLIS,
                    Some(value) => value
                        .as_u64()
                        .ok_or_else(|| anyhow!("parameter 'millis' must be a whole number, got {value}"))?,
                };
                let half = Duration::from_millis(millis / 2);
                tokio::time::sleep(half).await;
                progress.report(50);
                tokio::time::sleep(Duration::from_millis(millis) - half).await;
                Ok(())
            }
            "hang" => std::future::pending().await,
            other => bail!("unknown action '{other}' for role {}", message.recipient_role),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use syncphony_core::ReportStatus;

    fn dispatch(role: Role, task_id: &str, action: &str, parameters: serde_json::Value) -> String {
        let parameters = match parameters {
            serde_json::Value::Object(map) => map,
            _ => Default::default(),
        };
        DispatchMessage {
            recipient_role: role,
            task_id: task_id.into(),
            action: action.to_string(),
            parameters,
        }
        .to_json_line()
        .unwrap()
    }

    async fn serve_lines(role: Role, lines: &[String]) -> (ServeStats, Vec<Report>) {
        let input = lines.join("\n") + "\n";
        let mut output = Vec::new();
        let stats = serve(role, &RehearsalPerformer, input.as_bytes(), &mut output)
            .await
            .unwrap();
        let reports = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| Report::from_json_line(line).unwrap())
            .collect();
        (stats, reports)
    }

    #[tokio::test]
    async fn test_noop_and_fail_produce_final_reports() {
        let (stats, reports) = serve_lines(
            Role::FileSystem,
            &[
                dispatch(Role::FileSystem, "a", "noop", json!({})),
                dispatch(Role::FileSystem, "b", "fail", json!({"message": "disk full"})),
            ],
        )
        .await;

        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(reports[0], Report::success("a", Role::FileSystem));
        assert_eq!(reports[1].error_message(), Some("disk full"));
        assert_eq!(reports[1].sender_role, Role::FileSystem);
    }

    #[tokio::test]
    async fn test_messages_for_other_roles_and_garbage_are_ignored() {
        let (stats, reports) = serve_lines(
            Role::CodeWriter,
            &[
                dispatch(Role::FileSystem, "a", "noop", json!({})),
                "{not json".to_string(),
                dispatch(Role::CodeWriter, "b", "noop", json!({})),
            ],
        )
        .await;

        assert_eq!(stats.ignored, 2);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].task_id.as_str(), "b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_reports_progress_before_success() {
        let (_, reports) = serve_lines(
            Role::ShellExecutor,
            &[dispatch(Role::ShellExecutor, "s", "sleep", json!({"millis": 400}))],
        )
        .await;

        let statuses: Vec<_> = reports.iter().map(|r| r.status.clone()).collect();
        assert_eq!(statuses, vec![ReportStatus::Progress, ReportStatus::Success]);
        assert_eq!(reports[0].progress, 50);
    }

    #[tokio::test]
    async fn test_unknown_action_and_bad_parameters_fail() {
        let (stats, reports) = serve_lines(
            Role::GradleManager,
            &[
                dispatch(Role::GradleManager, "a", "compose", json!({})),
                dispatch(Role::GradleManager, "b", "sleep", json!({"millis": "soon"})),
            ],
        )
        .await;

        assert_eq!(stats.failed, 2);
        assert!(reports[0].error_message().unwrap().contains("unknown action 'compose'"));
        assert!(reports[1].error_message().unwrap().contains("millis"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_never_reports() {
        let input = dispatch(Role::FileSystem, "h", "hang", json!({})) + "\n";
        let mut output = Vec::new();
        let served = tokio::time::timeout(
            Duration::from_secs(60),
            serve(Role::FileSystem, &RehearsalPerformer, input.as_bytes(), &mut output),
        )
        .await;

        assert!(served.is_err());
        assert!(output.is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_ends_session() {
        let mut output = Vec::new();
        let stats = serve(Role::FileSystem, &RehearsalPerformer, &b""[..], &mut output)
            .await
            .unwrap();
        assert_eq!(stats, ServeStats::default());
    }
}
