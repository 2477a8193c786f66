//! The musician pool
//!
//! One child process per configured role. Dispatch messages are written to
//! the musician's stdin as JSON lines; every line it prints on stdout is
//! forwarded, undecoded, to the report queue. Stderr is inherited so the
//! musicians' own logs land next to the conductor's.

use crate::config::WorkerSpec;
use crate::queue::{RawReport, ReportSender, WorkQueue};
use std::process::{ExitStatus, Stdio};
use syncphony_core::{DispatchMessage, Error, Result, Role};
use syncphony_utils::process::configure_musician_command;
use syncphony_utils::tracing::musician_span;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

/// How a musician ended when the pool shut down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicianExit {
    pub role: Role,
    pub pid: Option<u32>,
    /// `None` if the exit status could not be collected
    pub status: Option<ExitStatus>,
}

struct Musician {
    role: Role,
    pid: Option<u32>,
    child: Child,
    stdin_tx: mpsc::UnboundedSender<String>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl Musician {
    fn spawn(spec: &WorkerSpec, reports: ReportSender) -> Result<Self> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        configure_musician_command(&mut cmd);

        let mut child = cmd.spawn().map_err(|e| Error::spawn(spec.role, e))?;
        let pid = child.id();

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.start_kill();
                return Err(Error::protocol(format!(
                    "musician for role '{}' has no stdio pipes",
                    spec.role
                )));
            }
        };

        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        let span = musician_span(spec.role.as_str());
        let writer = tokio::spawn(write_dispatches(stdin, stdin_rx).instrument(span.clone()));
        let reader = tokio::spawn(forward_reports(spec.role, stdout, reports).instrument(span));

        info!(
            role = %spec.role,
            pid = ?pid,
            program = %spec.program.display(),
            "musician started"
        );

        Ok(Self {
            role: spec.role,
            pid,
            child,
            stdin_tx,
            writer,
            reader,
        })
    }

    async fn stop(mut self) -> MusicianExit {
        // Closing stdin lets a well-behaved musician exit on its own.
        drop(self.stdin_tx);

        let status = match self.child.try_wait() {
            Ok(Some(status)) => Some(status),
            _ => {
                if let Err(e) = self.child.start_kill() {
                    debug!(role = %self.role, error = %e, "kill failed, musician already gone");
                }
                match self.child.wait().await {
                    Ok(status) => Some(status),
                    Err(e) => {
                        warn!(role = %self.role, error = %e, "could not collect musician exit status");
                        None
                    }
                }
            }
        };

        self.writer.abort();
        self.reader.abort();
        debug!(role = %self.role, pid = ?self.pid, status = ?status, "musician stopped");

        MusicianExit {
            role: self.role,
            pid: self.pid,
            status,
        }
    }
}

async fn write_dispatches(mut stdin: ChildStdin, mut lines: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = lines.recv().await {
        let written = async {
            stdin.write_all(line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        }
        .await;

        if let Err(e) = written {
            warn!(error = %e, "musician stopped accepting work");
            break;
        }
    }
}

async fn forward_reports(role: Role, stdout: ChildStdout, reports: ReportSender) {
    // Split on raw bytes: a line that is not UTF-8 is a malformed report for
    // the listener to skip, not the end of the stream.
    let mut lines = BufReader::new(stdout).split(b'\n');
    loop {
        match lines.next_segment().await {
            Ok(Some(bytes)) => {
                let line = String::from_utf8_lossy(&bytes);
                if line.trim().is_empty() {
                    continue;
                }
                if reports.send(RawReport::new(role, line.into_owned())).is_err() {
                    break;
                }
            }
            Ok(None) => {
                debug!("musician closed its report stream");
                break;
            }
            Err(e) => {
                warn!(error = %e, "failed to read musician report stream");
                break;
            }
        }
    }
}

/// The running musicians, at most one per role
pub struct WorkerPool {
    musicians: Vec<Musician>,
}

impl WorkerPool {
    /// Start one musician per roster entry.
    ///
    /// If any musician fails to start, the ones already running are killed
    /// before the error is returned.
    pub fn start(roster: &[WorkerSpec], reports: ReportSender) -> Result<Self> {
        let mut pool = Self {
            musicians: Vec::with_capacity(roster.len()),
        };
        for spec in roster {
            if pool.musicians.iter().any(|m| m.role == spec.role) {
                return Err(Error::configuration(format!(
                    "role '{}' appears more than once in the roster",
                    spec.role
                )));
            }
            pool.musicians.push(Musician::spawn(spec, reports.clone())?);
        }
        Ok(pool)
    }

    /// Stop every musician and collect how each one exited.
    ///
    /// Calling this again returns an empty list.
    pub async fn shutdown(&mut self) -> Vec<MusicianExit> {
        let mut exits = Vec::with_capacity(self.musicians.len());
        for musician in self.musicians.drain(..) {
            exits.push(musician.stop().await);
        }
        if !exits.is_empty() {
            info!(musicians = exits.len(), "orchestra dismissed");
        }
        exits
    }

    pub fn roles(&self) -> Vec<Role> {
        self.musicians.iter().map(|m| m.role).collect()
    }

    pub fn len(&self) -> usize {
        self.musicians.len()
    }

    pub fn is_empty(&self) -> bool {
        self.musicians.is_empty()
    }

    /// Process ids of the running musicians, in roster order
    pub fn pids(&self) -> Vec<u32> {
        self.musicians.iter().filter_map(|m| m.pid).collect()
    }
}

impl WorkQueue for WorkerPool {
    fn enqueue(&mut self, message: DispatchMessage) -> Result<()> {
        let role = message.recipient_role;
        let musician = self
            .musicians
            .iter()
            .find(|m| m.role == role)
            .ok_or(Error::WorkerUnavailable { role })?;

        let line = message.to_json_line()?;
        musician
            .stdin_tx
            .send(line)
            .map_err(|_| Error::WorkerUnavailable { role })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for musician in &mut self.musicians {
            if let Err(e) = musician.child.start_kill() {
                debug!(role = %musician.role, error = %e, "kill on drop failed");
            }
            musician.writer.abort();
            musician.reader.abort();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::queue::report_channel;
    use std::time::Duration;
    use syncphony_core::Report;

    fn alive(pid: u32) -> bool {
        // SAFETY: signal 0 only checks that the process exists.
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    fn message(role: Role, task_id: &str) -> DispatchMessage {
        DispatchMessage {
            recipient_role: role,
            task_id: task_id.into(),
            action: "noop".to_string(),
            parameters: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_messages_reach_only_the_matching_role() {
        // `cat` echoes each dispatch line back as its "report".
        let roster = [
            WorkerSpec::new(Role::FileSystem, "cat"),
            WorkerSpec::new(Role::CodeWriter, "cat"),
        ];
        let (tx, mut inbox) = report_channel();
        let mut pool = WorkerPool::start(&roster, tx).unwrap();
        assert_eq!(pool.roles(), vec![Role::FileSystem, Role::CodeWriter]);

        pool.enqueue(message(Role::CodeWriter, "gen")).unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        assert!(inbox.wait_until(deadline).await);
        let raw = inbox.try_next().unwrap();
        assert_eq!(raw.sender, Role::CodeWriter);
        assert_eq!(DispatchMessage::from_json_line(&raw.line).unwrap().task_id.as_str(), "gen");

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_musician_output_is_forwarded_as_raw_reports() {
        let report = Report::success("t1", Role::ShellExecutor).to_json_line().unwrap();
        let script = format!("echo '{report}'; echo; echo 'garbage'; sleep 30");
        let roster = [WorkerSpec::new(Role::ShellExecutor, "sh").with_args(["-c", script.as_str()])];
        let (tx, mut inbox) = report_channel();
        let mut pool = WorkerPool::start(&roster, tx).unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let mut lines = Vec::new();
        while lines.len() < 2 && inbox.wait_until(deadline).await {
            while let Some(raw) = inbox.try_next() {
                lines.push(raw.line);
            }
        }
        assert_eq!(lines.len(), 2);
        assert_eq!(Report::from_json_line(&lines[0]).unwrap().task_id.as_str(), "t1");
        assert_eq!(lines[1], "garbage");

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_for_missing_role_is_unavailable() {
        let roster = [WorkerSpec::new(Role::FileSystem, "cat")];
        let (tx, _inbox) = report_channel();
        let mut pool = WorkerPool::start(&roster, tx).unwrap();

        let err = pool.enqueue(message(Role::GradleManager, "build")).unwrap_err();
        assert!(matches!(err, Error::WorkerUnavailable { role: Role::GradleManager }));

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_kills_hanging_musicians_and_is_idempotent() {
        let roster = [
            WorkerSpec::new(Role::FileSystem, "sleep").with_args(["30"]),
            WorkerSpec::new(Role::ShellExecutor, "sleep").with_args(["30"]),
        ];
        let (tx, _inbox) = report_channel();
        let mut pool = WorkerPool::start(&roster, tx).unwrap();
        let pids = pool.pids();
        assert_eq!(pids.len(), 2);
        assert!(pids.iter().all(|&pid| alive(pid)));

        let exits = pool.shutdown().await;
        assert_eq!(exits.len(), 2);
        assert!(exits.iter().all(|exit| exit.status.is_some()));
        assert!(pids.iter().all(|&pid| !alive(pid)));

        assert!(pool.shutdown().await.is_empty());
        assert!(pool.is_empty());
    }

    /// Running means present and not a zombie waiting to be reaped.
    #[cfg(target_os = "linux")]
    fn running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            // The state is the first field after the parenthesised command name.
            Ok(stat) => stat
                .rsplit(')')
                .next()
                .and_then(|rest| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z"),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_spawn_failure_kills_already_started_musicians() {
        let pid_file = tempfile::NamedTempFile::new().unwrap();
        let script = format!("echo $$ > '{}'; exec sleep 30", pid_file.path().display());
        let roster = [
            WorkerSpec::new(Role::FileSystem, "sh").with_args(["-c", script.as_str()]),
            WorkerSpec::new(Role::CodeWriter, "/nonexistent/syncphony-musician"),
        ];
        let (tx, _inbox) = report_channel();
        let err = WorkerPool::start(&roster, tx).err().unwrap();
        assert!(matches!(err, Error::Spawn { role: Role::CodeWriter, .. }));

        // A shell still alive writes its pid almost at once; an empty file
        // after two seconds means it was killed before getting that far.
        let mut pid = None;
        for _ in 0..200 {
            let written = std::fs::read_to_string(pid_file.path()).unwrap();
            if let Ok(parsed) = written.trim().parse::<u32>() {
                pid = Some(parsed);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        if let Some(pid) = pid {
            let mut stopped = false;
            for _ in 0..500 {
                if !running(pid) {
                    stopped = true;
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            assert!(stopped, "musician {pid} outlived the failed start");
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_end_the_report_stream() {
        let report = Report::success("t1", Role::FileSystem).to_json_line().unwrap();
        let script = format!("printf '\\377\\n'; echo '{report}'; sleep 30");
        let roster = [WorkerSpec::new(Role::FileSystem, "sh").with_args(["-c", script.as_str()])];
        let (tx, mut inbox) = report_channel();
        let mut pool = WorkerPool::start(&roster, tx).unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        let mut lines = Vec::new();
        while lines.len() < 2 && inbox.wait_until(deadline).await {
            while let Some(raw) = inbox.try_next() {
                lines.push(raw.line);
            }
        }
        assert_eq!(lines.len(), 2);
        assert!(Report::from_json_line(&lines[0]).is_err());
        assert_eq!(Report::from_json_line(&lines[1]).unwrap().task_id.as_str(), "t1");

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_enqueue_after_musician_exit_is_unavailable() {
        let roster = [WorkerSpec::new(Role::FileSystem, "true")];
        let (tx, _inbox) = report_channel();
        let mut pool = WorkerPool::start(&roster, tx).unwrap();

        // Keep writing until the writer notices the closed pipe.
        let mut refused = false;
        for i in 0..200 {
            if pool.enqueue(message(Role::FileSystem, &format!("t{i}"))).is_err() {
                refused = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(refused);
        pool.shutdown().await;
    }
}
