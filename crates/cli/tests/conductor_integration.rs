//! Full runs against real `syncphony-musician` processes

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use syncphony_conductor::{Conductor, ConductorConfig, RunReport};
use syncphony_core::{Role, RunOutcome, TaskId, TaskState};
use syncphony_plan::load_with_roster;
use tempfile::NamedTempFile;

fn musician_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_syncphony-musician"))
}

fn write_plan(document: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(document.as_bytes()).unwrap();
    file
}

async fn conduct(document: &str, roles: &[Role], timeout: Duration) -> RunReport {
    let config = ConductorConfig::builder()
        .musician(musician_binary())
        .roles(roles.to_vec())
        .timeout(timeout)
        .poll_interval(Duration::from_millis(100))
        .build()
        .unwrap();

    let plan = write_plan(document);
    let graph = load_with_roster(plan.path(), &config.roles()).unwrap();
    Conductor::new(graph, config).perform().await.unwrap()
}

#[cfg(unix)]
fn alive(pid: u32) -> bool {
    // SAFETY: signal 0 only checks that the process exists.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

fn assert_orchestra_dismissed(report: &RunReport, musicians: usize) {
    assert_eq!(report.musicians.len(), musicians);
    for exit in &report.musicians {
        assert!(exit.status.is_some(), "{:?} was not reaped", exit.role);
        #[cfg(unix)]
        {
            if let Some(pid) = exit.pid {
                assert!(!alive(pid), "{:?} (pid {pid}) outlived the run", exit.role);
            }
        }
    }
}

fn ids(list: &[&str]) -> Vec<TaskId> {
    list.iter().map(|id| TaskId::from(*id)).collect()
}

#[tokio::test]
async fn test_dependent_tasks_complete_in_order() {
    let report = conduct(
        r#"{
            "A": { "role": "FileSystem", "action": "noop", "parameters": {} },
            "B": { "role": "FileSystem", "action": "sleep", "parameters": { "millis": 50 }, "dependencies": ["A"] }
        }"#,
        &[Role::FileSystem],
        Duration::from_secs(30),
    )
    .await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.dispatch_order, ids(&["A", "B"]));
    assert_eq!(report.states.record("B").unwrap().progress, 100);
    assert_orchestra_dismissed(&report, 1);
}

#[tokio::test]
async fn test_tasks_reach_the_musician_for_their_role() {
    let report = conduct(
        r#"{
            "scaffold": { "role": "FileSystem", "action": "noop", "parameters": {} },
            "generate": { "role": "CodeWriter", "action": "noop", "parameters": {}, "dependencies": ["scaffold"] },
            "build":    { "role": "GradleManager", "action": "noop", "parameters": {}, "dependencies": ["generate"] },
            "test":     { "role": "ShellExecutor", "action": "noop", "parameters": {}, "dependencies": ["build"] }
        }"#,
        &Role::ALL,
        Duration::from_secs(30),
    )
    .await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.tally().completed, 4);
    assert_orchestra_dismissed(&report, 4);
}

#[tokio::test]
async fn test_failure_halts_the_symphony() {
    let report = conduct(
        r#"{
            "A": { "role": "ShellExecutor", "action": "fail", "parameters": { "message": "exit code 2" } },
            "B": { "role": "ShellExecutor", "action": "noop", "parameters": {}, "dependencies": ["A"] }
        }"#,
        &[Role::ShellExecutor],
        Duration::from_secs(30),
    )
    .await;

    assert_eq!(report.outcome, RunOutcome::HaltedOnFailure);
    assert_eq!(report.states.state("B"), Some(TaskState::Pending));
    assert_eq!(
        report.errors(),
        vec![(TaskId::from("A"), "exit code 2".to_string())]
    );
    assert!(report.elapsed < Duration::from_secs(30));
    assert_orchestra_dismissed(&report, 1);
}

#[tokio::test]
async fn test_silent_musician_times_out_and_is_killed() {
    let report = conduct(
        r#"{ "A": { "role": "CodeWriter", "action": "hang", "parameters": {} } }"#,
        &[Role::CodeWriter],
        Duration::from_secs(1),
    )
    .await;

    assert_eq!(report.outcome, RunOutcome::HaltedOnTimeout);
    assert_eq!(report.states.state("A"), Some(TaskState::Dispatched));
    assert!(report.elapsed >= Duration::from_secs(1));
    assert!(report.elapsed < Duration::from_secs(10));
    assert_orchestra_dismissed(&report, 1);
}

#[tokio::test]
async fn test_unknown_dependency_times_out() {
    let report = conduct(
        r#"{ "A": { "role": "FileSystem", "action": "noop", "parameters": {}, "dependencies": ["ghost"] } }"#,
        &[Role::FileSystem],
        Duration::from_secs(1),
    )
    .await;

    assert_eq!(report.outcome, RunOutcome::HaltedOnTimeout);
    assert!(report.dispatch_order.is_empty());
    assert_orchestra_dismissed(&report, 1);
}
