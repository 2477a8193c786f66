//! Symphony loading
//!
//! A symphony is a JSON object keyed by task id. Each value carries `role`,
//! `action`, an opaque `parameters` object and an optional `dependencies`
//! array:
//!
//! ```json
//! {
//!   "scaffold": { "role": "FileSystem", "action": "create_dir", "parameters": { "path": "app" } },
//!   "build": { "role": "GradleManager", "action": "run_task", "parameters": {}, "dependencies": ["scaffold"] }
//! }
//! ```

use crate::graph::{TaskGraph, TaskSpec};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::Path;
use syncphony_core::{LoadError, Parameters, Role, TaskId};

#[derive(Debug, Deserialize)]
struct RawTask {
    role: String,
    action: String,
    parameters: Parameters,
    #[serde(default)]
    dependencies: Vec<TaskId>,
}

/// Load a symphony, accepting any role of the closed role enumeration
pub fn load(path: impl AsRef<Path>) -> Result<TaskGraph, LoadError> {
    load_with_roster(path, &Role::ALL)
}

/// Load a symphony and require every task's role to be played by `roster`
pub fn load_with_roster(path: impl AsRef<Path>, roster: &[Role]) -> Result<TaskGraph, LoadError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading symphony");

    let document = std::fs::read_to_string(path).map_err(|e| LoadError::from_io(path, e))?;
    let graph = parse_document(&document, path, roster)?;

    tracing::info!(
        path = %path.display(),
        tasks = graph.len(),
        "symphony loaded"
    );
    Ok(graph)
}

/// Parse a symphony document. `origin` is only used in error messages.
pub fn parse_document(
    document: &str,
    origin: &Path,
    roster: &[Role],
) -> Result<TaskGraph, LoadError> {
    let raw: IndexMap<TaskId, RawTask> =
        serde_json::from_str(document).map_err(|source| LoadError::Malformed {
            path: origin.to_path_buf(),
            source,
        })?;

    let mut specs = Vec::with_capacity(raw.len());
    for (task_id, task) in raw {
        let role: Role = match task.role.parse() {
            Ok(role) => role,
            Err(_) => {
                return Err(LoadError::UnknownRole {
                    task_id,
                    role: task.role,
                })
            }
        };
        if !roster.contains(&role) {
            return Err(LoadError::UnstaffedRole { task_id, role });
        }

        specs.push(TaskSpec {
            task_id,
            role,
            action: task.action,
            parameters: task.parameters,
            dependencies: task.dependencies.into_iter().collect::<IndexSet<_>>(),
        });
    }

    Ok(TaskGraph::from_specs(specs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn write_plan(dir: &TempDir, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join("symphony.json");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_two_task_plan() {
        let dir = TempDir::new().unwrap();
        let path = write_plan(
            &dir,
            r#"{
                "A": {"role": "FileSystem", "action": "noop", "parameters": {}, "dependencies": []},
                "B": {"role": "FileSystem", "action": "noop", "parameters": {"x": 1}, "dependencies": ["A"]}
            }"#,
        );

        let graph = load(&path).unwrap();
        assert_eq!(graph.len(), 2);
        let b = graph.get("B").unwrap();
        assert_eq!(b.role, Role::FileSystem);
        assert_eq!(b.parameters["x"], json!(1));
        assert!(b.dependencies.contains("A"));
    }

    #[test]
    fn test_dependencies_default_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = write_plan(
            &dir,
            r#"{"solo": {"role": "ShellExecutor", "action": "run", "parameters": {"cmd": "ls"}}}"#,
        );

        let graph = load(&path).unwrap();
        assert!(graph.dependencies("solo").unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load(dir.path().join("absent.json")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write_plan(&dir, "{ not json");
        assert!(load(&path).unwrap_err().is_malformed());
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let dir = TempDir::new().unwrap();
        // missing `parameters`
        let path = write_plan(&dir, r#"{"A": {"role": "FileSystem", "action": "noop"}}"#);
        assert!(load(&path).unwrap_err().is_malformed());

        let path = write_plan(&dir, r#"["A", "B"]"#);
        assert!(load(&path).unwrap_err().is_malformed());
    }

    #[test]
    fn test_unknown_role_is_rejected_at_load() {
        let dir = TempDir::new().unwrap();
        let path = write_plan(
            &dir,
            r#"{"A": {"role": "Painter", "action": "noop", "parameters": {}}}"#,
        );
        assert!(matches!(
            load(&path).unwrap_err(),
            LoadError::UnknownRole { role, .. } if role == "Painter"
        ));
    }

    #[test]
    fn test_role_outside_roster_is_rejected() {
        let err = parse_document(
            r#"{"A": {"role": "GradleManager", "action": "build", "parameters": {}}}"#,
            Path::new("inline.json"),
            &[Role::FileSystem],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            LoadError::UnstaffedRole { role: Role::GradleManager, .. }
        ));
    }

    #[test]
    fn test_unknown_dependency_is_accepted_at_load() {
        let graph = parse_document(
            r#"{"A": {"role": "FileSystem", "action": "noop", "parameters": {}, "dependencies": ["ghost"]}}"#,
            Path::new("inline.json"),
            &Role::ALL,
        )
        .unwrap();
        assert!(graph.dependencies("A").unwrap().contains("ghost"));
        assert!(!graph.contains("ghost"));
    }
}
