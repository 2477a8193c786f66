use crate::types::{Role, TaskId};
use std::path::PathBuf;

/// Result type alias for syncphony operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading a symphony into a task graph.
///
/// All of these are fatal at startup: no workers are started when loading fails.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The plan file does not exist
    #[error("symphony file not found at '{}'", .path.display())]
    NotFound { path: PathBuf },

    /// The plan file exists but could not be read
    #[error("failed to read symphony file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not a mapping of task ids to task objects
    #[error("invalid symphony document '{}': {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A task names a role outside the closed role enumeration
    #[error("task '{task_id}' names unknown role '{role}'")]
    UnknownRole { task_id: TaskId, role: String },

    /// A task names a valid role that no configured musician plays
    #[error("task '{task_id}' needs role '{role}' but no musician is configured for it")]
    UnstaffedRole { task_id: TaskId, role: Role },
}

impl LoadError {
    /// Map an I/O failure on `path` to `NotFound` or `Read`
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound { path }
        } else {
            LoadError::Read { path, source }
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, LoadError::NotFound { .. })
    }

    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, LoadError::Malformed { .. })
    }
}

/// Core error type for conductor and musician operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The symphony could not be loaded
    #[error(transparent)]
    Plan(#[from] LoadError),

    /// A musician process could not be started
    #[error("failed to start musician for role '{role}': {source}")]
    Spawn {
        role: Role,
        #[source]
        source: std::io::Error,
    },

    /// No running musician accepts messages for the role
    #[error("musician for role '{role}' is unavailable")]
    WorkerUnavailable { role: Role },

    /// A message could not be encoded or decoded
    #[error("protocol error: {message}")]
    Protocol {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// I/O on a pipe or file failed
    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Protocol {
            message: error.to_string(),
            source: Some(error),
        }
    }
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a protocol error without an underlying serde error
    #[must_use]
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
            source: None,
        }
    }

    /// Create an I/O error with the operation that failed
    #[must_use]
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            operation: operation.into(),
            source,
        }
    }

    #[must_use]
    pub fn spawn(role: Role, source: std::io::Error) -> Self {
        Error::Spawn { role, source }
    }
}
