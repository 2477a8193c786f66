//! The closed roster of musician capability roles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A capability category shared by a task and the musician that performs it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// File and directory mutation
    FileSystem,
    /// Source code generation
    CodeWriter,
    /// Arbitrary shell commands
    ShellExecutor,
    /// Gradle build invocations
    GradleManager,
}

impl Role {
    /// Every role, in roster order
    pub const ALL: [Role; 4] = [
        Role::FileSystem,
        Role::CodeWriter,
        Role::ShellExecutor,
        Role::GradleManager,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::FileSystem => "FileSystem",
            Role::CodeWriter => "CodeWriter",
            Role::ShellExecutor => "ShellExecutor",
            Role::GradleManager => "GradleManager",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known role
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}' (expected one of FileSystem, CodeWriter, ShellExecutor, GradleManager)")]
pub struct ParseRoleError(pub String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseRoleError(s.to_string()))
    }
}
