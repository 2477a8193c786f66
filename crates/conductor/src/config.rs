//! Conductor configuration with precedence and validation
//!
//! Precedence, lowest first: built-in defaults, `SYNCPHONY_*` environment
//! variables, then explicit builder calls (the CLI flags).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use syncphony_core::{
    Error, Result, Role, DEFAULT_POLL_INTERVAL, DEFAULT_RUN_TIMEOUT, MUSICIAN_BIN_NAME,
    SYNCPHONY_MUSICIAN_VAR, SYNCPHONY_POLL_INTERVAL_VAR, SYNCPHONY_TIMEOUT_VAR,
};

/// How to launch the musician for one role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub role: Role,
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerSpec {
    pub fn new(role: Role, program: impl Into<PathBuf>) -> Self {
        Self {
            role,
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The reference musician executable told its role via `--role`
    pub fn musician(role: Role, musician_bin: &Path) -> Self {
        Self::new(role, musician_bin).with_args(["--role", role.as_str()])
    }
}

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in defaults only
    Default,
    /// At least one `SYNCPHONY_*` environment variable applied
    EnvironmentVariable(String),
    /// Set explicitly (command line or programmatic)
    CommandLine,
}

#[derive(Debug, Clone)]
pub struct ConductorConfig {
    /// Wall-clock budget for the whole run
    pub timeout: Duration,
    /// Longest wait between two scheduling passes
    pub poll_interval: Duration,
    /// One musician per entry, started in order
    pub roster: Vec<WorkerSpec>,
    pub source: ConfigSource,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        let musician = default_musician_path();
        Self {
            timeout: DEFAULT_RUN_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            roster: Role::ALL
                .iter()
                .map(|&role| WorkerSpec::musician(role, &musician))
                .collect(),
            source: ConfigSource::Default,
        }
    }
}

impl ConductorConfig {
    pub fn builder() -> ConductorConfigBuilder {
        ConductorConfigBuilder::new()
    }

    /// The roles played by the configured roster, in roster order
    pub fn roles(&self) -> Vec<Role> {
        self.roster.iter().map(|spec| spec.role).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::configuration("run timeout must be greater than zero"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::configuration("poll interval must be greater than zero"));
        }
        if self.roster.is_empty() {
            return Err(Error::configuration("the orchestra roster is empty"));
        }

        let mut seen = HashSet::new();
        for spec in &self.roster {
            if !seen.insert(spec.role) {
                return Err(Error::configuration(format!(
                    "role '{}' appears more than once in the roster",
                    spec.role
                )));
            }
        }
        Ok(())
    }
}

/// The `syncphony-musician` executable next to the running binary, falling
/// back to a `PATH` lookup of the bare name.
pub fn default_musician_path() -> PathBuf {
    let file_name = format!("{MUSICIAN_BIN_NAME}{}", std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&file_name)))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from(file_name))
}

/// Builder for creating conductor configurations
#[derive(Debug, Default)]
pub struct ConductorConfigBuilder {
    timeout: Option<Duration>,
    poll_interval: Option<Duration>,
    musician: Option<PathBuf>,
    roles: Option<Vec<Role>>,
    roster: Option<Vec<WorkerSpec>>,
    source: Option<ConfigSource>,
}

impl ConductorConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `SYNCPHONY_*` variables from the process environment
    pub fn with_env(self) -> Result<Self> {
        self.with_env_lookup(|name| std::env::var(name).ok())
    }

    /// Apply `SYNCPHONY_*` variables using `lookup` to read them
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = Vec::new();

        if let Some(value) = lookup(SYNCPHONY_TIMEOUT_VAR) {
            let secs = parse_number(SYNCPHONY_TIMEOUT_VAR, &value)?;
            self.timeout = Some(Duration::from_secs(secs));
            applied.push(SYNCPHONY_TIMEOUT_VAR);
        }

        if let Some(value) = lookup(SYNCPHONY_POLL_INTERVAL_VAR) {
            let millis = parse_number(SYNCPHONY_POLL_INTERVAL_VAR, &value)?;
            self.poll_interval = Some(Duration::from_millis(millis));
            applied.push(SYNCPHONY_POLL_INTERVAL_VAR);
        }

        if let Some(value) = lookup(SYNCPHONY_MUSICIAN_VAR) {
            if !value.trim().is_empty() {
                self.musician = Some(PathBuf::from(value.trim()));
                applied.push(SYNCPHONY_MUSICIAN_VAR);
            }
        }

        if !applied.is_empty() {
            self.source = Some(ConfigSource::EnvironmentVariable(applied.join(",")));
        }
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self.source = Some(ConfigSource::CommandLine);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self.source = Some(ConfigSource::CommandLine);
        self
    }

    /// Launch every role with this musician executable
    pub fn musician(mut self, path: impl Into<PathBuf>) -> Self {
        self.musician = Some(path.into());
        self.source = Some(ConfigSource::CommandLine);
        self
    }

    /// Restrict the orchestra to these roles
    pub fn roles(mut self, roles: Vec<Role>) -> Self {
        self.roles = Some(roles);
        self.source = Some(ConfigSource::CommandLine);
        self
    }

    /// Use an explicit roster; overrides `musician` and `roles`
    pub fn roster(mut self, roster: Vec<WorkerSpec>) -> Self {
        self.roster = Some(roster);
        self.source = Some(ConfigSource::CommandLine);
        self
    }

    pub fn build(self) -> Result<ConductorConfig> {
        let roster = match self.roster {
            Some(roster) => roster,
            None => {
                let musician = self.musician.unwrap_or_else(default_musician_path);
                self.roles
                    .unwrap_or_else(|| Role::ALL.to_vec())
                    .into_iter()
                    .map(|role| WorkerSpec::musician(role, &musician))
                    .collect()
            }
        };

        let config = ConductorConfig {
            timeout: self.timeout.unwrap_or(DEFAULT_RUN_TIMEOUT),
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            roster,
            source: self.source.unwrap_or(ConfigSource::Default),
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_number(variable: &str, value: &str) -> Result<u64> {
    value.trim().parse::<u64>().map_err(|e| {
        Error::configuration(format!("{variable} must be a whole number, got '{value}': {e}"))
    })
}
