use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use syncphony_conductor::{Conductor, ConductorConfig};
use syncphony_core::{Role, RunOutcome};
use syncphony_plan::load_with_roster;
use tracing::{error, info, warn};

/// Exit status after Ctrl-C, following the shell convention for SIGINT
pub const EXIT_INTERRUPTED: u8 = 130;

/// What the command line asked for
#[derive(Debug, Clone, Default)]
pub struct PerformOptions {
    pub plan: PathBuf,
    pub timeout_secs: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub musician: Option<PathBuf>,
    pub roles: Option<Vec<Role>>,
}

impl PerformOptions {
    pub fn new(plan: impl Into<PathBuf>) -> Self {
        Self {
            plan: plan.into(),
            ..Self::default()
        }
    }

    /// Defaults, then `SYNCPHONY_*` variables, then these options
    pub fn config(&self) -> syncphony_core::Result<ConductorConfig> {
        let mut builder = ConductorConfig::builder().with_env()?;
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(millis) = self.poll_interval_ms {
            builder = builder.poll_interval(Duration::from_millis(millis));
        }
        if let Some(musician) = &self.musician {
            builder = builder.musician(musician.clone());
        }
        if let Some(roles) = &self.roles {
            builder = builder.roles(roles.clone());
        }
        builder.build()
    }
}

/// Process exit status for a finished run
pub fn exit_status(outcome: RunOutcome) -> u8 {
    if outcome.is_success() {
        0
    } else {
        1
    }
}

/// Load the symphony, conduct it and map the outcome to an exit code
pub async fn perform(options: PerformOptions) -> eyre::Result<ExitCode> {
    let config = options.config()?;
    info!(
        source = ?config.source,
        timeout_secs = config.timeout.as_secs(),
        poll_interval_ms = u64::try_from(config.poll_interval.as_millis()).unwrap_or(u64::MAX),
        roles = ?config.roles(),
        "configuration resolved"
    );

    let graph = match load_with_roster(&options.plan, &config.roles()) {
        Ok(graph) => graph,
        Err(e) => {
            error!(path = %options.plan.display(), error = %e, "failed to load symphony");
            return Ok(ExitCode::FAILURE);
        }
    };

    for diagnostic in graph.diagnostics() {
        warn!(%diagnostic, "task can never start");
    }

    let conductor = Conductor::new(graph, config).with_name(options.plan.display().to_string());

    // Dropping the run future on Ctrl-C drops the pool, which kills every musician.
    tokio::select! {
        report = conductor.perform() => {
            let report = report?;
            for (task_id, message) in report.errors() {
                error!(%task_id, error_message = %message, "task failed");
            }
            Ok(ExitCode::from(exit_status(report.outcome)))
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, dismissing the orchestra");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
    }
}
