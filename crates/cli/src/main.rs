use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use syncphony::{perform, PerformOptions};
use syncphony_core::Role;

#[derive(Parser)]
#[command(name = "syncphony")]
#[command(about = "Conduct a symphony of dependent tasks across role-bound musicians", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the symphony document (JSON)
    plan: PathBuf,

    /// Give up after this many seconds [default: 300]
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Longest wait between scheduling passes, in milliseconds [default: 1000]
    #[arg(long, value_name = "MS")]
    poll_interval: Option<u64>,

    /// Musician executable launched for every role
    #[arg(long, value_name = "PATH")]
    musician: Option<PathBuf>,

    /// Only start musicians for these roles (comma separated)
    #[arg(long, value_name = "ROLE,...", value_delimiter = ',')]
    roles: Option<Vec<Role>>,
}

#[tokio::main]
async fn main() -> eyre::Result<ExitCode> {
    color_eyre::install()?;
    // A subscriber may already be installed when embedded; keep going.
    let _ = syncphony_utils::tracing::init();

    let cli = Cli::parse();
    perform(PerformOptions {
        plan: cli.plan,
        timeout_secs: cli.timeout,
        poll_interval_ms: cli.poll_interval,
        musician: cli.musician,
        roles: cli.roles,
    })
    .await
}
