use clap::Parser;
use syncphony_conductor::musician::{serve, RehearsalPerformer};
use syncphony_core::Role;
use syncphony_utils::tracing::musician_span;
use tokio::io::BufReader;
use tracing::{info, Instrument};

/// Reference musician: performs stand-in actions for one role over
/// stdin/stdout JSON lines and exits when stdin closes.
#[derive(Parser)]
#[command(name = "syncphony-musician")]
#[command(version)]
struct MusicianCli {
    /// The role this musician plays
    #[arg(long)]
    role: Role,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let _ = syncphony_utils::tracing::init();

    let cli = MusicianCli::parse();
    let role = cli.role;

    async move {
        info!("musician ready");
        let stats = serve(
            role,
            &RehearsalPerformer,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
        .await?;
        info!(
            succeeded = stats.succeeded,
            failed = stats.failed,
            ignored = stats.ignored,
            "musician leaving the stage"
        );
        Ok::<(), eyre::Report>(())
    }
    .instrument(musician_span(role.as_str()))
    .await
}
