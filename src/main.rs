use clap::Parser;
use tracing::info;

use wsload::Harness;
use wsload::cli::Cli;
use wsload::trace::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Cli::parse().into_config();
    let harness = Harness::new(config)?;
    let report = harness.run_until_interrupt().await;

    info!(%report, "run finished");
    Ok(())
}
