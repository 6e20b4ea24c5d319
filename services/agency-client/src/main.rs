//! Agency Client - submits an agency's bets to the lottery server
//!
//! 1. Loads configuration from config.yaml and CLI_* environment variables
//! 2. Streams the bets file to the server in confirmed batches
//! 3. Notifies the server that the agency is done
//! 4. Polls for the agency's winners until the draw is available

use anyhow::Context;
use tracing::{error, info};

use agency_client::{AgencyRunner, BatchReader, ClientConfig, RunOutcome, ShutdownCoordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ClientConfig::load().context("Failed to load client configuration")?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level()?)
        .init();

    info!(
        action = "config",
        result = "success",
        client_id = %config.id,
        server_address = %config.server_address,
        bets_file = %config.bets_file,
        batch_max_amount = config.batch_max_amount,
        loop_period_ms = config.loop_period_ms,
        winners_backoff_ms = config.winners_backoff_ms,
        "Starting agency client"
    );

    let shutdown = ShutdownCoordinator::new();
    let listener = shutdown.listen(&config.id);

    let reader = BatchReader::open(&config.bets_file, config.batch_max_amount, &config.id)
        .await
        .with_context(|| format!("Failed to open bets file {}", config.bets_file))?
        .with_chunk_size(config.read_chunk_size);

    let agency_id = config.id.clone();
    let mut runner = AgencyRunner::new(config, reader, shutdown.token());
    let result = runner.run().await;
    listener.abort();

    match result {
        Ok(report) => {
            if let RunOutcome::Completed { winners } = report.outcome {
                info!(
                    action = "exit",
                    result = "success",
                    client_id = %agency_id,
                    winners,
                    "Agency client finished"
                );
            }
            Ok(())
        }
        Err(e) if shutdown.is_cancelled() => {
            // Socket I/O cut short by the shutdown itself
            error!(
                action = "graceful_shutdown",
                result = "fail",
                client_id = %agency_id,
                error = %e,
                "I/O interrupted during shutdown"
            );
            Err(e).context("Agency run interrupted by shutdown")
        }
        Err(e) => Err(e).context("Agency run failed"),
    }
}
