//! Runs a Rally server with development collaborators.
//!
//! ```text
//! rally-server --config config.toml
//! RALLY_CONFIG=config.toml rally-server --bind 0.0.0.0:9000
//! ```
//!
//! Tokens are participant numbers and outcomes go to the log. One match
//! between participants 1 and 2 is created at startup; its id is logged.

use clap::Parser;
use rally::dev::{LogRecorder, NumericTokens};
use rally::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().load_config()?;
    init_logging(&config.logging)?;

    let mut runtime = tokio::runtime::Builder::new_multi_thread();
    runtime.enable_all();
    if let Some(workers) = config.worker_threads {
        runtime.worker_threads(workers.max(1));
    }
    runtime.build()?.block_on(serve(config))
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let server = RallyServer::<NumericTokens, LogRecorder>::builder()
        .config(config)
        .build(NumericTokens, LogRecorder)
        .await?;
    let registry = server.registry();

    let (match_id, _) = registry.create(
        ParticipantId(1),
        ParticipantId(2),
        MatchType::default(),
    )?;
    tracing::info!(%match_id, join_id = %match_id.0, "demo match waiting for participants 1 and 2");

    tokio::select! {
        result = server.run() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!(live_rooms = registry.len(), "shutting down");
        }
    }

    let lost = registry.log_unrecorded();
    if lost > 0 {
        tracing::error!(count = lost, "exiting with unrecorded match outcomes");
    }
    Ok(())
}
