//! Main Entrypoint for deckgen
//!
//! This binary is responsible for:
//! 1. Parsing arguments and loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Wiring the generation services for the chosen command.
//! 4. Running the command and printing its result.

use anyhow::Context;
use clap::Parser;
use deckgen_cli::{
    cli::{Cli, Command},
    config::Config,
    state::AppState,
};
use deckgen_core::{
    DeckRequest,
    assistant::{DEFAULT_INSTRUCTIONS, start_conversation},
    chat::ChatFlow,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancels `token` when `Ctrl+C` is received.
async fn cancel_on_ctrl_c(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C. Stopping the run...");
        token.cancel();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(output_dir) = cli.output_dir {
        config.output_dir = output_dir;
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!(output_dir = %config.output_dir.display(), "Configuration loaded.");

    // --- 3. Run the Command ---
    match cli.command {
        Command::Generate {
            topic,
            slides,
            offline,
        } => {
            let state = AppState::new(config, offline)?;
            let request = DeckRequest::new(topic, slides)?;
            let path = state
                .builder
                .build(&request)
                .await
                .context("Failed to generate presentation")?;
            println!("{}", path.display());
        }
        Command::Assistant { prompt } => {
            let state = AppState::new(config, false)?;
            let client = state.assistant_client()?;
            let run = start_conversation(
                client.as_ref(),
                &state.registry,
                DEFAULT_INSTRUCTIONS,
                &prompt,
            )
            .await
            .context("Failed to start assistant run")?;

            let cancel = CancellationToken::new();
            tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

            info!(
                run_id = %run.run_id,
                poll_interval = ?state.config.poll_interval,
                budget = ?state.config.run_timeout,
                "Waiting for the assistant..."
            );
            let turns = state.dispatch_loop(client, cancel).drive(&run).await?;
            for turn in turns {
                println!("{}", turn);
            }
        }
        Command::Chat { prompt } => {
            let state = AppState::new(config, false)?;
            let flow = ChatFlow::new(state.llm_client()?, state.registry.clone());
            let reply = flow.run(&prompt).await?;
            println!("{}", reply);
        }
    }

    Ok(())
}
