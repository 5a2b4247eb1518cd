// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use catalogd::{
    config::{Cli, Commands, ControllerConfig},
    constants::{CONTROLLER_NAME, TOKIO_WORKER_THREADS},
    controller,
    server::{start_server, ServerState},
};
use clap::{CommandFactory, Parser};
use kube::Client;
use std::sync::Arc;
use tracing::{debug, error, info};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), CONTROLLER_NAME, &mut std::io::stdout());
        return Ok(());
    }

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("catalogd-controller")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

/// Initialize logging.
///
/// Respects `RUST_LOG` (default `info`) and `RUST_LOG_FORMAT` (`json` or text).
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(cli: Cli) -> Result<()> {
    init_tracing();

    info!("Starting catalogd service catalog controller");
    let config = ControllerConfig::from_cli(&cli);
    debug!(?config, "Configuration loaded");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default()
        .await
        .context("creating Kubernetes client")?;
    debug!("Kubernetes client initialized successfully");

    let server_state = Arc::new(ServerState::default());
    let metrics_port = config.metrics_port;

    tokio::select! {
        result = start_server(metrics_port, server_state.clone()) => {
            error!("CRITICAL: HTTP server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("HTTP server exited unexpectedly without error")
        }
        result = controller::run(client, config, server_state) => {
            if let Err(e) = &result {
                error!("CRITICAL: controller exited with error: {e:?}");
            }
            result?;
        }
    }

    info!("catalogd stopped");
    Ok(())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
