use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use teamgate_server::cli::Args;
use teamgate_server::config::Config;
use teamgate_server::{build_router, load_signing_key, telemetry};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    config.apply_args(&args);
    config.validate()?;

    telemetry::init_tracing(&config.logging, &config.log_filter())?;

    let key_path = config
        .auth
        .signing_key_path
        .clone()
        .context("auth.signing_key_path must be set")?;
    let codec = Arc::new(load_signing_key(&key_path)?);
    let app = build_router(&config, codec)?;

    if args.check {
        info!(teams = config.teams.len(), "configuration is valid");
        return Ok(());
    }

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("teamgate listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("teamgate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
