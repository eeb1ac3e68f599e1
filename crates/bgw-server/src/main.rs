// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use bgw_config::GatewayConfig;
use bgw_server::{build_app, build_state};
use bgw_warming::spawn_recurring;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bookgate", version, about = "Book-metadata API gateway")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable request/response debug logging.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("load config {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    config.apply_env();

    let filter = match (&config.log_filter, args.debug) {
        (Some(filter), _) => EnvFilter::new(filter.clone()),
        (None, true) => EnvFilter::new("bgw=debug,bookgate=debug"),
        (None, false) => EnvFilter::new("bgw=info,bookgate=info"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    for warning in config.validate() {
        warn!(%warning, "configuration warning");
    }

    let bind = config.bind.clone().unwrap_or(args.bind);
    let state = build_state(config, None, None);

    // Scheduled work: daily cover harvest and archival, 15-minute alerts.
    let harvester = Arc::clone(&state.harvester);
    spawn_recurring(Duration::from_secs(24 * 60 * 60), move || {
        let harvester = Arc::clone(&harvester);
        async move {
            harvester.run().await;
        }
    });
    let archiver = Arc::clone(&state.archiver);
    spawn_recurring(Duration::from_secs(24 * 60 * 60), move || {
        let archiver = Arc::clone(&archiver);
        async move {
            archiver.run().await;
        }
    });
    let alerts = Arc::clone(&state.alerts);
    spawn_recurring(Duration::from_secs(15 * 60), move || {
        let alerts = Arc::clone(&alerts);
        async move {
            alerts.sweep().await;
        }
    });

    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(%bind, "bookgate listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("serve")
}
