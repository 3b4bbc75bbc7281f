// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP server for the secured election management API
//!
//! Startup is fail-fast: a missing `API_KEY` or an unreadable key aborts
//! before the listener binds.

use anyhow::{Context, Result};
use clap::Args;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use election_mgmt_core::infrastructure::config::{EnvConfigSource, SecurityConfig};
use election_mgmt_core::infrastructure::security::KeyMaterialCache;
use election_mgmt_core::presentation::api::{app, SecurityState};

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// HTTP port
    #[arg(long, env = "PORT", default_value = "3004")]
    pub port: u16,

    /// HTTP bind address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Expose Prometheus metrics on this port
    #[arg(long, env = "METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let source = EnvConfigSource;
    let config = SecurityConfig::from_source(&source).context("Failed to load security configuration")?;
    let keys = Arc::new(KeyMaterialCache::from_config(&source).context("Failed to load cryptographic keys")?);

    info!(
        policy = %config.guard_policy,
        canonicalization = ?config.canonicalization,
        body_limit = config.body_limit,
        "Request pipeline configured"
    );

    if let Some(metrics_port) = args.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], metrics_port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics listening on 0.0.0.0:{}", metrics_port);
    }

    let router = app(SecurityState::from_config(&config, keys));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Election management service listening on {}", addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("HTTP server failed")?;

    info!("Election management service shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
