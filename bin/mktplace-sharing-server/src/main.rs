//! Delta Sharing data plane server.
//!
//! Serves the Delta Sharing REST API (`mktplace-sharing::router`) on one
//! listen address, with a Prometheus `/metrics` endpoint and a background
//! sweep that reclaims materialized watermark files past their useful life.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use mktplace_catalog::Catalog;
use mktplace_common::Config;
use mktplace_objectstore::sweep::sweep_watermarked_older_than_one_hour;
use mktplace_sharing::SharingState;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "mktplace-sharing-server")]
#[command(about = "Delta Sharing data plane for the marketplace")]
#[command(version)]
struct Args {
    /// Listen address for the Delta Sharing REST API
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Listen address for the Prometheus `/metrics` scrape endpoint
    #[arg(long, default_value = "0.0.0.0:9464")]
    metrics_listen: String,

    /// Run pending catalog migrations on startup
    #[arg(long, default_value_t = true)]
    migrate: bool,

    /// Log level, overridden by `RUST_LOG` if set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("loading configuration")?;

    info!(listen = %args.listen, "starting mktplace-sharing-server");

    let catalog = Catalog::connect(&config.database.url, config.database.max_connections)
        .await
        .context("connecting to catalog database")?;
    if args.migrate {
        catalog.migrate().await.context("running catalog migrations")?;
        info!("catalog migrations applied");
    }

    let state = Arc::new(SharingState::new(catalog, config));

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("installing Prometheus recorder")?;

    spawn_gc_sweep(state.clone());

    let metrics_router = Router::new().route(
        "/metrics",
        get(move || {
            let handle = metrics_handle.clone();
            async move { handle.render() }
        }),
    );
    let metrics_addr: SocketAddr = args.metrics_listen.parse().context("parsing --metrics-listen")?;
    let metrics_listener = TcpListener::bind(metrics_addr).await.context("binding metrics listener")?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_router).await {
            tracing::error!(error = %e, "metrics server exited");
        }
    });
    info!(addr = %metrics_addr, "metrics endpoint listening");

    let app = mktplace_sharing::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = args.listen.parse().context("parsing --listen")?;
    let listener = TcpListener::bind(addr).await.context("binding sharing listener")?;
    info!(addr = %addr, "Delta Sharing API listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("serving Delta Sharing API")?;

    Ok(())
}

/// Reclaim stale materialized watermark files once an hour for the
/// lifetime of the process.
fn spawn_gc_sweep(state: Arc<SharingState>) {
    let interval = state.config.gc_sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(StdDuration::from_secs(1)));
        loop {
            ticker.tick().await;
            let deleted = sweep_watermarked_older_than_one_hour(&state.store).await;
            if deleted > 0 {
                info!(deleted, "gc sweep reclaimed stale watermarked objects");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
}
