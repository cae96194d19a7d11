//! Marketplace catalog API server.
//!
//! Serves registration/login, dataset publish, purchase/trial, and share
//! lifecycle management — the surface a buyer or seller's browser talks to,
//! as opposed to `mktplace-sharing-server`'s Delta Sharing client surface.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mktplace_catalog::Catalog;
use mktplace_common::Config;
use mktplace_marketplace::MarketplaceState;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "mktplace-api-server")]
#[command(about = "Marketplace catalog API")]
#[command(version)]
struct Args {
    /// Listen address for the marketplace catalog API
    #[arg(long, default_value = "0.0.0.0:8000")]
    listen: String,

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

    info!(listen = %args.listen, "starting mktplace-api-server");

    let catalog = Catalog::connect(&config.database.url, config.database.max_connections)
        .await
        .context("connecting to catalog database")?;
    if args.migrate {
        catalog.migrate().await.context("running catalog migrations")?;
        info!("catalog migrations applied");
    }

    let state = Arc::new(MarketplaceState::new(catalog, config));
    let app = mktplace_marketplace::router(state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = args.listen.parse().context("parsing --listen")?;
    let listener = TcpListener::bind(addr).await.context("binding marketplace listener")?;
    info!(addr = %addr, "marketplace catalog API listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("serving marketplace API")?;

    Ok(())
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
