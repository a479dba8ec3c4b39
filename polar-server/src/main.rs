mod bootstrap;
mod config;
mod delta;
mod engine;
mod error;
mod ingress;
mod persistence;
mod processor;
mod routes;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use polar_engine::{Measurement, TableStore};
use serde_json::Value;
use socketioxide::extract::{Data, SocketRef};
use socketioxide::SocketIo;
use tokio::sync::{mpsc, watch};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use config::Config;
use delta::DeltaMessage;
use engine::PolarEngine;
use ingress::{run_udp_ingress, IngressConfig};
use persistence::JsonFileStore;
use processor::{run_measurement_processor, run_performance_tick, DELTA_EVENT};
use state::{AppContext, AppState};

#[derive(Debug, Parser)]
#[command(name = "polar-server", about = "Polar performance server for a sailing vessel")]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "polar.toml")]
    config: PathBuf,

    /// HTTP port, overrides the config file and PORT
    #[arg(long)]
    port: Option<u16>,
}

// ─── Socket.IO ────────────────────────────────────────────────────────────────

/// Clients may push deltas the same way UDP sources do.
fn on_connect(socket: SocketRef, tx: mpsc::Sender<Measurement>) {
    info!("Client connected: {}", socket.id);

    socket.on(DELTA_EVENT, move |s: SocketRef, Data::<Value>(data)| {
        let tx = tx.clone();
        async move {
            let delta: DeltaMessage = match serde_json::from_value(data) {
                Ok(d) => d,
                Err(e) => {
                    debug!("Malformed delta from client {}: {e}", s.id);
                    return;
                }
            };
            for m in delta.into_measurements(Utc::now()) {
                if tx.send(m).await.is_err() {
                    return;
                }
            }
        }
    });

    socket.on_disconnect(|s: SocketRef| async move {
        info!("Client disconnected: {}", s.id);
    });
}

// ─── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polar_server=info,polar_engine=info,socketioxide=warn".into()),
        )
        .init();

    let args = Args::parse();
    info!("⛵ Polar server starting...");

    let mut config = Config::load(&args.config)?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    let base_dir = args
        .config
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();

    // Tables
    let store = JsonFileStore::open(&config.server.data_dir)
        .with_context(|| format!("opening table store {}", config.server.data_dir.display()))?;
    info!("Table store at {}", store.dir().display());
    let registry = bootstrap::load_registry(&config, &store, &base_dir)?;
    let store: Arc<dyn TableStore> = Arc::new(store);

    let engine = PolarEngine::new(
        registry,
        config.dynamic.gate_config()?,
        config.dynamic.updater()?,
        config.server.source_label.clone(),
    );
    let ctx = AppContext::new(AppState::new(engine), store);

    // Channels
    let (measurement_tx, measurement_rx) = mpsc::channel::<Measurement>(1024);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Socket.IO
    let (socket_layer, io) = SocketIo::builder().build_layer();
    let socket_tx = measurement_tx.clone();
    io.ns("/", move |socket: SocketRef| {
        let tx = socket_tx.clone();
        async move {
            on_connect(socket, tx);
        }
    });

    // Tasks
    tokio::spawn(run_udp_ingress(
        IngressConfig {
            udp_port: config.server.udp_port,
            self_context: config.server.self_context.clone(),
        },
        measurement_tx,
        shutdown_rx.clone(),
    ));
    let processor = tokio::spawn(run_measurement_processor(ctx.clone(), io.clone(), measurement_rx));
    let tick = tokio::spawn(run_performance_tick(ctx.clone(), io.clone(), shutdown_rx));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(ctx).layer(socket_layer).layer(cors);

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("🚀 Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // The socket layer keeps a sender alive through the namespace handler, so the
    // processor is stopped explicitly once the ticker and ingress are done.
    let _ = tick.await;
    processor.abort();
    info!("Polar server stopped");
    Ok(())
}
