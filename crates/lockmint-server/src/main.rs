use std::{net::SocketAddr, sync::Arc};

use alloy::providers::ProviderBuilder;
use axum::routing::{get, post};
use clap::Parser;
use eyre::WrapErr;
use lockmint_core::{AppState, ChainClient, Deployments, ProviderClient};
use socketioxide::SocketIo;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

mod args;
mod handlers;
mod routes;
mod runner;
mod settings;
mod state;
mod store;

use args::Args;
use state::ServerState;
use store::Store;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let args = Args::parse();

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(args.log_level).into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let settings_path = args.data_path.join(settings::SETTINGS_FILE);
    let persisted = settings::load(&settings_path).await.unwrap_or_else(|err| {
        tracing::warn!(?err, "Ignoring unreadable settings file");
        Default::default()
    });

    let deployments = match &args.deployments {
        Some(path) => settings::load_deployments(path).await?,
        None => Deployments::new(),
    };

    let provider = ProviderBuilder::new()
        .on_builtin(args.rpc_url.as_str())
        .await
        .wrap_err_with(|| format!("Failed to connect to {}", args.rpc_url))?;
    let client: Arc<dyn ChainClient> = Arc::new(ProviderClient::new(Arc::new(provider)));

    // Single source of truth for the dashboard state
    let store = Store::new(AppState::new(persisted, args.ecosystem).with_deployments(deployments));

    tokio::spawn(runner::run(store.clone(), Arc::clone(&client)));
    tokio::spawn(settings::persist(store.clone(), settings_path));

    let server_state = Arc::new(ServerState { store });

    // Create a new Socket.IO layer
    let (socket_layer, socket_io) = SocketIo::builder()
        .with_state(Arc::clone(&server_state))
        .build_layer();
    socket_io.ns("/ws", handlers::ws);

    // Add Cross-Origin Resource Sharing (CORS) middleware to the application
    let cors_layer = CorsLayer::permissive();

    // Trace requests to the application
    let trace_layer = TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default());

    let app = axum::Router::new()
        .route("/state", get(routes::state::state))
        .route("/commands", post(routes::state::dispatch))
        .layer(socket_layer)
        .with_state(Arc::clone(&server_state))
        .layer(cors_layer)
        .layer(trace_layer);

    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], args.port))).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
