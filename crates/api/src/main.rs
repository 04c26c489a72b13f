use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bodyline_core::clock::SystemClock;
use bodyline_events::EventBus;
use bodyline_timeline::{TimelineService, TimelineWorker};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bodyline_api::config::ServerConfig;
use bodyline_api::router::build_app_router;
use bodyline_api::source::ServerEventSource;
use bodyline_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bodyline_api=debug,bodyline_timeline=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(
        host = %config.host,
        port = %config.port,
        user_id = %config.user_id,
        events_file = ?config.events_file,
        "Loaded server configuration"
    );

    // --- Timeline ---
    let timeline = Arc::new(TimelineService::new(
        config.timeline.clone(),
        None,
        Arc::new(SystemClock),
    ));
    let event_bus = Arc::new(EventBus::default());
    let source = Arc::new(ServerEventSource::from_config(&config, &event_bus));

    match timeline.refresh(source.as_ref(), config.user_id).await {
        Ok(outcome) => tracing::info!(?outcome, source = source.kind(), "Initial timeline loaded"),
        Err(e) => tracing::error!(error = %e, "Initial event load failed, serving empty timeline"),
    }

    // --- Worker ---
    let worker = TimelineWorker::new(Arc::clone(&timeline), Arc::clone(&source), config.user_id);
    let worker_handle = tokio::spawn(worker.run(event_bus.subscribe()));
    tracing::info!("Timeline worker started");

    // --- App state ---
    let state = AppState {
        timeline,
        source,
        event_bus: Arc::clone(&event_bus),
        user_id: config.user_id,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // An in-memory source keeps its own bus handle alive, so the worker is
    // stopped explicitly if the channel does not close.
    drop(event_bus);
    let abort = worker_handle.abort_handle();
    if tokio::time::timeout(Duration::from_secs(5), worker_handle)
        .await
        .is_err()
    {
        abort.abort();
        tracing::warn!("Timeline worker did not stop in time, aborted");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
