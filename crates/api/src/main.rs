use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediavault_api::config::ServerConfig;
use mediavault_api::router::build_app_router;
use mediavault_api::state::AppState;
use mediavault_api::background;
use mediavault_cache::{ArtifactStore, CacheStore};
use mediavault_events::JobEventBus;
use mediavault_queue::{CommandProducer, CompletionCoordinator, JobQueue, ResultTracker};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mediavault_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Artifact store + startup sweep ---
    // Reclaim directories whose cache entries were lost to the previous
    // shutdown, before anything can hand out URLs into them.
    let artifacts = Arc::new(
        ArtifactStore::new(&config.artifact_root).expect("Failed to create artifact root"),
    );
    match artifacts.sweep_on_startup(config.cache_ttl()) {
        Ok(removed) => tracing::info!(removed, "Startup artifact sweep complete"),
        Err(e) => tracing::error!(error = %e, "Startup artifact sweep failed"),
    }

    // --- Stores ---
    let cache = Arc::new(CacheStore::new(Arc::clone(&artifacts)));
    let tracker = Arc::new(ResultTracker::new());

    // --- Event bus ---
    let event_bus = Arc::new(JobEventBus::default());

    // --- Completion coordinator ---
    let coordinator = CompletionCoordinator::new(
        Arc::clone(&tracker),
        Arc::clone(&cache),
        Arc::clone(&artifacts),
        config.cache_ttl_secs,
    );
    let coordinator_handle = tokio::spawn(coordinator.run(event_bus.subscribe()));

    // --- Job queue + workers ---
    let producer = Arc::new(CommandProducer::new(
        config.producer_command.clone(),
        config.producer_args.clone(),
    ));
    let queue = JobQueue::start(
        config.worker_concurrency,
        config.producer_timeout(),
        Arc::clone(&artifacts),
        producer,
        Arc::clone(&event_bus),
    );
    tracing::info!(
        workers = config.worker_concurrency,
        command = %config.producer_command,
        "Job queue started"
    );

    // --- Janitor ---
    let janitor_cancel = tokio_util::sync::CancellationToken::new();
    let janitor_handle = tokio::spawn(background::janitor::run(
        Arc::clone(&cache),
        Arc::clone(&tracker),
        Arc::clone(&queue),
        Arc::clone(&artifacts),
        Duration::from_secs(config.janitor_interval_secs),
        chrono::Duration::seconds(config.result_retention_secs),
        janitor_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        cache,
        artifacts,
        queue: Arc::clone(&queue),
        tracker,
    };

    // --- Router ---
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

    // Kill running producers first (they hold child processes).
    queue.shutdown();
    tracing::info!("Job queue shut down");

    // Stop the janitor.
    janitor_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), janitor_handle).await;
    tracing::info!("Janitor stopped");

    // Drop the event bus sender to close the broadcast channel, which
    // signals the coordinator to shut down.
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), coordinator_handle).await;
    tracing::info!("Completion coordinator shut down");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
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
