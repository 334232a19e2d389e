use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use drive_sync::config::Config;
use drive_sync::cursor::{CursorBackend, CursorStore, FileBackend, RedisBackend};
use drive_sync::poller::{ChangePoller, PollerConfig};
use drive_sync::provider::{DocumentProvider, DriveApiClient};
use drive_sync::queue::WorkQueue;
use drive_sync::server::{AppState, build_router};
use drive_sync::shutdown::{self, ShutdownController};
use drive_sync::storage::ObjectStorage;
use drive_sync::worker::{SyncWorker, WorkerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "configuration error");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let storage = ObjectStorage::s3(&config.bucket, &config.region)?;
    let queue = WorkQueue::open(&config.queue_dir)?;
    let cursor = Arc::new(CursorStore::new(
        redis_backend(config.redis_url.as_deref()).await,
        FileBackend::new(&config.state_file),
        config.warmup,
    ));
    let provider: Arc<dyn DocumentProvider> =
        Arc::new(DriveApiClient::new(config.provider_access_token.clone()));

    let mut controller = ShutdownController::new(config.shutdown_timeout);

    let state = AppState {
        queue: queue.clone(),
        verification_token: Arc::from(config.verification_token.as_str()),
        allowed_addrs: Arc::from(config.allowed_addrs.clone()),
        shutdown: controller.token(),
    };
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    let router = build_router(state).into_make_service_with_connect_info::<SocketAddr>();
    let server_token = controller.token();
    controller.spawn("http-server", async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(server_token.cancelled_owned())
            .await;
        if let Err(err) = result {
            error!(error = %err, "http server failed");
        }
    });

    let worker = SyncWorker::new(
        Arc::clone(&provider),
        queue.clone(),
        storage,
        WorkerConfig {
            folder: config.folder.clone(),
            storage_prefix: config.storage_prefix.clone(),
        },
    );
    let worker_token = controller.token();
    controller.spawn("sync-worker", async move {
        worker.run(worker_token).await;
    });

    let poller = ChangePoller::new(
        provider,
        queue,
        cursor,
        PollerConfig::new(config.folder.clone(), config.poll_interval),
    );
    let poller_token = controller.token();
    controller.spawn("change-poller", async move {
        poller.run(poller_token).await;
    });

    info!(
        addr = %config.bind_addr(),
        folder = %config.folder,
        bucket = %config.bucket,
        "pipeline started"
    );

    shutdown::wait_for_signal().await?;
    info!("shutdown signal received");
    controller.shutdown().await;
    Ok(())
}

/// Builds the Redis cursor backend when configured. A Redis that is down at
/// startup is not fatal: the store degrades to the state file and the
/// backend reconnects on later use.
async fn redis_backend(url: Option<&str>) -> Option<Box<dyn CursorBackend>> {
    let url = url?;
    match RedisBackend::new(url) {
        Ok(backend) => {
            if !backend.healthy().await {
                warn!("redis unreachable at startup, cursor state degrades to file");
            }
            Some(Box::new(backend))
        }
        Err(err) => {
            warn!(error = %err, "invalid redis configuration, cursor state uses file only");
            None
        }
    }
}
