use std::{error::Error, future::IntoFuture, sync::Arc};

use api_router::{api_routes_v1, api_state::ApiState};
use axum::Router;
use common::{
    error::AppError,
    shutdown::ShutdownController,
    storage::{db::SurrealDbClient, snapshot::SnapshotCache, store::StorageManager},
    utils::config::get_config,
};
use ingestion_pipeline::{IngestionLoop, RedisSubscription, WorkerContext};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    // Snapshot store; unreachable is fatal to startup
    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );
    db.ping().await?;

    let storage = StorageManager::new(&config).await?;
    let worker_ctx =
        WorkerContext::from_config(&config, SnapshotCache::new(Arc::clone(&db)), storage).await?;
    let subscription =
        RedisSubscription::connect(&config.redis_url, &config.notification_channel).await?;

    // Resume before serving, so a bad snapshot fails startup
    let shutdown = ShutdownController::new();
    let mut ingestion_loop =
        IngestionLoop::start(worker_ctx, subscription, shutdown.signal()).await?;
    let worker = tokio::spawn(async move {
        info!("Starting ingestion worker");
        ingestion_loop.run().await
    });

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = TcpListener::bind(serve_address).await?;

    serve_with_worker(
        listener,
        app(ApiState::with_db(db)),
        worker,
        shutdown,
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        },
    )
    .await
}

fn app(api_state: ApiState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes_v1())
        .with_state(api_state)
}

/// Serves until `stop` resolves or the worker exits, whichever comes first.
///
/// A worker exit while the server is still up is an error: the process ends instead
/// of serving a snapshot nobody updates.
async fn serve_with_worker<F>(
    listener: TcpListener,
    app: Router,
    mut worker: JoinHandle<Result<(), AppError>>,
    shutdown: ShutdownController,
    stop: F,
) -> Result<(), Box<dyn Error>>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(stop)
        .into_future();

    tokio::select! {
        served = server => {
            served?;
            // One stop request, then wait for the worker to drain
            shutdown.request_stop();
            match worker.await {
                Ok(Ok(())) => {
                    info!("Ingestion worker exited");
                    Ok(())
                }
                Ok(Err(e)) => {
                    error!("Ingestion worker error: {}", e);
                    Err(e.into())
                }
                Err(e) => {
                    error!("Ingestion worker panicked: {:?}", e);
                    Err(e.into())
                }
            }
        }
        joined = &mut worker => {
            let err: Box<dyn Error> = match joined {
                Ok(Ok(())) => "ingestion worker stopped while the server was running".into(),
                Ok(Err(e)) => e.into(),
                Err(e) => e.into(),
            };
            error!("Ingestion worker exited, shutting down: {}", err);
            Err(err)
        }
    }
}
