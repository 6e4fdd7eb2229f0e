use std::sync::Arc;

use common::{
    shutdown::ShutdownController,
    storage::{db::SurrealDbClient, snapshot::SnapshotCache, store::StorageManager},
    utils::config::get_config,
};
use ingestion_pipeline::{run_worker_loop, RedisSubscription, WorkerContext};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;

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

    // Batch store
    let storage = StorageManager::new(&config).await?;

    let worker_ctx = WorkerContext::from_config(&config, SnapshotCache::new(db), storage).await?;
    let subscription =
        RedisSubscription::connect(&config.redis_url, &config.notification_channel).await?;

    let shutdown = ShutdownController::new();
    let stopper = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => stopper.request_stop(),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    run_worker_loop(worker_ctx, subscription, shutdown.signal()).await?;
    info!("Ingestion worker exited");
    Ok(())
}
