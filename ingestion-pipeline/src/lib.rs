#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod batch;
pub mod corpus;
pub mod notifications;
pub mod pipeline;
pub mod utils;
pub mod worker;

pub use batch::BatchResolver;
pub use corpus::CorpusStore;
pub use notifications::{ChannelSource, Notification, NotificationSource, RedisSubscription};
pub use pipeline::{
    ClusteringServices, CycleOutput, CycleReport, DefaultClusteringServices, PipelineConfig,
    PipelineCoordinator,
};
pub use worker::{IngestionLoop, MessageOutcome, WorkerContext, WorkerState};

use common::{error::AppError, shutdown::ShutdownSignal};

/// Resumes the corpus and consumes notifications until stopped.
///
/// Returns `Ok(())` after a requested stop and the fatal error otherwise.
pub async fn run_worker_loop<S: NotificationSource>(
    ctx: WorkerContext,
    source: S,
    shutdown: ShutdownSignal,
) -> Result<(), AppError> {
    let mut ingestion_loop = IngestionLoop::start(ctx, source, shutdown).await?;
    ingestion_loop.run().await
}
