use std::{sync::Arc, time::Duration};

use common::{
    error::{AppError, ErrorDisposition},
    shutdown::ShutdownSignal,
    storage::{snapshot::SnapshotCache, store::StorageManager},
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use tracing::{debug, error, info, warn};

use crate::{
    batch::BatchResolver,
    corpus::CorpusStore,
    notifications::{Notification, NotificationSource},
    pipeline::{PipelineConfig, PipelineCoordinator},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    StoppingRequested,
    Stopped,
}

/// What became of one notification that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Control message, nothing to do.
    Ignored,
    /// The batch resolved to zero documents.
    Empty,
    /// The batch is already in the corpus; redelivery is skipped.
    Duplicate,
    Published { version: u64 },
    /// The batch was appended but the cycle failed, so the previous snapshot stands.
    Retained,
}

/// Everything the worker needs, passed in explicitly by the owning process.
#[derive(Clone)]
pub struct WorkerContext {
    pub resolver: BatchResolver,
    pub coordinator: Arc<PipelineCoordinator>,
    pub embedding_dimension: usize,
    pub poll_interval: Duration,
}

impl WorkerContext {
    /// Loads the embedding backend, probes its dimension and wires the default
    /// clustering services.
    pub async fn from_config(
        config: &AppConfig,
        snapshots: SnapshotCache,
        storage: StorageManager,
    ) -> Result<Self, AppError> {
        let embedding_provider = Arc::new(EmbeddingProvider::from_config(config).await?);
        let embedding_dimension = embedding_provider.probe_dimension().await?;

        let coordinator = PipelineCoordinator::new(
            snapshots,
            storage.clone(),
            embedding_provider,
            PipelineConfig::from_app_config(config),
        );

        Ok(Self {
            resolver: BatchResolver::new(storage),
            coordinator: Arc::new(coordinator),
            embedding_dimension,
            poll_interval: Duration::from_millis(config.notification_poll_ms),
        })
    }
}

/// Single-consumer loop: resolve, embed, append, recompute, publish.
pub struct IngestionLoop<S> {
    ctx: WorkerContext,
    source: S,
    shutdown: ShutdownSignal,
    corpus: CorpusStore,
    state: WorkerState,
}

impl<S: NotificationSource> IngestionLoop<S> {
    /// Builds the loop and resumes the corpus from the last published snapshot.
    pub async fn start(
        ctx: WorkerContext,
        source: S,
        shutdown: ShutdownSignal,
    ) -> Result<Self, AppError> {
        let corpus = CorpusStore::load(ctx.coordinator.snapshots()).await?;
        if let Some(stored) = corpus.embedding_dimension() {
            if stored != ctx.embedding_dimension {
                warn!(
                    stored,
                    configured = ctx.embedding_dimension,
                    "resumed corpus was embedded with a different dimension; new batches will not match"
                );
            }
        }

        Ok(Self {
            ctx,
            source,
            shutdown,
            corpus,
            state: WorkerState::Running,
        })
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn corpus(&self) -> &CorpusStore {
        &self.corpus
    }

    /// Consumes notifications until a stop is requested or a fatal error occurs.
    ///
    /// The stop signal is checked before every wait, and the wait itself is bounded by
    /// the poll interval, so a stop is observed within one interval.
    pub async fn run(&mut self) -> Result<(), AppError> {
        info!(
            corpus_len = self.corpus.len(),
            poll_ms = u64::try_from(self.ctx.poll_interval.as_millis()).unwrap_or(u64::MAX),
            "ingestion worker started"
        );

        loop {
            if self.shutdown.is_stop_requested() {
                self.state = WorkerState::Stopped;
                info!(corpus_len = self.corpus.len(), "ingestion worker stopped");
                return Ok(());
            }

            let received = tokio::select! {
                biased;
                () = self.shutdown.stopped() => None,
                next = self.source.next(self.ctx.poll_interval) => Some(next),
            };

            let result = match received {
                None => {
                    self.state = WorkerState::StoppingRequested;
                    continue;
                }
                Some(Ok(None)) => continue,
                Some(Ok(Some(notification))) => self.handle_notification(notification).await,
                Some(Err(err)) => Err(err),
            };

            match result {
                Ok(outcome) => debug!(?outcome, "notification handled"),
                Err(err) => self.escalate(err)?,
            }
        }
    }

    /// Processes one notification end to end.
    ///
    /// Errors before the append leave the corpus untouched. A failed cycle keeps the
    /// appended batch and reports [`MessageOutcome::Retained`] unless the failure is fatal.
    #[tracing::instrument(skip_all, fields(notification = ?notification))]
    pub async fn handle_notification(
        &mut self,
        notification: Notification,
    ) -> Result<MessageOutcome, AppError> {
        let batch_id = match notification {
            Notification::Control { kind } => {
                debug!(%kind, "ignoring control message");
                return Ok(MessageOutcome::Ignored);
            }
            Notification::Batch { batch_id } => batch_id,
        };

        if self.corpus.contains_batch(&batch_id) {
            info!(%batch_id, "batch already ingested; skipping redelivery");
            return Ok(MessageOutcome::Duplicate);
        }

        let documents = self.ctx.resolver.resolve(&batch_id).await?;
        let services = self.ctx.coordinator.services();
        let appended = self
            .corpus
            .append(
                &batch_id,
                documents,
                services.as_ref(),
                self.ctx.embedding_dimension,
            )
            .await?;
        if appended == 0 {
            return Ok(MessageOutcome::Empty);
        }

        info!(%batch_id, appended, corpus_len = self.corpus.len(), "batch ingested");

        match self.ctx.coordinator.run_cycle(self.corpus.entities()).await {
            Ok(report) => Ok(MessageOutcome::Published {
                version: report.version,
            }),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(
                    %batch_id,
                    corpus_len = self.corpus.len(),
                    error = %err,
                    "clustering cycle failed; previous snapshot kept"
                );
                Ok(MessageOutcome::Retained)
            }
        }
    }

    fn escalate(&mut self, err: AppError) -> Result<(), AppError> {
        match err.disposition() {
            ErrorDisposition::Recoverable(kind) => {
                warn!(kind = kind.as_str(), error = %err, "notification dropped");
                Ok(())
            }
            ErrorDisposition::Fatal => {
                error!(error = %err, "ingestion worker stopping on fatal error");
                self.state = WorkerState::Stopped;
                Err(err)
            }
        }
    }
}
