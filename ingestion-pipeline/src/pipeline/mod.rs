mod artifacts;
mod config;
mod context;
mod services;
mod stages;
mod state;

pub use artifacts::{CycleArtifacts, DocumentPoint, TopicSummary};
pub use config::{ClusteringTuning, PipelineConfig};
#[allow(clippy::module_name_repetitions)]
pub use services::{ClusteringServices, DefaultClusteringServices, EmbeddingMatrix};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::{
        snapshot::SnapshotCache,
        store::StorageManager,
        types::entity::{Entity, TopicLabel},
    },
    utils::embedding::EmbeddingProvider,
};
use tracing::{info, warn};

use self::{
    context::CycleContext,
    stages::{classify, publish, reduce},
    state::ready,
};
use crate::utils::projection::Point2D;

/// Points and labels computed for a corpus, aligned with it by position.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutput {
    pub points: Vec<Point2D>,
    pub labels: Vec<TopicLabel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub version: u64,
    pub entity_count: usize,
    pub topic_count: usize,
}

/// Runs reduce, classify and publish over the whole corpus.
///
/// Either every stage succeeds and the snapshot is replaced, or the cycle aborts and
/// the previously published snapshot stays in place.
#[allow(clippy::module_name_repetitions)]
pub struct PipelineCoordinator {
    services: Arc<dyn ClusteringServices>,
    snapshots: SnapshotCache,
    config: PipelineConfig,
}

impl PipelineCoordinator {
    pub fn new(
        snapshots: SnapshotCache,
        storage: StorageManager,
        embedding_provider: Arc<EmbeddingProvider>,
        config: PipelineConfig,
    ) -> Self {
        let services =
            DefaultClusteringServices::new(embedding_provider, storage, config.clone());
        Self::with_services(snapshots, config, Arc::new(services))
    }

    pub fn with_services(
        snapshots: SnapshotCache,
        config: PipelineConfig,
        services: Arc<dyn ClusteringServices>,
    ) -> Self {
        Self {
            services,
            snapshots,
            config,
        }
    }

    pub fn services(&self) -> Arc<dyn ClusteringServices> {
        Arc::clone(&self.services)
    }

    pub fn snapshots(&self) -> &SnapshotCache {
        &self.snapshots
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Computes points and labels for the corpus without publishing them.
    #[tracing::instrument(skip_all, fields(corpus_len = entities.len()))]
    pub async fn recompute(&self, entities: &[Entity]) -> Result<CycleOutput, AppError> {
        let mut ctx = CycleContext::new(entities, self.services.as_ref(), &self.snapshots);

        let machine = ready();
        let machine = reduce(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let _machine = classify(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;

        Ok(CycleOutput {
            points: ctx.points,
            labels: ctx.labels,
        })
    }

    /// Recomputes over the corpus, publishes the result and renders the artifacts.
    ///
    /// Artifact rendering happens after the publish and its failure is only logged.
    #[tracing::instrument(skip_all, fields(corpus_len = entities.len()))]
    pub async fn run_cycle(&self, entities: &[Entity]) -> Result<CycleReport, AppError> {
        let mut ctx = CycleContext::new(entities, self.services.as_ref(), &self.snapshots);
        let cycle_started = Instant::now();

        let machine = ready();

        let stage_start = Instant::now();
        let machine = reduce(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let reduce_ms = Self::duration_millis(stage_start.elapsed());

        let stage_start = Instant::now();
        let machine = classify(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let classify_ms = Self::duration_millis(stage_start.elapsed());

        let stage_start = Instant::now();
        let _machine = publish(machine, &mut ctx)
            .await
            .map_err(|err| ctx.abort(err))?;
        let publish_ms = Self::duration_millis(stage_start.elapsed());

        let version = ctx.version.ok_or_else(|| {
            AppError::InternalError("published cycle is missing its snapshot version".into())
        })?;

        let artifacts = CycleArtifacts::build(
            version,
            entities,
            &ctx.points,
            &ctx.labels,
            self.config.tuning.artifact_preview_chars,
        );
        if let Err(err) = self.services.render_artifacts(&artifacts).await {
            warn!(version, error = %err, "artifact rendering failed; snapshot already published");
        }

        let report = CycleReport {
            version,
            entity_count: entities.len(),
            topic_count: artifacts.topics.iter().filter(|t| t.label >= 0).count(),
        };

        info!(
            version,
            entity_count = report.entity_count,
            topic_count = report.topic_count,
            total_ms = Self::duration_millis(cycle_started.elapsed()),
            reduce_ms,
            classify_ms,
            publish_ms,
            "clustering cycle finished"
        );

        Ok(report)
    }
}
