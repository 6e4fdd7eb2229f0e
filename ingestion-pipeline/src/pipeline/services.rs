use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use common::{
    error::AppError,
    storage::{store::StorageManager, types::entity::TopicLabel},
    utils::embedding::EmbeddingProvider,
};
use tracing::debug;

use super::{artifacts::CycleArtifacts, config::PipelineConfig};
use crate::utils::{
    projection::{principal_projection, Point2D},
    topics::CentroidTopicModel,
};

/// Corpus embeddings shared between the cycle and its blocking workers.
pub type EmbeddingMatrix = Arc<[Vec<f32>]>;

/// The capabilities a clustering cycle needs. Implementations must return exactly one
/// output per input, in input order.
#[async_trait]
pub trait ClusteringServices: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError>;

    async fn reduce(&self, embeddings: EmbeddingMatrix) -> Result<Vec<Point2D>, AppError>;

    async fn fit_topics(
        &self,
        texts: &[String],
        embeddings: EmbeddingMatrix,
    ) -> Result<Vec<TopicLabel>, AppError>;

    async fn render_artifacts(&self, artifacts: &CycleArtifacts) -> Result<(), AppError>;
}

pub struct DefaultClusteringServices {
    embedding_provider: Arc<EmbeddingProvider>,
    storage: StorageManager,
    config: PipelineConfig,
}

impl DefaultClusteringServices {
    pub fn new(
        embedding_provider: Arc<EmbeddingProvider>,
        storage: StorageManager,
        config: PipelineConfig,
    ) -> Self {
        Self {
            embedding_provider,
            storage,
            config,
        }
    }

    async fn put_json<T: serde::Serialize + ?Sized>(
        &self,
        name: &str,
        value: &T,
    ) -> Result<(), AppError> {
        let location = format!("{}/{name}", self.config.artifacts_prefix);
        let body = serde_json::to_vec(value)?;
        self.storage.put(&location, Bytes::from(body)).await?;
        debug!(%location, "artifact written");
        Ok(())
    }
}

#[async_trait]
impl ClusteringServices for DefaultClusteringServices {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self
            .embedding_provider
            .embed_batch(texts.to_vec())
            .await
            .map_err(|err| AppError::Embedding(err.to_string()))?;
        if embeddings.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "{} backend returned {} embeddings for {} texts",
                self.embedding_provider.backend_label(),
                embeddings.len(),
                texts.len()
            )));
        }
        Ok(embeddings)
    }

    async fn reduce(&self, embeddings: EmbeddingMatrix) -> Result<Vec<Point2D>, AppError> {
        let iterations = self.config.tuning.projection_iterations;
        tokio::task::spawn_blocking(move || principal_projection(&embeddings, iterations)).await?
    }

    async fn fit_topics(
        &self,
        _texts: &[String],
        embeddings: EmbeddingMatrix,
    ) -> Result<Vec<TopicLabel>, AppError> {
        let model = CentroidTopicModel::new(
            self.config.tuning.similarity_threshold,
            self.config.tuning.refine_iterations,
        );
        tokio::task::spawn_blocking(move || model.fit(&embeddings)).await?
    }

    async fn render_artifacts(&self, artifacts: &CycleArtifacts) -> Result<(), AppError> {
        self.put_json("topics.json", &artifacts.topics).await?;
        self.put_json("documents.json", &artifacts.documents).await
    }
}
