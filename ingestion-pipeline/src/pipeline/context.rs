use common::{
    error::AppError,
    storage::{
        snapshot::SnapshotCache,
        types::entity::{Entity, TopicLabel},
    },
};
use tracing::error;

use super::services::{ClusteringServices, EmbeddingMatrix};
use crate::utils::projection::Point2D;

pub struct CycleContext<'a> {
    pub entities: &'a [Entity],
    pub services: &'a dyn ClusteringServices,
    pub snapshots: &'a SnapshotCache,
    pub texts: Vec<String>,
    pub embeddings: EmbeddingMatrix,
    pub points: Vec<Point2D>,
    pub labels: Vec<TopicLabel>,
    pub version: Option<u64>,
}

impl<'a> CycleContext<'a> {
    pub fn new(
        entities: &'a [Entity],
        services: &'a dyn ClusteringServices,
        snapshots: &'a SnapshotCache,
    ) -> Self {
        Self {
            entities,
            services,
            snapshots,
            texts: entities.iter().map(|e| e.text.clone()).collect(),
            embeddings: entities.iter().map(|e| e.embedding.clone()).collect(),
            points: Vec::new(),
            labels: Vec::new(),
            version: None,
        }
    }

    pub fn corpus_len(&self) -> usize {
        self.entities.len()
    }

    pub fn abort(&mut self, err: AppError) -> AppError {
        error!(
            corpus_len = self.corpus_len(),
            error = %err,
            "clustering cycle aborted"
        );
        err
    }
}
