use std::collections::HashSet;

use common::{
    error::AppError,
    storage::{
        snapshot::SnapshotCache,
        types::entity::{Entity, RawDocument},
    },
};
use tracing::{debug, info};

use crate::pipeline::ClusteringServices;

/// The worker's in-memory corpus, in insertion order.
///
/// Entities are only ever appended. Persistence happens through the snapshot the
/// coordinator publishes, which is also where a restarted worker resumes from.
#[derive(Debug, Default, Clone)]
pub struct CorpusStore {
    entities: Vec<Entity>,
    batches: HashSet<String>,
}

impl CorpusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entities(entities: Vec<Entity>) -> Self {
        let batches = entities
            .iter()
            .filter_map(|entity| batch_of(&entity.reference))
            .map(str::to_string)
            .collect();
        Self { entities, batches }
    }

    /// Resumes from the last published snapshot, or starts empty.
    pub async fn load(snapshots: &SnapshotCache) -> Result<Self, AppError> {
        match snapshots.load().await? {
            Some(snapshot) => {
                info!(
                    version = snapshot.version,
                    entity_count = snapshot.entities.len(),
                    "corpus resumed from snapshot"
                );
                Ok(Self::from_entities(snapshot.entities))
            }
            None => {
                info!("no snapshot found; starting with an empty corpus");
                Ok(Self::new())
            }
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Whether entities from this batch are already part of the corpus.
    pub fn contains_batch(&self, batch_id: &str) -> bool {
        self.batches.contains(batch_id)
    }

    /// Dimension of the stored embeddings, if the corpus has any.
    pub fn embedding_dimension(&self) -> Option<usize> {
        self.entities.first().map(|entity| entity.embedding.len())
    }

    /// Embeds exactly the new batch and appends it after the existing entities.
    ///
    /// Either the whole batch is appended or, on error, the corpus is left as it was.
    pub async fn append(
        &mut self,
        batch_id: &str,
        documents: Vec<RawDocument>,
        services: &dyn ClusteringServices,
        expected_dimension: usize,
    ) -> Result<usize, AppError> {
        if documents.is_empty() {
            debug!(%batch_id, "empty batch; nothing to append");
            return Ok(0);
        }

        let texts: Vec<String> = documents.iter().map(|doc| doc.text.clone()).collect();
        let embeddings = services.embed(&texts).await?;
        if embeddings.len() != documents.len() {
            return Err(AppError::Embedding(format!(
                "received {} embeddings for {} documents",
                embeddings.len(),
                documents.len()
            )));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != expected_dimension) {
            return Err(AppError::Embedding(format!(
                "embedding has dimension {}, expected {expected_dimension}",
                bad.len()
            )));
        }
        if embeddings
            .iter()
            .any(|embedding| embedding.iter().any(|value| !value.is_finite()))
        {
            return Err(AppError::Embedding(format!(
                "embedding backend returned non-finite values for batch {batch_id}"
            )));
        }

        let appended = documents.len();
        self.entities.extend(
            documents
                .into_iter()
                .zip(embeddings)
                .enumerate()
                .map(|(position, (raw, embedding))| {
                    Entity::from_raw(batch_id, position, raw, embedding)
                }),
        );
        self.batches.insert(batch_id.to_string());

        debug!(%batch_id, appended, corpus_len = self.len(), "batch appended to corpus");
        Ok(appended)
    }
}

fn batch_of(reference: &str) -> Option<&str> {
    reference.rsplit_once(':').map(|(batch, _)| batch)
}
