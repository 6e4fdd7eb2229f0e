use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{
            entity::{Entity, TopicLabel},
            snapshot::{Snapshot, SnapshotPayload, SnapshotPayloadRef, SnapshotRecord},
        },
    },
};

/// Durable home of the latest published snapshot.
///
/// Entities and labels are serialized into one composite record and written with a
/// single upsert, so a reader observes either the previous snapshot or the new one,
/// never a mix. There is one writer (the ingestion worker); readers never lock.
#[derive(Clone)]
pub struct SnapshotCache {
    db: Arc<SurrealDbClient>,
}

impl SnapshotCache {
    pub const RECORD_ID: &'static str = "latest";

    pub fn new(db: Arc<SurrealDbClient>) -> Self {
        Self { db }
    }

    /// Publishes a new snapshot and returns its version.
    ///
    /// Refuses misaligned input, so every stored snapshot satisfies
    /// `entities.len() == labels.len()`. Refuses non-finite embeddings, which
    /// would make the stored payload unreadable.
    pub async fn publish(
        &self,
        entities: &[Entity],
        labels: &[TopicLabel],
    ) -> Result<u64, AppError> {
        if entities.len() != labels.len() {
            return Err(AppError::Validation(format!(
                "refusing to publish {} entities with {} labels",
                entities.len(),
                labels.len()
            )));
        }

        if let Some(entity) = entities.iter().find(|entity| !entity.has_finite_embedding()) {
            return Err(AppError::Validation(format!(
                "refusing to publish non-finite embedding for {}",
                entity.reference
            )));
        }

        let previous: Option<SnapshotRecord> = self.db.get_item(Self::RECORD_ID).await?;
        let version = previous
            .as_ref()
            .map_or(1, |record| record.version.saturating_add(1));
        let now = Utc::now();

        let payload = serde_json::to_string(&SnapshotPayloadRef { entities, labels })?;
        let record = SnapshotRecord {
            id: Self::RECORD_ID.to_string(),
            created_at: previous.map_or(now, |record| record.created_at),
            updated_at: now,
            version,
            entity_count: entities.len() as u64,
            label_count: labels.len() as u64,
            payload,
        };

        self.db.upsert_item(record).await?;

        info!(
            version,
            entity_count = entities.len(),
            "snapshot published"
        );
        Ok(version)
    }

    /// Loads the latest snapshot, `None` when nothing has been published yet.
    pub async fn load(&self) -> Result<Option<Snapshot>, AppError> {
        let Some(record) = self.db.get_item::<SnapshotRecord>(Self::RECORD_ID).await? else {
            debug!("no snapshot published yet");
            return Ok(None);
        };

        let SnapshotPayload { entities, labels } = serde_json::from_str(&record.payload)?;

        Ok(Some(Snapshot {
            version: record.version,
            published_at: record.updated_at,
            entities,
            labels,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::entity::RawDocument;
    use serde_json::Map;
    use uuid::Uuid;

    async fn cache() -> SnapshotCache {
        let db = SurrealDbClient::memory("snapshot_test", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");
        SnapshotCache::new(Arc::new(db))
    }

    fn entity(batch: &str, position: usize, text: &str, ts: Option<&str>) -> Entity {
        Entity::from_raw(
            batch,
            position,
            RawDocument {
                text: text.into(),
                ts: ts.map(Into::into),
                passthrough: Map::new(),
            },
            vec![0.25, -0.5, 1.0],
        )
    }

    #[tokio::test]
    async fn load_without_publish_is_none() {
        let cache = cache().await;
        assert!(cache.load().await.expect("load succeeds").is_none());
    }

    #[tokio::test]
    async fn publish_then_load_returns_verbatim() {
        let cache = cache().await;
        let entities = vec![
            entity("1", 0, "a", Some("2024-01-02")),
            entity("1", 1, "b", None),
        ];
        let labels = vec![3, -1];

        let version = cache.publish(&entities, &labels).await.expect("publish");
        assert_eq!(version, 1);

        let snapshot = cache.load().await.expect("load").expect("snapshot present");
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.entities, entities);
        assert_eq!(snapshot.labels, labels);
        assert!(snapshot.is_aligned());
    }

    #[tokio::test]
    async fn republish_replaces_and_bumps_version() {
        let cache = cache().await;
        let first = vec![entity("1", 0, "a", None)];
        cache.publish(&first, &[0]).await.expect("first publish");

        let mut second = first.clone();
        second.push(entity("2", 0, "b", None));
        let version = cache.publish(&second, &[1, 1]).await.expect("second publish");
        assert_eq!(version, 2);

        let snapshot = cache.load().await.expect("load").expect("snapshot present");
        assert_eq!(snapshot.entities.len(), 2);
        assert_eq!(snapshot.labels, vec![1, 1]);
    }

    #[tokio::test]
    async fn misaligned_publish_is_rejected_and_keeps_previous() {
        let cache = cache().await;
        let entities = vec![entity("1", 0, "a", None)];
        cache.publish(&entities, &[0]).await.expect("publish");

        let err = cache
            .publish(&entities, &[0, 1])
            .await
            .expect_err("length mismatch");
        assert!(matches!(err, AppError::Validation(_)));

        let snapshot = cache.load().await.expect("load").expect("snapshot present");
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.labels, vec![0]);
    }

    #[tokio::test]
    async fn non_finite_embedding_is_rejected_and_keeps_previous() {
        let cache = cache().await;
        let entities = vec![entity("1", 0, "a", None)];
        cache.publish(&entities, &[0]).await.expect("publish");

        let mut poisoned = entity("2", 0, "b", None);
        poisoned.embedding = vec![f32::NAN, 1.0];
        let err = cache
            .publish(&[poisoned], &[0])
            .await
            .expect_err("non-finite embedding");
        assert!(matches!(err, AppError::Validation(_)));

        let snapshot = cache.load().await.expect("load").expect("snapshot present");
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.entities, entities);
    }
}
