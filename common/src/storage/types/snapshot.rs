use crate::stored_object;

use super::entity::{Entity, TopicLabel};

stored_object!(SnapshotRecord, "clustering_snapshot", {
    version: u64,
    entity_count: u64,
    label_count: u64,
    payload: String
});

/// Serialized body of a [`SnapshotRecord`]. Entities and labels travel together so
/// a single write publishes both.
#[derive(Debug, Serialize)]
pub(crate) struct SnapshotPayloadRef<'a> {
    pub entities: &'a [Entity],
    pub labels: &'a [TopicLabel],
}

#[derive(Debug, Deserialize)]
pub(crate) struct SnapshotPayload {
    pub entities: Vec<Entity>,
    pub labels: Vec<TopicLabel>,
}

/// The latest published (corpus, labels) pair as readers see it.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub version: u64,
    pub published_at: DateTime<Utc>,
    pub entities: Vec<Entity>,
    pub labels: Vec<TopicLabel>,
}

impl Snapshot {
    pub fn is_aligned(&self) -> bool {
        self.entities.len() == self.labels.len()
    }
}
