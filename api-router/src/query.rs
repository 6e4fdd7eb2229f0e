use std::{cmp::Ordering, collections::HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use common::{
    error::AppError,
    storage::{
        snapshot::SnapshotCache,
        types::{
            entity::{PublicEntity, TopicLabel},
            snapshot::Snapshot,
        },
    },
};
use serde::Serialize;
use tracing::warn;

const TITLE_MAX_CHARS: usize = 80;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimelineItem {
    pub datetime: String,
    pub text: String,
}

/// Entities sharing one topic label, shaped for the reader.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Story {
    pub id: u64,
    pub title: String,
    pub summary: String,
    pub timeline: Vec<TimelineItem>,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StoriesResponse {
    pub stories: Vec<Story>,
}

/// Raw snapshot view: entities without embeddings plus their labels.
#[derive(Debug, Serialize)]
pub struct SummaryResponse<'a> {
    pub entities: Vec<PublicEntity<'a>>,
    pub labels: &'a [TopicLabel],
}

/// Read side over the published snapshot. Holds no state of its own.
#[derive(Clone)]
pub struct QueryService {
    snapshots: SnapshotCache,
}

impl QueryService {
    pub fn new(snapshots: SnapshotCache) -> Self {
        Self { snapshots }
    }

    pub async fn snapshot(&self) -> Result<Option<Snapshot>, AppError> {
        self.snapshots.load().await
    }

    /// Stories for the latest snapshot; empty when nothing has been published.
    pub async fn get_stories(&self) -> Result<Vec<Story>, AppError> {
        Ok(self
            .snapshot()
            .await?
            .map(|snapshot| group_into_stories(&snapshot))
            .unwrap_or_default())
    }
}

pub fn summary(snapshot: Option<&Snapshot>) -> SummaryResponse<'_> {
    match snapshot {
        Some(snapshot) => SummaryResponse {
            entities: snapshot.entities.iter().map(|e| e.public_view()).collect(),
            labels: &snapshot.labels,
        },
        None => SummaryResponse {
            entities: Vec::new(),
            labels: &[],
        },
    }
}

/// Groups entities by label in first-seen order.
///
/// Entities past the end of the label list have no label and are left out.
pub fn group_into_stories(snapshot: &Snapshot) -> Vec<Story> {
    if !snapshot.is_aligned() {
        warn!(
            version = snapshot.version,
            entity_count = snapshot.entities.len(),
            label_count = snapshot.labels.len(),
            "snapshot entities and labels differ in length; truncating"
        );
    }

    let mut groups: Vec<(TopicLabel, Vec<usize>)> = Vec::new();
    let mut slots: HashMap<TopicLabel, usize> = HashMap::new();
    for (idx, label) in snapshot.labels.iter().enumerate().take(snapshot.entities.len()) {
        let slot = *slots.entry(*label).or_insert_with(|| {
            groups.push((*label, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(idx);
    }

    groups
        .into_iter()
        .zip(1u64..)
        .map(|((label, members), id)| {
            let entities: Vec<_> = members
                .iter()
                .filter_map(|idx| snapshot.entities.get(*idx))
                .collect();

            let mut timeline: Vec<TimelineItem> = entities
                .iter()
                .filter_map(|entity| {
                    entity.timestamp().map(|ts| TimelineItem {
                        datetime: ts.to_string(),
                        text: entity.text.clone(),
                    })
                })
                .collect();
            timeline.sort_by(|a, b| compare_timestamps(&b.datetime, &a.datetime));

            Story {
                id,
                title: story_title(label, entities.first().map(|e| e.text.as_str())),
                summary: format!("{} related posts", entities.len()),
                timeline,
                tags: vec![label.to_string()],
            }
        })
        .collect()
}

fn story_title(label: TopicLabel, lead_text: Option<&str>) -> String {
    let first_line = lead_text
        .and_then(|text| text.lines().map(str::trim).find(|line| !line.is_empty()));
    match first_line {
        Some(line) if line.chars().count() > TITLE_MAX_CHARS => {
            let mut title: String = line.chars().take(TITLE_MAX_CHARS).collect();
            title.push_str("...");
            title
        }
        Some(line) => line.to_string(),
        None => format!("Topic {label}"),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Parsed timestamps order chronologically and above unparseable ones, which fall
/// back to plain string order.
fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (parse_timestamp(a), parse_timestamp(b)) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::storage::types::entity::{Entity, RawDocument};
    use serde_json::Map;

    fn entity(position: usize, text: &str, ts: Option<&str>) -> Entity {
        Entity::from_raw(
            "1",
            position,
            RawDocument {
                text: text.into(),
                ts: ts.map(Into::into),
                passthrough: Map::new(),
            },
            vec![0.1, 0.2],
        )
    }

    fn snapshot(entities: Vec<Entity>, labels: Vec<TopicLabel>) -> Snapshot {
        Snapshot {
            version: 1,
            published_at: Utc::now(),
            entities,
            labels,
        }
    }

    #[test]
    fn groups_by_label_with_descending_timeline() {
        let snapshot = snapshot(
            vec![
                entity(0, "b", Some("2024-01-01")),
                entity(1, "a", Some("2024-01-02")),
                entity(2, "c", None),
            ],
            vec![1, 1, 2],
        );

        let stories = group_into_stories(&snapshot);
        assert_eq!(stories.len(), 2);

        assert_eq!(stories[0].id, 1);
        assert_eq!(stories[0].tags, vec!["1".to_string()]);
        let texts: Vec<&str> = stories[0].timeline.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
        assert_eq!(stories[0].timeline[0].datetime, "2024-01-02");

        assert_eq!(stories[1].id, 2);
        assert_eq!(stories[1].tags, vec!["2".to_string()]);
        assert!(stories[1].timeline.is_empty());
    }

    #[test]
    fn stories_follow_first_seen_label_order() {
        let snapshot = snapshot(
            vec![entity(0, "x", None), entity(1, "y", None), entity(2, "z", None)],
            vec![5, -1, 5],
        );
        let tags: Vec<String> = group_into_stories(&snapshot)
            .into_iter()
            .flat_map(|story| story.tags)
            .collect();
        assert_eq!(tags, vec!["5".to_string(), "-1".to_string()]);
    }

    #[test]
    fn interleaved_labels_collect_all_members() {
        let snapshot = snapshot(
            vec![
                entity(0, "p", None),
                entity(1, "q", None),
                entity(2, "r", None),
                entity(3, "s", None),
                entity(4, "t", None),
            ],
            vec![2, 1, 2, 1, 3],
        );
        let stories = group_into_stories(&snapshot);
        let shape: Vec<(String, String)> = stories
            .iter()
            .map(|story| (story.tags[0].clone(), story.summary.clone()))
            .collect();
        assert_eq!(
            shape,
            vec![
                ("2".to_string(), "2 related posts".to_string()),
                ("1".to_string(), "2 related posts".to_string()),
                ("3".to_string(), "1 related posts".to_string()),
            ]
        );
        assert_eq!(stories[0].title, "p");
        assert_eq!(stories[1].title, "q");
    }

    #[test]
    fn short_label_list_truncates_entities() {
        let snapshot = snapshot(
            vec![
                entity(0, "kept", Some("2024-01-01")),
                entity(1, "dropped", Some("2024-01-02")),
            ],
            vec![0],
        );
        let stories = group_into_stories(&snapshot);
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].timeline.len(), 1);
        assert_eq!(stories[0].timeline[0].text, "kept");
    }

    #[test]
    fn titles_use_lead_text_or_label() {
        assert_eq!(story_title(3, Some("\n  Flood in the north\nmore")), "Flood in the north");
        assert_eq!(story_title(3, Some("   ")), "Topic 3");
        let long = "x".repeat(200);
        assert_eq!(story_title(0, Some(&long)).chars().count(), TITLE_MAX_CHARS + 3);
    }

    #[test]
    fn mixed_timestamp_formats_sort_chronologically() {
        let snapshot = snapshot(
            vec![
                entity(0, "date only", Some("2024-01-02")),
                entity(1, "rfc3339", Some("2024-01-02T10:00:00+00:00")),
                entity(2, "unparsed", Some("yesterday")),
                entity(3, "older", Some("2023-12-31 23:59:59")),
            ],
            vec![0, 0, 0, 0],
        );
        let texts: Vec<String> = group_into_stories(&snapshot)[0]
            .timeline
            .iter()
            .map(|t| t.text.clone())
            .collect();
        assert_eq!(texts, vec!["rfc3339", "date only", "older", "unparsed"]);
    }

    #[test]
    fn summary_without_snapshot_is_empty() {
        let value = serde_json::to_value(summary(None)).expect("serializes");
        assert_eq!(value, serde_json::json!({"entities": [], "labels": []}));
    }
}
