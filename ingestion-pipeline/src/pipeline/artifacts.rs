use std::collections::BTreeMap;

use common::storage::types::entity::{Entity, TopicLabel};
use serde::Serialize;

use crate::utils::projection::Point2D;

/// One corpus document placed on the 2D map.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentPoint {
    pub reference: String,
    pub preview: String,
    pub x: f32,
    pub y: f32,
    pub label: TopicLabel,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TopicSummary {
    pub label: TopicLabel,
    pub size: usize,
}

/// Visualization outputs of one successful cycle, written next to the batches.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CycleArtifacts {
    pub version: u64,
    pub documents: Vec<DocumentPoint>,
    pub topics: Vec<TopicSummary>,
}

impl CycleArtifacts {
    pub fn build(
        version: u64,
        entities: &[Entity],
        points: &[Point2D],
        labels: &[TopicLabel],
        preview_chars: usize,
    ) -> Self {
        let documents = entities
            .iter()
            .zip(points)
            .zip(labels)
            .map(|((entity, point), label)| DocumentPoint {
                reference: entity.reference.clone(),
                preview: preview(&entity.text, preview_chars),
                x: point[0],
                y: point[1],
                label: *label,
            })
            .collect();

        let mut sizes: BTreeMap<TopicLabel, usize> = BTreeMap::new();
        for label in labels {
            *sizes.entry(*label).or_default() += 1;
        }
        let topics = sizes
            .into_iter()
            .map(|(label, size)| TopicSummary { label, size })
            .collect();

        Self {
            version,
            documents,
            topics,
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flattened = text.replace('\n', " ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut truncated: String = flattened.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
