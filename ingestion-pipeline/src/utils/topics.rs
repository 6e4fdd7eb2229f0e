//! Centroid-based topic assignment over document embeddings.

use common::{error::AppError, storage::types::entity::TopicLabel};

use super::projection::dot;

/// Label given to documents that do not share a topic with any other document.
pub const OUTLIER_LABEL: TopicLabel = -1;

/// Groups embeddings by cosine similarity to running topic centroids.
///
/// A leader pass opens a new topic whenever a document is further than the
/// threshold from every existing centroid, then refinement passes move documents
/// to their closest centroid until assignments settle. Topics are numbered in
/// order of first appearance in the corpus; single-member topics become outliers.
#[derive(Debug, Clone)]
pub struct CentroidTopicModel {
    pub threshold: f32,
    pub refine_iterations: usize,
}

impl CentroidTopicModel {
    pub fn new(threshold: f32, refine_iterations: usize) -> Self {
        Self {
            threshold,
            refine_iterations,
        }
    }

    pub fn fit(&self, embeddings: &[Vec<f32>]) -> Result<Vec<TopicLabel>, AppError> {
        let Some(first) = embeddings.first() else {
            return Ok(Vec::new());
        };
        let dimension = first.len();
        if embeddings.iter().any(|e| e.len() != dimension) {
            return Err(AppError::Clustering(
                "embeddings must share one dimension".into(),
            ));
        }

        let unit: Vec<Vec<f32>> = embeddings.iter().map(|e| unit_vector(e)).collect();

        let mut assignments = Vec::with_capacity(unit.len());
        let mut centroids: Vec<Vec<f32>> = Vec::new();
        for vector in &unit {
            match closest(&centroids, vector) {
                Some((idx, similarity)) if similarity >= self.threshold => {
                    if let Some(centroid) = centroids.get_mut(idx) {
                        *centroid = unit_vector(
                            &centroid.iter().zip(vector).map(|(c, v)| c + v).collect::<Vec<_>>(),
                        );
                    }
                    assignments.push(idx);
                }
                _ => {
                    centroids.push(vector.clone());
                    assignments.push(centroids.len().saturating_sub(1));
                }
            }
        }

        for _ in 0..self.refine_iterations {
            centroids = recompute_centroids(&unit, &assignments, centroids.len(), dimension);
            let mut changed = false;
            for (vector, assignment) in unit.iter().zip(assignments.iter_mut()) {
                if let Some((idx, _)) = closest(&centroids, vector) {
                    if idx != *assignment {
                        *assignment = idx;
                        changed = true;
                    }
                }
            }
            if !changed {
                break;
            }
        }

        Ok(relabel(&assignments, centroids.len()))
    }
}

fn recompute_centroids(
    unit: &[Vec<f32>],
    assignments: &[usize],
    topic_count: usize,
    dimension: usize,
) -> Vec<Vec<f32>> {
    let mut sums = vec![vec![0.0f32; dimension]; topic_count];
    for (vector, &topic) in unit.iter().zip(assignments) {
        if let Some(sum) = sums.get_mut(topic) {
            for (acc, value) in sum.iter_mut().zip(vector) {
                *acc += value;
            }
        }
    }
    sums.iter().map(|sum| unit_vector(sum)).collect()
}

/// Renumbers topics by first appearance and folds singletons into the outlier label.
fn relabel(assignments: &[usize], topic_count: usize) -> Vec<TopicLabel> {
    let mut sizes = vec![0usize; topic_count];
    for &topic in assignments {
        if let Some(size) = sizes.get_mut(topic) {
            *size += 1;
        }
    }

    let mut mapping: Vec<Option<TopicLabel>> = vec![None; topic_count];
    let mut next: TopicLabel = 0;
    assignments
        .iter()
        .map(|&topic| {
            if sizes.get(topic).copied().unwrap_or(0) < 2 {
                return OUTLIER_LABEL;
            }
            match mapping.get_mut(topic) {
                Some(Some(label)) => *label,
                Some(slot) => {
                    let label = next;
                    next += 1;
                    *slot = Some(label);
                    label
                }
                None => OUTLIER_LABEL,
            }
        })
        .collect()
}

fn closest(centroids: &[Vec<f32>], vector: &[f32]) -> Option<(usize, f32)> {
    centroids
        .iter()
        .enumerate()
        .map(|(idx, centroid)| (idx, dot(centroid, vector)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

fn unit_vector(vector: &[f32]) -> Vec<f32> {
    let norm = dot(vector, vector).sqrt();
    if norm <= f32::EPSILON {
        return vector.to_vec();
    }
    vector.iter().map(|v| v / norm).collect()
}
