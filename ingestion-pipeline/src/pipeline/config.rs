use common::utils::config::AppConfig;

#[derive(Debug, Clone)]
pub struct ClusteringTuning {
    /// Minimum cosine similarity for a document to join an existing topic.
    pub similarity_threshold: f32,
    pub refine_iterations: usize,
    pub projection_iterations: usize,
    pub artifact_preview_chars: usize,
}

impl Default for ClusteringTuning {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.55,
            refine_iterations: 3,
            projection_iterations: 64,
            artifact_preview_chars: 120,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub tuning: ClusteringTuning,
    /// Object-store prefix for the visualization artifacts.
    pub artifacts_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            tuning: ClusteringTuning::default(),
            artifacts_prefix: "static".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: ClusteringTuning {
                similarity_threshold: config.topic_similarity_threshold,
                refine_iterations: config.topic_refine_iterations,
                ..ClusteringTuning::default()
            },
            artifacts_prefix: config.artifacts_prefix.trim_end_matches('/').to_string(),
        }
    }
}
