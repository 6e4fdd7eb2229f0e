use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    Memory,
    S3,
}

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    OpenAI,
    #[default]
    FastEmbed,
    Hashed,
}

#[derive(Clone, Deserialize, Debug)]
#[serde(default)]
pub struct AppConfig {
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    pub http_port: u16,

    pub redis_url: String,
    pub notification_channel: String,
    /// Upper bound on a single wait for the next notification.
    pub notification_poll_ms: u64,

    pub storage: StorageKind,
    pub data_dir: String,
    pub s3_bucket: String,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,

    pub embedding_backend: EmbeddingBackend,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: u32,
    pub openai_api_key: String,
    pub openai_base_url: String,

    pub topic_similarity_threshold: f32,
    pub topic_refine_iterations: usize,
    pub artifacts_prefix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            surrealdb_address: "ws://127.0.0.1:8000".to_string(),
            surrealdb_username: "root".to_string(),
            surrealdb_password: "root".to_string(),
            surrealdb_namespace: "inbrief".to_string(),
            surrealdb_database: "clustering".to_string(),
            http_port: 8081,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            notification_channel: "inbrief".to_string(),
            notification_poll_ms: 1_000,
            storage: StorageKind::Local,
            data_dir: "./data".to_string(),
            s3_bucket: "inbrief".to_string(),
            s3_endpoint: None,
            s3_region: "us-east-1".to_string(),
            s3_access_key: None,
            s3_secret_key: None,
            embedding_backend: EmbeddingBackend::FastEmbed,
            embedding_model: None,
            embedding_dimensions: 384,
            openai_api_key: String::new(),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            topic_similarity_threshold: 0.55,
            topic_refine_iterations: 3,
            artifacts_prefix: "static".to_string(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
