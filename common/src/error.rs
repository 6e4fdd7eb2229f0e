use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),
    #[error("Notification channel error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Malformed batch {batch_id}: {reason}")]
    MalformedBatch { batch_id: String, reason: String },
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Clustering error: {0}")]
    Clustering(String),
    #[error("Notification channel closed: {0}")]
    ChannelClosed(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

/// Recoverable failure classes the ingestion worker logs and moves past.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverableKind {
    Resolution,
    MalformedPayload,
    Embedding,
    Pipeline,
    Other,
}

impl RecoverableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolution => "resolution",
            Self::MalformedPayload => "malformed_payload",
            Self::Embedding => "embedding",
            Self::Pipeline => "pipeline",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Log, drop the message and keep consuming.
    Recoverable(RecoverableKind),
    /// Stop the worker; continuing would spin without making progress.
    Fatal,
}

impl AppError {
    /// Policy table for the ingestion worker.
    ///
    /// Snapshot store and notification transport failures escalate, everything that
    /// is scoped to a single message is recovered locally.
    pub fn disposition(&self) -> ErrorDisposition {
        match self {
            Self::Database(_) | Self::Redis(_) | Self::ChannelClosed(_) => ErrorDisposition::Fatal,
            Self::ObjectStore(_) | Self::NotFound(_) => {
                ErrorDisposition::Recoverable(RecoverableKind::Resolution)
            }
            Self::Serde(_) | Self::Validation(_) | Self::MalformedBatch { .. } => {
                ErrorDisposition::Recoverable(RecoverableKind::MalformedPayload)
            }
            Self::Embedding(_) | Self::OpenAI(_) => {
                ErrorDisposition::Recoverable(RecoverableKind::Embedding)
            }
            Self::Clustering(_) | Self::Join(_) => {
                ErrorDisposition::Recoverable(RecoverableKind::Pipeline)
            }
            Self::Io(_) | Self::Anyhow(_) | Self::InternalError(_) => {
                ErrorDisposition::Recoverable(RecoverableKind::Other)
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.disposition(), ErrorDisposition::Fatal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_scoped_errors_are_recoverable() {
        let malformed = AppError::MalformedBatch {
            batch_id: "17".into(),
            reason: "expected array".into(),
        };
        assert_eq!(
            malformed.disposition(),
            ErrorDisposition::Recoverable(RecoverableKind::MalformedPayload)
        );
        assert_eq!(
            AppError::NotFound("17.json".into()).disposition(),
            ErrorDisposition::Recoverable(RecoverableKind::Resolution)
        );
        assert_eq!(
            AppError::Clustering("too few documents".into()).disposition(),
            ErrorDisposition::Recoverable(RecoverableKind::Pipeline)
        );
    }

    #[test]
    fn transport_failures_escalate() {
        assert!(AppError::ChannelClosed("subscription ended".into()).is_fatal());
        assert!(!AppError::Embedding("model offline".into()).is_fatal());
    }
}
