use common::{
    error::AppError,
    storage::{store::StorageManager, types::entity::RawDocument},
};
use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::{debug, warn};

/// Turns a batch identifier from the notification channel into its documents.
///
/// Batch `N` lives at object `N.json` in the batch store.
#[derive(Clone)]
pub struct BatchResolver {
    storage: StorageManager,
    max_retries: usize,
}

impl BatchResolver {
    pub fn new(storage: StorageManager) -> Self {
        Self {
            storage,
            max_retries: 3,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn object_key(batch_id: &str) -> Result<String, AppError> {
        let id = batch_id.trim();
        if id.is_empty() {
            return Err(AppError::Validation("batch id is empty".into()));
        }
        if id.contains('/') || id == "." || id == ".." {
            return Err(AppError::Validation(format!(
                "batch id '{id}' is not a plain object name"
            )));
        }
        Ok(format!("{id}.json"))
    }

    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, batch_id: &str) -> Result<Vec<RawDocument>, AppError> {
        let key = Self::object_key(batch_id)?;
        let strategy = ExponentialBackoff::from_millis(100)
            .map(jitter)
            .take(self.max_retries);

        let body = RetryIf::spawn(
            strategy,
            || self.storage.get(&key),
            |err: &object_store::Error| {
                let transient = !matches!(err, object_store::Error::NotFound { .. });
                if transient {
                    warn!(%key, error = %err, "batch fetch failed; retrying");
                }
                transient
            },
        )
        .await
        .map_err(|err| match err {
            object_store::Error::NotFound { .. } => {
                AppError::NotFound(format!("batch object {key}"))
            }
            other => AppError::ObjectStore(other),
        })?;

        let documents = RawDocument::parse_batch(batch_id, &body)?;
        debug!(%key, document_count = documents.len(), "batch resolved");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn object_keys_follow_producer_naming() {
        assert_eq!(
            BatchResolver::object_key("1718000000000000000").expect("valid"),
            "1718000000000000000.json"
        );
        assert!(BatchResolver::object_key("  ").is_err());
        assert!(BatchResolver::object_key("../etc/passwd").is_err());
        assert!(BatchResolver::object_key("..").is_err());
        assert!(BatchResolver::object_key(".").is_err());
        assert_eq!(
            BatchResolver::object_key("a..b").expect("dots inside an id"),
            "a..b.json"
        );
    }

    #[tokio::test]
    async fn resolves_stored_batch() {
        let storage = StorageManager::memory();
        storage
            .put(
                "42.json",
                Bytes::from_static(br#"[{"text":"a","ts":"2024-01-02"},{"text":"b","ts":null}]"#),
            )
            .await
            .expect("seed batch");

        let docs = BatchResolver::new(storage).resolve("42").await.expect("resolve");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "a");
    }

    #[tokio::test]
    async fn missing_batch_is_not_found() {
        let resolver = BatchResolver::new(StorageManager::memory()).with_max_retries(0);
        let err = resolver.resolve("404").await.expect_err("missing");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_reported() {
        let storage = StorageManager::memory();
        storage
            .put("9.json", Bytes::from_static(b"not json"))
            .await
            .expect("seed batch");

        let err = BatchResolver::new(storage)
            .resolve("9")
            .await
            .expect_err("malformed");
        assert!(matches!(err, AppError::MalformedBatch { .. }));
    }
}
