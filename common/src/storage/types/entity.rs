use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Integer topic assignment, positionally aligned with the corpus.
pub type TopicLabel = i64;

/// Passthrough keys that would collide with fields owned by [`Entity`].
const RESERVED_KEYS: [&str; 4] = ["reference", "text", "ts", "embedding"];

/// One record of a resolved batch, exactly as the producer wrote it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDocument {
    pub text: String,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

/// One ingested document together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub reference: String,
    pub text: String,
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

/// Borrowed view of an [`Entity`] without its embedding, for read-side output.
#[derive(Debug, Serialize)]
pub struct PublicEntity<'a> {
    pub reference: &'a str,
    pub text: &'a str,
    pub ts: Option<&'a str>,
    #[serde(flatten)]
    pub passthrough: &'a Map<String, Value>,
}

impl RawDocument {
    /// Parses a batch body: a JSON array of `{text, ts, ...}` records.
    pub fn parse_batch(batch_id: &str, body: &[u8]) -> Result<Vec<Self>, AppError> {
        serde_json::from_slice::<Vec<Self>>(body).map_err(|err| AppError::MalformedBatch {
            batch_id: batch_id.to_string(),
            reason: err.to_string(),
        })
    }
}

impl Entity {
    /// Builds an entity from a raw record. The reference is derived from the batch
    /// and the record's position in it, so a redelivered batch maps to the same
    /// references.
    pub fn from_raw(batch_id: &str, position: usize, raw: RawDocument, embedding: Vec<f32>) -> Self {
        let RawDocument {
            text,
            ts,
            mut passthrough,
        } = raw;
        for key in RESERVED_KEYS {
            passthrough.remove(key);
        }

        Self {
            reference: format!("{batch_id}:{position}"),
            text,
            ts,
            embedding,
            passthrough,
        }
    }

    /// Timestamp if present and not blank.
    pub fn timestamp(&self) -> Option<&str> {
        self.ts
            .as_deref()
            .map(str::trim)
            .filter(|ts| !ts.is_empty())
    }

    /// NaN and infinities serialize as `null` and would not load back.
    pub fn has_finite_embedding(&self) -> bool {
        self.embedding.iter().all(|value| value.is_finite())
    }

    pub fn public_view(&self) -> PublicEntity<'_> {
        PublicEntity {
            reference: &self.reference,
            text: &self.text,
            ts: self.ts.as_deref(),
            passthrough: &self.passthrough,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_batch_with_passthrough_fields() {
        let body = json!([
            {"text": "flood warning", "ts": "2024-01-02", "channel": "news", "views": 10},
            {"text": "no timestamp", "ts": null},
            {"text": "missing ts key"}
        ])
        .to_string();

        let docs = RawDocument::parse_batch("42", body.as_bytes()).expect("valid batch");
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].ts.as_deref(), Some("2024-01-02"));
        assert_eq!(docs[0].passthrough.get("channel"), Some(&json!("news")));
        assert!(docs[1].ts.is_none());
        assert!(docs[2].ts.is_none());
    }

    #[test]
    fn malformed_batch_reports_batch_id() {
        let err = RawDocument::parse_batch("7", br#"{"text": "not an array"}"#)
            .expect_err("object is not a batch");
        assert!(matches!(err, AppError::MalformedBatch { batch_id, .. } if batch_id == "7"));
    }

    #[test]
    fn reserved_passthrough_keys_are_dropped() {
        let raw: RawDocument = serde_json::from_value(json!({
            "text": "hello",
            "embedding": [1, 2, 3],
            "reference": "spoofed",
            "author": "desk"
        }))
        .expect("raw document");

        let entity = Entity::from_raw("99", 3, raw, vec![0.5, 0.5]);
        assert_eq!(entity.reference, "99:3");
        assert_eq!(entity.embedding, vec![0.5, 0.5]);
        assert!(!entity.passthrough.contains_key("embedding"));
        assert_eq!(entity.passthrough.get("author"), Some(&json!("desk")));
    }

    #[test]
    fn public_view_omits_embedding() {
        let raw: RawDocument =
            serde_json::from_value(json!({"text": "hello", "ts": "2024-01-01", "author": "desk"}))
                .expect("raw document");
        let entity = Entity::from_raw("1", 0, raw, vec![0.1; 4]);

        let value = serde_json::to_value(entity.public_view()).expect("serializes");
        assert!(value.get("embedding").is_none());
        assert_eq!(value["author"], json!("desk"));
        assert_eq!(value["text"], json!("hello"));
    }

    #[test]
    fn blank_timestamp_counts_as_missing() {
        let mut entity = Entity::from_raw(
            "1",
            0,
            RawDocument {
                text: "x".into(),
                ts: Some("   ".into()),
                passthrough: Map::new(),
            },
            Vec::new(),
        );
        assert_eq!(entity.timestamp(), None);
        entity.ts = Some("2024-03-01".into());
        assert_eq!(entity.timestamp(), Some("2024-03-01"));
    }
}
