use api_state::ApiState;
use axum::{extract::FromRef, routing::get, Router};
use routes::{
    health::{live, ready},
    stories::{get_stories, get_summary},
};

pub mod api_state;
pub mod error;
pub mod query;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Probes for k8s/systemd
    let probes = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let read = Router::new()
        .route("/stories", get(get_stories))
        .route("/summary", get(get_summary));

    probes.merge(read)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use common::storage::{
        db::SurrealDbClient,
        snapshot::SnapshotCache,
        types::entity::{Entity, RawDocument},
    };
    use serde_json::{json, Map, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;

    async fn setup() -> (Router, SnapshotCache) {
        let db = Arc::new(
            SurrealDbClient::memory("api_test", &Uuid::new_v4().to_string())
                .await
                .expect("Failed to start in-memory surrealdb"),
        );
        let state = ApiState::with_db(Arc::clone(&db));
        let app = Router::new()
            .nest("/api/v1", api_routes_v1())
            .with_state(state);
        (app, SnapshotCache::new(db))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("router response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        (status, serde_json::from_slice(&body).expect("json body"))
    }

    fn entity(position: usize, text: &str, ts: Option<&str>) -> Entity {
        let mut passthrough = Map::new();
        passthrough.insert("channel".into(), json!("news"));
        Entity::from_raw(
            "1",
            position,
            RawDocument {
                text: text.into(),
                ts: ts.map(Into::into),
                passthrough,
            },
            vec![0.5, 0.5, 0.5],
        )
    }

    #[tokio::test]
    async fn probes_respond_ok() {
        let (app, _) = setup().await;
        let (status, body) = get_json(app.clone(), "/api/v1/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, _) = get_json(app, "/api/v1/ready").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn stories_are_empty_before_first_publish() {
        let (app, _) = setup().await;
        let (status, body) = get_json(app.clone(), "/api/v1/stories").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"stories": []}));

        let (status, body) = get_json(app, "/api/v1/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"entities": [], "labels": []}));
    }

    #[tokio::test]
    async fn stories_reflect_published_snapshot() {
        let (app, cache) = setup().await;
        cache
            .publish(
                &[
                    entity(0, "a", Some("2024-01-02")),
                    entity(1, "b", Some("2024-01-01")),
                    entity(2, "c", None),
                ],
                &[1, 1, 2],
            )
            .await
            .expect("publish");

        let (status, body) = get_json(app, "/api/v1/stories").await;
        assert_eq!(status, StatusCode::OK);

        let stories = body["stories"].as_array().expect("stories array");
        assert_eq!(stories.len(), 2);
        assert_eq!(stories[0]["tags"], json!(["1"]));
        assert_eq!(
            stories[0]["timeline"],
            json!([
                {"datetime": "2024-01-02", "text": "a"},
                {"datetime": "2024-01-01", "text": "b"}
            ])
        );
        assert_eq!(stories[1]["tags"], json!(["2"]));
        assert_eq!(stories[1]["timeline"], json!([]));
    }

    #[tokio::test]
    async fn summary_strips_embeddings() {
        let (app, cache) = setup().await;
        cache
            .publish(&[entity(0, "a", Some("2024-01-02"))], &[0])
            .await
            .expect("publish");

        let (status, body) = get_json(app, "/api/v1/summary").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["labels"], json!([0]));
        let first = &body["entities"][0];
        assert_eq!(first["text"], "a");
        assert_eq!(first["channel"], "news");
        assert!(first.get("embedding").is_none());
    }
}
