use std::sync::Arc;

use common::{
    storage::{db::SurrealDbClient, snapshot::SnapshotCache},
    utils::config::AppConfig,
};

use crate::query::QueryService;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub query: QueryService,
}

impl ApiState {
    pub async fn new(config: &AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let surreal_db_client = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        Ok(Self::with_db(surreal_db_client))
    }

    /// Shares an existing connection, as the combined server and worker process does.
    pub fn with_db(db: Arc<SurrealDbClient>) -> Self {
        let query = QueryService::new(SnapshotCache::new(Arc::clone(&db)));
        Self { db, query }
    }
}
