use axum::{extract::State, response::IntoResponse, Json};

use crate::{
    api_state::ApiState,
    error::ApiError,
    query::{summary, StoriesResponse},
};

pub async fn get_stories(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let stories = state.query.get_stories().await?;
    Ok(Json(StoriesResponse { stories }))
}

pub async fn get_summary(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.query.snapshot().await?;
    let body = serde_json::to_value(summary(snapshot.as_ref()))
        .map_err(|err| ApiError::InternalError(err.to_string()))?;
    Ok(Json(body))
}
