//! Watched-channel CRUD (spec §6.1, `/streamer/*`).

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;
use crate::database::models::{ChannelKey, NewStreamer, StreamerRecord, StreamerUpdate};
use crate::database::repositories::RepositoryError;

const DEFAULT_TIME_SEGMENT: i64 = 1800;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/list", get(list))
        .route("/add", get(add))
        .route("/update", get(update))
        .route("/delete", get(delete))
}

async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<StreamerRecord>>> {
    Ok(Json(state.repository.list().await?))
}

#[derive(Debug, Deserialize)]
struct AddQuery {
    platform: String,
    username: String,
    quality: String,
    split_segments: Option<String>,
    time_segment: Option<i64>,
}

async fn add(State(state): State<AppState>, Query(q): Query<AddQuery>) -> ApiResult<String> {
    if q.platform.trim().is_empty() || q.username.trim().is_empty() || q.quality.trim().is_empty() {
        return Err(ApiError::bad_request("platform, username and quality are required"));
    }

    let split_segments = match q.split_segments {
        None => false,
        Some(raw) => raw
            .parse::<bool>()
            .map_err(|_| ApiError::bad_request("split_segments must be true or false"))?,
    };

    let time_segment = q
        .time_segment
        .unwrap_or(if split_segments { DEFAULT_TIME_SEGMENT } else { 0 });

    let result = state
        .repository
        .create(NewStreamer {
            platform: q.platform,
            username: q.username,
            quality: q.quality,
            split_segments,
            time_segment,
        })
        .await;

    match result {
        Ok(_) => Ok("success".to_string()),
        Err(RepositoryError::DuplicateKey) => Err(ApiError::internal(RepositoryError::DuplicateKey.to_string())),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
struct UpdateQuery {
    platform: String,
    username: String,
    quality: Option<String>,
    split_segments: Option<bool>,
    time_segment: Option<i64>,
}

async fn update(State(state): State<AppState>, Query(q): Query<UpdateQuery>) -> ApiResult<Json<serde_json::Value>> {
    state
        .repository
        .update(
            &q.platform,
            &q.username,
            StreamerUpdate {
                quality: q.quality,
                split_segments: q.split_segments,
                time_segment: q.time_segment,
            },
        )
        .await?;

    Ok(Json(serde_json::json!({ "status": "success" })))
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    platform: String,
    username: String,
}

async fn delete(State(state): State<AppState>, Query(q): Query<DeleteQuery>) -> ApiResult<String> {
    state.repository.delete(&q.platform, &q.username).await?;

    let key = ChannelKey::new(&q.platform, &q.username);
    state.recording_state.set_active(key.clone(), false);
    if let Some(handle) = state.recording_state.job(&key) {
        handle.request_cancel();
    }

    Ok("success".to_string())
}
