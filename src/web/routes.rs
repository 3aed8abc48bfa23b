use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::FeedError;
use crate::pagination::MAX_PAGE_SIZE;
use crate::posts::{NewPost, PostStatus, TrackedCounter};

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/feeds/:name", get(feed_page))
        .route("/api/feeds/:name/snapshot", get(feed_snapshot))
        .route("/api/forums/:forum/posts", post(submit_post))
        .route("/api/posts/:forum/:id", get(post_detail))
        .route("/api/posts/:forum/:id/status", put(set_status))
        .route("/api/posts/:forum/:id/track/:counter", post(track))
        .route("/api/posts/:forum/:id/awards/:slot", post(award))
        .route("/api/recent", get(recent))
}

fn error_response(err: &FeedError) -> Response {
    let status = match err {
        FeedError::Validation(_) => StatusCode::BAD_REQUEST,
        FeedError::NotFound(_) => StatusCode::NOT_FOUND,
        FeedError::Storage(_)
        | FeedError::Rebuild { .. }
        | FeedError::Integrity(_)
        | FeedError::Corrupt { .. } => {
            tracing::error!("Request failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    tag: Option<String>,
    pos: Option<i64>,
    size: Option<usize>,
}

async fn feed_page(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<PageParams>,
) -> Response {
    let size = params
        .size
        .unwrap_or_else(|| state.service.default_page_size())
        .min(MAX_PAGE_SIZE);
    match state
        .service
        .resolve_page(&name, params.tag.as_deref(), params.pos.unwrap_or(0), size)
        .await
    {
        Ok(page) => Json(page).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Serialize)]
struct SnapshotInfo {
    feed: String,
    tag: String,
    len: usize,
    built_at: String,
}

async fn feed_snapshot(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.service.get_snapshot(&name) {
        Ok(snapshot) => Json(SnapshotInfo {
            feed: snapshot.feed.clone(),
            tag: snapshot.tag.clone(),
            len: snapshot.len(),
            built_at: snapshot.built_at.to_rfc3339(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Serialize)]
struct Submitted {
    forum: String,
    id: i64,
}

async fn submit_post(
    State(state): State<AppState>,
    Path(forum): Path<String>,
    Json(post): Json<NewPost>,
) -> Response {
    match state.service.submitter.submit(&forum, post).await {
        Ok(post_ref) => (
            StatusCode::CREATED,
            Json(Submitted {
                forum: post_ref.forum,
                id: post_ref.id,
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

async fn post_detail(
    State(state): State<AppState>,
    Path((forum, id)): Path<(String, i64)>,
) -> Response {
    let table = state.service.table().to_string();
    match state.service.posts.load_for_display(&table, &forum, id).await {
        Ok(Some(post)) => Json(post).into_response(),
        Ok(None) => error_response(&FeedError::NotFound(format!("post {forum}:{id}"))),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    status: PostStatus,
}

async fn set_status(
    State(state): State<AppState>,
    Path((forum, id)): Path<(String, i64)>,
    Json(update): Json<StatusUpdate>,
) -> Response {
    match state.service.set_post_status(&forum, id, update.status).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

async fn track(
    State(state): State<AppState>,
    Path((forum, id, counter)): Path<(String, i64, TrackedCounter)>,
) -> Response {
    match state.service.track_post(&forum, id, counter).await {
        Ok(value) => Json(serde_json::json!({ "value": value })).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn award(
    State(state): State<AppState>,
    Path((forum, id, slot)): Path<(String, i64, usize)>,
) -> Response {
    match state.service.award_post(&forum, id, slot).await {
        Ok(awards) => Json(awards).into_response(),
        Err(e) => error_response(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    offset: Option<u64>,
    limit: Option<u64>,
}

async fn recent(State(state): State<AppState>, Query(params): Query<RecentParams>) -> Response {
    let limit = params.limit.unwrap_or(20).min(100);
    match state
        .service
        .submitter
        .recent(params.offset.unwrap_or(0), limit)
        .await
    {
        Ok(refs) => Json(refs).into_response(),
        Err(e) => error_response(&e),
    }
}
