use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{delete, get, put},
};
use serde::Deserialize;

use super::AppState;
use crate::comments;
use crate::error::AppResult;
use crate::models::{AdminCommentQuery, AuditStatus};

#[derive(Debug, Deserialize)]
pub struct AuditParams {
    pub audit_status: i64,
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/comments", get(list_comments))
        .route("/comments/pending/count", get(pending_count))
        .route("/comments/audit/batch", put(batch_audit))
        .route("/comments/batch", delete(batch_delete))
        .route("/comments/{comment_id}/audit", put(audit_comment))
        .route("/comments/{comment_id}", delete(delete_comment))
}

async fn require_admin(state: &AppState, headers: &HeaderMap) -> AppResult<i64> {
    state.identity(headers).await?.require_admin()
}

async fn list_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdminCommentQuery>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers).await?;
    let page = comments::list_admin_comments(&state.pool, &query).await?;
    Ok(Json(page))
}

async fn pending_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers).await?;
    let count = comments::pending_audit_count(&state.pool).await?;
    Ok(Json(serde_json::json!({"count": count})))
}

async fn audit_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    Query(params): Query<AuditParams>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let admin_id = require_admin(&state, &headers).await?;
    let target = AuditStatus::audit_target(params.audit_status)?;
    comments::audit_comment(&state.pool, comment_id, target).await?;

    tracing::info!(admin_id, comment_id, "audit applied by admin");
    Ok(Json(serde_json::json!({"message": "Comment audited"})))
}

async fn batch_audit(
    State(state): State<AppState>,
    Query(params): Query<AuditParams>,
    headers: HeaderMap,
    Json(ids): Json<Vec<i64>>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers).await?;
    let target = AuditStatus::audit_target(params.audit_status)?;
    let result = comments::batch_audit_comments(&state.pool, &ids, target).await?;
    Ok(Json(result))
}

async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers).await?;
    let summary = comments::delete_comment(&state.pool, comment_id).await?;
    Ok(Json(summary))
}

async fn batch_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(ids): Json<Vec<i64>>,
) -> AppResult<impl IntoResponse> {
    require_admin(&state, &headers).await?;
    let result = comments::batch_delete_comments(&state.pool, &ids).await?;
    Ok(Json(result))
}
