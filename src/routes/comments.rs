use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
};

use super::AppState;
use crate::comments;
use crate::error::AppResult;
use crate::interactions::{self, InteractionKind};
use crate::models::{CreateComment, PageRequest};

pub fn comments_routes() -> Router<AppState> {
    Router::new()
        .route("/articles/{article_id}/comments", get(list_comments))
        .route("/comments", post(create_comment))
        .route("/comments/{comment_id}", delete(delete_comment))
        .route("/comments/{comment_id}/replies", get(list_replies))
        .route("/comments/{comment_id}/like", post(toggle_comment_like))
}

async fn list_comments(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
    Query(page): Query<PageRequest>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let identity = state.identity(&headers).await?;
    let page = comments::list_article_comments(
        &state.pool,
        &state.config.comment_policy,
        identity,
        article_id,
        page,
    )
    .await?;
    Ok(Json(page))
}

async fn list_replies(
    State(state): State<AppState>,
    Path(root_id): Path<i64>,
    Query(page): Query<PageRequest>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let identity = state.identity(&headers).await?;
    let page = comments::list_replies(&state.pool, identity, root_id, page).await?;
    Ok(Json(page))
}

async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateComment>,
) -> AppResult<impl IntoResponse> {
    let identity = state.identity(&headers).await?;
    let id = comments::publish_comment(
        &state.pool,
        &state.config.comment_policy,
        identity,
        payload,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let identity = state.identity(&headers).await?;
    comments::delete_own_comment(&state.pool, identity, comment_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_comment_like(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let identity = state.identity(&headers).await?;
    let outcome =
        interactions::toggle(&state.pool, InteractionKind::CommentLike, comment_id, identity)
            .await?;
    Ok(Json(serde_json::json!({"status": outcome})))
}
