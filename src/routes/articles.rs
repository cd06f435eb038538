use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;

use super::AppState;
use crate::counters;
use crate::error::{AppError, AppResult};
use crate::interactions::{self, InteractionKind};
use crate::ranking;

#[derive(Debug, Deserialize)]
pub struct HotQuery {
    pub limit: Option<i64>,
}

pub fn articles_routes() -> Router<AppState> {
    Router::new()
        .route("/articles/hot", get(hot_articles))
        .route("/articles/{article_id}/counters", get(article_counters))
        .route("/articles/{article_id}/interaction", get(viewer_interaction))
        .route("/articles/{article_id}/like", post(toggle_like))
        .route("/articles/{article_id}/collect", post(toggle_collect))
        .route("/articles/{article_id}/view", post(record_view))
}

async fn hot_articles(
    State(state): State<AppState>,
    Query(query): Query<HotQuery>,
) -> AppResult<impl IntoResponse> {
    let pool_size = state.config.hot_candidate_pool;
    let limit = query
        .limit
        .unwrap_or(state.config.hot_default_limit)
        .clamp(1, pool_size.max(1));

    let hot = ranking::hot_articles(&state.pool, pool_size, limit, Utc::now()).await?;
    Ok(Json(hot))
}

async fn article_counters(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let counters = counters::fetch_article_counters(&state.pool, article_id)
        .await?
        .ok_or_else(|| AppError::not_found("Article not found"))?;
    Ok(Json(counters))
}

async fn viewer_interaction(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let identity = state.identity(&headers).await?;
    let interaction = interactions::viewer_interaction(&state.pool, article_id, identity).await?;
    Ok(Json(interaction))
}

async fn toggle_like(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    toggle(&state, &headers, InteractionKind::ArticleLike, article_id).await
}

async fn toggle_collect(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    toggle(&state, &headers, InteractionKind::ArticleCollect, article_id).await
}

async fn toggle(
    state: &AppState,
    headers: &HeaderMap,
    kind: InteractionKind,
    article_id: i64,
) -> AppResult<Json<serde_json::Value>> {
    let identity = state.identity(headers).await?;
    let outcome = interactions::toggle(&state.pool, kind, article_id, identity).await?;
    let counters = counters::fetch_article_counters(&state.pool, article_id)
        .await?
        .unwrap_or_default();
    Ok(Json(serde_json::json!({
        "status": outcome,
        "counters": counters,
    })))
}

async fn record_view(
    State(state): State<AppState>,
    Path(article_id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    interactions::record_view(&state.pool, article_id).await?;
    Ok(Json(serde_json::json!({"message": "View recorded"})))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::db::fixtures;
    use crate::routes::api_router;
    use crate::routes::test_support::{send, state};

    #[tokio::test]
    async fn like_collect_and_view_update_counters() {
        let pool = fixtures::pool().await;
        let alice = fixtures::user(&pool, "alice").await;
        let article = fixtures::article(&pool, alice).await;
        let app = api_router(state(pool));

        let (status, body) =
            send(&app, "POST", &format!("/api/articles/{article}/like"), Some("alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "added");
        assert_eq!(body["counters"]["like_count"], 1);

        send(&app, "POST", &format!("/api/articles/{article}/collect"), Some("alice"), None).await;
        send(&app, "POST", &format!("/api/articles/{article}/view"), None, None).await;

        let (_, body) = send(
            &app,
            "GET",
            &format!("/api/articles/{article}/interaction"),
            Some("alice"),
            None,
        )
        .await;
        assert_eq!(body["liked"], true);
        assert_eq!(body["collected"], true);

        let (_, body) =
            send(&app, "GET", &format!("/api/articles/{article}/counters"), None, None).await;
        assert_eq!(body["view_count"], 1);
        assert_eq!(body["collect_count"], 1);
    }

    #[tokio::test]
    async fn hot_list_honours_the_limit() {
        let pool = fixtures::pool().await;
        let alice = fixtures::user(&pool, "alice").await;
        for _ in 0..3 {
            fixtures::article(&pool, alice).await;
        }
        let app = api_router(state(pool));

        let (status, body) = send(&app, "GET", "/api/articles/hot?limit=2", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().map(Vec::len), Some(2));

        let (_, body) = send(&app, "GET", "/api/articles/hot", None, None).await;
        assert_eq!(body.as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn views_of_missing_articles_are_404() {
        let app = api_router(state(fixtures::pool().await));
        let (status, _) = send(&app, "POST", "/api/articles/5/view", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
