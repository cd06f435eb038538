//! Time-decayed popularity ranking. Scores are computed at read time and
//! never stored.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::AppResult;
use crate::models::{Article, ArticleCounters, HotArticle};

pub const VIEW_WEIGHT: f64 = 1.0;
pub const LIKE_WEIGHT: f64 = 5.0;
pub const COMMENT_WEIGHT: f64 = 10.0;
pub const COLLECT_WEIGHT: f64 = 8.0;

pub const HALF_LIFE_DAYS: f64 = 7.0;
pub const MIN_DECAY: f64 = 0.01;

pub fn base_score(counters: &ArticleCounters) -> f64 {
    counters.view_count as f64 * VIEW_WEIGHT
        + counters.like_count as f64 * LIKE_WEIGHT
        + counters.comment_count as f64 * COMMENT_WEIGHT
        + counters.collect_count as f64 * COLLECT_WEIGHT
}

/// Halves every `HALF_LIFE_DAYS` whole days of age, never below `MIN_DECAY`.
/// Articles dated now or in the future are not decayed.
pub fn decay_factor(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - created_at).num_days();
    if age_days <= 0 {
        return 1.0;
    }
    0.5_f64.powf(age_days as f64 / HALF_LIFE_DAYS).max(MIN_DECAY)
}

pub fn score_at(article: &Article, now: DateTime<Utc>) -> f64 {
    base_score(&article.counters()) * decay_factor(article.created_at, now)
}

/// Scores every article and sorts by score descending. Equal scores keep
/// ascending id order.
pub fn rank(articles: Vec<Article>, now: DateTime<Utc>) -> Vec<HotArticle> {
    let mut ranked: Vec<HotArticle> = articles
        .into_iter()
        .map(|article| {
            let score = score_at(&article, now);
            HotArticle {
                id: article.id,
                counters: article.counters(),
                title: article.title,
                user_id: article.user_id,
                score,
                created_at: article.created_at,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.id.cmp(&b.id)));
    ranked
}

pub fn top_n(articles: Vec<Article>, limit: usize, now: DateTime<Utc>) -> Vec<HotArticle> {
    let mut ranked = rank(articles, now);
    ranked.truncate(limit);
    ranked
}

/// Picks the hottest published articles. Only the `candidate_pool` most
/// viewed articles are scored.
pub async fn hot_articles(
    pool: &SqlitePool,
    candidate_pool: i64,
    limit: i64,
    now: DateTime<Utc>,
) -> AppResult<Vec<HotArticle>> {
    if limit <= 0 || candidate_pool <= 0 {
        return Ok(Vec::new());
    }

    let candidates = sqlx::query_as::<_, Article>(
        r#"
        SELECT id, user_id, title, is_draft, view_count, like_count, comment_count,
               collect_count, created_at
        FROM articles
        WHERE is_draft = 0 AND is_deleted = 0
        ORDER BY view_count DESC, like_count DESC, id ASC
        LIMIT ?
        "#,
    )
    .bind(candidate_pool)
    .fetch_all(pool)
    .await?;

    let candidate_count = candidates.len();
    let hot = top_n(candidates, limit as usize, now);

    tracing::debug!(candidate_count, returned = hot.len(), "hot articles ranked");
    Ok(hot)
}
