use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Article {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub is_draft: bool,
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub collect_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Article {
    pub fn counters(&self) -> ArticleCounters {
        ArticleCounters {
            view_count: self.view_count,
            like_count: self.like_count,
            comment_count: self.comment_count,
            collect_count: self.collect_count,
        }
    }
}

/// Denormalized aggregates cached on the article row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct ArticleCounters {
    pub view_count: i64,
    pub like_count: i64,
    pub comment_count: i64,
    pub collect_count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ViewerInteraction {
    pub liked: bool,
    pub collected: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HotArticle {
    pub id: i64,
    pub title: String,
    pub user_id: i64,
    pub counters: ArticleCounters,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}
