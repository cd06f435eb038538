use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

use crate::models::{ArticleCounters, AuditStatus, Comment};

pub async fn pool() -> SqlitePool {
    super::connect_in_memory().await.expect("in-memory pool")
}

pub async fn user(pool: &SqlitePool, username: &str) -> i64 {
    sqlx::query("INSERT INTO users (username, nickname, is_admin, created_at) VALUES (?, ?, 0, ?)")
        .bind(username)
        .bind(format!("{username}-nick"))
        .bind(Utc::now())
        .execute(pool)
        .await
        .expect("insert user")
        .last_insert_rowid()
}

pub async fn article(pool: &SqlitePool, author_id: i64) -> i64 {
    article_created_at(pool, author_id, Utc::now()).await
}

pub async fn article_created_at(
    pool: &SqlitePool,
    author_id: i64,
    created_at: DateTime<Utc>,
) -> i64 {
    sqlx::query("INSERT INTO articles (user_id, title, created_at) VALUES (?, ?, ?)")
        .bind(author_id)
        .bind("An article")
        .bind(created_at)
        .execute(pool)
        .await
        .expect("insert article")
        .last_insert_rowid()
}

/// Inserts a comment row directly, bypassing publish validation and
/// counter maintenance. `minutes` offsets `created_at` for ordering.
pub async fn comment(
    pool: &SqlitePool,
    article_id: i64,
    user_id: i64,
    root_id: Option<i64>,
    status: AuditStatus,
    minutes: i64,
) -> i64 {
    let created_at = Utc::now() - Duration::days(1) + Duration::minutes(minutes);
    sqlx::query(
        r#"
        INSERT INTO comments (article_id, user_id, parent_id, root_id, content, audit_status, created_at)
        VALUES (?, ?, ?, ?, 'hello', ?, ?)
        "#,
    )
    .bind(article_id)
    .bind(user_id)
    .bind(root_id)
    .bind(root_id)
    .bind(status)
    .bind(created_at)
    .execute(pool)
    .await
    .expect("insert comment")
    .last_insert_rowid()
}

pub async fn set_comment_count(pool: &SqlitePool, article_id: i64, count: i64) {
    sqlx::query("UPDATE articles SET comment_count = ? WHERE id = ?")
        .bind(count)
        .bind(article_id)
        .execute(pool)
        .await
        .expect("set comment_count");
}

pub async fn counters(pool: &SqlitePool, article_id: i64) -> ArticleCounters {
    sqlx::query_as::<_, ArticleCounters>(
        "SELECT view_count, like_count, comment_count, collect_count FROM articles WHERE id = ?",
    )
    .bind(article_id)
    .fetch_one(pool)
    .await
    .expect("fetch counters")
}

pub async fn comment_row(pool: &SqlitePool, comment_id: i64) -> Comment {
    sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
        .bind(comment_id)
        .fetch_one(pool)
        .await
        .expect("fetch comment")
}

pub async fn count_rows(pool: &SqlitePool, sql: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(sql)
        .fetch_one(pool)
        .await
        .expect("count rows");
    count
}
