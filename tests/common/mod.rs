#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use blog_backend::config::CommentPolicy;
use blog_backend::db;
use blog_backend::models::{ArticleCounters, AuditStatus, CreateComment};
use chrono::Utc;
use sqlx::SqlitePool;

pub async fn pool() -> SqlitePool {
    db::connect_in_memory().await.expect("in-memory pool")
}

/// On-disk database removed when dropped, with its WAL side files.
pub struct ScratchDb {
    path: PathBuf,
}

impl Drop for ScratchDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

/// Pool over a real database file, so several connections contend for the
/// write lock the way they do in production.
pub async fn file_pool(max_connections: u32) -> (ScratchDb, SqlitePool) {
    static NEXT: AtomicUsize = AtomicUsize::new(0);
    let path = std::env::temp_dir().join(format!(
        "blog_backend_{}_{}.db",
        std::process::id(),
        NEXT.fetch_add(1, Ordering::Relaxed)
    ));
    let _ = std::fs::remove_file(&path);
    let scratch = ScratchDb { path };

    let url = format!("sqlite://{}", scratch.path.display());
    let pool = db::init_db(&url, max_connections)
        .await
        .expect("file-backed pool");
    (scratch, pool)
}

pub async fn user(pool: &SqlitePool, username: &str) -> i64 {
    sqlx::query("INSERT INTO users (username, nickname, is_admin, created_at) VALUES (?, ?, 0, ?)")
        .bind(username)
        .bind(username)
        .bind(Utc::now())
        .execute(pool)
        .await
        .expect("insert user")
        .last_insert_rowid()
}

pub async fn article(pool: &SqlitePool, author_id: i64) -> i64 {
    sqlx::query("INSERT INTO articles (user_id, title, created_at) VALUES (?, 'Post', ?)")
        .bind(author_id)
        .bind(Utc::now())
        .execute(pool)
        .await
        .expect("insert article")
        .last_insert_rowid()
}

pub fn approved() -> CommentPolicy {
    CommentPolicy::default()
}

pub fn pending() -> CommentPolicy {
    CommentPolicy {
        create_status: AuditStatus::Pending,
        ..CommentPolicy::default()
    }
}

pub fn root(article_id: i64) -> CreateComment {
    CreateComment {
        article_id,
        parent_id: None,
        reply_user_id: None,
        content: "root".to_string(),
    }
}

pub fn reply(article_id: i64, parent_id: i64) -> CreateComment {
    CreateComment {
        article_id,
        parent_id: Some(parent_id),
        reply_user_id: None,
        content: "reply".to_string(),
    }
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

/// Live approved comments on an article, counted from the rows themselves.
pub async fn approved_rows(pool: &SqlitePool, article_id: i64) -> i64 {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM comments WHERE article_id = ? AND audit_status = 1 AND is_deleted = 0",
    )
    .bind(article_id)
    .fetch_one(pool)
    .await
    .expect("count approved");
    count
}

pub async fn scalar(pool: &SqlitePool, sql: &str) -> i64 {
    let (value,): (i64,) = sqlx::query_as(sql)
        .fetch_one(pool)
        .await
        .expect("scalar query");
    value
}

pub async fn status_of(pool: &SqlitePool, comment_id: i64) -> AuditStatus {
    let (status,): (AuditStatus,) = sqlx::query_as("SELECT audit_status FROM comments WHERE id = ?")
        .bind(comment_id)
        .fetch_one(pool)
        .await
        .expect("fetch status");
    status
}

pub async fn root_of(pool: &SqlitePool, comment_id: i64) -> Option<i64> {
    let (root_id,): (Option<i64>,) = sqlx::query_as("SELECT root_id FROM comments WHERE id = ?")
        .bind(comment_id)
        .fetch_one(pool)
        .await
        .expect("fetch root_id");
    root_id
}
