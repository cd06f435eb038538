use std::str::FromStr;
use std::time::Duration;

use sqlx::{
    Sqlite, SqlitePool, Transaction,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};

#[cfg(test)]
pub(crate) mod fixtures;

pub async fn init_db(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    bootstrap_schema(&pool).await?;
    Ok(pool)
}

/// Opens a transaction that takes the database write lock up front.
///
/// A deferred `BEGIN` that reads first and writes later fails with
/// `SQLITE_BUSY` as soon as another connection holds the write lock, without
/// consulting the busy timeout. Every mutating operation goes through here
/// so concurrent writers queue on the busy timeout instead.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

/// Single-connection in-memory database with the full schema. Every
/// connection to `sqlite::memory:` is a separate database, so the pool is
/// capped at one.
pub async fn connect_in_memory() -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    bootstrap_schema(&pool).await?;
    Ok(pool)
}

pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            nickname TEXT NULL,
            avatar_url TEXT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            is_draft INTEGER NOT NULL DEFAULT 0,
            view_count INTEGER NOT NULL DEFAULT 0 CHECK (view_count >= 0),
            like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
            comment_count INTEGER NOT NULL DEFAULT 0 CHECK (comment_count >= 0),
            collect_count INTEGER NOT NULL DEFAULT 0 CHECK (collect_count >= 0),
            is_deleted INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_articles_hot ON articles (is_draft, view_count, like_count)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            article_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            parent_id INTEGER NULL,
            root_id INTEGER NULL,
            reply_user_id INTEGER NULL,
            content TEXT NOT NULL,
            like_count INTEGER NOT NULL DEFAULT 0 CHECK (like_count >= 0),
            audit_status INTEGER NOT NULL DEFAULT 0 CHECK (audit_status IN (0, 1, 2)),
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_at TEXT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_comments_article_root ON comments (article_id, root_id, audit_status, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_comments_root_created ON comments (root_id, created_at)",
    )
    .execute(pool)
    .await?;

    // Mapping tables: the UNIQUE pair is the source of truth for
    // "has this user liked/collected this entity".
    for (table, entity_column) in [
        ("article_likes", "article_id"),
        ("article_collects", "article_id"),
        ("comment_likes", "comment_id"),
    ] {
        let create_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                {entity_column} INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE ({entity_column}, user_id)
            )
            "#
        );
        sqlx::query(&create_sql).execute(pool).await?;

        let index_sql = format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_user ON {table} (user_id, {entity_column})"
        );
        sqlx::query(&index_sql).execute(pool).await?;
    }

    Ok(())
}
