//! Two-level comment threads: publishing, the reader-facing tree, moderation
//! and deletion.
//!
//! A reply always points at the root of its thread (`root_id`), however deep
//! the reply chain it was written in, so a thread renders as one root plus
//! one flat list of replies.

pub mod admin;
pub mod audit;
pub mod delete;
pub mod tree;

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::config::CommentPolicy;
use crate::counters::{self, CounterKind};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::identity::Identity;
use crate::models::{AuditStatus, Comment, CreateComment, User};

pub use admin::{list_admin_comments, pending_audit_count};
pub use audit::{audit_comment, batch_audit_comments};
pub use delete::{CascadeSummary, batch_delete_comments, delete_comment, delete_own_comment};
pub use tree::{list_article_comments, list_replies};

/// Publishes a comment or reply and returns its id.
///
/// The stored status comes from `policy.create_status`; the article's
/// `comment_count` only moves when that status is `Approved`.
pub async fn publish_comment(
    pool: &SqlitePool,
    policy: &CommentPolicy,
    identity: Identity,
    input: CreateComment,
) -> AppResult<i64> {
    let user_id = identity.require_user()?;

    let content = input.content.trim();
    if content.is_empty() {
        return Err(AppError::validation("Comment content is required"));
    }

    let mut tx = db::begin_write(pool).await?;

    ensure_article_exists(&mut tx, input.article_id).await?;

    let (root_id, reply_user_id) = match input.parent_id {
        Some(parent_id) => {
            let target =
                resolve_reply_target(&mut tx, input.article_id, parent_id, input.reply_user_id)
                    .await?;
            (Some(target.root_id), Some(target.reply_user_id))
        }
        None => (None, None),
    };

    let now = Utc::now();
    let comment_id = sqlx::query(
        r#"
        INSERT INTO comments
            (article_id, user_id, parent_id, root_id, reply_user_id, content,
             like_count, audit_status, is_deleted, created_at)
        VALUES (?, ?, ?, ?, ?, ?, 0, ?, 0, ?)
        "#,
    )
    .bind(input.article_id)
    .bind(user_id)
    .bind(input.parent_id)
    .bind(root_id)
    .bind(reply_user_id)
    .bind(escape_html(content))
    .bind(policy.create_status)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    if policy.create_status == AuditStatus::Approved {
        counters::increment(&mut tx, CounterKind::ArticleComments, input.article_id, 1).await?;
    }

    tx.commit().await?;

    tracing::info!(
        comment_id,
        article_id = input.article_id,
        ?root_id,
        status = policy.create_status.label(),
        "comment published"
    );
    Ok(comment_id)
}

struct ReplyTarget {
    root_id: i64,
    reply_user_id: i64,
}

async fn resolve_reply_target(
    conn: &mut SqliteConnection,
    article_id: i64,
    parent_id: i64,
    requested_reply_user: Option<i64>,
) -> AppResult<ReplyTarget> {
    let parent = find_comment(&mut *conn, parent_id)
        .await?
        .ok_or_else(|| AppError::not_found("Parent comment not found"))?;

    if parent.article_id != article_id {
        return Err(AppError::validation(
            "Parent comment does not belong to this article",
        ));
    }

    let reply_user_id = match requested_reply_user {
        Some(user_id) if user_id != parent.user_id => {
            return Err(AppError::validation(
                "Reply target does not match the parent comment author",
            ));
        }
        Some(user_id) => user_id,
        None => parent.user_id,
    };

    Ok(ReplyTarget {
        root_id: parent.root_id.unwrap_or(parent.id),
        reply_user_id,
    })
}

async fn ensure_article_exists(conn: &mut SqliteConnection, article_id: i64) -> AppResult<()> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM articles WHERE id = ? AND is_deleted = 0")
            .bind(article_id)
            .fetch_one(&mut *conn)
            .await?;

    if count == 0 {
        return Err(AppError::not_found("Article not found"));
    }
    Ok(())
}

pub(crate) async fn find_comment<'e, E>(executor: E, comment_id: i64) -> AppResult<Option<Comment>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let comment =
        sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ? AND is_deleted = 0")
            .bind(comment_id)
            .fetch_optional(executor)
            .await?;
    Ok(comment)
}

pub(crate) async fn fetch_comments_by_ids<'e, E>(
    executor: E,
    comment_ids: &[i64],
) -> AppResult<Vec<Comment>>
where
    E: Executor<'e, Database = Sqlite>,
{
    if comment_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query_builder =
        QueryBuilder::<Sqlite>::new("SELECT * FROM comments WHERE is_deleted = 0 AND id IN (");
    {
        let mut separated = query_builder.separated(", ");
        for id in comment_ids {
            separated.push_bind(*id);
        }
    }
    query_builder.push(")");

    let comments = query_builder
        .build_query_as::<Comment>()
        .fetch_all(executor)
        .await?;
    Ok(comments)
}

/// Every live reply under the given roots, regardless of audit status.
pub(crate) async fn fetch_replies_of_roots<'e, E>(
    executor: E,
    root_ids: &[i64],
) -> AppResult<Vec<Comment>>
where
    E: Executor<'e, Database = Sqlite>,
{
    if root_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query_builder =
        QueryBuilder::<Sqlite>::new("SELECT * FROM comments WHERE is_deleted = 0 AND root_id IN (");
    {
        let mut separated = query_builder.separated(", ");
        for id in root_ids {
            separated.push_bind(*id);
        }
    }
    query_builder.push(")");

    let replies = query_builder
        .build_query_as::<Comment>()
        .fetch_all(executor)
        .await?;
    Ok(replies)
}

/// Authors and reply targets of `comments`, fetched in one read.
pub(crate) async fn fetch_user_map<'e, E>(
    executor: E,
    comments: &[&Comment],
) -> AppResult<HashMap<i64, User>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let user_ids: BTreeSet<i64> = comments
        .iter()
        .flat_map(|c| std::iter::once(c.user_id).chain(c.reply_user_id))
        .collect();

    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut query_builder = QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE id IN (");
    {
        let mut separated = query_builder.separated(", ");
        for id in &user_ids {
            separated.push_bind(*id);
        }
    }
    query_builder.push(")");

    let users = query_builder
        .build_query_as::<User>()
        .fetch_all(executor)
        .await?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

/// Soft-deletes the given comments in one statement.
pub(crate) async fn soft_delete_comments(
    conn: &mut SqliteConnection,
    comment_ids: &[i64],
) -> AppResult<u64> {
    if comment_ids.is_empty() {
        return Ok(0);
    }

    let now = Utc::now();
    let mut query_builder = QueryBuilder::<Sqlite>::new("UPDATE comments SET is_deleted = 1, deleted_at = ");
    query_builder.push_bind(now);
    query_builder.push(", updated_at = ");
    query_builder.push_bind(now);
    query_builder.push(" WHERE is_deleted = 0 AND id IN (");
    {
        let mut separated = query_builder.separated(", ");
        for id in comment_ids {
            separated.push_bind(*id);
        }
    }
    query_builder.push(")");

    let result = query_builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
