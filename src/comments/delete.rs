use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use super::{fetch_comments_by_ids, fetch_replies_of_roots, find_comment, soft_delete_comments};
use crate::counters::{self, CounterKind};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::identity::Identity;
use crate::interactions::{self, InteractionKind};
use crate::models::{BatchDeleteResult, Comment};

/// What a single deletion removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CascadeSummary {
    pub removed: i64,
    pub approved_removed: i64,
}

/// Moderator path: deletes any comment, cascading to replies of a root.
pub async fn delete_comment(pool: &SqlitePool, comment_id: i64) -> AppResult<CascadeSummary> {
    let mut tx = db::begin_write(pool).await?;

    let comment = find_comment(&mut *tx, comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;
    let summary = cascade_delete(&mut tx, comment).await?;

    tx.commit().await?;
    Ok(summary)
}

/// Author path: same cascade, but only the comment's author may call it.
pub async fn delete_own_comment(
    pool: &SqlitePool,
    identity: Identity,
    comment_id: i64,
) -> AppResult<CascadeSummary> {
    let user_id = identity.require_user()?;

    let mut tx = db::begin_write(pool).await?;

    let comment = find_comment(&mut *tx, comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;
    if comment.user_id != user_id {
        return Err(AppError::permission_denied(
            "Not authorized to delete this comment",
        ));
    }
    let summary = cascade_delete(&mut tx, comment).await?;

    tx.commit().await?;
    Ok(summary)
}

async fn cascade_delete(conn: &mut SqliteConnection, comment: Comment) -> AppResult<CascadeSummary> {
    let comment_id = comment.id;
    let article_id = comment.article_id;

    let mut removal = if comment.is_root() {
        fetch_replies_of_roots(&mut *conn, &[comment_id]).await?
    } else {
        Vec::new()
    };
    removal.push(comment);

    let ids: Vec<i64> = removal.iter().map(|c| c.id).collect();
    let approved_removed = removal.iter().filter(|c| c.is_approved()).count() as i64;

    interactions::delete_mappings(conn, InteractionKind::CommentLike, &ids).await?;
    let removed = soft_delete_comments(conn, &ids).await? as i64;
    counters::decrement(conn, CounterKind::ArticleComments, article_id, approved_removed).await?;

    tracing::info!(comment_id, article_id, removed, approved_removed, "comment deleted");
    Ok(CascadeSummary {
        removed,
        approved_removed,
    })
}

/// Deletes several comments at once. Roots take their replies with them;
/// ids that do not exist are counted, not errored.
pub async fn batch_delete_comments(
    pool: &SqlitePool,
    comment_ids: &[i64],
) -> AppResult<BatchDeleteResult> {
    if comment_ids.is_empty() {
        return Err(AppError::validation("Comment id list must not be empty"));
    }

    let mut requested = comment_ids.to_vec();
    requested.sort_unstable();
    requested.dedup();

    let mut tx = db::begin_write(pool).await?;

    let existing = fetch_comments_by_ids(&mut *tx, &requested).await?;
    let not_found_count = (requested.len() - existing.len()) as i64;
    if existing.is_empty() {
        return Err(AppError::invalid_state("None of the selected comments exist"));
    }

    let root_ids: Vec<i64> = existing
        .iter()
        .filter(|c| c.is_root())
        .map(|c| c.id)
        .collect();
    let replies = fetch_replies_of_roots(&mut *tx, &root_ids).await?;

    // A reply may be requested directly and also reached through its root.
    let removal: BTreeMap<i64, Comment> = existing
        .into_iter()
        .chain(replies)
        .map(|c| (c.id, c))
        .collect();

    let ids: Vec<i64> = removal.keys().copied().collect();
    interactions::delete_mappings(&mut tx, InteractionKind::CommentLike, &ids).await?;
    soft_delete_comments(&mut tx, &ids).await?;
    counters::decrement_grouped(
        &mut tx,
        CounterKind::ArticleComments,
        removal
            .values()
            .filter(|c| c.is_approved())
            .map(|c| c.article_id),
    )
    .await?;

    tx.commit().await?;

    let deleted_root_count = root_ids.len() as i64;
    let deleted_child_count = (removal.len() - root_ids.len()) as i64;

    tracing::info!(
        deleted_root_count,
        deleted_child_count,
        not_found_count,
        "batch delete applied"
    );

    Ok(BatchDeleteResult {
        deleted_root_count,
        deleted_child_count,
        not_found_count,
        message: format!(
            "Deleted {deleted_root_count} root comments and {deleted_child_count} replies, \
             {not_found_count} not found"
        ),
    })
}
