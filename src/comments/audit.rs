use std::collections::BTreeSet;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::find_comment;
use crate::counters::{self, CounterKind};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::models::{AuditStatus, BatchAuditResult};

fn ensure_terminal(target: AuditStatus) -> AppResult<()> {
    if !target.is_terminal() {
        return Err(AppError::invalid_state("Invalid audit status"));
    }
    Ok(())
}

/// Moves one pending comment to `target`.
///
/// The write is guarded by `audit_status = Pending`; when two auditors race,
/// only the one whose update matches a row applies the counter change.
pub async fn audit_comment(pool: &SqlitePool, comment_id: i64, target: AuditStatus) -> AppResult<()> {
    let mut tx = db::begin_write(pool).await?;

    let comment = find_comment(&mut *tx, comment_id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment not found"))?;

    ensure_terminal(target)?;

    if comment.audit_status == target {
        return Err(AppError::invalid_state("Comment has already been audited"));
    }
    if comment.audit_status != AuditStatus::Pending {
        return Err(AppError::invalid_state("Only pending comments can be audited"));
    }

    let updated = sqlx::query(
        r#"
        UPDATE comments SET audit_status = ?, updated_at = ?
        WHERE id = ? AND audit_status = ? AND is_deleted = 0
        "#,
    )
    .bind(target)
    .bind(Utc::now())
    .bind(comment_id)
    .bind(AuditStatus::Pending)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Err(AppError::invalid_state("Comment has already been audited"));
    }

    if target == AuditStatus::Approved {
        counters::increment(&mut tx, CounterKind::ArticleComments, comment.article_id, 1).await?;
    }

    tx.commit().await?;

    tracing::info!(comment_id, status = target.label(), "comment audited");
    Ok(())
}

/// Moves every pending comment among `comment_ids` to `target` with one
/// conditional update. Ids that are not pending, or do not exist, are
/// skipped and reported.
pub async fn batch_audit_comments(
    pool: &SqlitePool,
    comment_ids: &[i64],
    target: AuditStatus,
) -> AppResult<BatchAuditResult> {
    if comment_ids.is_empty() {
        return Err(AppError::validation("Comment id list must not be empty"));
    }
    ensure_terminal(target)?;

    let distinct: BTreeSet<i64> = comment_ids.iter().copied().collect();

    let mut tx = db::begin_write(pool).await?;

    let mut query_builder = QueryBuilder::<Sqlite>::new("UPDATE comments SET audit_status = ");
    query_builder.push_bind(target);
    query_builder.push(", updated_at = ");
    query_builder.push_bind(Utc::now());
    query_builder.push(" WHERE audit_status = ");
    query_builder.push_bind(AuditStatus::Pending);
    query_builder.push(" AND is_deleted = 0 AND id IN (");
    {
        let mut separated = query_builder.separated(", ");
        for id in &distinct {
            separated.push_bind(*id);
        }
    }
    query_builder.push(") RETURNING id, article_id");

    let transitioned: Vec<(i64, i64)> = query_builder
        .build_query_as()
        .fetch_all(&mut *tx)
        .await?;

    if transitioned.is_empty() {
        return Err(AppError::invalid_state(
            "None of the selected comments are pending audit",
        ));
    }

    if target == AuditStatus::Approved {
        counters::increment_grouped(
            &mut tx,
            CounterKind::ArticleComments,
            transitioned.iter().map(|(_, article_id)| *article_id),
        )
        .await?;
    }

    tx.commit().await?;

    let total_count = distinct.len() as i64;
    let success_count = transitioned.len() as i64;
    let skipped_count = total_count - success_count;

    tracing::info!(
        success_count,
        skipped_count,
        status = target.label(),
        "batch audit applied"
    );

    Ok(BatchAuditResult {
        success_count,
        skipped_count,
        total_count,
        message: format!(
            "{} audited as {}, {} skipped",
            success_count,
            target.label().to_lowercase(),
            skipped_count
        ),
    })
}
