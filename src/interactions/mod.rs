//! Like and collect toggles, plus view recording.
//!
//! The mapping row is the source of truth; the counter on the owning row is
//! a projection of it and moves in the same transaction. The toggle never
//! reads before it writes: it tries to delete the caller's row, and only if
//! nothing was deleted inserts one guarded by the `UNIQUE (entity, user)`
//! constraint. An insert that hits the constraint means a concurrent toggle
//! already added the row, so it is treated as a no-op.

use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use sqlx::{Executor, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::counters::{self, CounterKind};
use crate::db;
use crate::error::{AppError, AppResult};
use crate::identity::Identity;
use crate::models::ViewerInteraction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    ArticleLike,
    ArticleCollect,
    CommentLike,
}

impl InteractionKind {
    fn mapping_table(self) -> &'static str {
        match self {
            Self::ArticleLike => "article_likes",
            Self::ArticleCollect => "article_collects",
            Self::CommentLike => "comment_likes",
        }
    }

    fn entity_column(self) -> &'static str {
        match self {
            Self::ArticleLike | Self::ArticleCollect => "article_id",
            Self::CommentLike => "comment_id",
        }
    }

    fn entity_table(self) -> &'static str {
        match self {
            Self::ArticleLike | Self::ArticleCollect => "articles",
            Self::CommentLike => "comments",
        }
    }

    fn counter(self) -> CounterKind {
        match self {
            Self::ArticleLike => CounterKind::ArticleLikes,
            Self::ArticleCollect => CounterKind::ArticleCollects,
            Self::CommentLike => CounterKind::CommentLikes,
        }
    }

    fn not_found_message(self) -> &'static str {
        match self {
            Self::ArticleLike | Self::ArticleCollect => "Article not found",
            Self::CommentLike => "Comment not found",
        }
    }
}

/// State of the caller's mapping row after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleOutcome {
    Added,
    Removed,
}

/// Flips the caller's like/collect on one entity.
pub async fn toggle(
    pool: &SqlitePool,
    kind: InteractionKind,
    entity_id: i64,
    identity: Identity,
) -> AppResult<ToggleOutcome> {
    let user_id = identity.require_user()?;

    let mut tx = db::begin_write(pool).await?;
    ensure_entity_exists(&mut tx, kind, entity_id).await?;
    let outcome = toggle_mapping(&mut tx, kind, entity_id, user_id).await?;
    tx.commit().await?;

    tracing::debug!(?kind, entity_id, user_id, ?outcome, "interaction toggled");
    Ok(outcome)
}

async fn ensure_entity_exists(
    conn: &mut SqliteConnection,
    kind: InteractionKind,
    entity_id: i64,
) -> AppResult<()> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE id = ? AND is_deleted = 0",
        kind.entity_table()
    );
    let (count,): (i64,) = sqlx::query_as(&sql)
        .bind(entity_id)
        .fetch_one(&mut *conn)
        .await?;

    if count == 0 {
        return Err(AppError::not_found(kind.not_found_message()));
    }
    Ok(())
}

async fn toggle_mapping(
    conn: &mut SqliteConnection,
    kind: InteractionKind,
    entity_id: i64,
    user_id: i64,
) -> AppResult<ToggleOutcome> {
    let table = kind.mapping_table();
    let column = kind.entity_column();

    let removed = sqlx::query(&format!(
        "DELETE FROM {table} WHERE {column} = ? AND user_id = ?"
    ))
    .bind(entity_id)
    .bind(user_id)
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if removed > 0 {
        counters::decrement(conn, kind.counter(), entity_id, removed as i64).await?;
        return Ok(ToggleOutcome::Removed);
    }

    let inserted = sqlx::query(&format!(
        "INSERT INTO {table} ({column}, user_id, created_at) VALUES (?, ?, ?) \
         ON CONFLICT ({column}, user_id) DO NOTHING"
    ))
    .bind(entity_id)
    .bind(user_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?
    .rows_affected();

    if inserted == 0 {
        tracing::warn!(
            ?kind,
            entity_id,
            user_id,
            "mapping row already present; concurrent toggle won"
        );
    } else {
        counters::increment(conn, kind.counter(), entity_id, inserted as i64).await?;
    }

    Ok(ToggleOutcome::Added)
}

/// Removes every mapping row of `kind` attached to the given entities.
pub(crate) async fn delete_mappings(
    conn: &mut SqliteConnection,
    kind: InteractionKind,
    entity_ids: &[i64],
) -> AppResult<u64> {
    if entity_ids.is_empty() {
        return Ok(0);
    }

    let mut query_builder = QueryBuilder::<Sqlite>::new(format!(
        "DELETE FROM {} WHERE {} IN (",
        kind.mapping_table(),
        kind.entity_column()
    ));
    {
        let mut separated = query_builder.separated(", ");
        for id in entity_ids {
            separated.push_bind(*id);
        }
    }
    query_builder.push(")");

    let result = query_builder.build().execute(&mut *conn).await?;
    Ok(result.rows_affected())
}

/// Which of `entity_ids` the caller has a mapping row for. Anonymous callers
/// get an empty set without touching the store.
pub async fn interacted_ids<'e, E>(
    executor: E,
    kind: InteractionKind,
    identity: Identity,
    entity_ids: &[i64],
) -> AppResult<HashSet<i64>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let Some(user_id) = identity.user_id() else {
        return Ok(HashSet::new());
    };
    if entity_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let mut query_builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {column} FROM {table} WHERE user_id = ",
        column = kind.entity_column(),
        table = kind.mapping_table()
    ));
    query_builder.push_bind(user_id);
    query_builder.push(format!(" AND {} IN (", kind.entity_column()));
    {
        let mut separated = query_builder.separated(", ");
        for id in entity_ids {
            separated.push_bind(*id);
        }
    }
    query_builder.push(")");

    let rows: Vec<(i64,)> = query_builder.build_query_as().fetch_all(executor).await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn viewer_interaction(
    pool: &SqlitePool,
    article_id: i64,
    identity: Identity,
) -> AppResult<ViewerInteraction> {
    let liked = interacted_ids(pool, InteractionKind::ArticleLike, identity, &[article_id]).await?;
    let collected =
        interacted_ids(pool, InteractionKind::ArticleCollect, identity, &[article_id]).await?;

    Ok(ViewerInteraction {
        liked: liked.contains(&article_id),
        collected: collected.contains(&article_id),
    })
}

/// Counts one view of a live article.
pub async fn record_view(pool: &SqlitePool, article_id: i64) -> AppResult<()> {
    let mut tx = db::begin_write(pool).await?;
    ensure_entity_exists(&mut tx, InteractionKind::ArticleLike, article_id).await?;
    counters::increment(&mut tx, CounterKind::ArticleViews, article_id, 1).await?;
    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::models::AuditStatus;

    #[tokio::test]
    async fn toggling_twice_restores_row_and_counter() {
        let pool = fixtures::pool().await;
        let author = fixtures::user(&pool, "alice").await;
        let reader = fixtures::user(&pool, "bob").await;
        let article = fixtures::article(&pool, author).await;
        let identity = Identity::user(reader);

        let first = toggle(&pool, InteractionKind::ArticleLike, article, identity)
            .await
            .unwrap();
        assert_eq!(first, ToggleOutcome::Added);
        assert_eq!(fixtures::counters(&pool, article).await.like_count, 1);
        assert!(viewer_interaction(&pool, article, identity).await.unwrap().liked);

        let second = toggle(&pool, InteractionKind::ArticleLike, article, identity)
            .await
            .unwrap();
        assert_eq!(second, ToggleOutcome::Removed);
        assert_eq!(fixtures::counters(&pool, article).await.like_count, 0);
        assert_eq!(
            fixtures::count_rows(&pool, "SELECT COUNT(*) FROM article_likes").await,
            0
        );
    }

    #[tokio::test]
    async fn like_and_collect_are_tracked_separately() {
        let pool = fixtures::pool().await;
        let author = fixtures::user(&pool, "alice").await;
        let article = fixtures::article(&pool, author).await;
        let identity = Identity::user(author);

        toggle(&pool, InteractionKind::ArticleCollect, article, identity)
            .await
            .unwrap();

        let counters = fixtures::counters(&pool, article).await;
        assert_eq!(counters.collect_count, 1);
        assert_eq!(counters.like_count, 0);

        let state = viewer_interaction(&pool, article, identity).await.unwrap();
        assert!(state.collected);
        assert!(!state.liked);
    }

    #[tokio::test]
    async fn anonymous_callers_cannot_toggle() {
        let pool = fixtures::pool().await;
        let author = fixtures::user(&pool, "alice").await;
        let article = fixtures::article(&pool, author).await;

        let err = toggle(&pool, InteractionKind::ArticleLike, article, Identity::Anonymous)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
        assert_eq!(
            viewer_interaction(&pool, article, Identity::Anonymous)
                .await
                .unwrap(),
            ViewerInteraction::default()
        );
    }

    #[tokio::test]
    async fn toggling_a_missing_entity_is_not_found() {
        let pool = fixtures::pool().await;
        let user = fixtures::user(&pool, "alice").await;

        let err = toggle(&pool, InteractionKind::CommentLike, 404, Identity::user(user))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Comment not found"));
    }

    #[tokio::test]
    async fn pre_existing_row_is_removed_without_double_counting() {
        let pool = fixtures::pool().await;
        let author = fixtures::user(&pool, "alice").await;
        let article = fixtures::article(&pool, author).await;
        let comment =
            fixtures::comment(&pool, article, author, None, AuditStatus::Approved, 0).await;
        let mut conn = pool.acquire().await.unwrap();

        // A row inserted by a racing toggle that has not bumped the counter yet.
        sqlx::query("INSERT INTO comment_likes (comment_id, user_id, created_at) VALUES (?, ?, ?)")
            .bind(comment)
            .bind(author)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await
            .unwrap();
        let outcome = toggle_mapping(&mut conn, InteractionKind::CommentLike, comment, author)
            .await
            .unwrap();
        drop(conn);

        assert_eq!(outcome, ToggleOutcome::Removed);
        assert_eq!(fixtures::comment_row(&pool, comment).await.like_count, 0);
    }

    #[tokio::test]
    async fn record_view_counts_and_rejects_missing_articles() {
        let pool = fixtures::pool().await;
        let author = fixtures::user(&pool, "alice").await;
        let article = fixtures::article(&pool, author).await;

        record_view(&pool, article).await.unwrap();
        record_view(&pool, article).await.unwrap();
        assert_eq!(fixtures::counters(&pool, article).await.view_count, 2);

        let err = record_view(&pool, article + 1).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleted_articles_do_not_collect_views() {
        let pool = fixtures::pool().await;
        let author = fixtures::user(&pool, "alice").await;
        let article = fixtures::article(&pool, author).await;
        sqlx::query("UPDATE articles SET is_deleted = 1 WHERE id = ?")
            .bind(article)
            .execute(&pool)
            .await
            .unwrap();

        let err = record_view(&pool, article).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Article not found"));
        assert_eq!(fixtures::counters(&pool, article).await.view_count, 0);
    }
}
