//! Denormalized counter maintenance.
//!
//! Every counter write is a single arithmetic `UPDATE` evaluated by the
//! store, never a read-modify-write in application code. Decrements clamp at
//! zero with `MAX(column - n, 0)`, so overlapping decrements cannot drive a
//! counter negative.

use std::collections::BTreeMap;

use sqlx::{Executor, Sqlite, SqliteConnection};

use crate::error::AppResult;
use crate::models::ArticleCounters;

/// Every counter column the core maintains. The table and column names are
/// resolved here and nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterKind {
    ArticleViews,
    ArticleLikes,
    ArticleComments,
    ArticleCollects,
    CommentLikes,
}

impl CounterKind {
    fn table(self) -> &'static str {
        match self {
            Self::CommentLikes => "comments",
            _ => "articles",
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::ArticleViews => "view_count",
            Self::ArticleLikes | Self::CommentLikes => "like_count",
            Self::ArticleComments => "comment_count",
            Self::ArticleCollects => "collect_count",
        }
    }

    fn increment_sql(self) -> String {
        let column = self.column();
        format!(
            "UPDATE {} SET {column} = {column} + ? WHERE id = ?",
            self.table()
        )
    }

    fn decrement_sql(self) -> String {
        let column = self.column();
        format!(
            "UPDATE {} SET {column} = MAX({column} - ?, 0) WHERE id = ?",
            self.table()
        )
    }
}

/// Adds `amount` to one counter. Non-positive amounts are a no-op.
/// Returns the number of rows touched (0 when the owner does not exist).
pub async fn increment(
    conn: &mut SqliteConnection,
    kind: CounterKind,
    owner_id: i64,
    amount: i64,
) -> AppResult<u64> {
    if amount <= 0 {
        return Ok(0);
    }

    let result = sqlx::query(&kind.increment_sql())
        .bind(amount)
        .bind(owner_id)
        .execute(&mut *conn)
        .await?;

    tracing::debug!(?kind, owner_id, amount, "counter incremented");
    Ok(result.rows_affected())
}

/// Subtracts `amount` from one counter, flooring at zero.
pub async fn decrement(
    conn: &mut SqliteConnection,
    kind: CounterKind,
    owner_id: i64,
    amount: i64,
) -> AppResult<u64> {
    if amount <= 0 {
        return Ok(0);
    }

    let result = sqlx::query(&kind.decrement_sql())
        .bind(amount)
        .bind(owner_id)
        .execute(&mut *conn)
        .await?;

    tracing::debug!(?kind, owner_id, amount, "counter decremented");
    Ok(result.rows_affected())
}

/// Counts occurrences per owner id. One entry per source row goes in, one
/// `(owner, count)` pair per distinct owner comes out.
pub fn group_by_owner<I>(owner_ids: I) -> BTreeMap<i64, i64>
where
    I: IntoIterator<Item = i64>,
{
    let mut grouped = BTreeMap::new();
    for owner_id in owner_ids {
        *grouped.entry(owner_id).or_insert(0) += 1;
    }
    grouped
}

/// Increments once per distinct owner, by the number of source rows that
/// owner appears in.
pub async fn increment_grouped<I>(
    conn: &mut SqliteConnection,
    kind: CounterKind,
    owner_ids: I,
) -> AppResult<()>
where
    I: IntoIterator<Item = i64>,
{
    for (owner_id, amount) in group_by_owner(owner_ids) {
        increment(conn, kind, owner_id, amount).await?;
    }
    Ok(())
}

pub async fn decrement_grouped<I>(
    conn: &mut SqliteConnection,
    kind: CounterKind,
    owner_ids: I,
) -> AppResult<()>
where
    I: IntoIterator<Item = i64>,
{
    for (owner_id, amount) in group_by_owner(owner_ids) {
        decrement(conn, kind, owner_id, amount).await?;
    }
    Ok(())
}

pub async fn fetch_article_counters<'e, E>(
    executor: E,
    article_id: i64,
) -> AppResult<Option<ArticleCounters>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let counters = sqlx::query_as::<_, ArticleCounters>(
        r#"
        SELECT view_count, like_count, comment_count, collect_count
        FROM articles
        WHERE id = ? AND is_deleted = 0
        "#,
    )
    .bind(article_id)
    .fetch_optional(executor)
    .await?;

    Ok(counters)
}
