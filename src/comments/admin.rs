use std::collections::{BTreeSet, HashMap};

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::fetch_user_map;
use crate::error::{AppError, AppResult};
use crate::models::{AdminCommentQuery, AdminCommentView, AuditStatus, Comment, Page, PageRequest};

struct Filters<'a> {
    article_id: Option<i64>,
    user_id: Option<i64>,
    audit_status: Option<AuditStatus>,
    keyword: Option<&'a str>,
}

impl<'a> Filters<'a> {
    fn from_query(query: &'a AdminCommentQuery) -> AppResult<Self> {
        let audit_status = match query.audit_status {
            Some(code) => Some(
                AuditStatus::from_code(code)
                    .ok_or_else(|| AppError::validation("Invalid audit status filter"))?,
            ),
            None => None,
        };

        Ok(Self {
            article_id: query.article_id,
            user_id: query.user_id,
            audit_status,
            keyword: query
                .keyword
                .as_deref()
                .map(str::trim)
                .filter(|k| !k.is_empty()),
        })
    }

    fn push_where(&self, query_builder: &mut QueryBuilder<'a, Sqlite>) {
        query_builder.push(" WHERE is_deleted = 0");
        if let Some(article_id) = self.article_id {
            query_builder.push(" AND article_id = ");
            query_builder.push_bind(article_id);
        }
        if let Some(user_id) = self.user_id {
            query_builder.push(" AND user_id = ");
            query_builder.push_bind(user_id);
        }
        if let Some(status) = self.audit_status {
            query_builder.push(" AND audit_status = ");
            query_builder.push_bind(status);
        }
        if let Some(keyword) = self.keyword {
            query_builder.push(" AND instr(lower(content), lower(");
            query_builder.push_bind(keyword);
            query_builder.push(")) > 0");
        }
    }
}

/// Moderation listing across all articles, newest first, in any audit state.
pub async fn list_admin_comments(
    pool: &SqlitePool,
    query: &AdminCommentQuery,
) -> AppResult<Page<AdminCommentView>> {
    let page = PageRequest {
        page: query.page,
        per_page: query.per_page,
    };
    let filters = Filters::from_query(query)?;

    let mut count_builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM comments");
    filters.push_where(&mut count_builder);
    let (total,): (i64,) = count_builder.build_query_as().fetch_one(pool).await?;

    let mut select_builder = QueryBuilder::<Sqlite>::new("SELECT * FROM comments");
    filters.push_where(&mut select_builder);
    select_builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
    select_builder.push_bind(page.per_page());
    select_builder.push(" OFFSET ");
    select_builder.push_bind(page.offset());

    let comments = select_builder
        .build_query_as::<Comment>()
        .fetch_all(pool)
        .await?;

    if comments.is_empty() {
        return Ok(Page::empty(page, total));
    }

    let refs: Vec<&Comment> = comments.iter().collect();
    let users = fetch_user_map(pool, &refs).await?;
    let titles = fetch_article_titles(pool, comments.iter().map(|c| c.article_id)).await?;

    let records = comments
        .into_iter()
        .map(|comment| {
            let author = users.get(&comment.user_id);
            AdminCommentView {
                id: comment.id,
                article_id: comment.article_id,
                article_title: titles.get(&comment.article_id).cloned(),
                user_id: comment.user_id,
                nickname: author.map(|u| u.display_name().to_string()),
                avatar_url: author.and_then(|u| u.avatar_url.clone()),
                parent_id: comment.parent_id,
                root_id: comment.root_id,
                reply_user_id: comment.reply_user_id,
                reply_nickname: comment
                    .reply_user_id
                    .and_then(|id| users.get(&id))
                    .map(|u| u.display_name().to_string()),
                content: comment.content,
                like_count: comment.like_count,
                audit_status: comment.audit_status,
                audit_status_label: comment.audit_status.label(),
                created_at: comment.created_at,
            }
        })
        .collect();

    Ok(Page::new(page, total, records))
}

async fn fetch_article_titles<I>(pool: &SqlitePool, article_ids: I) -> AppResult<HashMap<i64, String>>
where
    I: IntoIterator<Item = i64>,
{
    let ids: BTreeSet<i64> = article_ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut query_builder = QueryBuilder::<Sqlite>::new("SELECT id, title FROM articles WHERE id IN (");
    {
        let mut separated = query_builder.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
    }
    query_builder.push(")");

    let rows: Vec<(i64, String)> = query_builder.build_query_as().fetch_all(pool).await?;
    Ok(rows.into_iter().collect())
}

pub async fn pending_audit_count(pool: &SqlitePool) -> AppResult<i64> {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM comments WHERE audit_status = ? AND is_deleted = 0")
            .bind(AuditStatus::Pending)
            .fetch_one(pool)
            .await?;
    Ok(count)
}
