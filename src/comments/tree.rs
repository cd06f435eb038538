use std::collections::{HashMap, HashSet};

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use super::{fetch_user_map, find_comment};
use crate::config::CommentPolicy;
use crate::error::{AppError, AppResult};
use crate::identity::Identity;
use crate::interactions::{self, InteractionKind};
use crate::models::{Comment, CommentView, Page, PageRequest, User};

/// One page of approved root comments for an article, newest first, each
/// carrying at most `policy.max_replies_per_root` replies in chronological
/// order.
pub async fn list_article_comments(
    pool: &SqlitePool,
    policy: &CommentPolicy,
    identity: Identity,
    article_id: i64,
    page: PageRequest,
) -> AppResult<Page<CommentView>> {
    let (article_exists,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM articles WHERE id = ? AND is_deleted = 0")
            .bind(article_id)
            .fetch_one(pool)
            .await?;
    if article_exists == 0 {
        return Err(AppError::not_found("Article not found"));
    }

    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM comments
        WHERE article_id = ? AND root_id IS NULL AND audit_status = 1 AND is_deleted = 0
        "#,
    )
    .bind(article_id)
    .fetch_one(pool)
    .await?;

    let roots = sqlx::query_as::<_, Comment>(
        r#"
        SELECT * FROM comments
        WHERE article_id = ? AND root_id IS NULL AND audit_status = 1 AND is_deleted = 0
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(article_id)
    .bind(page.per_page())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    if roots.is_empty() {
        return Ok(Page::empty(page, total));
    }

    let root_ids: Vec<i64> = roots.iter().map(|c| c.id).collect();
    let replies = fetch_reply_previews(pool, &root_ids, policy.max_replies_per_root).await?;

    let everything: Vec<&Comment> = roots.iter().chain(replies.iter()).collect();
    let users = fetch_user_map(pool, &everything).await?;
    let comment_ids: Vec<i64> = everything.iter().map(|c| c.id).collect();
    let liked =
        interactions::interacted_ids(pool, InteractionKind::CommentLike, identity, &comment_ids)
            .await?;

    let mut replies_by_root: HashMap<i64, Vec<CommentView>> = HashMap::new();
    for reply in &replies {
        let Some(root_id) = reply.root_id else {
            continue;
        };
        replies_by_root
            .entry(root_id)
            .or_default()
            .push(to_view(reply, &users, &liked));
    }

    let records = roots
        .iter()
        .map(|root| {
            let mut view = to_view(root, &users, &liked);
            view.children = replies_by_root.remove(&root.id).unwrap_or_default();
            view
        })
        .collect();

    Ok(Page::new(page, total, records))
}

/// First `cap` approved replies under each of `root_ids`, fetched in a
/// single query. The result holds at most `cap * root_ids.len()` rows.
async fn fetch_reply_previews(
    pool: &SqlitePool,
    root_ids: &[i64],
    cap: i64,
) -> AppResult<Vec<Comment>> {
    if root_ids.is_empty() || cap <= 0 {
        return Ok(Vec::new());
    }

    let mut query_builder = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT * FROM (
            SELECT c.*,
                   ROW_NUMBER() OVER (PARTITION BY c.root_id ORDER BY c.created_at ASC, c.id ASC) AS reply_rank
            FROM comments c
            WHERE c.audit_status = 1 AND c.is_deleted = 0 AND c.root_id IN (
        "#,
    );
    {
        let mut separated = query_builder.separated(", ");
        for id in root_ids {
            separated.push_bind(*id);
        }
    }
    query_builder.push(")) WHERE reply_rank <= ");
    query_builder.push_bind(cap);
    query_builder.push(" ORDER BY created_at ASC, id ASC");

    let replies = query_builder
        .build_query_as::<Comment>()
        .fetch_all(pool)
        .await?;
    Ok(replies)
}

/// Offset-paginated approved replies under one root, oldest first.
pub async fn list_replies(
    pool: &SqlitePool,
    identity: Identity,
    root_id: i64,
    page: PageRequest,
) -> AppResult<Page<CommentView>> {
    let root = match find_comment(pool, root_id).await? {
        Some(comment) if comment.is_root() => comment,
        Some(_) => return Err(AppError::not_found("Root comment not found")),
        None => {
            report_orphaned_replies(pool, root_id).await?;
            return Err(AppError::not_found("Comment not found"));
        }
    };

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM comments WHERE root_id = ? AND audit_status = 1 AND is_deleted = 0",
    )
    .bind(root.id)
    .fetch_one(pool)
    .await?;

    let replies = sqlx::query_as::<_, Comment>(
        r#"
        SELECT * FROM comments
        WHERE root_id = ? AND audit_status = 1 AND is_deleted = 0
        ORDER BY created_at ASC, id ASC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(root.id)
    .bind(page.per_page())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    if replies.is_empty() {
        return Ok(Page::empty(page, total));
    }

    let refs: Vec<&Comment> = replies.iter().collect();
    let users = fetch_user_map(pool, &refs).await?;
    let ids: Vec<i64> = replies.iter().map(|c| c.id).collect();
    let liked =
        interactions::interacted_ids(pool, InteractionKind::CommentLike, identity, &ids).await?;

    let records = replies
        .iter()
        .map(|reply| to_view(reply, &users, &liked))
        .collect();
    Ok(Page::new(page, total, records))
}

// Deletion cascades to replies, so live replies under a missing root mean
// the store was modified outside this crate.
async fn report_orphaned_replies(pool: &SqlitePool, root_id: i64) -> AppResult<()> {
    let (orphans,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM comments WHERE root_id = ? AND is_deleted = 0")
            .bind(root_id)
            .fetch_one(pool)
            .await?;

    if orphans > 0 {
        tracing::error!(root_id, orphans, "live replies found under a missing root comment");
    }
    Ok(())
}

fn to_view(comment: &Comment, users: &HashMap<i64, User>, liked: &HashSet<i64>) -> CommentView {
    let author = users.get(&comment.user_id);
    let reply_nickname = comment
        .reply_user_id
        .and_then(|id| users.get(&id))
        .map(|u| u.display_name().to_string());

    CommentView {
        id: comment.id,
        article_id: comment.article_id,
        user_id: comment.user_id,
        nickname: author.map(|u| u.display_name().to_string()),
        avatar_url: author.and_then(|u| u.avatar_url.clone()),
        parent_id: comment.parent_id,
        root_id: comment.root_id,
        reply_user_id: comment.reply_user_id,
        reply_nickname,
        content: comment.content.clone(),
        like_count: comment.like_count,
        is_liked: liked.contains(&comment.id),
        created_at: comment.created_at,
        children: Vec::new(),
    }
}
