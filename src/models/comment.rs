use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, AppResult};

/// Moderation state of a comment. Stored as its integer code.
///
/// `Pending` is the only non-terminal state: a comment moves to `Approved`
/// or `Rejected` exactly once and never leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[repr(i64)]
pub enum AuditStatus {
    Pending = 0,
    Approved = 1,
    Rejected = 2,
}

impl AuditStatus {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Approved),
            2 => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Parses an auditor-supplied target. Only the two terminal states are
    /// valid targets.
    pub fn audit_target(code: i64) -> AppResult<Self> {
        match Self::from_code(code) {
            Some(status) if status.is_terminal() => Ok(status),
            _ => Err(AppError::invalid_state("Invalid audit status")),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    /// `None` exactly when this is a root comment. For replies it points at
    /// the thread's root, never at an intermediate reply.
    pub root_id: Option<i64>,
    pub reply_user_id: Option<i64>,
    pub content: String,
    pub like_count: i64,
    pub audit_status: AuditStatus,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.root_id.is_none()
    }

    pub fn is_approved(&self) -> bool {
        self.audit_status == AuditStatus::Approved
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateComment {
    pub article_id: i64,
    pub parent_id: Option<i64>,
    pub reply_user_id: Option<i64>,
    pub content: String,
}

/// A comment as shown to readers, with its flattened replies attached when
/// it is a root.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub article_id: i64,
    pub user_id: i64,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub parent_id: Option<i64>,
    pub root_id: Option<i64>,
    pub reply_user_id: Option<i64>,
    pub reply_nickname: Option<String>,
    pub content: String,
    pub like_count: i64,
    pub is_liked: bool,
    pub created_at: DateTime<Utc>,
    pub children: Vec<CommentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminCommentView {
    pub id: i64,
    pub article_id: i64,
    pub article_title: Option<String>,
    pub user_id: i64,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub parent_id: Option<i64>,
    pub root_id: Option<i64>,
    pub reply_user_id: Option<i64>,
    pub reply_nickname: Option<String>,
    pub content: String,
    pub like_count: i64,
    pub audit_status: AuditStatus,
    pub audit_status_label: &'static str,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminCommentQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub article_id: Option<i64>,
    pub user_id: Option<i64>,
    pub audit_status: Option<i64>,
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchAuditResult {
    pub success_count: i64,
    pub skipped_count: i64,
    pub total_count: i64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchDeleteResult {
    pub deleted_root_count: i64,
    pub deleted_child_count: i64,
    pub not_found_count: i64,
    pub message: String,
}
