use axum::http::{HeaderMap, header::AUTHORIZATION};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// The caller of a core operation. Passed explicitly into every operation
/// that needs to know who is acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    User { id: i64, is_admin: bool },
}

impl Identity {
    pub fn user(id: i64) -> Self {
        Self::User {
            id,
            is_admin: false,
        }
    }

    pub fn admin(id: i64) -> Self {
        Self::User { id, is_admin: true }
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Self::Anonymous => None,
            Self::User { id, .. } => Some(*id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    pub fn require_user(&self) -> AppResult<i64> {
        self.user_id()
            .ok_or_else(|| AppError::Unauthenticated("Login required".to_string()))
    }

    pub fn require_admin(&self) -> AppResult<i64> {
        match self {
            Self::User { id, is_admin: true } => Ok(*id),
            Self::User { .. } => Err(AppError::permission_denied("Admin access required")),
            Self::Anonymous => Err(AppError::Unauthenticated("Login required".to_string())),
        }
    }
}

/// Resolves the bearer token on a request. A missing, malformed or expired
/// token, or one naming an unknown user, yields `Anonymous`.
pub async fn resolve_identity(
    pool: &SqlitePool,
    secret: &str,
    headers: &HeaderMap,
) -> AppResult<Identity> {
    let Some(auth_header) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
        return Ok(Identity::Anonymous);
    };

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return Ok(Identity::Anonymous);
    };

    let token_data = match decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => data,
        Err(e) => {
            tracing::debug!("rejected bearer token: {}", e);
            return Ok(Identity::Anonymous);
        }
    };

    let user = sqlx::query_as::<_, (i64, bool)>("SELECT id, is_admin FROM users WHERE username = ?")
        .bind(&token_data.claims.sub)
        .fetch_optional(pool)
        .await?;

    Ok(match user {
        Some((id, is_admin)) => Identity::User { id, is_admin },
        None => Identity::Anonymous,
    })
}
