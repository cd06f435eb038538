pub mod admin;
pub mod articles;
pub mod comments;

use std::sync::Arc;

use axum::{Router, http::HeaderMap, response::IntoResponse, routing::get};
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::identity::{Identity, resolve_identity};

pub use admin::admin_routes;
pub use articles::articles_routes;
pub use comments::comments_routes;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: AppConfig) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    pub(crate) async fn identity(&self, headers: &HeaderMap) -> AppResult<Identity> {
        resolve_identity(&self.pool, &self.config.secret_key, headers).await
    }
}

/// Every API route, without transport layers.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", comments_routes().merge(articles_routes()))
        .nest("/api/admin", admin_routes())
        .route("/api/health", get(health_check))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    axum::Json(serde_json::json!({"status": "healthy"}))
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use jsonwebtoken::{EncodingKey, Header, encode};
    use tower::ServiceExt;

    use super::*;
    use crate::identity::Claims;

    pub const SECRET: &str = "test-secret";

    pub fn state(pool: SqlitePool) -> AppState {
        let config = AppConfig::from_lookup(|key| match key {
            "SECRET_KEY" => Some(SECRET.to_string()),
            _ => None,
        })
        .expect("test config");
        AppState::new(pool, config)
    }

    pub fn token(username: &str) -> String {
        let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize;
        encode(
            &Header::default(),
            &Claims {
                sub: username.to_string(),
                exp,
            },
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("encode token")
    }

    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        username: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(username) = username {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token(username)));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("build request");

        let response = app.clone().oneshot(request).await.expect("route request");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }
}
