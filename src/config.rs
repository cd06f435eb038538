use std::str::FromStr;

use crate::models::AuditStatus;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://blog.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_MAX_REPLIES_PER_ROOT: i64 = 3;
pub const DEFAULT_HOT_CANDIDATE_POOL: i64 = 100;
pub const DEFAULT_HOT_LIMIT: i64 = 5;

/// Knobs that shape how comments are created and displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentPolicy {
    /// Status a freshly published comment is stored with. Either
    /// `Approved` (counted immediately) or `Pending` (waits for an auditor).
    pub create_status: AuditStatus,
    /// Replies preloaded under each root comment in the tree view.
    pub max_replies_per_root: i64,
}

impl Default for CommentPolicy {
    fn default() -> Self {
        Self {
            create_status: AuditStatus::Approved,
            max_replies_per_root: DEFAULT_MAX_REPLIES_PER_ROOT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub secret_key: String,
    pub bind_addr: String,
    pub comment_policy: CommentPolicy,
    pub hot_candidate_pool: i64,
    pub hot_default_limit: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

impl AppConfig {
    /// Reads configuration from the process environment. Call
    /// `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_key = lookup("SECRET_KEY")
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::Missing("SECRET_KEY"))?;

        let create_status = match lookup("COMMENT_CREATE_STATUS").as_deref() {
            None | Some("approved") => AuditStatus::Approved,
            Some("pending") => AuditStatus::Pending,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "COMMENT_CREATE_STATUS",
                    value: other.to_string(),
                });
            }
        };

        let max_replies_per_root =
            parse_or(&lookup, "MAX_REPLIES_PER_ROOT", DEFAULT_MAX_REPLIES_PER_ROOT)?;
        if max_replies_per_root < 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_REPLIES_PER_ROOT",
                value: max_replies_per_root.to_string(),
            });
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            secret_key,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            comment_policy: CommentPolicy {
                create_status,
                max_replies_per_root,
            },
            hot_candidate_pool: parse_or(&lookup, "HOT_CANDIDATE_POOL", DEFAULT_HOT_CANDIDATE_POOL)?,
            hot_default_limit: parse_or(&lookup, "HOT_DEFAULT_LIMIT", DEFAULT_HOT_LIMIT)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = AppConfig::from_lookup(lookup_from(&[("SECRET_KEY", "s3cret")])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.comment_policy, CommentPolicy::default());
        assert_eq!(config.hot_candidate_pool, 100);
        assert_eq!(config.hot_default_limit, 5);
    }

    #[test]
    fn secret_is_required() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SECRET_KEY")));
    }

    #[test]
    fn pending_create_status_and_reply_cap_are_read() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("SECRET_KEY", "s3cret"),
            ("COMMENT_CREATE_STATUS", "pending"),
            ("MAX_REPLIES_PER_ROOT", "10"),
        ]))
        .unwrap();
        assert_eq!(config.comment_policy.create_status, AuditStatus::Pending);
        assert_eq!(config.comment_policy.max_replies_per_root, 10);
    }

    #[test]
    fn rejects_unknown_create_status() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("SECRET_KEY", "s3cret"),
            ("COMMENT_CREATE_STATUS", "rejected"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "COMMENT_CREATE_STATUS",
                ..
            }
        ));
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("SECRET_KEY", "s3cret"),
            ("HOT_CANDIDATE_POOL", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "HOT_CANDIDATE_POOL", .. }));
    }
}
