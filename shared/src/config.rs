//! Environment-driven settings for the repository and its backend.

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};

use crate::{
    hosted_store::HostedCommentBackend, sqlite_store::SqliteCommentBackend,
    storage::CommentBackend, validation::ContentPolicy,
};

/// Default location of the local comments database.
pub const DEFAULT_DB_PATH: &str = "./data/comments.db";
/// Default hosted table name.
pub const DEFAULT_HOSTED_TABLE: &str = "comments";
/// Display name stamped on admin replies.
pub const DEFAULT_ADMIN_DISPLAY_NAME: &str = "Murat Oto Anahtar";
/// Page ids under this prefix are blog articles.
pub const DEFAULT_ARTICLE_PREFIX: &str = "blog/";
/// Words rejected in comment bodies unless overridden.
pub const DEFAULT_BLOCKED_WORDS: [&str; 4] = ["spam", "reklam", "kumar", "bahis"];

const DEFAULT_MAX_COMMENTS_PER_PAGE: usize = 50;
const DEFAULT_BACKEND_TIMEOUT_SECONDS: u64 = 10;

/// Moderation and validation knobs shared by every surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentConfig {
    /// Length bounds for visitor comments.
    pub content_policy: ContentPolicy,
    /// Page-id prefix whose comments follow [`ContentPolicy::ARTICLE`].
    /// `None` applies `content_policy` everywhere.
    pub article_prefix: Option<String>,
    /// Publish visitor comments without review.
    pub auto_approve: bool,
    /// Cap on public threads returned per page.
    pub max_comments_per_page: usize,
    /// Case-insensitive substrings rejected in content.
    pub blocked_words: Vec<String>,
    /// Nickname written on admin replies.
    pub admin_display_name: String,
    /// Upper bound on a single backend call.
    pub backend_timeout: Duration,
}

impl Default for CommentConfig {
    fn default() -> Self {
        Self {
            content_policy: ContentPolicy::GENERAL,
            article_prefix: Some(DEFAULT_ARTICLE_PREFIX.to_string()),
            auto_approve: false,
            max_comments_per_page: DEFAULT_MAX_COMMENTS_PER_PAGE,
            blocked_words: DEFAULT_BLOCKED_WORDS.iter().map(|w| w.to_string()).collect(),
            admin_display_name: DEFAULT_ADMIN_DISPLAY_NAME.to_string(),
            backend_timeout: Duration::from_secs(DEFAULT_BACKEND_TIMEOUT_SECONDS),
        }
    }
}

impl CommentConfig {
    /// Reads `COMMENT_*` variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Same as [`CommentConfig::from_env`] over an arbitrary lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parse_usize = |key: &str| lookup(key).and_then(|v| v.trim().parse::<usize>().ok());

        let min_length = parse_usize("COMMENT_MIN_LENGTH")
            .unwrap_or(defaults.content_policy.min_length)
            .max(1);
        let max_length = parse_usize("COMMENT_MAX_LENGTH")
            .unwrap_or(defaults.content_policy.max_length)
            .max(min_length);
        // An empty value turns article pages off.
        let article_prefix = match lookup("COMMENT_ARTICLE_PREFIX") {
            Some(raw) => Some(raw.trim().trim_start_matches('/').to_string())
                .filter(|prefix| !prefix.is_empty()),
            None => defaults.article_prefix,
        };
        let auto_approve = lookup("COMMENT_AUTO_APPROVE")
            .map(|v| parse_bool_env(&v))
            .unwrap_or(defaults.auto_approve);
        let max_comments_per_page = parse_usize("COMMENT_MAX_PER_PAGE")
            .unwrap_or(defaults.max_comments_per_page)
            .max(1);
        let blocked_words = lookup("COMMENT_BLOCKED_WORDS")
            .map(|v| {
                v.split(',')
                    .map(|word| word.trim().to_string())
                    .filter(|word| !word.is_empty())
                    .collect::<Vec<_>>()
            })
            .unwrap_or(defaults.blocked_words);
        let admin_display_name = lookup("COMMENT_ADMIN_NAME")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.admin_display_name);
        let backend_timeout = lookup("COMMENT_BACKEND_TIMEOUT_SECONDS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or(defaults.backend_timeout);

        Self {
            content_policy: ContentPolicy {
                min_length,
                max_length,
            },
            article_prefix,
            auto_approve,
            max_comments_per_page,
            blocked_words,
            admin_display_name,
            backend_timeout,
        }
    }

    /// Length bounds for visitor text on `page_id`. Article pages keep the
    /// stricter minimum but share the configured maximum.
    pub fn policy_for(&self, page_id: &str) -> ContentPolicy {
        let is_article = self.article_prefix.as_deref().is_some_and(|prefix| {
            page_id.trim().trim_start_matches('/').starts_with(prefix)
        });
        if !is_article {
            return self.content_policy;
        }
        let min_length = ContentPolicy::ARTICLE
            .min_length
            .max(self.content_policy.min_length);
        ContentPolicy {
            min_length,
            max_length: self.content_policy.max_length.max(min_length),
        }
    }
}

/// Which store holds the `comments` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// Embedded SQLite file.
    Sqlite {
        /// Database file, created on first open.
        db_path: PathBuf,
    },
    /// PostgREST-style hosted service.
    Hosted {
        /// Project base URL.
        url: String,
        /// Anonymous or service key.
        api_key: String,
        /// Table name.
        table: String,
    },
}

impl BackendConfig {
    /// Reads `COMMENT_BACKEND` and the variables of the chosen backend.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Same as [`BackendConfig::from_env`] over an arbitrary lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let kind = lookup("COMMENT_BACKEND")
            .map(|v| v.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "sqlite".to_string());
        match kind.as_str() {
            "sqlite" => {
                let db_path = lookup("COMMENT_DB_PATH")
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
                Ok(Self::Sqlite {
                    db_path: PathBuf::from(db_path),
                })
            },
            "hosted" => {
                let url = lookup("COMMENT_HOSTED_URL")
                    .filter(|v| !v.trim().is_empty())
                    .context("COMMENT_HOSTED_URL is required for the hosted backend")?;
                let api_key = lookup("COMMENT_HOSTED_KEY")
                    .filter(|v| !v.trim().is_empty())
                    .context("COMMENT_HOSTED_KEY is required for the hosted backend")?;
                let table = lookup("COMMENT_HOSTED_TABLE")
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_HOSTED_TABLE.to_string());
                Ok(Self::Hosted {
                    url: url.trim().to_string(),
                    api_key: api_key.trim().to_string(),
                    table: table.trim().to_string(),
                })
            },
            other => bail!("unsupported COMMENT_BACKEND `{other}` (expected sqlite or hosted)"),
        }
    }

    /// Opens the configured backend. `timeout` bounds hosted HTTP requests.
    pub fn connect(&self, timeout: Duration) -> Result<Arc<dyn CommentBackend>> {
        let backend: Arc<dyn CommentBackend> = match self {
            Self::Sqlite {
                db_path,
            } => Arc::new(SqliteCommentBackend::open(db_path)?),
            Self::Hosted {
                url,
                api_key,
                table,
            } => Arc::new(HostedCommentBackend::new(url, api_key, table, timeout)?),
        };
        Ok(backend)
    }
}

/// `1`, `true`, `yes`, `y` and `on` are truthy; anything else is false.
pub fn parse_bool_env(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "y" | "on")
}
