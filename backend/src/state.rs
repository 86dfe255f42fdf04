use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, Utc};
use locksite_shared::{BackendConfig, CommentConfig, CommentRepository};

use crate::rate_limit::{RateLimitConfig, SubmissionRateLimiter};

/// Shared handles cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<CommentRepository>,
    /// Per-client quota for visitor submissions.
    pub rate_limiter: Arc<SubmissionRateLimiter>,
    /// Root of the static site served as the router fallback.
    pub site_dir: PathBuf,
    /// Reported as uptime by `test-connection`.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wraps an already built repository and limiter.
    pub fn new(
        repository: CommentRepository,
        rate_limiter: SubmissionRateLimiter,
        site_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repository: Arc::new(repository),
            rate_limiter: Arc::new(rate_limiter),
            site_dir: site_dir.into(),
            started_at: Utc::now(),
        }
    }

    /// Connects the configured backend and builds the repository on it.
    pub fn from_config(
        backend: &BackendConfig,
        comments: CommentConfig,
        rate_limit: RateLimitConfig,
        site_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let backend = backend.connect(comments.backend_timeout)?;
        let repository = CommentRepository::new(backend, comments);
        Ok(Self::new(repository, SubmissionRateLimiter::new(rate_limit), site_dir))
    }
}
