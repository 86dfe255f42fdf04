//! Error types.

use thiserror::Error;

use crate::{comment::CommentId, moderation::CommentStatus};

/// Result alias for repository operations.
pub type CommentResult<T> = Result<T, CommentError>;

/// Failures surfaced by [`crate::CommentRepository`].
#[derive(Debug, Error)]
pub enum CommentError {
    /// Input rejected; the caller may correct it and resubmit.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The targeted comment does not exist.
    #[error("comment {0} not found")]
    NotFound(CommentId),
    /// The operation is not allowed on the targeted comment.
    #[error("not allowed: {0}")]
    Authorization(String),
    /// Reserved for a restricted moderation table; every move between the
    /// three states is currently allowed.
    #[error("invalid comment status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: CommentStatus,
        /// Requested status.
        to: CommentStatus,
    },
    /// Storage failed or timed out. Safe to retry.
    #[error("comment backend unavailable: {0:#}")]
    BackendUnavailable(anyhow::Error),
}

impl CommentError {
    /// True for failures a caller may retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, CommentError::BackendUnavailable(_))
    }
}

/// Which input constraint was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Field empty after trimming.
    #[error("{field} is required")]
    Missing {
        /// Field name.
        field: &'static str,
    },
    /// Field length outside the allowed range.
    #[error("{field} must be between {min} and {max} characters (got {actual})")]
    Length {
        /// Field name.
        field: &'static str,
        /// Inclusive lower bound.
        min: usize,
        /// Inclusive upper bound.
        max: usize,
        /// Observed length.
        actual: usize,
    },
    /// Content matched the blocked word list.
    #[error("content contains blocked words")]
    BlockedWords,
    /// Replies must target a top-level comment.
    #[error("replies can only be added to top-level comments")]
    NestedReply,
    /// Reply page differs from the parent's page.
    #[error("reply page `{reply}` does not match parent page `{parent}`")]
    PageMismatch {
        /// Page named by the reply.
        reply: String,
        /// Page of the parent comment.
        parent: String,
    },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing { field } | ValidationError::Length { field, .. } => field,
            ValidationError::BlockedWords => "content",
            ValidationError::NestedReply => "parent_id",
            ValidationError::PageMismatch { .. } => "page_id",
        }
    }
}
