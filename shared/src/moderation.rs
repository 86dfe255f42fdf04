//! Moderation states. Any state may be set from any other.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::comment::AuthorKind;

/// Stored value of [`CommentStatus::Pending`].
pub const COMMENT_STATUS_PENDING: &str = "pending";
/// Stored value of [`CommentStatus::Approved`].
pub const COMMENT_STATUS_APPROVED: &str = "approved";
/// Stored value of [`CommentStatus::Rejected`].
pub const COMMENT_STATUS_REJECTED: &str = "rejected";

/// A stored enum value that did not match any known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownValue {
    /// What was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

/// Moderation state of a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentStatus {
    /// Waiting for a moderator.
    Pending,
    /// Publicly visible.
    Approved,
    /// Hidden.
    Rejected,
}

impl CommentStatus {
    /// Every state, in display order.
    pub const ALL: [CommentStatus; 3] =
        [CommentStatus::Pending, CommentStatus::Approved, CommentStatus::Rejected];

    /// Storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            CommentStatus::Pending => COMMENT_STATUS_PENDING,
            CommentStatus::Approved => COMMENT_STATUS_APPROVED,
            CommentStatus::Rejected => COMMENT_STATUS_REJECTED,
        }
    }
}

impl fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentStatus {
    type Err = UnknownValue;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            COMMENT_STATUS_PENDING => Ok(CommentStatus::Pending),
            COMMENT_STATUS_APPROVED => Ok(CommentStatus::Approved),
            COMMENT_STATUS_REJECTED => Ok(CommentStatus::Rejected),
            _ => Err(UnknownValue {
                kind: "comment status",
                value: raw.to_string(),
            }),
        }
    }
}

/// Admin moderation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    /// Publish the comment.
    Approve,
    /// Hide the comment.
    Reject,
}

impl ModerationAction {
    /// State the comment ends up in.
    pub fn target(self) -> CommentStatus {
        match self {
            ModerationAction::Approve => CommentStatus::Approved,
            ModerationAction::Reject => CommentStatus::Rejected,
        }
    }
}

/// Status a freshly created comment starts in.
pub fn initial_status(author: AuthorKind, auto_approve: bool) -> CommentStatus {
    if author == AuthorKind::Admin || auto_approve {
        CommentStatus::Approved
    } else {
        CommentStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_authorship_skips_pending() {
        assert_eq!(initial_status(AuthorKind::Admin, false), CommentStatus::Approved);
        assert_eq!(initial_status(AuthorKind::Visitor, false), CommentStatus::Pending);
        assert_eq!(initial_status(AuthorKind::Visitor, true), CommentStatus::Approved);
    }

    #[test]
    fn status_parses_storage_strings() {
        assert_eq!("approved".parse::<CommentStatus>().ok(), Some(CommentStatus::Approved));
        assert_eq!("PENDING".parse::<CommentStatus>().ok(), Some(CommentStatus::Pending));
        assert!("done".parse::<CommentStatus>().is_err());
        assert_eq!(ModerationAction::Reject.target(), CommentStatus::Rejected);
    }
}
