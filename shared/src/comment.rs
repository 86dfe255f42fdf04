//! Comment records and the inputs that create them.

use std::{collections::HashMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::moderation::{CommentStatus, UnknownValue};

/// Backend-assigned comment identifier. Strictly increasing, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub i64);

impl CommentId {
    /// Raw numeric value.
    pub fn value(self) -> i64 {
        self.0
    }
}

impl From<i64> for CommentId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who wrote a comment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorKind {
    /// Unauthenticated site visitor.
    #[default]
    Visitor,
    /// Site staff replying from the admin console.
    Admin,
}

impl AuthorKind {
    /// Storage representation.
    pub fn as_str(self) -> &'static str {
        match self {
            AuthorKind::Visitor => "visitor",
            AuthorKind::Admin => "admin",
        }
    }
}

impl fmt::Display for AuthorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorKind {
    type Err = UnknownValue;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "visitor" => Ok(AuthorKind::Visitor),
            "admin" => Ok(AuthorKind::Admin),
            _ => Err(UnknownValue {
                kind: "author kind",
                value: raw.to_string(),
            }),
        }
    }
}

/// A persisted comment row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Identifier.
    pub id: CommentId,
    /// Page the comment belongs to.
    pub page_id: String,
    /// Display name.
    pub nickname: String,
    /// Body text.
    pub content: String,
    /// 1..=5, meaningful on top-level comments only.
    pub rating: u8,
    /// Moderation state.
    pub status: CommentStatus,
    /// `None` for top-level comments.
    pub parent_id: Option<CommentId>,
    /// Authorship.
    pub author_kind: AuthorKind,
    /// Submitter address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Submitter user agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Insert time, immutable.
    pub created_at: DateTime<Utc>,
    /// Last status or content change.
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    /// True for comments without a parent.
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// True for replies written from the admin console.
    pub fn is_admin_reply(&self) -> bool {
        self.parent_id.is_some() && self.author_kind == AuthorKind::Admin
    }

    /// Drops submitter metadata before the row leaves through a public
    /// surface.
    pub fn redact_client_info(&mut self) {
        self.ip_address = None;
        self.user_agent = None;
    }
}

/// A top-level comment with its replies attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentThread {
    /// The top-level comment.
    #[serde(flatten)]
    pub comment: Comment,
    /// Replies, oldest first.
    pub replies: Vec<Comment>,
}

impl CommentThread {
    /// Redacts the root and every reply.
    pub fn redact_client_info(&mut self) {
        self.comment.redact_client_info();
        for reply in &mut self.replies {
            reply.redact_client_info();
        }
    }
}

/// Request metadata captured at submission time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Remote address.
    pub ip_address: Option<String>,
    /// `User-Agent` header.
    pub user_agent: Option<String>,
}

/// Visitor submission of a top-level comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    /// Target page.
    pub page_id: String,
    /// Display name.
    pub nickname: String,
    /// Body text.
    pub content: String,
    /// Optional score, clamped into 1..=5.
    pub rating: Option<i64>,
    /// Request metadata.
    #[serde(default)]
    pub client: ClientInfo,
}

/// Who is replying and with which identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyAuthor {
    /// Staff reply: auto-approved, shown under the configured admin name.
    Admin,
    /// Visitor reply: validated and moderated like a top-level comment.
    Visitor {
        /// Display name.
        nickname: String,
        /// Request metadata.
        client: ClientInfo,
    },
}

impl ReplyAuthor {
    /// Authorship tag stored on the row.
    pub fn kind(&self) -> AuthorKind {
        match self {
            ReplyAuthor::Admin => AuthorKind::Admin,
            ReplyAuthor::Visitor { .. } => AuthorKind::Visitor,
        }
    }
}

/// A reply beneath an existing top-level comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReply {
    /// Comment being replied to.
    pub parent_id: CommentId,
    /// Page of the parent comment.
    pub page_id: String,
    /// Body text.
    pub content: String,
    /// Author identity.
    pub author: ReplyAuthor,
}

/// Aggregate counts per moderation state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentStats {
    /// All comments.
    pub total: usize,
    /// Awaiting moderation.
    pub pending: usize,
    /// Publicly visible.
    pub approved: usize,
    /// Hidden by a moderator.
    pub rejected: usize,
}

impl CommentStats {
    /// Builds stats from a per-status breakdown.
    pub fn from_counts(counts: &HashMap<CommentStatus, usize>) -> Self {
        let pending = counts.get(&CommentStatus::Pending).copied().unwrap_or(0);
        let approved = counts.get(&CommentStatus::Approved).copied().unwrap_or(0);
        let rejected = counts.get(&CommentStatus::Rejected).copied().unwrap_or(0);
        Self {
            total: pending + approved + rejected,
            pending,
            approved,
            rejected,
        }
    }

    /// Counts one more row in `status`.
    pub fn record(&mut self, status: CommentStatus) {
        self.total += 1;
        match status {
            CommentStatus::Pending => self.pending += 1,
            CommentStatus::Approved => self.approved += 1,
            CommentStatus::Rejected => self.rejected += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_from_counts_sums_known_statuses() {
        let counts = HashMap::from([(CommentStatus::Pending, 2), (CommentStatus::Approved, 3)]);
        let stats = CommentStats::from_counts(&counts);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.approved, 3);
        assert_eq!(stats.rejected, 0);
    }

    #[test]
    fn author_kind_parses_case_insensitively() {
        assert_eq!("Admin".parse::<AuthorKind>().ok(), Some(AuthorKind::Admin));
        assert_eq!(" visitor ".parse::<AuthorKind>().ok(), Some(AuthorKind::Visitor));
        assert!("staff".parse::<AuthorKind>().is_err());
    }
}
