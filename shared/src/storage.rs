//! The seam between the repository and a concrete comment table.
//!
//! Backends speak `anyhow::Result`; the repository turns failures into
//! [`crate::CommentError::BackendUnavailable`].

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    comment::{AuthorKind, Comment, CommentId},
    moderation::CommentStatus,
};

/// A fully prepared row; the backend only assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentInsert {
    /// Target page.
    pub page_id: String,
    /// Display name.
    pub nickname: String,
    /// Body text.
    pub content: String,
    /// 1..=5.
    pub rating: u8,
    /// Initial moderation state.
    pub status: CommentStatus,
    /// Parent for replies.
    pub parent_id: Option<CommentId>,
    /// Authorship.
    pub author_kind: AuthorKind,
    /// Submitter address.
    pub ip_address: Option<String>,
    /// Submitter user agent.
    pub user_agent: Option<String>,
    /// Insert time.
    pub created_at: DateTime<Utc>,
}

impl CommentInsert {
    /// The comment this row becomes once stored under `id`.
    pub fn into_comment(self, id: CommentId) -> Comment {
        Comment {
            id,
            page_id: self.page_id,
            nickname: self.nickname,
            content: self.content,
            rating: self.rating,
            status: self.status,
            parent_id: self.parent_id,
            author_kind: self.author_kind,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Restricts a select by parentage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParentFilter {
    /// No restriction.
    #[default]
    Any,
    /// Only rows without a parent.
    TopLevel,
    /// Only rows with a parent.
    Replies,
    /// Only replies to one of these comments.
    ChildOf(Vec<CommentId>),
}

/// Conjunctive row filter. Backends return matches newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentFilter {
    /// Exact page match.
    pub page_id: Option<String>,
    /// Exact status match.
    pub status: Option<CommentStatus>,
    /// Parentage restriction.
    pub parent: ParentFilter,
    /// Maximum rows returned.
    pub limit: Option<usize>,
}

impl CommentFilter {
    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to one page.
    pub fn page(mut self, page_id: impl Into<String>) -> Self {
        self.page_id = Some(page_id.into());
        self
    }

    /// Restricts to one status.
    pub fn status(mut self, status: CommentStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts by parentage.
    pub fn parent(mut self, parent: ParentFilter) -> Self {
        self.parent = parent;
        self
    }

    /// Caps the number of rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit.max(1));
        self
    }
}

/// Fields a mutation may touch. `updated_at` is always written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentPatch {
    /// New moderation state.
    pub status: Option<CommentStatus>,
    /// New body text.
    pub content: Option<String>,
    /// Mutation time.
    pub updated_at: DateTime<Utc>,
}

/// A relational store holding the `comments` table.
#[async_trait]
pub trait CommentBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Stores a row and returns it with its assigned id.
    async fn insert(&self, row: CommentInsert) -> Result<Comment>;

    /// Fetches one row.
    async fn get(&self, id: CommentId) -> Result<Option<Comment>>;

    /// Rows matching `filter`, newest first.
    async fn select(&self, filter: &CommentFilter) -> Result<Vec<Comment>>;

    /// Applies `patch`; `None` when the row does not exist.
    async fn update(&self, id: CommentId, patch: CommentPatch) -> Result<Option<Comment>>;

    /// Removes every listed row in one call and returns how many went away.
    async fn delete(&self, ids: &[CommentId]) -> Result<usize>;

    /// Row counts per status, optionally scoped to a page.
    async fn status_counts(&self, page_id: Option<&str>) -> Result<HashMap<CommentStatus, usize>>;
}
