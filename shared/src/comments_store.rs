//! The comment repository: validation, moderation and threading on top of
//! whichever [`CommentBackend`] the process was configured with.

use std::{collections::BTreeMap, future::Future, sync::Arc};

use anyhow::anyhow;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    comment::{
        AuthorKind, ClientInfo, Comment, CommentId, CommentStats, CommentThread, NewComment,
        NewReply, ReplyAuthor,
    },
    config::CommentConfig,
    error::{CommentError, CommentResult, ValidationError},
    moderation::{initial_status, CommentStatus, ModerationAction},
    storage::{CommentBackend, CommentFilter, CommentInsert, CommentPatch, ParentFilter},
    threading::{
        build_admin_view, build_public_threads, descendant_ids, find_orphans, sort_oldest_first,
        AdminView,
    },
    validation::{
        validate_content, validate_nickname, validate_page_id, validate_submission, ContentPolicy,
        DEFAULT_RATING,
    },
};

/// Admin console filters. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminQuery {
    /// Only this moderation state.
    pub status: Option<CommentStatus>,
    /// Only this page.
    pub page_id: Option<String>,
}

impl AdminQuery {
    fn page(&self) -> Option<String> {
        normalize_optional_text(self.page_id.clone())
    }
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    /// Rows removed, the target and its replies.
    pub deleted: usize,
}

/// Counts for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageStats {
    /// Page identifier.
    pub page_id: String,
    /// Per-status counts.
    pub stats: CommentStats,
}

/// Database overview grouped by page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageBreakdown {
    /// Pages sorted by id.
    pub pages: Vec<PageStats>,
    /// Replies whose parent is missing or not top-level.
    pub orphans: usize,
}

/// Single entry point for every comment operation.
///
/// Each backend call is bounded by `backend_timeout`; failures and timeouts
/// surface as [`CommentError::BackendUnavailable`] and are never retried here.
#[derive(Clone)]
pub struct CommentRepository {
    backend: Arc<dyn CommentBackend>,
    config: CommentConfig,
}

impl CommentRepository {
    /// Wraps `backend` with the given moderation settings.
    pub fn new(backend: Arc<dyn CommentBackend>, config: CommentConfig) -> Self {
        Self {
            backend,
            config,
        }
    }

    /// Active settings.
    pub fn config(&self) -> &CommentConfig {
        &self.config
    }

    /// Name of the underlying backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Visitor submission under the page's content policy: article pages
    /// need [`ContentPolicy::ARTICLE`]'s longer minimum.
    pub async fn submit(&self, input: NewComment) -> CommentResult<Comment> {
        let policy = self.config.policy_for(&input.page_id);
        self.submit_with_policy(input, &policy).await
    }

    /// Visitor submission under an explicit policy.
    pub async fn submit_with_policy(
        &self,
        input: NewComment,
        policy: &ContentPolicy,
    ) -> CommentResult<Comment> {
        let validated = validate_submission(&input, policy, &self.config.blocked_words)?;
        let client = normalize_client(input.client);
        let row = CommentInsert {
            page_id: validated.page_id,
            nickname: validated.nickname,
            content: validated.content,
            rating: validated.rating,
            status: initial_status(AuthorKind::Visitor, self.config.auto_approve),
            parent_id: None,
            author_kind: AuthorKind::Visitor,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
            created_at: now(),
        };

        let comment = self.call("insert comment", self.backend.insert(row)).await?;
        tracing::info!(
            comment_id = %comment.id,
            page_id = %comment.page_id,
            status = %comment.status,
            "comment submitted"
        );
        Ok(comment)
    }

    /// Adds a reply beneath a top-level comment on the same page.
    pub async fn submit_reply(&self, reply: NewReply) -> CommentResult<Comment> {
        let page_id = validate_page_id(&reply.page_id)?;
        let author_kind = reply.author.kind();
        let (nickname, content, client) = match reply.author {
            ReplyAuthor::Admin => {
                let content = validate_content(
                    &reply.content,
                    &self.config.content_policy.reply(),
                    &[],
                )?;
                (self.config.admin_display_name.clone(), content, ClientInfo::default())
            },
            ReplyAuthor::Visitor {
                nickname,
                client,
            } => {
                let nickname = validate_nickname(&nickname)?;
                let content = validate_content(
                    &reply.content,
                    &self.config.policy_for(&page_id),
                    &self.config.blocked_words,
                )?;
                (nickname, content, normalize_client(client))
            },
        };

        let parent = self.get(reply.parent_id).await?;
        if !parent.is_top_level() {
            return Err(ValidationError::NestedReply.into());
        }
        if parent.page_id != page_id {
            return Err(ValidationError::PageMismatch {
                reply: page_id,
                parent: parent.page_id,
            }
            .into());
        }

        let row = CommentInsert {
            page_id,
            nickname,
            content,
            rating: DEFAULT_RATING,
            status: initial_status(author_kind, self.config.auto_approve),
            parent_id: Some(parent.id),
            author_kind,
            ip_address: client.ip_address,
            user_agent: client.user_agent,
            created_at: now(),
        };

        let comment = self.call("insert reply", self.backend.insert(row)).await?;
        tracing::info!(
            comment_id = %comment.id,
            parent_id = %parent.id,
            author_kind = %comment.author_kind,
            status = %comment.status,
            "reply submitted"
        );
        Ok(comment)
    }

    /// Replaces the body of an admin reply. Visitor comments are immutable.
    pub async fn update_reply_content(
        &self,
        reply_id: CommentId,
        content: &str,
    ) -> CommentResult<Comment> {
        let current = self.get(reply_id).await?;
        if !current.is_admin_reply() {
            return Err(CommentError::Authorization(format!(
                "comment {reply_id} is not an admin reply"
            )));
        }
        let content = validate_content(content, &self.config.content_policy.reply(), &[])?;

        let patch = CommentPatch {
            status: None,
            content: Some(content),
            updated_at: now(),
        };
        let updated = self
            .call("update reply content", self.backend.update(reply_id, patch))
            .await?
            .ok_or(CommentError::NotFound(reply_id))?;
        tracing::info!(comment_id = %reply_id, "admin reply edited");
        Ok(updated)
    }

    /// Public threads for one page with client info stripped.
    pub async fn list_by_page(&self, page_id: &str) -> CommentResult<Vec<CommentThread>> {
        let page_id = page_id.trim();
        if page_id.is_empty() {
            return Ok(Vec::new());
        }

        let roots_filter = CommentFilter::all()
            .page(page_id)
            .status(CommentStatus::Approved)
            .parent(ParentFilter::TopLevel)
            .limit(self.config.max_comments_per_page);
        let mut rows = self
            .call("select top-level comments", self.backend.select(&roots_filter))
            .await?;

        let root_ids: Vec<CommentId> = rows.iter().map(|row| row.id).collect();
        if !root_ids.is_empty() {
            let replies_filter = CommentFilter::all()
                .page(page_id)
                .status(CommentStatus::Approved)
                .parent(ParentFilter::ChildOf(root_ids));
            let replies = self
                .call("select replies", self.backend.select(&replies_filter))
                .await?;
            rows.extend(replies);
        }

        let mut threads = build_public_threads(rows);
        for thread in &mut threads {
            thread.redact_client_info();
        }
        Ok(threads)
    }

    /// Approved replies of one comment, oldest first.
    pub async fn replies_of(&self, comment_id: CommentId) -> CommentResult<Vec<Comment>> {
        let filter = CommentFilter::all()
            .status(CommentStatus::Approved)
            .parent(ParentFilter::ChildOf(vec![comment_id]));
        let mut replies = self.call("select replies", self.backend.select(&filter)).await?;
        sort_oldest_first(&mut replies);
        for reply in &mut replies {
            reply.redact_client_info();
        }
        Ok(replies)
    }

    /// Every row, every status, newest first.
    pub async fn list_all(&self) -> CommentResult<Vec<Comment>> {
        self.call("select all comments", self.backend.select(&CommentFilter::all()))
            .await
    }

    /// Flat admin listing narrowed by status and page.
    pub async fn list_filtered(&self, query: &AdminQuery) -> CommentResult<Vec<Comment>> {
        let mut filter = CommentFilter::all();
        if let Some(page_id) = query.page() {
            filter = filter.page(page_id);
        }
        if let Some(status) = query.status {
            filter = filter.status(status);
        }
        self.call("select filtered comments", self.backend.select(&filter))
            .await
    }

    /// Grouped admin tree. A status filter keeps whole threads that contain
    /// at least one matching row.
    pub async fn admin_view(&self, query: &AdminQuery) -> CommentResult<AdminView> {
        let mut filter = CommentFilter::all();
        if let Some(page_id) = query.page() {
            filter = filter.page(page_id);
        }
        let rows = self
            .call("select admin comments", self.backend.select(&filter))
            .await?;

        let mut view = build_admin_view(rows);
        if let Some(status) = query.status {
            view.retain_status(status);
        }
        if !view.orphans.is_empty() {
            tracing::warn!(orphans = view.orphans.len(), "comment replies without a parent");
        }
        Ok(view)
    }

    /// One comment by id.
    pub async fn get(&self, id: CommentId) -> CommentResult<Comment> {
        self.call("get comment", self.backend.get(id))
            .await?
            .ok_or(CommentError::NotFound(id))
    }

    /// Sets any of the three states, including a move back to `pending`.
    /// Re-applying the current state still bumps `updated_at`.
    pub async fn set_status(
        &self,
        id: CommentId,
        next_status: CommentStatus,
    ) -> CommentResult<Comment> {
        let current = self.get(id).await?;

        let patch = CommentPatch {
            status: Some(next_status),
            content: None,
            updated_at: now(),
        };
        let updated = self
            .call("update comment status", self.backend.update(id, patch))
            .await?
            .ok_or(CommentError::NotFound(id))?;
        tracing::info!(
            comment_id = %id,
            from = %current.status,
            to = %next_status,
            "comment status changed"
        );
        Ok(updated)
    }

    /// Applies an admin moderation command.
    pub async fn moderate(&self, id: CommentId, action: ModerationAction) -> CommentResult<Comment> {
        self.set_status(id, action.target()).await
    }

    /// Hard-deletes a comment and every reply beneath it in one backend call.
    pub async fn delete(&self, id: CommentId) -> CommentResult<DeleteOutcome> {
        let target = self.get(id).await?;
        let page_rows = self
            .call(
                "select page comments",
                self.backend.select(&CommentFilter::all().page(target.page_id.clone())),
            )
            .await?;
        let ids = descendant_ids(&page_rows, id);

        let deleted = self.call("delete comments", self.backend.delete(&ids)).await?;
        tracing::info!(comment_id = %id, page_id = %target.page_id, deleted, "comment deleted");
        Ok(DeleteOutcome {
            deleted,
        })
    }

    /// Per-status counts, optionally for one page.
    pub async fn stats(&self, page_id: Option<&str>) -> CommentResult<CommentStats> {
        let page_id = page_id.map(str::trim).filter(|page| !page.is_empty());
        let counts = self
            .call("count comments", self.backend.status_counts(page_id))
            .await?;
        Ok(CommentStats::from_counts(&counts))
    }

    /// Counts grouped by page, plus the number of orphaned replies.
    pub async fn page_breakdown(&self) -> CommentResult<PageBreakdown> {
        let rows = self.list_all().await?;

        let mut by_page: BTreeMap<String, CommentStats> = BTreeMap::new();
        for row in &rows {
            by_page.entry(row.page_id.clone()).or_default().record(row.status);
        }
        let orphans = find_orphans(&rows).len();

        Ok(PageBreakdown {
            pages: by_page
                .into_iter()
                .map(|(page_id, stats)| PageStats {
                    page_id,
                    stats,
                })
                .collect(),
            orphans,
        })
    }

    async fn call<T>(
        &self,
        action: &'static str,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> CommentResult<T> {
        let timeout = self.config.backend_timeout;
        match tokio::time::timeout(timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                tracing::warn!(backend = self.backend.name(), action, "backend call failed: {err:#}");
                Err(CommentError::BackendUnavailable(err.context(action)))
            },
            Err(_) => {
                tracing::warn!(backend = self.backend.name(), action, ?timeout, "backend call timed out");
                Err(CommentError::BackendUnavailable(anyhow!(
                    "{action} timed out after {timeout:?}"
                )))
            },
        }
    }
}

fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn normalize_optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
}

fn normalize_client(client: ClientInfo) -> ClientInfo {
    ClientInfo {
        ip_address: normalize_optional_text(client.ip_address),
        user_agent: normalize_optional_text(client.user_agent),
    }
}
