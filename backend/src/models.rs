use chrono::{DateTime, Utc};
use locksite_shared::{
    AdminThread, Comment, CommentId, CommentStats, CommentStatus, CommentThread, PageStats,
};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/comments`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCommentRequest {
    pub page_id: String,
    pub nickname: String,
    pub content: String,
    #[serde(default)]
    pub rating: Option<i64>,
    /// Present when the visitor answers an existing comment.
    #[serde(default)]
    pub parent_id: Option<i64>,
}

/// Stored id and starting status of a new comment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCommentResponse {
    pub success: bool,
    pub comment_id: CommentId,
    pub status: CommentStatus,
    pub message: String,
}

/// Published threads of one page.
#[derive(Debug, Serialize)]
pub struct PageCommentsResponse {
    pub success: bool,
    pub comments: Vec<CommentThread>,
}

/// Raw admin filters; `all` or an empty value means no filter.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCommentsQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub page_id: Option<String>,
}

/// Optional page scope for counts.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    #[serde(default)]
    pub page_id: Option<String>,
}

/// Flat admin listing plus the global pending count.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCommentsResponse {
    pub success: bool,
    pub comments: Vec<Comment>,
    pub pending_count: usize,
}

/// Grouped admin listing with orphaned replies.
#[derive(Debug, Serialize)]
pub struct AdminThreadsResponse {
    pub success: bool,
    pub threads: Vec<AdminThread>,
    pub orphans: Vec<Comment>,
}

/// Moderation counts.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: CommentStats,
}

/// Per-page counts.
#[derive(Debug, Serialize)]
pub struct PagesResponse {
    pub success: bool,
    pub pages: Vec<PageStats>,
    pub orphans: usize,
}

/// Body of `PUT /admin/comments/:id/status`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Reply text for admin reply and edit.
#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    pub content: String,
}

/// A single comment after a mutation.
#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub success: bool,
    pub message: String,
    pub comment: Comment,
}

/// Rows removed by a cascade delete.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub deleted: usize,
}

/// Liveness info for the admin console.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub server_info: String,
    pub comment_backend: &'static str,
    pub uptime_seconds: i64,
}

/// Uniform error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: u16,
}
