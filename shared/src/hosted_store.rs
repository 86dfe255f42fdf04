//! Hosted backend speaking the PostgREST dialect (`/rest/v1/{table}`).

use std::{collections::HashMap, time::Duration};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::{
    comment::{AuthorKind, Comment, CommentId},
    moderation::CommentStatus,
    storage::{CommentBackend, CommentFilter, CommentInsert, CommentPatch, ParentFilter},
};

/// [`CommentBackend`] over a hosted relational service.
#[derive(Clone)]
pub struct HostedCommentBackend {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HostedCommentBackend {
    /// Builds a client for `{url}/rest/v1/{table}`.
    pub fn new(url: &str, api_key: &str, table: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build hosted comments http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/rest/v1/{}", url.trim_end_matches('/'), table),
            api_key: api_key.to_string(),
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn fetch(&self, query: &[(String, String)]) -> Result<Vec<HostedRow>> {
        let response = self
            .authorized(self.client.get(&self.endpoint))
            .query(query)
            .send()
            .await
            .context("failed to query hosted comments")?;
        read_rows(response).await
    }
}

#[async_trait]
impl CommentBackend for HostedCommentBackend {
    fn name(&self) -> &'static str {
        "hosted"
    }

    async fn insert(&self, row: CommentInsert) -> Result<Comment> {
        let body = HostedInsert::from(&row);
        let response = self
            .authorized(self.client.post(&self.endpoint))
            .header("Prefer", "return=representation")
            .json(&[body])
            .send()
            .await
            .context("failed to insert hosted comment")?;
        let stored = read_rows(response)
            .await?
            .into_iter()
            .next()
            .context("hosted insert returned no row")?;
        stored.into_comment()
    }

    async fn get(&self, id: CommentId) -> Result<Option<Comment>> {
        let query = vec![select_all(), ("id".to_string(), format!("eq.{id}"))];
        let rows = self.fetch(&query).await?;
        rows.into_iter().next().map(HostedRow::into_comment).transpose()
    }

    async fn select(&self, filter: &CommentFilter) -> Result<Vec<Comment>> {
        if matches!(&filter.parent, ParentFilter::ChildOf(ids) if ids.is_empty()) {
            return Ok(Vec::new());
        }
        let rows = self.fetch(&filter_query(filter)).await?;
        rows.into_iter().map(HostedRow::into_comment).collect()
    }

    async fn update(&self, id: CommentId, patch: CommentPatch) -> Result<Option<Comment>> {
        let body = HostedPatch {
            status: patch.status.map(CommentStatus::as_str),
            content: patch.content.as_deref(),
            updated_at: patch.updated_at,
        };
        let response = self
            .authorized(self.client.patch(&self.endpoint))
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{id}"))])
            .json(&body)
            .send()
            .await
            .with_context(|| format!("failed to update hosted comment {id}"))?;
        let rows = read_rows(response).await?;
        rows.into_iter().next().map(HostedRow::into_comment).transpose()
    }

    async fn delete(&self, ids: &[CommentId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let response = self
            .authorized(self.client.delete(&self.endpoint))
            .header("Prefer", "return=representation")
            .query(&[("id", in_list(ids))])
            .send()
            .await
            .context("failed to delete hosted comments")?;
        Ok(read_rows(response).await?.len())
    }

    async fn status_counts(&self, page_id: Option<&str>) -> Result<HashMap<CommentStatus, usize>> {
        let mut query = vec![("select".to_string(), "status".to_string())];
        if let Some(page_id) = page_id {
            query.push(("page_id".to_string(), format!("eq.{page_id}")));
        }
        let response = self
            .authorized(self.client.get(&self.endpoint))
            .query(&query)
            .send()
            .await
            .context("failed to count hosted comments")?;
        let rows: Vec<StatusOnly> = read_json(response).await?;

        let mut counts = HashMap::new();
        for row in rows {
            match row.status.parse::<CommentStatus>() {
                Ok(status) => *counts.entry(status).or_insert(0) += 1,
                Err(err) => tracing::warn!("skipping hosted comment with {err}"),
            }
        }
        Ok(counts)
    }
}

#[derive(Debug, Serialize)]
struct HostedInsert<'a> {
    page_id: &'a str,
    nickname: &'a str,
    content: &'a str,
    status: &'static str,
    rating: u8,
    parent_id: Option<i64>,
    author_kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_address: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_agent: Option<&'a str>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'a> From<&'a CommentInsert> for HostedInsert<'a> {
    fn from(row: &'a CommentInsert) -> Self {
        Self {
            page_id: &row.page_id,
            nickname: &row.nickname,
            content: &row.content,
            status: row.status.as_str(),
            rating: row.rating,
            parent_id: row.parent_id.map(CommentId::value),
            author_kind: row.author_kind.as_str(),
            ip_address: row.ip_address.as_deref(),
            user_agent: row.user_agent.as_deref(),
            created_at: row.created_at,
            updated_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct HostedPatch<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    updated_at: DateTime<Utc>,
}

/// Row as returned by the service. Older tables call the nickname `name` and
/// lack the newer columns.
#[derive(Debug, Deserialize)]
struct HostedRow {
    id: i64,
    page_id: String,
    #[serde(alias = "name")]
    nickname: String,
    content: String,
    status: String,
    #[serde(default)]
    rating: Option<i64>,
    #[serde(default)]
    parent_id: Option<i64>,
    #[serde(default)]
    author_kind: Option<String>,
    #[serde(default)]
    ip_address: Option<String>,
    #[serde(default)]
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl HostedRow {
    fn into_comment(self) -> Result<Comment> {
        let status = self
            .status
            .parse()
            .with_context(|| format!("hosted comment {} has a corrupt status", self.id))?;
        Ok(Comment {
            id: CommentId(self.id),
            page_id: self.page_id,
            nickname: self.nickname,
            content: self.content,
            rating: self.rating.unwrap_or(5).clamp(1, 5) as u8,
            status,
            parent_id: self.parent_id.map(CommentId),
            author_kind: self
                .author_kind
                .as_deref()
                .and_then(|kind| kind.parse().ok())
                .unwrap_or(AuthorKind::Visitor),
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            updated_at: self.updated_at.unwrap_or(self.created_at),
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StatusOnly {
    status: String,
}

fn select_all() -> (String, String) {
    ("select".to_string(), "*".to_string())
}

fn in_list(ids: &[CommentId]) -> String {
    let joined = ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
    format!("in.({joined})")
}

fn filter_query(filter: &CommentFilter) -> Vec<(String, String)> {
    let mut query = vec![select_all()];
    if let Some(page_id) = &filter.page_id {
        query.push(("page_id".to_string(), format!("eq.{page_id}")));
    }
    if let Some(status) = filter.status {
        query.push(("status".to_string(), format!("eq.{status}")));
    }
    match &filter.parent {
        ParentFilter::Any => {},
        ParentFilter::TopLevel => query.push(("parent_id".to_string(), "is.null".to_string())),
        ParentFilter::Replies => query.push(("parent_id".to_string(), "not.is.null".to_string())),
        ParentFilter::ChildOf(ids) => query.push(("parent_id".to_string(), in_list(ids))),
    }
    query.push(("order".to_string(), "created_at.desc,id.asc".to_string()));
    if let Some(limit) = filter.limit {
        query.push(("limit".to_string(), limit.to_string()));
    }
    query
}

async fn read_rows(response: Response) -> Result<Vec<HostedRow>> {
    read_json(response).await
}

async fn read_json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("hosted comments service returned {status}: {body}");
    }
    response
        .json()
        .await
        .context("failed to decode hosted comments response")
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn backend(server: &MockServer) -> HostedCommentBackend {
        HostedCommentBackend::new(&server.uri(), "anon-key", "comments", Duration::from_secs(5))
            .expect("build backend")
    }

    fn stored_row(id: i64, parent_id: Option<i64>) -> serde_json::Value {
        json!({
            "id": id,
            "page_id": "home",
            "name": "Ahmet K.",
            "content": "Great service, arrived in 15 minutes.",
            "status": "approved",
            "rating": 5,
            "parent_id": parent_id,
            "created_at": "2026-03-01T12:00:00+00:00"
        })
    }

    #[tokio::test]
    async fn select_translates_filter_into_query_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/comments"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer anon-key"))
            .and(query_param("page_id", "eq.home"))
            .and(query_param("status", "eq.approved"))
            .and(query_param("parent_id", "is.null"))
            .and(query_param("order", "created_at.desc,id.asc"))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([stored_row(1, None)])))
            .expect(1)
            .mount(&server)
            .await;

        let filter = CommentFilter::all()
            .page("home")
            .status(CommentStatus::Approved)
            .parent(ParentFilter::TopLevel)
            .limit(50);
        let rows = backend(&server).select(&filter).await.expect("select");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].nickname, "Ahmet K.");
        assert_eq!(rows[0].author_kind, AuthorKind::Visitor);
        assert_eq!(rows[0].updated_at, rows[0].created_at);
    }

    #[tokio::test]
    async fn child_filter_uses_in_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/comments"))
            .and(query_param("parent_id", "in.(1,2)"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([stored_row(3, Some(1))])))
            .expect(1)
            .mount(&server)
            .await;

        let filter =
            CommentFilter::all().parent(ParentFilter::ChildOf(vec![CommentId(1), CommentId(2)]));
        let rows = backend(&server).select(&filter).await.expect("select");
        assert_eq!(rows[0].parent_id, Some(CommentId(1)));

        let empty = backend(&server)
            .select(&CommentFilter::all().parent(ParentFilter::ChildOf(vec![])))
            .await
            .expect("empty child set");
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn insert_posts_row_and_reads_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/comments"))
            .and(header("prefer", "return=representation"))
            .and(body_partial_json(json!([{ "page_id": "home", "status": "pending" }])))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([{
                "id": 42,
                "page_id": "home",
                "nickname": "Ahmet K.",
                "content": "Great service, arrived in 15 minutes.",
                "status": "pending",
                "rating": 5,
                "parent_id": null,
                "author_kind": "visitor",
                "created_at": "2026-03-01T12:00:00+00:00",
                "updated_at": "2026-03-01T12:00:00+00:00"
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let row = CommentInsert {
            page_id: "home".to_string(),
            nickname: "Ahmet K.".to_string(),
            content: "Great service, arrived in 15 minutes.".to_string(),
            rating: 5,
            status: CommentStatus::Pending,
            parent_id: None,
            author_kind: AuthorKind::Visitor,
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        };
        let stored = backend(&server).insert(row).await.expect("insert");
        assert_eq!(stored.id, CommentId(42));
        assert_eq!(stored.status, CommentStatus::Pending);
    }

    #[tokio::test]
    async fn update_returns_none_when_no_row_matched() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/comments"))
            .and(query_param("id", "eq.7"))
            .and(body_partial_json(json!({ "status": "rejected" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let patch = CommentPatch {
            status: Some(CommentStatus::Rejected),
            content: None,
            updated_at: Utc::now(),
        };
        let updated = backend(&server).update(CommentId(7), patch).await.expect("update");
        assert!(updated.is_none());
    }

    #[tokio::test]
    async fn delete_counts_returned_rows() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/comments"))
            .and(query_param("id", "in.(1,3)"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([stored_row(1, None), stored_row(3, Some(1))])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let deleted = backend(&server)
            .delete(&[CommentId(1), CommentId(3)])
            .await
            .expect("delete");
        assert_eq!(deleted, 2);
    }

    #[tokio::test]
    async fn status_counts_aggregate_client_side() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/comments"))
            .and(query_param("select", "status"))
            .and(query_param("page_id", "eq.home"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "status": "pending" },
                { "status": "approved" },
                { "status": "pending" }
            ])))
            .mount(&server)
            .await;

        let counts = backend(&server)
            .status_counts(Some("home"))
            .await
            .expect("counts");
        assert_eq!(counts.get(&CommentStatus::Pending), Some(&2));
        assert_eq!(counts.get(&CommentStatus::Approved), Some(&1));
    }

    #[tokio::test]
    async fn error_status_surfaces_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/comments"))
            .respond_with(ResponseTemplate::new(500).set_body_string("db offline"))
            .mount(&server)
            .await;

        let err = backend(&server)
            .get(CommentId(1))
            .await
            .expect_err("server error");
        let message = format!("{err:#}");
        assert!(message.contains("500"), "{message}");
        assert!(message.contains("db offline"), "{message}");
    }
}
