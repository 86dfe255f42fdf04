use std::{
    net::{IpAddr, SocketAddr},
    time::Duration,
};

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use locksite_shared::{
    AdminQuery, ClientInfo, CommentError, CommentId, CommentStatus, NewComment, NewReply,
    ReplyAuthor,
};

use crate::{
    models::{
        AdminCommentsQuery, AdminCommentsResponse, AdminThreadsResponse, CommentResponse,
        ContentRequest, DeleteResponse, ErrorResponse, PageCommentsResponse, PagesResponse,
        StatsQuery, StatsResponse, SubmitCommentRequest, SubmitCommentResponse,
        TestConnectionResponse, UpdateStatusRequest,
    },
    state::AppState,
};

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// `GET /admin/test-connection`
pub async fn test_connection(State(state): State<AppState>) -> Json<TestConnectionResponse> {
    let now = Utc::now();
    Json(TestConnectionResponse {
        success: true,
        message: "Sunucu çalışıyor".to_string(),
        timestamp: now,
        server_info: format!("locksite-backend {}", env!("CARGO_PKG_VERSION")),
        comment_backend: state.repository.backend_name(),
        uptime_seconds: (now - state.started_at).num_seconds(),
    })
}

/// `POST /api/comments`: a top-level comment, or a visitor reply when
/// `parentId` is set.
pub async fn submit_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<SubmitCommentRequest>, JsonRejection>,
) -> ApiResult<SubmitCommentResponse> {
    let request = json_body(body)?;
    let ip = client_ip(&headers, connect_info.as_ref());
    if let Err(retry_after) = state.rate_limiter.check(&ip) {
        tracing::info!(client_ip = %ip, "comment submission rate limited");
        return Err(rate_limited(retry_after));
    }

    let client = ClientInfo {
        ip_address: Some(ip.clone()),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };

    let comment = match request.parent_id {
        Some(parent_id) => {
            state
                .repository
                .submit_reply(NewReply {
                    parent_id: CommentId(parent_id),
                    page_id: request.page_id,
                    content: request.content,
                    author: ReplyAuthor::Visitor {
                        nickname: request.nickname,
                        client,
                    },
                })
                .await
        },
        None => {
            state
                .repository
                .submit(NewComment {
                    page_id: request.page_id,
                    nickname: request.nickname,
                    content: request.content,
                    rating: request.rating,
                    client,
                })
                .await
        },
    }
    .map_err(comment_error)?;

    state.rate_limiter.record(&ip);

    let message = match comment.status {
        CommentStatus::Approved => "Yorum başarıyla yayınlandı",
        _ => "Yorum başarıyla gönderildi ve onay bekliyor",
    };
    Ok(Json(SubmitCommentResponse {
        success: true,
        comment_id: comment.id,
        status: comment.status,
        message: message.to_string(),
    }))
}

/// `GET /api/comments/:page_id`
pub async fn list_page_comments(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> ApiResult<PageCommentsResponse> {
    let comments = state
        .repository
        .list_by_page(&page_id)
        .await
        .map_err(comment_error)?;
    Ok(Json(PageCommentsResponse {
        success: true,
        comments,
    }))
}

/// `GET /api/comments/:page_id/stats`
pub async fn page_stats(
    State(state): State<AppState>,
    Path(page_id): Path<String>,
) -> ApiResult<StatsResponse> {
    let mut stats = state
        .repository
        .stats(Some(&page_id))
        .await
        .map_err(comment_error)?;
    // Visitors only see the published count.
    stats.total = stats.approved;
    stats.pending = 0;
    stats.rejected = 0;
    Ok(Json(StatsResponse {
        success: true,
        stats,
    }))
}

/// `GET /admin/comments`
pub async fn admin_list_comments(
    State(state): State<AppState>,
    Query(query): Query<AdminCommentsQuery>,
) -> ApiResult<AdminCommentsResponse> {
    let query = admin_query(query)?;
    let comments = state
        .repository
        .list_filtered(&query)
        .await
        .map_err(comment_error)?;
    let pending_count = state
        .repository
        .stats(None)
        .await
        .map_err(comment_error)?
        .pending;

    Ok(Json(AdminCommentsResponse {
        success: true,
        comments,
        pending_count,
    }))
}

/// `GET /admin/comments/threads`
pub async fn admin_list_threads(
    State(state): State<AppState>,
    Query(query): Query<AdminCommentsQuery>,
) -> ApiResult<AdminThreadsResponse> {
    let query = admin_query(query)?;
    let view = state
        .repository
        .admin_view(&query)
        .await
        .map_err(comment_error)?;
    Ok(Json(AdminThreadsResponse {
        success: true,
        threads: view.threads,
        orphans: view.orphans,
    }))
}

/// `GET /admin/comments/stats`
pub async fn admin_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<StatsResponse> {
    let stats = state
        .repository
        .stats(query.page_id.as_deref())
        .await
        .map_err(comment_error)?;
    Ok(Json(StatsResponse {
        success: true,
        stats,
    }))
}

/// `GET /admin/comments/pages`
pub async fn admin_pages(State(state): State<AppState>) -> ApiResult<PagesResponse> {
    let breakdown = state
        .repository
        .page_breakdown()
        .await
        .map_err(comment_error)?;
    Ok(Json(PagesResponse {
        success: true,
        pages: breakdown.pages,
        orphans: breakdown.orphans,
    }))
}

/// `PUT /admin/comments/:id/status`
pub async fn admin_update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> ApiResult<CommentResponse> {
    let id = parse_comment_id(&id)?;
    let request = json_body(body)?;
    let status = request
        .status
        .parse::<CommentStatus>()
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Geçersiz durum"))?;

    let comment = state
        .repository
        .set_status(id, status)
        .await
        .map_err(comment_error)?;
    Ok(Json(CommentResponse {
        success: true,
        message: "Yorum durumu güncellendi".to_string(),
        comment,
    }))
}

/// `POST /admin/comments/:id/replies`
pub async fn admin_reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ContentRequest>, JsonRejection>,
) -> ApiResult<CommentResponse> {
    let parent_id = parse_comment_id(&id)?;
    let request = json_body(body)?;
    let parent = state
        .repository
        .get(parent_id)
        .await
        .map_err(comment_error)?;

    let comment = state
        .repository
        .submit_reply(NewReply {
            parent_id,
            page_id: parent.page_id,
            content: request.content,
            author: ReplyAuthor::Admin,
        })
        .await
        .map_err(comment_error)?;
    Ok(Json(CommentResponse {
        success: true,
        message: "Yanıt eklendi".to_string(),
        comment,
    }))
}

/// `PUT /admin/comments/:id/content`
pub async fn admin_edit_reply(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ContentRequest>, JsonRejection>,
) -> ApiResult<CommentResponse> {
    let id = parse_comment_id(&id)?;
    let request = json_body(body)?;
    let comment = state
        .repository
        .update_reply_content(id, &request.content)
        .await
        .map_err(comment_error)?;
    Ok(Json(CommentResponse {
        success: true,
        message: "Yanıt güncellendi".to_string(),
        comment,
    }))
}

/// `DELETE /admin/comments/:id`
pub async fn admin_delete_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DeleteResponse> {
    let id = parse_comment_id(&id)?;
    let outcome = state
        .repository
        .delete(id)
        .await
        .map_err(comment_error)?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "Yorum silindi".to_string(),
        deleted: outcome.deleted,
    }))
}

fn admin_query(raw: AdminCommentsQuery) -> Result<AdminQuery, ApiError> {
    let status = match raw.status.as_deref().map(str::trim) {
        None | Some("") | Some("all") => None,
        Some(value) => Some(
            value
                .parse::<CommentStatus>()
                .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Geçersiz durum"))?,
        ),
    };
    Ok(AdminQuery {
        status,
        page_id: raw.page_id,
    })
}

fn parse_comment_id(raw: &str) -> Result<CommentId, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map(CommentId)
        .map_err(|_| error_response(StatusCode::BAD_REQUEST, "Geçersiz yorum kimliği"))
}

/// First parseable address in `x-forwarded-for`, then `x-real-ip`, then the
/// socket peer. Tokens that are not IP addresses are skipped.
fn client_ip(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    parse_first_ip_from_header(headers.get("x-forwarded-for"))
        .or_else(|| parse_first_ip_from_header(headers.get("x-real-ip")))
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip()))
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn parse_first_ip_from_header(value: Option<&header::HeaderValue>) -> Option<IpAddr> {
    let raw = value?.to_str().ok()?;
    raw.split(',').find_map(normalize_ip_token)
}

/// Accepts `1.2.3.4`, `1.2.3.4:80`, `::1` and `[::1]:80`.
fn normalize_ip_token(token: &str) -> Option<IpAddr> {
    let value = token.trim().trim_matches('"');
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }
    if let Some(rest) = value.strip_prefix('[') {
        let (host, port) = rest.split_once(']')?;
        let port_ok = port.is_empty() || port.strip_prefix(':').is_some_and(is_port);
        return if port_ok { host.parse().ok() } else { None };
    }
    let (host, port) = value.rsplit_once(':')?;
    if host.contains('.') && is_port(port) {
        return host.parse().ok();
    }
    None
}

fn is_port(raw: &str) -> bool {
    !raw.is_empty() && raw.chars().all(|ch| ch.is_ascii_digit())
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(request)| request).map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "rejected request body");
        error_response(
            StatusCode::BAD_REQUEST,
            &format!("Geçersiz istek gövdesi: {}", rejection.body_text()),
        )
    })
}

fn comment_error(err: CommentError) -> ApiError {
    let status = match &err {
        CommentError::Validation(_) | CommentError::InvalidTransition { .. } => {
            StatusCode::BAD_REQUEST
        },
        CommentError::NotFound(_) => StatusCode::NOT_FOUND,
        CommentError::Authorization(_) => StatusCode::FORBIDDEN,
        CommentError::BackendUnavailable(_) => {
            tracing::error!(error = %err, "comment request failed");
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Yorum servisine şu anda ulaşılamıyor, lütfen tekrar deneyin",
            );
        },
    };
    error_response(status, &err.to_string())
}

fn rate_limited(retry_after: Duration) -> ApiError {
    let minutes = retry_after.as_secs().div_ceil(60).max(1);
    error_response(
        StatusCode::TOO_MANY_REQUESTS,
        &format!("Çok fazla yorum gönderildi, {minutes} dakika sonra tekrar deneyin"),
    )
}

fn error_response(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: message.to_string(),
            code: status.as_u16(),
        }),
    )
}
