use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

use crate::{handlers, request_context::request_context_middleware, state::AppState};

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let site = ServeDir::new(&state.site_dir);

    Router::new()
        .route("/api/comments", post(handlers::submit_comment))
        .route("/api/comments/:page_id", get(handlers::list_page_comments))
        .route("/api/comments/:page_id/stats", get(handlers::page_stats))
        .route("/admin/test-connection", get(handlers::test_connection))
        .route("/admin/comments", get(handlers::admin_list_comments))
        .route("/admin/comments/threads", get(handlers::admin_list_threads))
        .route("/admin/comments/stats", get(handlers::admin_stats))
        .route("/admin/comments/pages", get(handlers::admin_pages))
        .route(
            "/admin/comments/:id",
            axum::routing::delete(handlers::admin_delete_comment),
        )
        .route("/admin/comments/:id/status", put(handlers::admin_update_status))
        .route("/admin/comments/:id/replies", post(handlers::admin_reply))
        .route("/admin/comments/:id/content", put(handlers::admin_edit_reply))
        .fallback_service(site)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_context_middleware))
                .layer(cors),
        )
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use locksite_shared::{sqlite_store::SqliteCommentBackend, CommentConfig, CommentRepository};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        rate_limit::{RateLimitConfig, SubmissionRateLimiter},
        request_context::REQUEST_ID_HEADER,
    };

    fn app_with_limit(max_per_window: usize) -> Router {
        let backend = SqliteCommentBackend::open_in_memory().expect("open db");
        let repository = CommentRepository::new(Arc::new(backend), CommentConfig::default());
        let limiter = SubmissionRateLimiter::new(RateLimitConfig {
            max_per_window,
            window: Duration::from_secs(3600),
        });
        create_router(AppState::new(repository, limiter, std::env::temp_dir()))
    }

    fn app() -> Router {
        app_with_limit(0)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::from(body.to_string()))
            .expect("build request")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("build request")
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn ahmet_submission() -> Value {
        json!({
            "pageId": "home",
            "nickname": "Ahmet K.",
            "content": "Great service, arrived in 15 minutes.",
            "rating": 5
        })
    }

    async fn submit_and_approve(app: &Router) -> i64 {
        let (status, body) =
            send(app, json_request(Method::POST, "/api/comments", ahmet_submission())).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let id = body["commentId"].as_i64().expect("comment id");

        let (status, body) = send(
            app,
            json_request(
                Method::PUT,
                &format!("/admin/comments/{id}/status"),
                json!({ "status": "approved" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        id
    }

    #[tokio::test]
    async fn moderation_flow_over_http() {
        let app = app();
        let (status, body) =
            send(&app, json_request(Method::POST, "/api/comments", ahmet_submission())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], "pending");
        let id = body["commentId"].as_i64().expect("comment id");

        let (_, body) = send(&app, get_request("/api/comments/home")).await;
        assert_eq!(body["comments"].as_array().map(Vec::len), Some(0));

        let (_, body) = send(&app, get_request("/admin/comments?status=pending")).await;
        assert_eq!(body["pendingCount"], 1);
        assert_eq!(body["comments"][0]["ipAddress"], "203.0.113.9");

        let (status, body) = send(
            &app,
            json_request(
                Method::PUT,
                &format!("/admin/comments/{id}/status"),
                json!({ "status": "approved" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["comment"]["status"], "approved");

        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                &format!("/admin/comments/{id}/replies"),
                json!({ "content": "Thank you for your feedback!" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["comment"]["authorKind"], "admin");
        assert_eq!(body["comment"]["nickname"], "Murat Oto Anahtar");

        let (_, body) = send(&app, get_request("/api/comments/home")).await;
        let threads = body["comments"].as_array().expect("threads");
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0]["id"], id);
        assert!(threads[0].get("ipAddress").is_none());
        assert_eq!(threads[0]["replies"].as_array().map(Vec::len), Some(1));

        let (_, body) = send(&app, get_request("/admin/comments/stats")).await;
        assert_eq!(body["stats"]["approved"], 2);
        assert_eq!(body["stats"]["pending"], 0);
    }

    #[tokio::test]
    async fn invalid_input_is_bad_request() {
        let app = app();
        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/comments",
                json!({ "pageId": "home", "nickname": "A", "content": "Long enough content" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], 400);

        let (status, _) = send(
            &app,
            json_request(Method::PUT, "/admin/comments/abc/status", json!({ "status": "approved" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            json_request(Method::PUT, "/admin/comments/1/status", json!({ "status": "done" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn approved_comment_can_return_to_pending() {
        let app = app();
        let id = submit_and_approve(&app).await;

        let (status, body) = send(
            &app,
            json_request(
                Method::PUT,
                &format!("/admin/comments/{id}/status"),
                json!({ "status": "pending" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["comment"]["status"], "pending");

        let (_, body) = send(&app, get_request("/api/comments/home")).await;
        assert_eq!(body["comments"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn domain_errors_map_to_status_codes() {
        let app = app();
        let id = submit_and_approve(&app).await;

        let (status, _) = send(
            &app,
            json_request(
                Method::PUT,
                &format!("/admin/comments/{id}/content"),
                json!({ "content": "rewritten by admin" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let mut reply = ahmet_submission();
        reply["parentId"] = json!(9_999);
        let (status, _) = send(&app, json_request(Method::POST, "/api/comments", reply)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/admin/comments/9999")
            .body(Body::empty())
            .expect("build request");
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_removes_thread() {
        let app = app();
        let id = submit_and_approve(&app).await;
        send(
            &app,
            json_request(
                Method::POST,
                &format!("/admin/comments/{id}/replies"),
                json!({ "content": "Thanks!" }),
            ),
        )
        .await;

        let request = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/admin/comments/{id}"))
            .body(Body::empty())
            .expect("build request");
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"], 2);

        let (_, body) = send(&app, get_request("/admin/comments/pages")).await;
        assert_eq!(body["pages"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn submissions_are_rate_limited_per_client() {
        let app = app_with_limit(2);
        for _ in 0..2 {
            let (status, _) =
                send(&app, json_request(Method::POST, "/api/comments", ahmet_submission())).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) =
            send(&app, json_request(Method::POST, "/api/comments", ahmet_submission())).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], 429);

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/comments")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "198.51.100.20")
            .body(Body::from(ahmet_submission().to_string()))
            .expect("build request");
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn forged_forwarded_values_share_one_quota() {
        let app = app_with_limit(1);
        let mut accepted = 0;
        for i in 0..5 {
            let request = Request::builder()
                .method(Method::POST)
                .uri("/api/comments")
                .header("content-type", "application/json")
                .header("x-forwarded-for", format!("not-an-ip-{i}"))
                .body(Body::from(ahmet_submission().to_string()))
                .expect("build request");
            let (status, _) = send(&app, request).await;
            if status == StatusCode::OK {
                accepted += 1;
            } else {
                assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn malformed_bodies_get_json_errors() {
        let app = app();
        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                "/api/comments",
                json!({ "pageId": "home", "content": "Great service, arrived in 15 minutes." }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], 400);
        assert!(body["error"].as_str().is_some_and(|e| e.contains("nickname")), "{body}");

        let id = submit_and_approve(&app).await;
        let (status, body) = send(
            &app,
            json_request(
                Method::PUT,
                &format!("/admin/comments/{id}/status"),
                json!({ "state": 1 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/admin/comments/{id}/replies"))
            .body(Body::from("{\"content\": \"Teşekkürler\"}"))
            .expect("build request");
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], 400);
    }

    #[tokio::test]
    async fn blog_pages_require_longer_comments() {
        let app = app();
        let mut submission = ahmet_submission();
        submission["pageId"] = json!("blog/oto-anahtar-kopyalama");
        submission["content"] = json!("Harika hizmet!!");

        let (status, body) =
            send(&app, json_request(Method::POST, "/api/comments", submission.clone())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        submission["pageId"] = json!("home");
        let (status, _) = send(&app, json_request(Method::POST, "/api/comments", submission)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn threads_endpoint_lists_actions_and_request_ids_are_echoed() {
        let app = app();
        let id = submit_and_approve(&app).await;

        let request = Request::builder()
            .uri("/admin/comments/threads?status=all&pageId=home")
            .header(REQUEST_ID_HEADER, "req-test-1")
            .body(Body::empty())
            .expect("build request");
        let response = app.clone().oneshot(request).await.expect("response");
        assert_eq!(
            response
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok()),
            Some("req-test-1")
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body: Value = serde_json::from_slice(&bytes).expect("json body");
        assert_eq!(body["threads"][0]["id"], id);
        assert_eq!(
            body["threads"][0]["actions"],
            json!(["approve", "reject", "reply", "delete"])
        );
        assert_eq!(body["orphans"].as_array().map(Vec::len), Some(0));

        let (status, body) = send(&app, get_request("/admin/test-connection")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["commentBackend"], "sqlite");
    }
}
