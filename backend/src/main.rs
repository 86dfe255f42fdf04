//! HTTP server for the locksmith site: public comment API, admin moderation
//! API and the static pages.

mod handlers;
mod models;
mod rate_limit;
mod request_context;
mod routes;
mod state;

use std::{env, net::SocketAddr};

use anyhow::{Context, Result};
use locksite_shared::{BackendConfig, CommentConfig};
use tracing_subscriber::EnvFilter;

use crate::rate_limit::RateLimitConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Default to info-level logs; override via RUST_LOG if needed.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string());
    let site_dir = env::var("SITE_DIR").unwrap_or_else(|_| "./public".to_string());

    let comment_config = CommentConfig::from_env();
    let backend_config = BackendConfig::from_env()?;
    let rate_limit = RateLimitConfig::from_env();

    tracing::info!("Starting locksite backend server");
    tracing::info!("Site directory: {}", site_dir);
    tracing::info!(
        auto_approve = comment_config.auto_approve,
        max_per_page = comment_config.max_comments_per_page,
        rate_limit_per_hour = rate_limit.max_per_window,
        "comment settings loaded"
    );

    let app_state =
        state::AppState::from_config(&backend_config, comment_config, rate_limit, &site_dir)?;
    tracing::info!("Comment backend: {}", app_state.repository.backend_name());

    let app = routes::create_router(app_state);

    let addr = format!("{}:{}", bind_addr, port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
