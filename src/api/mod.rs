// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

pub mod handlers;
pub mod routes;
pub mod session;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ApiConfig;
use crate::db::Database;
use crate::services::AppServices;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
    /// Absent when running over the in-memory store
    pub db: Option<Arc<Database>>,
}

impl AppState {
    pub fn new(services: AppServices, db: Option<Arc<Database>>) -> Self {
        Self { services, db }
    }
}

/// All routes with request tracing, without CORS
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // General routes
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::get_metrics))
        // Blocking and visibility
        .route("/api/users/:id/block-status", get(handlers::blocking::get_block_status))
        .route("/api/users/:id/block-control", get(handlers::blocking::get_block_control))
        .route("/api/users/:id/visibility", get(handlers::blocking::get_visibility))
        .route("/api/users/:id/block", post(handlers::blocking::block_user))
        .route("/api/users/:id/unblock", post(handlers::blocking::unblock_user))
        // Abuse reports
        .route(
            "/api/users/:id/report",
            get(handlers::reports::get_report_form).post(handlers::reports::file_report),
        )
        .route("/api/reports", get(handlers::reports::list_reports))
        .route(
            "/api/reports/:id",
            get(handlers::reports::get_report)
                .patch(handlers::reports::update_report)
                .delete(handlers::reports::delete_report),
        )
        .route("/api/reports/:id/reply", post(handlers::reports::reply_to_report))
        // Administration
        .route("/api/admin/blocks/import", post(handlers::blocking::import_blocks))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Start the API server
pub async fn start_api_server(config: &ApiConfig, state: AppState) -> Result<()> {
    let mut app = build_router(state);
    if config.enable_cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let addr = format!("{}:{}", config.host, config.port)
        .parse::<SocketAddr>()
        .with_context(|| format!("Invalid API address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Starting API server on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
