// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding service: keeps one model loaded and serves vectors over HTTP.
//!
//! Routes:
//! - `GET /health` -> `{"status":"ok"}`
//! - `POST /embed` `{"texts": [...]}` -> `{"vectors": [[...]]}`

pub mod handlers;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use rosemary_core::{EmbeddingAdapter, RosemaryError};
use tower_http::trace::TraceLayer;

/// Largest batch accepted by `POST /embed`.
pub const DEFAULT_MAX_BATCH: usize = 256;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct EmbedState {
    pub embedder: Arc<dyn EmbeddingAdapter>,
    pub max_batch: usize,
}

impl EmbedState {
    pub fn new(embedder: Arc<dyn EmbeddingAdapter>) -> Self {
        Self {
            embedder,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}

/// Builds the service router.
pub fn router(state: EmbedState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route("/embed", post(handlers::post_embed))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds `host:port` and serves until Ctrl-C.
pub async fn serve(host: &str, port: u16, state: EmbedState) -> Result<(), RosemaryError> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RosemaryError::Config(format!("failed to bind embedding service to {addr}: {e}")))?;

    tracing::info!(dimensions = state.embedder.dimensions(), "embedding service listening on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| RosemaryError::Internal(format!("embedding service error: {e}")))
}
