// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handlers for `GET /health` and `POST /embed`.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use rosemary_core::types::EmbeddingInput;
use rosemary_memory::remote::{EmbedRequest, EmbedResponse, HealthResponse};

use crate::EmbedState;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// GET /health
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// POST /embed
///
/// Returns one vector per text, in request order.
pub async fn post_embed(State(state): State<EmbedState>, Json(body): Json<EmbedRequest>) -> Response {
    if body.texts.is_empty() {
        return error(StatusCode::BAD_REQUEST, "texts must not be empty");
    }
    if body.texts.len() > state.max_batch {
        return error(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("at most {} texts per request", state.max_batch),
        );
    }

    let count = body.texts.len();
    match state.embedder.embed(EmbeddingInput { texts: body.texts }).await {
        Ok(output) => {
            tracing::debug!(texts = count, "embedded batch");
            Json(EmbedResponse {
                vectors: output.embeddings,
            })
            .into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, texts = count, "embedding failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
