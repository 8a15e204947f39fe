use super::memory::MemorySpace;
use super::protocol::*;
use super::types::*;

use axum::routing::post;
use axum::{Extension, Json, Router, http::StatusCode};
use std::sync::Arc;

/// Builds the HTTP surface of a board server around one shared `MemorySpace`.
pub fn router(space: Arc<MemorySpace>) -> Router {
    Router::new()
        .route(ENDPOINT_SPACE_WRITE, post(handle_space_write))
        .route(ENDPOINT_SPACE_TAKE, post(handle_space_take))
        .route(ENDPOINT_SPACE_TAKE_IF_EXISTS, post(handle_space_take_if_exists))
        .layer(Extension(space))
}

pub async fn handle_space_write(
    Extension(space): Extension<Arc<MemorySpace>>,
    Json(req): Json<WriteRequest>,
) -> (StatusCode, Json<WriteResponse>) {
    match space.write(req.entry, req.lease).await {
        Ok(()) => (StatusCode::OK, Json(WriteResponse { accepted: true })),
        Err(e) => {
            tracing::error!("Failed to write entry: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WriteResponse { accepted: false }),
            )
        }
    }
}

pub async fn handle_space_take(
    Extension(space): Extension<Arc<MemorySpace>>,
    Json(req): Json<TakeRequest>,
) -> (StatusCode, Json<TakeResponse>) {
    // One HTTP round trip never blocks longer than MAX_POLL_MILLIS; clients
    // with longer deadlines loop.
    let timeout = match req.timeout {
        Timeout::Forever => Timeout::Millis(MAX_POLL_MILLIS),
        Timeout::Millis(millis) => Timeout::Millis(millis.min(MAX_POLL_MILLIS)),
    };

    match space.take(req.template, timeout).await {
        Ok(entry) => (StatusCode::OK, Json(TakeResponse { entry })),
        Err(e) => {
            tracing::error!("Take failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TakeResponse { entry: None }),
            )
        }
    }
}

pub async fn handle_space_take_if_exists(
    Extension(space): Extension<Arc<MemorySpace>>,
    Json(req): Json<TakeIfExistsRequest>,
) -> (StatusCode, Json<TakeResponse>) {
    match space.take_if_exists(req.template).await {
        Ok(entry) => (StatusCode::OK, Json(TakeResponse { entry })),
        Err(e) => {
            tracing::error!("Take-if-exists failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TakeResponse { entry: None }),
            )
        }
    }
}
