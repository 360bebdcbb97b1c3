use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    response::{IntoResponse, sse::Event as SseEvent},
};
use chrono::Utc;
use serde_json::json;

use crate::app::services::{self, AppServices};
use crate::context::PrincipalContext;

pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Bakery API running" }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "OK", "timestamp": Utc::now() }))
}

/// Realtime feed of committed changes. Any authenticated role may listen.
pub async fn stream(
    Extension(services): Extension<Arc<AppServices>>,
    principal: PrincipalContext,
) -> axum::response::Sse<impl tokio_stream::Stream<Item = Result<SseEvent, std::convert::Infallible>>> {
    tracing::debug!(user_id = %principal.user_id(), "stream subscribed");
    services::sse_stream(services)
}
