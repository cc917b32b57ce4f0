use crate::api::AppState;
use crate::error::AppError;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub success: bool,
    pub message: String,
}

/// POST /webhooks/:provider
///
/// Answers 401 only on a failed signature check so the gateway retries
/// with a correct signature. A verified callback is always acknowledged
/// with 200, even when it matches no stored transaction.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, AppError> {
    info!(provider = %provider, bytes = body.len(), "webhook received");

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    let timestamp = headers
        .get(TIMESTAMP_HEADER)
        .and_then(|v| v.to_str().ok());

    state
        .ingestor
        .ingest(&provider, &body, signature, timestamp)
        .await?;

    Ok(Json(WebhookAck {
        success: true,
        message: "webhook processed".to_string(),
    }))
}
