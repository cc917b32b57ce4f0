//! HTTP surface.

pub mod payments;
pub mod webhooks;

use crate::services::{PaymentOrchestrator, WebhookIngestor};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct AppState {
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub ingestor: Arc<WebhookIngestor>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/payments", post(payments::initiate_payment))
        .route("/payments/:reference", get(payments::get_payment_status))
        .route("/payments/:reference/cancel", post(payments::cancel_payment))
        .route("/providers/:provider/balance", get(payments::check_balance))
        .route("/providers/:provider/kyc", post(payments::perform_kyc))
        .route("/webhooks/:provider", post(webhooks::handle_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
