//! Webhook verification and reconciliation through the HTTP surface,
//! using the real HMAC signature scheme.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use mobipay_engine::api::{self, webhooks, AppState};
use mobipay_engine::payments::credentials::{PrefixCredentialResolver, SecretsSource};
use mobipay_engine::payments::error::PaymentResult;
use mobipay_engine::payments::provider::PaymentProvider;
use mobipay_engine::payments::providers::{AfrikpayConfig, AfrikpayProvider};
use mobipay_engine::payments::registry::{ProviderRegistry, RegistryConfig};
use mobipay_engine::payments::types::{ProviderName, TransactionStatus};
use mobipay_engine::payments::utils::sign_hmac_sha256_hex;
use mobipay_engine::services::{PaymentOrchestrator, WebhookIngestor};
use mobipay_engine::store::memory::InMemoryTransactionStore;
use mobipay_engine::store::{Transaction, TransactionStore};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "afp-test-secret";

struct FixedSecret;

#[async_trait]
impl SecretsSource for FixedSecret {
    async fn fetch(&self, _key: &str) -> PaymentResult<String> {
        Ok(SECRET.to_string())
    }
}

async fn app_with_store() -> (axum::Router, Arc<InMemoryTransactionStore>) {
    let store = Arc::new(InMemoryTransactionStore::new());
    let credentials = Arc::new(PrefixCredentialResolver::new(Arc::new(FixedSecret)));
    let afrikpay = AfrikpayProvider::new(AfrikpayConfig::default(), credentials)
        .expect("adapter init");
    let registry = Arc::new(ProviderRegistry::new(
        RegistryConfig::default(),
        vec![Arc::new(afrikpay) as Arc<dyn PaymentProvider>],
    ));
    let orchestrator = Arc::new(PaymentOrchestrator::new(store.clone(), registry.clone()));
    let ingestor = Arc::new(WebhookIngestor::new(registry, orchestrator.clone()));
    let state = Arc::new(AppState {
        orchestrator,
        ingestor,
    });
    (api::router(state), store)
}

async fn seed_pending(store: &InMemoryTransactionStore, reference: &str, gateway_id: &str) {
    let tx = store
        .insert_if_absent(Transaction::new_pending(
            reference.to_string(),
            ProviderName::Afrikpay,
            "5000".to_string(),
            "XAF".to_string(),
            Some("699887766".to_string()),
            "airtime bundle".to_string(),
        ))
        .await
        .expect("insert")
        .into_transaction();
    store
        .set_provider_transaction_id(tx.id, gateway_id)
        .await
        .expect("set gateway id");
}

fn webhook_request(payload: &str, signature: &str, timestamp: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks/afrikpay")
        .header("content-type", "application/json")
        .header(webhooks::SIGNATURE_HEADER, signature)
        .header(webhooks::TIMESTAMP_HEADER, timestamp)
        .body(Body::from(payload.to_string()))
        .expect("request")
}

#[tokio::test]
async fn signed_callback_settles_the_transaction() {
    let (app, store) = app_with_store().await;
    seed_pending(&store, "MPWEB1", "afp_1").await;

    let payload = r#"{"transaction_id":"afp_1","reference":"MPWEB1","status":"SUCCESS","amount":"5000","currency":"XAF"}"#;
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = sign_hmac_sha256_hex(payload.as_bytes(), &timestamp, SECRET);

    let response = app
        .oneshot(webhook_request(payload, &signature, &timestamp))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let stored = store
        .find_by_reference("MPWEB1")
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(stored.status, TransactionStatus::Success);
}

#[tokio::test]
async fn forged_signature_answers_401_and_changes_nothing() {
    let (app, store) = app_with_store().await;
    seed_pending(&store, "MPWEB2", "afp_2").await;

    let payload = r#"{"transaction_id":"afp_2","reference":"MPWEB2","status":"SUCCESS"}"#;
    let timestamp = chrono::Utc::now().timestamp().to_string();

    let response = app
        .oneshot(webhook_request(payload, "deadbeef", &timestamp))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let stored = store
        .find_by_reference("MPWEB2")
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(stored.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn stale_timestamp_is_rejected_even_with_a_valid_signature() {
    let (app, store) = app_with_store().await;
    seed_pending(&store, "MPWEB3", "afp_3").await;

    let payload = r#"{"transaction_id":"afp_3","reference":"MPWEB3","status":"SUCCESS"}"#;
    let stale = (chrono::Utc::now().timestamp() - 3600).to_string();
    let signature = sign_hmac_sha256_hex(payload.as_bytes(), &stale, SECRET);

    let response = app
        .oneshot(webhook_request(payload, &signature, &stale))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let stored = store
        .find_by_reference("MPWEB3")
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(stored.status, TransactionStatus::Pending);
}

#[tokio::test]
async fn verified_callback_for_unknown_transaction_is_acknowledged() {
    let (app, _store) = app_with_store().await;

    let payload = r#"{"transaction_id":"afp_none","reference":"MPNONE","status":"SUCCESS"}"#;
    let timestamp = chrono::Utc::now().timestamp().to_string();
    let signature = sign_hmac_sha256_hex(payload.as_bytes(), &timestamp, SECRET);

    let response = app
        .oneshot(webhook_request(payload, &signature, &timestamp))
        .await
        .expect("response");
    // Redelivery would not help, so the gateway gets a 200.
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_signature_header_answers_401() {
    let (app, _store) = app_with_store().await;

    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/afrikpay")
        .header("content-type", "application/json")
        .header(webhooks::TIMESTAMP_HEADER, "1700000000")
        .body(Body::from("{}"))
        .expect("request");

    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
