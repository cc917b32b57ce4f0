//! End-to-end payment lifecycle tests against an in-memory store and
//! scripted gateway adapters.

use async_trait::async_trait;
use mobipay_engine::payments::error::{PaymentError, PaymentResult};
use mobipay_engine::payments::provider::PaymentProvider;
use mobipay_engine::payments::registry::{ProviderRegistry, RegistryConfig};
use mobipay_engine::payments::types::{
    BalanceResponse, CallbackEvent, CustomerContact, KycRequest, KycResponse, Money,
    PaymentRequest, PaymentResponse, ProviderName, StatusRequest, StatusResponse,
    TransactionStatus, WebhookVerificationResult,
};
use mobipay_engine::services::PaymentOrchestrator;
use mobipay_engine::store::memory::InMemoryTransactionStore;
use mobipay_engine::store::TransactionStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct AcceptingGateway {
    name: ProviderName,
    gateway_id: &'static str,
    initiate_calls: AtomicUsize,
}

impl AcceptingGateway {
    fn new(name: ProviderName, gateway_id: &'static str) -> Self {
        Self {
            name,
            gateway_id,
            initiate_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PaymentProvider for AcceptingGateway {
    async fn initiate_payment(&self, request: PaymentRequest) -> PaymentResult<PaymentResponse> {
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentResponse {
            status: TransactionStatus::Pending,
            reference: request.reference.unwrap_or_default(),
            provider_transaction_id: Some(self.gateway_id.to_string()),
            payment_url: None,
            raw_status: Some("ACCEPTED".to_string()),
            provider_data: None,
        })
    }

    async fn get_payment_status(&self, request: StatusRequest) -> PaymentResult<StatusResponse> {
        Ok(StatusResponse {
            status: TransactionStatus::Pending,
            reference: request.reference,
            provider_transaction_id: request.provider_transaction_id,
            raw_status: Some("PENDING".to_string()),
            message: None,
        })
    }

    async fn cancel_payment(&self, _request: StatusRequest) -> PaymentResult<bool> {
        Ok(true)
    }

    async fn check_balance(&self) -> PaymentResult<BalanceResponse> {
        Ok(BalanceResponse {
            provider: self.name,
            available: Money {
                amount: "250000".to_string(),
                currency: "XAF".to_string(),
            },
            provider_data: None,
        })
    }

    async fn perform_kyc(&self, _request: KycRequest) -> PaymentResult<KycResponse> {
        Ok(KycResponse {
            provider: self.name,
            account_holder_found: true,
            account_name: Some("Jean Mballa".to_string()),
            provider_data: None,
        })
    }

    async fn verify_webhook(
        &self,
        _payload: &[u8],
        _signature: &str,
        _timestamp: &str,
    ) -> PaymentResult<WebhookVerificationResult> {
        Ok(WebhookVerificationResult {
            valid: true,
            reason: None,
        })
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<CallbackEvent> {
        Ok(CallbackEvent {
            provider: self.name,
            provider_transaction_id: None,
            reference: None,
            status: None,
            raw_status: None,
            amount: None,
            message: None,
            payload: serde_json::from_slice(payload).unwrap_or(serde_json::json!({})),
            received_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn name(&self) -> ProviderName {
        self.name
    }
}

struct Fixture {
    orchestrator: PaymentOrchestrator,
    store: Arc<InMemoryTransactionStore>,
    afrikpay: Arc<AcceptingGateway>,
    momo: Arc<AcceptingGateway>,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemoryTransactionStore::new());
    let afrikpay = Arc::new(AcceptingGateway::new(ProviderName::Afrikpay, "afp_100"));
    let momo = Arc::new(AcceptingGateway::new(ProviderName::MtnMomo, "momo_100"));
    let registry = Arc::new(ProviderRegistry::new(
        RegistryConfig::default(),
        vec![afrikpay.clone() as Arc<dyn PaymentProvider>, momo.clone()],
    ));
    Fixture {
        orchestrator: PaymentOrchestrator::new(store.clone(), registry),
        store,
        afrikpay,
        momo,
    }
}

fn request(phone: &str, provider: Option<ProviderName>, reference: Option<&str>) -> PaymentRequest {
    PaymentRequest {
        amount: Money {
            amount: "5000".to_string(),
            currency: "XAF".to_string(),
        },
        description: "airtime bundle".to_string(),
        customer: CustomerContact {
            phone: Some(phone.to_string()),
            email: None,
        },
        provider,
        payment_method: None,
        fee_owner: None,
        transaction_type: None,
        reference: reference.map(|r| r.to_string()),
        callback_url: None,
    }
}

#[tokio::test]
async fn mtn_number_routes_to_momo_despite_explicit_override() {
    let fx = fixture();

    // 650 prefix classifies as MTN, so the Afrikpay override is ignored.
    let tx = fx
        .orchestrator
        .initiate_payment(request("650123456", Some(ProviderName::Afrikpay), None))
        .await
        .expect("initiation should succeed");

    assert_eq!(tx.provider, ProviderName::MtnMomo);
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.provider_transaction_id.as_deref(), Some("momo_100"));
    assert_eq!(fx.momo.initiate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.afrikpay.initiate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn full_lifecycle_success_callback_then_late_failure_is_ignored() {
    let fx = fixture();

    let tx = fx
        .orchestrator
        .initiate_payment(request("650123456", None, Some("MPFLOW1")))
        .await
        .expect("initiation should succeed");
    assert_eq!(tx.status, TransactionStatus::Pending);

    let success = CallbackEvent {
        provider: ProviderName::MtnMomo,
        provider_transaction_id: Some("momo_100".to_string()),
        reference: Some("MPFLOW1".to_string()),
        status: Some(TransactionStatus::Success),
        raw_status: Some("SUCCESSFUL".to_string()),
        amount: Some(Money {
            amount: "5000".to_string(),
            currency: "XAF".to_string(),
        }),
        message: None,
        payload: serde_json::json!({"status": "SUCCESSFUL"}),
        received_at: chrono::Utc::now().to_rfc3339(),
    };
    fx.orchestrator
        .apply_callback(success)
        .await
        .expect("success callback applies");

    let settled = fx
        .store
        .find_by_reference("MPFLOW1")
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(settled.status, TransactionStatus::Success);

    // A duplicate delivery disagreeing with the settled state is dropped.
    let late_failure = CallbackEvent {
        provider: ProviderName::MtnMomo,
        provider_transaction_id: Some("momo_100".to_string()),
        reference: Some("MPFLOW1".to_string()),
        status: Some(TransactionStatus::Failed),
        raw_status: Some("FAILED".to_string()),
        amount: None,
        message: Some("expired".to_string()),
        payload: serde_json::json!({"status": "FAILED"}),
        received_at: chrono::Utc::now().to_rfc3339(),
    };
    fx.orchestrator
        .apply_callback(late_failure)
        .await
        .expect("late callback is acknowledged");

    let still_settled = fx
        .store
        .find_by_reference("MPFLOW1")
        .await
        .expect("find")
        .expect("exists");
    assert_eq!(still_settled.status, TransactionStatus::Success);
    assert!(still_settled.error_message.is_none());
}

#[tokio::test]
async fn retried_initiation_reuses_the_stored_transaction() {
    let fx = fixture();

    let first = fx
        .orchestrator
        .initiate_payment(request("699887766", None, Some("MPRETRY")))
        .await
        .expect("first initiation");
    let second = fx
        .orchestrator
        .initiate_payment(request("699887766", None, Some("MPRETRY")))
        .await
        .expect("retried initiation");

    assert_eq!(first.id, second.id);
    assert_eq!(first.provider, ProviderName::Afrikpay);
    assert_eq!(fx.afrikpay.initiate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_settled_transaction_is_rejected() {
    let fx = fixture();

    let tx = fx
        .orchestrator
        .initiate_payment(request("699887766", None, Some("MPDONE")))
        .await
        .expect("initiation");
    fx.store
        .finalize_if_pending(tx.id, TransactionStatus::Success, None, None)
        .await
        .expect("settle");

    let err = fx
        .orchestrator
        .cancel_transaction("MPDONE")
        .await
        .expect_err("settled transactions cannot be cancelled");
    assert!(matches!(err, PaymentError::Validation { .. }));
}

#[tokio::test]
async fn generated_reference_is_assigned_when_absent() {
    let fx = fixture();

    let tx = fx
        .orchestrator
        .initiate_payment(request("699887766", None, None))
        .await
        .expect("initiation");
    assert!(tx.reference.starts_with("MP"));
    assert!(tx.reference.len() <= 15);
}
