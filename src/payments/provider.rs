use crate::payments::error::PaymentResult;
use crate::payments::types::{
    BalanceResponse, CallbackEvent, KycRequest, KycResponse, PaymentRequest, PaymentResponse,
    ProviderName, StatusRequest, StatusResponse, WebhookVerificationResult,
};
use async_trait::async_trait;

/// One payment gateway behind a common interface.
///
/// Adapters own their wire format, authentication scheme and status
/// vocabulary; everything they return is normalized to the canonical types.
/// The orchestrator depends only on this trait.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Submit a payment to the gateway. Acceptance keeps the canonical
    /// status `Pending`; an explicit decline surfaces as `ProviderRejected`.
    async fn initiate_payment(&self, request: PaymentRequest) -> PaymentResult<PaymentResponse>;

    /// Re-query the gateway and map its status vocabulary to the canonical
    /// states. Unmapped values fail closed to `Pending`, never `Success`.
    async fn get_payment_status(&self, request: StatusRequest) -> PaymentResult<StatusResponse>;

    /// Ask the gateway to cancel a not-yet-completed payment. `false` means
    /// the gateway refused (or cannot cancel); the caller keeps its state.
    async fn cancel_payment(&self, request: StatusRequest) -> PaymentResult<bool>;

    /// Merchant balance pass-through.
    async fn check_balance(&self) -> PaymentResult<BalanceResponse>;

    /// Account-holder KYC pass-through.
    async fn perform_kyc(&self, request: KycRequest) -> PaymentResult<KycResponse>;

    /// Verify the callback signature against the currently active secret.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
        timestamp: &str,
    ) -> PaymentResult<WebhookVerificationResult>;

    /// Parse a callback payload into the canonical event shape. Parsing
    /// never mutates state; the reconciliation rule is applied elsewhere.
    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<CallbackEvent>;

    fn name(&self) -> ProviderName;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::types::{CustomerContact, Money, TransactionStatus};

    struct MockProvider;

    #[async_trait]
    impl PaymentProvider for MockProvider {
        async fn initiate_payment(
            &self,
            request: PaymentRequest,
        ) -> PaymentResult<PaymentResponse> {
            Ok(PaymentResponse {
                status: TransactionStatus::Pending,
                reference: request.reference.unwrap_or_default(),
                provider_transaction_id: Some("gw_1".to_string()),
                payment_url: None,
                raw_status: Some("200".to_string()),
                provider_data: None,
            })
        }

        async fn get_payment_status(
            &self,
            request: StatusRequest,
        ) -> PaymentResult<StatusResponse> {
            Ok(StatusResponse {
                status: TransactionStatus::Success,
                reference: request.reference,
                provider_transaction_id: request.provider_transaction_id,
                raw_status: Some("SUCCESS".to_string()),
                message: None,
            })
        }

        async fn cancel_payment(&self, _request: StatusRequest) -> PaymentResult<bool> {
            Ok(true)
        }

        async fn check_balance(&self) -> PaymentResult<BalanceResponse> {
            Ok(BalanceResponse {
                provider: ProviderName::Afrikpay,
                available: Money {
                    amount: "0".to_string(),
                    currency: "XAF".to_string(),
                },
                provider_data: None,
            })
        }

        async fn perform_kyc(&self, _request: KycRequest) -> PaymentResult<KycResponse> {
            Ok(KycResponse {
                provider: ProviderName::Afrikpay,
                account_holder_found: true,
                account_name: Some("Test Holder".to_string()),
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
                provider: ProviderName::Afrikpay,
                provider_transaction_id: None,
                reference: None,
                status: Some(TransactionStatus::Success),
                raw_status: Some("SUCCESS".to_string()),
                amount: None,
                message: None,
                payload: serde_json::from_slice(payload).unwrap_or(serde_json::json!({})),
                received_at: chrono::Utc::now().to_rfc3339(),
            })
        }

        fn name(&self) -> ProviderName {
            ProviderName::Afrikpay
        }
    }

    #[tokio::test]
    async fn trait_can_be_implemented_by_mock_provider() {
        let provider: Box<dyn PaymentProvider> = Box::new(MockProvider);
        let response = provider
            .initiate_payment(PaymentRequest {
                amount: Money {
                    amount: "5000".to_string(),
                    currency: "XAF".to_string(),
                },
                description: "order 42".to_string(),
                customer: CustomerContact {
                    phone: Some("650123456".to_string()),
                    email: None,
                },
                provider: None,
                payment_method: None,
                fee_owner: None,
                transaction_type: None,
                reference: Some("P1".to_string()),
                callback_url: None,
            })
            .await
            .expect("initiation should succeed");
        assert_eq!(response.status, TransactionStatus::Pending);
        assert_eq!(response.provider_transaction_id.as_deref(), Some("gw_1"));
    }
}
