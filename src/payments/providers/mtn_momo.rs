//! MTN Mobile Money (MoMo open API) adapter.
//!
//! MoMo authenticates with short-lived bearer tokens minted per product
//! scope (collection, disbursement, remittance) from independent Basic-auth
//! credentials. Tokens are deliberately not cached: each gateway call
//! re-authenticates, trading a little latency for freshness and for
//! immediate pickup of rotated keys. An HTTP 200/202 on `requesttopay`
//! means acceptance only, never captured funds.

use crate::payments::credentials::CredentialResolver;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{
    BalanceResponse, CallbackEvent, KycRequest, KycResponse, Money, PaymentRequest,
    PaymentResponse, ProviderName, StatusRequest, StatusResponse, TransactionStatus,
    WebhookVerificationResult,
};
use crate::payments::utils::{
    generate_reference, timestamp_is_fresh, verify_hmac_sha256_hex, GatewayHttpClient, RequestAuth,
};
use crate::phone;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Independent token scopes; each has its own subscription key and its own
/// Basic-auth credential pair on the gateway side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    Collection,
    Disbursement,
    Remittance,
}

impl TokenScope {
    pub fn path_segment(&self) -> &'static str {
        match self {
            TokenScope::Collection => "collection",
            TokenScope::Disbursement => "disbursement",
            TokenScope::Remittance => "remittance",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MomoConfig {
    pub base_url: String,
    pub target_environment: String,
    pub collection_subscription_key: String,
    pub disbursement_subscription_key: String,
    pub remittance_subscription_key: String,
    pub timeout_secs: u64,
}

impl Default for MomoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://proxy.momoapi.mtn.com".to_string(),
            target_environment: "mtncameroon".to_string(),
            collection_subscription_key: String::new(),
            disbursement_subscription_key: String::new(),
            remittance_subscription_key: String::new(),
            timeout_secs: 30,
        }
    }
}

impl MomoConfig {
    pub fn from_env() -> PaymentResult<Self> {
        let collection_subscription_key = std::env::var("MOMO_COLLECTION_SUBSCRIPTION_KEY")
            .map_err(|_| PaymentError::Validation {
                message: "MOMO_COLLECTION_SUBSCRIPTION_KEY environment variable is required"
                    .to_string(),
                field: Some("MOMO_COLLECTION_SUBSCRIPTION_KEY".to_string()),
            })?;
        Ok(Self {
            base_url: std::env::var("MOMO_BASE_URL")
                .unwrap_or_else(|_| "https://proxy.momoapi.mtn.com".to_string()),
            target_environment: std::env::var("MOMO_TARGET_ENVIRONMENT")
                .unwrap_or_else(|_| "mtncameroon".to_string()),
            disbursement_subscription_key: std::env::var("MOMO_DISBURSEMENT_SUBSCRIPTION_KEY")
                .unwrap_or_default(),
            remittance_subscription_key: std::env::var("MOMO_REMITTANCE_SUBSCRIPTION_KEY")
                .unwrap_or_default(),
            timeout_secs: std::env::var("MOMO_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            collection_subscription_key,
        })
    }
}

pub struct MomoProvider {
    config: MomoConfig,
    credentials: Arc<dyn CredentialResolver>,
    http: GatewayHttpClient,
}

impl MomoProvider {
    pub fn new(config: MomoConfig, credentials: Arc<dyn CredentialResolver>) -> PaymentResult<Self> {
        let http = GatewayHttpClient::new("mtn_momo", Duration::from_secs(config.timeout_secs))?;
        Ok(Self {
            config,
            credentials,
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn subscription_key(&self, scope: TokenScope) -> &str {
        match scope {
            TokenScope::Collection => &self.config.collection_subscription_key,
            TokenScope::Disbursement => &self.config.disbursement_subscription_key,
            TokenScope::Remittance => &self.config.remittance_subscription_key,
        }
    }

    /// Mint a fresh bearer token for one scope. Used for exactly one
    /// request/response pair; never cached.
    async fn get_token(&self, scope: TokenScope, national_number: &str) -> PaymentResult<String> {
        let api_user = self
            .credentials
            .merchant_account_code(ProviderName::MtnMomo, national_number)
            .await?;
        let api_key = self
            .credentials
            .secret_key(ProviderName::MtnMomo, national_number)
            .await?;

        let raw: MomoTokenResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/{}/token/", scope.path_segment())),
                RequestAuth::Basic(&api_user, &api_key),
                None,
                &[("Ocp-Apim-Subscription-Key", self.subscription_key(scope))],
            )
            .await?;
        Ok(raw.access_token)
    }

    /// MoMo status vocabulary → canonical states. Only `SUCCESSFUL` may
    /// become a success; anything unrecognized stays pending.
    fn map_status(raw: &str) -> TransactionStatus {
        match raw.trim().to_uppercase().as_str() {
            "SUCCESSFUL" => TransactionStatus::Success,
            "FAILED" | "REJECTED" | "TIMEOUT" => TransactionStatus::Failed,
            "CANCELLED" | "CANCELED" => TransactionStatus::Cancelled,
            "PENDING" | "ONGOING" | "CREATED" => TransactionStatus::Pending,
            _ => TransactionStatus::Pending,
        }
    }

    fn ensure_gateway_id(request: &StatusRequest) -> PaymentResult<String> {
        request
            .provider_transaction_id
            .clone()
            .filter(|v| !v.trim().is_empty())
            .ok_or(PaymentError::Validation {
                message: "provider_transaction_id is required for mtn_momo status queries"
                    .to_string(),
                field: Some("provider_transaction_id".to_string()),
            })
    }
}

#[async_trait]
impl PaymentProvider for MomoProvider {
    async fn initiate_payment(&self, request: PaymentRequest) -> PaymentResult<PaymentResponse> {
        request.amount.validate_positive("amount")?;

        let raw_phone = request.customer.phone.as_deref().unwrap_or("");
        let payer_number =
            phone::normalize(raw_phone).ok_or(PaymentError::InvalidPhoneNumber {
                number: raw_phone.to_string(),
            })?;

        let reference = request
            .reference
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(generate_reference);

        // The X-Reference-Id is the id the gateway will know this payment
        // by; it must be fresh per submission.
        let gateway_reference = Uuid::new_v4().to_string();
        let token = self.get_token(TokenScope::Collection, &payer_number).await?;

        let payload = serde_json::json!({
            "amount": request.amount.amount,
            "currency": request.amount.currency,
            "externalId": reference,
            "payer": {
                "partyIdType": "MSISDN",
                "partyId": payer_number,
            },
            "payerMessage": request.description,
            "payeeNote": request.description,
        });

        self.http
            .request_expect_empty(
                reqwest::Method::POST,
                &self.endpoint("/collection/v1_0/requesttopay"),
                RequestAuth::Bearer(&token),
                Some(&payload),
                &[
                    ("X-Reference-Id", gateway_reference.as_str()),
                    ("X-Target-Environment", self.config.target_environment.as_str()),
                    (
                        "Ocp-Apim-Subscription-Key",
                        self.subscription_key(TokenScope::Collection),
                    ),
                    ("Content-Type", "application/json"),
                ],
            )
            .await?;

        info!(reference = %reference, gateway_id = %gateway_reference, "momo request-to-pay accepted");

        Ok(PaymentResponse {
            status: TransactionStatus::Pending,
            reference,
            provider_transaction_id: Some(gateway_reference),
            payment_url: None,
            raw_status: Some("ACCEPTED".to_string()),
            provider_data: None,
        })
    }

    async fn get_payment_status(&self, request: StatusRequest) -> PaymentResult<StatusResponse> {
        let gateway_id = Self::ensure_gateway_id(&request)?;
        let token = self.get_token(TokenScope::Collection, "").await?;

        let raw: MomoPaymentStatus = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/collection/v1_0/requesttopay/{}", gateway_id)),
                RequestAuth::Bearer(&token),
                None,
                &[
                    ("X-Target-Environment", self.config.target_environment.as_str()),
                    (
                        "Ocp-Apim-Subscription-Key",
                        self.subscription_key(TokenScope::Collection),
                    ),
                ],
            )
            .await?;

        Ok(StatusResponse {
            status: Self::map_status(&raw.status),
            reference: raw.external_id,
            provider_transaction_id: Some(gateway_id),
            raw_status: Some(raw.status),
            message: raw.reason,
        })
    }

    async fn cancel_payment(&self, _request: StatusRequest) -> PaymentResult<bool> {
        // The gateway offers no cancellation for an accepted request-to-pay;
        // the payer either confirms or lets the prompt expire.
        Ok(false)
    }

    async fn check_balance(&self) -> PaymentResult<BalanceResponse> {
        let token = self.get_token(TokenScope::Collection, "").await?;
        let raw: MomoBalance = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint("/collection/v1_0/account/balance"),
                RequestAuth::Bearer(&token),
                None,
                &[
                    ("X-Target-Environment", self.config.target_environment.as_str()),
                    (
                        "Ocp-Apim-Subscription-Key",
                        self.subscription_key(TokenScope::Collection),
                    ),
                ],
            )
            .await?;

        Ok(BalanceResponse {
            provider: ProviderName::MtnMomo,
            available: Money {
                amount: raw.available_balance,
                currency: raw.currency,
            },
            provider_data: None,
        })
    }

    async fn perform_kyc(&self, request: KycRequest) -> PaymentResult<KycResponse> {
        let number = phone::normalize(&request.phone).ok_or(PaymentError::InvalidPhoneNumber {
            number: request.phone.clone(),
        })?;
        let token = self.get_token(TokenScope::Collection, &number).await?;

        let raw: JsonValue = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!(
                    "/collection/v1_0/accountholder/msisdn/{}/basicuserinfo",
                    number
                )),
                RequestAuth::Bearer(&token),
                None,
                &[
                    ("X-Target-Environment", self.config.target_environment.as_str()),
                    (
                        "Ocp-Apim-Subscription-Key",
                        self.subscription_key(TokenScope::Collection),
                    ),
                ],
            )
            .await?;

        let given = raw.get("given_name").and_then(|v| v.as_str());
        let family = raw.get("family_name").and_then(|v| v.as_str());
        let account_name = match (given, family) {
            (Some(g), Some(f)) => Some(format!("{} {}", g, f)),
            (Some(g), None) => Some(g.to_string()),
            (None, Some(f)) => Some(f.to_string()),
            (None, None) => None,
        };

        Ok(KycResponse {
            provider: ProviderName::MtnMomo,
            account_holder_found: account_name.is_some(),
            account_name,
            provider_data: Some(raw),
        })
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
        timestamp: &str,
    ) -> PaymentResult<WebhookVerificationResult> {
        if !timestamp_is_fresh(timestamp, chrono::Utc::now().timestamp()) {
            return Ok(WebhookVerificationResult {
                valid: false,
                reason: Some("stale or malformed callback timestamp".to_string()),
            });
        }

        let payer_number = serde_json::from_slice::<JsonValue>(payload)
            .ok()
            .and_then(|v| {
                v.get("payer")
                    .and_then(|p| p.get("partyId"))
                    .and_then(|n| n.as_str())
                    .map(|n| n.to_string())
            })
            .unwrap_or_default();
        let secret = self
            .credentials
            .secret_key(ProviderName::MtnMomo, &payer_number)
            .await?;

        let valid = verify_hmac_sha256_hex(payload, timestamp, &secret, signature);
        Ok(WebhookVerificationResult {
            valid,
            reason: if valid {
                None
            } else {
                Some("invalid mtn_momo signature".to_string())
            },
        })
    }

    fn parse_webhook_event(&self, payload: &[u8]) -> PaymentResult<CallbackEvent> {
        let parsed: JsonValue =
            serde_json::from_slice(payload).map_err(|e| PaymentError::Validation {
                message: format!("invalid webhook JSON payload: {}", e),
                field: None,
            })?;

        let raw_status = parsed
            .get("status")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        let amount = parsed.get("amount").and_then(|v| v.as_str()).map(|amount| Money {
            amount: amount.to_string(),
            currency: parsed
                .get("currency")
                .and_then(|v| v.as_str())
                .unwrap_or("XAF")
                .to_string(),
        });

        Ok(CallbackEvent {
            provider: ProviderName::MtnMomo,
            provider_transaction_id: parsed
                .get("referenceId")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            reference: parsed
                .get("externalId")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            status: raw_status.as_deref().map(Self::map_status),
            raw_status,
            amount,
            message: parsed
                .get("reason")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            payload: parsed,
            received_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::MtnMomo
    }
}

#[derive(Debug, Deserialize)]
struct MomoTokenResponse {
    access_token: String,
    #[allow(dead_code)]
    #[serde(default)]
    token_type: Option<String>,
    #[allow(dead_code)]
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MomoPaymentStatus {
    status: String,
    #[serde(rename = "externalId", default)]
    external_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MomoBalance {
    #[serde(rename = "availableBalance")]
    available_balance: String,
    currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::credentials::{PrefixCredentialResolver, SecretsSource};
    use crate::payments::utils::sign_hmac_sha256_hex;

    struct FixedSecret;

    #[async_trait]
    impl SecretsSource for FixedSecret {
        async fn fetch(&self, _key: &str) -> PaymentResult<String> {
            Ok("momo-api-key".to_string())
        }
    }

    fn provider() -> MomoProvider {
        MomoProvider::new(
            MomoConfig {
                collection_subscription_key: "sub-key".to_string(),
                ..MomoConfig::default()
            },
            Arc::new(PrefixCredentialResolver::new(Arc::new(FixedSecret))),
        )
        .expect("provider init should succeed")
    }

    #[test]
    fn only_successful_maps_to_success() {
        assert_eq!(
            MomoProvider::map_status("SUCCESSFUL"),
            TransactionStatus::Success
        );
        assert_eq!(MomoProvider::map_status("FAILED"), TransactionStatus::Failed);
        assert_eq!(
            MomoProvider::map_status("PENDING"),
            TransactionStatus::Pending
        );
        // Fail closed: unknown vocabulary is pending, never success.
        assert_eq!(
            MomoProvider::map_status("APPROVED"),
            TransactionStatus::Pending
        );
        assert_eq!(
            MomoProvider::map_status("success"),
            TransactionStatus::Pending
        );
    }

    #[test]
    fn token_scopes_have_distinct_paths() {
        assert_eq!(TokenScope::Collection.path_segment(), "collection");
        assert_eq!(TokenScope::Disbursement.path_segment(), "disbursement");
        assert_eq!(TokenScope::Remittance.path_segment(), "remittance");
    }

    #[test]
    fn parse_webhook_event_maps_momo_fields() {
        let provider = provider();
        let payload = br#"{
            "referenceId": "3f2e1d4c-aaaa-bbbb-cccc-001122334455",
            "externalId": "P1",
            "status": "SUCCESSFUL",
            "amount": "5000",
            "currency": "XAF"
        }"#;
        let event = provider
            .parse_webhook_event(payload)
            .expect("webhook parse should succeed");
        assert_eq!(
            event.provider_transaction_id.as_deref(),
            Some("3f2e1d4c-aaaa-bbbb-cccc-001122334455")
        );
        assert_eq!(event.reference.as_deref(), Some("P1"));
        assert_eq!(event.status, Some(TransactionStatus::Success));
    }

    #[tokio::test]
    async fn webhook_verification_round_trip() {
        let provider = provider();
        let payload = br#"{"referenceId":"r1","status":"SUCCESSFUL"}"#;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign_hmac_sha256_hex(payload, &timestamp, "momo-api-key");

        let ok = provider
            .verify_webhook(payload, &signature, &timestamp)
            .await
            .expect("verification should not error");
        assert!(ok.valid);

        let bad = provider
            .verify_webhook(payload, "ffff", &timestamp)
            .await
            .expect("verification should not error");
        assert!(!bad.valid);
    }

    #[tokio::test]
    async fn cancel_is_reported_as_unsupported_by_the_gateway() {
        let provider = provider();
        let cancelled = provider
            .cancel_payment(StatusRequest {
                reference: Some("P1".to_string()),
                provider_transaction_id: Some("r1".to_string()),
            })
            .await
            .expect("cancel should not error");
        assert!(!cancelled);
    }
}
