//! AfrikPay gateway adapter.
//!
//! AfrikPay authenticates every request with a shared secret in the
//! `X-Api-Secret` header and encodes the outcome in a gateway-specific
//! `code` field ("200" means accepted) rather than the HTTP status. The
//! secret and the merchant sub-account are resolved per payer prefix
//! immediately before each call, so key rotation needs no restart.

use crate::payments::credentials::CredentialResolver;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{
    BalanceResponse, CallbackEvent, FeeOwner, KycRequest, KycResponse, Money, PaymentRequest,
    PaymentResponse, ProviderName, StatusRequest, StatusResponse, TransactionStatus,
    TransactionType, WebhookVerificationResult,
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

const SECRET_HEADER: &str = "X-Api-Secret";

#[derive(Debug, Clone)]
pub struct AfrikpayConfig {
    pub base_url: String,
    /// Service tag identifying the product line on the gateway side.
    pub service: String,
    /// Callback routing code registered with the gateway.
    pub callback_code: String,
    pub timeout_secs: u64,
}

impl Default for AfrikpayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.afrikpay.com/v2".to_string(),
            service: "MOBILE_MONEY".to_string(),
            callback_code: "MKT01".to_string(),
            timeout_secs: 30,
        }
    }
}

impl AfrikpayConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("AFRIKPAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.afrikpay.com/v2".to_string()),
            service: std::env::var("AFRIKPAY_SERVICE")
                .unwrap_or_else(|_| "MOBILE_MONEY".to_string()),
            callback_code: std::env::var("AFRIKPAY_CALLBACK_CODE")
                .unwrap_or_else(|_| "MKT01".to_string()),
            timeout_secs: std::env::var("AFRIKPAY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        }
    }
}

pub struct AfrikpayProvider {
    config: AfrikpayConfig,
    credentials: Arc<dyn CredentialResolver>,
    http: GatewayHttpClient,
}

impl AfrikpayProvider {
    pub fn new(
        config: AfrikpayConfig,
        credentials: Arc<dyn CredentialResolver>,
    ) -> PaymentResult<Self> {
        let http = GatewayHttpClient::new("afrikpay", Duration::from_secs(config.timeout_secs))?;
        Ok(Self {
            config,
            credentials,
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn secret_for(&self, national_number: &str) -> PaymentResult<String> {
        self.credentials
            .secret_key(ProviderName::Afrikpay, national_number)
            .await
    }

    fn ensure_gateway_id(request: &StatusRequest) -> PaymentResult<String> {
        request
            .provider_transaction_id
            .clone()
            .or_else(|| request.reference.clone())
            .filter(|v| !v.trim().is_empty())
            .ok_or(PaymentError::Validation {
                message: "provider_transaction_id or reference is required".to_string(),
                field: Some("reference".to_string()),
            })
    }

    /// Gateway status vocabulary → canonical states. Values we have never
    /// seen fail closed to pending so a vocabulary drift on the gateway
    /// side cannot fabricate a success.
    fn map_status(raw: &str) -> TransactionStatus {
        match raw.trim().to_uppercase().as_str() {
            "SUCCESS" | "SUCCESSFUL" | "COMPLETED" => TransactionStatus::Success,
            "FAILED" | "ERROR" | "DECLINED" | "REJECTED" => TransactionStatus::Failed,
            "CANCELLED" | "CANCELED" | "EXPIRED" => TransactionStatus::Cancelled,
            "PENDING" | "INITIATED" | "PROCESSING" | "ACCEPTED" => TransactionStatus::Pending,
            _ => TransactionStatus::Pending,
        }
    }
}

#[async_trait]
impl PaymentProvider for AfrikpayProvider {
    async fn initiate_payment(&self, request: PaymentRequest) -> PaymentResult<PaymentResponse> {
        request.amount.validate_positive("amount")?;

        let raw_phone = request.customer.phone.as_deref().unwrap_or("");
        let account_number =
            phone::normalize(raw_phone).ok_or(PaymentError::InvalidPhoneNumber {
                number: raw_phone.to_string(),
            })?;

        let merchant_code = self
            .credentials
            .merchant_account_code(ProviderName::Afrikpay, &account_number)
            .await?;
        let secret = self.secret_for(&account_number).await?;

        let reference = request
            .reference
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(generate_reference);
        if reference.len() > 15 {
            return Err(PaymentError::Validation {
                message: "reference must be at most 15 characters".to_string(),
                field: Some("reference".to_string()),
            });
        }

        let payload = serde_json::json!({
            "amount": request.amount.amount,
            "currency": request.amount.currency,
            "reference": reference,
            "service": self.config.service,
            "callback_code": self.config.callback_code,
            "account_number": account_number,
            "merchant_code": merchant_code,
            "transaction_type": request.transaction_type.unwrap_or(TransactionType::Payment).as_str(),
            "fee_owner": request.fee_owner.unwrap_or(FeeOwner::Merchant).as_str(),
            "note": request.description,
        });

        let raw: AfrikpayEnvelope<AfrikpayInitData> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/payments"),
                RequestAuth::Header(SECRET_HEADER, &secret),
                Some(&payload),
                &[("Content-Type", "application/json")],
            )
            .await?;

        // The gateway reports acceptance in its own code field, not the
        // HTTP status.
        if raw.code != "200" {
            return Err(PaymentError::ProviderRejected {
                provider: "afrikpay".to_string(),
                code: Some(raw.code),
                message: raw.message,
            });
        }

        let data = raw.data.ok_or(PaymentError::Network {
            message: "afrikpay accepted the payment but returned no data".to_string(),
        })?;
        info!(reference = %reference, gateway_id = %data.transaction_id, "afrikpay payment accepted");

        // Accepted, not completed: the payer still has to confirm on their
        // handset, so the canonical status stays pending.
        Ok(PaymentResponse {
            status: TransactionStatus::Pending,
            reference,
            provider_transaction_id: Some(data.transaction_id),
            payment_url: data.payment_url,
            raw_status: Some(raw.code),
            provider_data: data.extra,
        })
    }

    async fn get_payment_status(&self, request: StatusRequest) -> PaymentResult<StatusResponse> {
        let gateway_id = Self::ensure_gateway_id(&request)?;
        let secret = self.secret_for("").await?;

        let raw: AfrikpayEnvelope<AfrikpayStatusData> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/payments/{}/status", gateway_id)),
                RequestAuth::Header(SECRET_HEADER, &secret),
                None,
                &[],
            )
            .await?;

        if raw.code != "200" {
            return Err(PaymentError::ProviderRejected {
                provider: "afrikpay".to_string(),
                code: Some(raw.code),
                message: raw.message,
            });
        }

        let data = raw.data.ok_or(PaymentError::Network {
            message: "afrikpay status response carried no data".to_string(),
        })?;

        Ok(StatusResponse {
            status: Self::map_status(&data.status),
            reference: data.reference,
            provider_transaction_id: Some(gateway_id),
            raw_status: Some(data.status),
            message: data.reason,
        })
    }

    async fn cancel_payment(&self, request: StatusRequest) -> PaymentResult<bool> {
        let gateway_id = Self::ensure_gateway_id(&request)?;
        let secret = self.secret_for("").await?;

        let raw: AfrikpayEnvelope<JsonValue> = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(&format!("/payments/{}/cancel", gateway_id)),
                RequestAuth::Header(SECRET_HEADER, &secret),
                None,
                &[],
            )
            .await?;

        Ok(raw.code == "200")
    }

    async fn check_balance(&self) -> PaymentResult<BalanceResponse> {
        let merchant_code = self
            .credentials
            .merchant_account_code(ProviderName::Afrikpay, "")
            .await?;
        let secret = self.secret_for("").await?;

        let raw: AfrikpayEnvelope<AfrikpayBalanceData> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/merchants/{}/balance", merchant_code)),
                RequestAuth::Header(SECRET_HEADER, &secret),
                None,
                &[],
            )
            .await?;

        let data = raw.data.ok_or(PaymentError::Network {
            message: "afrikpay balance response carried no data".to_string(),
        })?;
        Ok(BalanceResponse {
            provider: ProviderName::Afrikpay,
            available: Money {
                amount: data.amount,
                currency: data.currency,
            },
            provider_data: None,
        })
    }

    async fn perform_kyc(&self, request: KycRequest) -> PaymentResult<KycResponse> {
        let number = phone::normalize(&request.phone).ok_or(PaymentError::InvalidPhoneNumber {
            number: request.phone.clone(),
        })?;
        let secret = self.secret_for(&number).await?;

        let raw: AfrikpayEnvelope<AfrikpayKycData> = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/accounts/{}/kyc", number)),
                RequestAuth::Header(SECRET_HEADER, &secret),
                None,
                &[],
            )
            .await?;

        let data = raw.data.unwrap_or_default();
        Ok(KycResponse {
            provider: ProviderName::Afrikpay,
            account_holder_found: raw.code == "200" && data.holder_name.is_some(),
            account_name: data.holder_name,
            provider_data: data.extra,
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

        // Callbacks are signed with the sub-account key of the payer they
        // concern; fall back to the baseline account when the payload does
        // not name one.
        let account_number = serde_json::from_slice::<JsonValue>(payload)
            .ok()
            .and_then(|v| {
                v.get("account_number")
                    .and_then(|n| n.as_str())
                    .map(|n| n.to_string())
            })
            .unwrap_or_default();
        let secret = self.secret_for(&account_number).await?;

        let valid = verify_hmac_sha256_hex(payload, timestamp, &secret, signature);
        Ok(WebhookVerificationResult {
            valid,
            reason: if valid {
                None
            } else {
                Some("invalid afrikpay signature".to_string())
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
            provider: ProviderName::Afrikpay,
            provider_transaction_id: parsed
                .get("transaction_id")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            reference: parsed
                .get("reference")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            status: raw_status.as_deref().map(Self::map_status),
            raw_status,
            amount,
            message: parsed
                .get("message")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            payload: parsed,
            received_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    fn name(&self) -> ProviderName {
        ProviderName::Afrikpay
    }
}

#[derive(Debug, Deserialize)]
struct AfrikpayEnvelope<T> {
    code: String,
    message: String,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct AfrikpayInitData {
    transaction_id: String,
    #[serde(default)]
    payment_url: Option<String>,
    #[serde(flatten)]
    extra: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct AfrikpayStatusData {
    status: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AfrikpayBalanceData {
    amount: String,
    currency: String,
}

#[derive(Debug, Deserialize, Default)]
struct AfrikpayKycData {
    #[serde(default)]
    holder_name: Option<String>,
    #[serde(flatten)]
    extra: Option<JsonValue>,
}
