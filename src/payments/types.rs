use crate::payments::error::PaymentError;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Afrikpay,
    MtnMomo,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Afrikpay => "afrikpay",
            ProviderName::MtnMomo => "mtn_momo",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "afrikpay" => Ok(ProviderName::Afrikpay),
            "mtn_momo" | "mtn-momo" | "momo" => Ok(ProviderName::MtnMomo),
            _ => Err(PaymentError::UnsupportedProvider {
                provider: value.to_string(),
            }),
        }
    }
}

/// Canonical transaction lifecycle. `Pending` is the only non-terminal
/// state; every terminal write goes through the store's conditional update
/// so the first terminal writer wins.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_db_status(status: &str) -> Option<Self> {
        match status.to_lowercase().as_str() {
            "pending" => Some(TransactionStatus::Pending),
            "success" => Some(TransactionStatus::Success),
            "failed" => Some(TransactionStatus::Failed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub amount: String,
    pub currency: String,
}

impl Money {
    pub fn validate_positive(&self, field: &str) -> Result<(), PaymentError> {
        let parsed = BigDecimal::from_str(&self.amount).map_err(|_| PaymentError::Validation {
            message: format!("invalid decimal amount: {}", self.amount),
            field: Some(field.to_string()),
        })?;
        if parsed <= BigDecimal::from(0) {
            return Err(PaymentError::Validation {
                message: "amount must be greater than zero".to_string(),
                field: Some(field.to_string()),
            });
        }
        if self.currency.trim().is_empty() {
            return Err(PaymentError::Validation {
                message: "currency is required".to_string(),
                field: Some("currency".to_string()),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MobileMoney,
    Card,
    BankTransfer,
    Other,
}

/// Who absorbs the gateway fee for a payment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeOwner {
    Merchant,
    Customer,
}

impl FeeOwner {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeeOwner::Merchant => "MERCHANT",
            FeeOwner::Customer => "CUSTOMER",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Payment,
    GiveChange,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "PAYMENT",
            TransactionType::GiveChange => "GIVE_CHANGE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerContact {
    pub phone: Option<String>,
    pub email: Option<String>,
}

/// Generic payment request handed to an adapter. The orchestrator fills in
/// `reference` before the adapter ever sees the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: Money,
    pub description: String,
    pub customer: CustomerContact,
    pub provider: Option<ProviderName>,
    pub payment_method: Option<PaymentMethod>,
    pub fee_owner: Option<FeeOwner>,
    pub transaction_type: Option<TransactionType>,
    pub reference: Option<String>,
    pub callback_url: Option<String>,
}

/// Adapter result for an initiation call. Acceptance is not completion:
/// mobile-money gateways answer "accepted" and finish asynchronously, so
/// `status` is normally still `Pending` here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub status: TransactionStatus,
    pub reference: String,
    pub provider_transaction_id: Option<String>,
    pub payment_url: Option<String>,
    pub raw_status: Option<String>,
    pub provider_data: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRequest {
    pub reference: Option<String>,
    pub provider_transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: TransactionStatus,
    pub reference: Option<String>,
    pub provider_transaction_id: Option<String>,
    pub raw_status: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookVerificationResult {
    pub valid: bool,
    pub reason: Option<String>,
}

/// Inbound gateway callback, kept verbatim for the audit log. The resolved
/// reference stays `None` when the payload matches no known transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackEvent {
    pub provider: ProviderName,
    pub provider_transaction_id: Option<String>,
    pub reference: Option<String>,
    pub status: Option<TransactionStatus>,
    pub raw_status: Option<String>,
    pub amount: Option<Money>,
    pub message: Option<String>,
    pub payload: JsonValue,
    pub received_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub provider: ProviderName,
    pub available: Money,
    pub provider_data: Option<JsonValue>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycRequest {
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycResponse {
    pub provider: ProviderName,
    pub account_holder_found: bool,
    pub account_name: Option<String>,
    pub provider_data: Option<JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name_parses_aliases() {
        assert!(matches!(
            ProviderName::from_str("momo"),
            Ok(ProviderName::MtnMomo)
        ));
        assert!(matches!(
            ProviderName::from_str(" Afrikpay "),
            Ok(ProviderName::Afrikpay)
        ));
        assert!(ProviderName::from_str("paypal").is_err());
    }

    #[test]
    fn transaction_status_terminality() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(TransactionStatus::Success.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn transaction_status_db_round_trip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Success,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
        ] {
            assert_eq!(
                TransactionStatus::from_db_status(status.as_str()),
                Some(status)
            );
        }
        assert_eq!(TransactionStatus::from_db_status("reversed"), None);
    }

    #[test]
    fn money_validation_rejects_bad_amounts() {
        let zero = Money {
            amount: "0".to_string(),
            currency: "XAF".to_string(),
        };
        assert!(zero.validate_positive("amount").is_err());

        let garbage = Money {
            amount: "12,50".to_string(),
            currency: "XAF".to_string(),
        };
        assert!(garbage.validate_positive("amount").is_err());

        let ok = Money {
            amount: "5000".to_string(),
            currency: "XAF".to_string(),
        };
        assert!(ok.validate_positive("amount").is_ok());
    }

    #[test]
    fn fee_owner_wire_format_is_upper_snake() {
        let json = serde_json::to_value(FeeOwner::Merchant).expect("serialize");
        assert_eq!(json, "MERCHANT");
        assert_eq!(TransactionType::GiveChange.as_str(), "GIVE_CHANGE");
    }
}
