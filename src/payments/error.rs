use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

/// Normalized payment-layer error taxonomy. Adapters catch every transport
/// and gateway failure and map it here; raw reqwest errors never cross the
/// orchestrator boundary.
#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid phone number: {number}")]
    InvalidPhoneNumber { number: String },

    #[error("No payment provider available for this request")]
    NoProviderAvailable,

    #[error("Unsupported provider: {provider}")]
    UnsupportedProvider { provider: String },

    /// Transient: the gateway did not answer in time. The transaction, if
    /// one was created, stays pending for a later reconciliation pass.
    #[error("Provider timeout: provider={provider} after {timeout_secs}s")]
    ProviderTimeout { provider: String, timeout_secs: u64 },

    /// The gateway explicitly declined the request. Terminal.
    #[error("Provider rejected: provider={provider}, message={message}")]
    ProviderRejected {
        provider: String,
        code: Option<String>,
        message: String,
    },

    #[error("Invalid callback signature: {message}")]
    SignatureInvalid { message: String },

    #[error("Transaction not found: {id}")]
    TransactionNotFound { id: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Store error: {message}")]
    Store { message: String },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::ProviderTimeout { .. } => true,
            PaymentError::Network { .. } => true,
            PaymentError::Store { .. } => true,
            PaymentError::Validation { .. }
            | PaymentError::InvalidPhoneNumber { .. }
            | PaymentError::NoProviderAvailable
            | PaymentError::UnsupportedProvider { .. }
            | PaymentError::ProviderRejected { .. }
            | PaymentError::SignatureInvalid { .. }
            | PaymentError::TransactionNotFound { .. } => false,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::Validation { .. } => 400,
            PaymentError::InvalidPhoneNumber { .. } => 400,
            PaymentError::NoProviderAvailable => 503,
            PaymentError::UnsupportedProvider { .. } => 400,
            PaymentError::ProviderTimeout { .. } => 504,
            PaymentError::ProviderRejected { .. } => 402,
            PaymentError::SignatureInvalid { .. } => 401,
            PaymentError::TransactionNotFound { .. } => 404,
            PaymentError::Network { .. } => 503,
            PaymentError::Store { .. } => 500,
        }
    }

    /// Stable machine-readable code for the `{success, message, error_code}`
    /// failure envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            PaymentError::Validation { .. } => "VALIDATION_ERROR",
            PaymentError::InvalidPhoneNumber { .. } => "INVALID_PHONE_NUMBER",
            PaymentError::NoProviderAvailable => "NO_PROVIDER_AVAILABLE",
            PaymentError::UnsupportedProvider { .. } => "UNSUPPORTED_PROVIDER",
            PaymentError::ProviderTimeout { .. } => "PROVIDER_TIMEOUT",
            PaymentError::ProviderRejected { .. } => "PROVIDER_REJECTED",
            PaymentError::SignatureInvalid { .. } => "SIGNATURE_INVALID",
            PaymentError::TransactionNotFound { .. } => "TRANSACTION_NOT_FOUND",
            PaymentError::Network { .. } => "NETWORK_ERROR",
            PaymentError::Store { .. } => "STORE_ERROR",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::Validation { message, .. } => message.clone(),
            PaymentError::InvalidPhoneNumber { .. } => {
                "The phone number provided is not a valid mobile number".to_string()
            }
            PaymentError::NoProviderAvailable => {
                "No payment provider is available right now".to_string()
            }
            PaymentError::UnsupportedProvider { provider } => {
                format!("Payment provider {} is not supported", provider)
            }
            PaymentError::ProviderTimeout { .. } => {
                "The payment provider did not respond in time. The payment may still complete"
                    .to_string()
            }
            PaymentError::ProviderRejected { message, .. } => message.clone(),
            PaymentError::SignatureInvalid { .. } => "Invalid callback signature".to_string(),
            PaymentError::TransactionNotFound { .. } => "Transaction not found".to_string(),
            PaymentError::Network { .. } => {
                "Payment provider is temporarily unavailable".to_string()
            }
            PaymentError::Store { .. } => "Internal storage error".to_string(),
        }
    }
}
