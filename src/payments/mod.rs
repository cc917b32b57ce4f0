pub mod credentials;
pub mod error;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod types;
pub mod utils;

pub use error::{PaymentError, PaymentResult};
pub use provider::PaymentProvider;
pub use registry::{ProviderRegistry, RegistryConfig};
pub use types::{
    BalanceResponse, CallbackEvent, CustomerContact, FeeOwner, KycRequest, KycResponse, Money,
    PaymentMethod, PaymentRequest, PaymentResponse, ProviderName, StatusRequest, StatusResponse,
    TransactionStatus, TransactionType, WebhookVerificationResult,
};
