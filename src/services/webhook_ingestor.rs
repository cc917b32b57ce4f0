//! Inbound gateway callback handling.
//!
//! Every callback is authenticated before anything else happens: the
//! adapter recomputes the HMAC signature against the currently active
//! secret and checks the timestamp freshness window. A callback that fails
//! verification is rejected with no state change and no payload parsing.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::registry::ProviderRegistry;
use crate::payments::types::ProviderName;
use crate::services::orchestrator::PaymentOrchestrator;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

pub struct WebhookIngestor {
    registry: Arc<ProviderRegistry>,
    orchestrator: Arc<PaymentOrchestrator>,
}

impl WebhookIngestor {
    pub fn new(registry: Arc<ProviderRegistry>, orchestrator: Arc<PaymentOrchestrator>) -> Self {
        Self {
            registry,
            orchestrator,
        }
    }

    /// Authenticate, parse and apply one gateway callback.
    ///
    /// `SignatureInvalid` means the caller should answer 401 and the
    /// gateway may retry with a correct signature. A verified callback that
    /// matches no transaction is acknowledged anyway; redelivery would not
    /// help.
    pub async fn ingest(
        &self,
        provider_name: &str,
        payload: &[u8],
        signature: Option<&str>,
        timestamp: Option<&str>,
    ) -> PaymentResult<()> {
        let provider = ProviderName::from_str(provider_name)?;
        let adapter = self.registry.get(provider)?;

        let signature = signature.ok_or_else(|| PaymentError::SignatureInvalid {
            message: "missing signature header".to_string(),
        })?;
        let timestamp = timestamp.ok_or_else(|| PaymentError::SignatureInvalid {
            message: "missing timestamp header".to_string(),
        })?;

        let verification = adapter.verify_webhook(payload, signature, timestamp).await?;
        if !verification.valid {
            warn!(
                provider = %provider,
                reason = verification.reason.as_deref().unwrap_or("signature mismatch"),
                "rejected webhook"
            );
            return Err(PaymentError::SignatureInvalid {
                message: verification
                    .reason
                    .unwrap_or_else(|| "signature mismatch".to_string()),
            });
        }

        let event = adapter.parse_webhook_event(payload)?;
        info!(provider = %provider, "webhook verified");
        self.orchestrator.apply_callback(event).await
    }
}
