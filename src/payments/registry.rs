//! Immutable provider registry and routing policy.
//!
//! Adapters are injected once at construction; there is no mutable global
//! map and no way to register a provider after startup.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentProvider;
use crate::payments::types::{PaymentRequest, ProviderName};
use crate::phone::{self, Carrier};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub default_provider: ProviderName,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_provider: ProviderName::Afrikpay,
        }
    }
}

impl RegistryConfig {
    pub fn from_env() -> Self {
        Self {
            default_provider: std::env::var("DEFAULT_PAYMENT_PROVIDER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(ProviderName::Afrikpay),
        }
    }
}

pub struct ProviderRegistry {
    providers: HashMap<ProviderName, Arc<dyn PaymentProvider>>,
    default_provider: ProviderName,
}

impl ProviderRegistry {
    pub fn new(config: RegistryConfig, adapters: Vec<Arc<dyn PaymentProvider>>) -> Self {
        let providers = adapters.into_iter().map(|a| (a.name(), a)).collect();
        Self {
            providers,
            default_provider: config.default_provider,
        }
    }

    pub fn get(&self, provider: ProviderName) -> PaymentResult<Arc<dyn PaymentProvider>> {
        self.providers
            .get(&provider)
            .cloned()
            .ok_or(PaymentError::UnsupportedProvider {
                provider: provider.to_string(),
            })
    }

    pub fn default_provider(&self) -> ProviderName {
        self.default_provider
    }

    pub fn available(&self) -> Vec<ProviderName> {
        self.providers.keys().copied().collect()
    }

    /// Each domestic carrier has a dedicated gateway.
    fn provider_for_carrier(carrier: Carrier) -> ProviderName {
        match carrier {
            Carrier::Mtn => ProviderName::MtnMomo,
            Carrier::Orange => ProviderName::Afrikpay,
        }
    }

    /// Routing policy, in priority order:
    ///
    /// 1. a payer number that classifies to a domestic carrier routes to
    ///    that carrier's gateway, overriding any explicit request override
    ///    (the carrier determines which gateway can actually bill the
    ///    wallet);
    /// 2. an explicit `request.provider`;
    /// 3. the configured default.
    ///
    /// The ordering is load-bearing: reversing 1 and 2 changes which
    /// gateway is billed.
    pub fn select(&self, request: &PaymentRequest) -> PaymentResult<ProviderName> {
        if let Some(phone) = request.customer.phone.as_deref() {
            if let Some(detection) = phone::classify(phone) {
                let provider = Self::provider_for_carrier(detection.carrier);
                debug!(carrier = %detection.carrier, provider = %provider, "carrier-routed provider");
                if self.providers.contains_key(&provider) {
                    return Ok(provider);
                }
                return Err(PaymentError::NoProviderAvailable);
            }
        }

        if let Some(explicit) = request.provider {
            return if self.providers.contains_key(&explicit) {
                Ok(explicit)
            } else {
                Err(PaymentError::UnsupportedProvider {
                    provider: explicit.to_string(),
                })
            };
        }

        if self.providers.contains_key(&self.default_provider) {
            Ok(self.default_provider)
        } else {
            Err(PaymentError::NoProviderAvailable)
        }
    }
}
