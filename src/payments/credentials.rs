//! Per-provider merchant credentials.
//!
//! Gateways shard merchants into sub-accounts keyed by the payer's number
//! prefix, each with its own signing secret. Secrets rotate at runtime
//! through an external channel, so the resolver reads through to the
//! [`SecretsSource`] on every call and never caches across requests.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::types::ProviderName;
use async_trait::async_trait;
use std::sync::Arc;

/// AfrikPay operation sub-accounts by payer prefix.
///
/// This table is maintained by the treasury team from the gateway's
/// sub-account sheet, independently of the carrier tables in
/// `phone::classifier`, and covers a different prefix layout. Keep the two
/// tables separate; they are not two copies of the same data.
const AFRIKPAY_SUBACCOUNTS: &[(&str, &str)] = &[
    ("77", "AFP-OM-01"),
    ("78", "AFP-OM-02"),
    ("76", "AFP-MM-01"),
    ("70", "AFP-MM-02"),
    ("75", "AFP-MM-03"),
];

const AFRIKPAY_DEFAULT_SUBACCOUNT: &str = "AFP-MAIN";

/// MTN MoMo API users by payer prefix.
const MOMO_SUBACCOUNTS: &[(&str, &str)] = &[
    ("650", "MOMO-CM-01"),
    ("651", "MOMO-CM-01"),
    ("652", "MOMO-CM-02"),
    ("653", "MOMO-CM-02"),
    ("654", "MOMO-CM-02"),
    ("67", "MOMO-CM-03"),
];

const MOMO_DEFAULT_SUBACCOUNT: &str = "MOMO-CM-MAIN";

/// External secrets backend. Implementations must return the currently
/// active value on every call; rotation must take effect without restart.
#[async_trait]
pub trait SecretsSource: Send + Sync {
    async fn fetch(&self, key: &str) -> PaymentResult<String>;
}

/// Reads secrets from process environment variables, once per call, so a
/// rotation applied through the deployment layer is picked up immediately.
pub struct EnvSecretsSource;

#[async_trait]
impl SecretsSource for EnvSecretsSource {
    async fn fetch(&self, key: &str) -> PaymentResult<String> {
        std::env::var(key).map_err(|_| PaymentError::Validation {
            message: format!("secret {} is not configured", key),
            field: Some(key.to_string()),
        })
    }
}

#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Merchant/operation sub-account code for this payer.
    async fn merchant_account_code(
        &self,
        provider: ProviderName,
        national_number: &str,
    ) -> PaymentResult<String>;

    /// Currently active signing secret for the matched sub-account.
    async fn secret_key(
        &self,
        provider: ProviderName,
        national_number: &str,
    ) -> PaymentResult<String>;
}

pub struct PrefixCredentialResolver {
    secrets: Arc<dyn SecretsSource>,
}

impl PrefixCredentialResolver {
    pub fn new(secrets: Arc<dyn SecretsSource>) -> Self {
        Self { secrets }
    }

    fn subaccount_for(provider: ProviderName, national_number: &str) -> String {
        let number = national_number.trim_start_matches('0');
        let (table, fallback) = match provider {
            ProviderName::Afrikpay => (AFRIKPAY_SUBACCOUNTS, AFRIKPAY_DEFAULT_SUBACCOUNT),
            ProviderName::MtnMomo => (MOMO_SUBACCOUNTS, MOMO_DEFAULT_SUBACCOUNT),
        };
        table
            .iter()
            .find(|(prefix, _)| number.starts_with(prefix))
            .map(|(_, code)| (*code).to_string())
            .unwrap_or_else(|| fallback.to_string())
    }

    fn secret_name(provider: ProviderName, account_code: &str) -> String {
        let account: String = account_code
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}_SECRET_{}", provider.as_str().to_uppercase(), account)
    }
}

#[async_trait]
impl CredentialResolver for PrefixCredentialResolver {
    async fn merchant_account_code(
        &self,
        provider: ProviderName,
        national_number: &str,
    ) -> PaymentResult<String> {
        Ok(Self::subaccount_for(provider, national_number))
    }

    async fn secret_key(
        &self,
        provider: ProviderName,
        national_number: &str,
    ) -> PaymentResult<String> {
        let account = Self::subaccount_for(provider, national_number);
        self.secrets
            .fetch(&Self::secret_name(provider, &account))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapSecrets(HashMap<String, String>);

    #[async_trait]
    impl SecretsSource for MapSecrets {
        async fn fetch(&self, key: &str) -> PaymentResult<String> {
            self.0
                .get(key)
                .cloned()
                .ok_or_else(|| PaymentError::Validation {
                    message: format!("secret {} is not configured", key),
                    field: Some(key.to_string()),
                })
        }
    }

    fn resolver_with(entries: &[(&str, &str)]) -> PrefixCredentialResolver {
        let map = entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        PrefixCredentialResolver::new(Arc::new(MapSecrets(map)))
    }

    #[tokio::test]
    async fn prefix_match_selects_subaccount() {
        let resolver = resolver_with(&[]);
        let code = resolver
            .merchant_account_code(ProviderName::Afrikpay, "771234567")
            .await
            .expect("resolution should succeed");
        assert_eq!(code, "AFP-OM-01");
    }

    #[tokio::test]
    async fn leading_zeros_are_stripped_before_matching() {
        let resolver = resolver_with(&[]);
        let code = resolver
            .merchant_account_code(ProviderName::Afrikpay, "0771234567")
            .await
            .expect("resolution should succeed");
        assert_eq!(code, "AFP-OM-01");
    }

    #[tokio::test]
    async fn unmatched_prefix_falls_back_to_baseline() {
        let resolver = resolver_with(&[]);
        let code = resolver
            .merchant_account_code(ProviderName::Afrikpay, "650123456")
            .await
            .expect("resolution should succeed");
        assert_eq!(code, "AFP-MAIN");

        let code = resolver
            .merchant_account_code(ProviderName::MtnMomo, "699123456")
            .await
            .expect("resolution should succeed");
        assert_eq!(code, "MOMO-CM-MAIN");
    }

    #[tokio::test]
    async fn secret_is_fetched_for_matched_subaccount() {
        let resolver = resolver_with(&[("MTN_MOMO_SECRET_MOMO_CM_01", "k-momo-01")]);
        let secret = resolver
            .secret_key(ProviderName::MtnMomo, "650123456")
            .await
            .expect("secret should resolve");
        assert_eq!(secret, "k-momo-01");
    }

    #[tokio::test]
    async fn missing_secret_is_an_error() {
        let resolver = resolver_with(&[]);
        assert!(resolver
            .secret_key(ProviderName::Afrikpay, "650123456")
            .await
            .is_err());
    }
}
