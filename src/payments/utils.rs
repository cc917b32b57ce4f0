use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// Callback timestamps older than this are rejected as stale.
pub const MAX_CALLBACK_AGE_SECS: i64 = 300;

/// Authentication scheme for a single gateway request.
pub enum RequestAuth<'a> {
    None,
    Bearer(&'a str),
    Basic(&'a str, &'a str),
    /// Shared secret in a gateway-specific header.
    Header(&'a str, &'a str),
}

/// Thin reqwest wrapper shared by the gateway adapters.
///
/// Every call carries a bounded timeout; an elapsed timeout maps to
/// `ProviderTimeout` so the orchestrator can keep the transaction pending
/// instead of failing it (the gateway may have accepted the request).
#[derive(Clone)]
pub struct GatewayHttpClient {
    client: Client,
    timeout: Duration,
    provider: &'static str,
}

impl GatewayHttpClient {
    pub fn new(provider: &'static str, timeout: Duration) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Network {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            timeout,
            provider,
        })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: RequestAuth<'_>,
        body: Option<&JsonValue>,
        additional_headers: &[(&str, &str)],
    ) -> PaymentResult<T> {
        let mut request = self.client.request(method, url).timeout(self.timeout);

        match auth {
            RequestAuth::None => {}
            RequestAuth::Bearer(token) => request = request.bearer_auth(token),
            RequestAuth::Basic(user, pass) => request = request.basic_auth(user, Some(pass)),
            RequestAuth::Header(name, value) => request = request.header(name, value),
        }
        for (k, v) in additional_headers {
            request = request.header(*k, *v);
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PaymentError::ProviderTimeout {
                    provider: self.provider.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                PaymentError::Network {
                    message: format!("{} request failed: {}", self.provider, e),
                }
            }
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            return serde_json::from_str::<T>(&text).map_err(|e| PaymentError::Network {
                message: format!("invalid {} JSON response: {}", self.provider, e),
            });
        }

        if status.is_client_error() {
            warn!(provider = %self.provider, status = %status, "gateway declined request");
            return Err(PaymentError::ProviderRejected {
                provider: self.provider.to_string(),
                code: Some(status.as_u16().to_string()),
                message: format!("HTTP {}: {}", status, truncate(&text, 200)),
            });
        }

        // 5xx: transient on the gateway side, not an explicit decline.
        Err(PaymentError::Network {
            message: format!("{} HTTP {}: {}", self.provider, status, truncate(&text, 200)),
        })
    }
}

impl GatewayHttpClient {
    /// Variant for endpoints that acknowledge with an empty body
    /// (e.g. `202 Accepted`).
    pub async fn request_expect_empty(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: RequestAuth<'_>,
        body: Option<&JsonValue>,
        additional_headers: &[(&str, &str)],
    ) -> PaymentResult<()> {
        let mut request = self.client.request(method, url).timeout(self.timeout);

        match auth {
            RequestAuth::None => {}
            RequestAuth::Bearer(token) => request = request.bearer_auth(token),
            RequestAuth::Basic(user, pass) => request = request.basic_auth(user, Some(pass)),
            RequestAuth::Header(name, value) => request = request.header(name, value),
        }
        for (k, v) in additional_headers {
            request = request.header(*k, *v);
        }
        if let Some(payload) = body {
            request = request.json(payload);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PaymentError::ProviderTimeout {
                    provider: self.provider.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                PaymentError::Network {
                    message: format!("{} request failed: {}", self.provider, e),
                }
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            warn!(provider = %self.provider, status = %status, "gateway declined request");
            return Err(PaymentError::ProviderRejected {
                provider: self.provider.to_string(),
                code: Some(status.as_u16().to_string()),
                message: format!("HTTP {}: {}", status, truncate(&text, 200)),
            });
        }
        Err(PaymentError::Network {
            message: format!("{} HTTP {}: {}", self.provider, status, truncate(&text, 200)),
        })
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Generate an externally visible payment reference. Gateways cap the
/// reference field at 15 characters.
pub fn generate_reference() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("MP{}", &hex[..13].to_uppercase())
}

/// Verify an HMAC-SHA256 hex signature computed over `payload + "." + timestamp`.
pub fn verify_hmac_sha256_hex(payload: &[u8], timestamp: &str, secret: &str, signature: &str) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(v) => v,
        Err(_) => return false,
    };
    mac.update(payload);
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    let computed = hex::encode(mac.finalize().into_bytes());
    secure_eq(computed.as_bytes(), signature.trim().as_bytes())
}

/// Sign a payload the way [`verify_hmac_sha256_hex`] expects. Used by tests
/// and by gateway simulators.
pub fn sign_hmac_sha256_hex(payload: &[u8], timestamp: &str, secret: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(payload);
    mac.update(b".");
    mac.update(timestamp.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Check a unix-seconds callback timestamp against the freshness window.
pub fn timestamp_is_fresh(timestamp: &str, now_unix: i64) -> bool {
    match timestamp.trim().parse::<i64>() {
        Ok(ts) => (now_unix - ts).abs() <= MAX_CALLBACK_AGE_SECS,
        Err(_) => false,
    }
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_references_fit_gateway_limit() {
        for _ in 0..50 {
            let reference = generate_reference();
            assert!(reference.len() <= 15, "reference too long: {}", reference);
            assert!(reference.starts_with("MP"));
        }
    }

    #[test]
    fn generated_references_are_distinct() {
        let a = generate_reference();
        let b = generate_reference();
        assert_ne!(a, b);
    }

    #[test]
    fn hmac_round_trip_verifies() {
        let payload = br#"{"status":"SUCCESS"}"#;
        let signature = sign_hmac_sha256_hex(payload, "1700000000", "s3cret");
        assert!(verify_hmac_sha256_hex(payload, "1700000000", "s3cret", &signature));
        assert!(!verify_hmac_sha256_hex(payload, "1700000001", "s3cret", &signature));
        assert!(!verify_hmac_sha256_hex(payload, "1700000000", "other", &signature));
        assert!(!verify_hmac_sha256_hex(payload, "1700000000", "s3cret", "deadbeef"));
    }

    #[test]
    fn timestamp_freshness_window() {
        assert!(timestamp_is_fresh("1700000000", 1_700_000_000));
        assert!(timestamp_is_fresh("1700000000", 1_700_000_000 + MAX_CALLBACK_AGE_SECS));
        assert!(!timestamp_is_fresh("1700000000", 1_700_000_000 + MAX_CALLBACK_AGE_SECS + 1));
        assert!(!timestamp_is_fresh("yesterday", 1_700_000_000));
    }

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }
}
