//! Webhook endpoint registration and secret provisioning.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A merchant-registered delivery target with its own signing secret.
///
/// Secrets are per-endpoint, never shared with API credentials, so rotating
/// one surface does not invalidate the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub id: String,
    pub merchant_id: String,
    pub url: String,
    /// Signing secret in the `whsec_<hex>` form shown to the merchant once
    /// at creation time.
    pub secret: String,
    pub active: bool,
}

impl WebhookEndpoint {
    /// Register a new endpoint with a freshly generated secret.
    pub fn new(merchant_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            merchant_id: merchant_id.into(),
            url: url.into(),
            secret: generate_secret(),
            active: true,
        }
    }

    /// Disable deliveries without deleting the registration.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Replace the signing secret. The old secret stops verifying
    /// immediately; callers stage the rollover on the merchant side first.
    pub fn rotate_secret(&mut self) -> &str {
        self.secret = generate_secret();
        &self.secret
    }
}

/// Generate a `whsec_`-prefixed secret from 32 bytes of OS randomness.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("whsec_{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_are_prefixed_and_unique() {
        let a = generate_secret();
        let b = generate_secret();
        assert!(a.starts_with("whsec_"));
        assert_eq!(a.len(), "whsec_".len() + 64);
        assert_ne!(a, b);
    }

    #[test]
    fn rotation_invalidates_the_old_secret() {
        let mut endpoint = WebhookEndpoint::new("merchant-1", "https://shop.example/hooks");
        let old = endpoint.secret.clone();
        endpoint.rotate_secret();
        assert_ne!(endpoint.secret, old);
        assert!(endpoint.secret.starts_with("whsec_"));
    }

    #[test]
    fn new_endpoints_start_active() {
        let mut endpoint = WebhookEndpoint::new("merchant-1", "https://shop.example/hooks");
        assert!(endpoint.active);
        endpoint.deactivate();
        assert!(!endpoint.active);
    }
}
