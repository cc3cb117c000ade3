//! Credentials and the registry that resolves them.
//!
//! A credential binds one merchant + environment pair to a signing secret and
//! an origin allowlist. It is the trust root every other verification step
//! consults. Sandbox and production credentials are disjoint: they never
//! share a secret, and every downstream store key is prefixed with the
//! environment so they never share nonce, quote, or idempotency space either.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Deployment environment a credential belongs to.
///
/// Threaded explicitly through every store key; never inferred from ambient
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Integration environment; no real money moves.
    Sandbox,
    /// Live environment.
    Production,
}

impl Environment {
    /// Stable string used in store keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque signing secret.
///
/// Never logged: `Debug` is redacted, and the bytes are zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiSecret(Vec<u8>);

impl ApiSecret {
    /// Wrap raw secret bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Access the raw bytes for HMAC computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for ApiSecret {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl fmt::Debug for ApiSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiSecret(****)")
    }
}

/// A merchant API credential.
#[derive(Debug, Clone)]
pub struct Credential {
    /// API key, as presented in `x-zito-key`.
    pub id: String,
    /// Signing secret.
    pub secret: ApiSecret,
    /// Environment this credential is bound to.
    pub environment: Environment,
    /// Verified domains; exact host match allows an origin.
    pub verified_domains: Vec<String>,
    /// Allow-listed CIDR blocks (or bare IPs) for IP-based callers.
    pub allowed_origins: Vec<String>,
    /// Soft-disable flag. Credentials are never deleted, only disabled.
    pub enabled: bool,
}

impl Credential {
    /// Create an enabled credential with empty allowlists.
    pub fn new(id: impl Into<String>, secret: ApiSecret, environment: Environment) -> Self {
        Self {
            id: id.into(),
            secret,
            environment,
            verified_domains: Vec::new(),
            allowed_origins: Vec::new(),
            enabled: true,
        }
    }

    /// Add a verified domain.
    pub fn with_verified_domain(mut self, domain: impl Into<String>) -> Self {
        self.verified_domains.push(domain.into());
        self
    }

    /// Add an allow-listed CIDR block or bare IP.
    pub fn with_allowed_cidr(mut self, cidr: impl Into<String>) -> Self {
        self.allowed_origins.push(cidr.into());
        self
    }
}

/// Resolves API keys to credentials.
///
/// Implemented by the host application over its credential database; an
/// in-memory implementation is provided for tests and single-process
/// deployments.
pub trait CredentialRegistry: Send + Sync {
    /// Look up a credential by API key. `None` means the key is unknown.
    fn resolve(&self, api_key: &str) -> Option<Credential>;
}

/// Thread-safe in-memory registry.
#[derive(Default)]
pub struct InMemoryCredentialRegistry {
    credentials: RwLock<HashMap<String, Credential>>,
}

impl InMemoryCredentialRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a credential, keyed by its id.
    pub fn insert(&self, credential: Credential) {
        if let Ok(mut creds) = self.credentials.write() {
            creds.insert(credential.id.clone(), credential);
        }
    }

    /// Soft-disable a credential. Returns false if the key is unknown.
    pub fn disable(&self, api_key: &str) -> bool {
        match self.credentials.write() {
            Ok(mut creds) => match creds.get_mut(api_key) {
                Some(cred) => {
                    cred.enabled = false;
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Number of registered credentials.
    pub fn len(&self) -> usize {
        self.credentials.read().map(|c| c.len()).unwrap_or(0)
    }

    /// True when no credentials are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialRegistry for InMemoryCredentialRegistry {
    fn resolve(&self, api_key: &str) -> Option<Credential> {
        self.credentials
            .read()
            .ok()
            .and_then(|creds| creds.get(api_key).cloned())
    }
}
