//! Canonical request serialization for signing.
//!
//! Both signer and verifier must derive byte-identical input for the HMAC,
//! so the canonical layout is part of the wire contract:
//!
//! `METHOD ++ path ++ sortedQuery ++ body ++ timestamp ++ nonce ++ origin`
//!
//! Query parameters are sorted lexicographically by key (values keep their
//! relative order under a repeated key), and the body is the raw bytes that
//! were actually transmitted, never a re-serialization. Re-serializing would
//! break on key-order differences between JSON encoders.

use crate::errors::ProtocolError;

/// Protocol version this implementation speaks.
pub const PROTOCOL_VERSION: &str = "1.0";

/// Header carrying the API key.
pub const HEADER_KEY: &str = "x-zito-key";
/// Header carrying the request Unix timestamp in seconds.
pub const HEADER_TIMESTAMP: &str = "x-zito-timestamp";
/// Header carrying the single-use nonce (opaque, UUID recommended).
pub const HEADER_NONCE: &str = "x-zito-nonce";
/// Header carrying the declared call origin (domain or IP).
pub const HEADER_ORIGIN: &str = "x-zito-origin";
/// Header carrying the hex HMAC-SHA256 signature.
pub const HEADER_SIGNATURE: &str = "x-zito-signature";
/// Header carrying the protocol version.
pub const HEADER_VERSION: &str = "x-zito-version";

/// The six signing headers, extracted and parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningHeaders {
    /// API key identifying the credential.
    pub api_key: String,
    /// Request timestamp, Unix seconds.
    pub timestamp: i64,
    /// Single-use nonce.
    pub nonce: String,
    /// Declared call origin.
    pub origin: String,
    /// Hex-encoded HMAC-SHA256 signature.
    pub signature: String,
    /// Protocol version string.
    pub version: String,
}

impl SigningHeaders {
    /// Extract the signing headers from any header map via a lookup closure.
    ///
    /// Fails fast with `MissingHeader` before any cryptographic work; the
    /// first missing header is reported in canonical header order so error
    /// messages are deterministic. A present but non-integer timestamp is
    /// `MalformedTimestamp`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use zito_protocol::canonical::SigningHeaders;
    ///
    /// let mut headers = HashMap::new();
    /// headers.insert("x-zito-key", "zito_pk_123");
    /// headers.insert("x-zito-timestamp", "1768763180");
    /// headers.insert("x-zito-nonce", "8e6f7f3e-0001-4b1b-9d7a-1a2b3c4d5e6f");
    /// headers.insert("x-zito-origin", "shop.example");
    /// headers.insert("x-zito-signature", "deadbeef");
    /// headers.insert("x-zito-version", "1.0");
    ///
    /// let parsed = SigningHeaders::from_lookup(|name| {
    ///     headers.get(name).map(|v| v.to_string())
    /// }).unwrap();
    /// assert_eq!(parsed.timestamp, 1768763180);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProtocolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or(ProtocolError::MissingHeader { header: name })
        };

        let api_key = require(HEADER_KEY)?;
        let raw_timestamp = require(HEADER_TIMESTAMP)?;
        let nonce = require(HEADER_NONCE)?;
        let origin = require(HEADER_ORIGIN)?;
        let signature = require(HEADER_SIGNATURE)?;
        let version = require(HEADER_VERSION)?;

        let timestamp =
            raw_timestamp
                .parse::<i64>()
                .map_err(|_| ProtocolError::MalformedTimestamp {
                    value: raw_timestamp,
                })?;

        Ok(Self {
            api_key,
            timestamp,
            nonce,
            origin,
            signature,
            version,
        })
    }
}

/// The request fields that participate in the canonical string.
///
/// `body` is the raw request body text exactly as transmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    /// HTTP method (case-insensitive on input, uppercased when serialized).
    pub method: String,
    /// Request path, e.g. `/api/v1/wallets/quote`.
    pub path: String,
    /// Query parameters as transmitted. Order within a repeated key is kept.
    pub query: Vec<(String, String)>,
    /// Raw body text as transmitted.
    pub body: String,
}

impl CanonicalRequest {
    /// Convenience constructor.
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        query: Vec<(String, String)>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            query,
            body: body.into(),
        }
    }

    /// Serialize the query as `k=v` pairs joined by `&`, sorted
    /// lexicographically by key. The sort is stable: repeated keys keep the
    /// relative order of their values.
    fn sorted_query(&self) -> String {
        let mut pairs: Vec<&(String, String)> = self.query.iter().collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Build the canonical string for signing or verification.
///
/// Pure function; the concatenation order is fixed by the wire contract and
/// must never vary between signer and verifier.
pub fn canonical_string(
    request: &CanonicalRequest,
    timestamp: i64,
    nonce: &str,
    origin: &str,
) -> String {
    format!(
        "{}{}{}{}{}{}{}",
        request.method.to_uppercase(),
        request.path,
        request.sorted_query(),
        request.body,
        timestamp,
        nonce,
        origin
    )
}
