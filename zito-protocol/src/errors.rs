//! Error types for request verification.
//!
//! Every rejection the protocol can produce is a terminal, client-correctable
//! error with a stable machine-readable code and an HTTP status. None of them
//! are retried server-side; a client retry must carry a fresh nonce (and, for
//! execute calls, the *same* idempotency key).

use thiserror::Error;

/// Rejection produced while verifying an inbound API call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A required signing header was absent.
    #[error("missing required header: {header}")]
    MissingHeader {
        /// Name of the first missing header, in canonical header order.
        header: &'static str,
    },

    /// The timestamp header was present but not a valid Unix-seconds integer.
    #[error("malformed timestamp: {value}")]
    MalformedTimestamp {
        /// The raw header value as received.
        value: String,
    },

    /// Signature verification failed.
    ///
    /// Deliberately covers both a wrong signature and malformed hex encoding;
    /// callers must not be able to tell the two apart.
    #[error("invalid request signature")]
    InvalidSignature,

    /// No credential is registered for the presented API key.
    #[error("unknown API key")]
    UnknownCredential,

    /// The credential exists but has been soft-disabled.
    #[error("credential is disabled")]
    CredentialDisabled,

    /// The request timestamp is outside the accepted clock-skew window.
    #[error("request timestamp outside the allowed +/-{skew_secs}s window")]
    StaleTimestamp {
        /// The skew window that was enforced, in seconds.
        skew_secs: i64,
    },

    /// The nonce was already consumed within its replay window.
    #[error("nonce has already been used")]
    NonceReplayed,

    /// The declared origin matched neither a verified domain nor an
    /// allow-listed CIDR block.
    #[error("origin not allow-listed: {origin}")]
    OriginNotAllowed {
        /// The declared origin, post-normalization.
        origin: String,
    },

    /// The `x-zito-version` header named a protocol version we do not speak.
    #[error("unsupported protocol version: {version}")]
    UnsupportedVersion {
        /// The version string as received.
        version: String,
    },

    /// The credential exceeded its request budget for the current window.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the current window resets.
        retry_after_secs: u64,
    },
}

impl ProtocolError {
    /// Stable machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingHeader { .. } => "missing_header",
            Self::MalformedTimestamp { .. } => "malformed_timestamp",
            Self::InvalidSignature => "invalid_signature",
            Self::UnknownCredential => "unknown_credential",
            Self::CredentialDisabled => "credential_disabled",
            Self::StaleTimestamp { .. } => "stale_timestamp",
            Self::NonceReplayed => "nonce_replayed",
            Self::OriginNotAllowed { .. } => "origin_not_allowed",
            Self::UnsupportedVersion { .. } => "unsupported_version",
            Self::RateLimited { .. } => "rate_limited",
        }
    }

    /// HTTP status the gateway surfaces for this rejection.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::MissingHeader { .. }
            | Self::MalformedTimestamp { .. }
            | Self::UnsupportedVersion { .. } => 400,
            Self::InvalidSignature
            | Self::UnknownCredential
            | Self::CredentialDisabled
            | Self::StaleTimestamp { .. }
            | Self::NonceReplayed => 401,
            Self::OriginNotAllowed { .. } => 403,
            Self::RateLimited { .. } => 429,
        }
    }

    /// Suggested retry delay in seconds, if applicable.
    ///
    /// Only `RateLimited` carries one; every other rejection requires the
    /// client to fix the request, not wait.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_statuses_are_stable() {
        let err = ProtocolError::MissingHeader {
            header: "x-zito-nonce",
        };
        assert_eq!(err.code(), "missing_header");
        assert_eq!(err.http_status(), 400);

        assert_eq!(ProtocolError::InvalidSignature.http_status(), 401);
        assert_eq!(ProtocolError::NonceReplayed.code(), "nonce_replayed");
        assert_eq!(
            ProtocolError::OriginNotAllowed {
                origin: "evil.example".into()
            }
            .http_status(),
            403
        );
    }

    #[test]
    fn only_rate_limited_carries_retry_after() {
        let limited = ProtocolError::RateLimited {
            retry_after_secs: 42,
        };
        assert_eq!(limited.http_status(), 429);
        assert_eq!(limited.retry_after_secs(), Some(42));
        assert_eq!(ProtocolError::NonceReplayed.retry_after_secs(), None);
    }

    #[test]
    fn display_never_distinguishes_signature_failures() {
        // Bad hex and wrong mac share one variant, so one message.
        assert_eq!(
            ProtocolError::InvalidSignature.to_string(),
            "invalid request signature"
        );
    }
}
