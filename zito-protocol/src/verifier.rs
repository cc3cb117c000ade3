//! The inbound verification pipeline.
//!
//! Ties registry, clock, timestamp window, and rate limiter together and runs
//! the checks in a fixed order:
//!
//! 1. signing headers present and well-formed
//! 2. protocol version supported
//! 3. credential resolved and enabled
//! 4. rate limit
//! 5. signature (before freshness, so clock skew cannot be probed with
//!    unsigned requests)
//! 6. timestamp freshness
//! 7. origin allow-listed
//!
//! Nonce consumption is deliberately *not* part of this pipeline: it is the
//! one stateful step and lives in the ledger crate. Callers take the returned
//! credential and headers and consume the nonce next, before touching any
//! business logic.

use std::sync::Arc;

use crate::allowlist::origin_allowed;
use crate::canonical::{canonical_string, CanonicalRequest, SigningHeaders, PROTOCOL_VERSION};
use crate::clock::ClockSource;
use crate::credential::{Credential, CredentialRegistry};
use crate::errors::ProtocolError;
use crate::rate_limit::{RateLimitConfig, RequestRateLimiter};
use crate::signature;
use crate::timestamp::TimestampValidator;

/// A request that passed every stateless check.
#[derive(Debug, Clone)]
pub struct VerifiedRequest {
    /// The resolved credential. Its environment scopes all downstream state.
    pub credential: Credential,
    /// The parsed signing headers; the nonce in here must still be consumed.
    pub headers: SigningHeaders,
}

/// Stateless request verifier.
pub struct RequestVerifier<R: CredentialRegistry> {
    registry: R,
    clock: Arc<dyn ClockSource>,
    timestamps: TimestampValidator,
    rate_limiter: Arc<RequestRateLimiter>,
}

impl<R: CredentialRegistry> RequestVerifier<R> {
    /// Build a verifier with the default skew window and rate limits.
    pub fn new(registry: R, clock: Arc<dyn ClockSource>) -> Self {
        Self {
            registry,
            clock,
            timestamps: TimestampValidator::default(),
            rate_limiter: RequestRateLimiter::new_shared(RateLimitConfig::default()),
        }
    }

    /// Override the timestamp skew window.
    pub fn with_timestamp_validator(mut self, validator: TimestampValidator) -> Self {
        self.timestamps = validator;
        self
    }

    /// Override the rate limiter.
    pub fn with_rate_limiter(mut self, limiter: Arc<RequestRateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    /// Run the full stateless pipeline over one request.
    ///
    /// `lookup_header` resolves a header name to its value from whatever
    /// header map the host framework provides.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(skip_all, fields(method = %request.method, path = %request.path))
    )]
    pub fn verify<F>(
        &self,
        request: &CanonicalRequest,
        lookup_header: F,
    ) -> Result<VerifiedRequest, ProtocolError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let headers = SigningHeaders::from_lookup(lookup_header)?;

        if headers.version != PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                version: headers.version,
            });
        }

        let credential = self
            .registry
            .resolve(&headers.api_key)
            .ok_or(ProtocolError::UnknownCredential)?;
        if !credential.enabled {
            return Err(ProtocolError::CredentialDisabled);
        }

        self.rate_limiter
            .check_and_record(credential.environment, &credential.id)?;

        let canonical = canonical_string(
            request,
            headers.timestamp,
            &headers.nonce,
            &headers.origin,
        );
        signature::verify(credential.secret.as_bytes(), &canonical, &headers.signature)?;

        self.timestamps
            .validate(headers.timestamp, self.clock.now_unix())?;

        if !origin_allowed(&credential, &headers.origin) {
            return Err(ProtocolError::OriginNotAllowed {
                origin: headers.origin,
            });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            credential = %credential.id,
            environment = %credential.environment,
            "request verified"
        );

        Ok(VerifiedRequest {
            credential,
            headers,
        })
    }
}
