//! Request timestamp freshness.
//!
//! The window is a deliberate security/availability trade-off: wide enough to
//! tolerate client clock drift and network latency, narrow enough to bound
//! the replay window jointly with the nonce TTL.

use crate::errors::ProtocolError;

/// Default accepted clock skew, in seconds.
pub const DEFAULT_SKEW_SECS: i64 = 300;

/// Validates request timestamps against the accepted skew window.
#[derive(Debug, Clone, Copy)]
pub struct TimestampValidator {
    skew_secs: i64,
}

impl Default for TimestampValidator {
    fn default() -> Self {
        Self {
            skew_secs: DEFAULT_SKEW_SECS,
        }
    }
}

impl TimestampValidator {
    /// Build a validator with a custom skew window.
    pub fn new(skew_secs: i64) -> Self {
        Self { skew_secs }
    }

    /// Accepts iff `|now - request_timestamp| <= skew`. Future-dated and
    /// stale requests are rejected symmetrically; both boundaries are
    /// inclusive.
    pub fn is_fresh(&self, request_timestamp: i64, now: i64) -> bool {
        (now - request_timestamp).abs() <= self.skew_secs
    }

    /// `is_fresh` as a protocol error.
    pub fn validate(&self, request_timestamp: i64, now: i64) -> Result<(), ProtocolError> {
        if self.is_fresh(request_timestamp, now) {
            Ok(())
        } else {
            Err(ProtocolError::StaleTimestamp {
                skew_secs: self.skew_secs,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_768_763_180;

    #[test]
    fn boundary_is_inclusive_on_both_sides() {
        let validator = TimestampValidator::default();
        assert!(validator.is_fresh(NOW - 300, NOW));
        assert!(!validator.is_fresh(NOW - 301, NOW));
        assert!(validator.is_fresh(NOW + 300, NOW));
        assert!(!validator.is_fresh(NOW + 301, NOW));
    }

    #[test]
    fn exact_now_is_fresh() {
        assert!(TimestampValidator::default().is_fresh(NOW, NOW));
    }

    #[test]
    fn validate_maps_to_stale_timestamp() {
        let validator = TimestampValidator::new(60);
        assert_eq!(
            validator.validate(NOW - 61, NOW),
            Err(ProtocolError::StaleTimestamp { skew_secs: 60 })
        );
        assert!(validator.validate(NOW - 60, NOW).is_ok());
    }
}
