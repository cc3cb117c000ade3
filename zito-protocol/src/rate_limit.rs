//! Per-credential request rate limiting.
//!
//! Fixed-window limiter keyed by `(environment, credential id)`, with an
//! optional global cap across all credentials. Rejections carry the seconds
//! until the current window resets, which the gateway surfaces as the 429
//! `retry_after` field.
//!
//! # Thread Safety
//!
//! Uses `Mutex` for thread-safe access. Lock poisoning is handled by failing
//! open (allowing requests) rather than panicking, to avoid blocking
//! legitimate traffic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::credential::Environment;
use crate::errors::ProtocolError;

/// Configuration for request rate limiting.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Maximum requests per credential within the time window.
    pub max_requests_per_credential: u32,
    /// Time window for rate limiting.
    pub window: Duration,
    /// Maximum tracked credentials to prevent memory exhaustion.
    pub max_tracked_credentials: usize,
    /// Optional global limit across all credentials within the window.
    pub global_max_requests: Option<u32>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests_per_credential: 600,
            window: Duration::from_secs(60),
            max_tracked_credentials: 10_000,
            global_max_requests: None,
        }
    }
}

impl RateLimitConfig {
    /// Create a config with custom values.
    pub fn new(max_requests: u32, window_secs: u64, max_tracked: usize) -> Self {
        Self {
            max_requests_per_credential: max_requests,
            window: Duration::from_secs(window_secs),
            max_tracked_credentials: max_tracked,
            global_max_requests: None,
        }
    }

    /// Add a global cap across all credentials.
    pub fn with_global_limit(mut self, global_max: u32) -> Self {
        self.global_max_requests = Some(global_max);
        self
    }

    /// Strict limits for abuse-prone deployments.
    pub fn strict() -> Self {
        Self {
            max_requests_per_credential: 60,
            window: Duration::from_secs(60),
            max_tracked_credentials: 10_000,
            global_max_requests: Some(5_000),
        }
    }

    /// Effectively unlimited (sandbox bring-up, tests).
    pub fn disabled() -> Self {
        Self {
            max_requests_per_credential: u32::MAX,
            window: Duration::from_secs(1),
            max_tracked_credentials: 1,
            global_max_requests: None,
        }
    }
}

#[derive(Debug)]
struct WindowRecord {
    count: u32,
    window_start: Instant,
}

type CredentialKey = (Environment, String);

/// Thread-safe fixed-window rate limiter for API credentials.
#[derive(Debug)]
pub struct RequestRateLimiter {
    config: RateLimitConfig,
    records: Mutex<HashMap<CredentialKey, WindowRecord>>,
    global: Mutex<WindowRecord>,
}

impl RequestRateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            records: Mutex::new(HashMap::new()),
            global: Mutex::new(WindowRecord {
                count: 0,
                window_start: Instant::now(),
            }),
        }
    }

    /// Create a limiter wrapped in an `Arc` for sharing across tasks.
    pub fn new_shared(config: RateLimitConfig) -> Arc<Self> {
        Arc::new(Self::new(config))
    }

    /// Record a request and return `RateLimited` if the credential (or the
    /// global cap) has exhausted its window budget.
    ///
    /// Fails open on lock poisoning.
    pub fn check_and_record(
        &self,
        environment: Environment,
        credential_id: &str,
    ) -> Result<(), ProtocolError> {
        let now = Instant::now();

        if let Some(global_max) = self.config.global_max_requests {
            self.check_global(global_max, now)?;
        }

        let mut records = match self.records.lock() {
            Ok(records) => records,
            Err(_) => return Ok(()), // Fail open on lock poisoning
        };

        if records.len() >= self.config.max_tracked_credentials {
            let window = self.config.window;
            records.retain(|_, record| now.duration_since(record.window_start) <= window);
        }

        let key = (environment, credential_id.to_string());
        match records.get_mut(&key) {
            Some(record) => {
                if now.duration_since(record.window_start) > self.config.window {
                    record.count = 1;
                    record.window_start = now;
                    Ok(())
                } else if record.count >= self.config.max_requests_per_credential {
                    Err(ProtocolError::RateLimited {
                        retry_after_secs: Self::retry_after(record, self.config.window, now),
                    })
                } else {
                    record.count += 1;
                    Ok(())
                }
            }
            None => {
                records.insert(
                    key,
                    WindowRecord {
                        count: 1,
                        window_start: now,
                    },
                );
                Ok(())
            }
        }
    }

    fn check_global(&self, max: u32, now: Instant) -> Result<(), ProtocolError> {
        let mut global = match self.global.lock() {
            Ok(global) => global,
            Err(_) => return Ok(()), // Fail open on lock poisoning
        };

        if now.duration_since(global.window_start) > self.config.window {
            global.count = 1;
            global.window_start = now;
            Ok(())
        } else if global.count >= max {
            Err(ProtocolError::RateLimited {
                retry_after_secs: Self::retry_after(&global, self.config.window, now),
            })
        } else {
            global.count += 1;
            Ok(())
        }
    }

    /// Seconds until the record's window resets, rounded up, never zero.
    fn retry_after(record: &WindowRecord, window: Duration, now: Instant) -> u64 {
        let elapsed = now.duration_since(record.window_start);
        let remaining = window.saturating_sub(elapsed);
        remaining.as_secs().max(1)
    }

    /// Remaining requests for a credential in the current window.
    ///
    /// Returns the full budget if the lock is poisoned.
    pub fn remaining(&self, environment: Environment, credential_id: &str) -> u32 {
        let records = match self.records.lock() {
            Ok(records) => records,
            Err(_) => return self.config.max_requests_per_credential,
        };
        let now = Instant::now();

        if let Some(record) = records.get(&(environment, credential_id.to_string())) {
            if now.duration_since(record.window_start) <= self.config.window {
                return self
                    .config
                    .max_requests_per_credential
                    .saturating_sub(record.count);
            }
        }
        self.config.max_requests_per_credential
    }

    /// Manually reset limits for a credential.
    pub fn reset(&self, environment: Environment, credential_id: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.remove(&(environment, credential_id.to_string()));
        }
    }

    /// Current number of tracked credentials.
    pub fn tracked_count(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }
}

impl Default for RequestRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
