// retry.rs — Bounded exponential backoff for audit writes.

use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};

/// How many times to attempt an operation and how long to wait between tries.
///
/// The delay before retry `n` (0-based) is `base_delay_ms * 2^n`, capped at
/// `max_delay_ms`. Jitter is off so the schedule is reproducible in logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 25,
            max_delay_ms: 400,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once and never sleeps.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// The backoff schedule for one run. Attempts are bounded by [`run`],
    /// not by elapsed time.
    ///
    /// [`run`]: RetryPolicy::run
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.base_delay_ms))
            .with_max_interval(Duration::from_millis(self.max_delay_ms))
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Run `op` until it succeeds or the attempts run out.
    ///
    /// Returns the last error when every attempt fails.
    pub fn run<T, E, F>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        // The final failure is returned as permanent so backoff stops
        // without sleeping again.
        let operation = || {
            attempt += 1;
            op().map_err(|e| {
                if attempt >= attempts {
                    backoff::Error::permanent(e)
                } else {
                    backoff::Error::transient(e)
                }
            })
        };
        let notify = |e: E, delay: Duration| {
            tracing::warn!(
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %e,
                "{} failed, retrying",
                what
            );
        };

        backoff::retry_notify(self.backoff(), operation, notify).map_err(|e| match e {
            backoff::Error::Permanent(e) => e,
            backoff::Error::Transient { err, .. } => err,
        })
    }
}
