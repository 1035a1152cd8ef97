// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Exponential backoff policy for work queue retries.
//!
//! Failed reconciliation passes are retried with exponentially growing delays
//! (with jitter to prevent thundering herd) until a bounded attempt budget is
//! exhausted, after which the item is dropped and the failure surfaced to
//! observability.

use rand::Rng;
use std::time::Duration;

/// Initial retry interval (100ms)
const INITIAL_INTERVAL_MILLIS: u64 = 100;

/// Maximum interval between retries (30 seconds)
const MAX_INTERVAL_SECS: u64 = 30;

/// Backoff multiplier (exponential growth factor)
const BACKOFF_MULTIPLIER: f64 = 2.0;

/// Randomization factor to prevent thundering herd (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Retry policy applied by the work queue to failing items.
///
/// The policy is stateless per item: the queue tracks the attempt count and
/// asks for the matching delay, so retries survive the item being re-enqueued
/// with fresher payloads in between.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// First retry delay
    pub initial_interval: Duration,
    /// Cap on the retry delay
    pub max_interval: Duration,
    /// Exponential growth factor (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g. 0.1 for ±10%)
    pub randomization_factor: f64,
    /// Attempts after which the item is dropped
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(INITIAL_INTERVAL_MILLIS),
            max_interval: Duration::from_secs(MAX_INTERVAL_SECS),
            multiplier: BACKOFF_MULTIPLIER,
            randomization_factor: RANDOMIZATION_FACTOR,
            max_attempts: crate::constants::MAX_SYNC_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Whether an item that has failed `attempt` times (1-based) may retry.
    #[must_use]
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the retry following the `attempt`-th failure (1-based).
    ///
    /// Grows exponentially from the initial interval, capped at the maximum,
    /// with jitter applied last.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let raw = self.initial_interval.as_secs_f64() * self.multiplier.powi(exponent as i32);
        let capped = raw.min(self.max_interval.as_secs_f64());
        self.apply_jitter(Duration::from_secs_f64(capped))
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;
        let min = secs - delta;
        let max = secs + delta;

        let mut rng = rand::thread_rng();
        let jittered = rng.gen_range(min..=max);

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod backoff_tests;
