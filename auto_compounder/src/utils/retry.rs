//! Bounded exponential backoff for transaction port submissions

use std::time::Duration;

use rand::Rng;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};
use serde::{Deserialize, Serialize};

use crate::constants::{BASE_BACKOFF_SECS, MAX_BACKOFF_SECS, MAX_RETRY_ATTEMPTS};

/// Retry budget and backoff curve of a single submission leg
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Attempts allowed before the leg is considered exhausted
    pub max_attempts: u8,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Ceiling of the exponential curve, jitter excluded
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRY_ATTEMPTS,
            base_delay: Duration::from_secs(BASE_BACKOFF_SECS),
            max_delay: Duration::from_secs(MAX_BACKOFF_SECS),
        }
    }
}

impl RetryPolicy {
    /// Returns `true` once `attempts` failed attempts used up the budget.
    pub fn is_exhausted(&self, attempts: u8) -> bool {
        attempts >= self.max_attempts
    }

    /// Delay to wait after the `attempt`-th failure (1-based).
    ///
    /// The curve is `min(base * 2^(attempt - 1), max)` with up to 25% jitter on top.
    /// The jitter is drawn from a ChaCha8 stream seeded with `seed`, so the same
    /// plan, cycle and attempt always back off by the same amount.
    pub fn backoff(&self, attempt: u8, seed: u64) -> Duration {
        let exponent = u32::from(attempt.saturating_sub(1)).min(31);
        let delay = self
            .base_delay
            .checked_mul(1_u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        let millis = delay.as_millis() as u64;
        if millis < 4 {
            return delay;
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed ^ u64::from(attempt));
        let jitter = rng.gen_range(0..=millis / 4);
        delay + Duration::from_millis(jitter)
    }
}
