//! Auto Compounder's Constants

use alloy_primitives::{I256, U256};

/// Scale used for fixed point arithmetic
pub const SCALE: u128 = 1_000_000_000_000_000_000; // e18
pub fn scale() -> U256 {
    U256::from(SCALE)
}
pub fn signed_scale() -> I256 {
    I256::from_raw(scale())
}

/// Granularity of a reported effective rate: two decimal places
const RATE_PRECISION_RAW: u128 = SCALE / 100; // 10^16 => 0.01
pub fn rate_precision() -> U256 {
    U256::from(RATE_PRECISION_RAW)
}

/// Fee charged per compounding operation, in base units.
/// 0.001 of a token with 6 decimals.
pub const DEFAULT_FEE_PER_OPERATION: u64 = 1_000;
pub fn default_fee_per_operation() -> U256 {
    U256::from(DEFAULT_FEE_PER_OPERATION)
}

/// Length of a compounding year in seconds (365 days)
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Max number of attempts for a single port submission
pub const MAX_RETRY_ATTEMPTS: u8 = 5;

/// First backoff delay in seconds, doubled on every further attempt
pub const BASE_BACKOFF_SECS: u64 = 2;

/// Ceiling for the backoff delay in seconds
pub const MAX_BACKOFF_SECS: u64 = 300;

/// Default timeout for a transaction port call in seconds
pub const DEFAULT_PORT_TIMEOUT_SECS: u64 = 60;

/// A lock older than this (in seconds) is considered abandoned
pub const PLAN_LOCK_TIMEOUT: u64 = 3_600;

/// Delay before a tick that lost the lock race is retried, in seconds
pub const LOCK_CONTENTION_DELAY_SECS: u64 = 30;

/// Journal entries kept by the daily cleanup
pub const JOURNAL_LIMIT: usize = 300;

/// Interval of the journal cleanup timer in seconds
pub const CLEANUP_INTERVAL_SECS: u64 = 86_400;

/// Largest page of cycle records a single query returns
pub const MAX_RECORDS_PAGE: u64 = 200;
