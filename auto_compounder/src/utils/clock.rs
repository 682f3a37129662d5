//! Time source for the scheduler

#[cfg(test)]
use mockall::automock;

use ic_exports::ic_cdk::api::time;

/// Anything that can tell the current time in seconds
#[cfg_attr(test, automock)]
pub trait Clock {
    /// Current time in seconds
    fn now(&self) -> u64;
}

/// Clock backed by the replica's time
#[derive(Clone, Copy, Default)]
pub struct IcClock;

impl Clock for IcClock {
    fn now(&self) -> u64 {
        time() / 1_000_000_000 // nanoseconds to seconds
    }
}
