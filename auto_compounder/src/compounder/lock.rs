//! Plan Execution Lock
//!
//! Timer ticks of one plan may overlap: an operator's termination request wakes the
//! plan while an earlier tick is still awaiting the market. The lock keeps a single
//! tick in flight per plan and recovers from ticks that never came back.
//!
//! ```plain
//! Lock State Machine:
//!
//!                   ┌──────────┐
//!              ┌────► Unlocked │◄─────┐
//!              │    └──────────┘      │
//!              │         │            │
//! Auto-Unlock  │     try_lock        unlock
//! (Timeout)    │         │            │
//!              │         ▼            │
//!              │    ┌─────────┐       │
//!              └────┤ Locked  ├───────┘
//!                   └─────────┘
//!
//! Timeout = PLAN_LOCK_TIMEOUT (3600s)
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    constants::PLAN_LOCK_TIMEOUT,
    utils::error::{CompounderError, CompounderResult},
};

/// Lock with automatic timeout recovery. Timestamps are in seconds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lock {
    /// Current lock state
    pub is_locked: bool,
    /// Last successful lock acquisition time
    pub last_locked_at: Option<u64>,
}

impl Lock {
    fn is_abandoned(&self, now: u64) -> bool {
        match self.last_locked_at {
            Some(last_locked_at) => {
                self.is_locked && now.saturating_sub(last_locked_at) > PLAN_LOCK_TIMEOUT
            }
            None => false,
        }
    }

    /// Attempts to acquire the lock.
    ///
    /// Succeeds if the lock is free or the current holder exceeded the timeout.
    ///
    /// # Returns
    /// * `Ok(())` - Lock successfully acquired
    /// * `Err(CompounderError::Locked)` - Lock unavailable
    pub fn try_lock(&mut self, now: u64) -> CompounderResult<()> {
        if self.is_abandoned(now) {
            self.is_locked = false;
        }

        if !self.is_locked {
            self.is_locked = true;
            self.last_locked_at = Some(now);
            Ok(())
        } else {
            Err(CompounderError::Locked)
        }
    }

    /// Releases the lock if it was legitimately acquired, or clears an abandoned one.
    pub fn unlock(&mut self, acquired_lock: bool, now: u64) -> &mut Self {
        if acquired_lock || self.is_abandoned(now) {
            self.is_locked = false;
            self.last_locked_at = None;
        }

        self
    }
}
