//! Operator-settable termination flag

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared flag observed by the scheduler at `Waiting` boundaries.
///
/// Clones share the same flag. Once set it stays set.
#[derive(Clone, Debug, Default)]
pub struct TerminationSignal(Arc<AtomicBool>);

impl TerminationSignal {
    /// Builds a signal from a persisted flag
    pub fn restored(terminated: bool) -> Self {
        Self(Arc::new(AtomicBool::new(terminated)))
    }

    /// Sets the flag. Called by the operator, never by the scheduler.
    pub fn request_termination(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_terminated(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
