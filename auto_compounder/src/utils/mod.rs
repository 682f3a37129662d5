//! Utility and helper functions needed for:
//! - Error handling
//! - Type casting between candid and fixed-point values
//! - Retry and backoff policy
//! - Reading time

pub(crate) mod clock;
pub(crate) mod common;
pub(crate) mod error;
pub(crate) mod retry;
