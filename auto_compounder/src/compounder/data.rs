//! Mutable engine state

use alloy_primitives::U256;
use candid::CandidType;
use serde::{Deserialize, Serialize};

use crate::utils::error::CompounderError;

/// Stage of the compounding state machine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, CandidType, Deserialize, Serialize)]
pub enum EngineStatus {
    /// Minted, the principal has not been supplied yet
    #[default]
    Idle,
    /// Supplying the principal
    Supplying,
    /// Suspended until the next cycle boundary
    Waiting,
    /// Claiming the reward of the next cycle
    Claiming,
    /// Supplying the claimed reward net of the fee
    Reinvesting,
    /// Stopped on operator request at a cycle boundary
    Terminated,
    /// Stopped by a non-retryable error
    Failed,
}

impl EngineStatus {
    /// `Terminated` and `Failed` never transition again
    pub fn is_final(&self) -> bool {
        matches!(self, EngineStatus::Terminated | EngineStatus::Failed)
    }
}

/// Error class recorded for operators
#[derive(Clone, Copy, Debug, PartialEq, Eq, CandidType, Deserialize, Serialize)]
pub enum ErrorKind {
    InvalidInput,
    TransientPortFailure,
    PersistentPortFailure,
    InitialSupplyFailed,
    ConfigurationFault,
    Internal,
}

impl From<&CompounderError> for ErrorKind {
    fn from(value: &CompounderError) -> Self {
        match value {
            CompounderError::InvalidInput(_) => ErrorKind::InvalidInput,
            CompounderError::TransientPortFailure(_) => ErrorKind::TransientPortFailure,
            CompounderError::PersistentPortFailure { .. } => ErrorKind::PersistentPortFailure,
            CompounderError::InitialSupplyFailed { .. } => ErrorKind::InitialSupplyFailed,
            CompounderError::ConfigurationFault(_) => ErrorKind::ConfigurationFault,
            _ => ErrorKind::Internal,
        }
    }
}

/// The last error seen by the engine
#[derive(Clone, Debug, PartialEq, Eq, CandidType, Deserialize, Serialize)]
pub struct FailureReport {
    pub kind: ErrorKind,
    /// Attempts made on the failing leg when the error was recorded
    pub attempts: u8,
    pub message: String,
    /// Seconds
    pub at: u64,
}

impl FailureReport {
    pub fn new(error: &CompounderError, attempts: u8, at: u64) -> Self {
        Self {
            kind: error.into(),
            attempts,
            message: format!("{:?}", error),
            at,
        }
    }
}

/// Struct containing all mutable data of an engine.
/// Only the scheduler writes it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub status: EngineStatus,
    /// Index of the last recorded cycle. The deposit is cycle 0.
    pub last_cycle_index: u64,
    /// Claimed reward that has not been reinvested yet
    pub pending_reward: Option<U256>,
    /// Failed attempts on the current leg
    pub attempts: u8,
    /// `true` while the pending reward comes from an earlier cycle and the current
    /// boundary still owes a claim after reinvesting it
    pub carried_over: bool,
    /// Timestamp of the next scheduled tick in seconds
    pub next_tick_at: u64,
    pub last_error: Option<FailureReport>,
}

impl EngineState {
    /// Sets the status.
    pub fn status(&mut self, status: EngineStatus) -> &mut Self {
        self.status = status;
        self
    }

    /// Sets the pending reward.
    pub fn pending_reward(&mut self, pending_reward: Option<U256>) -> &mut Self {
        self.pending_reward = pending_reward;
        self
    }

    /// Resets the attempt counter of the current leg.
    pub fn reset_attempts(&mut self) -> &mut Self {
        self.attempts = 0;
        self
    }

    /// Sets the next tick timestamp.
    pub fn next_tick_at(&mut self, next_tick_at: u64) -> &mut Self {
        self.next_tick_at = next_tick_at;
        self
    }

    /// Records the last error.
    pub fn last_error(&mut self, report: FailureReport) -> &mut Self {
        self.last_error = Some(report);
        self
    }

    /// Index of the cycle currently being worked on
    pub fn current_cycle(&self) -> u64 {
        self.last_cycle_index + 1
    }
}
