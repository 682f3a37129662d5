//! The contract the scheduler requires from the ledger execution layer.
//!
//! Concrete bindings (the market canister adapter, test stubs) live outside the
//! scheduler and implement [`TransactionPort`].

use std::{fmt, time::Duration};

use alloy_primitives::U256;
use candid::CandidType;
use serde::{Deserialize, Serialize};

use crate::utils::error::CompounderError;

/// Kind of an operation submitted to the market
#[derive(Clone, Copy, Debug, PartialEq, Eq, CandidType, Deserialize, Serialize)]
pub enum OperationKind {
    Supply,
    Claim,
}

/// Which leg of the plan's lifecycle an operation belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, CandidType, Deserialize, Serialize)]
pub enum Leg {
    /// Initial supply of the principal
    Deposit,
    /// Claiming the reward of a cycle
    Claim,
    /// Supplying the net reward of a cycle
    Reinvest,
}

/// Identifies an operation across retries and restarts.
/// A port that deduplicates on this id gives at-most-once execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, CandidType, Deserialize, Serialize)]
pub struct OperationId {
    pub plan: u32,
    pub cycle: u64,
    pub leg: Leg,
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{:?}", self.plan, self.cycle, self.leg)
    }
}

/// A typed operation with an optional amount
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub id: OperationId,
    pub kind: OperationKind,
    /// Amount to supply. Claims carry none.
    pub amount: Option<U256>,
}

impl Operation {
    pub fn supply(id: OperationId, amount: U256) -> Self {
        Self {
            id,
            kind: OperationKind::Supply,
            amount: Some(amount),
        }
    }

    pub fn claim(id: OperationId) -> Self {
        Self {
            id,
            kind: OperationKind::Claim,
            amount: None,
        }
    }
}

/// Successful submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Confirmation {
    /// Supplied amount for supplies, claimed reward for claims
    pub confirmed_amount: U256,
    /// The port had already executed this operation id and replayed its result
    pub duplicate: bool,
}

impl Confirmation {
    pub fn new(confirmed_amount: U256) -> Self {
        Self {
            confirmed_amount,
            duplicate: false,
        }
    }
}

/// Failed submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PortError {
    /// No answer within the call's timeout. Never treated as success.
    Timeout,
    /// Temporary rejection, worth retrying
    Rejected(String),
    /// Authorization is permanently gone, retrying is pointless
    Revoked(String),
}

impl PortError {
    /// Returns `true` for errors that may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PortError::Revoked(_))
    }
}

impl From<PortError> for CompounderError {
    fn from(value: PortError) -> Self {
        let retryable = value.is_retryable();
        let reason = match value {
            PortError::Timeout => "The submission timed out.".to_string(),
            PortError::Rejected(reason) | PortError::Revoked(reason) => reason,
        };

        if retryable {
            CompounderError::TransientPortFailure(reason)
        } else {
            CompounderError::ConfigurationFault(reason)
        }
    }
}

pub type PortResult<T> = Result<T, PortError>;

/// Submits operations to the market the plan compounds into.
///
/// Every call carries an explicit timeout. Implementations must either deduplicate
/// on [`OperationId`] or tolerate the scheduler resubmitting an id whose earlier
/// attempt timed out.
#[allow(async_fn_in_trait)]
pub trait TransactionPort {
    async fn submit(&self, operation: Operation, timeout: Duration) -> PortResult<Confirmation>;
}
