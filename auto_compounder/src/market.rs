//! Transaction port backed by a lending market canister.
//!
//! The market exposes `supply` and `claim`, both keyed by the operation id so that a
//! resubmitted operation is answered with the original confirmation.

use std::time::Duration;

use candid::{CandidType, Nat, Principal};
use ic_exports::ic_cdk::{self, api::time};
use serde::Deserialize;

use crate::{
    port::{Confirmation, Leg, Operation, OperationKind, PortError, PortResult, TransactionPort},
    utils::{
        common::{extract_call_result, nat_to_u256, u256_to_nat},
        error::CompounderResult,
    },
};

#[derive(Clone, Debug, CandidType, Deserialize)]
pub struct MarketRequest {
    pub plan: u32,
    pub cycle: u64,
    pub leg: Leg,
    pub amount: Option<Nat>,
}

#[derive(Clone, Debug, PartialEq, CandidType, Deserialize)]
pub enum MarketReply {
    Confirmed(Nat),
    /// The operation id was executed before, the original amount is echoed
    Duplicate(Nat),
    Rejected(String),
    /// The canister is no longer allowed to act on the position
    Unauthorized(String),
}

impl From<&Operation> for MarketRequest {
    fn from(operation: &Operation) -> Self {
        Self {
            plan: operation.id.plan,
            cycle: operation.id.cycle,
            leg: operation.id.leg,
            amount: operation.amount.as_ref().map(u256_to_nat),
        }
    }
}

/// Interprets the market's answer to a submission
pub fn confirmation_from_reply(reply: MarketReply) -> PortResult<Confirmation> {
    let decode = |amount: &Nat| {
        nat_to_u256(amount).map_err(|err| PortError::Rejected(format!("{:?}", err)))
    };

    match reply {
        MarketReply::Confirmed(amount) => Ok(Confirmation::new(decode(&amount)?)),
        MarketReply::Duplicate(amount) => Ok(Confirmation {
            confirmed_amount: decode(&amount)?,
            duplicate: true,
        }),
        MarketReply::Rejected(reason) => Err(PortError::Rejected(reason)),
        MarketReply::Unauthorized(reason) => Err(PortError::Revoked(reason)),
    }
}

/// Settles a call that took `elapsed`. A reply arriving after `timeout` is a
/// timeout even when it confirms, the resubmission with the same id is answered
/// as a duplicate.
pub fn settle_call(
    result: CompounderResult<MarketReply>,
    elapsed: Duration,
    timeout: Duration,
) -> PortResult<Confirmation> {
    if elapsed >= timeout {
        return Err(PortError::Timeout);
    }

    match result {
        Ok(reply) => confirmation_from_reply(reply),
        Err(error) => Err(PortError::Rejected(format!("{:?}", error))),
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MarketPort(pub Principal);

impl MarketPort {
    fn method(kind: OperationKind) -> &'static str {
        match kind {
            OperationKind::Supply => "supply",
            OperationKind::Claim => "claim",
        }
    }
}

impl TransactionPort for MarketPort {
    async fn submit(&self, operation: Operation, timeout: Duration) -> PortResult<Confirmation> {
        let started_at = time();
        let request = MarketRequest::from(&operation);

        let call_result = ic_cdk::call::<(MarketRequest,), (MarketReply,)>(
            self.0,
            Self::method(operation.kind),
            (request,),
        )
        .await;

        let elapsed = Duration::from_nanos(time().saturating_sub(started_at));
        settle_call(extract_call_result(call_result), elapsed, timeout)
    }
}
