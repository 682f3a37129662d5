use std::time::Duration;

use alloy_primitives::{I256, U256};
use candid::{CandidType, Principal};
use serde::Deserialize;

use crate::{
    compounder::{
        data::{EngineState, EngineStatus, FailureReport},
        plan::{CompoundingPlan, SchedulerSettings},
        record::CycleRecord,
        stable::StablePlan,
    },
    constants::default_fee_per_operation,
    rate::Frequency,
    utils::{
        common::{string_to_i256, string_to_u256},
        error::{invalid_input, CompounderResult},
    },
};

#[derive(Clone, Debug, CandidType, Deserialize)]
pub struct InitArgs {
    /// Market canister every plan compounds into
    pub market: Principal,
    pub plans: Vec<PlanInput>,
}

/// A plan as submitted by an operator.
/// Amounts are base-10 integers in base units, the rate is scaled by 10^18.
#[derive(Clone, Debug, CandidType, Deserialize)]
pub struct PlanInput {
    pub principal: String,
    pub annual_rate: String,
    /// Compounding cycles per year
    pub frequency: u32,
    pub fee_per_operation: Option<String>,
    pub max_attempts: Option<u8>,
    pub port_timeout_secs: Option<u64>,
}

impl PlanInput {
    /// Validates the input and builds a plan ready to be minted under `key`.
    pub fn into_stable(self, key: u32) -> CompounderResult<StablePlan> {
        let principal = string_to_u256(&self.principal)?;
        let annual_rate = string_to_i256(&self.annual_rate)?;
        let fee = parse_fee(self.fee_per_operation.as_deref())?;
        let plan = CompoundingPlan::new(principal, annual_rate, self.frequency, fee)?;

        let mut settings = SchedulerSettings::default();
        settings.key(key);

        if let Some(max_attempts) = self.max_attempts {
            if max_attempts == 0 {
                return Err(invalid_input("At least one attempt per operation is required."));
            }
            settings.max_attempts(max_attempts);
        }

        if let Some(timeout) = self.port_timeout_secs {
            if timeout == 0 {
                return Err(invalid_input("The port timeout must be positive."));
            }
            settings.port_timeout(Duration::from_secs(timeout));
        }

        Ok(StablePlan::new(settings, plan))
    }
}

fn parse_fee(fee: Option<&str>) -> CompounderResult<U256> {
    fee.map_or(Ok(default_fee_per_operation()), string_to_u256)
}

/// Parameters of a rate preview
#[derive(Clone, Debug, CandidType, Deserialize)]
pub struct RateQuery {
    pub principal: String,
    pub annual_rate: String,
    pub frequency: u32,
    pub fee_per_operation: Option<String>,
}

impl RateQuery {
    pub fn parse(&self) -> CompounderResult<(U256, I256, U256)> {
        Ok((
            string_to_u256(&self.principal)?,
            string_to_i256(&self.annual_rate)?,
            parse_fee(self.fee_per_operation.as_deref())?,
        ))
    }
}

#[derive(Clone, Debug, CandidType, PartialEq)]
pub struct FrequencySuggestion {
    pub frequency: Frequency,
    pub times_per_year: u32,
    /// Unrounded, scaled by 10^18
    pub effective_rate: String,
}

#[derive(Clone, Debug, PartialEq, CandidType)]
pub struct PlanQuery {
    pub key: u32,
    pub principal: String,
    pub annual_rate: String,
    pub frequency: u32,
    pub fee_per_operation: String,
    pub interval_secs: u64,
    /// Rounded to two decimals, scaled by 10^18. `None` if it overflows.
    pub effective_rate: Option<String>,
    pub max_attempts: u8,
    pub port_timeout_secs: u64,
}

impl From<&StablePlan> for PlanQuery {
    fn from(value: &StablePlan) -> Self {
        Self {
            key: value.settings.key,
            principal: value.plan.principal().to_string(),
            annual_rate: value.plan.annual_rate().to_string(),
            frequency: value.plan.frequency(),
            fee_per_operation: value.plan.fee_per_operation().to_string(),
            interval_secs: value.plan.interval().as_secs(),
            effective_rate: value.plan.effective_rate().ok().map(|rate| rate.to_string()),
            max_attempts: value.settings.retry_policy.max_attempts,
            port_timeout_secs: value.settings.port_timeout.as_secs(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, CandidType)]
pub struct EngineStateQuery {
    pub status: EngineStatus,
    pub last_cycle_index: u64,
    pub pending_reward: Option<String>,
    pub attempts: u8,
    pub next_tick_at: u64,
    pub last_error: Option<FailureReport>,
    pub termination_requested_at: Option<u64>,
}

impl EngineStateQuery {
    pub fn new(state: EngineState, termination_requested_at: Option<u64>) -> Self {
        Self {
            status: state.status,
            last_cycle_index: state.last_cycle_index,
            pending_reward: state.pending_reward.map(|reward| reward.to_string()),
            attempts: state.attempts,
            next_tick_at: state.next_tick_at,
            last_error: state.last_error,
            termination_requested_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, CandidType)]
pub struct CycleRecordQuery {
    pub index: u64,
    pub claimed_amount: String,
    pub fee_paid: String,
    pub reinvested_amount: String,
    pub timestamp: u64,
    pub degenerate: bool,
}

impl From<CycleRecord> for CycleRecordQuery {
    fn from(value: CycleRecord) -> Self {
        Self {
            index: value.index,
            claimed_amount: value.claimed_amount.to_string(),
            fee_paid: value.fee_paid.to_string(),
            reinvested_amount: value.reinvested_amount.to_string(),
            timestamp: value.timestamp,
            degenerate: value.degenerate,
        }
    }
}
