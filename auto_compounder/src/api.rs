//! Operator operations behind the canister endpoints.
//! Access control and timers are left to the canister, everything here only
//! touches the state.

use crate::{
    compounder::stable::StablePlan,
    constants::{default_fee_per_operation, MAX_RECORDS_PAGE},
    rate::{self, annualized_compounded_rate_with_fee, Frequency},
    state::{self, next_plan_key, plan, record_termination_request, termination_requested_at},
    types::{CycleRecordQuery, EngineStateQuery, FrequencySuggestion, PlanInput, PlanQuery, RateQuery},
    utils::{
        common::{string_to_i256, string_to_u256},
        error::{CompounderError, CompounderResult},
    },
};

/// Mints every plan under consecutive keys.
/// Nothing is written unless every input is valid.
pub fn mint_plans(inputs: Vec<PlanInput>) -> CompounderResult<Vec<u32>> {
    let first_key = next_plan_key();
    let plans = inputs
        .into_iter()
        .zip(first_key..)
        .map(|(input, key)| input.into_stable(key))
        .collect::<CompounderResult<Vec<StablePlan>>>()?;

    plans
        .iter()
        .map(|stable| stable.mint().map(|_| stable.settings.key))
        .collect()
}

/// Mints a single plan under the next free key.
pub fn add_plan(input: PlanInput) -> CompounderResult<u32> {
    let stable = input.into_stable(next_plan_key())?;
    stable.mint()?;
    Ok(stable.settings.key)
}

/// Raises the termination signal of a plan. The plan stops at its next cycle
/// boundary, an in-flight cycle is completed first.
/// Returns `false` if termination had already been requested.
pub fn request_termination(key: u32, now: u64) -> CompounderResult<bool> {
    plan(key).ok_or(CompounderError::NonExistentValue)?;
    Ok(record_termination_request(key, now))
}

/// Effective annualized rate of the queried parameters, rounded to two decimals
pub fn effective_rate(query: RateQuery) -> CompounderResult<String> {
    let (principal, annual_rate, fee) = query.parse()?;
    annualized_compounded_rate_with_fee(principal, annual_rate, query.frequency, fee)
        .map(|rate| rate.to_string())
}

/// Best of `candidates` (all presets when none are given) for the given parameters
pub fn suggest_frequency(
    principal: String,
    annual_rate: String,
    fee_per_operation: Option<String>,
    candidates: Option<Vec<Frequency>>,
) -> CompounderResult<Option<FrequencySuggestion>> {
    let principal = string_to_u256(&principal)?;
    let annual_rate = string_to_i256(&annual_rate)?;
    let fee = match fee_per_operation {
        Some(fee) => string_to_u256(&fee)?,
        None => default_fee_per_operation(),
    };
    let candidates = candidates.unwrap_or_else(|| Frequency::ALL.to_vec());

    let best = rate::suggest_frequency(principal, annual_rate, fee, &candidates)?;
    Ok(best.map(|(frequency, rate)| FrequencySuggestion {
        frequency,
        times_per_year: frequency.times_per_year(),
        effective_rate: rate.to_string(),
    }))
}

pub fn plan_query(key: u32) -> CompounderResult<PlanQuery> {
    plan(key)
        .map(|stable| PlanQuery::from(&stable))
        .ok_or(CompounderError::NonExistentValue)
}

pub fn engine_state(key: u32) -> CompounderResult<EngineStateQuery> {
    plan(key)
        .map(|stable| EngineStateQuery::new(stable.state, termination_requested_at(key)))
        .ok_or(CompounderError::NonExistentValue)
}

/// A page of the cycle log of a plan, starting at cycle `offset`
pub fn cycle_records(key: u32, offset: u64, limit: u64) -> CompounderResult<Vec<CycleRecordQuery>> {
    plan(key).ok_or(CompounderError::NonExistentValue)?;
    let limit = limit.min(MAX_RECORDS_PAGE) as usize;
    Ok(state::cycle_records(key, offset, limit)
        .into_iter()
        .map(CycleRecordQuery::from)
        .collect())
}
