use ic_canister::{generate_idl, init, post_upgrade, query, update, Canister, Idl, PreUpdate};
use ic_exports::{
    candid::Principal,
    ic_cdk::{caller, trap},
};

use crate::{
    api,
    journal::JournalEntry,
    rate::Frequency,
    state::{journal_entries, set_market},
    timers::{schedule_tick, start_timers, wake_now},
    types::{CycleRecordQuery, EngineStateQuery, FrequencySuggestion, InitArgs, PlanInput, PlanQuery, RateQuery},
    utils::{
        clock::{Clock, IcClock},
        common::only_controller,
        error::CompounderResult,
    },
};

#[derive(Canister)]
pub struct Compounder {
    #[id]
    id: Principal,
}

impl PreUpdate for Compounder {}

impl Compounder {
    // INITIALIZATION
    #[init]
    pub fn init(&mut self, args: InitArgs) {
        // validate every plan before anything is written
        if let Err(error) = api::mint_plans(args.plans) {
            trap(&format!("Invalid init arguments: {:?}", error));
        }

        set_market(args.market);
        start_timers();
    }

    #[post_upgrade]
    pub fn post_upgrade(&mut self) {
        start_timers();
    }

    // PLANS
    #[update]
    pub fn add_plan(&mut self, input: PlanInput) -> CompounderResult<u32> {
        only_controller(caller())?;
        let key = api::add_plan(input)?;
        schedule_tick(key, std::time::Duration::ZERO);
        Ok(key)
    }

    /// Stops the plan at its next cycle boundary
    #[update]
    pub fn request_termination(&mut self, key: u32) -> CompounderResult<bool> {
        only_controller(caller())?;
        let first_request = api::request_termination(key, IcClock.now())?;
        wake_now(key);
        Ok(first_request)
    }

    // QUERIES
    #[query]
    pub fn get_effective_rate(&self, query: RateQuery) -> CompounderResult<String> {
        api::effective_rate(query)
    }

    #[query]
    pub fn suggest_frequency(
        &self,
        principal: String,
        annual_rate: String,
        fee_per_operation: Option<String>,
        candidates: Option<Vec<Frequency>>,
    ) -> CompounderResult<Option<FrequencySuggestion>> {
        api::suggest_frequency(principal, annual_rate, fee_per_operation, candidates)
    }

    #[query]
    pub fn get_plan(&self, key: u32) -> CompounderResult<PlanQuery> {
        api::plan_query(key)
    }

    #[query]
    pub fn get_engine_state(&self, key: u32) -> CompounderResult<EngineStateQuery> {
        api::engine_state(key)
    }

    #[query]
    pub fn get_cycle_records(
        &self,
        key: u32,
        offset: u64,
        limit: u64,
    ) -> CompounderResult<Vec<CycleRecordQuery>> {
        api::cycle_records(key, offset, limit)
    }

    #[query]
    pub fn get_journal(&self, key: Option<u32>) -> Vec<JournalEntry> {
        journal_entries(key)
    }

    pub fn idl() -> Idl {
        generate_idl!()
    }
}
