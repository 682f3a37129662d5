use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
};

use candid::Principal;
use ic_exports::ic_cdk_timers::TimerId;
use ic_stable_structures::{
    memory_manager::{MemoryId, MemoryManager, VirtualMemory},
    DefaultMemoryImpl, StableBTreeMap,
};

use crate::{
    compounder::{
        record::{CycleRecord, RecordKey},
        signal::TerminationSignal,
        stable::StablePlan,
    },
    constants::JOURNAL_LIMIT,
    journal::JournalEntry,
};

type Memory = VirtualMemory<DefaultMemoryImpl>;

const PLANS_MEMORY_ID: MemoryId = MemoryId::new(0);
const RECORDS_MEMORY_ID: MemoryId = MemoryId::new(1);
const TERMINATIONS_MEMORY_ID: MemoryId = MemoryId::new(2);

thread_local! {
    static MEMORY_MANAGER: RefCell<MemoryManager<DefaultMemoryImpl>> =
        RefCell::new(MemoryManager::init(DefaultMemoryImpl::default()));

    /// Plans with their engine state, keyed by plan key
    pub static PLAN_STATE: RefCell<StableBTreeMap<u32, StablePlan, Memory>> = RefCell::new(
        StableBTreeMap::init(MEMORY_MANAGER.with(|manager| manager.borrow().get(PLANS_MEMORY_ID))),
    );

    /// Append-only cycle log of every plan
    pub static CYCLE_RECORDS: RefCell<StableBTreeMap<RecordKey, CycleRecord, Memory>> = RefCell::new(
        StableBTreeMap::init(MEMORY_MANAGER.with(|manager| manager.borrow().get(RECORDS_MEMORY_ID))),
    );

    /// Termination requests, keyed by plan key, valued by request time in seconds
    pub static TERMINATION_REQUESTS: RefCell<StableBTreeMap<u32, u64, Memory>> = RefCell::new(
        StableBTreeMap::init(MEMORY_MANAGER.with(|manager| manager.borrow().get(TERMINATIONS_MEMORY_ID))),
    );

    /// Live termination signals shared with running schedulers
    pub static SIGNALS: RefCell<HashMap<u32, TerminationSignal>> = RefCell::new(HashMap::new());

    /// Pending tick timers, keyed by plan key
    pub static TIMERS: RefCell<HashMap<u32, TimerId>> = RefCell::new(HashMap::new());

    pub static JOURNAL: RefCell<Vec<JournalEntry>> = RefCell::new(Vec::new());

    /// Market canister the plans compound into
    pub static MARKET: Cell<Principal> = Cell::new(Principal::anonymous());
}

pub fn plan(key: u32) -> Option<StablePlan> {
    PLAN_STATE.with(|plans| plans.borrow().get(&key))
}

pub fn plan_keys() -> Vec<u32> {
    PLAN_STATE.with(|plans| plans.borrow().iter().map(|(key, _)| key).collect())
}

/// Key for the next minted plan
pub fn next_plan_key() -> u32 {
    PLAN_STATE.with(|plans| {
        plans
            .borrow()
            .last_key_value()
            .map_or(0, |(key, _)| key.saturating_add(1))
    })
}

pub fn insert_plan(stable: StablePlan) {
    PLAN_STATE.with(|plans| {
        plans.borrow_mut().insert(stable.settings.key, stable);
    });
}

pub fn append_cycle_record(plan: u32, record: CycleRecord) {
    let key = RecordKey {
        plan,
        index: record.index,
    };
    CYCLE_RECORDS.with(|records| {
        records.borrow_mut().insert(key, record);
    });
}

pub fn cycle_record(plan: u32, index: u64) -> Option<CycleRecord> {
    CYCLE_RECORDS.with(|records| records.borrow().get(&RecordKey { plan, index }))
}

/// Records of a plan in cycle order, starting at cycle `offset`
pub fn cycle_records(plan: u32, offset: u64, limit: usize) -> Vec<CycleRecord> {
    let start = RecordKey {
        plan,
        index: offset,
    };
    let end = RecordKey {
        plan,
        index: u64::MAX,
    };
    CYCLE_RECORDS.with(|records| {
        records
            .borrow()
            .range(start..=end)
            .take(limit)
            .map(|(_, record)| record)
            .collect()
    })
}

/// Returns the live signal of a plan, restored from stable memory on first use
pub fn termination_signal(plan: u32) -> TerminationSignal {
    SIGNALS.with(|signals| {
        signals
            .borrow_mut()
            .entry(plan)
            .or_insert_with(|| {
                let requested = TERMINATION_REQUESTS.with(|requests| requests.borrow().contains_key(&plan));
                TerminationSignal::restored(requested)
            })
            .clone()
    })
}

/// Persists a termination request and raises the plan's signal.
/// Returns `false` if termination had already been requested.
pub fn record_termination_request(plan: u32, now: u64) -> bool {
    let first_request = TERMINATION_REQUESTS.with(|requests| {
        let mut requests = requests.borrow_mut();
        if requests.contains_key(&plan) {
            false
        } else {
            requests.insert(plan, now);
            true
        }
    });
    termination_signal(plan).request_termination();
    first_request
}

pub fn termination_requested_at(plan: u32) -> Option<u64> {
    TERMINATION_REQUESTS.with(|requests| requests.borrow().get(&plan))
}

pub fn market() -> Principal {
    MARKET.with(|market| market.get())
}

pub fn set_market(principal: Principal) {
    MARKET.with(|market| market.set(principal));
}

pub fn insert_journal_entries(entries: Vec<JournalEntry>) {
    JOURNAL.with(|journal| journal.borrow_mut().extend(entries));
}

/// Journal entries, optionally filtered by plan
pub fn journal_entries(plan: Option<u32>) -> Vec<JournalEntry> {
    JOURNAL.with(|journal| {
        journal
            .borrow()
            .iter()
            .filter(|entry| plan.is_none() || entry.plan_key == plan)
            .cloned()
            .collect()
    })
}

/// Drops the oldest journal entries beyond `JOURNAL_LIMIT`.
/// Returns the number of removed entries.
pub fn prune_journal() -> usize {
    JOURNAL.with(|journal| {
        let mut journal = journal.borrow_mut();
        let excess = journal.len().saturating_sub(JOURNAL_LIMIT);
        journal.drain(..excess);
        excess
    })
}
