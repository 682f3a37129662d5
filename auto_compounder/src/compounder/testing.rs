//! Deterministic doubles for driving the scheduler in tests

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    time::Duration,
};

use alloy_primitives::{I256, U256};
use futures::executor::block_on;

use crate::{
    constants::SCALE,
    port::{Confirmation, Operation, OperationId, OperationKind, PortError, PortResult, TransactionPort},
    state::{cycle_records, plan},
    utils::clock::Clock,
};

use super::{
    data::EngineState,
    executable::NextTick,
    plan::{CompoundingPlan, SchedulerSettings},
    record::CycleRecord,
    run::run_tick,
    stable::StablePlan,
};

/// 1 token with 6 decimals
pub const TOKEN: u64 = 1_000_000;
pub const FEE: u64 = 1_000;
pub const REWARD: u64 = 50_000;

/// Port that answers from a script, then confirms everything.
/// Confirmed ids are remembered and replayed as duplicates.
#[derive(Default)]
pub struct ScriptedPort {
    script: RefCell<VecDeque<PortResult<()>>>,
    reward: Cell<u64>,
    confirmed: RefCell<HashMap<OperationId, U256>>,
    pub submissions: RefCell<Vec<Operation>>,
}

impl ScriptedPort {
    pub fn new(reward: u64) -> Self {
        let port = Self::default();
        port.reward.set(reward);
        port
    }

    /// Queues answers for the next submissions. `Ok(())` confirms normally.
    pub fn script(&self, answers: impl IntoIterator<Item = PortResult<()>>) {
        self.script.borrow_mut().extend(answers);
    }

    pub fn fail_times(&self, times: usize, error: PortError) {
        self.script(std::iter::repeat(Err(error)).take(times));
    }

    /// Marks an id as executed, as if an earlier attempt succeeded unnoticed
    pub fn remember(&self, id: OperationId, amount: U256) {
        self.confirmed.borrow_mut().insert(id, amount);
    }

    pub fn kinds(&self) -> Vec<OperationKind> {
        self.submissions.borrow().iter().map(|operation| operation.kind).collect()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.borrow().len()
    }
}

impl TransactionPort for ScriptedPort {
    async fn submit(&self, operation: Operation, _timeout: Duration) -> PortResult<Confirmation> {
        self.submissions.borrow_mut().push(operation.clone());

        if let Some(answer) = self.script.borrow_mut().pop_front() {
            answer?;
        }

        if let Some(amount) = self.confirmed.borrow().get(&operation.id) {
            return Ok(Confirmation {
                confirmed_amount: *amount,
                duplicate: true,
            });
        }

        let amount = match operation.kind {
            OperationKind::Supply => operation.amount.unwrap_or_default(),
            OperationKind::Claim => U256::from(self.reward.get()),
        };
        self.confirmed.borrow_mut().insert(operation.id, amount);
        Ok(Confirmation::new(amount))
    }
}

/// Clock that only moves when told to
pub struct ManualClock(Cell<u64>);

impl ManualClock {
    pub fn at(now: u64) -> Self {
        Self(Cell::new(now))
    }

    pub fn advance(&self, delay: Duration) {
        self.0.set(self.0.get() + delay.as_secs());
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.get()
    }
}

pub fn percent(value: i64) -> I256 {
    I256::try_from(value).unwrap() * I256::try_from(SCALE / 100).unwrap()
}

/// Mints a plan of 100 tokens at 20% compounded monthly
pub fn mint_plan(key: u32) {
    let mut settings = SchedulerSettings::default();
    settings.key(key);
    let plan = CompoundingPlan::new(U256::from(100 * TOKEN), percent(20), 12, U256::from(FEE)).unwrap();
    StablePlan::new(settings, plan).mint().unwrap();
}

/// Runs a single tick and sleeps the clock as requested
pub fn tick(key: u32, port: &ScriptedPort, clock: &ManualClock) -> Option<NextTick> {
    let next = block_on(run_tick(key, port, clock));
    if let Some(NextTick::After(delay)) = next {
        clock.advance(delay);
    }
    next
}

/// Runs ticks until the plan is done or `limit` ticks have passed
pub fn run_ticks(key: u32, port: &ScriptedPort, clock: &ManualClock, limit: usize) {
    for _ in 0..limit {
        match tick(key, port, clock) {
            Some(NextTick::After(_)) => continue,
            _ => break,
        }
    }
}

pub fn engine(key: u32) -> EngineState {
    plan(key).unwrap().state
}

pub fn records(key: u32) -> Vec<CycleRecord> {
    cycle_records(key, 0, usize::MAX)
}
