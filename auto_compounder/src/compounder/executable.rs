//! The executable scheduler that drives a plan through its cycles.
//!
//! ```plain
//!  Idle ──► Supplying ──► Waiting ──► Claiming ──► Reinvesting ──┐
//!                           ▲  │                                 │
//!                           │  └──► Terminated                   │
//!                           └────────────────────────────────────┘
//!  Failed is reachable from every active status.
//! ```
//!
//! Each call to [`CompoundScheduler::execute`] is one tick. A tick runs transitions
//! until the engine has to suspend (interval wait or retry backoff) and reports when
//! it wants to be woken up. The termination signal is only consulted in `Waiting`,
//! so a claim is always followed through to its reinvestment or to a durably
//! recorded pending reward.

use std::time::Duration;

use crate::{
    journal::{JournalCollection, LogType},
    port::{Confirmation, Leg, Operation, OperationId, TransactionPort},
    state::{append_cycle_record, cycle_record, insert_plan},
    utils::error::{CompounderError, CompounderResult},
};

use super::{
    data::{EngineState, EngineStatus, FailureReport},
    lock::Lock,
    plan::{CompoundingPlan, SchedulerSettings},
    record::CycleRecord,
    signal::TerminationSignal,
    stable::StablePlan,
};

/// When the driver should run the next tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextTick {
    After(Duration),
    /// The engine reached a final status
    Done,
}

/// Outcome of a single transition
enum Step {
    Continue,
    Sleep(Duration),
    Halt,
}

pub struct CompoundScheduler {
    /// Immutable settings and configurations
    pub settings: SchedulerSettings,
    /// Immutable compounding parameters
    pub plan: CompoundingPlan,
    /// Mutable state
    pub state: EngineState,
    /// Determines if a tick of this plan is currently being executed.
    pub lock: Lock,
    signal: TerminationSignal,
    /// Tracks if the lock acquisition was successful for the drop trait implementation
    acquired_lock: bool,
    /// Time of the current tick in seconds
    now: u64,
}

impl CompoundScheduler {
    pub fn new(stable: &StablePlan, signal: TerminationSignal) -> Self {
        Self {
            settings: stable.settings.clone(),
            plan: stable.plan.clone(),
            state: stable.state.clone(),
            lock: stable.lock.clone(),
            signal,
            acquired_lock: false,
            now: 0,
        }
    }

    /// Writes the scheduler back to `PLAN_STATE`
    fn apply_change(&self) {
        insert_plan(self.into());
    }

    /// Prevents overlapping ticks of the same plan.
    fn lock(&mut self) -> CompounderResult<()> {
        self.lock.try_lock(self.now).map(|_| {
            self.acquired_lock = true;
            self.apply_change();
        })
    }

    /// Releases the lock. A scheduler that never acquired it writes nothing back,
    /// its copy of the state may be stale.
    fn unlock(&mut self) {
        if self.acquired_lock {
            self.lock.unlock(true, self.now);
            self.acquired_lock = false;
            self.apply_change();
        }
    }

    /// Runs one tick at time `now` (seconds).
    ///
    /// # Errors
    /// `Locked` if another tick of this plan is in flight. Every other error ends
    /// the engine in `Failed` and is reported through the state, not returned.
    pub async fn execute<P: TransactionPort>(
        &mut self,
        port: &P,
        now: u64,
        journal: &mut JournalCollection,
    ) -> CompounderResult<NextTick> {
        self.now = now;
        self.lock()?;
        journal.cycle(self.state.current_cycle());

        if self.is_interrupted_leg() {
            journal.append_note(
                Ok(()),
                LogType::Recovery,
                format!(
                    "Resuming the interrupted {:?} leg with its original operation id.",
                    self.state.status
                ),
            );
        }

        let next = match self.drive(port, journal).await {
            Ok(next) => next,
            Err(error) => {
                self.fail(error, journal);
                NextTick::Done
            }
        };

        self.unlock();
        Ok(next)
    }

    /// A submitting status with no failed attempts can only be observed when a
    /// previous tick stopped while awaiting the port.
    fn is_interrupted_leg(&self) -> bool {
        matches!(
            self.state.status,
            EngineStatus::Supplying | EngineStatus::Claiming | EngineStatus::Reinvesting
        ) && self.state.attempts == 0
    }

    async fn drive<P: TransactionPort>(
        &mut self,
        port: &P,
        journal: &mut JournalCollection,
    ) -> CompounderResult<NextTick> {
        loop {
            let step = match self.state.status {
                EngineStatus::Idle => {
                    self.transition(EngineStatus::Supplying, journal);
                    Step::Continue
                }
                EngineStatus::Supplying => self.supply_principal(port, journal).await?,
                EngineStatus::Waiting => self.cycle_boundary(journal),
                EngineStatus::Claiming => self.claim(port, journal).await?,
                EngineStatus::Reinvesting => self.reinvest(port, journal).await?,
                EngineStatus::Terminated | EngineStatus::Failed => Step::Halt,
            };

            match step {
                Step::Continue => continue,
                Step::Sleep(delay) => {
                    self.state.next_tick_at(self.now.saturating_add(delay.as_secs()));
                    self.apply_change();
                    return Ok(NextTick::After(delay));
                }
                Step::Halt => return Ok(NextTick::Done),
            }
        }
    }

    fn transition(&mut self, status: EngineStatus, journal: &mut JournalCollection) {
        journal.append_note(
            Ok(()),
            LogType::Transition,
            format!("{:?} -> {:?}", self.state.status, status),
        );
        self.state.status(status).reset_attempts();
        self.apply_change();
    }

    fn fail(&mut self, error: CompounderError, journal: &mut JournalCollection) {
        self.state
            .last_error(FailureReport::new(&error, self.state.attempts, self.now));
        journal.append_note(
            Err(error),
            LogType::Failure,
            "The engine stopped on a non-retryable error.",
        );
        self.transition(EngineStatus::Failed, journal);
    }

    fn operation_id(&self, cycle: u64, leg: Leg) -> OperationId {
        OperationId {
            plan: self.settings.key,
            cycle,
            leg,
        }
    }

    async fn submit<P: TransactionPort>(
        &self,
        port: &P,
        operation: Operation,
        journal: &mut JournalCollection,
    ) -> CompounderResult<Confirmation> {
        journal.append_note(
            Ok(()),
            LogType::Submission,
            format!(
                "Submitting {:?} {} with amount {:?}. Attempt {}/{}",
                operation.kind,
                operation.id,
                operation.amount,
                self.state.attempts.saturating_add(1),
                self.settings.retry_policy.max_attempts
            ),
        );

        match port.submit(operation, self.settings.port_timeout).await {
            Ok(confirmation) => {
                if confirmation.duplicate {
                    journal.append_note(
                        Ok(()),
                        LogType::Submission,
                        "The market replayed an earlier confirmation for this operation id.",
                    );
                }
                Ok(confirmation)
            }
            Err(port_error) => {
                let error: CompounderError = port_error.into();
                journal.append_note(Err(error.clone()), LogType::Submission, "The submission failed.");
                Err(error)
            }
        }
    }

    /// Handles a failed submission: backs off while the leg has attempts left and
    /// degrades according to the leg once it does not.
    fn on_submission_failure(
        &mut self,
        error: CompounderError,
        leg: Leg,
        journal: &mut JournalCollection,
    ) -> CompounderResult<Step> {
        if let CompounderError::ConfigurationFault(_) = error {
            return Err(error);
        }

        self.state.attempts = self.state.attempts.saturating_add(1);
        let attempts = self.state.attempts;
        self.state
            .last_error(FailureReport::new(&error, attempts, self.now));

        let policy = self.settings.retry_policy;
        if !policy.is_exhausted(attempts) {
            let seed = backoff_seed(self.settings.key, self.state.current_cycle(), leg);
            return Ok(Step::Sleep(policy.backoff(attempts, seed)));
        }

        match leg {
            Leg::Deposit => Err(CompounderError::InitialSupplyFailed { attempts }),
            Leg::Claim | Leg::Reinvest => {
                let exhausted = CompounderError::PersistentPortFailure {
                    operation: format!("{:?}", leg),
                    attempts,
                };
                self.state
                    .last_error(FailureReport::new(&exhausted, attempts, self.now));
                journal.append_note(
                    Err(exhausted),
                    LogType::Info,
                    "Retries are exhausted. The cycle is deferred to the next boundary.",
                );
                Ok(self.wait(journal))
            }
        }
    }

    async fn supply_principal<P: TransactionPort>(
        &mut self,
        port: &P,
        journal: &mut JournalCollection,
    ) -> CompounderResult<Step> {
        let operation = Operation::supply(
            self.operation_id(0, Leg::Deposit),
            self.plan.principal(),
        );

        match self.submit(port, operation, journal).await {
            Ok(_) => {
                let record = CycleRecord::deposit(self.plan.principal(), self.now);
                append_cycle_record(self.settings.key, record);
                journal.append_note(Ok(()), LogType::CycleRecorded, "The principal is supplied.");

                self.state.last_cycle_index = 0;
                Ok(self.wait(journal))
            }
            Err(error) => self.on_submission_failure(error, Leg::Deposit, journal),
        }
    }

    /// The only place the termination signal is honored.
    fn cycle_boundary(&mut self, journal: &mut JournalCollection) -> Step {
        if self.signal.is_terminated() {
            journal.append_note(
                Ok(()),
                LogType::Info,
                "Termination was requested. No further operations will be submitted.",
            );
            self.transition(EngineStatus::Terminated, journal);
            return Step::Halt;
        }

        // Woken before the boundary, e.g. by the operator's wake call
        if self.now < self.state.next_tick_at {
            return Step::Sleep(Duration::from_secs(self.state.next_tick_at - self.now));
        }

        journal.cycle(self.state.current_cycle());
        if self.state.pending_reward.is_some() {
            self.state.carried_over = true;
            self.transition(EngineStatus::Reinvesting, journal);
        } else {
            self.transition(EngineStatus::Claiming, journal);
        }
        Step::Continue
    }

    async fn claim<P: TransactionPort>(
        &mut self,
        port: &P,
        journal: &mut JournalCollection,
    ) -> CompounderResult<Step> {
        let operation = Operation::claim(self.operation_id(self.state.current_cycle(), Leg::Claim));

        match self.submit(port, operation, journal).await {
            Ok(confirmation) => {
                // Persisted together with the status change below, before anything else is awaited
                self.state.pending_reward(Some(confirmation.confirmed_amount));
                self.state.carried_over = false;
                self.transition(EngineStatus::Reinvesting, journal);
                Ok(Step::Continue)
            }
            Err(error) => self.on_submission_failure(error, Leg::Claim, journal),
        }
    }

    async fn reinvest<P: TransactionPort>(
        &mut self,
        port: &P,
        journal: &mut JournalCollection,
    ) -> CompounderResult<Step> {
        let cycle = self.state.current_cycle();
        let claimed = self.state.pending_reward.ok_or(CompounderError::Custom(
            "Reinvesting without a pending reward.".to_string(),
        ))?;

        // The record was written but the state update that follows it was lost
        if let Some(record) = cycle_record(self.settings.key, cycle) {
            journal.append_note(
                Ok(()),
                LogType::Recovery,
                "The cycle was already recorded. Finalizing without resubmitting.",
            );
            return Ok(self.finish_cycle(record, journal, false));
        }

        let record = CycleRecord::compound(
            cycle,
            claimed,
            self.plan.fee_per_operation(),
            self.now,
        );

        if record.degenerate {
            journal.append_note(
                Ok(()),
                LogType::Info,
                format!(
                    "The reward {} does not exceed the fee {}. Nothing is supplied.",
                    claimed,
                    self.plan.fee_per_operation()
                ),
            );
            return Ok(self.finish_cycle(record, journal, true));
        }

        let operation = Operation::supply(
            self.operation_id(cycle, Leg::Reinvest),
            record.reinvested_amount,
        );

        match self.submit(port, operation, journal).await {
            Ok(_) => Ok(self.finish_cycle(record, journal, true)),
            Err(error) => self.on_submission_failure(error, Leg::Reinvest, journal),
        }
    }

    fn finish_cycle(
        &mut self,
        record: CycleRecord,
        journal: &mut JournalCollection,
        append: bool,
    ) -> Step {
        if append {
            journal.append_note(
                Ok(()),
                LogType::CycleRecorded,
                format!(
                    "Claimed {}, paid {}, reinvested {}.",
                    record.claimed_amount, record.fee_paid, record.reinvested_amount
                ),
            );
            append_cycle_record(self.settings.key, record.clone());
        }

        self.state.last_cycle_index = record.index;
        self.state.pending_reward(None);

        if self.state.carried_over {
            // The boundary that reinvested a carried reward still owes its own claim
            self.state.carried_over = false;
            journal.cycle(self.state.current_cycle());
            self.transition(EngineStatus::Claiming, journal);
            Step::Continue
        } else {
            self.wait(journal)
        }
    }

    /// Enters `Waiting` for one interval. A termination requested while a leg was
    /// in flight goes straight to the boundary instead.
    fn wait(&mut self, journal: &mut JournalCollection) -> Step {
        self.transition(EngineStatus::Waiting, journal);
        if self.signal.is_terminated() {
            Step::Continue
        } else {
            Step::Sleep(self.plan.interval())
        }
    }
}

/// Jitter seed of a retry, distinct per plan, cycle and leg
pub(in crate::compounder) fn backoff_seed(key: u32, cycle: u64, leg: Leg) -> u64 {
    (u64::from(key).rotate_left(32) ^ cycle)
        .wrapping_mul(3)
        .wrapping_add(leg as u64)
}

impl From<&CompoundScheduler> for StablePlan {
    fn from(value: &CompoundScheduler) -> Self {
        StablePlan {
            settings: value.settings.clone(),
            plan: value.plan.clone(),
            state: value.state.clone(),
            lock: value.lock.clone(),
        }
    }
}

impl Drop for CompoundScheduler {
    /// Unlocks the plan when the instance goes out of scope
    fn drop(&mut self) {
        self.unlock();
    }
}
