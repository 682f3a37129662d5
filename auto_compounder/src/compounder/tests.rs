use std::{thread, time::Duration};

use alloy_primitives::U256;
use futures::executor::block_on;
use proptest::prelude::*;

use crate::{
    constants::LOCK_CONTENTION_DELAY_SECS,
    journal::LogType,
    port::{Leg, OperationId, OperationKind, PortError},
    state::{append_cycle_record, insert_plan, journal_entries, next_plan_key, plan, record_termination_request},
    utils::{
        clock::{Clock, MockClock},
        error::CompounderError,
    },
};

use super::{
    data::{EngineStatus, ErrorKind},
    executable::{backoff_seed, NextTick},
    record::CycleRecord,
    run::run_tick,
    testing::*,
};

const KEY: u32 = 0;
const START: u64 = 1_000;

fn interval() -> Duration {
    plan(KEY).unwrap().plan.interval()
}

fn deposited() -> (ScriptedPort, ManualClock) {
    mint_plan(KEY);
    let port = ScriptedPort::new(REWARD);
    let clock = ManualClock::at(START);
    assert!(matches!(tick(KEY, &port, &clock), Some(NextTick::After(_))));
    assert_eq!(engine(KEY).status, EngineStatus::Waiting);
    (port, clock)
}

#[test]
fn compounds_cycle_after_cycle() {
    let (port, clock) = deposited();

    for _ in 0..3 {
        assert_eq!(tick(KEY, &port, &clock), Some(NextTick::After(interval())));
    }

    use OperationKind::*;
    assert_eq!(port.kinds(), vec![Supply, Claim, Supply, Claim, Supply, Claim, Supply]);
    assert_eq!(
        port.submissions.borrow()[2].amount,
        Some(U256::from(REWARD - FEE))
    );

    let records = records(KEY);
    assert_eq!(records.len(), 4);
    assert_eq!(records[0], CycleRecord::deposit(U256::from(100 * TOKEN), START));
    for (index, record) in records.iter().enumerate().skip(1) {
        assert_eq!(record.index, index as u64);
        assert_eq!(record.claimed_amount, U256::from(REWARD));
        assert_eq!(record.fee_paid, U256::from(FEE));
        assert!(record.is_balanced());
        assert!(!record.degenerate);
    }

    let state = engine(KEY);
    assert_eq!(state.status, EngineStatus::Waiting);
    assert_eq!(state.last_cycle_index, 3);
    assert_eq!(state.pending_reward, None);
    assert_eq!(state.next_tick_at, clock.now());
}

#[test]
fn termination_while_waiting_stops_without_operations() {
    let (port, clock) = deposited();
    record_termination_request(KEY, clock.now());

    assert_eq!(tick(KEY, &port, &clock), Some(NextTick::Done));
    assert_eq!(tick(KEY, &port, &clock), Some(NextTick::Done));

    assert_eq!(port.submission_count(), 1);
    let state = engine(KEY);
    assert_eq!(state.status, EngineStatus::Terminated);
    assert_eq!(state.last_error, None);
    assert_eq!(records(KEY).len(), 1);
}

#[test]
fn termination_shortens_the_wait() {
    mint_plan(KEY);
    let port = ScriptedPort::new(REWARD);
    let clock = ManualClock::at(START);

    // Deposit without letting the clock reach the boundary
    block_on(run_tick(KEY, &port, &clock));
    clock.advance(Duration::from_secs(60));

    // A spurious wake sleeps for the rest of the interval
    assert_eq!(
        block_on(run_tick(KEY, &port, &clock)),
        Some(NextTick::After(interval() - Duration::from_secs(60)))
    );
    assert_eq!(port.submission_count(), 1);

    // A wake caused by termination ends the engine right away
    record_termination_request(KEY, clock.now());
    assert_eq!(block_on(run_tick(KEY, &port, &clock)), Some(NextTick::Done));
    assert_eq!(engine(KEY).status, EngineStatus::Terminated);
    assert_eq!(port.submission_count(), 1);
}

#[test]
fn in_flight_claim_completes_before_termination() {
    let (port, clock) = deposited();
    port.fail_times(1, PortError::Timeout);

    assert!(matches!(tick(KEY, &port, &clock), Some(NextTick::After(_))));
    assert_eq!(engine(KEY).status, EngineStatus::Claiming);

    record_termination_request(KEY, clock.now());

    // The retry is not a boundary: the cycle is finished first, then the engine
    // stops without sleeping another interval
    assert_eq!(tick(KEY, &port, &clock), Some(NextTick::Done));
    assert_eq!(records(KEY).len(), 2);

    let state = engine(KEY);
    assert_eq!(state.status, EngineStatus::Terminated);
    assert_eq!(state.last_cycle_index, 1);
    assert_eq!(state.pending_reward, None);

    use OperationKind::*;
    assert_eq!(port.kinds(), vec![Supply, Claim, Claim, Supply]);
}

#[test]
fn exhausted_reinvest_keeps_the_reward_when_terminating() {
    let (port, clock) = deposited();
    port.script([Ok(())]);
    port.fail_times(5, PortError::Timeout);

    tick(KEY, &port, &clock);
    assert_eq!(engine(KEY).status, EngineStatus::Reinvesting);
    record_termination_request(KEY, clock.now());

    for _ in 0..3 {
        assert!(matches!(tick(KEY, &port, &clock), Some(NextTick::After(_))));
    }
    assert_eq!(tick(KEY, &port, &clock), Some(NextTick::Done));

    let state = engine(KEY);
    assert_eq!(state.status, EngineStatus::Terminated);
    assert_eq!(state.pending_reward, Some(U256::from(REWARD)));
    assert_eq!(records(KEY).len(), 1);
}

#[test]
fn legs_of_a_cycle_back_off_independently() {
    let seeds: Vec<u64> = [Leg::Deposit, Leg::Claim, Leg::Reinvest]
        .into_iter()
        .map(|leg| backoff_seed(KEY, 3, leg))
        .collect();
    assert_ne!(seeds[0], seeds[1]);
    assert_ne!(seeds[1], seeds[2]);
    assert_ne!(seeds[0], seeds[2]);
    assert_ne!(backoff_seed(KEY, 3, Leg::Claim), backoff_seed(KEY, 4, Leg::Claim));
}

#[test]
fn initial_supply_gives_up_after_five_attempts() {
    mint_plan(KEY);
    let port = ScriptedPort::new(REWARD);
    let clock = ManualClock::at(START);
    port.fail_times(5, PortError::Timeout);

    run_ticks(KEY, &port, &clock, 20);

    assert_eq!(port.submission_count(), 5);
    assert!(port
        .submissions
        .borrow()
        .iter()
        .all(|operation| operation.id.leg == Leg::Deposit));

    let state = engine(KEY);
    assert_eq!(state.status, EngineStatus::Failed);
    let report = state.last_error.unwrap();
    assert_eq!(report.kind, ErrorKind::InitialSupplyFailed);
    assert_eq!(report.attempts, 5);
    assert!(records(KEY).is_empty());
}

#[test]
fn initial_supply_recovers_from_transient_failures() {
    mint_plan(KEY);
    let port = ScriptedPort::new(REWARD);
    let clock = ManualClock::at(START);
    port.fail_times(2, PortError::Rejected("congested".to_string()));

    let first = tick(KEY, &port, &clock);
    let second = tick(KEY, &port, &clock);
    assert!(matches!(first, Some(NextTick::After(delay)) if delay < Duration::from_secs(10)));
    assert!(matches!(second, Some(NextTick::After(delay)) if delay < Duration::from_secs(10)));
    assert_eq!(engine(KEY).status, EngineStatus::Supplying);
    assert_eq!(engine(KEY).attempts, 2);

    assert_eq!(tick(KEY, &port, &clock), Some(NextTick::After(interval())));
    let state = engine(KEY);
    assert_eq!(state.status, EngineStatus::Waiting);
    assert_eq!(state.attempts, 0);
    assert_eq!(state.last_error.unwrap().kind, ErrorKind::TransientPortFailure);
    assert_eq!(records(KEY).len(), 1);
}

#[test]
fn exhausted_claim_retries_the_same_cycle_later() {
    let (port, clock) = deposited();
    port.fail_times(5, PortError::Timeout);

    for _ in 0..4 {
        tick(KEY, &port, &clock);
        assert_eq!(engine(KEY).status, EngineStatus::Claiming);
    }
    assert_eq!(tick(KEY, &port, &clock), Some(NextTick::After(interval())));

    let state = engine(KEY);
    assert_eq!(state.status, EngineStatus::Waiting);
    assert_eq!(state.last_cycle_index, 0);
    assert_eq!(state.pending_reward, None);
    let report = state.last_error.unwrap();
    assert_eq!(report.kind, ErrorKind::PersistentPortFailure);
    assert_eq!(report.attempts, 5);

    tick(KEY, &port, &clock);
    assert_eq!(engine(KEY).last_cycle_index, 1);
    assert!(port
        .submissions
        .borrow()
        .iter()
        .filter(|operation| operation.kind == OperationKind::Claim)
        .all(|operation| operation.id.cycle == 1));
}

#[test]
fn failed_reinvest_is_carried_before_the_next_claim() {
    let (port, clock) = deposited();
    port.script([Ok(())]);
    port.fail_times(5, PortError::Rejected("market paused".to_string()));

    for _ in 0..5 {
        tick(KEY, &port, &clock);
    }

    let state = engine(KEY);
    assert_eq!(state.status, EngineStatus::Waiting);
    assert_eq!(state.pending_reward, Some(U256::from(REWARD)));
    assert_eq!(state.last_cycle_index, 0);
    assert_eq!(state.last_error.unwrap().kind, ErrorKind::PersistentPortFailure);
    assert_eq!(records(KEY).len(), 1);

    port.submissions.borrow_mut().clear();
    assert_eq!(tick(KEY, &port, &clock), Some(NextTick::After(interval())));

    let submissions = port.submissions.borrow();
    assert_eq!(submissions.len(), 3);
    assert_eq!(submissions[0].kind, OperationKind::Supply);
    assert_eq!(submissions[0].id, OperationId { plan: KEY, cycle: 1, leg: Leg::Reinvest });
    assert_eq!(submissions[0].amount, Some(U256::from(REWARD - FEE)));
    assert_eq!(submissions[1].kind, OperationKind::Claim);
    assert_eq!(submissions[1].id.cycle, 2);
    assert_eq!(submissions[2].id, OperationId { plan: KEY, cycle: 2, leg: Leg::Reinvest });

    let indices: Vec<u64> = records(KEY).iter().map(|record| record.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
    assert_eq!(engine(KEY).pending_reward, None);
}

#[test]
fn revoked_authorization_fails_the_engine() {
    let (port, clock) = deposited();
    port.fail_times(1, PortError::Revoked("signing key revoked".to_string()));

    assert_eq!(tick(KEY, &port, &clock), Some(NextTick::Done));

    let state = engine(KEY);
    assert_eq!(state.status, EngineStatus::Failed);
    assert_ne!(state.status, EngineStatus::Terminated);
    assert_eq!(state.last_error.unwrap().kind, ErrorKind::ConfigurationFault);

    assert_eq!(tick(KEY, &port, &clock), Some(NextTick::Done));
    assert_eq!(port.submission_count(), 2);
}

#[test]
fn reward_below_fee_is_a_degenerate_cycle() {
    mint_plan(KEY);
    let port = ScriptedPort::new(FEE / 2);
    let clock = ManualClock::at(START);

    tick(KEY, &port, &clock);
    tick(KEY, &port, &clock);

    use OperationKind::*;
    assert_eq!(port.kinds(), vec![Supply, Claim]);

    let record = records(KEY).pop().unwrap();
    assert!(record.degenerate);
    assert_eq!(record.claimed_amount, U256::from(FEE / 2));
    assert_eq!(record.fee_paid, U256::from(FEE / 2));
    assert_eq!(record.reinvested_amount, U256::ZERO);
    assert_eq!(engine(KEY).last_cycle_index, 1);
}

#[test]
fn interrupted_claim_is_re_derived_from_the_port() {
    let (port, clock) = deposited();

    // A claim went through but its confirmation never reached the state
    let mut stable = plan(KEY).unwrap();
    stable.state.status(EngineStatus::Claiming);
    insert_plan(stable);
    port.remember(OperationId { plan: KEY, cycle: 1, leg: Leg::Claim }, U256::from(42_000));

    tick(KEY, &port, &clock);

    let record = records(KEY).pop().unwrap();
    assert_eq!(record.index, 1);
    assert_eq!(record.claimed_amount, U256::from(42_000));
    assert_eq!(record.reinvested_amount, U256::from(42_000 - FEE));
    assert!(journal_entries(Some(KEY))
        .iter()
        .any(|entry| entry.log_type == LogType::Recovery));
}

#[test]
fn recorded_cycle_is_finalized_without_resubmitting() {
    let (port, clock) = deposited();

    let mut stable = plan(KEY).unwrap();
    stable
        .state
        .status(EngineStatus::Reinvesting)
        .pending_reward(Some(U256::from(REWARD)));
    insert_plan(stable);
    append_cycle_record(KEY, CycleRecord::compound(1, U256::from(REWARD), U256::from(FEE), START));
    port.submissions.borrow_mut().clear();

    assert_eq!(tick(KEY, &port, &clock), Some(NextTick::After(interval())));

    assert_eq!(port.submission_count(), 0);
    let state = engine(KEY);
    assert_eq!(state.status, EngineStatus::Waiting);
    assert_eq!(state.last_cycle_index, 1);
    assert_eq!(state.pending_reward, None);
    assert_eq!(records(KEY).len(), 2);
}

#[test]
fn locked_plan_is_retried_later() {
    mint_plan(KEY);
    let mut stable = plan(KEY).unwrap();
    stable.lock.try_lock(START).unwrap();
    insert_plan(stable);

    let port = ScriptedPort::new(REWARD);
    let mut clock = MockClock::new();
    clock.expect_now().return_const(START + 1);

    assert_eq!(
        block_on(run_tick(KEY, &port, &clock)),
        Some(NextTick::After(Duration::from_secs(LOCK_CONTENTION_DELAY_SECS)))
    );
    assert_eq!(port.submission_count(), 0);
    assert_eq!(engine(KEY).status, EngineStatus::Idle);
    assert!(plan(KEY).unwrap().lock.is_locked);
}

#[test]
fn unknown_plan_is_not_driven() {
    let port = ScriptedPort::new(REWARD);
    let mut clock = MockClock::new();
    clock.expect_now().return_const(START);

    assert_eq!(block_on(run_tick(77, &port, &clock)), None);
    let entries = journal_entries(Some(77));
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry, Err(CompounderError::NonExistentValue));
}

#[test]
fn replaying_a_plan_yields_identical_records() {
    let replay = || {
        thread::spawn(|| {
            mint_plan(KEY);
            let port = ScriptedPort::new(REWARD);
            let clock = ManualClock::at(START);
            port.script([Ok(()), Err(PortError::Timeout), Ok(()), Ok(())]);
            run_ticks(KEY, &port, &clock, 8);
            let operations = port.submissions.borrow().clone();
            (records(KEY), operations)
        })
        .join()
        .unwrap()
    };

    let (first_records, first_operations) = replay();
    let (second_records, second_operations) = replay();

    assert_eq!(first_records.len(), 7);
    assert_eq!(first_records, second_records);
    assert_eq!(first_operations, second_operations);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn records_stay_balanced_and_ordered(
        failures in proptest::collection::vec(any::<bool>(), 0..40),
        reward in 0u64..5 * FEE,
    ) {
        let key = next_plan_key();
        mint_plan(key);
        let port = ScriptedPort::new(reward);
        let clock = ManualClock::at(START);
        port.script(failures.into_iter().map(|fail| {
            if fail {
                Err(PortError::Rejected("flaky".to_string()))
            } else {
                Ok(())
            }
        }));

        run_ticks(key, &port, &clock, 60);

        let records = records(key);
        for (position, record) in records.iter().enumerate() {
            prop_assert_eq!(record.index, position as u64);
            prop_assert!(record.is_balanced());
        }

        let state = engine(key);
        prop_assert!(state.status != EngineStatus::Terminated);
        if state.status == EngineStatus::Failed {
            prop_assert_eq!(state.last_error.unwrap().kind, ErrorKind::InitialSupplyFailed);
            prop_assert!(records.is_empty());
        } else {
            prop_assert_eq!(state.last_cycle_index + 1, records.len() as u64);
        }
    }
}
