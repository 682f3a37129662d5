use std::time::Duration;

use crate::{
    constants::LOCK_CONTENTION_DELAY_SECS,
    journal::{JournalCollection, LogType},
    port::TransactionPort,
    state::{plan, termination_signal},
    utils::{clock::Clock, error::CompounderError},
};

use super::executable::{CompoundScheduler, NextTick};

/// Runs one tick of the plan stored under `key`.
///
/// Returns when the plan wants its next tick, or `None` if there is nothing to drive.
pub async fn run_tick<P: TransactionPort, C: Clock>(
    key: u32,
    port: &P,
    clock: &C,
) -> Option<NextTick> {
    let now = clock.now();
    let mut journal = JournalCollection::open(Some(key), now);

    let Some(stable) = plan(key) else {
        journal.append_note(
            Err(CompounderError::NonExistentValue),
            LogType::Info,
            "This plan key was not found in the state. The tick could not be started.",
        );
        return None;
    };

    let mut scheduler = CompoundScheduler::new(&stable, termination_signal(key));

    let outcome = scheduler.execute(port, now, &mut journal).await;
    match outcome {
        Ok(next) => Some(next),
        Err(CompounderError::Locked) => {
            journal.append_note(
                Err(CompounderError::Locked),
                LogType::Info,
                "Another tick of this plan is in flight. Retrying later.",
            );
            Some(NextTick::After(Duration::from_secs(LOCK_CONTENTION_DELAY_SECS)))
        }
        Err(error) => {
            journal.append_note(Err(error), LogType::Failure, "The tick could not be executed.");
            None
        }
    }

    // The scheduler goes out of scope by this line in any way possible.
    // When it does, Drop is called and the plan is unlocked.
}
