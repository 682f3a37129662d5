//! Periodic maintenance of canister state.

use crate::{
    journal::{JournalCollection, LogType},
    state::prune_journal,
    utils::clock::{Clock, IcClock},
};

/// Keeps the journal within its size limit and notes what was removed.
pub fn daily_cleanup() {
    let mut journal = JournalCollection::open(None, IcClock.now());
    journal_cleanup(&mut journal);
    journal.append_note(Ok(()), LogType::Info, "Finished the cleanup successfully.");
}

/// Drops the oldest journal entries and notes how many were dropped.
pub fn journal_cleanup(journal: &mut JournalCollection) -> usize {
    let removed = prune_journal();
    journal.append_note(
        Ok(()),
        LogType::Info,
        format!("Cleaned up the journal by removing {} excess entries.", removed),
    );
    removed
}
