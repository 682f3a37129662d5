//! Operational journal
//!
//! Every tick opens a [`JournalCollection`], appends notes while it runs and commits
//! them to the canister journal when the collection is closed or dropped.

use candid::CandidType;
use serde::Deserialize;

use crate::{state::insert_journal_entries, utils::error::CompounderResult};

/// Category of a journal entry
#[derive(Clone, Copy, CandidType, Debug, Deserialize, PartialEq, Eq)]
pub enum LogType {
    Info,
    /// The engine changed status
    Transition,
    /// An operation was submitted to the market
    Submission,
    /// A cycle record was appended
    CycleRecorded,
    /// Interrupted work was picked up after a restart
    Recovery,
    /// A non-retryable failure
    Failure,
}

/// Journal entry
#[derive(Clone, CandidType, Debug, Deserialize)]
pub struct JournalEntry {
    /// Seconds
    pub timestamp: u64,
    pub entry: CompounderResult<()>,
    pub plan_key: Option<u32>,
    pub cycle: Option<u64>,
    pub log_type: LogType,
    pub note: Option<String>,
}

/// Entries of one tick, committed together
pub struct JournalCollection {
    plan_key: Option<u32>,
    cycle: Option<u64>,
    timestamp: u64,
    entries: Vec<JournalEntry>,
}

impl JournalCollection {
    /// Opens a collection for the given plan
    pub fn open(plan_key: Option<u32>, timestamp: u64) -> Self {
        Self {
            plan_key,
            cycle: None,
            timestamp,
            entries: vec![],
        }
    }

    /// Tags subsequent entries with a cycle index
    pub fn cycle(&mut self, cycle: u64) -> &mut Self {
        self.cycle = Some(cycle);
        self
    }

    /// Appends an entry with a note
    pub fn append_note<S: AsRef<str>>(
        &mut self,
        entry: CompounderResult<()>,
        log_type: LogType,
        note: S,
    ) -> &mut Self {
        self.entries.push(JournalEntry {
            timestamp: self.timestamp,
            entry,
            plan_key: self.plan_key,
            cycle: self.cycle,
            log_type,
            note: Some(note.as_ref().to_string()),
        });
        self
    }

    #[cfg(test)]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Commits the collected entries to the journal
    pub fn close(mut self) {
        self.commit();
    }

    fn commit(&mut self) {
        if !self.entries.is_empty() {
            insert_journal_entries(std::mem::take(&mut self.entries));
        }
    }
}

impl Drop for JournalCollection {
    fn drop(&mut self) {
        self.commit();
    }
}
