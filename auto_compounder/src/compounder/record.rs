//! Append-only cycle log entries

use std::borrow::Cow;

use alloy_primitives::U256;
use ic_stable_structures::{storable::Bound, Storable};
use serde::{Deserialize, Serialize};

/// Outcome of one cycle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub index: u64,
    pub claimed_amount: U256,
    pub fee_paid: U256,
    pub reinvested_amount: U256,
    /// Seconds
    pub timestamp: u64,
    /// The reward did not exceed the fee, nothing was supplied
    pub degenerate: bool,
}

impl CycleRecord {
    /// Record of the initial supply (cycle 0)
    pub fn deposit(principal: U256, timestamp: u64) -> Self {
        Self {
            index: 0,
            claimed_amount: U256::ZERO,
            fee_paid: U256::ZERO,
            reinvested_amount: principal,
            timestamp,
            degenerate: false,
        }
    }

    /// Record of a compounding cycle.
    ///
    /// The fee is clamped to the claimed amount so that
    /// `reinvested_amount + fee_paid == claimed_amount` always holds.
    pub fn compound(index: u64, claimed_amount: U256, fee: U256, timestamp: u64) -> Self {
        let fee_paid = fee.min(claimed_amount);
        let reinvested_amount = claimed_amount - fee_paid;

        Self {
            index,
            claimed_amount,
            fee_paid,
            reinvested_amount,
            timestamp,
            degenerate: reinvested_amount.is_zero(),
        }
    }

    /// `reinvested_amount + fee_paid == claimed_amount`, deposits excluded
    pub fn is_balanced(&self) -> bool {
        self.index == 0
            || self.reinvested_amount.checked_add(self.fee_paid) == Some(self.claimed_amount)
    }
}

impl Storable for CycleRecord {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(serde_json::to_vec(self).expect("cycle record serializes to JSON"))
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        serde_json::from_slice(bytes.as_ref()).expect("cycle record deserializes from JSON")
    }

    const BOUND: Bound = Bound::Unbounded;
}

/// Key of a record in the stable log: plan key, then cycle index.
/// Encoded big-endian so that the map iterates in cycle order per plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecordKey {
    pub plan: u32,
    pub index: u64,
}

impl Storable for RecordKey {
    fn to_bytes(&self) -> Cow<[u8]> {
        let mut bytes = Vec::with_capacity(12);
        bytes.extend_from_slice(&self.plan.to_be_bytes());
        bytes.extend_from_slice(&self.index.to_be_bytes());
        Cow::Owned(bytes)
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        let mut plan = [0u8; 4];
        let mut index = [0u8; 8];
        plan.copy_from_slice(&bytes[..4]);
        index.copy_from_slice(&bytes[4..12]);
        Self {
            plan: u32::from_be_bytes(plan),
            index: u64::from_be_bytes(index),
        }
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: 12,
        is_fixed_size: true,
    };
}
