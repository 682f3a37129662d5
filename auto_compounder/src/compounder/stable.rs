//! Persisted form of a plan

use std::borrow::Cow;

use ic_stable_structures::{storable::Bound, Storable};
use serde::{Deserialize, Serialize};

use crate::{
    state::PLAN_STATE,
    utils::error::{CompounderError, CompounderResult},
};

use super::{data::EngineState, lock::Lock, plan::CompoundingPlan, plan::SchedulerSettings};

/// Plan, settings, engine state and lock, stored as one value so that a state
/// change is a single write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StablePlan {
    /// Immutable settings and configurations
    pub settings: SchedulerSettings,
    /// Immutable compounding parameters
    pub plan: CompoundingPlan,
    /// Mutable state
    pub state: EngineState,
    /// Determines if a tick of this plan is currently being executed.
    pub lock: Lock,
}

impl StablePlan {
    pub fn new(settings: SchedulerSettings, plan: CompoundingPlan) -> Self {
        Self {
            settings,
            plan,
            state: EngineState::default(),
            lock: Lock::default(),
        }
    }

    /// Set the engine state
    pub fn state(&mut self, state: EngineState) -> &mut Self {
        self.state = state;
        self
    }

    /// Mint the plan by adding it to the state
    /// "Minting" here means registering the plan in a persistent state.
    pub fn mint(&self) -> CompounderResult<()> {
        PLAN_STATE.with(|plans| {
            let mut binding = plans.borrow_mut();
            // Ensure that we do not overwrite an existing plan with the same key
            if binding.contains_key(&self.settings.key) {
                return Err(CompounderError::Custom(
                    "This plan key is already minted.".to_string(),
                ));
            }
            binding.insert(self.settings.key, self.clone());
            Ok(())
        })
    }
}

impl Storable for StablePlan {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(serde_json::to_vec(self).expect("stable plan serializes to JSON"))
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        serde_json::from_slice(bytes.as_ref()).expect("stable plan deserializes from JSON")
    }

    const BOUND: Bound = Bound::Unbounded;
}
