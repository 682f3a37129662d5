//! Compounding plan and scheduler settings

use std::time::Duration;

use alloy_primitives::{I256, U256};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{signed_scale, DEFAULT_PORT_TIMEOUT_SECS, SECONDS_PER_YEAR},
    rate::annualized_compounded_rate_with_fee,
    utils::{
        error::{invalid_input, CompounderResult},
        retry::RetryPolicy,
    },
};

/// Immutable configuration of one compounding engagement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundingPlan {
    principal: U256,
    annual_rate: I256,
    frequency: u32,
    fee_per_operation: U256,
}

impl CompoundingPlan {
    /// Validates and creates a plan.
    ///
    /// # Errors
    /// `InvalidInput` if the principal or frequency is zero, the rate is at or below
    /// -100%, or a single fee would eat the whole principal.
    pub fn new(
        principal: U256,
        annual_rate: I256,
        frequency: u32,
        fee_per_operation: U256,
    ) -> CompounderResult<Self> {
        if principal.is_zero() {
            return Err(invalid_input("Principal must be positive."));
        }
        if frequency == 0 {
            return Err(invalid_input("Frequency must be positive."));
        }
        if annual_rate <= -signed_scale() {
            return Err(invalid_input("Annual rate must be greater than -100%."));
        }
        if fee_per_operation >= principal {
            return Err(invalid_input(
                "The fee per operation must be smaller than the principal.",
            ));
        }

        Ok(Self {
            principal,
            annual_rate,
            frequency,
            fee_per_operation,
        })
    }

    pub fn principal(&self) -> U256 {
        self.principal
    }

    pub fn annual_rate(&self) -> I256 {
        self.annual_rate
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn fee_per_operation(&self) -> U256 {
        self.fee_per_operation
    }

    /// Time between two cycles: one year divided by the frequency, at least a second
    pub fn interval(&self) -> Duration {
        Duration::from_secs((SECONDS_PER_YEAR / u64::from(self.frequency)).max(1))
    }

    /// Effective annualized rate of this plan, rounded to two decimals
    pub fn effective_rate(&self) -> CompounderResult<I256> {
        annualized_compounded_rate_with_fee(
            self.principal,
            self.annual_rate,
            self.frequency,
            self.fee_per_operation,
        )
    }
}

/// Settings of the scheduler driving a plan.
/// These settings are only set once when the plan is minted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Key of the plan in `PLANS`
    pub key: u32,
    /// Retry budget of every submission leg
    pub retry_policy: RetryPolicy,
    /// Timeout passed along with every port call
    pub port_timeout: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            key: 0,
            retry_policy: RetryPolicy::default(),
            port_timeout: Duration::from_secs(DEFAULT_PORT_TIMEOUT_SECS),
        }
    }
}

impl SchedulerSettings {
    /// Sets the key for the plan.
    pub fn key(&mut self, key: u32) -> &mut Self {
        self.key = key;
        self
    }

    /// Sets the maximum number of attempts per submission leg.
    pub fn max_attempts(&mut self, max_attempts: u8) -> &mut Self {
        self.retry_policy.max_attempts = max_attempts;
        self
    }

    /// Sets the timeout of a single port call.
    pub fn port_timeout(&mut self, port_timeout: Duration) -> &mut Self {
        self.port_timeout = port_timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::SCALE, utils::error::CompounderError};
    use proptest::prelude::*;

    fn rate(percent: i64) -> I256 {
        I256::try_from(percent).unwrap() * I256::try_from(SCALE / 100).unwrap()
    }

    #[test]
    fn rejects_invalid_plans() {
        let cases = [
            (U256::ZERO, rate(10), 12, U256::ZERO),
            (U256::from(1_000), rate(10), 0, U256::ZERO),
            (U256::from(1_000), rate(-100), 12, U256::ZERO),
            (U256::from(1_000), rate(10), 12, U256::from(1_000)),
        ];

        for (principal, annual_rate, frequency, fee) in cases {
            assert!(matches!(
                CompoundingPlan::new(principal, annual_rate, frequency, fee),
                Err(CompounderError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn interval_is_a_fraction_of_the_year() {
        let monthly = CompoundingPlan::new(U256::from(1_000_000), rate(5), 12, U256::from(1)).unwrap();
        assert_eq!(monthly.interval(), Duration::from_secs(2_628_000));

        let hourly = CompoundingPlan::new(U256::from(1_000_000), rate(5), 8_760, U256::from(1)).unwrap();
        assert_eq!(hourly.interval(), Duration::from_secs(3_600));

        let absurd = CompoundingPlan::new(U256::from(1_000_000), rate(5), u32::MAX, U256::ZERO).unwrap();
        assert_eq!(absurd.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_scheduler_settings_setters() {
        let mut settings = SchedulerSettings::default();
        settings
            .key(7)
            .max_attempts(3)
            .port_timeout(Duration::from_secs(10));

        assert_eq!(settings.key, 7);
        assert_eq!(settings.retry_policy.max_attempts, 3);
        assert_eq!(settings.retry_policy.base_delay, RetryPolicy::default().base_delay);
        assert_eq!(settings.port_timeout, Duration::from_secs(10));
    }

    proptest! {
        #[test]
        fn valid_plans_keep_their_inputs(
            principal in 2u64..u64::MAX,
            percent in 0i64..=1_000,
            frequency in 1u32..=525_600,
        ) {
            let fee = U256::from(principal / 2);
            let plan = CompoundingPlan::new(U256::from(principal), rate(percent), frequency, fee).unwrap();
            prop_assert_eq!(plan.principal(), U256::from(principal));
            prop_assert_eq!(plan.annual_rate(), rate(percent));
            prop_assert_eq!(plan.frequency(), frequency);
            prop_assert_eq!(plan.fee_per_operation(), fee);
        }
    }
}
