//! Effective annualized rate of a compounding plan
//!
//! ```plain
//! effective = (1 + r/n)^n - fee * n / principal - 1
//! ```
//!
//! `r` is the nominal annual rate, `n` the number of compounding cycles per year and
//! `fee` the cost of one cycle in the same base unit as `principal`. One fee is counted
//! per cycle: only the reinvesting supply pays it, the claim and the initial deposit
//! are free in this model.
//!
//! All values are fixed point numbers scaled by [`SCALE`](crate::constants::SCALE).
//! The reported rate is rounded to two decimals with round-half-to-even applied to
//! the exact fixed point value, so `0.005` becomes `0.00` and `0.015` becomes `0.02`.

use alloy_primitives::{I256, U256};
use candid::CandidType;
use serde::{Deserialize, Serialize};

use crate::{
    constants::{default_fee_per_operation, rate_precision, scale, signed_scale, SECONDS_PER_YEAR},
    utils::error::{arithmetic_err, invalid_input, CompounderResult},
};

/// Compounding frequencies an operator can pick from
#[derive(Clone, Copy, Debug, PartialEq, Eq, CandidType, Deserialize, Serialize)]
pub enum Frequency {
    EveryMinute,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 6] = [
        Frequency::EveryMinute,
        Frequency::Hourly,
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Yearly,
    ];

    /// Number of compounding cycles per year
    pub fn times_per_year(&self) -> u32 {
        match self {
            Frequency::EveryMinute => (SECONDS_PER_YEAR / 60) as u32,
            Frequency::Hourly => 8_760,
            Frequency::Daily => 365,
            Frequency::Weekly => 52,
            Frequency::Monthly => 12,
            Frequency::Yearly => 1,
        }
    }
}

/// Effective annualized rate with the default fee, rounded to two decimals.
pub fn annualized_compounded_rate(
    principal: U256,
    annual_rate: I256,
    frequency: u32,
) -> CompounderResult<I256> {
    annualized_compounded_rate_with_fee(
        principal,
        annual_rate,
        frequency,
        default_fee_per_operation(),
    )
}

/// Effective annualized rate for an arbitrary per-cycle fee, rounded to two decimals.
pub fn annualized_compounded_rate_with_fee(
    principal: U256,
    annual_rate: I256,
    frequency: u32,
    fee_per_operation: U256,
) -> CompounderResult<I256> {
    let exact = effective_rate(principal, annual_rate, frequency, fee_per_operation)?;
    round_half_even(exact, rate_precision())
}

/// Unrounded effective annualized rate.
pub fn effective_rate(
    principal: U256,
    annual_rate: I256,
    frequency: u32,
    fee_per_operation: U256,
) -> CompounderResult<I256> {
    if principal.is_zero() {
        return Err(invalid_input("Principal must be positive."));
    }
    if frequency == 0 {
        return Err(invalid_input("Frequency must be positive."));
    }
    if annual_rate <= -signed_scale() {
        return Err(invalid_input("Annual rate must be greater than -100%."));
    }

    let growth = compounding_growth(annual_rate, frequency)?;
    let drag = fee_drag(principal, frequency, fee_per_operation)?;

    let growth = I256::try_from(growth).map_err(|_| arithmetic_err("Compounding growth overflowed I256."))?;
    let drag = I256::try_from(drag).map_err(|_| arithmetic_err("Fee drag overflowed I256."))?;

    growth
        .checked_sub(drag)
        .and_then(|value| value.checked_sub(signed_scale()))
        .ok_or(arithmetic_err("Effective rate underflowed I256."))
}

/// `(1 + r/n)^n`, scaled.
pub fn compounding_growth(annual_rate: I256, frequency: u32) -> CompounderResult<U256> {
    let periods = I256::try_from(frequency).map_err(|_| arithmetic_err("Frequency does not fit I256."))?;
    let periodic = annual_rate
        .checked_div(periods)
        .ok_or(arithmetic_err("Division by a zero frequency."))?;
    let base = signed_scale()
        .checked_add(periodic)
        .ok_or(arithmetic_err("Periodic growth factor overflowed."))?;

    if !base.is_positive() {
        return Err(invalid_input("Periodic growth factor must stay positive."));
    }

    fixed_pow(base.into_raw(), frequency)
}

/// `fee * n / principal`, scaled.
pub fn fee_drag(principal: U256, frequency: u32, fee_per_operation: U256) -> CompounderResult<U256> {
    fee_per_operation
        .checked_mul(U256::from(frequency))
        .and_then(|fees| fees.checked_mul(scale()))
        .ok_or(arithmetic_err("Fee drag numerator overflowed."))?
        .checked_div(principal)
        .ok_or(arithmetic_err("Principal was 0."))
}

/// Picks the candidate frequency with the highest effective rate.
/// Ties resolve to the lower frequency, since fewer cycles mean fewer transactions.
pub fn suggest_frequency(
    principal: U256,
    annual_rate: I256,
    fee_per_operation: U256,
    candidates: &[Frequency],
) -> CompounderResult<Option<(Frequency, I256)>> {
    let mut best: Option<(Frequency, I256)> = None;

    for candidate in candidates {
        let rate = effective_rate(
            principal,
            annual_rate,
            candidate.times_per_year(),
            fee_per_operation,
        )?;

        best = match best {
            Some((current, current_rate))
                if current_rate > rate
                    || (current_rate == rate
                        && current.times_per_year() <= candidate.times_per_year()) =>
            {
                Some((current, current_rate))
            }
            _ => Some((*candidate, rate)),
        };
    }

    Ok(best)
}

/// Raises a scaled value to an integer power by squaring.
/// Every product is truncated back to the scale.
fn fixed_pow(mut base: U256, mut exponent: u32) -> CompounderResult<U256> {
    let mut result = scale();

    while exponent > 0 {
        if exponent & 1 == 1 {
            result = mul_scaled(result, base)?;
        }
        exponent >>= 1;
        if exponent > 0 {
            base = mul_scaled(base, base)?;
        }
    }

    Ok(result)
}

fn mul_scaled(a: U256, b: U256) -> CompounderResult<U256> {
    a.checked_mul(b)
        .map(|product| product / scale())
        .ok_or(arithmetic_err("Fixed point multiplication overflowed."))
}

/// Rounds a scaled value to a multiple of `unit`, ties to even.
/// Negative values are rounded symmetrically.
pub fn round_half_even(value: I256, unit: U256) -> CompounderResult<I256> {
    if unit.is_zero() {
        return Err(arithmetic_err("Rounding unit was 0."));
    }

    let magnitude = value.unsigned_abs();
    let mut quotient = magnitude / unit;
    let remainder = magnitude % unit;
    let twice_remainder = remainder * U256::from(2);

    if twice_remainder > unit || (twice_remainder == unit && quotient.bit(0)) {
        quotient += U256::from(1);
    }

    let rounded = quotient
        .checked_mul(unit)
        .ok_or(arithmetic_err("Rounded value overflowed."))?;
    let rounded = I256::try_from(rounded).map_err(|_| arithmetic_err("Rounded value overflowed I256."))?;

    Ok(if value.is_negative() { -rounded } else { rounded })
}
