//! Common utility and helper functions that are used across the project

use alloy_primitives::{I256, U256};
use candid::{Nat, Principal};
use ic_exports::ic_cdk::api::{call::CallResult, is_controller};
use num_bigint::BigUint;

use super::error::*;

/// Returns Err if the `caller` is not a controller of the canister
pub fn only_controller(caller: Principal) -> CompounderResult<()> {
    if !is_controller(&caller) {
        // only the controller should be able to call this function
        return Err(CompounderError::Unauthorized);
    }
    Ok(())
}

/// Converts values of type `Nat` to `U256`
pub fn nat_to_u256(n: &Nat) -> CompounderResult<U256> {
    let be_bytes = n.0.to_bytes_be();
    if be_bytes.len() > 32 {
        return Err(CompounderError::DecodingError(
            "The `Nat` input exceeds 32 bytes in its big-endian representation.".to_string(),
        ));
    }
    // Ensure the byte array is exactly 32 bytes long
    let mut padded_bytes = [0u8; 32];
    let start_pos = 32 - be_bytes.len();
    padded_bytes[start_pos..].copy_from_slice(&be_bytes);

    Ok(U256::from_be_bytes(padded_bytes))
}

/// Converts values of type `U256` to `Nat`
pub fn u256_to_nat(value: &U256) -> Nat {
    Nat::from(BigUint::from_bytes_be(&value.to_be_bytes::<32>()))
}

/// Parses a base-10 amount, e.g. a principal denominated in base units
pub fn string_to_u256(input: &str) -> CompounderResult<U256> {
    U256::from_str_radix(input.trim(), 10)
        .map_err(|err| invalid_input(format!("Could not parse amount {:?}: {}", input, err)))
}

/// Parses a base-10 signed fixed-point value, e.g. an annual rate scaled by 10^18
pub fn string_to_i256(input: &str) -> CompounderResult<I256> {
    I256::from_dec_str(input.trim())
        .map_err(|err| invalid_input(format!("Could not parse rate {:?}: {}", input, err)))
}

/// Extracts the Ok or Err values of a canister call and returns them.
pub fn extract_call_result<T>(result: CallResult<(T,)>) -> CompounderResult<T> {
    result
        .map(|(success_value,)| success_value)
        .map_err(|(rejection_code, error_message)| {
            CompounderError::CallResult(rejection_code, error_message)
        })
}
