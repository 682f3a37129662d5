use candid::CandidType;
use ic_exports::ic_kit::RejectionCode;
use serde::Deserialize;

/// Auto Compounder Canister Result
pub type CompounderResult<T> = Result<T, CompounderError>;

/// Auto Compounder Canister Errors
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq)]
pub enum CompounderError {
    /// Non-positive principal or frequency, or any other malformed input.
    /// Never retried.
    InvalidInput(String),
    /// Timeout or temporary submission error reported by the transaction port
    TransientPortFailure(String),
    /// The retry budget of a claim or reinvest leg is exhausted
    PersistentPortFailure { operation: String, attempts: u8 },
    /// The retry budget of the initial supply is exhausted
    InitialSupplyFailed { attempts: u8 },
    /// Non-retryable fault, e.g. revoked authorization
    ConfigurationFault(String),
    /// `CallResult` error
    CallResult(RejectionCode, String),
    /// Unauthorized access
    Unauthorized,
    /// A requested value does not exist
    NonExistentValue,
    /// Decoding issue
    DecodingError(String),
    /// Plan is locked
    Locked,
    /// Arithmetic error
    Arithmetic(String),
    /// Unknown/Custom error
    Custom(String),
}

pub fn arithmetic_err<S: AsRef<str>>(s: S) -> CompounderError {
    CompounderError::Arithmetic(format!("{:#?}", s.as_ref()))
}

pub fn invalid_input<S: AsRef<str>>(s: S) -> CompounderError {
    CompounderError::InvalidInput(s.as_ref().to_string())
}
