//! Key-share module error types.

use thiserror::Error;

use keyshare_crypto::{CryptoError, CurveGroup};

/// Errors returned to the sender of a registration or submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyShareError {
    #[error("Malformed {0} point encoding")]
    MalformedPoint(CurveGroup),

    #[error("Validator {validator} already submitted a different share for height {height}")]
    DuplicateShare { height: u64, validator: String },

    #[error("Validator {0} is not a committee member")]
    UnknownValidator(String),

    #[error("Validator {validator} is registered with index {registered}, got {submitted}")]
    IndexMismatch {
        validator: String,
        registered: u32,
        submitted: u32,
    },

    #[error("Validator {0} is already a committee member")]
    AlreadyRegistered(String),

    #[error("Validator {0} is not bonded")]
    NotBonded(String),

    #[error("Share index {0} is assigned or retired")]
    IndexUnavailable(u32),

    #[error("Share index 0 is reserved")]
    InvalidShareIndex,

    #[error(transparent)]
    Crypto(CryptoError),
}

impl From<CryptoError> for KeyShareError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::MalformedPoint(group) => KeyShareError::MalformedPoint(group),
            CryptoError::InvalidShareIndex => KeyShareError::InvalidShareIndex,
            other => KeyShareError::Crypto(other),
        }
    }
}

/// Errors from a single aggregation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregationError {
    #[error("Insufficient valid shares at height {height}: need {required}, got {got}")]
    InsufficientShares {
        height: u64,
        required: usize,
        got: usize,
    },

    #[error("Aggregated key at height {height} does not match the master public key")]
    MasterKeyMismatch { height: u64 },

    #[error("Corrupt key-share state: {0}")]
    CorruptState(String),
}

impl AggregationError {
    /// Whether this signals a broken invariant rather than a transient shortfall.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AggregationError::CorruptState(_))
    }
}

/// Errors from the per-block driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("Block height {got} does not follow last processed height {last}")]
    NonMonotonicHeight { last: u64, got: u64 },
}
