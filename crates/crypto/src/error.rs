//! Error types for cryptographic operations.

use std::fmt;

use thiserror::Error;

/// The two pairing groups a point can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveGroup {
    /// Commitment group (G1)
    Commitment,
    /// Share group (G2)
    Share,
}

impl fmt::Display for CurveGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveGroup::Commitment => f.write_str("commitment (G1)"),
            CurveGroup::Share => f.write_str("share (G2)"),
        }
    }
}

/// Errors that can occur during cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Malformed {0} point encoding")]
    MalformedPoint(CurveGroup),

    #[error("Key share with index {index} does not match its commitment")]
    InvalidShare { index: u32 },

    #[error("Insufficient threshold shares: need {required}, got {got}")]
    InsufficientShares { required: usize, got: usize },

    #[error("Duplicate share index {0}")]
    DuplicateShareIndex(u32),

    #[error("Invalid share index")]
    InvalidShareIndex,

    #[error("Lagrange interpolation failed")]
    LagrangeInterpolationFailed,

    #[error("Aggregated key does not match the master public key")]
    MasterKeyMismatch,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Invalid ciphertext format")]
    InvalidCiphertextFormat,

    #[error("Key derivation failed")]
    KeyDerivationFailed,
}
