//! Call message types for the key-share module.

use borsh::{BorshDeserialize, BorshSerialize};

/// Transactions a validator can send to the module.
///
/// Points travel as raw compressed bytes so that a bad encoding is rejected
/// by the handler with `MalformedPoint` rather than at deserialization.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum KeyShareCall {
    /// Join the committee with a fresh Shamir index.
    RegisterValidator { index: u32 },

    /// Submit the sender's key share for `height`.
    SubmitKeyShare {
        height: u64,
        index: u32,
        /// Compressed G2 share (96 bytes)
        share: Vec<u8>,
        /// Compressed G1 commitment (48 bytes)
        commitment: Vec<u8>,
    },
}
