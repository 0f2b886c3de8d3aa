//! Events surfaced to the host chain after each block pass.

use serde::{Deserialize, Serialize};

use keyshare_types::{Address, G2Point, SlashRequest};

/// Why a validator left the committee.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalReason {
    /// Staking status is no longer bonded
    NotBonded,
    /// Validator is absent from the host validator set
    NotInValidatorSet,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyShareEvent {
    ValidatorRemoved {
        validator: Address,
        index: u32,
        reason: RemovalReason,
    },

    SlashRequested(SlashRequest),

    /// Slash could not be requested; the validator was still processed otherwise
    SlashSkipped { validator: Address, reason: String },

    ShareExcluded {
        height: u64,
        validator: Address,
        index: u32,
        reason: String,
    },

    KeyAggregated {
        height: u64,
        key: G2Point,
        shares: usize,
    },

    AggregationFailed {
        height: u64,
        reason: String,
        fatal: bool,
    },

    SharesPruned { below: u64, count: usize },

    KeysPruned { below: u64, count: usize },
}
