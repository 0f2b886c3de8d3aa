//! Genesis configuration for the key-share module.
//!
//! Holds the chain-level parameters the module runs with: the reconstruction
//! threshold, the fixed IBE identity, slashing and aggregation policy, and the
//! committee present at chain start.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use keyshare_types::{Address, G1Point, SlashFraction};

/// Identity used when none is configured.
pub const DEFAULT_IDENTITY: &str = "keyshare/ibe-identity/v1";

/// Genesis configuration for the key-share module.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyShareConfig {
    /// Minimum number of valid shares required to aggregate
    pub threshold: u32,

    /// Public identity every aggregated key is bound to
    pub identity: String,

    #[serde(default)]
    pub slashing: SlashingParams,

    #[serde(default)]
    pub aggregation: AggregationParams,

    /// Optional master public key s·G1; aggregated keys are checked against it
    #[serde(default)]
    pub master_public_key: Option<G1Point>,

    /// Committee present at chain start
    #[serde(default)]
    pub validators: Vec<CommitteeRegistration>,
}

/// A validator's committee seat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeRegistration {
    pub address: Address,
    /// Shamir index (1-based)
    pub index: u32,
}

/// Penalty applied to validators found unbonded.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SlashingParams {
    pub fraction: SlashFraction,
    /// Voting power passed along with the slash request
    pub power: u64,
    /// Blocks between the processing height and the infraction height
    pub delay_blocks: u64,
    /// Only slash validators at the pass that removes them from the committee
    pub only_on_removal: bool,
}

/// When and how keys are aggregated.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationParams {
    /// Aggregate at heights divisible by `interval`; 0 disables aggregation
    pub interval: u64,
    /// Keep shares for this many blocks below the processed height
    pub share_retention: Option<u64>,
    /// Consecutive shortfalls after which each further shortfall is logged as a warning
    pub shortfall_alert_after: u64,
}

impl Default for SlashingParams {
    fn default() -> Self {
        Self {
            fraction: SlashFraction(100), // 1%
            power: 10,
            delay_blocks: 1,
            only_on_removal: false,
        }
    }
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self {
            interval: 1,
            share_retention: None,
            shortfall_alert_after: 100,
        }
    }
}

impl AggregationParams {
    /// Whether aggregation runs at `height`.
    pub fn is_scheduled(&self, height: u64) -> bool {
        self.interval != 0 && height % self.interval == 0
    }

    /// Lowest height whose shares survive pruning after processing `height`.
    pub fn retention_floor(&self, height: u64) -> Option<u64> {
        self.share_retention
            .and_then(|keep| height.checked_sub(keep))
            .filter(|floor| *floor > 0)
    }
}

impl Default for KeyShareConfig {
    fn default() -> Self {
        Self {
            threshold: 2,
            identity: DEFAULT_IDENTITY.to_string(),
            slashing: SlashingParams::default(),
            aggregation: AggregationParams::default(),
            master_public_key: None,
            validators: Vec::new(),
        }
    }
}

impl KeyShareConfig {
    /// Identity as bytes.
    pub fn identity_bytes(&self) -> &[u8] {
        self.identity.as_bytes()
    }

    /// Validate the genesis configuration.
    pub fn validate(&self) -> Result<(), GenesisValidationError> {
        if self.threshold == 0 {
            return Err(GenesisValidationError::InvalidThreshold(
                "Threshold cannot be zero".into(),
            ));
        }

        if self.identity.is_empty() {
            return Err(GenesisValidationError::EmptyIdentity);
        }

        if !self.slashing.fraction.is_valid() {
            return Err(GenesisValidationError::InvalidSlashFraction(
                self.slashing.fraction.0,
            ));
        }

        let mut addresses = HashSet::new();
        let mut indices = HashSet::new();
        for registration in &self.validators {
            if registration.index == 0 {
                return Err(GenesisValidationError::InvalidIndex(0));
            }
            if !indices.insert(registration.index) {
                return Err(GenesisValidationError::InvalidIndex(registration.index));
            }
            if !addresses.insert(registration.address) {
                return Err(GenesisValidationError::DuplicateValidator(hex::encode(
                    registration.address,
                )));
            }
        }

        Ok(())
    }
}

/// Errors that can occur during genesis validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenesisValidationError {
    #[error("Invalid threshold configuration: {0}")]
    InvalidThreshold(String),

    #[error("Identity cannot be empty")]
    EmptyIdentity,

    #[error("Slash fraction {0} bps exceeds 10000")]
    InvalidSlashFraction(u32),

    #[error("Invalid or duplicate share index {0}")]
    InvalidIndex(u32),

    #[error("Duplicate validator {0}")]
    DuplicateValidator(String),
}
