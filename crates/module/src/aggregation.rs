//! Threshold aggregation of the key shares stored for one height.

use tracing::{debug, warn};

use keyshare_crypto::threshold::verify_key_share;
use keyshare_crypto::{combine_key_shares, verify_aggregated_key, Bls12, CryptoError, PairingBackend};
use keyshare_types::{AggregatedKey, Address};

use crate::error::AggregationError;
use crate::genesis::KeyShareConfig;
use crate::state::KeyShareState;

/// A stored share left out of the aggregate because it failed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedShare {
    pub validator: Address,
    pub index: u32,
    pub reason: CryptoError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationReport {
    pub key: AggregatedKey,
    /// Shares rejected by the pairing check; empty when served from cache
    pub excluded: Vec<ExcludedShare>,
    /// Number of shares combined into the key
    pub contributors: usize,
    /// Whether the key was already cached for this height
    pub cached: bool,
}

/// Aggregate the decryption key for `height`.
///
/// The first successful result for a height is cached and returned unchanged
/// on every later call.
pub fn aggregate(
    state: &mut KeyShareState,
    config: &KeyShareConfig,
    height: u64,
) -> Result<AggregationReport, AggregationError> {
    if let Some(key) = state.aggregated_key(height) {
        return Ok(AggregationReport {
            key: key.clone(),
            excluded: Vec::new(),
            contributors: 0,
            cached: true,
        });
    }

    let threshold = config.threshold as usize;
    let shares = state.registry.list(height);
    if shares.len() < threshold {
        return Err(AggregationError::InsufficientShares {
            height,
            required: threshold,
            got: shares.len(),
        });
    }

    let identity = config.identity_bytes();
    let q_id = Bls12::hash_identity(identity);

    let mut accepted = Vec::with_capacity(shares.len());
    let mut excluded = Vec::new();

    for stored in &shares {
        // Points were validated at submission; a decode failure here means the
        // store itself is damaged.
        let share = Bls12::decode_share(&stored.share.0).map_err(|e| {
            AggregationError::CorruptState(format!(
                "stored share of {} at height {height}: {e}",
                hex::encode(stored.validator)
            ))
        })?;
        let commitment = Bls12::decode_commitment(&stored.commitment.0).map_err(|e| {
            AggregationError::CorruptState(format!(
                "stored commitment of {} at height {height}: {e}",
                hex::encode(stored.validator)
            ))
        })?;

        if verify_key_share::<Bls12>(&share, &commitment, &q_id) {
            accepted.push((stored.index, share));
        } else {
            warn!(
                height,
                validator = %hex::encode(stored.validator),
                index = stored.index,
                "Excluding key share that fails commitment check"
            );
            excluded.push(ExcludedShare {
                validator: stored.validator,
                index: stored.index,
                reason: CryptoError::InvalidShare {
                    index: stored.index,
                },
            });
        }
    }

    if accepted.len() < threshold {
        return Err(AggregationError::InsufficientShares {
            height,
            required: threshold,
            got: accepted.len(),
        });
    }

    let combined = combine_key_shares::<Bls12>(&accepted, threshold).map_err(|e| match e {
        CryptoError::InsufficientShares { required, got } => {
            AggregationError::InsufficientShares {
                height,
                required,
                got,
            }
        }
        other => AggregationError::CorruptState(format!("height {height}: {other}")),
    })?;
    let key = Bls12::share_to_point(&combined);

    if let Some(mpk) = &config.master_public_key {
        verify_aggregated_key(mpk, identity, &key).map_err(|e| match e {
            CryptoError::MasterKeyMismatch => AggregationError::MasterKeyMismatch { height },
            other => AggregationError::CorruptState(format!("master public key: {other}")),
        })?;
    }

    let aggregated = AggregatedKey {
        height,
        identity: identity.to_vec(),
        key,
    };
    state.aggregated_keys.insert(height, aggregated.clone());

    debug!(
        height,
        contributors = accepted.len(),
        excluded = excluded.len(),
        "Aggregated decryption key"
    );

    Ok(AggregationReport {
        key: aggregated,
        excluded,
        contributors: accepted.len(),
        cached: false,
    })
}
