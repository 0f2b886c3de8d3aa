//! Threshold combination of validator key shares.
//!
//! In a (t, n) scheme validator i holds a Shamir share s_i of the master
//! secret s and publishes, for the configured identity:
//!
//! - key share      sk_i = s_i · Q_ID   (G2)
//! - commitment     C_i  = s_i · G1     (G1)
//!
//! # Verification
//!
//! A share is accepted iff e(C_i, Q_ID) = e(G1, sk_i).
//!
//! # Aggregation
//!
//! Given at least t accepted shares the decryption key for the identity is
//! reconstructed in the exponent:
//!
//! sk = Σ λ_i · sk_i = s · Q_ID
//!
//! where λ_i are the Lagrange coefficients at x = 0 over the accepted indices.

use std::collections::HashSet;

use ff::PrimeField;
use group::Group;

use keyshare_types::{G1Point, G2Point};

use crate::curve::{Bls12, PairingBackend};
use crate::error::CryptoError;

/// Compute the Lagrange coefficient at x = 0 for index `i` over `indices`.
///
/// λ_i = Π_{j≠i} (x_j / (x_j - x_i))
pub fn lagrange_coefficient<F: PrimeField>(i: u32, indices: &[u32]) -> Result<F, CryptoError> {
    if i == 0 {
        return Err(CryptoError::InvalidShareIndex);
    }
    let i_scalar = F::from(i as u64);
    let mut numerator = F::ONE;
    let mut denominator = F::ONE;

    for &j in indices {
        if j == i {
            continue;
        }
        if j == 0 {
            return Err(CryptoError::InvalidShareIndex);
        }

        let j_scalar = F::from(j as u64);
        numerator *= j_scalar;
        denominator *= j_scalar - i_scalar;
    }

    Option::<F>::from(denominator.invert())
        .map(|inv| numerator * inv)
        .ok_or(CryptoError::LagrangeInterpolationFailed)
}

/// Check a decoded share against its commitment.
pub fn verify_key_share<B: PairingBackend>(
    share: &B::Share,
    commitment: &B::Commitment,
    identity_point: &B::Share,
) -> bool {
    B::pairing_check(commitment, share, identity_point)
}

/// Combine decoded shares into Σ λ_i · share_i.
///
/// Shares are sorted by index first so the result never depends on input
/// order. Fails on fewer than `threshold` shares, on a repeated index and on
/// index 0.
pub fn combine_key_shares<B: PairingBackend>(
    shares: &[(u32, B::Share)],
    threshold: usize,
) -> Result<B::Share, CryptoError> {
    if shares.len() < threshold {
        return Err(CryptoError::InsufficientShares {
            required: threshold,
            got: shares.len(),
        });
    }

    let mut sorted = shares.to_vec();
    sorted.sort_by_key(|(idx, _)| *idx);

    let mut seen = HashSet::with_capacity(sorted.len());
    for (idx, _) in &sorted {
        if *idx == 0 {
            return Err(CryptoError::InvalidShareIndex);
        }
        if !seen.insert(*idx) {
            return Err(CryptoError::DuplicateShareIndex(*idx));
        }
    }

    let indices: Vec<u32> = sorted.iter().map(|(idx, _)| *idx).collect();

    let mut result = B::Share::identity();
    for (idx, share) in &sorted {
        let lambda = lagrange_coefficient::<B::Scalar>(*idx, &indices)?;
        result = B::add(&result, &B::scalar_mul(share, &lambda));
    }

    Ok(result)
}

/// Check an aggregated key against the master public key `MPK = s · G1`.
pub fn verify_aggregated_key(
    master_public_key: &G1Point,
    identity: &[u8],
    key: &G2Point,
) -> Result<(), CryptoError> {
    let mpk = Bls12::decode_commitment(&master_public_key.0)?;
    let key = Bls12::decode_share(&key.0)?;
    let q_id = Bls12::hash_identity(identity);

    if Bls12::pairing_check(&mpk, &key, &q_id) {
        Ok(())
    } else {
        Err(CryptoError::MasterKeyMismatch)
    }
}
