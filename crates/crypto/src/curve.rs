//! Curve arithmetic layer over BLS12-381.
//!
//! Key shares live in G2 and their commitments in G1. The pairing binds the
//! two: a share `sk_i = s_i · Q_ID` and a commitment `C_i = s_i · G1` satisfy
//!
//! ```text
//! e(C_i, Q_ID) == e(G1, sk_i)
//! ```
//!
//! where `Q_ID` is the identity hashed into G2.

use bls12_381::hash_to_curve::{ExpandMsgXmd, HashToCurve};
use bls12_381::{pairing, G1Affine, G1Projective, G2Affine, G2Projective, Scalar};
use ff::PrimeField;
use group::{Curve, Group};
use sha2_09::Sha256;

use keyshare_types::{G1Point, G2Point};

use crate::error::{CryptoError, CurveGroup};

/// Domain separation tag for hashing identities into G2.
pub const IDENTITY_DST: &[u8] = b"KEYSHARE_BLS12381G2_XMD:SHA-256_SSWU_RO_IDENTITY_V1";

/// Group operations needed to verify and combine key shares.
///
/// Implemented once, by [`Bls12`]. The share group carries the secret-shared
/// key material and the commitment group the per-share binding commitments.
pub trait PairingBackend {
    type Scalar: PrimeField;
    type Share: Group<Scalar = Self::Scalar>;
    type Commitment: Group<Scalar = Self::Scalar>;

    /// Decode a share-group element, rejecting the point at infinity.
    fn decode_share(bytes: &[u8]) -> Result<Self::Share, CryptoError>;

    fn encode_share(share: &Self::Share) -> Vec<u8>;

    /// Decode a commitment-group element, rejecting the point at infinity.
    fn decode_commitment(bytes: &[u8]) -> Result<Self::Commitment, CryptoError>;

    fn encode_commitment(commitment: &Self::Commitment) -> Vec<u8>;

    /// Map an identity string into the share group.
    fn hash_identity(identity: &[u8]) -> Self::Share;

    /// Check `e(commitment, identity_point) == e(generator, share)`.
    fn pairing_check(
        commitment: &Self::Commitment,
        share: &Self::Share,
        identity_point: &Self::Share,
    ) -> bool;

    fn scalar_mul(point: &Self::Share, scalar: &Self::Scalar) -> Self::Share {
        *point * *scalar
    }

    fn add(a: &Self::Share, b: &Self::Share) -> Self::Share {
        *a + *b
    }
}

/// BLS12-381 with shares in G2 and commitments in G1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bls12;

impl PairingBackend for Bls12 {
    type Scalar = Scalar;
    type Share = G2Projective;
    type Commitment = G1Projective;

    fn decode_share(bytes: &[u8]) -> Result<G2Projective, CryptoError> {
        let bytes: [u8; 96] = bytes
            .try_into()
            .map_err(|_| CryptoError::MalformedPoint(CurveGroup::Share))?;
        decompress_g2(&G2Point(bytes)).map(G2Projective::from)
    }

    fn encode_share(share: &G2Projective) -> Vec<u8> {
        share.to_affine().to_compressed().to_vec()
    }

    fn decode_commitment(bytes: &[u8]) -> Result<G1Projective, CryptoError> {
        let bytes: [u8; 48] = bytes
            .try_into()
            .map_err(|_| CryptoError::MalformedPoint(CurveGroup::Commitment))?;
        decompress_g1(&G1Point(bytes)).map(G1Projective::from)
    }

    fn encode_commitment(commitment: &G1Projective) -> Vec<u8> {
        commitment.to_affine().to_compressed().to_vec()
    }

    fn hash_identity(identity: &[u8]) -> G2Projective {
        G2Projective::from(hash_to_g2(identity))
    }

    fn pairing_check(
        commitment: &G1Projective,
        share: &G2Projective,
        identity_point: &G2Projective,
    ) -> bool {
        let lhs = pairing(&commitment.to_affine(), &identity_point.to_affine());
        let rhs = pairing(&G1Affine::generator(), &share.to_affine());
        lhs == rhs
    }
}

impl Bls12 {
    /// Compress a share-group element.
    pub fn share_to_point(share: &G2Projective) -> G2Point {
        compress_g2(&share.to_affine())
    }
}

/// Hash an identity string to a G2 point.
///
/// Uses the random-oracle `hash_to_curve` suite for G2 (SSWU map, XMD
/// expansion with SHA-256) under [`IDENTITY_DST`]. The discrete log of the
/// result is unknown, so a key for one identity cannot be rescaled into a
/// key for another.
pub fn hash_to_g2(identity: &[u8]) -> G2Affine {
    <G2Projective as HashToCurve<ExpandMsgXmd<Sha256>>>::hash_to_curve(identity, IDENTITY_DST)
        .to_affine()
}

/// Compress a G1 point to bytes.
pub fn compress_g1(point: &G1Affine) -> G1Point {
    G1Point(point.to_compressed())
}

/// Decompress a G1 point, rejecting invalid encodings and the identity.
pub fn decompress_g1(point: &G1Point) -> Result<G1Affine, CryptoError> {
    let affine = Option::<G1Affine>::from(G1Affine::from_compressed(&point.0))
        .ok_or(CryptoError::MalformedPoint(CurveGroup::Commitment))?;
    if bool::from(affine.is_identity()) {
        return Err(CryptoError::MalformedPoint(CurveGroup::Commitment));
    }
    Ok(affine)
}

/// Compress a G2 point to bytes.
pub fn compress_g2(point: &G2Affine) -> G2Point {
    G2Point(point.to_compressed())
}

/// Decompress a G2 point, rejecting invalid encodings and the identity.
pub fn decompress_g2(point: &G2Point) -> Result<G2Affine, CryptoError> {
    let affine = Option::<G2Affine>::from(G2Affine::from_compressed(&point.0))
        .ok_or(CryptoError::MalformedPoint(CurveGroup::Share))?;
    if bool::from(affine.is_identity()) {
        return Err(CryptoError::MalformedPoint(CurveGroup::Share));
    }
    Ok(affine)
}
