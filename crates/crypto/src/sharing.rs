//! Shamir dealing helpers.
//!
//! Produces the per-validator key shares and commitments the module
//! aggregates. On a live chain the polynomial comes out of a DKG; the
//! simulator and the tests deal it directly.

use bls12_381::{G1Projective, Scalar};
use ff::Field;
use group::Curve;
use rand::{CryptoRng, RngCore};

use keyshare_types::{G1Point, G2Point};

use crate::curve::{compress_g1, compress_g2, Bls12, PairingBackend};

/// Generate a random scalar.
pub fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut bytes = [0u8; 64];
    rng.fill_bytes(&mut bytes);
    Scalar::from_bytes_wide(&bytes)
}

/// Generate a random polynomial with `degree` coefficients and constant term `secret`.
///
/// f(x) = a_0 + a_1*x + ... + a_{t-1}*x^{t-1}, a_0 = secret
pub fn generate_polynomial<R: RngCore + CryptoRng>(
    secret: &Scalar,
    degree: usize,
    rng: &mut R,
) -> Vec<Scalar> {
    let mut coefficients = Vec::with_capacity(degree.max(1));
    coefficients.push(*secret);

    for _ in 1..degree {
        coefficients.push(random_scalar(rng));
    }

    coefficients
}

/// Evaluate polynomial at a point using Horner's method.
pub fn evaluate_polynomial(coefficients: &[Scalar], x: &Scalar) -> Scalar {
    let mut result = Scalar::ZERO;
    for coeff in coefficients.iter().rev() {
        result = result * x + coeff;
    }
    result
}

/// Deal `n` scalar shares of `secret` with reconstruction threshold `threshold`.
///
/// Returns `(index, s_i)` pairs with 1-based indices.
pub fn deal_shares<R: RngCore + CryptoRng>(
    secret: &Scalar,
    threshold: usize,
    n: u32,
    rng: &mut R,
) -> Vec<(u32, Scalar)> {
    let coefficients = generate_polynomial(secret, threshold, rng);
    (1..=n)
        .map(|i| (i, evaluate_polynomial(&coefficients, &Scalar::from(i as u64))))
        .collect()
}

/// Derive the key share and commitment a validator submits for `identity`.
///
/// Returns `(s_i · Q_ID, s_i · G1)`.
pub fn extract_key_share(secret_share: &Scalar, identity: &[u8]) -> (G2Point, G1Point) {
    let q_id = Bls12::hash_identity(identity);
    let share = Bls12::scalar_mul(&q_id, secret_share);
    let commitment = G1Projective::generator() * secret_share;
    (
        compress_g2(&share.to_affine()),
        compress_g1(&commitment.to_affine()),
    )
}

/// Master public key s · G1.
pub fn master_public_key(secret: &Scalar) -> G1Point {
    compress_g1(&(G1Projective::generator() * secret).to_affine())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_polynomial_evaluation() {
        // f(x) = 5 + 3x + 2x^2
        let coeffs = vec![Scalar::from(5u64), Scalar::from(3u64), Scalar::from(2u64)];

        assert_eq!(evaluate_polynomial(&coeffs, &Scalar::ZERO), Scalar::from(5u64));
        assert_eq!(evaluate_polynomial(&coeffs, &Scalar::ONE), Scalar::from(10u64));
        assert_eq!(
            evaluate_polynomial(&coeffs, &Scalar::from(2u64)),
            Scalar::from(19u64)
        );
    }

    #[test]
    fn test_deal_shares_lie_on_polynomial() {
        let secret = random_scalar(&mut OsRng);
        let shares = deal_shares(&secret, 2, 4, &mut OsRng);
        assert_eq!(
            shares.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );

        // Degree 1: f(0) = 2·f(1) - f(2), and f(3) - f(2) = f(2) - f(1).
        let y = |i: usize| shares[i].1;
        assert_eq!(y(0).double() - y(1), secret);
        assert_eq!(y(2) - y(1), y(1) - y(0));
    }

    #[test]
    fn test_extracted_share_verifies() {
        let s_i = random_scalar(&mut OsRng);
        let (share, commitment) = extract_key_share(&s_i, b"id");

        let share = Bls12::decode_share(&share.0).unwrap();
        let commitment = Bls12::decode_commitment(&commitment.0).unwrap();
        let q_id = Bls12::hash_identity(b"id");
        assert!(Bls12::pairing_check(&commitment, &share, &q_id));

        let other_id = Bls12::hash_identity(b"other");
        assert!(!Bls12::pairing_check(&commitment, &share, &other_id));
    }
}
