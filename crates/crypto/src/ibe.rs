//! Identity-Based Encryption to the aggregated decryption key.
//!
//! Boneh-Franklin style with the master public key in G1 and identity keys
//! in G2.
//!
//! # Encryption
//!
//! To encrypt a message `m` to identity `id` under `MPK = s·G1`:
//! 1. Compute Q_ID = H(id) ∈ G2
//! 2. Sample random scalar r
//! 3. Compute U = r·G1 (ephemeral public key)
//! 4. Compute shared = e(r·MPK, Q_ID)
//! 5. Derive symmetric key from shared
//! 6. Encrypt m with AES-GCM
//!
//! # Decryption
//!
//! Given the aggregated key sk = s·Q_ID:
//! 1. Compute shared = e(U, sk) = e(G1, Q_ID)^{rs}
//! 2. Derive symmetric key from shared
//! 3. Decrypt ciphertext with AES-GCM

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use bls12_381::{pairing, G1Projective, Gt};
use group::Curve;
use hkdf::Hkdf;
use rand::{CryptoRng, RngCore};
use sha2::Sha256;

use keyshare_types::{G1Point, G2Point, IbeCiphertext};

use crate::curve::{compress_g1, decompress_g1, decompress_g2, hash_to_g2};
use crate::error::CryptoError;
use crate::sharing::random_scalar;

const TAG_LEN: usize = 16;

const KDF_SALT: &[u8] = b"KEYSHARE-IBE-GT-V1";

/// Encrypt a message to `identity` under the master public key.
pub fn encrypt<R: RngCore + CryptoRng>(
    master_public_key: &G1Point,
    identity: &[u8],
    plaintext: &[u8],
    rng: &mut R,
) -> Result<IbeCiphertext, CryptoError> {
    let mpk = decompress_g1(master_public_key)?;
    let q_id = hash_to_g2(identity);

    let r = random_scalar(rng);
    let u = (G1Projective::generator() * r).to_affine();

    // e(r·MPK, Q_ID) = e(MPK, Q_ID)^r
    let r_mpk = (G1Projective::from(mpk) * r).to_affine();
    let shared_gt = pairing(&r_mpk, &q_id);

    let key = derive_key_from_gt(&shared_gt)?;

    let mut nonce_bytes = [0u8; 12];
    rng.fill_bytes(&mut nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::EncryptionFailed(format!("Failed to create cipher: {}", e)))?;

    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext_with_tag = cipher.encrypt(nonce, plaintext).map_err(|e| {
        CryptoError::EncryptionFailed(format!("AES-GCM encryption failed: {}", e))
    })?;

    let tag_start = ciphertext_with_tag.len() - TAG_LEN;
    let ciphertext = ciphertext_with_tag[..tag_start].to_vec();
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&ciphertext_with_tag[tag_start..]);

    Ok(IbeCiphertext {
        ephemeral_pubkey: compress_g1(&u),
        ciphertext,
        tag,
        nonce: nonce_bytes,
    })
}

/// Decrypt with the aggregated key for the ciphertext's identity.
pub fn decrypt(ciphertext: &IbeCiphertext, decryption_key: &G2Point) -> Result<Vec<u8>, CryptoError> {
    let sk = decompress_g2(decryption_key)?;
    let u = decompress_g1(&ciphertext.ephemeral_pubkey)
        .map_err(|_| CryptoError::InvalidCiphertextFormat)?;

    let shared_gt = pairing(&u, &sk);
    let key = derive_key_from_gt(&shared_gt)?;

    let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::KeyDerivationFailed)?;
    let nonce = Nonce::from_slice(&ciphertext.nonce);

    let mut ct_with_tag = ciphertext.ciphertext.clone();
    ct_with_tag.extend_from_slice(&ciphertext.tag);

    cipher
        .decrypt(nonce, ct_with_tag.as_ref())
        .map_err(|_| CryptoError::AuthenticationFailed)
}

/// Width of [`gt_to_bytes`].
pub const GT_ENCODED_LEN: usize = 12 * FP_LEN;

const FP_LEN: usize = 48;

/// Fixed-width encoding of a GT element.
///
/// An element of Fp12 = Fp6[w] over Fp6 = Fp2[v] over Fp2 = Fp[u] is written
/// as its twelve Fp coefficients, each 48 bytes big-endian, in the order
///
/// ```text
/// c0.c0.c0  c0.c0.c1  c0.c1.c0  c0.c1.c1  c0.c2.c0  c0.c2.c1
/// c1.c0.c0  c1.c0.c1  c1.c1.c0  c1.c1.c1  c1.c2.c0  c1.c2.c1
/// ```
///
/// `bls12_381` keeps the coefficients private and only exposes each one as
/// `0x`-prefixed canonical big-endian hex through `Debug`, in this order.
/// The coefficients are read back from there, and anything other than
/// exactly twelve 48-byte values is rejected.
pub fn gt_to_bytes(gt: &Gt) -> Result<[u8; GT_ENCODED_LEN], CryptoError> {
    let rendered = format!("{:?}", gt);
    let mut out = [0u8; GT_ENCODED_LEN];
    let mut count = 0;

    for (pos, _) in rendered.match_indices("0x") {
        let digits = rendered
            .get(pos + 2..pos + 2 + 2 * FP_LEN)
            .ok_or(CryptoError::KeyDerivationFailed)?;
        let slot = out
            .get_mut(count * FP_LEN..(count + 1) * FP_LEN)
            .ok_or(CryptoError::KeyDerivationFailed)?;
        hex::decode_to_slice(digits, slot).map_err(|_| CryptoError::KeyDerivationFailed)?;
        count += 1;
    }

    if count != 12 {
        return Err(CryptoError::KeyDerivationFailed);
    }
    Ok(out)
}

/// Derive the AES-256 key from a GT element: HKDF-SHA256 over [`gt_to_bytes`].
fn derive_key_from_gt(gt: &Gt) -> Result<[u8; 32], CryptoError> {
    let encoded = gt_to_bytes(gt)?;

    let hk = Hkdf::<Sha256>::new(Some(KDF_SALT), &encoded);
    let mut key = [0u8; 32];
    hk.expand(b"KEYSHARE-IBE-KEY", &mut key)
        .map_err(|_| CryptoError::KeyDerivationFailed)?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::compress_g2;
    use crate::sharing::{extract_key_share, master_public_key};
    use bls12_381::{G1Affine, G2Affine, G2Projective, Scalar};
    use rand::rngs::OsRng;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let mut rng = OsRng;
        let master_secret = random_scalar(&mut rng);
        let mpk = master_public_key(&master_secret);

        let identity = b"block-identity";
        let plaintext = b"encrypted transaction payload";

        let ciphertext = encrypt(&mpk, identity, plaintext, &mut rng).unwrap();

        let (key, _) = extract_key_share(&master_secret, identity);
        let decrypted = decrypt(&ciphertext, &key).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_identity_key_fails() {
        let mut rng = OsRng;
        let master_secret = random_scalar(&mut rng);
        let mpk = master_public_key(&master_secret);

        let ciphertext = encrypt(&mpk, b"identity-a", b"payload", &mut rng).unwrap();

        let (wrong_key, _) = extract_key_share(&master_secret, b"identity-b");
        assert_eq!(
            decrypt(&ciphertext, &wrong_key),
            Err(CryptoError::AuthenticationFailed)
        );
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let mut rng = OsRng;
        let master_secret = random_scalar(&mut rng);
        let mpk = master_public_key(&master_secret);

        let mut ciphertext = encrypt(&mpk, b"id", b"payload", &mut rng).unwrap();
        ciphertext.ciphertext[0] ^= 1;

        let (key, _) = extract_key_share(&master_secret, b"id");
        assert!(decrypt(&ciphertext, &key).is_err());
    }

    #[test]
    fn test_rescaled_key_does_not_open_other_identity() {
        let mut rng = OsRng;
        let master_secret = random_scalar(&mut rng);
        let mpk = master_public_key(&master_secret);

        let ciphertext = encrypt(&mpk, b"identity-b", b"secret for b", &mut rng).unwrap();
        let (key_a, _) = extract_key_share(&master_secret, b"identity-a");
        let key_a = G2Projective::from(decompress_g2(&key_a).unwrap());

        // Map key_a onto identity-b with a ratio anyone can compute from
        // public SHA-256 digests of the two identities.
        let digest_scalar = |identity: &[u8]| {
            let mut wide = [0u8; 64];
            wide[..32].copy_from_slice(&keyshare_types::sha256(identity));
            Scalar::from_bytes_wide(&wide)
        };
        let ratio = digest_scalar(b"identity-b")
            * Option::<Scalar>::from(digest_scalar(b"identity-a").invert()).unwrap();

        for candidate in [key_a, key_a * ratio] {
            let forged = compress_g2(&candidate.to_affine());
            assert_eq!(
                decrypt(&ciphertext, &forged),
                Err(CryptoError::AuthenticationFailed)
            );
        }

        let (key_b, _) = extract_key_share(&master_secret, b"identity-b");
        assert_eq!(decrypt(&ciphertext, &key_b).unwrap(), b"secret for b");
    }

    #[test]
    fn test_gt_encoding() {
        let one = gt_to_bytes(&Gt::identity()).unwrap();
        assert_eq!(one.len(), GT_ENCODED_LEN);
        assert_eq!(one[FP_LEN - 1], 1);
        assert!(one
            .iter()
            .enumerate()
            .all(|(i, b)| i == FP_LEN - 1 || *b == 0));

        // e(a·G1, G2) and e(G1, a·G2) are the same element.
        let a = random_scalar(&mut OsRng);
        let lhs = pairing(&(G1Projective::generator() * a).to_affine(), &G2Affine::generator());
        let rhs = pairing(
            &G1Affine::generator(),
            &(G2Projective::generator() * a).to_affine(),
        );
        assert_eq!(gt_to_bytes(&lhs).unwrap(), gt_to_bytes(&rhs).unwrap());
        assert_ne!(gt_to_bytes(&lhs).unwrap(), gt_to_bytes(&(lhs + lhs)).unwrap());
        assert_ne!(gt_to_bytes(&lhs).unwrap(), one);
    }
}
