//! Core type definitions for the validator key-share subsystem.
//!
//! This crate provides the records shared by the curve layer, the on-chain
//! module and the host glue: compressed BLS12-381 points, key shares,
//! aggregated decryption keys and the validator-set snapshot the host chain
//! hands to the module every block.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use thiserror::Error;

// =========================
// CRYPTOGRAPHIC PRIMITIVES
// =========================

/// Compressed G1 point on BLS12-381 (48 bytes). Used for share commitments.
#[serde_as]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct G1Point(#[serde_as(as = "[_; 48]")] pub [u8; 48]);

impl Default for G1Point {
    fn default() -> Self {
        Self([0u8; 48])
    }
}

/// Compressed G2 point on BLS12-381 (96 bytes). Used for key shares and keys.
#[serde_as]
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct G2Point(#[serde_as(as = "[_; 96]")] pub [u8; 96]);

impl Default for G2Point {
    fn default() -> Self {
        Self([0u8; 96])
    }
}

impl G1Point {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl G2Point {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

// =========================
// VALIDATORS
// =========================

/// Validator operator address (32 bytes).
pub type Address = [u8; 32];

/// Consensus address: first 20 bytes of SHA-256 over the consensus public key.
pub type ConsensusAddress = [u8; 20];

/// Length of an ed25519 consensus public key.
pub const CONSENSUS_PUBKEY_LEN: usize = 32;

/// Staking status of a validator as reported by the host chain.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub enum BondStatus {
    Bonded,
    Unbonding,
    Unbonded,
}

/// One entry of the validator-set snapshot supplied at the start of a block.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub operator: Address,
    pub consensus_pubkey: Vec<u8>,
    pub status: BondStatus,
    /// Number of slashes already applied by the staking subsystem
    pub slash_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("consensus public key has length {0}, expected {CONSENSUS_PUBKEY_LEN}")]
pub struct InvalidConsensusKey(pub usize);

impl ValidatorInfo {
    pub fn is_bonded(&self) -> bool {
        self.status == BondStatus::Bonded
    }

    /// Derive the consensus address from the consensus public key.
    pub fn consensus_address(&self) -> Result<ConsensusAddress, InvalidConsensusKey> {
        if self.consensus_pubkey.len() != CONSENSUS_PUBKEY_LEN {
            return Err(InvalidConsensusKey(self.consensus_pubkey.len()));
        }
        let digest = sha256(&self.consensus_pubkey);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&digest[..20]);
        Ok(addr)
    }
}

/// Slash penalty expressed in basis points (1/10000).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct SlashFraction(pub u32);

impl SlashFraction {
    pub const MAX_BPS: u32 = 10_000;

    pub fn is_valid(&self) -> bool {
        self.0 <= Self::MAX_BPS
    }

    /// Apply the fraction to a token amount, rounding down.
    pub fn apply(&self, amount: u64) -> u64 {
        ((amount as u128 * self.0 as u128) / Self::MAX_BPS as u128) as u64
    }
}

/// A slash the module asks the host staking subsystem to perform.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct SlashRequest {
    pub operator: Address,
    pub consensus_address: ConsensusAddress,
    /// Height the infraction is attributed to (processing height + delay)
    pub infraction_height: u64,
    pub power: u64,
    pub fraction: SlashFraction,
}

// =========================
// KEY SHARES
// =========================

/// A validator's key share for one block height.
///
/// Stored once per `(height, validator)` and never updated.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct KeyShare {
    pub height: u64,
    pub validator: Address,
    /// Shamir index fixed when the validator joined the committee (1-based)
    pub index: u32,
    /// sk_i = s_i · H(identity) in G2
    pub share: G2Point,
    /// C_i = s_i · G1
    pub commitment: G1Point,
}

/// Aggregated decryption key for the configured identity at one height.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AggregatedKey {
    pub height: u64,
    pub identity: Vec<u8>,
    pub key: G2Point,
}

/// Identity-based ciphertext encrypted to the aggregated key's identity.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct IbeCiphertext {
    /// Ephemeral public key: U = r·G1
    pub ephemeral_pubkey: G1Point,

    /// AES-256-GCM payload without the tag
    pub ciphertext: Vec<u8>,

    pub tag: [u8; 16],

    pub nonce: [u8; 12],
}

// =========================
// HELPER FUNCTIONS
// =========================

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    Sha256::digest(data).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(pubkey: Vec<u8>, status: BondStatus) -> ValidatorInfo {
        ValidatorInfo {
            operator: [7u8; 32],
            consensus_pubkey: pubkey,
            status,
            slash_count: 0,
        }
    }

    #[test]
    fn test_consensus_address_derivation() {
        let v = validator(vec![1u8; 32], BondStatus::Bonded);
        let addr = v.consensus_address().unwrap();
        assert_eq!(addr[..], sha256(&[1u8; 32])[..20]);

        let other = validator(vec![2u8; 32], BondStatus::Bonded);
        assert_ne!(addr, other.consensus_address().unwrap());
    }

    #[test]
    fn test_consensus_address_rejects_bad_key() {
        let v = validator(vec![1u8; 33], BondStatus::Unbonded);
        assert_eq!(v.consensus_address(), Err(InvalidConsensusKey(33)));
        assert!(!v.is_bonded());
    }

    #[test]
    fn test_slash_fraction() {
        assert_eq!(SlashFraction(100).apply(1_000), 10);
        assert_eq!(SlashFraction(10_000).apply(1_000), 1_000);
        assert_eq!(SlashFraction(1).apply(9_999), 0);
        assert!(SlashFraction(10_000).is_valid());
        assert!(!SlashFraction(10_001).is_valid());
    }

    #[test]
    fn test_key_share_serialization() {
        let share = KeyShare {
            height: 100,
            validator: [3u8; 32],
            index: 2,
            share: G2Point([9u8; 96]),
            commitment: G1Point([4u8; 48]),
        };
        let encoded = borsh::to_vec(&share).unwrap();
        let decoded: KeyShare = borsh::from_slice(&encoded).unwrap();
        assert_eq!(share, decoded);
    }
}
