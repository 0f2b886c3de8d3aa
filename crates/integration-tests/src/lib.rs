//! End-to-end integration tests for the key-share lifecycle.
//!
//! These tests drive the module the way a host chain would:
//! 1. Deal a master secret to a committee
//! 2. Validators submit key shares for a height
//! 3. `begin_block` reconciles the committee and aggregates
//! 4. The aggregated key opens ciphertexts encrypted to the identity

#![cfg(test)]

use bls12_381::Scalar;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;

use keyshare_crypto::sharing::{deal_shares, extract_key_share, master_public_key, random_scalar};
use keyshare_crypto::{decrypt, encrypt, CryptoError};
use keyshare_module::{
    AggregationError, AggregationStatus, CallContext, CommitteeRegistration, KeyShareConfig,
    KeyShareError, KeyShareEvent, KeyShareModule, RemovalReason,
};
use keyshare_types::{Address, BondStatus, G2Point, SlashRequest, ValidatorInfo};

const IDENTITY: &str = "integration/identity";

struct Network {
    module: KeyShareModule,
    secret: Scalar,
    shares: Vec<(u32, Scalar)>,
}

fn address(index: u32) -> Address {
    let mut addr = [0u8; 32];
    addr[..4].copy_from_slice(&index.to_be_bytes());
    addr
}

fn ctx(index: u32, height: u64) -> CallContext {
    CallContext {
        sender: address(index),
        block_height: height,
    }
}

fn snapshot(n: u32, unbonded: &[u32]) -> Vec<ValidatorInfo> {
    (1..=n)
        .map(|i| ValidatorInfo {
            operator: address(i),
            consensus_pubkey: vec![i as u8; 32],
            status: if unbonded.contains(&i) {
                BondStatus::Unbonded
            } else {
                BondStatus::Bonded
            },
            slash_count: 0,
        })
        .collect()
}

impl Network {
    fn new(threshold: u32, n: u32, secret: Scalar) -> Self {
        let config = KeyShareConfig {
            threshold,
            identity: IDENTITY.to_string(),
            master_public_key: Some(master_public_key(&secret)),
            validators: (1..=n)
                .map(|i| CommitteeRegistration {
                    address: address(i),
                    index: i,
                })
                .collect(),
            ..Default::default()
        };
        let shares = deal_shares(&secret, threshold as usize, n, &mut OsRng);
        Self {
            module: KeyShareModule::new(config).unwrap(),
            secret,
            shares,
        }
    }

    fn submit(&mut self, index: u32, height: u64) -> Result<(), KeyShareError> {
        let s_i = self.shares[(index - 1) as usize].1;
        let (share, commitment) = extract_key_share(&s_i, IDENTITY.as_bytes());
        self.module
            .submit_key_share(&ctx(index, height), height, index, &share.0, &commitment.0)
            .map(|_| ())
    }

    fn expected_key(&self) -> G2Point {
        extract_key_share(&self.secret, IDENTITY.as_bytes()).0
    }
}

/// threshold = 3, indices 1..=4 at height 100; any 3-of-4 reconstructs s.
#[test]
fn test_three_of_four_scenario() {
    let secret = random_scalar(&mut OsRng);
    let mut full = Network::new(3, 4, secret);
    for index in 1..=4 {
        full.submit(index, 100).unwrap();
    }

    let report = full.module.aggregate(100).unwrap();
    assert!(report.excluded.is_empty());
    assert_eq!(report.key.key, full.expected_key());
    assert_eq!(report.key.height, 100);
    assert_eq!(report.key.identity, IDENTITY.as_bytes());

    // Reuse the same dealing for each subset.
    let mut keys = Vec::new();
    for subset in [[1u32, 2, 3], [1, 2, 4], [2, 3, 4], [1, 3, 4]] {
        let mut network = Network {
            module: KeyShareModule::new(full.module.config().clone()).unwrap(),
            secret,
            shares: full.shares.clone(),
        };
        for index in subset {
            network.submit(index, 100).unwrap();
        }
        keys.push(network.module.aggregate(100).unwrap().key.key);
    }
    assert!(keys.iter().all(|k| *k == report.key.key));

    println!("3-of-4 aggregation consistent across subsets");
}

#[test]
fn test_threshold_boundary() {
    let mut network = Network::new(3, 5, random_scalar(&mut OsRng));
    network.submit(2, 7).unwrap();
    network.submit(5, 7).unwrap();

    assert_eq!(
        network.module.aggregate(7).unwrap_err(),
        AggregationError::InsufficientShares {
            height: 7,
            required: 3,
            got: 2
        }
    );

    network.submit(4, 7).unwrap();
    assert_eq!(network.module.aggregate(7).unwrap().key.key, network.expected_key());
}

#[test]
fn test_order_independence_and_determinism() {
    let secret = random_scalar(&mut OsRng);
    let reference = Network::new(4, 7, secret);

    let mut keys = Vec::new();
    for _ in 0..3 {
        let mut network = Network {
            module: KeyShareModule::new(reference.module.config().clone()).unwrap(),
            secret,
            shares: reference.shares.clone(),
        };
        let mut order: Vec<u32> = (1..=7).collect();
        order.shuffle(&mut OsRng);
        for index in order {
            network.submit(index, 3).unwrap();
        }

        let first = network.module.aggregate(3).unwrap();
        let second = network.module.aggregate(3).unwrap();
        assert!(second.cached);
        assert_eq!(first.key, second.key);
        keys.push(first.key.key);
    }

    assert!(keys.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(keys[0], reference.expected_key());
}

#[test]
fn test_invalid_share_isolation() {
    let mut network = Network::new(3, 4, random_scalar(&mut OsRng));
    for index in 1..=3 {
        network.submit(index, 9).unwrap();
    }

    // Validator 4 pairs its real share with someone else's commitment.
    let (share, _) = extract_key_share(&network.shares[3].1, IDENTITY.as_bytes());
    let (_, foreign) = extract_key_share(&network.shares[0].1, IDENTITY.as_bytes());
    network
        .module
        .submit_key_share(&ctx(4, 9), 9, 4, &share.0, &foreign.0)
        .unwrap();

    let mut staking: Vec<SlashRequest> = Vec::new();
    let report = network
        .module
        .begin_block(&mut staking, 9, &snapshot(4, &[]))
        .unwrap();

    assert_eq!(report.aggregated_key().map(|k| k.key), Some(network.expected_key()));
    assert!(report.events.iter().any(|e| matches!(
        e,
        KeyShareEvent::ShareExcluded { index: 4, .. }
    )));
    assert_eq!(network.module.state().stats.shares_excluded, 1);
}

#[test]
fn test_committee_consistency() {
    let mut network = Network::new(2, 3, random_scalar(&mut OsRng));
    let mut staking: Vec<SlashRequest> = Vec::new();

    // Validator 3 submits for height 10, then is found unbonded at height 10.
    network.submit(3, 10).unwrap();
    network.submit(1, 10).unwrap();

    let report = network
        .module
        .begin_block(&mut staking, 10, &snapshot(3, &[3]))
        .unwrap();

    assert!(report.events.iter().any(|e| matches!(
        e,
        KeyShareEvent::ValidatorRemoved {
            index: 3,
            reason: RemovalReason::NotBonded,
            ..
        }
    )));
    // Its share at height 10 still counts.
    assert_eq!(report.aggregated_key().map(|k| k.key), Some(network.expected_key()));

    assert_eq!(staking.len(), 1);
    assert_eq!(staking[0].operator, address(3));
    assert_eq!(staking[0].infraction_height, 11);

    // Later submissions are refused.
    assert!(matches!(
        network.submit(3, 11),
        Err(KeyShareError::UnknownValidator(_))
    ));

    // Rebonded, it cannot reclaim its old index.
    network
        .module
        .begin_block(&mut staking, 11, &snapshot(3, &[]))
        .unwrap();
    assert_eq!(
        network.module.register_validator(&ctx(3, 11), 3),
        Err(KeyShareError::IndexUnavailable(3))
    );
    network.module.register_validator(&ctx(3, 11), 8).unwrap();
    assert!(network.module.is_committee_member(&address(3)));
}

#[test]
fn test_blocks_proceed_without_shares() {
    let mut network = Network::new(2, 3, random_scalar(&mut OsRng));
    let mut staking: Vec<SlashRequest> = Vec::new();

    for height in 1..=20 {
        let report = network
            .module
            .begin_block(&mut staking, height, &snapshot(3, &[]))
            .unwrap();
        assert!(matches!(
            report.aggregation,
            AggregationStatus::Failed(AggregationError::InsufficientShares { got: 0, .. })
        ));
    }

    let stats = network.module.state().stats;
    assert_eq!(stats.blocks_processed, 20);
    assert_eq!(stats.consecutive_shortfalls, 20);
    assert_eq!(stats.keys_aggregated, 0);
}

#[test]
fn test_aggregated_key_decrypts() {
    let secret = random_scalar(&mut OsRng);
    let mut network = Network::new(2, 3, secret);
    network.submit(1, 5).unwrap();
    network.submit(3, 5).unwrap();

    let mpk = master_public_key(&secret);
    let plaintext = b"sealed until height 5";
    let ciphertext = encrypt(&mpk, IDENTITY.as_bytes(), plaintext, &mut OsRng).unwrap();

    let key = network.module.aggregate(5).unwrap().key;
    assert_eq!(decrypt(&ciphertext, &key.key).unwrap(), plaintext);

    // A key for another identity does not open it.
    let (other, _) = extract_key_share(&secret, b"another identity");
    assert_eq!(
        decrypt(&ciphertext, &other),
        Err(CryptoError::AuthenticationFailed)
    );
}
