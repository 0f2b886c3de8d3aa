//! In-memory state of the key-share module.

use std::collections::BTreeMap;

use keyshare_types::{AggregatedKey, Address, BondStatus, ValidatorInfo};

use crate::committee::Committee;
use crate::registry::ShareRegistry;
use crate::scheduler::SchedulerStats;

/// Key-share module state.
///
/// Every map is ordered so that iteration, and therefore every result derived
/// from it, is identical across nodes.
#[derive(Debug, Default, Clone)]
pub struct KeyShareState {
    /// Validators allowed to submit shares
    pub committee: Committee,

    /// Submitted shares by (height, validator)
    pub registry: ShareRegistry,

    /// Aggregated keys by height; written once
    pub aggregated_keys: BTreeMap<u64, AggregatedKey>,

    /// Last height passed to `begin_block`
    pub last_height: Option<u64>,

    /// Bond status from the most recent validator snapshot
    pub validator_set: Option<BTreeMap<Address, BondStatus>>,

    pub stats: SchedulerStats,
}

impl KeyShareState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggregated_key(&self, height: u64) -> Option<&AggregatedKey> {
        self.aggregated_keys.get(&height)
    }

    /// Latest aggregated key at or below `height`.
    pub fn latest_aggregated_key(&self, height: u64) -> Option<&AggregatedKey> {
        self.aggregated_keys
            .range(..=height)
            .next_back()
            .map(|(_, key)| key)
    }

    /// Drop cached keys for heights below `height`. Returns how many were removed.
    pub fn prune_keys_below(&mut self, height: u64) -> usize {
        let kept = self.aggregated_keys.split_off(&height);
        let removed = self.aggregated_keys.len();
        self.aggregated_keys = kept;
        removed
    }

    /// Remember the bond status of every validator in `snapshot`.
    pub fn record_snapshot(&mut self, snapshot: &[ValidatorInfo]) {
        self.validator_set = Some(
            snapshot
                .iter()
                .map(|v| (v.operator, v.status))
                .collect(),
        );
    }

    /// Bond status of `address` in the latest snapshot.
    ///
    /// `None` when no snapshot has been seen yet or the address was absent.
    pub fn bond_status(&self, address: &Address) -> Option<BondStatus> {
        self.validator_set
            .as_ref()
            .and_then(|set| set.get(address).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyshare_types::G2Point;

    fn key(height: u64) -> AggregatedKey {
        AggregatedKey {
            height,
            identity: b"id".to_vec(),
            key: G2Point([height as u8; 96]),
        }
    }

    #[test]
    fn test_latest_aggregated_key() {
        let mut state = KeyShareState::new();
        state.aggregated_keys.insert(2, key(2));
        state.aggregated_keys.insert(5, key(5));

        assert_eq!(state.latest_aggregated_key(1), None);
        assert_eq!(state.latest_aggregated_key(4).map(|k| k.height), Some(2));
        assert_eq!(state.latest_aggregated_key(9).map(|k| k.height), Some(5));
        assert!(state.aggregated_key(3).is_none());
    }

    #[test]
    fn test_prune_keys_below() {
        let mut state = KeyShareState::new();
        for height in [1, 2, 5] {
            state.aggregated_keys.insert(height, key(height));
        }

        assert_eq!(state.prune_keys_below(2), 1);
        assert_eq!(state.prune_keys_below(2), 0);
        assert!(state.aggregated_key(2).is_some());
        assert_eq!(state.latest_aggregated_key(1), None);
        assert_eq!(state.aggregated_keys.len(), 2);
    }

    #[test]
    fn test_snapshot_lookup() {
        let mut state = KeyShareState::new();
        assert_eq!(state.bond_status(&[1u8; 32]), None);

        state.record_snapshot(&[ValidatorInfo {
            operator: [1u8; 32],
            consensus_pubkey: vec![1u8; 32],
            status: BondStatus::Unbonding,
            slash_count: 0,
        }]);
        assert_eq!(state.bond_status(&[1u8; 32]), Some(BondStatus::Unbonding));
        assert_eq!(state.bond_status(&[2u8; 32]), None);
    }
}
