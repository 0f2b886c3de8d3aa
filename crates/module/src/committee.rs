//! Validator committee membership and the per-block reconciliation pass.
//!
//! The committee is the set of validators allowed to submit key shares. Each
//! member holds a Shamir index fixed at registration. Indices are never
//! reassigned: once a member leaves, its index stays retired, and a returning
//! validator must register with a fresh one.
//!
//! Every block the pass compares the committee against the host's validator
//! snapshot. Validators that are not bonded lose their seat and are slashed;
//! members missing from the snapshot lose their seat. Newly bonded validators
//! are never added here.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use keyshare_types::{Address, SlashRequest, ValidatorInfo};

use crate::error::KeyShareError;
use crate::events::{KeyShareEvent, RemovalReason};
use crate::genesis::SlashingParams;
use crate::host::StakingKeeper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub index: u32,
    pub registered_at: u64,
}

#[derive(Debug, Default, Clone)]
pub struct Committee {
    members: BTreeMap<Address, CommitteeMember>,
    /// Every index ever handed out, including retired ones
    assigned: BTreeMap<u32, Address>,
}

impl Committee {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seat `address` with Shamir index `index`.
    pub fn register(
        &mut self,
        address: Address,
        index: u32,
        height: u64,
    ) -> Result<(), KeyShareError> {
        if index == 0 {
            return Err(KeyShareError::InvalidShareIndex);
        }
        if self.members.contains_key(&address) {
            return Err(KeyShareError::AlreadyRegistered(hex::encode(address)));
        }
        if self.assigned.contains_key(&index) {
            return Err(KeyShareError::IndexUnavailable(index));
        }

        self.assigned.insert(index, address);
        self.members.insert(
            address,
            CommitteeMember {
                index,
                registered_at: height,
            },
        );
        Ok(())
    }

    /// Remove a member. Idempotent; the index stays retired.
    pub fn remove(&mut self, address: &Address) -> Option<CommitteeMember> {
        self.members.remove(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.members.contains_key(address)
    }

    pub fn member(&self, address: &Address) -> Option<&CommitteeMember> {
        self.members.get(address)
    }

    pub fn members(&self) -> impl Iterator<Item = (&Address, &CommitteeMember)> {
        self.members.iter()
    }

    pub fn is_retired(&self, index: u32) -> bool {
        self.assigned
            .get(&index)
            .map(|holder| self.members.get(holder).map(|m| m.index) != Some(index))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub validator: Address,
    pub index: u32,
    pub reason: RemovalReason,
}

/// Changes computed from one snapshot, before any side effect.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommitteeUpdate {
    pub removals: Vec<Removal>,
    pub slashes: Vec<SlashRequest>,
    /// Validators whose consensus address could not be derived
    pub skipped: Vec<(Address, String)>,
}

/// Compute removals and slashes for `height` from the host snapshot.
pub fn plan_committee_update(
    committee: &Committee,
    snapshot: &[ValidatorInfo],
    height: u64,
    params: &SlashingParams,
) -> CommitteeUpdate {
    let mut update = CommitteeUpdate::default();
    let mut known = HashSet::with_capacity(snapshot.len());

    for validator in snapshot {
        known.insert(validator.operator);
        if validator.is_bonded() {
            continue;
        }

        let member = committee.member(&validator.operator);
        if let Some(member) = member {
            update.removals.push(Removal {
                validator: validator.operator,
                index: member.index,
                reason: RemovalReason::NotBonded,
            });
        } else if params.only_on_removal {
            continue;
        }

        match validator.consensus_address() {
            Ok(consensus_address) => update.slashes.push(SlashRequest {
                operator: validator.operator,
                consensus_address,
                infraction_height: height + params.delay_blocks,
                power: params.power,
                fraction: params.fraction,
            }),
            Err(e) => update.skipped.push((validator.operator, e.to_string())),
        }
    }

    for (address, member) in committee.members() {
        if !known.contains(address) {
            update.removals.push(Removal {
                validator: *address,
                index: member.index,
                reason: RemovalReason::NotInValidatorSet,
            });
        }
    }

    update
}

/// Apply a planned update: drop seats, then hand slashes to the host.
///
/// A failed slash is logged and reported; it never stops the remaining
/// validators from being processed.
pub fn apply_committee_update<S: StakingKeeper>(
    committee: &mut Committee,
    update: CommitteeUpdate,
    staking: &mut S,
) -> Vec<KeyShareEvent> {
    let mut events = Vec::new();

    for removal in update.removals {
        if committee.remove(&removal.validator).is_some() {
            info!(
                validator = %hex::encode(removal.validator),
                index = removal.index,
                reason = ?removal.reason,
                "Removed validator from committee"
            );
            events.push(KeyShareEvent::ValidatorRemoved {
                validator: removal.validator,
                index: removal.index,
                reason: removal.reason,
            });
        }
    }

    for (validator, reason) in update.skipped {
        warn!(
            validator = %hex::encode(validator),
            %reason,
            "Consensus address lookup failed, skipping slash"
        );
        events.push(KeyShareEvent::SlashSkipped { validator, reason });
    }

    for request in update.slashes {
        match staking.request_slash(&request) {
            Ok(()) => {
                debug!(
                    validator = %hex::encode(request.operator),
                    infraction_height = request.infraction_height,
                    fraction_bps = request.fraction.0,
                    "Requested slash"
                );
                events.push(KeyShareEvent::SlashRequested(request));
            }
            Err(e) => {
                warn!(
                    validator = %hex::encode(request.operator),
                    error = %e,
                    "Slash request failed"
                );
                events.push(KeyShareEvent::SlashSkipped {
                    validator: request.operator,
                    reason: e.to_string(),
                });
            }
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StakingError;
    use keyshare_types::BondStatus;

    fn validator(id: u8, status: BondStatus) -> ValidatorInfo {
        ValidatorInfo {
            operator: [id; 32],
            consensus_pubkey: vec![id; 32],
            status,
            slash_count: 0,
        }
    }

    fn committee_of(ids: &[u8]) -> Committee {
        let mut committee = Committee::new();
        for id in ids {
            committee.register([*id; 32], *id as u32, 0).unwrap();
        }
        committee
    }

    struct FailingKeeper;

    impl StakingKeeper for FailingKeeper {
        fn request_slash(&mut self, _request: &SlashRequest) -> Result<(), StakingError> {
            Err(StakingError("validator jailed".into()))
        }
    }

    #[test]
    fn test_register_rules() {
        let mut committee = Committee::new();
        committee.register([1u8; 32], 1, 0).unwrap();

        assert_eq!(
            committee.register([2u8; 32], 0, 0),
            Err(KeyShareError::InvalidShareIndex)
        );
        assert!(matches!(
            committee.register([1u8; 32], 2, 0),
            Err(KeyShareError::AlreadyRegistered(_))
        ));
        assert_eq!(
            committee.register([2u8; 32], 1, 0),
            Err(KeyShareError::IndexUnavailable(1))
        );
    }

    #[test]
    fn test_removed_index_is_retired() {
        let mut committee = committee_of(&[1, 2]);
        assert!(committee.remove(&[1u8; 32]).is_some());
        assert!(committee.remove(&[1u8; 32]).is_none());
        assert!(committee.is_retired(1));
        assert!(!committee.is_retired(2));

        assert_eq!(
            committee.register([1u8; 32], 1, 5),
            Err(KeyShareError::IndexUnavailable(1))
        );
        committee.register([1u8; 32], 7, 5).unwrap();
        assert_eq!(committee.member(&[1u8; 32]).unwrap().index, 7);

        // The holder is back under a new index; the old one stays retired.
        assert!(committee.is_retired(1));
        assert!(!committee.is_retired(7));
    }

    #[test]
    fn test_plan_removes_and_slashes_unbonded() {
        let committee = committee_of(&[1, 2, 3]);
        let snapshot = vec![
            validator(1, BondStatus::Bonded),
            validator(2, BondStatus::Unbonding),
            validator(3, BondStatus::Bonded),
            validator(4, BondStatus::Unbonded),
        ];
        let params = SlashingParams::default();

        let update = plan_committee_update(&committee, &snapshot, 100, &params);

        assert_eq!(
            update.removals,
            vec![Removal {
                validator: [2u8; 32],
                index: 2,
                reason: RemovalReason::NotBonded,
            }]
        );
        // Validator 4 is not a member but is still slashed.
        let slashed: Vec<Address> = update.slashes.iter().map(|s| s.operator).collect();
        assert_eq!(slashed, vec![[2u8; 32], [4u8; 32]]);
        assert!(update.slashes.iter().all(|s| s.infraction_height == 101));
        assert!(update.skipped.is_empty());
    }

    #[test]
    fn test_plan_only_on_removal() {
        let committee = committee_of(&[1]);
        let snapshot = vec![
            validator(1, BondStatus::Unbonded),
            validator(4, BondStatus::Unbonded),
        ];
        let params = SlashingParams {
            only_on_removal: true,
            ..Default::default()
        };

        let update = plan_committee_update(&committee, &snapshot, 10, &params);
        assert_eq!(update.slashes.len(), 1);
        assert_eq!(update.slashes[0].operator, [1u8; 32]);
    }

    #[test]
    fn test_plan_removes_members_missing_from_snapshot() {
        let committee = committee_of(&[1, 2]);
        let snapshot = vec![validator(1, BondStatus::Bonded)];

        let update = plan_committee_update(&committee, &snapshot, 10, &SlashingParams::default());
        assert_eq!(update.removals.len(), 1);
        assert_eq!(update.removals[0].reason, RemovalReason::NotInValidatorSet);
        assert!(update.slashes.is_empty());
    }

    #[test]
    fn test_lookup_failure_is_isolated() {
        let mut committee = committee_of(&[1, 2]);
        let mut broken = validator(1, BondStatus::Unbonded);
        broken.consensus_pubkey = vec![1u8; 5];
        let snapshot = vec![broken, validator(2, BondStatus::Unbonded)];

        let update = plan_committee_update(&committee, &snapshot, 10, &SlashingParams::default());
        assert_eq!(update.skipped.len(), 1);
        assert_eq!(update.slashes.len(), 1);

        let mut keeper: Vec<SlashRequest> = Vec::new();
        let events = apply_committee_update(&mut committee, update, &mut keeper);

        // Both lose their seat; only validator 2 is slashed.
        assert!(committee.is_empty());
        assert_eq!(keeper.len(), 1);
        assert_eq!(keeper[0].operator, [2u8; 32]);
        assert!(events
            .iter()
            .any(|e| matches!(e, KeyShareEvent::SlashSkipped { validator, .. } if *validator == [1u8; 32])));
    }

    #[test]
    fn test_failed_slash_does_not_block_others() {
        let mut committee = committee_of(&[1, 2]);
        let snapshot = vec![
            validator(1, BondStatus::Unbonded),
            validator(2, BondStatus::Unbonded),
        ];
        let update = plan_committee_update(&committee, &snapshot, 10, &SlashingParams::default());

        let events = apply_committee_update(&mut committee, update, &mut FailingKeeper);
        assert!(committee.is_empty());
        let skipped = events
            .iter()
            .filter(|e| matches!(e, KeyShareEvent::SlashSkipped { .. }))
            .count();
        assert_eq!(skipped, 2);
    }
}
