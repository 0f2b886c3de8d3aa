//! Query handlers for the key-share module.
//!
//! These functions provide read-only access to module state.

use serde::{Deserialize, Serialize};

use keyshare_types::{Address, AggregatedKey, KeyShare};

use crate::committee::CommitteeMember;
use crate::scheduler::SchedulerStats;
use crate::state::KeyShareState;

/// Query request types.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum KeyShareQuery {
    /// All shares for a height, ordered by index.
    GetShares { height: u64 },

    /// Number of shares stored for a height.
    GetShareCount { height: u64 },

    /// Aggregated key for exactly this height.
    GetAggregatedKey { height: u64 },

    /// Most recent aggregated key at or below a height.
    GetLatestAggregatedKey { height: u64 },

    GetCommitteeMember { address: Address },

    ListCommittee,

    GetStats,
}

/// Query response types.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyShareQueryResponse {
    Shares(Vec<KeyShare>),
    ShareCount(usize),
    AggregatedKey(Option<AggregatedKey>),
    CommitteeMember(Option<CommitteeMember>),
    /// Members ordered by address
    Committee(Vec<(Address, CommitteeMember)>),
    Stats(SchedulerStats),
}

/// Handle a query.
pub fn handle_query(state: &KeyShareState, query: KeyShareQuery) -> KeyShareQueryResponse {
    match query {
        KeyShareQuery::GetShares { height } => {
            KeyShareQueryResponse::Shares(state.registry.list(height))
        }

        KeyShareQuery::GetShareCount { height } => {
            KeyShareQueryResponse::ShareCount(state.registry.count(height))
        }

        KeyShareQuery::GetAggregatedKey { height } => {
            KeyShareQueryResponse::AggregatedKey(state.aggregated_key(height).cloned())
        }

        KeyShareQuery::GetLatestAggregatedKey { height } => {
            KeyShareQueryResponse::AggregatedKey(state.latest_aggregated_key(height).cloned())
        }

        KeyShareQuery::GetCommitteeMember { address } => {
            KeyShareQueryResponse::CommitteeMember(state.committee.member(&address).copied())
        }

        KeyShareQuery::ListCommittee => KeyShareQueryResponse::Committee(
            state
                .committee
                .members()
                .map(|(address, member)| (*address, *member))
                .collect(),
        ),

        KeyShareQuery::GetStats => KeyShareQueryResponse::Stats(state.stats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_committee_queries() {
        let mut state = KeyShareState::new();
        state.committee.register([2u8; 32], 5, 3).unwrap();
        state.committee.register([1u8; 32], 9, 4).unwrap();

        let response = handle_query(
            &state,
            KeyShareQuery::GetCommitteeMember {
                address: [2u8; 32],
            },
        );
        assert_eq!(
            response,
            KeyShareQueryResponse::CommitteeMember(Some(CommitteeMember {
                index: 5,
                registered_at: 3,
            }))
        );

        match handle_query(&state, KeyShareQuery::ListCommittee) {
            KeyShareQueryResponse::Committee(members) => {
                let addresses: Vec<Address> = members.iter().map(|(a, _)| *a).collect();
                assert_eq!(addresses, vec![[1u8; 32], [2u8; 32]]);
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn test_empty_height_queries() {
        let state = KeyShareState::new();
        assert_eq!(
            handle_query(&state, KeyShareQuery::GetShareCount { height: 1 }),
            KeyShareQueryResponse::ShareCount(0)
        );
        assert_eq!(
            handle_query(&state, KeyShareQuery::GetLatestAggregatedKey { height: 1 }),
            KeyShareQueryResponse::AggregatedKey(None)
        );
    }
}
