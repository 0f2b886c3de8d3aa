//! The key-share module as seen by the host chain.

use keyshare_types::{Address, AggregatedKey, KeyShare, ValidatorInfo};

use crate::aggregation::{aggregate, AggregationReport};
use crate::call::KeyShareCall;
use crate::error::{AggregationError, KeyShareError, SchedulerError};
use crate::genesis::{GenesisValidationError, KeyShareConfig};
use crate::handlers::{self, CallContext, HandlerResult};
use crate::host::StakingKeeper;
use crate::queries::{handle_query, KeyShareQuery, KeyShareQueryResponse};
use crate::registry::SubmitOutcome;
use crate::scheduler::{self, BlockReport};
use crate::state::KeyShareState;

/// Result of a successfully dispatched call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Registered { index: u32 },
    ShareSubmitted(SubmitOutcome),
}

/// Configuration and state, with the entry points the host drives.
#[derive(Debug, Clone)]
pub struct KeyShareModule {
    config: KeyShareConfig,
    state: KeyShareState,
}

impl KeyShareModule {
    /// Build the module from a genesis configuration.
    ///
    /// Genesis validators are seated at height 0 without a bond check; the
    /// first `begin_block` reconciles them with the live validator set.
    pub fn new(config: KeyShareConfig) -> Result<Self, GenesisValidationError> {
        config.validate()?;

        let mut state = KeyShareState::new();
        for registration in &config.validators {
            state
                .committee
                .register(registration.address, registration.index, 0)
                .map_err(|e| match e {
                    KeyShareError::AlreadyRegistered(addr) => {
                        GenesisValidationError::DuplicateValidator(addr)
                    }
                    _ => GenesisValidationError::InvalidIndex(registration.index),
                })?;
        }

        Ok(Self { config, state })
    }

    pub fn config(&self) -> &KeyShareConfig {
        &self.config
    }

    pub fn state(&self) -> &KeyShareState {
        &self.state
    }

    /// Dispatch a validator transaction.
    pub fn call(&mut self, ctx: &CallContext, call: KeyShareCall) -> HandlerResult<CallOutcome> {
        match call {
            KeyShareCall::RegisterValidator { index } => {
                handlers::handle_register_validator(&mut self.state, ctx, index)?;
                Ok(CallOutcome::Registered { index })
            }
            KeyShareCall::SubmitKeyShare {
                height,
                index,
                share,
                commitment,
            } => handlers::handle_submit_key_share(
                &mut self.state,
                ctx,
                height,
                index,
                &share,
                &commitment,
            )
            .map(CallOutcome::ShareSubmitted),
        }
    }

    pub fn register_validator(&mut self, ctx: &CallContext, index: u32) -> HandlerResult<()> {
        handlers::handle_register_validator(&mut self.state, ctx, index)
    }

    pub fn submit_key_share(
        &mut self,
        ctx: &CallContext,
        height: u64,
        index: u32,
        share: &[u8],
        commitment: &[u8],
    ) -> HandlerResult<SubmitOutcome> {
        handlers::handle_submit_key_share(&mut self.state, ctx, height, index, share, commitment)
    }

    /// Start-of-block hook.
    pub fn begin_block<S: StakingKeeper>(
        &mut self,
        staking: &mut S,
        height: u64,
        snapshot: &[ValidatorInfo],
    ) -> Result<BlockReport, SchedulerError> {
        scheduler::begin_block(&mut self.state, &self.config, staking, height, snapshot)
    }

    /// Aggregate the key for `height` outside the block schedule.
    pub fn aggregate(&mut self, height: u64) -> Result<AggregationReport, AggregationError> {
        aggregate(&mut self.state, &self.config, height)
    }

    pub fn list_shares(&self, height: u64) -> Vec<KeyShare> {
        self.state.registry.list(height)
    }

    pub fn count_shares(&self, height: u64) -> usize {
        self.state.registry.count(height)
    }

    pub fn aggregated_key(&self, height: u64) -> Option<&AggregatedKey> {
        self.state.aggregated_key(height)
    }

    pub fn is_committee_member(&self, address: &Address) -> bool {
        self.state.committee.contains(address)
    }

    pub fn query(&self, query: KeyShareQuery) -> KeyShareQueryResponse {
        handle_query(&self.state, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::CommitteeRegistration;
    use bls12_381::Scalar;
    use keyshare_crypto::sharing::extract_key_share;
    use keyshare_types::{BondStatus, SlashRequest};

    fn genesis(ids: &[u8]) -> KeyShareConfig {
        KeyShareConfig {
            threshold: 1,
            validators: ids
                .iter()
                .map(|id| CommitteeRegistration {
                    address: [*id; 32],
                    index: *id as u32,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_genesis_committee() {
        let module = KeyShareModule::new(genesis(&[1, 2])).unwrap();
        assert!(module.is_committee_member(&[1u8; 32]));
        assert!(module.is_committee_member(&[2u8; 32]));
        assert!(!module.is_committee_member(&[3u8; 32]));

        let bad = KeyShareConfig {
            threshold: 0,
            ..Default::default()
        };
        assert!(KeyShareModule::new(bad).is_err());
    }

    #[test]
    fn test_call_dispatch() {
        let mut module = KeyShareModule::new(genesis(&[1])).unwrap();
        let ctx = CallContext {
            sender: [1u8; 32],
            block_height: 3,
        };
        let (share, commitment) =
            extract_key_share(&Scalar::from(5u64), module.config().identity_bytes());

        let outcome = module
            .call(
                &ctx,
                KeyShareCall::SubmitKeyShare {
                    height: 4,
                    index: 1,
                    share: share.0.to_vec(),
                    commitment: commitment.0.to_vec(),
                },
            )
            .unwrap();
        assert_eq!(outcome, CallOutcome::ShareSubmitted(SubmitOutcome::Stored));
        assert_eq!(module.count_shares(4), 1);

        let newcomer = CallContext {
            sender: [2u8; 32],
            block_height: 3,
        };
        // Refused until a snapshot shows the sender bonded.
        assert!(matches!(
            module.call(&newcomer, KeyShareCall::RegisterValidator { index: 2 }),
            Err(KeyShareError::NotBonded(_))
        ));

        let snapshot: Vec<ValidatorInfo> = [1u8, 2]
            .iter()
            .map(|id| ValidatorInfo {
                operator: [*id; 32],
                consensus_pubkey: vec![*id; 32],
                status: BondStatus::Bonded,
                slash_count: 0,
            })
            .collect();
        let mut keeper: Vec<SlashRequest> = Vec::new();
        module.begin_block(&mut keeper, 3, &snapshot).unwrap();

        assert_eq!(
            module.call(&newcomer, KeyShareCall::RegisterValidator { index: 2 }),
            Ok(CallOutcome::Registered { index: 2 })
        );
    }

    #[test]
    fn test_begin_block_reconciles_genesis() {
        let mut module = KeyShareModule::new(genesis(&[1, 2])).unwrap();
        let snapshot = vec![ValidatorInfo {
            operator: [1u8; 32],
            consensus_pubkey: vec![1u8; 32],
            status: BondStatus::Bonded,
            slash_count: 0,
        }];
        let mut keeper: Vec<SlashRequest> = Vec::new();

        module.begin_block(&mut keeper, 1, &snapshot).unwrap();
        assert!(module.is_committee_member(&[1u8; 32]));
        assert!(!module.is_committee_member(&[2u8; 32]));
        assert!(keeper.is_empty());
    }
}
