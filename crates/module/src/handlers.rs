//! Call handlers for the key-share module.
//!
//! These functions implement the business logic for each call type.

use tracing::{debug, info};

use keyshare_crypto::curve::{decompress_g1, decompress_g2};
use keyshare_crypto::CurveGroup;
use keyshare_types::{Address, BondStatus, G1Point, G2Point, KeyShare};

use crate::error::KeyShareError;
use crate::registry::SubmitOutcome;
use crate::state::KeyShareState;

/// Context provided by the runtime for each call.
#[derive(Debug, Clone, Copy)]
pub struct CallContext {
    /// Sender of the transaction
    pub sender: Address,
    /// Current block height
    pub block_height: u64,
}

/// Result type for handlers.
pub type HandlerResult<T> = Result<T, KeyShareError>;

/// Handle RegisterValidator call.
///
/// The sender must be bonded in the latest validator snapshot. Until the
/// first `begin_block` records one, every registration is refused.
pub fn handle_register_validator(
    state: &mut KeyShareState,
    ctx: &CallContext,
    index: u32,
) -> HandlerResult<()> {
    if state.bond_status(&ctx.sender) != Some(BondStatus::Bonded) {
        return Err(KeyShareError::NotBonded(hex::encode(ctx.sender)));
    }

    state
        .committee
        .register(ctx.sender, index, ctx.block_height)?;

    info!(
        validator = %hex::encode(ctx.sender),
        index,
        height = ctx.block_height,
        "Validator joined committee"
    );
    Ok(())
}

/// Handle SubmitKeyShare call.
pub fn handle_submit_key_share(
    state: &mut KeyShareState,
    ctx: &CallContext,
    height: u64,
    index: u32,
    share: &[u8],
    commitment: &[u8],
) -> HandlerResult<SubmitOutcome> {
    // Validate encodings before touching state
    let share = G2Point(
        share
            .try_into()
            .map_err(|_| KeyShareError::MalformedPoint(CurveGroup::Share))?,
    );
    decompress_g2(&share)?;
    let commitment = G1Point(
        commitment
            .try_into()
            .map_err(|_| KeyShareError::MalformedPoint(CurveGroup::Commitment))?,
    );
    decompress_g1(&commitment)?;

    let member = state
        .committee
        .member(&ctx.sender)
        .ok_or_else(|| KeyShareError::UnknownValidator(hex::encode(ctx.sender)))?;

    if member.index != index {
        return Err(KeyShareError::IndexMismatch {
            validator: hex::encode(ctx.sender),
            registered: member.index,
            submitted: index,
        });
    }

    let outcome = state.registry.insert(KeyShare {
        height,
        validator: ctx.sender,
        index,
        share,
        commitment,
    })?;

    debug!(
        height,
        validator = %hex::encode(ctx.sender),
        index,
        ?outcome,
        "Key share submitted"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bls12_381::Scalar;
    use keyshare_crypto::sharing::extract_key_share;
    use keyshare_types::ValidatorInfo;

    const IDENTITY: &[u8] = b"test-identity";

    fn ctx(id: u8) -> CallContext {
        CallContext {
            sender: [id; 32],
            block_height: 10,
        }
    }

    fn key_share(secret: u64) -> (Vec<u8>, Vec<u8>) {
        let (share, commitment) = extract_key_share(&Scalar::from(secret), IDENTITY);
        (share.0.to_vec(), commitment.0.to_vec())
    }

    fn validator(id: u8, status: BondStatus) -> ValidatorInfo {
        ValidatorInfo {
            operator: [id; 32],
            consensus_pubkey: vec![id; 32],
            status,
            slash_count: 0,
        }
    }

    fn state_with_member(id: u8, index: u32) -> KeyShareState {
        let mut state = KeyShareState::new();
        state.record_snapshot(&[validator(id, BondStatus::Bonded)]);
        handle_register_validator(&mut state, &ctx(id), index).unwrap();
        state
    }

    #[test]
    fn test_submit_and_resubmit() {
        let mut state = state_with_member(1, 1);
        let (share, commitment) = key_share(11);

        assert_eq!(
            handle_submit_key_share(&mut state, &ctx(1), 20, 1, &share, &commitment),
            Ok(SubmitOutcome::Stored)
        );
        assert_eq!(
            handle_submit_key_share(&mut state, &ctx(1), 20, 1, &share, &commitment),
            Ok(SubmitOutcome::Unchanged)
        );

        let (other, other_commitment) = key_share(12);
        assert!(matches!(
            handle_submit_key_share(&mut state, &ctx(1), 20, 1, &other, &other_commitment),
            Err(KeyShareError::DuplicateShare { height: 20, .. })
        ));
        assert_eq!(state.registry.count(20), 1);
    }

    #[test]
    fn test_malformed_points_rejected() {
        let mut state = state_with_member(1, 1);
        let (share, commitment) = key_share(11);

        assert_eq!(
            handle_submit_key_share(&mut state, &ctx(1), 20, 1, &share[..95], &commitment),
            Err(KeyShareError::MalformedPoint(CurveGroup::Share))
        );
        assert_eq!(
            handle_submit_key_share(&mut state, &ctx(1), 20, 1, &share, &[0xffu8; 48]),
            Err(KeyShareError::MalformedPoint(CurveGroup::Commitment))
        );

        // Compressed point at infinity
        let mut infinity = [0u8; 48];
        infinity[0] = 0xc0;
        assert_eq!(
            handle_submit_key_share(&mut state, &ctx(1), 20, 1, &share, &infinity),
            Err(KeyShareError::MalformedPoint(CurveGroup::Commitment))
        );
        assert!(state.registry.is_empty());
    }

    #[test]
    fn test_unknown_validator_and_index_mismatch() {
        let mut state = state_with_member(1, 1);
        let (share, commitment) = key_share(11);

        assert!(matches!(
            handle_submit_key_share(&mut state, &ctx(2), 20, 2, &share, &commitment),
            Err(KeyShareError::UnknownValidator(_))
        ));
        assert!(matches!(
            handle_submit_key_share(&mut state, &ctx(1), 20, 3, &share, &commitment),
            Err(KeyShareError::IndexMismatch {
                registered: 1,
                submitted: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_registration_requires_bonded_snapshot_entry() {
        let mut state = KeyShareState::new();

        // No snapshot yet: nobody is a known validator.
        assert!(matches!(
            handle_register_validator(&mut state, &ctx(1), 1),
            Err(KeyShareError::NotBonded(_))
        ));

        state.record_snapshot(&[
            validator(1, BondStatus::Unbonding),
            validator(3, BondStatus::Bonded),
        ]);
        assert!(matches!(
            handle_register_validator(&mut state, &ctx(1), 1),
            Err(KeyShareError::NotBonded(_))
        ));
        assert!(matches!(
            handle_register_validator(&mut state, &ctx(2), 2),
            Err(KeyShareError::NotBonded(_))
        ));
        assert!(state.committee.is_empty());

        handle_register_validator(&mut state, &ctx(3), 3).unwrap();
        assert_eq!(state.committee.member(&[3u8; 32]).map(|m| m.index), Some(3));
    }
}
