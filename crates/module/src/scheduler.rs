//! Per-block driver.
//!
//! `begin_block` runs once per height, strictly increasing. It first reconciles
//! the committee with the host's validator snapshot, then (at scheduled
//! heights) aggregates the key for that height, then prunes old shares and
//! cached keys.
//! Aggregation errors are reported in the [`BlockReport`] and never fail the
//! block.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use keyshare_types::{AggregatedKey, ValidatorInfo};

use crate::aggregation::aggregate;
use crate::committee::{apply_committee_update, plan_committee_update};
use crate::error::{AggregationError, SchedulerError};
use crate::events::KeyShareEvent;
use crate::genesis::KeyShareConfig;
use crate::host::StakingKeeper;
use crate::state::KeyShareState;

/// Running counters kept across blocks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub blocks_processed: u64,
    pub keys_aggregated: u64,
    pub aggregation_failures: u64,
    /// Scheduled heights in a row that ended in `InsufficientShares`
    pub consecutive_shortfalls: u64,
    pub shares_excluded: u64,
    pub slashes_requested: u64,
    pub slashes_skipped: u64,
}

/// What happened to aggregation at this height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationStatus {
    NotScheduled,
    Aggregated(AggregatedKey),
    /// Key was already computed for this height
    Cached(AggregatedKey),
    Failed(AggregationError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReport {
    pub height: u64,
    pub events: Vec<KeyShareEvent>,
    pub aggregation: AggregationStatus,
}

impl BlockReport {
    pub fn aggregated_key(&self) -> Option<&AggregatedKey> {
        match &self.aggregation {
            AggregationStatus::Aggregated(key) | AggregationStatus::Cached(key) => Some(key),
            _ => None,
        }
    }
}

/// Process the start of block `height`.
///
/// Only a non-increasing height is an error; it means the host broke the
/// block-ordering contract and nothing is changed.
pub fn begin_block<S: StakingKeeper>(
    state: &mut KeyShareState,
    config: &KeyShareConfig,
    staking: &mut S,
    height: u64,
    snapshot: &[ValidatorInfo],
) -> Result<BlockReport, SchedulerError> {
    if let Some(last) = state.last_height {
        if height <= last {
            return Err(SchedulerError::NonMonotonicHeight { last, got: height });
        }
    }

    let update = plan_committee_update(&state.committee, snapshot, height, &config.slashing);
    let mut events = apply_committee_update(&mut state.committee, update, staking);
    state.record_snapshot(snapshot);

    for event in &events {
        match event {
            KeyShareEvent::SlashRequested(_) => state.stats.slashes_requested += 1,
            KeyShareEvent::SlashSkipped { .. } => state.stats.slashes_skipped += 1,
            _ => {}
        }
    }

    let aggregation = if config.aggregation.is_scheduled(height) {
        run_aggregation(state, config, height, &mut events)
    } else {
        AggregationStatus::NotScheduled
    };

    if let Some(floor) = config.aggregation.retention_floor(height) {
        let count = state.registry.prune_below(floor);
        if count > 0 {
            debug!(height, below = floor, count, "Pruned key shares");
            events.push(KeyShareEvent::SharesPruned {
                below: floor,
                count,
            });
        }

        let count = state.prune_keys_below(floor);
        if count > 0 {
            debug!(height, below = floor, count, "Pruned aggregated keys");
            events.push(KeyShareEvent::KeysPruned {
                below: floor,
                count,
            });
        }
    }

    state.stats.blocks_processed += 1;
    state.last_height = Some(height);

    Ok(BlockReport {
        height,
        events,
        aggregation,
    })
}

fn run_aggregation(
    state: &mut KeyShareState,
    config: &KeyShareConfig,
    height: u64,
    events: &mut Vec<KeyShareEvent>,
) -> AggregationStatus {
    match aggregate(state, config, height) {
        Ok(report) => {
            state.stats.consecutive_shortfalls = 0;
            if report.cached {
                return AggregationStatus::Cached(report.key);
            }

            state.stats.keys_aggregated += 1;
            state.stats.shares_excluded += report.excluded.len() as u64;
            for excluded in report.excluded {
                events.push(KeyShareEvent::ShareExcluded {
                    height,
                    validator: excluded.validator,
                    index: excluded.index,
                    reason: excluded.reason.to_string(),
                });
            }

            info!(
                height,
                key = %report.key.key.to_hex(),
                contributors = report.contributors,
                "Decryption key aggregated"
            );
            events.push(KeyShareEvent::KeyAggregated {
                height,
                key: report.key.key,
                shares: report.contributors,
            });
            AggregationStatus::Aggregated(report.key)
        }
        Err(err) => {
            state.stats.aggregation_failures += 1;
            match &err {
                AggregationError::InsufficientShares { required, got, .. } => {
                    state.stats.consecutive_shortfalls += 1;
                    let streak = state.stats.consecutive_shortfalls;
                    if streak > config.aggregation.shortfall_alert_after {
                        warn!(height, required, got, streak, "Sustained key share shortfall");
                    } else {
                        debug!(height, required, got, "Not enough key shares to aggregate");
                    }
                }
                AggregationError::MasterKeyMismatch { .. } => {
                    warn!(height, error = %err, "Aggregated key rejected");
                }
                AggregationError::CorruptState(_) => {
                    error!(height, error = %err, "Key share state is corrupt");
                }
            }

            events.push(KeyShareEvent::AggregationFailed {
                height,
                reason: err.to_string(),
                fatal: err.is_fatal(),
            });
            AggregationStatus::Failed(err)
        }
    }
}
