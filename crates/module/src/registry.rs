//! Height-indexed key-share store.
//!
//! Shares are keyed by `(height, validator)`; the map's key order gives
//! per-height range scans without touching other heights.

use std::collections::BTreeMap;

use keyshare_types::{Address, KeyShare};

use crate::error::KeyShareError;

const MIN_ADDRESS: Address = [0u8; 32];
const MAX_ADDRESS: Address = [0xffu8; 32];

/// Result of storing a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// New share stored
    Stored,
    /// Identical share already present
    Unchanged,
}

#[derive(Debug, Default, Clone)]
pub struct ShareRegistry {
    shares: BTreeMap<(u64, Address), KeyShare>,
}

impl ShareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a share. Re-submitting identical content is a no-op.
    pub fn insert(&mut self, share: KeyShare) -> Result<SubmitOutcome, KeyShareError> {
        let key = (share.height, share.validator);
        match self.shares.get(&key) {
            Some(existing) if *existing == share => Ok(SubmitOutcome::Unchanged),
            Some(_) => Err(KeyShareError::DuplicateShare {
                height: share.height,
                validator: hex::encode(share.validator),
            }),
            None => {
                self.shares.insert(key, share);
                Ok(SubmitOutcome::Stored)
            }
        }
    }

    pub fn get(&self, height: u64, validator: &Address) -> Option<&KeyShare> {
        self.shares.get(&(height, *validator))
    }

    /// All shares for `height`, ordered by index ascending.
    pub fn list(&self, height: u64) -> Vec<KeyShare> {
        let mut shares: Vec<KeyShare> = self
            .shares
            .range((height, MIN_ADDRESS)..=(height, MAX_ADDRESS))
            .map(|(_, share)| share.clone())
            .collect();
        shares.sort_by(|a, b| a.index.cmp(&b.index).then(a.validator.cmp(&b.validator)));
        shares
    }

    /// Number of shares stored for `height`.
    pub fn count(&self, height: u64) -> usize {
        self.shares
            .range((height, MIN_ADDRESS)..=(height, MAX_ADDRESS))
            .count()
    }

    /// Drop every share below `height`. Returns the number removed.
    pub fn prune_below(&mut self, height: u64) -> usize {
        let kept = self.shares.split_off(&(height, MIN_ADDRESS));
        let removed = self.shares.len();
        self.shares = kept;
        removed
    }

    pub fn len(&self) -> usize {
        self.shares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}
