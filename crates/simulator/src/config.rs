//! Simulation parameters, loadable from JSON.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use keyshare_module::KeyShareConfig;

/// A validator leaving the bonded set at a given height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondEvent {
    /// Shamir index of the validator
    pub validator: u32,
    pub height: u64,
}

impl std::str::FromStr for UnbondEvent {
    type Err = anyhow::Error;

    /// Parses `INDEX@HEIGHT`.
    fn from_str(s: &str) -> Result<Self> {
        let (validator, height) = s
            .split_once('@')
            .context("expected INDEX@HEIGHT")?;
        Ok(Self {
            validator: validator.parse().context("invalid validator index")?,
            height: height.parse().context("invalid height")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Module genesis; the committee is filled in from the simulated set
    /// when left empty
    #[serde(default)]
    pub genesis: KeyShareConfig,

    /// Number of simulated validators
    pub validators: u32,

    /// Number of blocks to produce
    pub blocks: u64,

    /// Seed for dealing the master secret
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default)]
    pub unbond: Vec<UnbondEvent>,

    /// Validators that never submit shares
    #[serde(default)]
    pub offline: Vec<u32>,

    /// Validators whose commitment does not match their share
    #[serde(default)]
    pub corrupt: Vec<u32>,
}

fn default_seed() -> u64 {
    12345
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            genesis: KeyShareConfig::default(),
            validators: 4,
            blocks: 10,
            seed: default_seed(),
            unbond: Vec::new(),
            offline: Vec::new(),
            corrupt: Vec::new(),
        }
    }
}

impl SimConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.validators == 0 {
            bail!("at least one validator is required");
        }
        if self.genesis.threshold > self.validators {
            bail!(
                "threshold {} exceeds validator count {}",
                self.genesis.threshold,
                self.validators
            );
        }
        let in_range = |index: &u32| (1..=self.validators).contains(index);
        if let Some(event) = self.unbond.iter().find(|e| !in_range(&e.validator)) {
            bail!("unbond event for unknown validator {}", event.validator);
        }
        if let Some(index) = self
            .offline
            .iter()
            .chain(self.corrupt.iter())
            .find(|i| !in_range(i))
        {
            bail!("unknown validator {index}");
        }
        Ok(())
    }
}
