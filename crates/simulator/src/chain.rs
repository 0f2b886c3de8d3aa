//! Mock chain driving the key-share module.
//!
//! Every simulated block the chain
//!
//! 1. applies scheduled unbonding,
//! 2. lets each committee validator submit its key share for the block,
//! 3. runs the module's `begin_block` with the current validator snapshot,
//! 4. checks any freshly aggregated key by decrypting a test message.

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use bls12_381::Scalar;
use rand::rngs::{OsRng, StdRng};
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use keyshare_crypto::sharing::{deal_shares, extract_key_share, master_public_key, random_scalar};
use keyshare_crypto::{decrypt, encrypt};
use keyshare_module::{
    AggregationStatus, BlockReport, CallContext, CommitteeRegistration, KeyShareCall,
    KeyShareError, KeyShareModule, SchedulerStats, StakingError, StakingKeeper,
};
use keyshare_types::{
    sha256, Address, AggregatedKey, BondStatus, G1Point, SlashRequest, ValidatorInfo,
};

use crate::config::SimConfig;

/// Stake each simulated validator starts with.
pub const INITIAL_STAKE: u64 = 1_000_000;

#[derive(Debug, Clone)]
pub struct SimValidator {
    pub index: u32,
    pub address: Address,
    pub consensus_pubkey: Vec<u8>,
    pub status: BondStatus,
    pub slash_count: u32,
    secret_share: Scalar,
    online: bool,
    corrupt: bool,
}

impl SimValidator {
    fn info(&self) -> ValidatorInfo {
        ValidatorInfo {
            operator: self.address,
            consensus_pubkey: self.consensus_pubkey.clone(),
            status: self.status,
            slash_count: self.slash_count,
        }
    }
}

/// Host staking subsystem: burns the slashed fraction of stake.
#[derive(Debug, Default)]
pub struct StakeLedger {
    pub stakes: BTreeMap<Address, u64>,
    pub slashes: Vec<SlashRequest>,
}

impl StakingKeeper for StakeLedger {
    fn request_slash(&mut self, request: &SlashRequest) -> Result<(), StakingError> {
        let stake = self
            .stakes
            .get_mut(&request.operator)
            .ok_or_else(|| StakingError(format!("no stake for {}", hex::encode(request.operator))))?;
        let burned = request.fraction.apply(*stake);
        *stake -= burned;
        self.slashes.push(request.clone());
        Ok(())
    }
}

/// Totals reported at the end of a run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SimSummary {
    pub blocks: u64,
    pub keys_aggregated: u64,
    pub keys_verified: u64,
    pub rejected_submissions: u64,
    pub slashes: usize,
    pub committee_size: usize,
    pub module: SchedulerStats,
}

pub struct SimChain {
    module: KeyShareModule,
    validators: Vec<SimValidator>,
    staking: StakeLedger,
    master_public_key: G1Point,
    unbond: BTreeMap<u64, Vec<u32>>,
    height: u64,
    summary: SimSummary,
}

fn operator_address(index: u32) -> Address {
    sha256(format!("keyshare-sim/operator/{index}").as_bytes())
}

fn consensus_pubkey(index: u32) -> Vec<u8> {
    sha256(format!("keyshare-sim/consensus/{index}").as_bytes()).to_vec()
}

impl SimChain {
    /// Deal the master secret and build the genesis state.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let secret = random_scalar(&mut rng);
        let dealt = deal_shares(
            &secret,
            config.genesis.threshold as usize,
            config.validators,
            &mut rng,
        );

        let validators: Vec<SimValidator> = dealt
            .into_iter()
            .map(|(index, secret_share)| SimValidator {
                index,
                address: operator_address(index),
                consensus_pubkey: consensus_pubkey(index),
                status: BondStatus::Bonded,
                slash_count: 0,
                secret_share,
                online: !config.offline.contains(&index),
                corrupt: config.corrupt.contains(&index),
            })
            .collect();

        let master_public_key = master_public_key(&secret);
        let mut genesis = config.genesis;
        if genesis.validators.is_empty() {
            genesis.validators = validators
                .iter()
                .map(|v| CommitteeRegistration {
                    address: v.address,
                    index: v.index,
                })
                .collect();
        }
        if genesis.master_public_key.is_none() {
            genesis.master_public_key = Some(master_public_key);
        }

        let module = KeyShareModule::new(genesis).context("invalid genesis configuration")?;

        let mut unbond: BTreeMap<u64, Vec<u32>> = BTreeMap::new();
        for event in config.unbond {
            unbond.entry(event.height).or_default().push(event.validator);
        }

        let staking = StakeLedger {
            stakes: validators
                .iter()
                .map(|v| (v.address, INITIAL_STAKE))
                .collect(),
            slashes: Vec::new(),
        };

        info!(
            validators = validators.len(),
            threshold = module.config().threshold,
            mpk = %master_public_key.to_hex(),
            "Genesis"
        );

        Ok(Self {
            module,
            validators,
            staking,
            master_public_key,
            unbond,
            height: 0,
            summary: SimSummary::default(),
        })
    }

    pub fn module(&self) -> &KeyShareModule {
        &self.module
    }

    pub fn staking(&self) -> &StakeLedger {
        &self.staking
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Produce one block.
    pub fn advance_block(&mut self) -> Result<BlockReport> {
        let height = self.height + 1;

        if let Some(indices) = self.unbond.remove(&height) {
            for validator in self
                .validators
                .iter_mut()
                .filter(|v| indices.contains(&v.index))
            {
                info!(height, index = validator.index, "Validator begins unbonding");
                validator.status = BondStatus::Unbonding;
            }
        }

        self.submit_shares(height);

        let snapshot: Vec<ValidatorInfo> = self.validators.iter().map(SimValidator::info).collect();
        let report = self
            .module
            .begin_block(&mut self.staking, height, &snapshot)?;
        self.height = height;

        for request in &self.staking.slashes[self.summary.slashes..] {
            if let Some(v) = self
                .validators
                .iter_mut()
                .find(|v| v.address == request.operator)
            {
                v.slash_count += 1;
            }
        }
        self.summary.slashes = self.staking.slashes.len();

        match &report.aggregation {
            AggregationStatus::Aggregated(key) => {
                self.summary.keys_aggregated += 1;
                self.check_key(key)?;
            }
            AggregationStatus::Failed(err) => {
                debug!(height, error = %err, "No key this block");
            }
            AggregationStatus::NotScheduled | AggregationStatus::Cached(_) => {}
        }

        Ok(report)
    }

    /// Submit this block's shares from every online validator.
    fn submit_shares(&mut self, height: u64) {
        let identity = self.module.config().identity_bytes().to_vec();

        for validator in self.validators.iter().filter(|v| v.online) {
            let (share, mut commitment) = extract_key_share(&validator.secret_share, &identity);
            if validator.corrupt {
                commitment = master_public_key(&(validator.secret_share + Scalar::from(1u64)));
            }

            let ctx = CallContext {
                sender: validator.address,
                block_height: height.saturating_sub(1),
            };
            let call = KeyShareCall::SubmitKeyShare {
                height,
                index: validator.index,
                share: share.0.to_vec(),
                commitment: commitment.0.to_vec(),
            };

            match self.module.call(&ctx, call) {
                Ok(_) => {}
                Err(KeyShareError::UnknownValidator(_)) => {
                    debug!(height, index = validator.index, "Submission from non-member rejected");
                    self.summary.rejected_submissions += 1;
                }
                Err(e) => {
                    warn!(height, index = validator.index, error = %e, "Submission rejected");
                    self.summary.rejected_submissions += 1;
                }
            }
        }
    }

    /// Encrypt to the identity under the master key and open with `key`.
    fn check_key(&mut self, key: &AggregatedKey) -> Result<()> {
        let message = format!("block {}", key.height);
        let ciphertext = encrypt(
            &self.master_public_key,
            &key.identity,
            message.as_bytes(),
            &mut OsRng,
        )?;
        let opened = decrypt(&ciphertext, &key.key)?;
        if opened != message.as_bytes() {
            return Err(anyhow!("aggregated key at height {} decrypted garbage", key.height));
        }
        self.summary.keys_verified += 1;
        Ok(())
    }

    /// Run `blocks` blocks and return the totals.
    pub fn run(&mut self, blocks: u64) -> Result<SimSummary> {
        for _ in 0..blocks {
            let report = self.advance_block()?;
            if let Some(key) = report.aggregated_key() {
                info!(height = report.height, key = %key.key.to_hex(), "Block key");
            }
        }
        Ok(self.summary())
    }

    pub fn summary(&self) -> SimSummary {
        SimSummary {
            blocks: self.height,
            committee_size: self
                .validators
                .iter()
                .filter(|v| self.module.is_committee_member(&v.address))
                .count(),
            module: self.module.state().stats,
            ..self.summary.clone()
        }
    }
}
