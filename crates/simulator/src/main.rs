//! Local simulator for the key-share module.
//!
//! Runs an in-process chain with a dealt validator set, submitting key shares
//! and driving `begin_block` for a number of blocks.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

mod chain;
mod config;

use chain::SimChain;
use config::{SimConfig, UnbondEvent};

#[derive(Parser)]
#[command(name = "keyshare-sim")]
#[command(about = "Simulate the validator key-share lifecycle")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Produce blocks and aggregate a key per block
    Run {
        /// JSON simulation config; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of blocks to produce
        #[arg(short, long)]
        blocks: Option<u64>,

        /// Number of validators
        #[arg(short = 'n', long)]
        validators: Option<u32>,

        /// Reconstruction threshold
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Unbond a validator at a height, as INDEX@HEIGHT
        #[arg(long)]
        unbond: Vec<UnbondEvent>,

        /// Validator that submits a share with a mismatched commitment
        #[arg(long)]
        corrupt: Vec<u32>,

        /// Validator that never submits
        #[arg(long)]
        offline: Vec<u32>,
    },

    /// Write a default simulation config
    InitConfig {
        #[arg(short, long, default_value = "keyshare-sim.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("keyshare_sim=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            blocks,
            validators,
            threshold,
            unbond,
            corrupt,
            offline,
        } => {
            let mut sim = match &config {
                Some(path) => SimConfig::load(path)?,
                None => SimConfig::default(),
            };
            if let Some(blocks) = blocks {
                sim.blocks = blocks;
            }
            if let Some(validators) = validators {
                sim.validators = validators;
            }
            if let Some(threshold) = threshold {
                sim.genesis.threshold = threshold;
            }
            sim.unbond.extend(unbond);
            sim.corrupt.extend(corrupt);
            sim.offline.extend(offline);

            let blocks = sim.blocks;
            let mut chain = SimChain::new(sim)?;
            let summary = chain.run(blocks)?;

            info!(
                height = chain.height(),
                keys = summary.keys_verified,
                committee = chain.module().state().committee.len(),
                slashes = chain.staking().slashes.len(),
                "Simulation finished"
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::InitConfig { output } => {
            SimConfig::default().save(&output)?;
            info!("Wrote default config to {:?}", output);
        }
    }

    Ok(())
}
