//! Per-block validator key-share lifecycle.
//!
//! Committee validators each hold a Shamir share of a master secret and, for
//! every block height, submit a key share for one fixed public identity. This
//! module:
//!
//! - stores submissions by `(height, validator)` with duplicate protection
//! - drops unbonded validators from the committee and asks the host to slash them
//! - verifies the shares for a height and combines any `threshold` of them
//!   into the identity's decryption key
//! - drives the above once per block without ever failing the block on a
//!   key-share problem
//!
//! # Architecture
//!
//! - `call` / `handlers`: transactions and their business logic
//! - `queries`: read-only state access
//! - `committee`: membership and the per-block reconciliation pass
//! - `registry`: height-indexed share store
//! - `aggregation`: verification and threshold combination
//! - `scheduler`: the `begin_block` driver
//! - `state` / `genesis`: state and configuration
//! - `host`: what the module needs from the chain
//!
//! # Example
//!
//! ```ignore
//! use keyshare_module::{CallContext, KeyShareCall, KeyShareConfig, KeyShareModule};
//!
//! let mut module = KeyShareModule::new(config)?;
//! module.call(&ctx, KeyShareCall::SubmitKeyShare { height, index, share, commitment })?;
//!
//! let report = module.begin_block(&mut staking, height, &validator_snapshot)?;
//! if let Some(key) = report.aggregated_key() { /* publish */ }
//! ```

pub mod aggregation;
pub mod call;
pub mod committee;
pub mod error;
pub mod events;
pub mod genesis;
pub mod handlers;
pub mod host;
pub mod module;
pub mod queries;
pub mod registry;
pub mod scheduler;
pub mod state;

pub use aggregation::{AggregationReport, ExcludedShare};
pub use call::KeyShareCall;
pub use committee::{Committee, CommitteeMember};
pub use error::{AggregationError, KeyShareError, SchedulerError};
pub use events::{KeyShareEvent, RemovalReason};
pub use genesis::{
    AggregationParams, CommitteeRegistration, GenesisValidationError, KeyShareConfig,
    SlashingParams,
};
pub use handlers::{CallContext, HandlerResult};
pub use host::{StakingError, StakingKeeper};
pub use module::{CallOutcome, KeyShareModule};
pub use queries::{KeyShareQuery, KeyShareQueryResponse};
pub use registry::SubmitOutcome;
pub use scheduler::{AggregationStatus, BlockReport, SchedulerStats};
pub use state::KeyShareState;
