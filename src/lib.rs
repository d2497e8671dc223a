// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! # hector-ops
//!
//! Operator SDK for the timelocked allow-lists and post-deployment
//! configuration of Hector contracts on EVM chains.
//!
//! The library drives three kinds of on-chain work:
//!
//! - **Allow-lists** behind a queue/toggle timelock, walked by the
//!   [`TimelockDriver`] in bounded batches
//! - **Administrative setters** applied in order after deployment by the
//!   [`ConfigurationSequencer`]
//! - **Wallet migration** between registration contracts via
//!   [`migrate_wallets`]
//!
//! Every mutating call goes through the [`Submitter`], which retries
//! transient failures a bounded number of times and never retries a revert.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hector_ops::providers::{connect, parse_signer, AlloyBridgeSplitter, TokioClock};
//! use hector_ops::traits::TokenListSource;
//! use hector_ops::{ChainPlan, ChainProfile, LifiTokenList, Operator, OpsError};
//! use alloy_chains::NamedChain;
//! use alloy_primitives::address;
//!
//! # async fn example() -> Result<(), OpsError> {
//! let signer = parse_signer("0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d")?;
//! let deployer = signer.address();
//! let provider = connect("https://rpc.ftm.tools".parse().unwrap(), signer);
//! let splitter_address = address!("1111111111111111111111111111111111111111");
//! let splitter = AlloyBridgeSplitter::new(splitter_address, provider);
//!
//! let profile = ChainProfile::builtin(NamedChain::Fantom)?;
//! let plan = ChainPlan::bridge_splitter(&profile, deployer)?;
//!
//! let lifi: Box<dyn TokenListSource> = Box::new(LifiTokenList::production()?);
//! let operator = Operator::builder()
//!     .timelock(splitter.clone())
//!     .admin(splitter)
//!     .clock(TokioClock::new())
//!     .profile(profile)
//!     .target_address(splitter_address)
//!     .token_sources(vec![lifi])
//!     .build();
//!
//! let report = operator.run(&plan).await;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! All I/O sits behind the traits in [`traits`]. The [`testing`] module ships
//! in-memory fakes for each of them, including a timelock whose block height
//! follows a [`testing::FakeClock`].
//!
//! ## Public API
//!
//! - [`TimelockDriver`], [`ConfigurationSequencer`], [`Submitter`] and
//!   [`chunks`] - the building blocks
//! - [`ChainPlan`], [`Operator`] and [`run_tasks`] - per-chain plans
//! - [`ChainProfile`] and [`OpsConfig`] - per-chain settings
//! - [`OpsError`] and [`Result`] - error handling
//! - [`providers`] - alloy and Tokio implementations of the traits

pub mod chain;
mod chunk;
pub mod config;
mod contracts;
mod error;
mod pipeline;
pub mod providers;
mod registry;
mod report;
mod retry;
mod sequencer;
pub mod testing;
mod timelock;
mod token_list;
pub mod traits;
mod verify;

pub use chain::{ChainProfile, TokenLimits};
pub use chunk::{batch_count, chunks, Batch, Chunks};
pub use config::{ChainOverrides, ChainSettings, OpsConfig};
pub use error::{classify_message, ErrorKind, OpsError, Result, QUEUE_NOT_EXPIRED};
pub use pipeline::{run_tasks, CandidateSource, ChainPlan, ChainTask, Operator, PlanStage};
pub use registry::{migrate_wallets, MigrationOptions};
pub use report::{
    BatchReport, ChainReport, MigrationReport, RunReport, SequenceReport, StageReport,
    StepReport, StepStatus, WhitelistReport,
};
pub use retry::{RetryPolicy, SubmissionOutcome, Submitter};
pub use sequencer::{AdminStep, ConfigurationSequencer, LockRegistryInit, MAX_FEE_PERCENTAGE};
pub use timelock::{
    Activation, BatchActivation, EarlyTogglePolicy, EntityState, ManagedEntity,
    ManagingCategory, QueueRecord, TimelockDriver, TimelockOptions,
};
pub use token_list::{
    collect_candidates, normalize_candidates, CandidateList, LifiTokenList, RejectedCandidate,
    SquidTokenList, NATIVE_TOKEN_SENTINEL,
};
pub use verify::{
    EtherscanVerifier, VerificationOutcome, VerificationRequest, VerificationStatus,
    ETHERSCAN_V2_API,
};

// Public module for callers that need custom instrumentation
pub mod spans;
