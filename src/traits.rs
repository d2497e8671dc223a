// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Core trait abstractions for operator workflows.
//!
//! Every piece of I/O the drivers perform sits behind one of these traits:
//! timelock contract calls, administrative calls, wallet registries, token
//! list APIs, explorer verification, and time. Production implementations
//! live in [`crate::providers`]; in-memory fakes live in [`crate::testing`].
//!
//! # Example: Implementing a Test Fake
//!
//! ```rust,ignore
//! use hector_ops::traits::Clock;
//!
//! struct InstantClock;
//!
//! #[async_trait::async_trait]
//! impl Clock for InstantClock {
//!     async fn sleep(&self, _duration: Duration) {}
//!     fn now(&self) -> Instant {
//!         Instant::now()
//!     }
//! }
//! ```

use alloy_primitives::{Address, TxHash};
use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::error::Result;
use crate::sequencer::AdminStep;
use crate::timelock::{EntityState, ManagingCategory};
use crate::verify::{VerificationRequest, VerificationStatus};

/// A contract exposing the queue/toggle timelock over managed allow-lists.
///
/// Mutating calls resolve once the transaction is mined and return its hash.
/// A mined-but-reverted transaction is an error.
///
/// # Test Scenarios
///
/// Implementing this trait with fakes enables testing:
/// - Toggling before the queue delay has elapsed
/// - Re-queuing entities that are already active
/// - Transient RPC failures in the middle of a batch
/// - All-or-nothing batch reverts
#[async_trait]
pub trait TimelockContract: Send + Sync {
    /// Current block height of the chain the contract lives on.
    async fn block_number(&self) -> Result<u64>;

    /// Number of blocks a queued change must wait before it can be toggled.
    async fn required_delay(&self) -> Result<u64>;

    /// On-chain state of `address` in the `category` allow-list.
    async fn entity_state(&self, category: ManagingCategory, address: Address)
        -> Result<EntityState>;

    async fn queue(&self, category: ManagingCategory, address: Address) -> Result<TxHash>;

    async fn toggle(&self, category: ManagingCategory, address: Address) -> Result<TxHash>;

    /// Queues every address in one transaction. All-or-nothing.
    async fn queue_many(&self, category: ManagingCategory, addresses: &[Address])
        -> Result<TxHash>;

    /// Toggles every address in one transaction. All-or-nothing.
    async fn toggle_many(
        &self,
        category: ManagingCategory,
        addresses: &[Address],
    ) -> Result<TxHash>;

    /// Removes `address` from the allow-list, returning it to `Unqueued`.
    async fn remove(&self, category: ManagingCategory, address: Address) -> Result<TxHash>;
}

/// A freshly deployed contract receiving post-deployment administrative calls.
#[async_trait]
pub trait AdminTarget: Send + Sync {
    /// Returns true when the step's effect is already present on chain, so a
    /// re-run can skip it.
    async fn is_applied(&self, step: &AdminStep) -> Result<bool>;

    /// Sends the transaction for `step` and waits for it to be mined.
    async fn apply(&self, step: &AdminStep) -> Result<TxHash>;
}

/// A wallet registration contract.
#[async_trait]
pub trait WalletRegistry: Send + Sync {
    async fn all_wallets(&self) -> Result<Vec<Address>>;

    async fn register_wallets(&self, wallets: &[Address]) -> Result<TxHash>;
}

/// An HTTP token list keyed by EVM chain id.
///
/// Returns raw address strings; validation happens in
/// [`crate::token_list::normalize_candidates`].
#[async_trait]
pub trait TokenListSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, chain_id: u64) -> Result<Vec<String>>;
}

/// A block explorer source verification service.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, request: &VerificationRequest) -> Result<VerificationStatus>;
}

/// Trait for time-based operations.
///
/// This trait abstracts sleep and time queries, enabling fast-forward testing
/// where tests can instantly advance through retry delays and timelock waits
/// without actually waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Asynchronously sleeps for the given duration.
    async fn sleep(&self, duration: Duration);

    /// Returns the current instant in time.
    fn now(&self) -> Instant;
}
