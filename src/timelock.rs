// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Two-phase timelock driver.
//!
//! Allow-listed entities (bridge contracts, bridge assets) move through a
//! queue/toggle timelock held on chain:
//!
//! ```text
//! Unqueued --queue--> Queued --toggle (after delay)--> Active
//!     ^                  |                               |
//!     +-----remove-------+-------------remove------------+
//! ```
//!
//! The driver holds no authoritative state. It reads the entity's on-chain
//! state before every transition, so re-running it against entities that are
//! already active is a no-op.

use std::fmt;
use std::slice;
use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::{Address, TxHash};
use bon::Builder;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};

use crate::chunk::chunks;
use crate::error::{OpsError, Result};
use crate::retry::{RetryPolicy, Submitter};
use crate::spans;
use crate::traits::{Clock, TimelockContract};

/// Which allow-list an entity belongs to. Discriminants match the contract's
/// `MANAGING` enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ManagingCategory {
    ReserveBridges = 0,
    ReserveBridgeAssets = 1,
}

impl ManagingCategory {
    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::ReserveBridges),
            1 => Some(Self::ReserveBridgeAssets),
            _ => None,
        }
    }
}

impl fmt::Display for ManagingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagingCategory::ReserveBridges => f.write_str("RESERVE_BRIDGES"),
            ManagingCategory::ReserveBridgeAssets => f.write_str("RESERVE_BRIDGE_ASSETS"),
        }
    }
}

impl FromStr for ManagingCategory {
    type Err = OpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "bridges" | "reserve_bridges" | "0" => Ok(Self::ReserveBridges),
            "assets" | "reserve_bridge_assets" | "1" => Ok(Self::ReserveBridgeAssets),
            other => Err(OpsError::InvalidConfig(format!(
                "unknown managing category: {other}"
            ))),
        }
    }
}

/// An address in one of the managed allow-lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManagedEntity {
    pub category: ManagingCategory,
    pub address: Address,
}

impl ManagedEntity {
    pub fn new(category: ManagingCategory, address: Address) -> Self {
        Self { category, address }
    }

    pub fn bridge(address: Address) -> Self {
        Self::new(ManagingCategory::ReserveBridges, address)
    }

    pub fn asset(address: Address) -> Self {
        Self::new(ManagingCategory::ReserveBridgeAssets, address)
    }
}

impl fmt::Display for ManagedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.address)
    }
}

/// When an entity was queued and how long it must wait, in blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueRecord {
    pub queued_at: u64,
    pub required_delay: u64,
}

impl QueueRecord {
    pub fn new(queued_at: u64, required_delay: u64) -> Self {
        Self {
            queued_at,
            required_delay,
        }
    }

    /// First block at which `toggle` is accepted.
    pub fn ready_at(&self) -> u64 {
        self.queued_at.saturating_add(self.required_delay)
    }

    pub fn is_ready(&self, block: u64) -> bool {
        block >= self.ready_at()
    }

    /// Blocks left until the entity can be toggled.
    pub fn remaining(&self, block: u64) -> u64 {
        self.ready_at().saturating_sub(block)
    }
}

/// On-chain lifecycle state of a managed entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    Unqueued,
    Queued(QueueRecord),
    Active,
}

impl EntityState {
    pub fn is_active(&self) -> bool {
        matches!(self, EntityState::Active)
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, EntityState::Queued(_))
    }

    pub fn is_unqueued(&self) -> bool {
        matches!(self, EntityState::Unqueued)
    }

    pub fn queue_record(&self) -> Option<QueueRecord> {
        match self {
            EntityState::Queued(record) => Some(*record),
            _ => None,
        }
    }
}

/// What the driver does when an entity is not yet ready to toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlyTogglePolicy {
    /// Poll the block height until the delay has elapsed, then toggle.
    #[default]
    WaitForExpiry,
    /// Fail with [`OpsError::QueueNotExpired`] instead of waiting.
    Abort,
}

/// Tuning for [`TimelockDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelockOptions {
    /// Lists with at least this many entries use `queueMany`/`toggleMany`.
    pub batch_threshold: usize,
    /// Maximum entries per `toggleMany` call.
    pub toggle_limit: usize,
    pub early_toggle: EarlyTogglePolicy,
    /// Seconds between block height polls while waiting out the delay.
    pub poll_interval_secs: u64,
    /// Upper bound on block height polls before giving up.
    pub max_polls: u32,
    pub retry: RetryPolicy,
}

impl Default for TimelockOptions {
    fn default() -> Self {
        Self {
            batch_threshold: 2,
            toggle_limit: 40,
            early_toggle: EarlyTogglePolicy::WaitForExpiry,
            poll_interval_secs: 15,
            max_polls: 240,
            retry: RetryPolicy::default(),
        }
    }
}

impl TimelockOptions {
    pub fn with_batch_threshold(mut self, threshold: usize) -> Self {
        self.batch_threshold = threshold.max(1);
        self
    }

    pub fn with_toggle_limit(mut self, limit: usize) -> Self {
        self.toggle_limit = limit;
        self
    }

    pub fn with_early_toggle(mut self, policy: EarlyTogglePolicy) -> Self {
        self.early_toggle = policy;
        self
    }

    pub fn with_poll_interval_secs(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn with_max_polls(mut self, polls: u32) -> Self {
        self.max_polls = polls;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Result of activating a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Activated { record: QueueRecord },
    AlreadyActive,
}

/// Result of activating a list of entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchActivation {
    pub activated: Vec<Address>,
    /// Entities that were already active and left untouched.
    pub skipped: Vec<Address>,
}

/// Drives entities through the queue/toggle timelock.
///
/// # Example
///
/// ```rust,ignore
/// let driver = TimelockDriver::builder()
///     .contract(AlloyBridgeSplitter::new(splitter_address, provider))
///     .clock(TokioClock::new())
///     .options(TimelockOptions::default().with_toggle_limit(40))
///     .build();
///
/// driver.activate(ManagedEntity::bridge(LIFI_DIAMOND)).await?;
/// ```
#[derive(Builder, Clone, Debug)]
pub struct TimelockDriver<T, C>
where
    T: TimelockContract,
    C: Clock + Clone,
{
    contract: T,
    clock: C,
    #[builder(default)]
    options: TimelockOptions,
}

impl<T, C> TimelockDriver<T, C>
where
    T: TimelockContract,
    C: Clock + Clone,
{
    pub fn contract(&self) -> &T {
        &self.contract
    }

    pub fn options(&self) -> &TimelockOptions {
        &self.options
    }

    fn submitter(&self) -> Submitter<C> {
        Submitter::new(self.options.retry, self.clock.clone())
    }

    /// Reads the entity's on-chain state, retrying transient RPC failures.
    pub async fn state(&self, entity: ManagedEntity) -> Result<EntityState> {
        self.submitter()
            .submit("entityState", || {
                self.contract.entity_state(entity.category, entity.address)
            })
            .await
            .into_result()
    }

    async fn block_number(&self) -> Result<u64> {
        self.submitter()
            .submit("blockNumber", || self.contract.block_number())
            .await
            .into_result()
    }

    /// Queues `entity` and returns the observed queue record.
    ///
    /// Queuing an active entity is rejected with [`OpsError::AlreadyActive`].
    pub async fn queue(&self, entity: ManagedEntity) -> Result<QueueRecord> {
        let span = spans::timelock_transition("queue", &entity);
        async {
            if self.state(entity).await?.is_active() {
                return Err(OpsError::AlreadyActive {
                    category: entity.category,
                    address: entity.address,
                });
            }

            let tx_hash = self
                .submitter()
                .submit_tx(
                    "queue",
                    || self.contract.queue(entity.category, entity.address),
                    || {
                        self.all_in_state(
                            entity.category,
                            slice::from_ref(&entity.address),
                            EntityState::is_queued,
                        )
                    },
                )
                .await
                .into_result()?;

            let record = self.observed_record(entity).await?;
            info!(
                entity = %entity,
                tx_hash = %tx_hash,
                ready_at = record.ready_at(),
                event = "entity_queued"
            );
            Ok(record)
        }
        .instrument(span)
        .await
    }

    /// Toggles a queued entity to active, honouring the early-toggle policy,
    /// and confirms the new state on chain.
    pub async fn toggle(&self, entity: ManagedEntity) -> Result<TxHash> {
        let span = spans::timelock_transition("toggle", &entity);
        async {
            let record = match self.state(entity).await? {
                EntityState::Queued(record) => record,
                EntityState::Active => {
                    return Err(OpsError::AlreadyActive {
                        category: entity.category,
                        address: entity.address,
                    })
                }
                EntityState::Unqueued => {
                    return Err(OpsError::NotQueued {
                        category: entity.category,
                        address: entity.address,
                    })
                }
            };
            let tx_hash = self
                .toggle_when_ready(
                    entity,
                    record,
                    || self.contract.toggle(entity.category, entity.address),
                    || {
                        self.all_in_state(
                            entity.category,
                            slice::from_ref(&entity.address),
                            EntityState::is_active,
                        )
                    },
                )
                .await?;
            self.confirm_active(entity).await?;
            info!(entity = %entity, tx_hash = %tx_hash, event = "entity_activated");
            Ok(tx_hash)
        }
        .instrument(span)
        .await
    }

    /// Brings `entity` to `Active`: queue if needed, wait, toggle, confirm.
    pub async fn activate(&self, entity: ManagedEntity) -> Result<Activation> {
        let record = match self.state(entity).await? {
            EntityState::Active => {
                debug!(entity = %entity, event = "entity_already_active");
                return Ok(Activation::AlreadyActive);
            }
            EntityState::Queued(record) => record,
            EntityState::Unqueued => self.queue(entity).await?,
        };
        self.toggle(entity).await?;
        Ok(Activation::Activated { record })
    }

    /// Activates a list of addresses in one category.
    ///
    /// Already-active addresses are skipped. The rest are queued with one
    /// `queueMany` call (or single calls below the batch threshold), then
    /// toggled in slices of `toggle_limit` once the latest queue record has
    /// expired. Batch calls are all-or-nothing on chain.
    pub async fn activate_many(
        &self,
        category: ManagingCategory,
        addresses: &[Address],
    ) -> Result<BatchActivation> {
        let span = spans::activate_many(category, addresses.len(), self.options.toggle_limit);
        self.activate_many_inner(category, addresses)
            .instrument(span)
            .await
    }

    async fn activate_many_inner(
        &self,
        category: ManagingCategory,
        addresses: &[Address],
    ) -> Result<BatchActivation> {
        let mut report = BatchActivation::default();
        let mut pending = Vec::new();
        let mut to_queue = Vec::new();

        for &address in addresses {
            match self.state(ManagedEntity::new(category, address)).await? {
                EntityState::Active => report.skipped.push(address),
                EntityState::Queued(_) => pending.push(address),
                EntityState::Unqueued => {
                    to_queue.push(address);
                    pending.push(address);
                }
            }
        }

        if pending.is_empty() {
            info!(
                category = %category,
                skipped = report.skipped.len(),
                event = "batch_already_active"
            );
            return Ok(report);
        }

        if !to_queue.is_empty() {
            if to_queue.len() >= self.options.batch_threshold {
                let tx_hash = self
                    .submitter()
                    .submit_tx(
                        "queueMany",
                        || self.contract.queue_many(category, &to_queue),
                        || self.all_in_state(category, &to_queue, EntityState::is_queued),
                    )
                    .await
                    .into_result()?;
                info!(
                    category = %category,
                    count = to_queue.len(),
                    tx_hash = %tx_hash,
                    event = "batch_queued"
                );
            } else {
                for &address in &to_queue {
                    self.submitter()
                        .submit_tx(
                            "queue",
                            || self.contract.queue(category, address),
                            || {
                                self.all_in_state(
                                    category,
                                    slice::from_ref(&address),
                                    EntityState::is_queued,
                                )
                            },
                        )
                        .await
                        .into_result()?;
                }
            }
        }

        let mut latest: Option<(Address, QueueRecord)> = None;
        for &address in &pending {
            let record = self
                .observed_record(ManagedEntity::new(category, address))
                .await?;
            if latest.is_none_or(|(_, r)| record.ready_at() > r.ready_at()) {
                latest = Some((address, record));
            }
        }

        let Some((latest_address, record)) = latest else {
            return Ok(report);
        };
        let entity = ManagedEntity::new(category, latest_address);

        let toggle_limit = self.options.toggle_limit.max(1);
        for batch in chunks(&pending, toggle_limit)? {
            let items = batch.items;
            if items.len() >= self.options.batch_threshold {
                self.toggle_when_ready(
                    entity,
                    record,
                    || self.contract.toggle_many(category, items),
                    || self.all_in_state(category, items, EntityState::is_active),
                )
                .await?;
            } else {
                for single in items {
                    self.toggle_when_ready(
                        entity,
                        record,
                        || self.contract.toggle(category, *single),
                        || {
                            self.all_in_state(
                                category,
                                slice::from_ref(single),
                                EntityState::is_active,
                            )
                        },
                    )
                    .await?;
                }
            }
            debug!(
                category = %category,
                batch = batch.index,
                size = items.len(),
                event = "batch_toggled"
            );
        }

        for &address in &pending {
            self.confirm_active(ManagedEntity::new(category, address))
                .await?;
        }
        report.activated = pending;

        info!(
            category = %category,
            activated = report.activated.len(),
            skipped = report.skipped.len(),
            event = "batch_activated"
        );
        Ok(report)
    }

    /// Removes `entity` from its allow-list.
    pub async fn remove(&self, entity: ManagedEntity) -> Result<TxHash> {
        let tx_hash = self
            .submitter()
            .submit_tx(
                "remove",
                || self.contract.remove(entity.category, entity.address),
                || {
                    self.all_in_state(
                        entity.category,
                        slice::from_ref(&entity.address),
                        EntityState::is_unqueued,
                    )
                },
            )
            .await
            .into_result()?;
        info!(entity = %entity, tx_hash = %tx_hash, event = "entity_removed");
        Ok(tx_hash)
    }

    /// Polls the block height until `record` has expired.
    ///
    /// Gives up with [`OpsError::QueueNotExpired`] after `max_polls` polls.
    pub async fn wait_until_ready(&self, entity: ManagedEntity, record: QueueRecord) -> Result<u64> {
        let mut current = self.block_number().await?;
        for poll in 0..self.options.max_polls {
            if record.is_ready(current) {
                return Ok(current);
            }
            debug!(
                entity = %entity,
                current_block = current,
                ready_at = record.ready_at(),
                remaining_blocks = record.remaining(current),
                poll = poll,
                event = "waiting_for_queue_expiry"
            );
            self.clock.sleep(self.options.poll_interval()).await;
            current = self.block_number().await?;
        }
        if record.is_ready(current) {
            return Ok(current);
        }
        Err(OpsError::QueueNotExpired {
            category: entity.category,
            address: entity.address,
            ready_at: record.ready_at(),
            current,
        })
    }

    async fn ensure_ready(&self, entity: ManagedEntity, record: QueueRecord) -> Result<()> {
        let current = self.block_number().await?;
        if record.is_ready(current) {
            return Ok(());
        }
        match self.options.early_toggle {
            EarlyTogglePolicy::Abort => Err(OpsError::QueueNotExpired {
                category: entity.category,
                address: entity.address,
                ready_at: record.ready_at(),
                current,
            }),
            EarlyTogglePolicy::WaitForExpiry => {
                self.wait_until_ready(entity, record).await.map(|_| ())
            }
        }
    }

    /// Sends a toggle once the record has expired. A `QUEUE_NOT_EXPIRED`
    /// revert (clock skew between our block read and the mined block) is
    /// waited out once under [`EarlyTogglePolicy::WaitForExpiry`].
    async fn toggle_when_ready<F, Fut, L, LFut>(
        &self,
        entity: ManagedEntity,
        record: QueueRecord,
        send: F,
        landed: L,
    ) -> Result<TxHash>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<TxHash>>,
        L: Fn() -> LFut,
        LFut: std::future::Future<Output = Result<bool>>,
    {
        self.ensure_ready(entity, record).await?;

        match self
            .submitter()
            .submit_tx("toggle", &send, &landed)
            .await
            .into_result()
        {
            Ok(tx_hash) => Ok(tx_hash),
            Err(error) if error.is_queue_not_expired() => {
                let current = self.block_number().await?;
                if self.options.early_toggle == EarlyTogglePolicy::Abort {
                    return Err(OpsError::QueueNotExpired {
                        category: entity.category,
                        address: entity.address,
                        ready_at: record.ready_at(),
                        current,
                    });
                }
                warn!(
                    entity = %entity,
                    current_block = current,
                    event = "toggle_rejected_early"
                );
                let extended = QueueRecord::new(current.max(record.queued_at), 1);
                self.wait_until_ready(entity, extended).await?;
                self.submitter()
                    .submit_tx("toggle", &send, &landed)
                    .await
                    .into_result()
            }
            Err(error) => Err(error),
        }
    }

    /// Whether every address is in the wanted state, read straight from the
    /// contract. Used to settle transactions whose receipt went missing.
    async fn all_in_state(
        &self,
        category: ManagingCategory,
        addresses: &[Address],
        want: fn(&EntityState) -> bool,
    ) -> Result<bool> {
        for &address in addresses {
            if !want(&self.contract.entity_state(category, address).await?) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn observed_record(&self, entity: ManagedEntity) -> Result<QueueRecord> {
        match self.state(entity).await? {
            EntityState::Queued(record) => Ok(record),
            EntityState::Active => Err(OpsError::AlreadyActive {
                category: entity.category,
                address: entity.address,
            }),
            EntityState::Unqueued => Err(OpsError::NotQueued {
                category: entity.category,
                address: entity.address,
            }),
        }
    }

    async fn confirm_active(&self, entity: ManagedEntity) -> Result<()> {
        if self.state(entity).await?.is_active() {
            Ok(())
        } else {
            Err(OpsError::NotActivated {
                category: entity.category,
                address: entity.address,
            })
        }
    }
}
