// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Test utilities and fake implementations of the operator traits.
//!
//! These fakes hold their state in memory and behave like the deployed
//! contracts closely enough to exercise the drivers end to end: the timelock
//! fake enforces the queue delay against a block height that advances with a
//! [`FakeClock`], the admin fake enforces ownership, and every fake can be
//! scripted to fail its next calls transiently or with a revert.
//!
//! They are used by the unit tests in this crate and by the integration tests
//! under `tests/`.

use alloy_primitives::{Address, TxHash, B256};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{OpsError, Result, QUEUE_NOT_EXPIRED};
use crate::sequencer::{AdminStep, LockRegistryInit};
use crate::timelock::{EntityState, ManagingCategory, QueueRecord};
use crate::traits::{AdminTarget, Clock, TimelockContract, TokenListSource, Verifier, WalletRegistry};
use crate::verify::{VerificationRequest, VerificationStatus};

// ============================================================================
// Failure scripting
// ============================================================================

/// A failure a fake returns instead of performing a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedFailure {
    /// Surfaces as [`OpsError::Provider`], which the submitter retries.
    Transient(String),
    /// Surfaces as [`OpsError::Reverted`].
    Revert(String),
    /// Surfaces as [`OpsError::Rejected`].
    Fatal(String),
}

impl ScriptedFailure {
    pub fn transient() -> Self {
        Self::Transient("connection reset by peer".to_string())
    }

    pub fn revert(reason: &str) -> Self {
        Self::Revert(reason.to_string())
    }

    fn into_error(self) -> OpsError {
        match self {
            ScriptedFailure::Transient(message) => OpsError::Provider(message),
            ScriptedFailure::Revert(reason) => OpsError::Reverted { reason },
            ScriptedFailure::Fatal(reason) => OpsError::Rejected { reason },
        }
    }
}

#[derive(Debug, Default)]
struct FailureScript {
    /// `None` entries let a call through before later failures apply.
    pending: HashMap<String, VecDeque<Option<ScriptedFailure>>>,
    attempts: HashMap<String, u32>,
    /// Calls that mine but whose receipt never arrives.
    lost_receipts: HashMap<String, usize>,
}

impl FailureScript {
    fn push(&mut self, method: &str, failure: Option<ScriptedFailure>, times: usize) {
        let queue = self.pending.entry(method.to_string()).or_default();
        queue.extend(std::iter::repeat_n(failure, times));
    }

    /// Counts the attempt and returns the scripted failure, if any.
    fn check(&mut self, method: &str) -> Result<()> {
        *self.attempts.entry(method.to_string()).or_default() += 1;
        match self.pending.get_mut(method).and_then(VecDeque::pop_front) {
            Some(Some(failure)) => Err(failure.into_error()),
            _ => Ok(()),
        }
    }

    fn attempts(&self, method: &str) -> u32 {
        self.attempts.get(method).copied().unwrap_or(0)
    }

    fn lose_receipts(&mut self, method: &str, times: usize) {
        *self.lost_receipts.entry(method.to_string()).or_default() += times;
    }

    /// Hands back the hash of a mined call, or a receipt timeout for it.
    fn receipt(&mut self, method: &str, tx_hash: TxHash) -> Result<TxHash> {
        match self.lost_receipts.get_mut(method) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(OpsError::ReceiptTimeout {
                    method: method.to_string(),
                    tx_hash,
                    reason: "transaction was not mined within the timeout".to_string(),
                })
            }
            _ => Ok(tx_hash),
        }
    }
}

fn tx_hash(counter: &mut u64) -> TxHash {
    *counter += 1;
    B256::left_padding_from(&counter.to_be_bytes())
}

// ============================================================================
// Fake Timelock
// ============================================================================

/// A mined transaction recorded by [`FakeTimelock`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelockCall {
    pub method: &'static str,
    pub category: ManagingCategory,
    pub addresses: Vec<Address>,
    pub block: u64,
}

#[derive(Debug)]
struct TimelockState {
    base_block: u64,
    required_delay: u64,
    queued: HashMap<(ManagingCategory, Address), QueueRecord>,
    active: HashSet<(ManagingCategory, Address)>,
    batch_limit: Option<usize>,
    script: FailureScript,
    mined: Vec<TimelockCall>,
    tx_counter: u64,
}

/// An in-memory queue/toggle timelock.
///
/// The block height starts at 1000 and advances by one block per
/// `block_time` of [`FakeClock`] time, so a driver waiting out the delay by
/// sleeping on the same clock sees the chain move. Tests can also jump ahead
/// with [`FakeTimelock::advance_blocks`].
///
/// Contract rules enforced:
/// - `toggle` before the queue record expires reverts with `QUEUE_NOT_EXPIRED`
/// - `toggle` on an unqueued entity reverts with `NOT_QUEUED`
/// - `queue` is accepted for active entities too, and the following `toggle`
///   deactivates them
/// - batch calls validate every entry before changing anything
#[derive(Clone, Debug)]
pub struct FakeTimelock {
    state: Arc<Mutex<TimelockState>>,
    clock: FakeClock,
    origin: Instant,
    block_time: Duration,
}

impl FakeTimelock {
    pub fn new(clock: FakeClock, required_delay: u64) -> Self {
        let origin = clock.now();
        Self {
            state: Arc::new(Mutex::new(TimelockState {
                base_block: 1_000,
                required_delay,
                queued: HashMap::new(),
                active: HashSet::new(),
                batch_limit: None,
                script: FailureScript::default(),
                mined: Vec::new(),
                tx_counter: 0,
            })),
            clock,
            origin,
            block_time: Duration::from_secs(1),
        }
    }

    /// Sets how much clock time one block takes. Zero freezes the chain.
    pub fn with_block_time(mut self, block_time: Duration) -> Self {
        self.block_time = block_time;
        self
    }

    /// Batch calls with more entries than `limit` revert as if out of gas.
    pub fn with_batch_limit(self, limit: usize) -> Self {
        self.state.lock().unwrap().batch_limit = Some(limit);
        self
    }

    pub fn advance_blocks(&self, blocks: u64) {
        self.state.lock().unwrap().base_block += blocks;
    }

    pub fn set_required_delay(&self, blocks: u64) {
        self.state.lock().unwrap().required_delay = blocks;
    }

    /// Marks an entity active without going through the timelock.
    pub fn mark_active(&self, category: ManagingCategory, address: Address) {
        let mut state = self.state.lock().unwrap();
        state.queued.remove(&(category, address));
        state.active.insert((category, address));
    }

    /// Makes the next `times` calls to `method` fail. Method names match
    /// the contract: `queue`, `toggle`, `queueMany`, `toggleMany`, `remove`,
    /// plus the reads `blockNumber` and `entityState`.
    pub fn fail_next(&self, method: &str, failure: ScriptedFailure, times: usize) {
        self.state.lock().unwrap().script.push(method, Some(failure), times);
    }

    /// Lets the next `times` calls to `method` through before any failure
    /// scripted after this call applies.
    pub fn pass_next(&self, method: &str, times: usize) {
        self.state.lock().unwrap().script.push(method, None, times);
    }

    /// The next `times` calls to `method` are mined but report
    /// [`OpsError::ReceiptTimeout`].
    pub fn lose_receipt_next(&self, method: &str, times: usize) {
        self.state.lock().unwrap().script.lose_receipts(method, times);
    }

    /// Number of calls to `method`, failed ones included.
    pub fn attempts(&self, method: &str) -> u32 {
        self.state.lock().unwrap().script.attempts(method)
    }

    /// Mined transactions, in order.
    pub fn mined(&self) -> Vec<TimelockCall> {
        self.state.lock().unwrap().mined.clone()
    }

    pub fn mined_count(&self, method: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .mined
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    pub fn current_block(&self) -> u64 {
        let elapsed = self.clock.now().saturating_duration_since(self.origin);
        let from_clock = if self.block_time.is_zero() {
            0
        } else {
            (elapsed.as_nanos() / self.block_time.as_nanos()) as u64
        };
        self.state.lock().unwrap().base_block + from_clock
    }

    pub fn state_of(&self, category: ManagingCategory, address: Address) -> EntityState {
        let state = self.state.lock().unwrap();
        Self::lookup(&state, category, address)
    }

    fn lookup(state: &TimelockState, category: ManagingCategory, address: Address) -> EntityState {
        if state.active.contains(&(category, address)) {
            EntityState::Active
        } else if let Some(record) = state.queued.get(&(category, address)) {
            EntityState::Queued(*record)
        } else {
            EntityState::Unqueued
        }
    }

    fn check_toggle(
        state: &TimelockState,
        category: ManagingCategory,
        address: Address,
        block: u64,
    ) -> Result<()> {
        match state.queued.get(&(category, address)) {
            None => Err(OpsError::Reverted {
                reason: "NOT_QUEUED".to_string(),
            }),
            Some(record) if !record.is_ready(block) => Err(OpsError::Reverted {
                reason: QUEUE_NOT_EXPIRED.to_string(),
            }),
            Some(_) => Ok(()),
        }
    }

    fn check_batch(state: &TimelockState, size: usize) -> Result<()> {
        match state.batch_limit {
            Some(limit) if size > limit => Err(OpsError::Reverted {
                reason: "out of gas".to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn mine(
        state: &mut TimelockState,
        method: &'static str,
        category: ManagingCategory,
        addresses: &[Address],
        block: u64,
    ) -> TxHash {
        state.mined.push(TimelockCall {
            method,
            category,
            addresses: addresses.to_vec(),
            block,
        });
        tx_hash(&mut state.tx_counter)
    }

    fn apply_queue(state: &mut TimelockState, category: ManagingCategory, address: Address, block: u64) {
        let record = QueueRecord::new(block, state.required_delay);
        state.queued.insert((category, address), record);
    }

    /// Flips the entity: a queued inactive entity becomes active, a queued
    /// active one is deactivated.
    fn apply_toggle(state: &mut TimelockState, category: ManagingCategory, address: Address) {
        state.queued.remove(&(category, address));
        if !state.active.remove(&(category, address)) {
            state.active.insert((category, address));
        }
    }
}

#[async_trait]
impl TimelockContract for FakeTimelock {
    async fn block_number(&self) -> Result<u64> {
        self.state.lock().unwrap().script.check("blockNumber")?;
        Ok(self.current_block())
    }

    async fn required_delay(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().required_delay)
    }

    async fn entity_state(
        &self,
        category: ManagingCategory,
        address: Address,
    ) -> Result<EntityState> {
        let mut state = self.state.lock().unwrap();
        state.script.check("entityState")?;
        Ok(Self::lookup(&state, category, address))
    }

    async fn queue(&self, category: ManagingCategory, address: Address) -> Result<TxHash> {
        let block = self.current_block();
        let mut state = self.state.lock().unwrap();
        state.script.check("queue")?;
        Self::apply_queue(&mut state, category, address, block);
        let tx_hash = Self::mine(&mut state, "queue", category, &[address], block);
        state.script.receipt("queue", tx_hash)
    }

    async fn toggle(&self, category: ManagingCategory, address: Address) -> Result<TxHash> {
        let block = self.current_block();
        let mut state = self.state.lock().unwrap();
        state.script.check("toggle")?;
        Self::check_toggle(&state, category, address, block)?;
        Self::apply_toggle(&mut state, category, address);
        let tx_hash = Self::mine(&mut state, "toggle", category, &[address], block);
        state.script.receipt("toggle", tx_hash)
    }

    async fn queue_many(
        &self,
        category: ManagingCategory,
        addresses: &[Address],
    ) -> Result<TxHash> {
        let block = self.current_block();
        let mut state = self.state.lock().unwrap();
        state.script.check("queueMany")?;
        Self::check_batch(&state, addresses.len())?;
        for &address in addresses {
            Self::apply_queue(&mut state, category, address, block);
        }
        let tx_hash = Self::mine(&mut state, "queueMany", category, addresses, block);
        state.script.receipt("queueMany", tx_hash)
    }

    async fn toggle_many(
        &self,
        category: ManagingCategory,
        addresses: &[Address],
    ) -> Result<TxHash> {
        let block = self.current_block();
        let mut state = self.state.lock().unwrap();
        state.script.check("toggleMany")?;
        Self::check_batch(&state, addresses.len())?;
        for &address in addresses {
            Self::check_toggle(&state, category, address, block)?;
        }
        for &address in addresses {
            Self::apply_toggle(&mut state, category, address);
        }
        let tx_hash = Self::mine(&mut state, "toggleMany", category, addresses, block);
        state.script.receipt("toggleMany", tx_hash)
    }

    async fn remove(&self, category: ManagingCategory, address: Address) -> Result<TxHash> {
        let block = self.current_block();
        let mut state = self.state.lock().unwrap();
        state.script.check("remove")?;
        let was_queued = state.queued.remove(&(category, address)).is_some();
        let was_active = state.active.remove(&(category, address));
        if !was_queued && !was_active {
            return Err(OpsError::Reverted {
                reason: "NOT_MANAGED".to_string(),
            });
        }
        let tx_hash = Self::mine(&mut state, "remove", category, &[address], block);
        state.script.receipt("remove", tx_hash)
    }
}

// ============================================================================
// Fake Admin Target
// ============================================================================

/// Configuration values held by [`FakeAdminTarget`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminState {
    pub fee_percentage: u16,
    pub dao: Address,
    pub version: String,
    pub moderators: BTreeSet<Address>,
    pub block_queue: u64,
    pub owner: Address,
    /// Set by a lock registry's one-time `initialize`.
    pub lock_registry: Option<LockRegistryInit>,
}

#[derive(Debug, Default)]
struct AdminInner {
    values: AdminState,
    caller: Address,
    script: FailureScript,
    applied: Vec<AdminStep>,
    tx_counter: u64,
}

/// An in-memory freshly deployed contract.
///
/// The deployer is both owner and moderator at construction. Every call is
/// sent as the deployer, so once ownership is transferred further calls
/// revert with `Ownable: caller is not the owner`. A second lock registry
/// `initialize` reverts the way an initializable proxy does.
#[derive(Clone, Debug, Default)]
pub struct FakeAdminTarget {
    inner: Arc<Mutex<AdminInner>>,
}

impl FakeAdminTarget {
    pub fn new(deployer: Address) -> Self {
        let target = Self::default();
        {
            let mut inner = target.inner.lock().unwrap();
            inner.caller = deployer;
            inner.values.owner = deployer;
            inner.values.moderators.insert(deployer);
        }
        target
    }

    /// Makes the next `times` calls to `method` fail. `method` is
    /// [`AdminStep::name`], or `isApplied` for the read.
    pub fn fail_next(&self, method: &str, failure: ScriptedFailure, times: usize) {
        self.inner.lock().unwrap().script.push(method, Some(failure), times);
    }

    /// The next `times` applications of `method` are mined but report
    /// [`OpsError::ReceiptTimeout`].
    pub fn lose_receipt_next(&self, method: &str, times: usize) {
        self.inner.lock().unwrap().script.lose_receipts(method, times);
    }

    pub fn values(&self) -> AdminState {
        self.inner.lock().unwrap().values.clone()
    }

    /// Steps that were mined, in order.
    pub fn applied(&self) -> Vec<AdminStep> {
        self.inner.lock().unwrap().applied.clone()
    }

    pub fn attempts(&self, method: &str) -> u32 {
        self.inner.lock().unwrap().script.attempts(method)
    }
}

#[async_trait]
impl AdminTarget for FakeAdminTarget {
    async fn is_applied(&self, step: &AdminStep) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        inner.script.check("isApplied")?;
        let values = &inner.values;
        Ok(match step {
            AdminStep::SetFeePercentage(fee) => values.fee_percentage == *fee,
            AdminStep::SetDao(dao) => values.dao == *dao,
            AdminStep::SetVersion(version) => values.version == *version,
            AdminStep::AddModerator(moderator) => values.moderators.contains(moderator),
            AdminStep::RevokeModerator(moderator) => !values.moderators.contains(moderator),
            AdminStep::SetBlockQueue(blocks) => values.block_queue == *blocks,
            AdminStep::TransferOwnership(owner) => values.owner == *owner,
            AdminStep::InitializeLockRegistry(init) => values.lock_registry.as_ref() == Some(init),
        })
    }

    async fn apply(&self, step: &AdminStep) -> Result<TxHash> {
        let mut inner = self.inner.lock().unwrap();
        inner.script.check(step.name())?;
        if inner.values.owner != inner.caller {
            return Err(OpsError::Reverted {
                reason: "Ownable: caller is not the owner".to_string(),
            });
        }
        if matches!(step, AdminStep::InitializeLockRegistry(_))
            && inner.values.lock_registry.is_some()
        {
            return Err(OpsError::Reverted {
                reason: "Initializable: contract is already initialized".to_string(),
            });
        }
        let values = &mut inner.values;
        match step {
            AdminStep::SetFeePercentage(fee) => values.fee_percentage = *fee,
            AdminStep::SetDao(dao) => values.dao = *dao,
            AdminStep::SetVersion(version) => values.version = version.clone(),
            AdminStep::AddModerator(moderator) => {
                values.moderators.insert(*moderator);
            }
            AdminStep::RevokeModerator(moderator) => {
                values.moderators.remove(moderator);
            }
            AdminStep::SetBlockQueue(blocks) => values.block_queue = *blocks,
            AdminStep::TransferOwnership(owner) => values.owner = *owner,
            AdminStep::InitializeLockRegistry(init) => {
                values.moderators.insert(init.moderator);
                values.lock_registry = Some(init.clone());
            }
        }
        inner.applied.push(step.clone());
        let hash = tx_hash(&mut inner.tx_counter);
        inner.script.receipt(step.name(), hash)
    }
}

// ============================================================================
// Fake Wallet Registry
// ============================================================================

#[derive(Debug, Default)]
struct RegistryInner {
    wallets: Vec<Address>,
    script: FailureScript,
    batches: Vec<usize>,
    tx_counter: u64,
}

/// An in-memory wallet registration contract.
#[derive(Clone, Debug, Default)]
pub struct FakeWalletRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl FakeWalletRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wallets(wallets: Vec<Address>) -> Self {
        let registry = Self::default();
        registry.inner.lock().unwrap().wallets = wallets;
        registry
    }

    /// Makes the next `times` calls to `allWallets` or `registerWallets` fail.
    pub fn fail_next(&self, method: &str, failure: ScriptedFailure, times: usize) {
        self.inner.lock().unwrap().script.push(method, Some(failure), times);
    }

    pub fn pass_next(&self, method: &str, times: usize) {
        self.inner.lock().unwrap().script.push(method, None, times);
    }

    /// The next `times` registrations are mined but report
    /// [`OpsError::ReceiptTimeout`].
    pub fn lose_receipt_next(&self, times: usize) {
        self.inner
            .lock()
            .unwrap()
            .script
            .lose_receipts("registerWallets", times);
    }

    pub fn wallets(&self) -> Vec<Address> {
        self.inner.lock().unwrap().wallets.clone()
    }

    /// Sizes of the mined `registerWallets` batches.
    pub fn batches(&self) -> Vec<usize> {
        self.inner.lock().unwrap().batches.clone()
    }
}

#[async_trait]
impl WalletRegistry for FakeWalletRegistry {
    async fn all_wallets(&self) -> Result<Vec<Address>> {
        let mut inner = self.inner.lock().unwrap();
        inner.script.check("allWallets")?;
        Ok(inner.wallets.clone())
    }

    async fn register_wallets(&self, wallets: &[Address]) -> Result<TxHash> {
        let mut inner = self.inner.lock().unwrap();
        inner.script.check("registerWallets")?;
        if let Some(existing) = wallets.iter().find(|w| inner.wallets.contains(*w)) {
            return Err(OpsError::Reverted {
                reason: format!("wallet {existing} already registered"),
            });
        }
        inner.wallets.extend_from_slice(wallets);
        inner.batches.push(wallets.len());
        let hash = tx_hash(&mut inner.tx_counter);
        inner.script.receipt("registerWallets", hash)
    }
}

// ============================================================================
// Fake Token List Source
// ============================================================================

/// A token list API returning canned address strings per chain id.
#[derive(Clone, Debug)]
pub struct FakeTokenListSource {
    name: String,
    lists: Arc<Mutex<HashMap<u64, Vec<String>>>>,
    failing: Arc<Mutex<bool>>,
}

impl FakeTokenListSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lists: Arc::default(),
            failing: Arc::default(),
        }
    }

    pub fn with_tokens(self, chain_id: u64, tokens: &[&str]) -> Self {
        self.lists
            .lock()
            .unwrap()
            .insert(chain_id, tokens.iter().map(|t| t.to_string()).collect());
        self
    }

    /// Every fetch fails with an HTTP-like transient error.
    pub fn failing(self) -> Self {
        *self.failing.lock().unwrap() = true;
        self
    }
}

#[async_trait]
impl TokenListSource for FakeTokenListSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, chain_id: u64) -> Result<Vec<String>> {
        if *self.failing.lock().unwrap() {
            return Err(OpsError::Provider(format!("{}: 503 Service Unavailable", self.name)));
        }
        Ok(self
            .lists
            .lock()
            .unwrap()
            .get(&chain_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// Fake Verifier
// ============================================================================

/// An explorer verifier returning a fixed status.
#[derive(Clone, Debug)]
pub struct FakeVerifier {
    status: Option<VerificationStatus>,
    requests: Arc<Mutex<Vec<VerificationRequest>>>,
}

impl FakeVerifier {
    pub fn verified() -> Self {
        Self {
            status: Some(VerificationStatus::Verified {
                guid: "fake-guid".to_string(),
            }),
            requests: Arc::default(),
        }
    }

    pub fn already_verified() -> Self {
        Self {
            status: Some(VerificationStatus::AlreadyVerified),
            requests: Arc::default(),
        }
    }

    /// Every request fails with [`OpsError::Verification`].
    pub fn failing() -> Self {
        Self {
            status: None,
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<VerificationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Verifier for FakeVerifier {
    async fn verify(&self, request: &VerificationRequest) -> Result<VerificationStatus> {
        self.requests.lock().unwrap().push(request.clone());
        self.status.clone().ok_or_else(|| OpsError::Verification {
            reason: "Fail - Unable to verify".to_string(),
        })
    }
}

// ============================================================================
// Fake Clock
// ============================================================================

/// A fake clock that allows fast-forwarding time in tests.
///
/// Sleeping advances the clock instantly, so retry delays and timelock waits
/// cost nothing in tests while still being observable.
#[derive(Clone, Debug)]
pub struct FakeClock {
    current_time: Arc<Mutex<Instant>>,
    sleep_log: Arc<Mutex<Vec<Duration>>>,
}

impl Default for FakeClock {
    fn default() -> Self {
        Self {
            current_time: Arc::new(Mutex::new(Instant::now())),
            sleep_log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fast-forward the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut time = self.current_time.lock().unwrap();
        *time += duration;
    }

    /// Get the total time "slept" by this clock
    pub fn total_sleep_time(&self) -> Duration {
        self.sleep_log.lock().unwrap().iter().sum()
    }

    /// Get the number of times sleep was called
    pub fn sleep_count(&self) -> usize {
        self.sleep_log.lock().unwrap().len()
    }

    pub fn clear_sleep_log(&self) {
        self.sleep_log.lock().unwrap().clear();
    }
}

#[async_trait]
impl Clock for FakeClock {
    async fn sleep(&self, duration: Duration) {
        self.sleep_log.lock().unwrap().push(duration);
        self.advance(duration);
    }

    fn now(&self) -> Instant {
        *self.current_time.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const BRIDGE: Address = address!("1231DEB6f5749EF6cE6943a275A1D3E7486F4EaE");

    #[tokio::test]
    async fn test_fake_clock_tracks_sleep_calls() {
        let clock = FakeClock::new();

        clock.sleep(Duration::from_secs(60)).await;
        clock.sleep(Duration::from_secs(120)).await;

        assert_eq!(clock.sleep_count(), 2);
        assert_eq!(clock.total_sleep_time(), Duration::from_secs(180));
    }

    #[tokio::test]
    async fn test_fake_timelock_blocks_follow_the_clock() {
        let clock = FakeClock::new();
        let timelock = FakeTimelock::new(clock.clone(), 10).with_block_time(Duration::from_secs(2));

        assert_eq!(timelock.block_number().await.unwrap(), 1_000);
        clock.advance(Duration::from_secs(7));
        assert_eq!(timelock.block_number().await.unwrap(), 1_003);
        timelock.advance_blocks(5);
        assert_eq!(timelock.block_number().await.unwrap(), 1_008);
    }

    #[tokio::test]
    async fn test_fake_timelock_enforces_queue_delay() {
        let clock = FakeClock::new();
        let timelock = FakeTimelock::new(clock, 5).with_block_time(Duration::ZERO);
        let category = ManagingCategory::ReserveBridges;

        timelock.queue(category, BRIDGE).await.unwrap();
        let early = timelock.toggle(category, BRIDGE).await.unwrap_err();
        assert!(early.is_queue_not_expired());
        assert!(matches!(
            timelock.state_of(category, BRIDGE),
            EntityState::Queued(_)
        ));

        timelock.advance_blocks(5);
        timelock.toggle(category, BRIDGE).await.unwrap();
        assert_eq!(timelock.state_of(category, BRIDGE), EntityState::Active);

        let again = timelock.toggle(category, BRIDGE).await.unwrap_err();
        assert!(matches!(again, OpsError::Reverted { reason } if reason == "NOT_QUEUED"));
    }

    #[tokio::test]
    async fn test_fake_timelock_batches_are_all_or_nothing() {
        let timelock = FakeTimelock::new(FakeClock::new(), 0);
        let category = ManagingCategory::ReserveBridgeAssets;
        let unqueued = Address::repeat_byte(0x11);
        timelock.queue(category, BRIDGE).await.unwrap();

        let error = timelock
            .toggle_many(category, &[BRIDGE, unqueued])
            .await
            .unwrap_err();
        assert!(matches!(error, OpsError::Reverted { .. }));
        assert!(matches!(
            timelock.state_of(category, BRIDGE),
            EntityState::Queued(_)
        ));
        assert_eq!(timelock.mined_count("toggleMany"), 0);
    }

    #[tokio::test]
    async fn test_fake_timelock_toggle_deactivates_an_active_entity() {
        let timelock = FakeTimelock::new(FakeClock::new(), 0);
        let category = ManagingCategory::ReserveBridges;
        timelock.mark_active(category, BRIDGE);

        timelock.queue(category, BRIDGE).await.unwrap();
        assert_eq!(timelock.state_of(category, BRIDGE), EntityState::Active);

        timelock.toggle(category, BRIDGE).await.unwrap();
        assert_eq!(timelock.state_of(category, BRIDGE), EntityState::Unqueued);
    }

    #[tokio::test]
    async fn test_lost_receipt_still_mines() {
        let timelock = FakeTimelock::new(FakeClock::new(), 0);
        timelock.lose_receipt_next("queue", 1);

        let error = timelock
            .queue(ManagingCategory::ReserveBridges, BRIDGE)
            .await
            .unwrap_err();

        assert!(matches!(error, OpsError::ReceiptTimeout { .. }));
        assert_eq!(timelock.mined_count("queue"), 1);
        assert!(timelock
            .queue(ManagingCategory::ReserveBridges, BRIDGE)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_scripted_failures_are_consumed_in_order() {
        let timelock = FakeTimelock::new(FakeClock::new(), 1);
        timelock.fail_next("queue", ScriptedFailure::transient(), 2);

        let category = ManagingCategory::ReserveBridges;
        assert!(timelock.queue(category, BRIDGE).await.unwrap_err().is_transient());
        assert!(timelock.queue(category, BRIDGE).await.is_err());
        assert!(timelock.queue(category, BRIDGE).await.is_ok());
        assert_eq!(timelock.attempts("queue"), 3);
        assert_eq!(timelock.mined_count("queue"), 1);
    }

    #[tokio::test]
    async fn test_fake_admin_target_enforces_ownership() {
        let deployer = Address::repeat_byte(0xde);
        let multisig = Address::repeat_byte(0x2b);
        let target = FakeAdminTarget::new(deployer);

        target
            .apply(&AdminStep::TransferOwnership(multisig))
            .await
            .unwrap();
        assert!(target
            .is_applied(&AdminStep::TransferOwnership(multisig))
            .await
            .unwrap());

        let error = target.apply(&AdminStep::SetBlockQueue(1)).await.unwrap_err();
        assert!(matches!(error, OpsError::Reverted { .. }));
    }

    #[tokio::test]
    async fn test_fake_registry_rejects_duplicates() {
        let wallet = Address::repeat_byte(0x01);
        let registry = FakeWalletRegistry::with_wallets(vec![wallet]);

        assert!(registry.register_wallets(&[wallet]).await.is_err());
        assert!(registry.batches().is_empty());
    }
}
