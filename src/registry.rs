// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Wallet migration between registration contracts.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, Instrument};

use crate::chunk::chunks;
use crate::error::Result;
use crate::report::{BatchReport, MigrationReport};
use crate::retry::Submitter;
use crate::spans;
use crate::traits::{Clock, WalletRegistry};

/// Chunking and pacing for [`migrate_wallets`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationOptions {
    /// Wallets per `registerWallets` call.
    pub chunk_limit: usize,
    pub settle_delay_secs: u64,
    /// Index of the first batch to send.
    pub resume_from: usize,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            chunk_limit: 20,
            settle_delay_secs: 5,
            resume_from: 0,
        }
    }
}

impl MigrationOptions {
    pub fn with_chunk_limit(mut self, limit: usize) -> Self {
        self.chunk_limit = limit;
        self
    }

    pub fn with_resume_from(mut self, index: usize) -> Self {
        self.resume_from = index;
        self
    }

    pub fn with_settle_delay_secs(mut self, secs: u64) -> Self {
        self.settle_delay_secs = secs;
        self
    }
}

/// Copies every wallet registered on `from` that is missing on `to`.
///
/// The source list is cut into chunks of `chunk_limit`, in source order.
/// Each chunk registers only its wallets missing on `to`, followed by a
/// settle delay; fully registered chunks send nothing. Chunk indices depend
/// only on the source list, so the index of the first failed chunk is a
/// checkpoint that stays valid for the next run.
///
/// # Errors
///
/// Fails only when the wallet lists cannot be read or the chunk limit is
/// zero. Registration failures are recorded in the report.
pub async fn migrate_wallets<F, T, C>(
    from: &F,
    to: &T,
    submitter: &Submitter<C>,
    options: MigrationOptions,
) -> Result<MigrationReport>
where
    F: WalletRegistry + ?Sized,
    T: WalletRegistry + ?Sized,
    C: Clock,
{
    let source = submitter
        .submit("getAllWallets", || from.all_wallets())
        .await
        .into_result()?;
    let existing: HashSet<_> = submitter
        .submit("getAllWallets", || to.all_wallets())
        .await
        .into_result()?
        .into_iter()
        .collect();

    // Batches are cut from the source list, not from the wallets still
    // missing, so a checkpoint names the same wallets on every run.
    let mut seen = HashSet::with_capacity(source.len());
    let unique: Vec<_> = source.iter().copied().filter(|w| seen.insert(*w)).collect();
    let missing = unique.iter().filter(|w| !existing.contains(*w)).count();

    let mut report = MigrationReport {
        source_total: source.len(),
        already_registered: unique.len() - missing,
        batches: Vec::new(),
    };

    let sequence = chunks(&unique, options.chunk_limit)?.resume_from(options.resume_from);
    let total = sequence.total();
    info!(
        source_total = report.source_total,
        missing = missing,
        batches = total,
        resume_from = options.resume_from,
        event = "wallet_migration_started"
    );

    for batch in sequence {
        let pending: Vec<_> = batch
            .items
            .iter()
            .copied()
            .filter(|w| !existing.contains(w))
            .collect();
        let already = batch.len() - pending.len();
        if pending.is_empty() {
            debug!(
                batch = batch.index,
                size = batch.len(),
                event = "wallet_batch_already_registered"
            );
            report
                .batches
                .push(BatchReport::succeeded(batch.index, batch.len(), 0, already));
            continue;
        }

        let span = spans::batch("registerWallets", batch.index, total, pending.len());
        let items = pending.as_slice();
        let outcome = submitter
            .submit_tx(
                "registerWallets",
                || to.register_wallets(items),
                move || async move {
                    let on_chain: HashSet<_> = to.all_wallets().await?.into_iter().collect();
                    Ok(items.iter().all(|w| on_chain.contains(w)))
                },
            )
            .instrument(span)
            .await
            .into_result();

        match outcome {
            Ok(tx_hash) => {
                info!(
                    batch = batch.index,
                    size = items.len(),
                    tx_hash = %tx_hash,
                    event = "wallets_registered"
                );
                report.batches.push(BatchReport::succeeded(
                    batch.index,
                    batch.len(),
                    items.len(),
                    already,
                ));
                submitter
                    .clock()
                    .sleep(Duration::from_secs(options.settle_delay_secs))
                    .await;
            }
            Err(e) => {
                error!(
                    batch = batch.index,
                    size = batch.len(),
                    error = %e,
                    event = "wallet_batch_failed"
                );
                report
                    .batches
                    .push(BatchReport::failed(batch.index, batch.len(), &e));
                break;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::testing::{FakeClock, FakeWalletRegistry, ScriptedFailure};
    use alloy_primitives::Address;

    fn wallets(n: u8) -> Vec<Address> {
        (1..=n).map(Address::repeat_byte).collect()
    }

    fn submitter(clock: FakeClock) -> Submitter<FakeClock> {
        Submitter::new(RetryPolicy::default().with_max_attempts(2), clock)
    }

    #[tokio::test]
    async fn test_migrates_in_chunks_of_twenty() {
        let clock = FakeClock::new();
        let from = FakeWalletRegistry::with_wallets(wallets(45));
        let to = FakeWalletRegistry::new();

        let report = migrate_wallets(&from, &to, &submitter(clock.clone()), MigrationOptions::default())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(to.batches(), vec![20, 20, 5]);
        assert_eq!(to.wallets(), wallets(45));
        assert_eq!(report.registered(), 45);
        assert_eq!(clock.total_sleep_time(), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_rerun_skips_registered_wallets() {
        let all = wallets(30);
        let from = FakeWalletRegistry::with_wallets(all.clone());
        let to = FakeWalletRegistry::with_wallets(all[..25].to_vec());

        let report = migrate_wallets(&from, &to, &submitter(FakeClock::new()), MigrationOptions::default())
            .await
            .unwrap();

        assert_eq!(report.already_registered, 25);
        assert_eq!(to.batches(), vec![5]);
        assert_eq!(to.wallets(), all);
    }

    #[tokio::test]
    async fn test_stops_at_first_failed_chunk() {
        let from = FakeWalletRegistry::with_wallets(wallets(50));
        let to = FakeWalletRegistry::new();
        to.pass_next("registerWallets", 1);
        to.fail_next("registerWallets", ScriptedFailure::revert("out of gas"), 1);

        let report = migrate_wallets(&from, &to, &submitter(FakeClock::new()), MigrationOptions::default())
            .await
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.checkpoint(), Some(1));
        assert_eq!(report.batches.len(), 2);
        assert_eq!(to.batches(), vec![20]);
    }

    #[tokio::test]
    async fn test_resume_from_checkpoint() {
        let all = wallets(50);
        let from = FakeWalletRegistry::with_wallets(all.clone());
        let to = FakeWalletRegistry::new();

        let options = MigrationOptions::default().with_resume_from(2);
        let report = migrate_wallets(&from, &to, &submitter(FakeClock::new()), options)
            .await
            .unwrap();

        assert_eq!(report.batches.len(), 1);
        assert_eq!(report.batches[0].index, 2);
        assert_eq!(to.wallets(), all[40..].to_vec());
    }

    #[tokio::test]
    async fn test_resuming_from_checkpoint_registers_every_wallet() {
        let all = wallets(50);
        let from = FakeWalletRegistry::with_wallets(all.clone());
        let to = FakeWalletRegistry::new();
        to.pass_next("registerWallets", 1);
        to.fail_next("registerWallets", ScriptedFailure::revert("out of gas"), 1);

        let first = migrate_wallets(&from, &to, &submitter(FakeClock::new()), MigrationOptions::default())
            .await
            .unwrap();
        let checkpoint = first.checkpoint().unwrap();
        assert_eq!(checkpoint, 1);

        let options = MigrationOptions::default().with_resume_from(checkpoint);
        let second = migrate_wallets(&from, &to, &submitter(FakeClock::new()), options)
            .await
            .unwrap();

        assert!(second.is_success());
        assert_eq!(second.registered(), 30);
        assert_eq!(to.batches(), vec![20, 20, 10]);
        assert_eq!(to.wallets(), all);
    }

    #[tokio::test]
    async fn test_chunks_keep_their_index_when_partly_registered() {
        let all = wallets(45);
        let from = FakeWalletRegistry::with_wallets(all.clone());
        let to = FakeWalletRegistry::with_wallets(vec![all[3], all[30]]);

        let report = migrate_wallets(&from, &to, &submitter(FakeClock::new()), MigrationOptions::default())
            .await
            .unwrap();

        assert_eq!(report.already_registered, 2);
        assert_eq!(
            report
                .batches
                .iter()
                .map(|b| (b.index, b.activated, b.skipped))
                .collect::<Vec<_>>(),
            vec![(0, 19, 1), (1, 19, 1), (2, 5, 0)]
        );
        assert_eq!(to.batches(), vec![19, 19, 5]);
    }

    #[tokio::test]
    async fn test_lost_receipt_is_settled_by_reading_the_registry() {
        let from = FakeWalletRegistry::with_wallets(wallets(25));
        let to = FakeWalletRegistry::new();
        to.lose_receipt_next(1);

        let report = migrate_wallets(&from, &to, &submitter(FakeClock::new()), MigrationOptions::default())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.registered(), 25);
        assert_eq!(to.batches(), vec![20, 5]);
        assert_eq!(to.wallets(), wallets(25));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let from = FakeWalletRegistry::with_wallets(wallets(3));
        let to = FakeWalletRegistry::new();
        to.fail_next("registerWallets", ScriptedFailure::transient(), 1);

        let report = migrate_wallets(&from, &to, &submitter(FakeClock::new()), MigrationOptions::default())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(to.wallets(), wallets(3));
    }
}
