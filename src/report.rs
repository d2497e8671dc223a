// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! End-of-run reporting.
//!
//! Every stage of a chain plan leaves a report behind, and the binary prints
//! the [`RunReport`] summary once all chains have been processed. A failed
//! batch carries its index so the operator knows where to resume.

use std::fmt;

use alloy_chains::NamedChain;
use alloy_primitives::TxHash;

use crate::sequencer::AdminStep;
use crate::timelock::ManagingCategory;
use crate::verify::VerificationOutcome;

/// Outcome of one chunk of a whitelist or migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub index: usize,
    pub size: usize,
    /// Entries that ended up active (or registered) in this batch.
    pub activated: usize,
    /// Entries that needed no change.
    pub skipped: usize,
    pub error: Option<String>,
}

impl BatchReport {
    pub fn succeeded(index: usize, size: usize, activated: usize, skipped: usize) -> Self {
        Self {
            index,
            size,
            activated,
            skipped,
            error: None,
        }
    }

    pub fn failed(index: usize, size: usize, error: impl ToString) -> Self {
        Self {
            index,
            size,
            activated: 0,
            skipped: 0,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// First failed batch, which is where a re-run should resume.
fn checkpoint(batches: &[BatchReport]) -> Option<usize> {
    batches.iter().find(|b| !b.is_success()).map(|b| b.index)
}

fn write_batches(f: &mut fmt::Formatter<'_>, batches: &[BatchReport]) -> fmt::Result {
    for batch in batches {
        match &batch.error {
            None => writeln!(
                f,
                "    batch {}: {} entries, {} activated, {} skipped",
                batch.index, batch.size, batch.activated, batch.skipped
            )?,
            Some(error) => writeln!(
                f,
                "    batch {}: {} entries, FAILED: {error} (resume from batch {})",
                batch.index, batch.size, batch.index
            )?,
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Applied { tx_hash: TxHash, attempts: u32 },
    /// Already in effect on chain.
    Skipped,
    Failed { error: String },
    /// Not reached because an earlier step failed.
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub index: usize,
    pub name: &'static str,
    pub step: String,
    pub status: StepStatus,
}

impl StepReport {
    pub fn new(index: usize, step: &AdminStep, status: StepStatus) -> Self {
        Self {
            index,
            name: step.name(),
            step: step.to_string(),
            status,
        }
    }
}

/// Result of a configuration sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceReport {
    pub steps: Vec<StepReport>,
    /// Index of the step that failed and stopped the sequence.
    pub aborted_at: Option<usize>,
    pub verification: Option<VerificationOutcome>,
}

impl SequenceReport {
    pub fn applied(&self) -> usize {
        self.count(|s| matches!(s, StepStatus::Applied { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, StepStatus::Skipped))
    }

    fn count(&self, pred: impl Fn(&StepStatus) -> bool) -> usize {
        self.steps.iter().filter(|s| pred(&s.status)).count()
    }

    pub fn failed_step(&self) -> Option<&StepReport> {
        self.aborted_at.and_then(|i| self.steps.get(i))
    }

    /// Verification failures do not count against the sequence.
    pub fn is_success(&self) -> bool {
        self.aborted_at.is_none()
    }
}

/// Result of activating one category's candidates in chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhitelistReport {
    pub category: ManagingCategory,
    pub candidates: usize,
    pub rejected: usize,
    pub batches: Vec<BatchReport>,
}

impl WhitelistReport {
    pub fn new(category: ManagingCategory, candidates: usize, rejected: usize) -> Self {
        Self {
            category,
            candidates,
            rejected,
            batches: Vec::new(),
        }
    }

    pub fn activated(&self) -> usize {
        self.batches.iter().map(|b| b.activated).sum()
    }

    pub fn checkpoint(&self) -> Option<usize> {
        checkpoint(&self.batches)
    }

    pub fn is_success(&self) -> bool {
        self.checkpoint().is_none()
    }
}

/// Result of copying wallets between registration contracts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub source_total: usize,
    pub already_registered: usize,
    pub batches: Vec<BatchReport>,
}

impl MigrationReport {
    pub fn registered(&self) -> usize {
        self.batches.iter().map(|b| b.activated).sum()
    }

    pub fn checkpoint(&self) -> Option<usize> {
        checkpoint(&self.batches)
    }

    pub fn is_success(&self) -> bool {
        self.checkpoint().is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageReport {
    Admin(SequenceReport),
    Whitelist(WhitelistReport),
    Migration(MigrationReport),
    Verification(VerificationOutcome),
}

impl StageReport {
    pub fn is_success(&self) -> bool {
        match self {
            StageReport::Admin(report) => report.is_success(),
            StageReport::Whitelist(report) => report.is_success(),
            StageReport::Migration(report) => report.is_success(),
            StageReport::Verification(_) => true,
        }
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageReport::Admin(report) => {
                write!(
                    f,
                    "  admin: {} steps, {} applied, {} skipped",
                    report.steps.len(),
                    report.applied(),
                    report.skipped()
                )?;
                if let Some(step) = report.failed_step() {
                    if let StepStatus::Failed { error } = &step.status {
                        write!(f, ", aborted at step {} ({}): {error}", step.index, step.name)?;
                    }
                }
                writeln!(f)?;
                if let Some(verification) = &report.verification {
                    writeln!(f, "  verification: {}", VerificationLabel(verification))?;
                }
                Ok(())
            }
            StageReport::Whitelist(report) => {
                writeln!(
                    f,
                    "  whitelist {}: {} candidates, {} rejected",
                    report.category, report.candidates, report.rejected
                )?;
                write_batches(f, &report.batches)
            }
            StageReport::Migration(report) => {
                writeln!(
                    f,
                    "  migrate wallets: {} on source, {} already registered",
                    report.source_total, report.already_registered
                )?;
                write_batches(f, &report.batches)
            }
            StageReport::Verification(outcome) => {
                writeln!(f, "  verification: {}", VerificationLabel(outcome))
            }
        }
    }
}

struct VerificationLabel<'a>(&'a VerificationOutcome);

impl fmt::Display for VerificationLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            VerificationOutcome::Verified => f.write_str("verified"),
            VerificationOutcome::AlreadyVerified => f.write_str("already verified"),
            VerificationOutcome::Failed { reason } => write!(f, "failed ({reason})"),
        }
    }
}

/// Everything that happened on one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub chain: NamedChain,
    pub stages: Vec<StageReport>,
    /// Error that stopped the chain's plan, if any.
    pub error: Option<String>,
}

impl ChainReport {
    pub fn new(chain: NamedChain) -> Self {
        Self {
            chain,
            stages: Vec::new(),
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.stages.iter().all(StageReport::is_success)
    }
}

impl fmt::Display for ChainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            None if self.is_success() => writeln!(f, "{}: ok", self.chain)?,
            None => writeln!(f, "{}: FAILED", self.chain)?,
            Some(error) => writeln!(f, "{}: FAILED ({error})", self.chain)?,
        }
        for stage in &self.stages {
            write!(f, "{stage}")?;
        }
        Ok(())
    }
}

/// Summary of a whole run across chains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub chains: Vec<ChainReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.chains.iter().filter(|c| c.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.chains.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn chain(&self, chain: NamedChain) -> Option<&ChainReport> {
        self.chains.iter().find(|c| c.chain == chain)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chain in &self.chains {
            write!(f, "{chain}")?;
        }
        write!(
            f,
            "{} chain(s) succeeded, {} failed",
            self.succeeded(),
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;

    fn sample() -> RunReport {
        let dao = Address::repeat_byte(0x67);
        let admin = SequenceReport {
            steps: vec![
                StepReport::new(0, &AdminStep::SetFeePercentage(75), StepStatus::Skipped),
                StepReport::new(
                    1,
                    &AdminStep::SetDao(dao),
                    StepStatus::Applied {
                        tx_hash: TxHash::ZERO,
                        attempts: 1,
                    },
                ),
            ],
            aborted_at: None,
            verification: Some(VerificationOutcome::AlreadyVerified),
        };

        let mut bridges = WhitelistReport::new(ManagingCategory::ReserveBridges, 2, 0);
        bridges.batches.push(BatchReport::succeeded(0, 2, 1, 1));

        let mut assets = WhitelistReport::new(ManagingCategory::ReserveBridgeAssets, 45, 1);
        assets.batches.push(BatchReport::succeeded(0, 20, 20, 0));
        assets
            .batches
            .push(BatchReport::failed(1, 20, "Gave up after 10 attempts: timeout"));

        RunReport {
            chains: vec![
                ChainReport {
                    chain: NamedChain::Fantom,
                    stages: vec![StageReport::Admin(admin), StageReport::Whitelist(bridges)],
                    error: None,
                },
                ChainReport {
                    chain: NamedChain::Polygon,
                    stages: vec![StageReport::Whitelist(assets)],
                    error: Some("whitelist stage failed".to_string()),
                },
            ],
        }
    }

    #[test]
    fn test_counters() {
        let report = sample();
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
        assert!(report.chain(NamedChain::Fantom).unwrap().is_success());
    }

    #[test]
    fn test_checkpoint_is_first_failed_batch() {
        let report = sample();
        let polygon = report.chain(NamedChain::Polygon).unwrap();
        let StageReport::Whitelist(assets) = &polygon.stages[0] else {
            panic!("expected whitelist stage");
        };
        assert_eq!(assets.checkpoint(), Some(1));
        assert_eq!(assets.activated(), 20);
    }

    #[test]
    fn test_summary_format() {
        insta::assert_snapshot!(sample().to_string(), @r"
        fantom: ok
          admin: 2 steps, 1 applied, 1 skipped
          verification: already verified
          whitelist RESERVE_BRIDGES: 2 candidates, 0 rejected
            batch 0: 2 entries, 1 activated, 1 skipped
        polygon: FAILED (whitelist stage failed)
          whitelist RESERVE_BRIDGE_ASSETS: 45 candidates, 1 rejected
            batch 0: 20 entries, 20 activated, 0 skipped
            batch 1: 20 entries, FAILED: Gave up after 10 attempts: timeout (resume from batch 1)
        1 chain(s) succeeded, 1 failed
        ");
    }

    #[test]
    fn test_empty_run_is_success() {
        let report = RunReport::default();
        assert!(report.is_success());
        assert_eq!(report.to_string(), "0 chain(s) succeeded, 0 failed");
    }
}
