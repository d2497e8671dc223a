// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Post-deployment configuration sequencer.
//!
//! Applies an ordered list of administrative calls to a freshly deployed
//! contract: fee, DAO, version, moderators, block queue, ownership, and the
//! one-time `initialize` of a lock address registry. Steps run strictly in
//! order with a settle delay after each. Steps whose effect is
//! already on chain are skipped, so a sequence that failed half-way can be
//! re-run as is.

use std::fmt;
use std::time::Duration;

use alloy_primitives::Address;
use bon::Builder;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn, Instrument};

use crate::error::{OpsError, Result};
use crate::report::{SequenceReport, StepReport, StepStatus};
use crate::retry::{RetryPolicy, Submitter};
use crate::spans;
use crate::traits::{AdminTarget, Clock, Verifier};
use crate::verify::{VerificationOutcome, VerificationRequest};

/// Fee percentages are expressed in basis points of 10000.
pub const MAX_FEE_PERCENTAGE: u16 = 10_000;

/// Arguments of `LockAddressRegistry.initialize`.
///
/// Chains without a dedicated token vault, FNFT or treasury pass the
/// moderator for those slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRegistryInit {
    pub multisig: Address,
    pub moderator: Address,
    pub token_vault: Address,
    pub fnft: Address,
    pub treasury: Address,
}

impl LockRegistryInit {
    /// Every slot filled by `moderator`.
    pub fn with_moderator(multisig: Address, moderator: Address) -> Self {
        Self {
            multisig,
            moderator,
            token_vault: moderator,
            fnft: moderator,
            treasury: moderator,
        }
    }

    /// `initialize` followed by one `setModerator(true)` per extra moderator,
    /// such as the redemption NFT vault.
    pub fn steps(&self, extra_moderators: &[Address]) -> Vec<AdminStep> {
        std::iter::once(AdminStep::InitializeLockRegistry(self.clone()))
            .chain(
                extra_moderators
                    .iter()
                    .filter(|m| **m != self.moderator)
                    .map(|m| AdminStep::AddModerator(*m)),
            )
            .collect()
    }

    fn zero_slot(&self) -> Option<&'static str> {
        [
            ("multisig", self.multisig),
            ("moderator", self.moderator),
            ("token vault", self.token_vault),
            ("fnft", self.fnft),
            ("treasury", self.treasury),
        ]
        .into_iter()
        .find(|(_, address)| address.is_zero())
        .map(|(slot, _)| slot)
    }
}

/// One administrative call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "value", rename_all = "snake_case")]
pub enum AdminStep {
    SetFeePercentage(u16),
    SetDao(Address),
    SetVersion(String),
    AddModerator(Address),
    RevokeModerator(Address),
    /// Number of blocks a queued change must wait.
    SetBlockQueue(u64),
    TransferOwnership(Address),
    InitializeLockRegistry(LockRegistryInit),
}

impl AdminStep {
    /// Contract method name, used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            AdminStep::SetFeePercentage(_) => "setMinFeePercentage",
            AdminStep::SetDao(_) => "setDAO",
            AdminStep::SetVersion(_) => "setVersion",
            AdminStep::AddModerator(_) => "setModerator(true)",
            AdminStep::RevokeModerator(_) => "setModerator(false)",
            AdminStep::SetBlockQueue(_) => "setBlockQueue",
            AdminStep::TransferOwnership(_) => "transferOwnership",
            AdminStep::InitializeLockRegistry(_) => "initialize",
        }
    }

    /// Rejects values that must never reach the chain.
    pub fn validate(&self) -> Result<()> {
        let zero = |what: &str| {
            Err(OpsError::InvalidConfig(format!(
                "{}: {what} must not be the zero address",
                self.name()
            )))
        };
        match self {
            AdminStep::SetDao(a) if a.is_zero() => zero("DAO"),
            AdminStep::AddModerator(a) if a.is_zero() => zero("moderator"),
            AdminStep::TransferOwnership(a) if a.is_zero() => zero("new owner"),
            AdminStep::InitializeLockRegistry(init) => match init.zero_slot() {
                Some(slot) => zero(slot),
                None => Ok(()),
            },
            AdminStep::SetFeePercentage(fee) if *fee > MAX_FEE_PERCENTAGE => {
                Err(OpsError::InvalidConfig(format!(
                    "fee percentage {fee} exceeds {MAX_FEE_PERCENTAGE}"
                )))
            }
            AdminStep::SetVersion(v) if v.trim().is_empty() => Err(OpsError::InvalidConfig(
                "setVersion: version must not be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for AdminStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdminStep::SetFeePercentage(fee) => write!(f, "{}({fee})", self.name()),
            AdminStep::SetDao(a)
            | AdminStep::AddModerator(a)
            | AdminStep::RevokeModerator(a)
            | AdminStep::TransferOwnership(a) => write!(f, "{}({a})", self.name()),
            AdminStep::SetVersion(v) => write!(f, "{}({v})", self.name()),
            AdminStep::SetBlockQueue(blocks) => write!(f, "{}({blocks})", self.name()),
            AdminStep::InitializeLockRegistry(init) => write!(
                f,
                "{}({}, {}, {}, {}, {})",
                self.name(),
                init.multisig,
                init.moderator,
                init.token_vault,
                init.fnft,
                init.treasury
            ),
        }
    }
}

/// Runs [`AdminStep`]s against one [`AdminTarget`].
#[derive(Builder, Clone, Debug)]
pub struct ConfigurationSequencer<A, C>
where
    A: AdminTarget,
    C: Clock + Clone,
{
    target: A,
    clock: C,
    /// Address of the configured contract, for logs and reports.
    #[builder(default = Address::ZERO)]
    target_address: Address,
    #[builder(default = Duration::from_secs(3))]
    settle_delay: Duration,
    #[builder(default)]
    retry: RetryPolicy,
}

impl<A, C> ConfigurationSequencer<A, C>
where
    A: AdminTarget,
    C: Clock + Clone,
{
    pub fn target(&self) -> &A {
        &self.target
    }

    fn submitter(&self) -> Submitter<C> {
        Submitter::new(self.retry, self.clock.clone())
    }

    /// Executes `steps` in order.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::InvalidConfig`] before any call is made if a step
    /// fails validation. Failures of individual calls do not error: they stop
    /// the remaining steps and are recorded in the returned report.
    pub async fn run(&self, steps: &[AdminStep]) -> Result<SequenceReport> {
        for step in steps {
            step.validate()?;
        }

        let mut report = SequenceReport::default();
        let mut failed = false;

        for (index, step) in steps.iter().enumerate() {
            if failed {
                report.steps.push(StepReport::new(index, step, StepStatus::NotAttempted));
                continue;
            }
            let span = spans::admin_step(index, step.name(), &self.target_address);
            let status = self.run_step(index, step).instrument(span).await;
            if let StepStatus::Failed { .. } = status {
                failed = true;
                report.aborted_at = Some(index);
            }
            report.steps.push(StepReport::new(index, step, status));
        }

        info!(
            target = %self.target_address,
            applied = report.applied(),
            skipped = report.skipped(),
            aborted_at = ?report.aborted_at,
            event = "sequence_finished"
        );
        Ok(report)
    }

    async fn run_step(&self, index: usize, step: &AdminStep) -> StepStatus {
        let applied = self
            .submitter()
            .submit("isApplied", || self.target.is_applied(step))
            .await
            .into_result();
        match applied {
            Ok(true) => {
                info!(index = index, step = %step, event = "admin_step_skipped");
                return StepStatus::Skipped;
            }
            Ok(false) => {}
            Err(e) => return self.step_failed(index, step, e),
        }

        let outcome = self
            .submitter()
            .submit_tx(
                step.name(),
                || self.target.apply(step),
                || self.target.is_applied(step),
            )
            .await;
        let attempts = outcome.attempts();
        match outcome.into_result() {
            Ok(tx_hash) => {
                info!(
                    index = index,
                    step = %step,
                    tx_hash = %tx_hash,
                    attempts = attempts,
                    event = "admin_step_applied"
                );
                self.clock.sleep(self.settle_delay).await;
                StepStatus::Applied { tx_hash, attempts }
            }
            Err(e) => self.step_failed(index, step, e),
        }
    }

    fn step_failed(&self, index: usize, step: &AdminStep, error: OpsError) -> StepStatus {
        spans::record_error(&error);
        error!(
            index = index,
            step = %step,
            target = %self.target_address,
            error = %error,
            event = "admin_step_failed"
        );
        StepStatus::Failed {
            error: error.to_string(),
        }
    }

    /// Submits source verification. Failures are logged and returned, never
    /// raised.
    pub async fn verify<V: Verifier + ?Sized>(
        &self,
        verifier: &V,
        request: &VerificationRequest,
    ) -> VerificationOutcome {
        let span = spans::verify(&request.address, &request.contract);
        async {
            match verifier.verify(request).await {
                Ok(status) => {
                    info!(
                        address = %request.address,
                        contract = %request.contract,
                        status = ?status,
                        event = "verification_finished"
                    );
                    VerificationOutcome::from(status)
                }
                Err(e) => {
                    spans::record_error(&e);
                    warn!(
                        address = %request.address,
                        contract = %request.contract,
                        error = %e,
                        event = "verification_failed"
                    );
                    VerificationOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Runs the sequence, then verification, recording both in one report.
    pub async fn run_then_verify<V: Verifier + ?Sized>(
        &self,
        steps: &[AdminStep],
        verifier: &V,
        request: &VerificationRequest,
    ) -> Result<SequenceReport> {
        let mut report = self.run(steps).await?;
        self.clock.sleep(self.settle_delay).await;
        report.verification = Some(self.verify(verifier, request).await);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use rstest::rstest;

    #[rstest]
    #[case(AdminStep::SetDao(Address::ZERO))]
    #[case(AdminStep::AddModerator(Address::ZERO))]
    #[case(AdminStep::TransferOwnership(Address::ZERO))]
    #[case(AdminStep::SetFeePercentage(10_001))]
    #[case(AdminStep::SetVersion("  ".to_string()))]
    fn test_invalid_steps(#[case] step: AdminStep) {
        assert!(matches!(step.validate(), Err(OpsError::InvalidConfig(_))));
    }

    #[test]
    fn test_revoking_zero_address_is_allowed() {
        assert!(AdminStep::RevokeModerator(Address::ZERO).validate().is_ok());
    }

    #[test]
    fn test_step_display() {
        let dao = address!("677d6EC74fA352D4Ef9B1886F6155384aCD70D90");
        assert_eq!(
            AdminStep::SetDao(dao).to_string(),
            format!("setDAO({dao})")
        );
        assert_eq!(
            AdminStep::SetBlockQueue(28_800).to_string(),
            "setBlockQueue(28800)"
        );
    }

    #[test]
    fn test_lock_registry_init_rejects_zero_slots() {
        let moderator = address!("3e7c7e8d7d6e3b7e9ee5a1a45c5b1e1b4f0f9f2a");
        let mut init = LockRegistryInit::with_moderator(moderator, moderator);
        assert!(AdminStep::InitializeLockRegistry(init.clone()).validate().is_ok());

        init.fnft = Address::ZERO;
        let err = AdminStep::InitializeLockRegistry(init).validate().unwrap_err();
        assert!(err.to_string().contains("fnft"));
    }

    #[test]
    fn test_lock_registry_steps_skip_duplicate_moderator() {
        let multisig = address!("2ba5f2ce103a45e278d7bc99153190ed6e9c4a96");
        let moderator = address!("3e7c7e8d7d6e3b7e9ee5a1a45c5b1e1b4f0f9f2a");
        let vault = address!("4d8c8f9e8e7f4c8fa0f6b2b56d6c2f2c5a1a0a3b");
        let init = LockRegistryInit::with_moderator(multisig, moderator);

        let steps = init.steps(&[moderator, vault]);
        assert_eq!(
            steps,
            vec![
                AdminStep::InitializeLockRegistry(init),
                AdminStep::AddModerator(vault),
            ]
        );
        assert_eq!(steps[0].name(), "initialize");
    }

    #[test]
    fn test_step_serde_shape() {
        let step: AdminStep =
            serde_json::from_str(r#"{"step":"set_fee_percentage","value":75}"#).unwrap();
        assert_eq!(step, AdminStep::SetFeePercentage(75));
    }
}
