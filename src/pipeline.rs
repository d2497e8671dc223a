// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Per-chain plans and the operator that runs them.
//!
//! A [`ChainPlan`] is an ordered list of [`PlanStage`]s for one chain. The
//! [`Operator`] runs the stages strictly in order and stops the chain at the
//! first stage that fails. [`run_tasks`] iterates chains so that one chain's
//! failure never prevents the next chain from running.

use std::future::Future;
use std::time::Duration;

use alloy_chains::NamedChain;
use alloy_primitives::Address;
use bon::Builder;
use tracing::{error, info, warn, Instrument};

use crate::chain::ChainProfile;
use crate::chunk::chunks;
use crate::error::{OpsError, Result};
use crate::registry::{migrate_wallets, MigrationOptions};
use crate::report::{BatchReport, ChainReport, RunReport, StageReport, WhitelistReport};
use crate::retry::Submitter;
use crate::sequencer::{AdminStep, ConfigurationSequencer};
use crate::spans;
use crate::timelock::{ManagingCategory, TimelockDriver, TimelockOptions};
use crate::token_list::{collect_candidates, normalize_candidates, CandidateList};
use crate::traits::{
    AdminTarget, Clock, TimelockContract, TokenListSource, Verifier, WalletRegistry,
};
use crate::verify::{VerificationOutcome, VerificationRequest};

/// Where a whitelist stage gets its addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    /// A fixed list, such as the bridge routers from the chain profile.
    Fixed(Vec<Address>),
    /// The operator's token list sources, queried with the profile's
    /// `token_list_chain_id`.
    TokenLists,
}

/// One step of a chain plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStage {
    Admin(Vec<AdminStep>),
    Whitelist {
        category: ManagingCategory,
        source: CandidateSource,
        /// Index of the first chunk to process.
        resume_from: usize,
    },
    MigrateWallets(MigrationOptions),
    Verify(VerificationRequest),
}

impl PlanStage {
    pub fn name(&self) -> &'static str {
        match self {
            PlanStage::Admin(_) => "admin",
            PlanStage::Whitelist { .. } => "whitelist",
            PlanStage::MigrateWallets(_) => "migrate_wallets",
            PlanStage::Verify(_) => "verify",
        }
    }
}

/// Ordered stages for one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPlan {
    pub chain: NamedChain,
    pub stages: Vec<PlanStage>,
}

impl ChainPlan {
    pub fn new(chain: NamedChain) -> Self {
        Self {
            chain,
            stages: Vec::new(),
        }
    }

    pub fn with_stage(mut self, stage: PlanStage) -> Self {
        self.stages.push(stage);
        self
    }

    /// The full post-deployment plan for a bridge splitter:
    ///
    /// 1. fee, DAO and version
    /// 2. whitelist the bridge routers
    /// 3. whitelist bridge assets from the token lists
    /// 4. moderators, block queue and ownership hand-over
    ///
    /// Ownership moves last so the deployer still holds the rights the
    /// whitelist stages need.
    pub fn bridge_splitter(profile: &ChainProfile, deployer: Address) -> Result<Self> {
        Ok(Self::new(profile.chain)
            .with_stage(PlanStage::Admin(profile.initial_steps()?))
            .with_stage(Self::whitelist_stage(
                profile,
                ManagingCategory::ReserveBridges,
                0,
            ))
            .with_stage(Self::whitelist_stage(
                profile,
                ManagingCategory::ReserveBridgeAssets,
                0,
            ))
            .with_stage(PlanStage::Admin(profile.handover_steps(deployer)?)))
    }

    /// Administrative steps only, initial then hand-over.
    pub fn configure(profile: &ChainProfile, deployer: Address) -> Result<Self> {
        let mut steps = profile.initial_steps()?;
        steps.extend(profile.handover_steps(deployer)?);
        Ok(Self::new(profile.chain).with_stage(PlanStage::Admin(steps)))
    }

    /// A single whitelist stage for `category`.
    pub fn whitelist(profile: &ChainProfile, category: ManagingCategory, resume_from: usize) -> Self {
        Self::new(profile.chain).with_stage(Self::whitelist_stage(profile, category, resume_from))
    }

    fn whitelist_stage(
        profile: &ChainProfile,
        category: ManagingCategory,
        resume_from: usize,
    ) -> PlanStage {
        let source = match category {
            ManagingCategory::ReserveBridges => CandidateSource::Fixed(profile.bridges.clone()),
            ManagingCategory::ReserveBridgeAssets => CandidateSource::TokenLists,
        };
        PlanStage::Whitelist {
            category,
            source,
            resume_from,
        }
    }
}

/// Runs [`ChainPlan`]s against one chain's contracts.
///
/// `timelock` and `admin` are usually two handles to the same splitter.
///
/// # Example
///
/// ```rust,ignore
/// let operator = Operator::builder()
///     .timelock(splitter.clone())
///     .admin(splitter)
///     .clock(TokioClock::new())
///     .profile(profile)
///     .token_sources(vec![Box::new(LifiTokenList::production()?)])
///     .build();
///
/// let report = operator.run(&plan).await;
/// ```
#[derive(Builder)]
pub struct Operator<T, A, C>
where
    T: TimelockContract + Clone,
    A: AdminTarget + Clone,
    C: Clock + Clone,
{
    timelock: T,
    admin: A,
    clock: C,
    profile: ChainProfile,
    /// Address of the configured contract, for logs and reports.
    #[builder(default = Address::ZERO)]
    target_address: Address,
    #[builder(default = Duration::from_secs(3))]
    settle_delay: Duration,
    #[builder(default)]
    timelock_options: TimelockOptions,
    #[builder(default)]
    token_sources: Vec<Box<dyn TokenListSource>>,
    verifier: Option<Box<dyn Verifier>>,
    migrate_from: Option<Box<dyn WalletRegistry>>,
    migrate_to: Option<Box<dyn WalletRegistry>>,
}

impl<T, A, C> Operator<T, A, C>
where
    T: TimelockContract + Clone,
    A: AdminTarget + Clone,
    C: Clock + Clone,
{
    pub fn profile(&self) -> &ChainProfile {
        &self.profile
    }

    /// Runs every stage of `plan` in order.
    ///
    /// Never fails: the first failed stage is recorded in the report and the
    /// remaining stages are not attempted.
    pub async fn run(&self, plan: &ChainPlan) -> ChainReport {
        let span = spans::chain_task(&plan.chain, plan.stages.len());
        self.run_inner(plan).instrument(span).await
    }

    async fn run_inner(&self, plan: &ChainPlan) -> ChainReport {
        let mut report = ChainReport::new(plan.chain);
        info!(
            chain = %plan.chain,
            stages = plan.stages.len(),
            event = "chain_plan_started"
        );

        for (index, stage) in plan.stages.iter().enumerate() {
            match self.run_stage(stage).await {
                Ok(stage_report) => {
                    let succeeded = stage_report.is_success();
                    report.stages.push(stage_report);
                    if !succeeded {
                        spans::record_error_with_context(
                            "StageFailed",
                            stage.name(),
                            Some(&format!("stage {index}")),
                        );
                        report.error = Some(format!("{} stage failed", stage.name()));
                        break;
                    }
                }
                Err(e) => {
                    spans::record_error(&e);
                    error!(
                        chain = %plan.chain,
                        stage = stage.name(),
                        index = index,
                        error = %e,
                        event = "chain_stage_failed"
                    );
                    report.error = Some(format!("{} stage: {e}", stage.name()));
                    break;
                }
            }
        }

        info!(
            chain = %plan.chain,
            success = report.is_success(),
            event = "chain_plan_finished"
        );
        report
    }

    async fn run_stage(&self, stage: &PlanStage) -> Result<StageReport> {
        match stage {
            PlanStage::Admin(steps) => Ok(StageReport::Admin(self.sequencer().run(steps).await?)),
            PlanStage::Whitelist {
                category,
                source,
                resume_from,
            } => Ok(StageReport::Whitelist(
                self.whitelist(*category, source, *resume_from).await?,
            )),
            PlanStage::MigrateWallets(options) => {
                let (Some(from), Some(to)) = (&self.migrate_from, &self.migrate_to) else {
                    return Err(OpsError::InvalidConfig(
                        "wallet migration needs a source and a destination registry".to_string(),
                    ));
                };
                let submitter = Submitter::new(self.timelock_options.retry, self.clock.clone());
                let report =
                    migrate_wallets(from.as_ref(), to.as_ref(), &submitter, *options).await?;
                Ok(StageReport::Migration(report))
            }
            PlanStage::Verify(request) => {
                let outcome = match &self.verifier {
                    Some(verifier) => self.sequencer().verify(verifier.as_ref(), request).await,
                    None => {
                        warn!(
                            address = %request.address,
                            event = "verification_skipped"
                        );
                        VerificationOutcome::Failed {
                            reason: "no explorer API key configured".to_string(),
                        }
                    }
                };
                Ok(StageReport::Verification(outcome))
            }
        }
    }

    fn sequencer(&self) -> ConfigurationSequencer<A, C> {
        ConfigurationSequencer::builder()
            .target(self.admin.clone())
            .clock(self.clock.clone())
            .target_address(self.target_address)
            .settle_delay(self.settle_delay)
            .retry(self.timelock_options.retry)
            .build()
    }

    async fn candidates(&self, source: &CandidateSource) -> Result<CandidateList> {
        match source {
            CandidateSource::Fixed(addresses) => {
                let raw: Vec<String> = addresses.iter().map(|a| a.to_checksum(None)).collect();
                Ok(normalize_candidates(&raw))
            }
            CandidateSource::TokenLists => {
                if self.token_sources.is_empty() {
                    return Err(OpsError::InvalidConfig(
                        "no token list sources configured".to_string(),
                    ));
                }
                collect_candidates(&self.token_sources, self.profile.token_list_chain_id).await
            }
        }
    }

    /// Activates every candidate of `category`.
    ///
    /// Candidates are split into chunks of the profile's queue limit, each
    /// chunk queued with one call and toggled in slices of the toggle limit.
    /// Processing stops at the first failed chunk, whose index is the
    /// report's checkpoint.
    ///
    /// # Errors
    ///
    /// Fails only when no candidates can be collected or a limit is zero.
    pub async fn whitelist(
        &self,
        category: ManagingCategory,
        source: &CandidateSource,
        resume_from: usize,
    ) -> Result<WhitelistReport> {
        let candidates = self.candidates(source).await?;
        for rejected in &candidates.rejected {
            warn!(
                category = %category,
                input = %rejected.input,
                reason = %rejected.reason,
                event = "candidate_rejected"
            );
        }

        let limits = self.profile.token_limits;
        let driver = TimelockDriver::builder()
            .contract(self.timelock.clone())
            .clock(self.clock.clone())
            .options(self.timelock_options.with_toggle_limit(limits.toggle))
            .build();

        let mut report = WhitelistReport::new(category, candidates.len(), candidates.rejected.len());
        let sequence = chunks(&candidates.addresses, limits.queue)?.resume_from(resume_from);
        let total = sequence.total();
        info!(
            category = %category,
            candidates = candidates.len(),
            batches = total,
            resume_from = resume_from,
            event = "whitelist_started"
        );

        for batch in sequence {
            let span = spans::batch("whitelist", batch.index, total, batch.len());
            match driver
                .activate_many(category, batch.items)
                .instrument(span)
                .await
            {
                Ok(activation) => {
                    report.batches.push(BatchReport::succeeded(
                        batch.index,
                        batch.len(),
                        activation.activated.len(),
                        activation.skipped.len(),
                    ));
                }
                Err(e) => {
                    error!(
                        category = %category,
                        batch = batch.index,
                        size = batch.len(),
                        error = %e,
                        event = "whitelist_batch_failed"
                    );
                    report
                        .batches
                        .push(BatchReport::failed(batch.index, batch.len(), &e));
                    break;
                }
            }
        }

        info!(
            category = %category,
            activated = report.activated(),
            checkpoint = ?report.checkpoint(),
            event = "whitelist_finished"
        );
        Ok(report)
    }
}

/// A plan bound to the operator that runs it.
pub struct ChainTask<T, A, C>
where
    T: TimelockContract + Clone,
    A: AdminTarget + Clone,
    C: Clock + Clone,
{
    pub operator: Operator<T, A, C>,
    pub plan: ChainPlan,
}

impl<T, A, C> ChainTask<T, A, C>
where
    T: TimelockContract + Clone,
    A: AdminTarget + Clone,
    C: Clock + Clone,
{
    pub async fn run(&self) -> ChainReport {
        self.operator.run(&self.plan).await
    }
}

/// Runs `task` for every chain, one after another.
///
/// An error from `task` (a chain that could not even be set up) is recorded
/// in that chain's report and the next chain still runs.
pub async fn run_tasks<I, F, Fut>(chains: I, mut task: F) -> RunReport
where
    I: IntoIterator<Item = NamedChain>,
    F: FnMut(NamedChain) -> Fut,
    Fut: Future<Output = Result<ChainReport>>,
{
    let mut report = RunReport::default();
    for chain in chains {
        let chain_report = match task(chain).await {
            Ok(chain_report) => chain_report,
            Err(e) => {
                error!(chain = %chain, error = %e, event = "chain_task_failed");
                ChainReport {
                    error: Some(e.to_string()),
                    ..ChainReport::new(chain)
                }
            }
        };
        report.chains.push(chain_report);
    }
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        event = "run_finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::addresses::{FANTOM_DAO, FANTOM_MULTISIG, LIFI_DIAMOND, SQUID_ROUTER};
    use crate::retry::RetryPolicy;
    use crate::testing::{
        FakeAdminTarget, FakeClock, FakeTimelock, FakeTokenListSource, FakeVerifier,
        FakeWalletRegistry, ScriptedFailure,
    };

    const DEPLOYER: Address = Address::repeat_byte(0xde);

    fn token(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn token_strings(n: u8) -> Vec<String> {
        (1..=n).map(|i| token(i).to_checksum(None)).collect()
    }

    fn fantom_tokens(n: u8) -> FakeTokenListSource {
        let strings = token_strings(n);
        let refs: Vec<&str> = strings.iter().map(String::as_str).collect();
        FakeTokenListSource::new("lifi").with_tokens(250, &refs)
    }

    fn fast_options() -> TimelockOptions {
        TimelockOptions::default()
            .with_poll_interval_secs(1)
            .with_retry(RetryPolicy::default().with_max_attempts(3).with_delay_secs(1))
    }

    fn operator(
        clock: &FakeClock,
        timelock: &FakeTimelock,
        admin: &FakeAdminTarget,
        profile: ChainProfile,
        tokens: FakeTokenListSource,
    ) -> Operator<FakeTimelock, FakeAdminTarget, FakeClock> {
        Operator::builder()
            .timelock(timelock.clone())
            .admin(admin.clone())
            .clock(clock.clone())
            .profile(profile)
            .timelock_options(fast_options())
            .token_sources(vec![Box::new(tokens) as Box<dyn TokenListSource>])
            .build()
    }

    #[test]
    fn test_bridge_splitter_plan_order() {
        let profile = ChainProfile::builtin(NamedChain::Fantom).unwrap();
        let plan = ChainPlan::bridge_splitter(&profile, DEPLOYER).unwrap();

        let names: Vec<_> = plan.stages.iter().map(PlanStage::name).collect();
        assert_eq!(names, vec!["admin", "whitelist", "whitelist", "admin"]);
        assert_eq!(
            plan.stages[1],
            PlanStage::Whitelist {
                category: ManagingCategory::ReserveBridges,
                source: CandidateSource::Fixed(vec![LIFI_DIAMOND, SQUID_ROUTER]),
                resume_from: 0,
            }
        );
        let PlanStage::Admin(handover) = &plan.stages[3] else {
            panic!("expected admin stage");
        };
        assert_eq!(
            handover.last(),
            Some(&AdminStep::TransferOwnership(FANTOM_MULTISIG))
        );
    }

    #[test]
    fn test_plan_needs_dao() {
        let profile = ChainProfile::builtin(NamedChain::Moonriver).unwrap();
        assert!(matches!(
            ChainPlan::bridge_splitter(&profile, DEPLOYER),
            Err(OpsError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_full_plan_on_fakes() {
        let clock = FakeClock::new();
        let timelock = FakeTimelock::new(clock.clone(), 10);
        let admin = FakeAdminTarget::new(DEPLOYER);
        let profile = ChainProfile::builtin(NamedChain::Fantom).unwrap();
        let plan = ChainPlan::bridge_splitter(&profile, DEPLOYER).unwrap();

        let report = operator(&clock, &timelock, &admin, profile, fantom_tokens(5))
            .run(&plan)
            .await;

        assert!(report.is_success(), "{report}");
        assert_eq!(report.stages.len(), 4);
        let values = admin.values();
        assert_eq!(values.dao, FANTOM_DAO);
        assert_eq!(values.fee_percentage, 75);
        assert_eq!(values.owner, FANTOM_MULTISIG);
        assert!(!values.moderators.contains(&DEPLOYER));
        for i in 1..=5 {
            assert!(timelock
                .state_of(ManagingCategory::ReserveBridgeAssets, token(i))
                .is_active());
        }
        assert!(timelock
            .state_of(ManagingCategory::ReserveBridges, LIFI_DIAMOND)
            .is_active());
    }

    #[tokio::test]
    async fn test_assets_are_chunked_by_token_limits() {
        let clock = FakeClock::new();
        let timelock = FakeTimelock::new(clock.clone(), 5);
        let admin = FakeAdminTarget::new(DEPLOYER);
        let mut profile = ChainProfile::builtin(NamedChain::Fantom).unwrap();
        profile.token_limits.queue = 20;
        profile.token_limits.toggle = 10;

        let report = operator(&clock, &timelock, &admin, profile, fantom_tokens(45))
            .whitelist(
                ManagingCategory::ReserveBridgeAssets,
                &CandidateSource::TokenLists,
                0,
            )
            .await
            .unwrap();

        assert!(report.is_success());
        let sizes: Vec<_> = report.batches.iter().map(|b| b.size).collect();
        assert_eq!(sizes, vec![20, 20, 5]);
        assert_eq!(report.activated(), 45);
        assert_eq!(timelock.mined_count("queueMany"), 3);
        // 10 + 10, 10 + 10, 5
        assert_eq!(timelock.mined_count("toggleMany"), 5);
    }

    #[tokio::test]
    async fn test_failed_whitelist_keeps_ownership() {
        let clock = FakeClock::new();
        let timelock = FakeTimelock::new(clock.clone(), 5);
        timelock.fail_next("queueMany", ScriptedFailure::revert("out of gas"), 1);
        let admin = FakeAdminTarget::new(DEPLOYER);
        let profile = ChainProfile::builtin(NamedChain::Fantom).unwrap();
        let plan = ChainPlan::bridge_splitter(&profile, DEPLOYER).unwrap();

        let report = operator(&clock, &timelock, &admin, profile, fantom_tokens(5))
            .run(&plan)
            .await;

        assert!(!report.is_success());
        assert_eq!(report.error.as_deref(), Some("whitelist stage failed"));
        assert_eq!(report.stages.len(), 2);
        assert_eq!(admin.values().owner, DEPLOYER);
    }

    #[tokio::test]
    async fn test_missing_token_sources_fail_the_stage() {
        let clock = FakeClock::new();
        let timelock = FakeTimelock::new(clock.clone(), 5);
        let admin = FakeAdminTarget::new(DEPLOYER);
        let profile = ChainProfile::builtin(NamedChain::Fantom).unwrap();
        let operator = Operator::builder()
            .timelock(timelock)
            .admin(admin)
            .clock(clock)
            .profile(profile.clone())
            .build();

        let report = operator
            .run(&ChainPlan::whitelist(
                &profile,
                ManagingCategory::ReserveBridgeAssets,
                0,
            ))
            .await;

        assert!(!report.is_success());
        assert!(report.stages.is_empty());
        assert!(report.error.unwrap().contains("no token list sources"));
    }

    #[tokio::test]
    async fn test_migration_and_verification_stages() {
        let clock = FakeClock::new();
        let timelock = FakeTimelock::new(clock.clone(), 5);
        let admin = FakeAdminTarget::new(DEPLOYER);
        let profile = ChainProfile::builtin(NamedChain::Fantom).unwrap();
        let from = FakeWalletRegistry::with_wallets((1..=25).map(token).collect());
        let to = FakeWalletRegistry::new();
        let verifier = FakeVerifier::already_verified();

        let operator = Operator::builder()
            .timelock(timelock)
            .admin(admin)
            .clock(clock)
            .profile(profile)
            .verifier(Box::new(verifier.clone()))
            .migrate_from(Box::new(from))
            .migrate_to(Box::new(to.clone()))
            .build();

        let request = VerificationRequest {
            address: token(0xaa),
            contract: "contracts/HecBridgeSplitter.sol:HecBridgeSplitter".to_string(),
            constructor_args: String::new(),
            source: String::new(),
            compiler_version: "v0.8.7+commit.e28d00a7".to_string(),
        };
        let plan = ChainPlan::new(NamedChain::Fantom)
            .with_stage(PlanStage::MigrateWallets(MigrationOptions::default()))
            .with_stage(PlanStage::Verify(request));

        let report = operator.run(&plan).await;

        assert!(report.is_success(), "{report}");
        assert_eq!(to.batches(), vec![20, 5]);
        assert_eq!(verifier.requests().len(), 1);
        assert_eq!(
            report.stages[1],
            StageReport::Verification(VerificationOutcome::AlreadyVerified)
        );
    }

    #[tokio::test]
    async fn test_chains_are_independent() {
        let report = run_tasks(
            [NamedChain::Fantom, NamedChain::Polygon, NamedChain::Celo],
            |chain| async move {
                match chain {
                    NamedChain::Polygon => Err(OpsError::InvalidConfig("no RPC URL".to_string())),
                    other => Ok(ChainReport::new(other)),
                }
            },
        )
        .await;

        assert_eq!(report.chains.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
        assert!(!report.chain(NamedChain::Polygon).unwrap().is_success());
        assert!(report.chain(NamedChain::Celo).unwrap().is_success());
    }
}
