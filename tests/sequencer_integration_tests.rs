//! Integration tests for the post-deployment configuration sequencer.

use std::time::Duration;

use alloy_chains::NamedChain;
use alloy_primitives::Address;
use hector_ops::chain::addresses::{FANTOM_DAO, FANTOM_DEV_MULTISIG, FANTOM_MULTISIG};
use hector_ops::testing::{FakeAdminTarget, FakeClock, FakeVerifier, ScriptedFailure};
use hector_ops::traits::AdminTarget;
use hector_ops::{
    AdminStep, ChainProfile, ConfigurationSequencer, LockRegistryInit, OpsError, RetryPolicy,
    StepStatus, VerificationOutcome, VerificationRequest,
};

const DEPLOYER: Address = Address::repeat_byte(0xde);

fn fantom_steps() -> Vec<AdminStep> {
    let profile = ChainProfile::builtin(NamedChain::Fantom).unwrap();
    let mut steps = profile.initial_steps().unwrap();
    steps.extend(profile.handover_steps(DEPLOYER).unwrap());
    steps
}

fn sequencer(
    target: &FakeAdminTarget,
    clock: &FakeClock,
) -> ConfigurationSequencer<FakeAdminTarget, FakeClock> {
    ConfigurationSequencer::builder()
        .target(target.clone())
        .clock(clock.clone())
        .retry(RetryPolicy::default().with_max_attempts(4).with_delay_secs(5))
        .build()
}

#[tokio::test]
async fn test_steps_run_in_order_with_settle_delay() {
    let clock = FakeClock::new();
    let target = FakeAdminTarget::new(DEPLOYER);
    let steps = fantom_steps();

    let report = sequencer(&target, &clock).run(&steps).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.applied(), steps.len());
    assert_eq!(target.applied(), steps);
    assert_eq!(clock.total_sleep_time(), Duration::from_secs(3) * steps.len() as u32);

    let values = target.values();
    assert_eq!(values.fee_percentage, 75);
    assert_eq!(values.dao, FANTOM_DAO);
    assert_eq!(values.version, "2.0");
    assert_eq!(values.block_queue, 28_800);
    assert_eq!(values.owner, FANTOM_MULTISIG);
    assert_eq!(
        values.moderators.into_iter().collect::<Vec<_>>(),
        {
            let mut expected = vec![FANTOM_MULTISIG, FANTOM_DEV_MULTISIG];
            expected.sort();
            expected
        }
    );
}

#[tokio::test]
async fn test_rerun_skips_everything() {
    let clock = FakeClock::new();
    let target = FakeAdminTarget::new(DEPLOYER);
    let steps = fantom_steps();
    sequencer(&target, &clock).run(&steps).await.unwrap();
    clock.clear_sleep_log();

    let report = sequencer(&target, &clock).run(&steps).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.skipped(), steps.len());
    assert_eq!(target.applied().len(), steps.len());
    assert_eq!(clock.sleep_count(), 0);
}

#[tokio::test]
async fn test_failure_stops_remaining_steps_and_rerun_resumes() {
    let clock = FakeClock::new();
    let target = FakeAdminTarget::new(DEPLOYER);
    target.fail_next("setDAO", ScriptedFailure::revert("DAO: zero"), 1);
    let steps = fantom_steps();

    let report = sequencer(&target, &clock).run(&steps).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.aborted_at, Some(1));
    assert_eq!(report.failed_step().unwrap().name, "setDAO");
    assert!(report.steps[2..]
        .iter()
        .all(|s| s.status == StepStatus::NotAttempted));
    assert_eq!(target.values().version, "");
    assert_eq!(target.attempts("setDAO"), 1);

    let rerun = sequencer(&target, &clock).run(&steps).await.unwrap();
    assert!(rerun.is_success());
    assert_eq!(rerun.steps[0].status, StepStatus::Skipped);
    assert_eq!(rerun.applied(), steps.len() - 1);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let clock = FakeClock::new();
    let target = FakeAdminTarget::new(DEPLOYER);
    target.fail_next("setVersion", ScriptedFailure::transient(), 2);

    let report = sequencer(&target, &clock)
        .run(&[AdminStep::SetVersion("2.0".to_string())])
        .await
        .unwrap();

    assert!(matches!(
        report.steps[0].status,
        StepStatus::Applied { attempts: 3, .. }
    ));
    // two retry delays plus the settle delay
    assert_eq!(clock.total_sleep_time(), Duration::from_secs(13));
}

#[tokio::test]
async fn test_calls_after_ownership_transfer_revert() {
    let clock = FakeClock::new();
    let target = FakeAdminTarget::new(DEPLOYER);
    let steps = [
        AdminStep::TransferOwnership(FANTOM_MULTISIG),
        AdminStep::SetFeePercentage(50),
    ];

    let report = sequencer(&target, &clock).run(&steps).await.unwrap();

    assert_eq!(report.aborted_at, Some(1));
    match &report.steps[1].status {
        StepStatus::Failed { error } => assert!(error.contains("caller is not the owner")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(target.attempts("setMinFeePercentage"), 1);
}

#[tokio::test]
async fn test_invalid_step_rejected_before_any_call() {
    let clock = FakeClock::new();
    let target = FakeAdminTarget::new(DEPLOYER);
    let steps = [
        AdminStep::SetFeePercentage(75),
        AdminStep::SetDao(Address::ZERO),
    ];

    let result = sequencer(&target, &clock).run(&steps).await;

    assert!(matches!(result, Err(OpsError::InvalidConfig(_))));
    assert_eq!(target.attempts("isApplied"), 0);
    assert!(target.applied().is_empty());
}

#[tokio::test]
async fn test_verification_failure_is_reported_not_fatal() {
    let clock = FakeClock::new();
    let target = FakeAdminTarget::new(DEPLOYER);
    let verifier = FakeVerifier::failing();
    let request = VerificationRequest {
        address: Address::repeat_byte(0x99),
        contract: "contracts/HecBridgeSplitter.sol:HecBridgeSplitter".to_string(),
        constructor_args: String::new(),
        source: "{}".to_string(),
        compiler_version: "v0.8.7+commit.e28d00a7".to_string(),
    };

    let report = sequencer(&target, &clock)
        .run_then_verify(&[AdminStep::SetFeePercentage(75)], &verifier, &request)
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(matches!(
        report.verification,
        Some(VerificationOutcome::Failed { .. })
    ));
    assert_eq!(verifier.requests(), vec![request]);
}

const REDEMPTION_VAULT: Address = Address::repeat_byte(0x7a);

fn lock_registry_init() -> LockRegistryInit {
    LockRegistryInit::with_moderator(FANTOM_MULTISIG, FANTOM_DEV_MULTISIG)
}

fn redemption_request() -> VerificationRequest {
    VerificationRequest {
        address: Address::repeat_byte(0x5e),
        contract: "contracts/HectorRedemption.sol:HectorRedemption".to_string(),
        constructor_args: String::new(),
        source: "{}".to_string(),
        compiler_version: "v0.8.7+commit.e28d00a7".to_string(),
    }
}

#[tokio::test]
async fn test_lock_registry_is_initialized_then_verified() {
    let clock = FakeClock::new();
    let target = FakeAdminTarget::new(DEPLOYER);
    let verifier = FakeVerifier::verified();
    let init = lock_registry_init();
    let steps = init.steps(&[REDEMPTION_VAULT]);

    let report = sequencer(&target, &clock)
        .run_then_verify(&steps, &verifier, &redemption_request())
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.applied(), 2);
    assert_eq!(report.verification, Some(VerificationOutcome::Verified));
    assert_eq!(verifier.requests(), vec![redemption_request()]);
    assert_eq!(target.applied(), steps);

    let values = target.values();
    assert_eq!(values.lock_registry, Some(init));
    assert!(values.moderators.contains(&FANTOM_DEV_MULTISIG));
    assert!(values.moderators.contains(&REDEMPTION_VAULT));
}

#[tokio::test]
async fn test_initialized_lock_registry_is_skipped_on_rerun() {
    let clock = FakeClock::new();
    let target = FakeAdminTarget::new(DEPLOYER);
    let steps = lock_registry_init().steps(&[REDEMPTION_VAULT]);
    sequencer(&target, &clock).run(&steps).await.unwrap();

    let report = sequencer(&target, &clock).run(&steps).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.skipped(), 2);
    assert_eq!(target.applied().len(), 2);

    let error = target.apply(&steps[0]).await.unwrap_err();
    assert!(error.to_string().contains("already initialized"));
}

#[tokio::test]
async fn test_lost_initialize_receipt_is_not_resent() {
    let clock = FakeClock::new();
    let target = FakeAdminTarget::new(DEPLOYER);
    target.lose_receipt_next("initialize", 1);
    let steps = lock_registry_init().steps(&[REDEMPTION_VAULT]);

    let report = sequencer(&target, &clock).run(&steps).await.unwrap();

    assert!(report.is_success());
    assert!(matches!(
        report.steps[0].status,
        StepStatus::Applied { attempts: 1, .. }
    ));
    assert_eq!(target.attempts("initialize"), 1);
    assert_eq!(target.applied(), steps);
}
