// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Bounded retry loop for state-changing calls.
//!
//! Every mutating call (queue, toggle, register, admin step) goes through a
//! [`Submitter`]. Transient failures are retried after a fixed delay;
//! contract rejections and configuration problems stop the loop on the first
//! attempt, and the attempt budget caps everything else.
//!
//! A transaction whose receipt never arrived may still be mined, and
//! resending a toggle would flip the entity back. [`Submitter::submit_tx`]
//! re-reads the chain before deciding to resend.

use std::future::Future;
use std::time::Duration;

use alloy_primitives::TxHash;
use tracing::{debug, error, info, warn, Instrument};

use crate::error::{ErrorKind, OpsError, Result};
use crate::spans;
use crate::traits::Clock;

/// Configuration for the retry loop.
///
/// # Examples
///
/// ```rust
/// use hector_ops::RetryPolicy;
///
/// // Defaults: 10 attempts, 5 seconds apart
/// let policy = RetryPolicy::default();
///
/// let policy = RetryPolicy::default()
///     .with_max_attempts(3)
///     .with_delay_secs(1);
/// assert_eq!(policy.total_delay_secs(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Seconds to wait after a transient failure.
    pub delay_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            delay_secs: 5,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_delay_secs(mut self, secs: u64) -> Self {
        self.delay_secs = secs;
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }

    /// Worst-case time spent sleeping between attempts.
    pub fn total_delay_secs(&self) -> u64 {
        u64::from(self.max_attempts.saturating_sub(1)) * self.delay_secs
    }
}

/// Result of a submitted operation.
#[derive(Debug)]
pub enum SubmissionOutcome<T> {
    /// The operation completed.
    Confirmed { value: T, attempts: u32 },
    /// The operation failed with a non-retryable error.
    Rejected { error: OpsError, attempts: u32 },
    /// Every attempt failed transiently.
    Exhausted { error: OpsError, attempts: u32 },
}

impl<T> SubmissionOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            SubmissionOutcome::Confirmed { attempts, .. }
            | SubmissionOutcome::Rejected { attempts, .. }
            | SubmissionOutcome::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, SubmissionOutcome::Confirmed { .. })
    }

    /// Collapses the outcome into a `Result`.
    ///
    /// Rejections surface their original error so callers can match on it.
    /// Exhaustion becomes [`OpsError::RetriesExhausted`].
    pub fn into_result(self) -> Result<T> {
        match self {
            SubmissionOutcome::Confirmed { value, .. } => Ok(value),
            SubmissionOutcome::Rejected { error, .. } => Err(error),
            SubmissionOutcome::Exhausted { error, attempts } => Err(OpsError::RetriesExhausted {
                attempts,
                last_error: error.to_string(),
            }),
        }
    }
}

/// Runs operations under a [`RetryPolicy`], sleeping on the given clock.
#[derive(Debug, Clone)]
pub struct Submitter<C: Clock> {
    policy: RetryPolicy,
    clock: C,
}

impl<C: Clock> Submitter<C> {
    pub fn new(policy: RetryPolicy, clock: C) -> Self {
        Self { policy, clock }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Invokes `operation` until it succeeds, fails non-transiently, or the
    /// attempt budget runs out.
    ///
    /// `label` names the call in logs and spans (e.g. `"queueMany"`).
    pub async fn submit<T, F, Fut>(&self, label: &str, mut operation: F) -> SubmissionOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let span = spans::submit(label, max_attempts, self.policy.delay_secs);
        self.run(label, max_attempts, &mut operation)
            .instrument(span)
            .await
    }

    /// Submits a transaction whose effect can be read back from the chain.
    ///
    /// On [`OpsError::ReceiptTimeout`], `landed` checks whether the effect is
    /// present. If so the attempt is confirmed with the broadcast hash;
    /// otherwise it is retried like a transient failure. When the check
    /// itself fails the timeout is returned unchanged and nothing is resent.
    pub async fn submit_tx<F, Fut, L, LFut>(
        &self,
        label: &str,
        send: F,
        landed: L,
    ) -> SubmissionOutcome<TxHash>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<TxHash>>,
        L: Fn() -> LFut,
        LFut: Future<Output = Result<bool>>,
    {
        let send = &send;
        let landed = &landed;
        self.submit(label, move || async move {
            match send().await {
                Err(OpsError::ReceiptTimeout {
                    method,
                    tx_hash,
                    reason,
                }) => match landed().await {
                    Ok(true) => {
                        info!(
                            label = label,
                            tx_hash = %tx_hash,
                            event = "receipt_timeout_effect_present"
                        );
                        Ok(tx_hash)
                    }
                    Ok(false) => Err(OpsError::Provider(format!(
                        "{method} transaction {tx_hash} not mined: {reason}"
                    ))),
                    Err(check) => {
                        warn!(
                            label = label,
                            tx_hash = %tx_hash,
                            error = %check,
                            event = "receipt_timeout_unresolved"
                        );
                        Err(OpsError::ReceiptTimeout {
                            method,
                            tx_hash,
                            reason,
                        })
                    }
                },
                other => other,
            }
        })
        .await
    }

    async fn run<T, F, Fut>(
        &self,
        label: &str,
        max_attempts: u32,
        operation: &mut F,
    ) -> SubmissionOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    debug!(
                        label = label,
                        attempt = attempt,
                        event = "submission_confirmed"
                    );
                    return SubmissionOutcome::Confirmed {
                        value,
                        attempts: attempt,
                    };
                }
                Err(error) => match error.kind() {
                    ErrorKind::Transient if attempt < max_attempts => {
                        warn!(
                            label = label,
                            attempt = attempt,
                            max_attempts = max_attempts,
                            error = %error,
                            event = "submission_retrying"
                        );
                        self.clock.sleep(self.policy.delay()).await;
                    }
                    ErrorKind::Transient => {
                        spans::record_error_with_context(
                            "RetriesExhausted",
                            &error.to_string(),
                            Some(&format!("{label} failed {attempt} times")),
                        );
                        error!(
                            label = label,
                            attempts = attempt,
                            error = %error,
                            event = "submission_exhausted"
                        );
                        return SubmissionOutcome::Exhausted {
                            error,
                            attempts: attempt,
                        };
                    }
                    kind => {
                        spans::record_error(&error);
                        error!(
                            label = label,
                            attempt = attempt,
                            kind = ?kind,
                            error = %error,
                            event = "submission_rejected"
                        );
                        return SubmissionOutcome::Rejected {
                            error,
                            attempts: attempt,
                        };
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn submitter(clock: FakeClock) -> Submitter<FakeClock> {
        Submitter::new(
            RetryPolicy::default()
                .with_max_attempts(4)
                .with_delay_secs(5),
            clock,
        )
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_until_success() {
        let clock = FakeClock::new();
        let calls = &AtomicU32::new(0);

        let outcome = submitter(clock.clone())
            .submit("queue", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(OpsError::Provider("connection reset".into()))
                } else {
                    Ok(7u32)
                }
            })
            .await;

        assert!(outcome.is_confirmed());
        assert_eq!(outcome.attempts(), 3);
        assert_eq!(outcome.into_result().unwrap(), 7);
        assert_eq!(clock.sleep_count(), 2);
        assert_eq!(clock.total_sleep_time(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_revert_is_not_retried() {
        let clock = FakeClock::new();
        let calls = &AtomicU32::new(0);

        let outcome: SubmissionOutcome<()> = submitter(clock.clone())
            .submit("toggle", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OpsError::Reverted {
                    reason: "QUEUE_NOT_EXPIRED".into(),
                })
            })
            .await;

        assert!(matches!(outcome, SubmissionOutcome::Rejected { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(clock.sleep_count(), 0);
        assert!(outcome.into_result().unwrap_err().is_queue_not_expired());
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let clock = FakeClock::new();
        let calls = &AtomicU32::new(0);

        let outcome: SubmissionOutcome<()> = submitter(clock.clone())
            .submit("queueMany", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OpsError::Provider("timeout".into()))
            })
            .await;

        assert!(matches!(outcome, SubmissionOutcome::Exhausted { attempts: 4, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(clock.sleep_count(), 3);
        assert!(matches!(
            outcome.into_result(),
            Err(OpsError::RetriesExhausted { attempts: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_fatal_errors_stop_immediately() {
        let clock = FakeClock::new();
        let outcome: SubmissionOutcome<()> = submitter(clock.clone())
            .submit("transferOwnership", || async {
                Err(OpsError::Rejected {
                    reason: "insufficient funds".into(),
                })
            })
            .await;

        assert!(matches!(outcome, SubmissionOutcome::Rejected { attempts: 1, .. }));
        assert_eq!(clock.sleep_count(), 0);
    }

    fn lost_receipt(tx_hash: TxHash) -> OpsError {
        OpsError::ReceiptTimeout {
            method: "toggleMany".into(),
            tx_hash,
            reason: "timed out".into(),
        }
    }

    #[tokio::test]
    async fn test_lost_receipt_with_effect_present_is_not_resent() {
        let clock = FakeClock::new();
        let sends = &AtomicU32::new(0);
        let tx_hash = TxHash::repeat_byte(0x0a);

        let outcome = submitter(clock.clone())
            .submit_tx(
                "toggleMany",
                move || async move {
                    sends.fetch_add(1, Ordering::SeqCst);
                    Err(lost_receipt(tx_hash))
                },
                || async { Ok(true) },
            )
            .await;

        assert!(matches!(outcome, SubmissionOutcome::Confirmed { attempts: 1, .. }));
        assert_eq!(outcome.into_result().unwrap(), tx_hash);
        assert_eq!(sends.load(Ordering::SeqCst), 1);
        assert_eq!(clock.sleep_count(), 0);
    }

    #[tokio::test]
    async fn test_lost_receipt_without_effect_is_resent() {
        let clock = FakeClock::new();
        let sends = &AtomicU32::new(0);

        let outcome = submitter(clock.clone())
            .submit_tx(
                "queue",
                move || async move {
                    if sends.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(lost_receipt(TxHash::ZERO))
                    } else {
                        Ok(TxHash::repeat_byte(0x0b))
                    }
                },
                || async { Ok(false) },
            )
            .await;

        assert_eq!(outcome.attempts(), 2);
        assert_eq!(outcome.into_result().unwrap(), TxHash::repeat_byte(0x0b));
        assert_eq!(clock.sleep_count(), 1);
    }

    #[tokio::test]
    async fn test_lost_receipt_with_failed_read_stops() {
        let clock = FakeClock::new();
        let sends = &AtomicU32::new(0);

        let outcome = submitter(clock.clone())
            .submit_tx(
                "toggle",
                move || async move {
                    sends.fetch_add(1, Ordering::SeqCst);
                    Err(lost_receipt(TxHash::ZERO))
                },
                || async { Err(OpsError::Provider("connection reset".into())) },
            )
            .await;

        assert!(matches!(outcome, SubmissionOutcome::Rejected { attempts: 1, .. }));
        assert_eq!(sends.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_never_allows_zero_attempts() {
        assert_eq!(RetryPolicy::default().with_max_attempts(0).max_attempts, 1);
    }
}
