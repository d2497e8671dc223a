// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Tokio-based clock.

use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::traits::Clock;

/// Wall clock backed by `tokio::time`.
///
/// Retry delays, settle delays and queue expiry polls all go through this
/// clock in production. Tests use [`crate::testing::FakeClock`] instead.
///
/// # Examples
///
/// ```rust
/// use hector_ops::providers::TokioClock;
/// use hector_ops::{RetryPolicy, Submitter};
///
/// let submitter = Submitter::new(RetryPolicy::default(), TokioClock::new());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl TokioClock {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn now(&self) -> Instant {
        Instant::now()
    }
}
