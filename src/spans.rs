// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! OpenTelemetry span helpers for operator workflows
//!
//! Static span names with structured attributes, kept apart from the driver
//! logic. The drivers use these internally; they are public so callers
//! embedding the drivers in a larger service can attach their own spans with
//! matching names.
//!
//! # Example
//!
//! ```rust,no_run
//! use hector_ops::spans;
//! use hector_ops::ManagedEntity;
//! use alloy_primitives::Address;
//!
//! let entity = ManagedEntity::bridge(Address::ZERO);
//! let span = spans::timelock_transition("queue", &entity);
//! let _guard = span.enter();
//! ```

use alloy_chains::NamedChain;
use alloy_primitives::Address;
use tracing::Span;

use crate::timelock::{ManagedEntity, ManagingCategory};

/// Span around one retried submission.
///
/// Parent: the driver operation issuing the call
/// Children: provider RPC calls
#[inline]
pub fn submit(label: &str, max_attempts: u32, delay_secs: u64) -> Span {
    tracing::debug_span!(
        "hector_ops.submit",
        label = label,
        max_attempts = max_attempts,
        delay_secs = delay_secs,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        error.source = tracing::field::Empty,
        error.context = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Span for a single queue or toggle transition.
#[inline]
pub fn timelock_transition(operation: &'static str, entity: &ManagedEntity) -> Span {
    tracing::info_span!(
        "hector_ops.timelock_transition",
        operation = operation,
        category = %entity.category,
        address = %entity.address,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Span for activating a list of entities in one category.
#[inline]
pub fn activate_many(category: ManagingCategory, count: usize, toggle_limit: usize) -> Span {
    tracing::info_span!(
        "hector_ops.activate_many",
        category = %category,
        count = count,
        toggle_limit = toggle_limit,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Span for one batch of a chunked whitelist or migration.
#[inline]
pub fn batch(kind: &'static str, index: usize, total: usize, size: usize) -> Span {
    tracing::info_span!(
        "hector_ops.batch",
        kind = kind,
        index = index,
        total = total,
        size = size,
    )
}

/// Span for one post-deployment administrative step.
#[inline]
pub fn admin_step(index: usize, step: &str, target: &Address) -> Span {
    tracing::info_span!(
        "hector_ops.admin_step",
        index = index,
        step = step,
        target = %target,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Span for explorer verification of one contract.
#[inline]
pub fn verify(address: &Address, contract: &str) -> Span {
    tracing::info_span!(
        "hector_ops.verify",
        address = %address,
        contract = contract,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Top-level span for one chain's plan.
#[inline]
pub fn chain_task(chain: &NamedChain, stages: usize) -> Span {
    tracing::info_span!(
        "hector_ops.chain_task",
        chain = %chain,
        stages = stages,
        error.type = tracing::field::Empty,
        error.message = tracing::field::Empty,
        otel.status_code = "OK",
    )
}

/// Record error attributes on the current span.
///
/// # Example
///
/// ```rust,no_run
/// use hector_ops::{spans, OpsError};
///
/// # fn example() {
/// let span = tracing::info_span!("hector_ops.operation");
/// let _guard = span.enter();
///
/// if let Err(e) = some_operation() {
///     spans::record_error(&e);
/// }
/// # }
/// # fn some_operation() -> Result<(), OpsError> { Ok(()) }
/// ```
pub fn record_error<E: std::error::Error>(error: &E) {
    let current_span = tracing::Span::current();
    current_span.record(
        "error.type",
        error.to_string().split(':').next().unwrap_or("Unknown"),
    );
    current_span.record("error.message", error.to_string());
    current_span.record("otel.status_code", "ERROR");

    if let Some(source) = error.source() {
        current_span.record("error.source", source.to_string());
    }
}

/// Record error attributes with custom context on the current span.
pub fn record_error_with_context(
    error_type: &str,
    error_message: &str,
    additional_context: Option<&str>,
) {
    let current_span = tracing::Span::current();
    current_span.record("error.type", error_type);
    current_span.record("error.message", error_message);
    current_span.record("otel.status_code", "ERROR");

    if let Some(context) = additional_context {
        current_span.record("error.context", context);
    }
}
