// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
use alloy_primitives::{Address, TxHash};
use thiserror::Error;

use crate::timelock::ManagingCategory;

/// Revert reason emitted by the timelock when `toggle` is called too early.
pub const QUEUE_NOT_EXPIRED: &str = "QUEUE_NOT_EXPIRED";

/// How the submitter and the drivers treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// RPC timeouts, rate limits, nonce races. Retried with a fixed delay.
    Transient,
    /// The contract rejected the call (revert, timelock not expired, duplicate
    /// entity). Never retried blindly.
    Precondition,
    /// Misconfiguration or an unrecoverable account state. Aborts the sequence.
    Fatal,
}

#[derive(Error, Debug)]
pub enum OpsError {
    #[error("Chain not supported: {chain}")]
    ChainNotSupported { chain: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Contract call reverted: {reason}")]
    Reverted { reason: String },

    #[error("Transaction rejected: {reason}")]
    Rejected { reason: String },

    #[error("Queue not expired for {address} ({category}): ready at block {ready_at}, current block {current}")]
    QueueNotExpired {
        category: ManagingCategory,
        address: Address,
        ready_at: u64,
        current: u64,
    },

    #[error("{address} is not queued for {category}")]
    NotQueued {
        category: ManagingCategory,
        address: Address,
    },

    #[error("{address} is already active for {category}")]
    AlreadyActive {
        category: ManagingCategory,
        address: Address,
    },

    #[error("Toggle for {address} ({category}) was mined but the entity is not active")]
    NotActivated {
        category: ManagingCategory,
        address: Address,
    },

    /// The transaction was broadcast but no receipt arrived in time. It may
    /// still be mined, so it must not be resent before the chain is re-read.
    #[error("No receipt for {method} transaction {tx_hash}: {reason}")]
    ReceiptTimeout {
        method: String,
        tx_hash: TxHash,
        reason: String,
    },

    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("Source verification failed: {reason}")]
    Verification { reason: String },

    #[error("RPC error: {0}")]
    Rpc(#[from] alloy_json_rpc::RpcError<alloy_transport::TransportErrorKind>),

    #[error("ABI encoding/decoding error: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Hex conversion error: {0}")]
    Hex(#[from] alloy_primitives::hex::FromHexError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OpsError>;

impl OpsError {
    /// Classifies the error for retry decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OpsError::Network(_) | OpsError::Provider(_) => ErrorKind::Transient,
            OpsError::Rpc(e) => classify_message(&e.to_string()).kind(),
            OpsError::Reverted { .. }
            | OpsError::QueueNotExpired { .. }
            | OpsError::NotQueued { .. }
            | OpsError::AlreadyActive { .. }
            | OpsError::NotActivated { .. }
            | OpsError::ReceiptTimeout { .. }
            | OpsError::Verification { .. } => ErrorKind::Precondition,
            OpsError::Rejected { .. }
            | OpsError::RetriesExhausted { .. }
            | OpsError::ChainNotSupported { .. }
            | OpsError::InvalidConfig(_)
            | OpsError::InvalidAddress { .. }
            | OpsError::Abi(_)
            | OpsError::Json(_)
            | OpsError::Hex(_)
            | OpsError::Io(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// True when the timelock refused a toggle because the delay has not elapsed.
    pub fn is_queue_not_expired(&self) -> bool {
        match self {
            OpsError::QueueNotExpired { .. } => true,
            OpsError::Reverted { reason } => reason.contains(QUEUE_NOT_EXPIRED),
            _ => false,
        }
    }
}

/// Maps the text of an RPC or contract error onto the error taxonomy.
///
/// Node implementations disagree on error codes, so the message is the only
/// portable signal. Unknown messages are treated as transient.
pub fn classify_message(message: &str) -> OpsError {
    let lower = message.to_ascii_lowercase();

    if let Some(reason) = revert_reason(message) {
        return OpsError::Reverted { reason };
    }

    if lower.contains("insufficient funds")
        || lower.contains("invalid signature")
        || lower.contains("invalid sender")
        || lower.contains("exceeds block gas limit")
    {
        return OpsError::Rejected {
            reason: message.to_string(),
        };
    }

    OpsError::Provider(message.to_string())
}

fn revert_reason(message: &str) -> Option<String> {
    // ASCII lowering keeps byte offsets aligned with `message`.
    let lower = message.to_ascii_lowercase();
    let marker = "execution reverted";
    let start = lower.find(marker)?;
    let tail = message[start + marker.len()..]
        .trim_start_matches([':', ' '])
        .trim();
    if tail.is_empty() {
        Some("execution reverted".to_string())
    } else {
        Some(tail.to_string())
    }
}

impl From<alloy_contract::Error> for OpsError {
    fn from(error: alloy_contract::Error) -> Self {
        classify_message(&error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("server returned an error response: error code 3: execution reverted: QUEUE_NOT_EXPIRED", ErrorKind::Precondition)]
    #[case("execution reverted", ErrorKind::Precondition)]
    #[case("insufficient funds for gas * price + value", ErrorKind::Fatal)]
    #[case("error sending request: connection reset", ErrorKind::Transient)]
    #[case("nonce too low", ErrorKind::Transient)]
    #[case("429 Too Many Requests", ErrorKind::Transient)]
    fn test_classify_message(#[case] message: &str, #[case] expected: ErrorKind) {
        assert_eq!(classify_message(message).kind(), expected);
    }

    #[test]
    fn test_revert_reason_extracted() {
        let error = classify_message("error code 3: execution reverted: QUEUE_NOT_EXPIRED");
        match &error {
            OpsError::Reverted { reason } => assert_eq!(reason, "QUEUE_NOT_EXPIRED"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(error.is_queue_not_expired());
    }

    #[rstest]
    #[case("İ execution reverted: NOT_QUEUED", "NOT_QUEUED")]
    #[case("ошибка: Execution Reverted", "execution reverted")]
    #[case("节点 execution reverted: Ownable: caller is not the owner", "Ownable: caller is not the owner")]
    fn test_revert_reason_after_non_ascii_text(#[case] message: &str, #[case] expected: &str) {
        match classify_message(message) {
            OpsError::Reverted { reason } => assert_eq!(reason, expected),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_receipt_is_not_retried_blindly() {
        let error = OpsError::ReceiptTimeout {
            method: "toggleMany".to_string(),
            tx_hash: TxHash::ZERO,
            reason: "timed out".to_string(),
        };
        assert_eq!(error.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_config_errors_are_fatal() {
        assert_eq!(
            OpsError::InvalidConfig("missing DAO".into()).kind(),
            ErrorKind::Fatal
        );
    }
}
