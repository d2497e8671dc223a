// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Source verification on Etherscan-compatible block explorers.

use std::time::Duration;

use alloy_primitives::Address;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};
use url::form_urlencoded;
use url::Url;

use crate::error::{OpsError, Result};
use crate::traits::{Clock, Verifier};

/// Etherscan's multichain endpoint. The target chain goes in `chainid`.
pub const ETHERSCAN_V2_API: &str = "https://api.etherscan.io/v2/api";

/// Everything the explorer needs to match deployed bytecode to source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub address: Address,
    /// Fully qualified name, e.g. `contracts/HecBridgeSplitter.sol:HecBridgeSplitter`.
    pub contract: String,
    /// ABI-encoded constructor arguments as hex, without `0x`.
    #[serde(default)]
    pub constructor_args: String,
    /// Solidity standard JSON input.
    pub source: String,
    /// e.g. `v0.8.7+commit.e28d00a7`.
    pub compiler_version: String,
}

/// Terminal status reported by the explorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Verified { guid: String },
    AlreadyVerified,
}

/// Verification result as it appears in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationOutcome {
    Verified,
    AlreadyVerified,
    Failed { reason: String },
}

impl VerificationOutcome {
    pub fn is_verified(&self) -> bool {
        !matches!(self, VerificationOutcome::Failed { .. })
    }
}

impl From<VerificationStatus> for VerificationOutcome {
    fn from(status: VerificationStatus) -> Self {
        match status {
            VerificationStatus::Verified { .. } => VerificationOutcome::Verified,
            VerificationStatus::AlreadyVerified => VerificationOutcome::AlreadyVerified,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

impl ExplorerResponse {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }
}

fn is_already_verified(result: &str) -> bool {
    result.to_lowercase().contains("already verified")
}

/// Interprets one `checkverifystatus` result. `None` means still pending.
fn poll_result(guid: &str, response: &ExplorerResponse) -> Option<Result<VerificationStatus>> {
    let result = response.result.as_str();
    if is_already_verified(result) {
        return Some(Ok(VerificationStatus::AlreadyVerified));
    }
    if result.starts_with("Pass") {
        return Some(Ok(VerificationStatus::Verified {
            guid: guid.to_string(),
        }));
    }
    if result.to_lowercase().contains("pending") {
        return None;
    }
    Some(Err(OpsError::Verification {
        reason: result.to_string(),
    }))
}

/// [`Verifier`] for Etherscan and its clones (FTMScan, PolygonScan, Snowtrace).
///
/// # Examples
///
/// ```rust,no_run
/// use hector_ops::providers::TokioClock;
/// use hector_ops::EtherscanVerifier;
///
/// # fn example() -> Result<(), hector_ops::OpsError> {
/// let verifier = EtherscanVerifier::etherscan_v2(250, "API_KEY", TokioClock::new())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EtherscanVerifier<C: Clock> {
    api_url: Url,
    api_key: String,
    chain_id: u64,
    client: Client,
    clock: C,
    poll_interval: Duration,
    max_polls: u32,
}

impl<C: Clock> EtherscanVerifier<C> {
    pub fn new(api_url: &str, api_key: impl Into<String>, chain_id: u64, clock: C) -> Result<Self> {
        let api_url = Url::parse(api_url)
            .map_err(|e| OpsError::InvalidConfig(format!("invalid explorer URL {api_url}: {e}")))?;
        Ok(Self {
            api_url,
            api_key: api_key.into(),
            chain_id,
            client: Client::new(),
            clock,
            poll_interval: Duration::from_secs(10),
            max_polls: 30,
        })
    }

    pub fn etherscan_v2(chain_id: u64, api_key: impl Into<String>, clock: C) -> Result<Self> {
        Self::new(ETHERSCAN_V2_API, api_key, chain_id, clock)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_polls(mut self, polls: u32) -> Self {
        self.max_polls = polls;
        self
    }

    fn endpoint(&self, pairs: &[(&str, &str)]) -> Url {
        let mut url = self.api_url.clone();
        let chain_id = self.chain_id.to_string();
        url.query_pairs_mut()
            .append_pair("chainid", &chain_id)
            .extend_pairs(pairs);
        url
    }

    async fn submit(&self, request: &VerificationRequest) -> Result<ExplorerResponse> {
        let address = request.address.to_string();
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("apikey", &self.api_key)
            .append_pair("module", "contract")
            .append_pair("action", "verifysourcecode")
            .append_pair("contractaddress", &address)
            .append_pair("sourceCode", &request.source)
            .append_pair("codeformat", "solidity-standard-json-input")
            .append_pair("contractname", &request.contract)
            .append_pair("compilerversion", &request.compiler_version)
            // Etherscan's historical spelling.
            .append_pair("constructorArguements", &request.constructor_args)
            .finish();

        let response = self
            .client
            .post(self.endpoint(&[]))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;
        response.error_for_status_ref()?;
        Ok(response.json::<ExplorerResponse>().await?)
    }

    async fn check_status(&self, guid: &str) -> Result<ExplorerResponse> {
        let url = self.endpoint(&[
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "checkverifystatus"),
            ("guid", guid),
        ]);
        let response = self.client.get(url).send().await?;
        response.error_for_status_ref()?;
        Ok(response.json::<ExplorerResponse>().await?)
    }
}

#[async_trait]
impl<C: Clock> Verifier for EtherscanVerifier<C> {
    #[instrument(skip(self, request), fields(address = %request.address, chain_id = self.chain_id))]
    async fn verify(&self, request: &VerificationRequest) -> Result<VerificationStatus> {
        let submitted = self.submit(request).await?;
        trace!(explorer_message = %submitted.message, result = %submitted.result, event = "verification_submitted");

        if !submitted.is_ok() {
            if is_already_verified(&submitted.result) {
                return Ok(VerificationStatus::AlreadyVerified);
            }
            return Err(OpsError::Verification {
                reason: submitted.result,
            });
        }

        let guid = submitted.result;
        for poll in 0..self.max_polls {
            self.clock.sleep(self.poll_interval).await;
            let response = self.check_status(&guid).await?;
            match poll_result(&guid, &response) {
                Some(outcome) => return outcome,
                None => debug!(guid = %guid, poll = poll, event = "verification_pending"),
            }
        }

        Err(OpsError::Verification {
            reason: format!("still pending after {} polls (guid {guid})", self.max_polls),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeClock;
    use rstest::rstest;

    fn response(status: &str, result: &str) -> ExplorerResponse {
        ExplorerResponse {
            status: status.to_string(),
            message: String::new(),
            result: result.to_string(),
        }
    }

    #[rstest]
    #[case("Pass - Verified", Some(true))]
    #[case("Already Verified", Some(true))]
    #[case("Pending in queue", None)]
    #[case("Fail - Unable to verify", Some(false))]
    fn test_poll_result(#[case] result: &str, #[case] expected: Option<bool>) {
        let outcome = poll_result("guid", &response("1", result));
        assert_eq!(outcome.map(|r| r.is_ok()), expected);
    }

    #[test]
    fn test_explorer_response_parses() {
        let parsed: ExplorerResponse = serde_json::from_str(
            r#"{"status":"0","message":"NOTOK","result":"Contract source code already verified"}"#,
        )
        .unwrap();
        assert!(!parsed.is_ok());
        assert!(is_already_verified(&parsed.result));
    }

    #[test]
    fn test_endpoint_carries_chain_id() {
        let verifier = EtherscanVerifier::etherscan_v2(137, "key", FakeClock::new()).unwrap();
        let url = verifier.endpoint(&[("guid", "abc")]);
        assert_eq!(
            url.as_str(),
            "https://api.etherscan.io/v2/api?chainid=137&guid=abc"
        );
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let result = EtherscanVerifier::new("not a url", "key", 1, FakeClock::new());
        assert!(matches!(result, Err(OpsError::InvalidConfig(_))));
    }

    #[test]
    fn test_outcome_from_status() {
        assert_eq!(
            VerificationOutcome::from(VerificationStatus::AlreadyVerified),
            VerificationOutcome::AlreadyVerified
        );
        assert!(!VerificationOutcome::Failed {
            reason: "x".into()
        }
        .is_verified());
    }
}
