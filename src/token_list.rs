// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Candidate discovery for the bridge asset allow-list.
//!
//! Token addresses come from public aggregator APIs (LI.FI and Squid). Their
//! lists overlap, mix checksummed and lowercase spellings, and include a
//! native-token sentinel, so raw strings go through
//! [`normalize_candidates`] before they reach the timelock driver.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use alloy_primitives::{address, Address};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

use crate::error::{OpsError, Result};
use crate::traits::TokenListSource;

/// Placeholder address aggregators use for the chain's native coin.
pub const NATIVE_TOKEN_SENTINEL: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// A raw candidate that did not survive normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedCandidate {
    pub input: String,
    pub reason: String,
}

/// Validated, deduplicated candidate addresses in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateList {
    pub addresses: Vec<Address>,
    pub rejected: Vec<RejectedCandidate>,
}

impl CandidateList {
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

fn parse_candidate(raw: &str) -> Result<Address> {
    let trimmed = raw.trim();
    let invalid = |reason: &str| OpsError::InvalidAddress {
        input: raw.to_string(),
        reason: reason.to_string(),
    };

    let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) else {
        return Err(invalid("missing 0x prefix"));
    };
    if hex.len() != 40 {
        return Err(invalid("expected 20 bytes"));
    }

    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let address = if has_upper && has_lower {
        Address::parse_checksummed(trimmed, None).map_err(|_| invalid("bad checksum"))?
    } else {
        Address::from_str(trimmed).map_err(|e| invalid(&e.to_string()))?
    };

    if address.is_zero() {
        return Err(invalid("zero address"));
    }
    if address == NATIVE_TOKEN_SENTINEL {
        return Err(invalid("native token sentinel"));
    }
    Ok(address)
}

/// Validates and deduplicates raw address strings.
///
/// Mixed-case input must carry a valid EIP-55 checksum; all-lowercase and
/// all-uppercase input is accepted as is. Duplicates are detected on the
/// parsed bytes, so spellings that differ only in case collapse to the first
/// one seen.
pub fn normalize_candidates<S: AsRef<str>>(raw: &[S]) -> CandidateList {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut list = CandidateList::default();

    for input in raw {
        let input = input.as_ref();
        match parse_candidate(input) {
            Ok(address) => {
                if seen.insert(address) {
                    list.addresses.push(address);
                }
            }
            Err(OpsError::InvalidAddress { input, reason }) => {
                list.rejected.push(RejectedCandidate { input, reason });
            }
            Err(other) => list.rejected.push(RejectedCandidate {
                input: input.to_string(),
                reason: other.to_string(),
            }),
        }
    }
    list
}

/// Fetches every source for `chain_id` and normalizes the merged list.
///
/// Sources are merged in the given order. A failing source is logged and
/// skipped; only when every source fails is the last error returned.
pub async fn collect_candidates(
    sources: &[Box<dyn TokenListSource>],
    chain_id: u64,
) -> Result<CandidateList> {
    let mut raw = Vec::new();
    let mut last_error = None;
    let mut succeeded = 0;

    for source in sources {
        match source.fetch(chain_id).await {
            Ok(tokens) => {
                debug!(
                    source = source.name(),
                    chain_id = chain_id,
                    count = tokens.len(),
                    event = "token_list_fetched"
                );
                succeeded += 1;
                raw.extend(tokens);
            }
            Err(e) => {
                warn!(
                    source = source.name(),
                    chain_id = chain_id,
                    error = %e,
                    event = "token_list_failed"
                );
                last_error = Some(e);
            }
        }
    }

    if succeeded == 0 {
        if let Some(error) = last_error {
            return Err(error);
        }
    }

    let list = normalize_candidates(&raw);
    info!(
        chain_id = chain_id,
        fetched = raw.len(),
        candidates = list.len(),
        rejected = list.rejected.len(),
        event = "candidates_collected"
    );
    Ok(list)
}

#[derive(Debug, Deserialize)]
struct TokenEntry {
    address: String,
}

#[derive(Debug, Deserialize)]
struct LifiTokensResponse {
    #[serde(default)]
    tokens: HashMap<String, Vec<TokenEntry>>,
}

#[derive(Debug, Deserialize)]
struct SquidToken {
    #[serde(rename = "chainId")]
    chain_id: serde_json::Value,
    address: String,
}

#[derive(Debug, Deserialize)]
struct SquidTokensResponse {
    #[serde(default)]
    tokens: Vec<SquidToken>,
}

impl SquidToken {
    /// Squid reports EVM chain ids as numbers or as decimal strings.
    fn is_on(&self, chain_id: u64) -> bool {
        match &self.chain_id {
            serde_json::Value::Number(n) => n.as_u64() == Some(chain_id),
            serde_json::Value::String(s) => s.parse::<u64>().ok() == Some(chain_id),
            _ => false,
        }
    }
}

async fn get_json<T: for<'de> Deserialize<'de>>(client: &Client, url: Url) -> Result<T> {
    trace!(url = %url, event = "token_list_request");
    let response = client.get(url).send().await?;

    if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(OpsError::Provider("token list API rate limit exceeded".to_string()));
    }
    response.error_for_status_ref()?;
    Ok(response.json::<T>().await?)
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    Url::parse(base_url)
        .map_err(|e| OpsError::InvalidConfig(format!("invalid token list URL {base_url}: {e}")))
}

/// LI.FI token list, `GET /v1/tokens?chains=<id>`.
#[derive(Debug, Clone)]
pub struct LifiTokenList {
    base_url: Url,
    client: Client,
}

impl LifiTokenList {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            client: Client::new(),
        })
    }

    pub fn production() -> Result<Self> {
        Self::new("https://li.quest/v1/tokens")
    }
}

#[async_trait]
impl TokenListSource for LifiTokenList {
    fn name(&self) -> &str {
        "lifi"
    }

    #[instrument(skip(self))]
    async fn fetch(&self, chain_id: u64) -> Result<Vec<String>> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("chains", &chain_id.to_string());
        let mut body: LifiTokensResponse = get_json(&self.client, url).await?;
        Ok(body
            .tokens
            .remove(&chain_id.to_string())
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.address)
            .collect())
    }
}

/// Squid router token list, `GET /v1/tokens`, filtered client-side.
#[derive(Debug, Clone)]
pub struct SquidTokenList {
    base_url: Url,
    client: Client,
}

impl SquidTokenList {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            client: Client::new(),
        })
    }

    pub fn production() -> Result<Self> {
        Self::new("https://api.0xsquid.com/v1/tokens")
    }
}

#[async_trait]
impl TokenListSource for SquidTokenList {
    fn name(&self) -> &str {
        "squid"
    }

    #[instrument(skip(self))]
    async fn fetch(&self, chain_id: u64) -> Result<Vec<String>> {
        let body: SquidTokensResponse = get_json(&self.client, self.base_url.clone()).await?;
        Ok(body
            .tokens
            .into_iter()
            .filter(|t| t.is_on(chain_id))
            .map(|t| t.address)
            .collect())
    }
}
