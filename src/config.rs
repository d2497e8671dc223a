// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Operator configuration.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. the built-in [`ChainProfile`] for each chain
//! 2. a JSON file keyed by chain name
//! 3. environment variables (`.env` is loaded by the binary)
//!
//! ```json
//! {
//!   "settle_delay_secs": 3,
//!   "retry": { "max_attempts": 10, "delay_secs": 5 },
//!   "chains": {
//!     "fantom": {
//!       "rpc_url": "https://rpc.ftm.tools",
//!       "splitter": "0x0000000000000000000000000000000000000001"
//!     }
//!   }
//! }
//! ```
//!
//! Per-chain environment overrides use the upper-cased chain name as prefix:
//! `FANTOM_RPC_URL`, `FANTOM_TOKEN_LIMIT_QUEUE`, `FANTOM_TOKEN_LIMIT_TOGGLE`.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use alloy_chains::NamedChain;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::chain::{env_prefix, ChainProfile, TokenLimits};
use crate::error::{OpsError, Result};
use crate::registry::MigrationOptions;
use crate::retry::RetryPolicy;
use crate::sequencer::{AdminStep, LockRegistryInit};
use crate::timelock::TimelockOptions;
use crate::verify::VerificationRequest;

/// Hex private key of the operator account.
pub const PRIVATE_KEY_ENV: &str = "OPERATOR_PRIVATE_KEY";

/// Block explorer API key for source verification.
pub const EXPLORER_API_KEY_ENV: &str = "EXPLORER_API_KEY";

/// Reads a variable from the process environment.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// File-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    /// Pause after each administrative call.
    pub settle_delay_secs: u64,
    pub retry: RetryPolicy,
    pub timelock: TimelockOptions,
    pub migration: MigrationOptions,
    pub explorer_api_key: Option<String>,
    pub chains: BTreeMap<String, ChainOverrides>,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            settle_delay_secs: 3,
            retry: RetryPolicy::default(),
            timelock: TimelockOptions::default(),
            migration: MigrationOptions::default(),
            explorer_api_key: None,
            chains: BTreeMap::new(),
        }
    }
}

/// Per-chain overrides. Unset fields keep the built-in value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainOverrides {
    pub rpc_url: Option<String>,
    /// Bridge splitter proxy.
    pub splitter: Option<Address>,
    pub proxy_admin: Option<Address>,
    /// Wallet registration contract the migration writes to.
    pub registration: Option<Address>,
    pub token_list_chain_id: Option<u64>,
    pub fee_percentage: Option<u16>,
    pub dao: Option<Address>,
    pub version: Option<String>,
    pub bridges: Option<Vec<Address>>,
    pub moderators: Option<Vec<Address>>,
    pub owner: Option<Address>,
    pub block_queue: Option<u64>,
    pub token_limits: Option<TokenLimits>,
    pub verification: Option<VerificationRequest>,
    pub lock_registry: Option<LockRegistrySettings>,
}

/// Post-deployment settings of a chain's `LockAddressRegistry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LockRegistrySettings {
    pub address: Address,
    pub init: LockRegistryInit,
    /// Granted `setModerator(true)` after `initialize`, e.g. the redemption
    /// NFT vault.
    #[serde(default)]
    pub moderators: Vec<Address>,
    /// Verified once the registry is configured, e.g. `HectorRedemption`.
    #[serde(default)]
    pub verification: Option<VerificationRequest>,
}

impl LockRegistrySettings {
    pub fn steps(&self) -> Vec<AdminStep> {
        self.init.steps(&self.moderators)
    }
}

/// Fully resolved settings for one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSettings {
    pub profile: ChainProfile,
    pub rpc_url: Url,
    pub splitter: Option<Address>,
    pub proxy_admin: Option<Address>,
    pub registration: Option<Address>,
    pub verification: Option<VerificationRequest>,
    pub lock_registry: Option<LockRegistrySettings>,
}

impl ChainSettings {
    pub fn chain(&self) -> NamedChain {
        self.profile.chain
    }

    pub fn require_splitter(&self) -> Result<Address> {
        require(self.splitter, "splitter", self.profile.chain)
    }

    pub fn require_proxy_admin(&self) -> Result<Address> {
        require(self.proxy_admin, "proxy_admin", self.profile.chain)
    }

    pub fn require_registration(&self) -> Result<Address> {
        require(self.registration, "registration", self.profile.chain)
    }

    pub fn require_lock_registry(&self) -> Result<&LockRegistrySettings> {
        let chain = self.profile.chain;
        let settings = self.lock_registry.as_ref().ok_or_else(|| {
            OpsError::InvalidConfig(format!("missing lock_registry settings for {chain}"))
        })?;
        require(Some(settings.address), "lock_registry.address", chain)?;
        Ok(settings)
    }
}

fn require(value: Option<Address>, field: &str, chain: NamedChain) -> Result<Address> {
    match value {
        Some(address) if !address.is_zero() => Ok(address),
        _ => Err(OpsError::InvalidConfig(format!(
            "missing {field} address for {chain}"
        ))),
    }
}

/// Parses a chain name as used in config keys and on the command line.
pub fn parse_chain(name: &str) -> Result<NamedChain> {
    NamedChain::from_str(&name.trim().to_lowercase()).map_err(|_| OpsError::ChainNotSupported {
        chain: name.to_string(),
    })
}

fn env_number<T: FromStr>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match env(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| OpsError::InvalidConfig(format!("{key} must be a number, got {raw:?}"))),
    }
}

impl OpsConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        for name in config.chains.keys() {
            parse_chain(name)?;
        }
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), event = "config_loaded");
        Self::from_json(&json)
    }

    /// Chains listed in the file, in name order.
    pub fn chains(&self) -> Result<Vec<NamedChain>> {
        self.chains.keys().map(|name| parse_chain(name)).collect()
    }

    fn overrides(&self, chain: NamedChain) -> ChainOverrides {
        self.chains
            .iter()
            .find(|(name, _)| parse_chain(name).ok() == Some(chain))
            .map(|(_, overrides)| overrides.clone())
            .unwrap_or_default()
    }

    /// Merges the built-in profile with file and environment overrides,
    /// without requiring an RPC URL.
    pub fn profile(
        &self,
        chain: NamedChain,
        env: &impl Fn(&str) -> Option<String>,
    ) -> Result<ChainProfile> {
        let overrides = self.overrides(chain);
        let mut profile = ChainProfile::builtin(chain)?;
        let prefix = env_prefix(chain);

        if let Some(id) = overrides.token_list_chain_id {
            profile.token_list_chain_id = id;
        }
        if let Some(fee) = overrides.fee_percentage {
            profile.fee_percentage = fee;
        }
        if overrides.dao.is_some() {
            profile.dao = overrides.dao;
        }
        if let Some(version) = overrides.version {
            profile.version = version;
        }
        if let Some(bridges) = overrides.bridges {
            profile.bridges = bridges;
        }
        if let Some(moderators) = overrides.moderators {
            profile.moderators = moderators;
        }
        if overrides.owner.is_some() {
            profile.owner = overrides.owner;
        }
        if overrides.block_queue.is_some() {
            profile.block_queue = overrides.block_queue;
        }
        if let Some(limits) = overrides.token_limits {
            profile.token_limits = limits;
        }
        if let Some(queue) = env_number(env, &format!("{prefix}_TOKEN_LIMIT_QUEUE"))? {
            profile.token_limits.queue = queue;
        }
        if let Some(toggle) = env_number(env, &format!("{prefix}_TOKEN_LIMIT_TOGGLE"))? {
            profile.token_limits.toggle = toggle;
        }
        Ok(profile)
    }

    /// Merges built-in profile, file overrides and environment for `chain`.
    ///
    /// # Errors
    ///
    /// [`OpsError::ChainNotSupported`] for chains without a built-in profile,
    /// [`OpsError::InvalidConfig`] when no RPC URL is configured or an
    /// environment override does not parse.
    pub fn resolve(
        &self,
        chain: NamedChain,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ChainSettings> {
        let profile = self.profile(chain, &env)?;
        let overrides = self.overrides(chain);
        let prefix = env_prefix(chain);

        let rpc_key = format!("{prefix}_RPC_URL");
        let raw_rpc = env(&rpc_key).or(overrides.rpc_url).ok_or_else(|| {
            OpsError::InvalidConfig(format!(
                "no RPC URL for {chain}: set {rpc_key} or chains.{chain}.rpc_url"
            ))
        })?;
        let rpc_url = Url::parse(&raw_rpc)
            .map_err(|e| OpsError::InvalidConfig(format!("invalid RPC URL for {chain}: {e}")))?;

        Ok(ChainSettings {
            profile,
            rpc_url,
            splitter: overrides.splitter,
            proxy_admin: overrides.proxy_admin,
            registration: overrides.registration,
            verification: overrides.verification,
            lock_registry: overrides.lock_registry,
        })
    }

    /// Explorer API key from the environment, else the file.
    pub fn explorer_api_key(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        env(EXPLORER_API_KEY_ENV).or_else(|| self.explorer_api_key.clone())
    }
}

/// Operator private key from the environment.
pub fn operator_key(env: impl Fn(&str) -> Option<String>) -> Result<String> {
    env(PRIVATE_KEY_ENV)
        .ok_or_else(|| OpsError::InvalidConfig(format!("{PRIVATE_KEY_ENV} is not set")))
}
