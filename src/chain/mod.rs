// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Per-chain deployment profiles.
//!
//! A [`ChainProfile`] carries everything the bridge splitter plan needs for
//! one chain: fee, DAO, version, bridge routers, moderators, final owner,
//! block queue and batch limits. Built-in profiles cover the chains the
//! splitter was deployed to; a config file can override any field.

pub mod addresses;

use alloy_chains::NamedChain;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{OpsError, Result};
use crate::sequencer::AdminStep;

use self::addresses::*;

/// Protocol fee in basis points.
pub const DEFAULT_FEE_PERCENTAGE: u16 = 75;

pub const DEFAULT_VERSION: &str = "2.0";

/// Eight hours of blocks on a one-second chain.
pub const DEFAULT_BLOCK_QUEUE: u64 = 28_800;

/// Batch sizes for the asset allow-list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenLimits {
    /// Entries per `queueMany` call.
    pub queue: usize,
    /// Entries per `toggleMany` call.
    pub toggle: usize,
}

impl Default for TokenLimits {
    fn default() -> Self {
        Self {
            queue: 400,
            toggle: 40,
        }
    }
}

/// Deployment parameters for one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProfile {
    pub chain: NamedChain,
    /// Chain id used to query token list APIs.
    pub token_list_chain_id: u64,
    pub fee_percentage: u16,
    pub dao: Option<Address>,
    pub version: String,
    /// Bridge routers to allow-list.
    pub bridges: Vec<Address>,
    /// Moderators to add once the deployer steps down.
    pub moderators: Vec<Address>,
    /// Final owner. Defaults to the DAO when unset.
    pub owner: Option<Address>,
    pub block_queue: Option<u64>,
    pub token_limits: TokenLimits,
}

impl ChainProfile {
    /// A profile with defaults and no chain-specific addresses.
    pub fn new(chain: NamedChain) -> Self {
        Self {
            chain,
            token_list_chain_id: chain as u64,
            fee_percentage: DEFAULT_FEE_PERCENTAGE,
            dao: None,
            version: DEFAULT_VERSION.to_string(),
            bridges: vec![LIFI_DIAMOND, SQUID_ROUTER],
            moderators: Vec::new(),
            owner: None,
            block_queue: None,
            token_limits: TokenLimits::default(),
        }
    }

    /// The built-in profile for `chain`.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::ChainNotSupported`] for chains the splitter was
    /// never deployed to.
    pub fn builtin(chain: NamedChain) -> Result<Self> {
        let profile = Self::new(chain);
        let profile = match chain {
            NamedChain::Fantom => Self {
                dao: Some(FANTOM_DAO),
                moderators: vec![FANTOM_MULTISIG, FANTOM_DEV_MULTISIG],
                owner: Some(FANTOM_MULTISIG),
                block_queue: Some(DEFAULT_BLOCK_QUEUE),
                ..profile
            },
            NamedChain::Polygon => Self {
                dao: Some(POLYGON_DAO),
                block_queue: Some(DEFAULT_BLOCK_QUEUE),
                ..profile
            },
            NamedChain::BinanceSmartChain => Self {
                dao: Some(BSC_DAO),
                ..profile
            },
            NamedChain::Avalanche => Self {
                dao: Some(AVALANCHE_DAO),
                ..profile
            },
            NamedChain::Celo => Self {
                dao: Some(CELO_DAO),
                ..profile
            },
            // DAO must come from configuration.
            NamedChain::Moonriver
            | NamedChain::Mainnet
            | NamedChain::Arbitrum
            | NamedChain::Optimism => profile,
            _ => {
                return Err(OpsError::ChainNotSupported {
                    chain: chain.to_string(),
                })
            }
        };
        Ok(profile)
    }

    pub fn is_supported(chain: NamedChain) -> bool {
        Self::builtin(chain).is_ok()
    }

    /// The DAO address, which every deployment needs.
    pub fn require_dao(&self) -> Result<Address> {
        match self.dao {
            Some(dao) if !dao.is_zero() => Ok(dao),
            _ => Err(OpsError::InvalidConfig(format!(
                "no DAO address configured for {}",
                self.chain
            ))),
        }
    }

    /// Final owner: the explicit owner, else the DAO.
    pub fn final_owner(&self) -> Result<Address> {
        match self.owner {
            Some(owner) => Ok(owner),
            None => self.require_dao(),
        }
    }

    /// Fee, DAO and version, applied right after deployment.
    pub fn initial_steps(&self) -> Result<Vec<AdminStep>> {
        Ok(vec![
            AdminStep::SetFeePercentage(self.fee_percentage),
            AdminStep::SetDao(self.require_dao()?),
            AdminStep::SetVersion(self.version.clone()),
        ])
    }

    /// Hand-over steps: the deployer steps down as moderator in favour of the
    /// configured moderators, the block queue is raised, and ownership moves
    /// to the final owner.
    ///
    /// The deployer is only revoked when at least one moderator replaces it.
    pub fn handover_steps(&self, deployer: Address) -> Result<Vec<AdminStep>> {
        let mut steps = Vec::new();
        if !self.moderators.is_empty() {
            if !self.moderators.contains(&deployer) {
                steps.push(AdminStep::RevokeModerator(deployer));
            }
            steps.extend(self.moderators.iter().copied().map(AdminStep::AddModerator));
        }
        if let Some(blocks) = self.block_queue {
            steps.push(AdminStep::SetBlockQueue(blocks));
        }
        steps.push(AdminStep::TransferOwnership(self.final_owner()?));
        Ok(steps)
    }

    /// Prefix for per-chain environment variables, e.g. `FANTOM`.
    pub fn env_prefix(&self) -> String {
        env_prefix(self.chain)
    }
}

/// Upper-cased chain name with dashes replaced, e.g. `ARBITRUM_SEPOLIA`.
pub fn env_prefix(chain: NamedChain) -> String {
    chain.to_string().to_uppercase().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(NamedChain::Fantom, FANTOM_DAO)]
    #[case(NamedChain::Polygon, FANTOM_DAO)]
    #[case(NamedChain::BinanceSmartChain, BSC_DAO)]
    #[case(NamedChain::Avalanche, AVALANCHE_DAO)]
    #[case(NamedChain::Celo, CELO_DAO)]
    fn test_builtin_dao(#[case] chain: NamedChain, #[case] dao: Address) {
        let profile = ChainProfile::builtin(chain).unwrap();
        assert_eq!(profile.require_dao().unwrap(), dao);
        assert_eq!(profile.fee_percentage, 75);
        assert_eq!(profile.version, "2.0");
        assert_eq!(profile.bridges, vec![LIFI_DIAMOND, SQUID_ROUTER]);
    }

    #[test]
    fn test_missing_dao_is_fatal() {
        let profile = ChainProfile::builtin(NamedChain::Moonriver).unwrap();
        assert!(matches!(
            profile.initial_steps(),
            Err(OpsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unsupported_chain() {
        assert!(matches!(
            ChainProfile::builtin(NamedChain::Sepolia),
            Err(OpsError::ChainNotSupported { .. })
        ));
        assert!(ChainProfile::is_supported(NamedChain::Fantom));
    }

    #[test]
    fn test_fantom_handover_order() {
        let deployer = Address::repeat_byte(0xde);
        let steps = ChainProfile::builtin(NamedChain::Fantom)
            .unwrap()
            .handover_steps(deployer)
            .unwrap();

        assert_eq!(
            steps,
            vec![
                AdminStep::RevokeModerator(deployer),
                AdminStep::AddModerator(FANTOM_MULTISIG),
                AdminStep::AddModerator(FANTOM_DEV_MULTISIG),
                AdminStep::SetBlockQueue(28_800),
                AdminStep::TransferOwnership(FANTOM_MULTISIG),
            ]
        );
    }

    #[test]
    fn test_owner_defaults_to_dao() {
        let deployer = Address::repeat_byte(0xde);
        let steps = ChainProfile::builtin(NamedChain::BinanceSmartChain)
            .unwrap()
            .handover_steps(deployer)
            .unwrap();
        assert_eq!(steps, vec![AdminStep::TransferOwnership(BSC_DAO)]);
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(env_prefix(NamedChain::Fantom), "FANTOM");
        assert_eq!(env_prefix(NamedChain::ArbitrumSepolia), "ARBITRUM_SEPOLIA");
    }
}
