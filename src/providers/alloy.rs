// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Alloy-based contract adapters.
//!
//! Each adapter wraps an alloy contract instance and implements one of the
//! traits in [`crate::traits`]. Mutating calls wait for the receipt and turn
//! a reverted receipt into [`OpsError::Reverted`]. A receipt that never
//! arrives becomes [`OpsError::ReceiptTimeout`].

use std::time::Duration;

use alloy_network::{Ethereum, EthereumWallet, ReceiptResponse};
use alloy_primitives::{b256, Address, TxHash, B256, U256};
use alloy_provider::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::contracts::bridge_splitter::HecBridgeSplitter::{self, HecBridgeSplitterInstance};
use crate::contracts::lock_registry::LockAddressRegistry::{self, LockAddressRegistryInstance};
use crate::contracts::ownable::Ownable::{self, OwnableInstance};
use crate::contracts::registration::HectorRegistration::{self, HectorRegistrationInstance};
use crate::error::{OpsError, Result};
use crate::sequencer::{AdminStep, LockRegistryInit};
use crate::timelock::{EntityState, ManagingCategory, QueueRecord};
use crate::traits::{AdminTarget, TimelockContract, WalletRegistry};

/// `bytes32(uint256(keccak256("eip1967.proxy.implementation")) - 1)`
pub const EIP1967_IMPLEMENTATION_SLOT: B256 =
    b256!("360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc");

/// How long to wait for a sent transaction to be mined.
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(180);

/// Parses a hex private key, with or without the `0x` prefix.
pub fn parse_signer(key: &str) -> Result<PrivateKeySigner> {
    key.trim()
        .parse::<PrivateKeySigner>()
        .map_err(|e| OpsError::InvalidConfig(format!("invalid operator private key: {e}")))
}

/// A provider that signs with `signer` and fills nonce, gas and chain id.
pub fn connect(rpc_url: Url, signer: PrivateKeySigner) -> DynProvider<Ethereum> {
    ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(rpc_url)
        .erased()
}

/// A provider for view calls only.
pub fn connect_read_only(rpc_url: Url) -> DynProvider<Ethereum> {
    ProviderBuilder::new().connect_http(rpc_url).erased()
}

/// Waits for `pending` to be mined and checks the receipt status.
async fn confirm(method: &str, pending: PendingTransactionBuilder<Ethereum>) -> Result<TxHash> {
    let tx_hash = *pending.tx_hash();
    debug!(method = method, tx_hash = %tx_hash, event = "transaction_sent");

    // Once broadcast, the transaction may be mined even if the receipt never
    // arrives. Callers re-read state instead of resending.
    let receipt = match pending
        .with_timeout(Some(RECEIPT_TIMEOUT))
        .get_receipt()
        .await
    {
        Ok(receipt) => receipt,
        Err(e) => {
            warn!(method = method, tx_hash = %tx_hash, error = %e, event = "receipt_unavailable");
            return Err(OpsError::ReceiptTimeout {
                method: method.to_string(),
                tx_hash,
                reason: e.to_string(),
            });
        }
    };

    if !receipt.status() {
        warn!(method = method, tx_hash = %tx_hash, event = "transaction_reverted");
        return Err(OpsError::Reverted {
            reason: format!("{method} transaction {tx_hash} reverted"),
        });
    }

    info!(
        method = method,
        tx_hash = %tx_hash,
        block_number = ?receipt.block_number(),
        event = "transaction_confirmed"
    );
    Ok(tx_hash)
}

/// Production adapter for a deployed HecBridgeSplitter.
///
/// Implements both [`TimelockContract`] for the allow-lists and
/// [`AdminTarget`] for the post-deployment setters.
///
/// # Examples
///
/// ```rust,no_run
/// use hector_ops::providers::{connect_read_only, AlloyBridgeSplitter};
/// use alloy_primitives::address;
///
/// let provider = connect_read_only("https://rpc.ftm.tools".parse().unwrap());
/// let splitter = AlloyBridgeSplitter::new(
///     address!("1111111111111111111111111111111111111111"),
///     provider,
/// );
/// ```
#[derive(Debug, Clone)]
pub struct AlloyBridgeSplitter<P: Provider<Ethereum>> {
    instance: HecBridgeSplitterInstance<P>,
}

impl<P: Provider<Ethereum>> AlloyBridgeSplitter<P> {
    pub fn new(address: Address, provider: P) -> Self {
        debug!(
            contract_address = %address,
            event = "bridge_splitter_initialized"
        );
        Self {
            instance: HecBridgeSplitter::new(address, provider),
        }
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    /// Block at which a queued change becomes togglable; zero when unqueued.
    async fn queue_expiry(&self, category: ManagingCategory, address: Address) -> Result<u64> {
        let expiry = match category {
            ManagingCategory::ReserveBridges => {
                self.instance.reserveBridgeQueue(address).call().await?
            }
            ManagingCategory::ReserveBridgeAssets => {
                self.instance.reserveBridgeAssetQueue(address).call().await?
            }
        };
        Ok(expiry.saturating_to())
    }

    async fn is_reserved(&self, category: ManagingCategory, address: Address) -> Result<bool> {
        let reserved = match category {
            ManagingCategory::ReserveBridges => {
                self.instance.isReservedBridge(address).call().await?
            }
            ManagingCategory::ReserveBridgeAssets => {
                self.instance.isReservedAsset(address).call().await?
            }
        };
        Ok(reserved)
    }

    fn unsupported(&self, step: &AdminStep) -> OpsError {
        OpsError::InvalidConfig(format!(
            "{} is not supported by the bridge splitter at {}",
            step.name(),
            self.address()
        ))
    }
}

#[async_trait]
impl<P: Provider<Ethereum>> TimelockContract for AlloyBridgeSplitter<P> {
    async fn block_number(&self) -> Result<u64> {
        Ok(self.instance.provider().get_block_number().await?)
    }

    async fn required_delay(&self) -> Result<u64> {
        let blocks = self.instance.blocksNeededForQueue().call().await?;
        Ok(blocks.saturating_to())
    }

    #[instrument(skip(self), fields(contract_address = %self.address()))]
    async fn entity_state(
        &self,
        category: ManagingCategory,
        address: Address,
    ) -> Result<EntityState> {
        if self.is_reserved(category, address).await? {
            return Ok(EntityState::Active);
        }
        let expiry = self.queue_expiry(category, address).await?;
        if expiry == 0 {
            return Ok(EntityState::Unqueued);
        }
        // The contract stores only the expiry block. The queue block is
        // recovered with the current delay, which is exact unless the delay
        // changed after queueing.
        let delay = self.required_delay().await?;
        Ok(EntityState::Queued(QueueRecord::new(
            expiry.saturating_sub(delay),
            delay,
        )))
    }

    async fn queue(&self, category: ManagingCategory, address: Address) -> Result<TxHash> {
        let pending = self
            .instance
            .queue(category.as_u8(), address)
            .send()
            .await?;
        confirm("queue", pending).await
    }

    async fn toggle(&self, category: ManagingCategory, address: Address) -> Result<TxHash> {
        let pending = self
            .instance
            .toggle(category.as_u8(), address)
            .send()
            .await?;
        confirm("toggle", pending).await
    }

    async fn queue_many(
        &self,
        category: ManagingCategory,
        addresses: &[Address],
    ) -> Result<TxHash> {
        let pending = self
            .instance
            .queueMany(category.as_u8(), addresses.to_vec())
            .send()
            .await?;
        confirm("queueMany", pending).await
    }

    async fn toggle_many(
        &self,
        category: ManagingCategory,
        addresses: &[Address],
    ) -> Result<TxHash> {
        let pending = self
            .instance
            .toggleMany(category.as_u8(), addresses.to_vec())
            .send()
            .await?;
        confirm("toggleMany", pending).await
    }

    async fn remove(&self, category: ManagingCategory, address: Address) -> Result<TxHash> {
        match category {
            ManagingCategory::ReserveBridges => {
                let pending = self.instance.removeReserveBridge(address).send().await?;
                confirm("removeReserveBridge", pending).await
            }
            ManagingCategory::ReserveBridgeAssets => {
                let pending = self
                    .instance
                    .removeReserveBridgeAsset(address)
                    .send()
                    .await?;
                confirm("removeReserveBridgeAsset", pending).await
            }
        }
    }
}

#[async_trait]
impl<P: Provider<Ethereum>> AdminTarget for AlloyBridgeSplitter<P> {
    async fn is_applied(&self, step: &AdminStep) -> Result<bool> {
        let applied = match step {
            AdminStep::SetFeePercentage(fee) => {
                self.instance.minFeePercentage().call().await? == U256::from(*fee)
            }
            AdminStep::SetDao(dao) => self.instance.DAO().call().await? == *dao,
            AdminStep::SetVersion(version) => self.instance.version().call().await? == *version,
            AdminStep::AddModerator(account) => {
                self.instance.moderators(*account).call().await?
            }
            AdminStep::RevokeModerator(account) => {
                !self.instance.moderators(*account).call().await?
            }
            AdminStep::SetBlockQueue(blocks) => {
                self.instance.blocksNeededForQueue().call().await? == U256::from(*blocks)
            }
            AdminStep::TransferOwnership(owner) => self.instance.owner().call().await? == *owner,
            AdminStep::InitializeLockRegistry(_) => return Err(self.unsupported(step)),
        };
        Ok(applied)
    }

    async fn apply(&self, step: &AdminStep) -> Result<TxHash> {
        let pending = match step {
            AdminStep::SetFeePercentage(fee) => {
                self.instance
                    .setMinFeePercentage(U256::from(*fee))
                    .send()
                    .await?
            }
            AdminStep::SetDao(dao) => self.instance.setDAO(*dao).send().await?,
            AdminStep::SetVersion(version) => {
                self.instance.setVersion(version.clone()).send().await?
            }
            AdminStep::AddModerator(account) => {
                self.instance.setModerator(*account, true).send().await?
            }
            AdminStep::RevokeModerator(account) => {
                self.instance.setModerator(*account, false).send().await?
            }
            AdminStep::SetBlockQueue(blocks) => {
                self.instance
                    .setBlockQueue(U256::from(*blocks))
                    .send()
                    .await?
            }
            AdminStep::TransferOwnership(owner) => {
                self.instance.transferOwnership(*owner).send().await?
            }
            AdminStep::InitializeLockRegistry(_) => return Err(self.unsupported(step)),
        };
        confirm(step.name(), pending).await
    }
}

/// Adapter for a contract that only exposes `Ownable`, such as a proxy admin.
///
/// Only [`AdminStep::TransferOwnership`] is supported.
#[derive(Debug, Clone)]
pub struct AlloyOwnable<P: Provider<Ethereum>> {
    instance: OwnableInstance<P>,
}

impl<P: Provider<Ethereum>> AlloyOwnable<P> {
    pub fn new(address: Address, provider: P) -> Self {
        debug!(contract_address = %address, event = "ownable_initialized");
        Self {
            instance: Ownable::new(address, provider),
        }
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    fn unsupported(&self, step: &AdminStep) -> OpsError {
        OpsError::InvalidConfig(format!(
            "{} is not supported by the ownable contract at {}",
            step.name(),
            self.address()
        ))
    }
}

#[async_trait]
impl<P: Provider<Ethereum>> AdminTarget for AlloyOwnable<P> {
    async fn is_applied(&self, step: &AdminStep) -> Result<bool> {
        match step {
            AdminStep::TransferOwnership(owner) => {
                Ok(self.instance.owner().call().await? == *owner)
            }
            other => Err(self.unsupported(other)),
        }
    }

    async fn apply(&self, step: &AdminStep) -> Result<TxHash> {
        match step {
            AdminStep::TransferOwnership(owner) => {
                let pending = self.instance.transferOwnership(*owner).send().await?;
                confirm("transferOwnership", pending).await
            }
            other => Err(self.unsupported(other)),
        }
    }
}

/// Adapter for a `LockAddressRegistry`.
///
/// Supports [`AdminStep::InitializeLockRegistry`] and the moderator steps.
#[derive(Debug, Clone)]
pub struct AlloyLockRegistry<P: Provider<Ethereum>> {
    instance: LockAddressRegistryInstance<P>,
}

impl<P: Provider<Ethereum>> AlloyLockRegistry<P> {
    pub fn new(address: Address, provider: P) -> Self {
        debug!(contract_address = %address, event = "lock_registry_initialized");
        Self {
            instance: LockAddressRegistry::new(address, provider),
        }
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }

    fn unsupported(&self, step: &AdminStep) -> OpsError {
        OpsError::InvalidConfig(format!(
            "{} is not supported by the lock registry at {}",
            step.name(),
            self.address()
        ))
    }

    async fn matches(&self, init: &LockRegistryInit) -> Result<bool> {
        Ok(self.instance.getMultisig().call().await? == init.multisig
            && self.instance.getTokenVault().call().await? == init.token_vault
            && self.instance.getFNFT().call().await? == init.fnft
            && self.instance.getTreasury().call().await? == init.treasury
            && self.instance.isModerator(init.moderator).call().await?)
    }
}

#[async_trait]
impl<P: Provider<Ethereum>> AdminTarget for AlloyLockRegistry<P> {
    async fn is_applied(&self, step: &AdminStep) -> Result<bool> {
        match step {
            AdminStep::InitializeLockRegistry(init) => self.matches(init).await,
            AdminStep::AddModerator(account) => {
                Ok(self.instance.isModerator(*account).call().await?)
            }
            AdminStep::RevokeModerator(account) => {
                Ok(!self.instance.isModerator(*account).call().await?)
            }
            other => Err(self.unsupported(other)),
        }
    }

    async fn apply(&self, step: &AdminStep) -> Result<TxHash> {
        let pending = match step {
            AdminStep::InitializeLockRegistry(init) => {
                self.instance
                    .initialize(
                        init.multisig,
                        init.moderator,
                        init.token_vault,
                        init.fnft,
                        init.treasury,
                    )
                    .send()
                    .await?
            }
            AdminStep::AddModerator(account) => {
                self.instance.setModerator(*account, true).send().await?
            }
            AdminStep::RevokeModerator(account) => {
                self.instance.setModerator(*account, false).send().await?
            }
            other => return Err(self.unsupported(other)),
        };
        confirm(step.name(), pending).await
    }
}

/// Production adapter for a HectorRegistration contract.
#[derive(Debug, Clone)]
pub struct AlloyRegistration<P: Provider<Ethereum>> {
    instance: HectorRegistrationInstance<P>,
}

impl<P: Provider<Ethereum>> AlloyRegistration<P> {
    pub fn new(address: Address, provider: P) -> Self {
        debug!(contract_address = %address, event = "registration_initialized");
        Self {
            instance: HectorRegistration::new(address, provider),
        }
    }

    pub fn address(&self) -> Address {
        *self.instance.address()
    }
}

#[async_trait]
impl<P: Provider<Ethereum>> WalletRegistry for AlloyRegistration<P> {
    #[instrument(skip(self), fields(contract_address = %self.address()))]
    async fn all_wallets(&self) -> Result<Vec<Address>> {
        let wallets = self.instance.getAllWallets().call().await?;
        debug!(count = wallets.len(), event = "wallets_retrieved");
        Ok(wallets)
    }

    async fn register_wallets(&self, wallets: &[Address]) -> Result<TxHash> {
        let pending = self
            .instance
            .registerWallets(wallets.to_vec())
            .send()
            .await?;
        confirm("registerWallets", pending).await
    }
}

/// Reads the implementation address behind an EIP-1967 proxy.
///
/// Returns the zero address when `proxy` is not a proxy.
pub async fn implementation_address<P: Provider<Ethereum>>(
    provider: &P,
    proxy: Address,
) -> Result<Address> {
    let slot = U256::from_be_bytes(EIP1967_IMPLEMENTATION_SLOT.0);
    let value = provider.get_storage_at(proxy, slot).await?;
    let implementation = Address::from_word(B256::from(value.to_be_bytes::<32>()));
    info!(
        proxy = %proxy,
        implementation = %implementation,
        event = "implementation_resolved"
    );
    Ok(implementation)
}

/// Account facts logged before a chain's stages start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preflight {
    pub chain_id: u64,
    pub gas_price: u128,
    pub balance: U256,
}

/// Checks that the RPC answers for the expected chain and that `account` can
/// pay for gas.
///
/// # Errors
///
/// [`OpsError::InvalidConfig`] when the RPC serves another chain and
/// [`OpsError::Rejected`] when the account has no balance.
pub async fn preflight<P: Provider<Ethereum>>(
    provider: &P,
    expected_chain_id: u64,
    account: Address,
) -> Result<Preflight> {
    let chain_id = provider.get_chain_id().await?;
    if chain_id != expected_chain_id {
        return Err(OpsError::InvalidConfig(format!(
            "RPC serves chain {chain_id}, expected {expected_chain_id}"
        )));
    }
    let gas_price = provider.get_gas_price().await?;
    let balance = provider.get_balance(account).await?;

    info!(
        chain_id = chain_id,
        account = %account,
        gas_price = gas_price,
        balance = %balance,
        event = "preflight_complete"
    );

    if balance.is_zero() {
        return Err(OpsError::Rejected {
            reason: format!("operator {account} has no balance on chain {chain_id}"),
        });
    }
    Ok(Preflight {
        chain_id,
        gas_price,
        balance,
    })
}
