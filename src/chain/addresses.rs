// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Address book for the bridge splitter deployments.
//!
//! Bridge routers are deployed at the same address on every EVM chain they
//! support. DAO treasuries and multisigs are per chain.

use alloy_primitives::{address, Address};

// Bridge routers

/// <https://docs.li.fi/smart-contracts/deployments>
pub const LIFI_DIAMOND: Address = address!("1231DEB6f5749EF6cE6943a275A1D3E7486F4EaE");

/// <https://docs.squidrouter.com/>
pub const SQUID_ROUTER: Address = address!("ce16f69375520ab01377ce7b88f5ba8c48f8d666");

// DAO treasuries

/// Shared by the Fantom and Polygon deployments.
pub const FANTOM_DAO: Address = address!("677d6EC74fA352D4Ef9B1886F6155384aCD70D90");

pub const POLYGON_DAO: Address = FANTOM_DAO;

pub const BSC_DAO: Address = address!("3CDF52CC28D21C5b7b91d7065fd6dfE6d426FCC5");

pub const AVALANCHE_DAO: Address = address!("078E3977b30955f4Af9AA1D9DeC4ceB660c36e0c");

pub const CELO_DAO: Address = address!("9132225255eEF4d0E0094F882ff46Ae61E1AcB24");

// Multisigs

/// Operations multisig. Becomes owner and moderator after deployment.
pub const FANTOM_MULTISIG: Address = address!("2ba5F2ce103A45e278D7Bc99153190eD6E9c4A96");

pub const FANTOM_DEV_MULTISIG: Address = address!("E693aD983eCdfE91F0E47992D869CEA60df425Be");

// Wallet registration

/// <https://ftmscan.com/address/0x26834b17926A3F5C461B16766002Aa8c854eDC1D>
pub const FANTOM_REGISTRATION_V1: Address = address!("26834b17926A3F5C461B16766002Aa8c854eDC1D");

/// <https://ftmscan.com/address/0x4b3Cf1639346dD953c173Bb3faB1B994eD9AD843>
pub const FANTOM_REGISTRATION_V2: Address = address!("4b3Cf1639346dD953c173Bb3faB1B994eD9AD843");
