// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! `LockAddressRegistry`, the address book of the lock and redemption
//! contracts. Initialized once after deployment.

use alloy_sol_types::sol;

sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface LockAddressRegistry {
        function initialize(
            address multisig,
            address moderator,
            address tokenVault,
            address fnft,
            address treasury
        ) external;

        function getMultisig() external view returns (address);
        function getTokenVault() external view returns (address);
        function getFNFT() external view returns (address);
        function getTreasury() external view returns (address);
        function isModerator(address account) external view returns (bool);

        function setModerator(address account, bool approved) external;
    }
);
