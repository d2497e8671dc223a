// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! HectorRegistration bindings

use alloy_sol_types::sol;

sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface HectorRegistration {
        function getAllWallets() external view returns (address[] memory);
        function registerWallets(address[] calldata wallets) external;
    }
);
