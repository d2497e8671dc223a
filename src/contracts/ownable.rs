// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Minimal `Ownable` interface, shared by proxy admins and upgradeable
//! proxies.

use alloy_sol_types::sol;

sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface Ownable {
        function owner() external view returns (address);
        function transferOwnership(address newOwner) external;
    }
);
