// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! HecBridgeSplitter bindings
//!
//! The `MANAGING` enum is ABI-encoded as `uint8`: 0 for reserve bridges, 1
//! for reserve bridge assets. The queue views return the block at which a
//! queued change becomes togglable, or zero when nothing is queued.

use alloy_sol_types::sol;

sol!(
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface HecBridgeSplitter {
        event ChangeQueued(uint8 indexed managing, address queued);
        event ChangeActivated(uint8 indexed managing, address activated, bool result);

        function blocksNeededForQueue() external view returns (uint256);
        function reserveBridgeQueue(address bridge) external view returns (uint256);
        function reserveBridgeAssetQueue(address asset) external view returns (uint256);
        function isReservedBridge(address bridge) external view returns (bool);
        function isReservedAsset(address asset) external view returns (bool);

        function queue(uint8 managing, address target) external returns (bool);
        function toggle(uint8 managing, address target) external returns (bool);
        function queueMany(uint8 managing, address[] calldata targets) external returns (bool);
        function toggleMany(uint8 managing, address[] calldata targets) external returns (bool);
        function removeReserveBridge(address bridge) external;
        function removeReserveBridgeAsset(address asset) external;

        function minFeePercentage() external view returns (uint256);
        function DAO() external view returns (address);
        function version() external view returns (string memory);
        function moderators(address account) external view returns (bool);
        function owner() external view returns (address);

        function setMinFeePercentage(uint256 feePercentage) external;
        function setDAO(address dao) external;
        function setVersion(string calldata version) external;
        function setModerator(address moderator, bool approved) external;
        function setBlockQueue(uint256 blocks) external;
        function transferOwnership(address newOwner) external;
    }
);
