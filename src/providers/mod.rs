// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Production implementations of the operator traits.
//!
//! These adapters talk to real chains through alloy and use Tokio's timer.
//! HTTP-backed sources live next to their parsing code in
//! [`crate::token_list`] and [`crate::verify`].

mod alloy;
mod tokio_clock;

pub use self::alloy::{
    connect, connect_read_only, implementation_address, parse_signer, preflight,
    AlloyBridgeSplitter, AlloyLockRegistry, AlloyOwnable, AlloyRegistration, Preflight,
    EIP1967_IMPLEMENTATION_SLOT,
};
pub use self::tokio_clock::TokioClock;
