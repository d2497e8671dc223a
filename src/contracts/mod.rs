// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! Contract bindings
//!
//! Alloy-generated bindings for the contracts the operator talks to. Only the
//! functions the drivers call are declared.
//!
//! - [`HecBridgeSplitter`](bridge_splitter::HecBridgeSplitter): the timelocked
//!   splitter with its administrative setters
//! - [`HectorRegistration`](registration::HectorRegistration): wallet registry
//! - [`LockAddressRegistry`](lock_registry::LockAddressRegistry): lock and
//!   redemption address book
//! - [`Ownable`](ownable::Ownable): proxy admins and anything else with a
//!   single owner

pub mod bridge_splitter;
pub mod lock_registry;
pub mod ownable;
pub mod registration;
