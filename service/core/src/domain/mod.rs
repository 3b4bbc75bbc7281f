// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain model for the secure request pipeline.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Crypto-free types shared by guard, unpacker and transports

pub mod envelope;
pub mod guard;
pub mod key_material;
pub mod request;
