// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Infrastructure adapters: configuration sources and the cryptographic
//! primitives behind the guard and the envelope unpacker.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer

pub mod config;
pub mod security;
