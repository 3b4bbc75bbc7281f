// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer
//!
//! Transports that run the request pipeline. No security decision is made
//! here; everything is delegated to [`crate::application`].
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Guard and envelope middleware, service router |
//! | [`rpc`] | JSON messages | Same pipeline for messages carrying their own `headers` |

pub mod api;
pub mod rpc;
