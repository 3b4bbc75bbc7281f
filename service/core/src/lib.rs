// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Election Management Core
//!
//! Secure request envelope pipeline for the election management service.
//! Every inbound request passes the [`application::request_guard::RequestGuard`]
//! and then the [`application::envelope_injection::EnvelopeInjectionStage`]
//! before any business handler runs.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Admission control, body signatures and envelope unpacking

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
