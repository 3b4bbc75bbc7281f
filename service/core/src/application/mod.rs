// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application services of the request pipeline: admission, then envelope
//! injection. Transports in [`crate::presentation`] call these; they never
//! touch key material directly.

pub mod envelope_injection;
pub mod request_guard;

pub use envelope_injection::{EnvelopeInjectionStage, InjectionError};
pub use request_guard::RequestGuard;
