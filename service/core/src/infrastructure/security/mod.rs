// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod audit;
pub mod envelope;
pub mod jose;
pub mod key_cache;
pub mod signature;
pub mod token;

pub use audit::GuardAuditLogger;
pub use envelope::{EnvelopeError, EnvelopeSealer, EnvelopeUnpacker, InvalidEnvelopeError};
pub use key_cache::{KeyError, KeyMaterial, KeyMaterialCache};
pub use signature::{Canonicalization, SignatureError, SignatureVerifier};
pub use token::{BearerTokenVerifier, TokenError};
