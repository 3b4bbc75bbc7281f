// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Security Envelope
//!
//! A [`SecurityEnvelope`] is the compact string carried in the
//! `x-security-envelope` header: a JWE (RSA-OAEP-256) whose plaintext is a
//! compact JWS (PS256) whose payload is the JSON request body.
//!
//! ```text
//! x-security-envelope: <JWE header>.<wrapped CEK>.<IV>.<ciphertext>.<tag>
//!                                                     └─ <JWS header>.<payload>.<signature>
//!                                                                      └─ {"election_id": ...}
//! ```
//!
//! Unpacking yields a [`VerifiedPayload`], which replaces the request body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request header carrying the envelope.
pub const ENVELOPE_HEADER: &str = "x-security-envelope";

/// Opaque compact envelope string, consumed once per request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityEnvelope(String);

impl SecurityEnvelope {
    pub fn new(compact: impl Into<String>) -> Self {
        Self(compact.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

// Ciphertext is not logged, only its size.
impl std::fmt::Debug for SecurityEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityEnvelope")
            .field("len", &self.0.len())
            .finish()
    }
}

impl std::fmt::Display for SecurityEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Plaintext JSON recovered from a successfully decrypted and verified envelope.
///
/// Every field a handler sees after injection comes from here.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerifiedPayload(Value);

impl VerifiedPayload {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl std::fmt::Debug for VerifiedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields = self.0.as_object().map(|o| o.len());
        f.debug_struct("VerifiedPayload")
            .field("fields", &fields)
            .finish_non_exhaustive()
    }
}
