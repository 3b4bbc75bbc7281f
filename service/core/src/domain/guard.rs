// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Admission Guard Model
//!
//! Policies, outcomes and rejection reasons for
//! [`crate::application::request_guard::RequestGuard`].
//!
//! ## Policies
//!
//! | Policy | Checks, in order |
//! |--------|------------------|
//! | [`GuardPolicy::ApiKey`] | `x-api-key` |
//! | [`GuardPolicy::ApiKeyAndBearerToken`] | `x-api-key`, `x-internal-token` present, RS256 verifies |
//! | [`GuardPolicy::ApiKeyAndSignature`] | `x-api-key`, `x-signature` present, PSS verifies over body |
//!
//! The first failing check wins. A [`RejectionReason`] is written to the audit
//! log only; callers always see the same generic 401.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use subtle::ConstantTimeEq;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const BEARER_TOKEN_HEADER: &str = "x-internal-token";
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Which checks the guard runs after the shared secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GuardPolicy {
    ApiKey,
    #[serde(rename = "api-key-bearer")]
    ApiKeyAndBearerToken,
    #[default]
    #[serde(rename = "api-key-signature")]
    ApiKeyAndSignature,
}

impl GuardPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            GuardPolicy::ApiKey => "api-key",
            GuardPolicy::ApiKeyAndBearerToken => "api-key-bearer",
            GuardPolicy::ApiKeyAndSignature => "api-key-signature",
        }
    }
}

impl std::fmt::Display for GuardPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GuardPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api-key" => Ok(GuardPolicy::ApiKey),
            "api-key-bearer" => Ok(GuardPolicy::ApiKeyAndBearerToken),
            "api-key-signature" => Ok(GuardPolicy::ApiKeyAndSignature),
            other => Err(format!(
                "unknown guard policy '{}' (expected api-key, api-key-bearer or api-key-signature)",
                other
            )),
        }
    }
}

/// The pre-provisioned service credential compared against `x-api-key`.
#[derive(Clone)]
pub struct SharedSecret(String);

impl SharedSecret {
    /// Returns `None` for an empty secret.
    pub fn new(secret: impl Into<String>) -> Option<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            None
        } else {
            Some(Self(secret))
        }
    }

    /// Exact string equality, constant-time for equal-length inputs.
    pub fn matches(&self, presented: &str) -> bool {
        self.0.as_bytes().ct_eq(presented.as_bytes()).into()
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(***)")
    }
}

/// Why a request was turned away. Logged server-side, never returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    MissingApiKey,
    InvalidApiKey,
    MissingBearerToken,
    InvalidBearerToken(String),
    MissingSignature,
    MalformedSignature(String),
    MalformedBody(String),
    SignatureMismatch,
    /// Key material lookup failed. Indicates a startup wiring bug.
    KeyUnavailable(String),
}

/// Coarse class of a rejection, used for audit severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionClass {
    /// No valid service credential.
    Unauthenticated,
    /// Valid credential but identity or integrity proof failed.
    Unauthorized,
}

impl RejectionReason {
    pub fn class(&self) -> RejectionClass {
        match self {
            RejectionReason::MissingApiKey | RejectionReason::InvalidApiKey => {
                RejectionClass::Unauthenticated
            }
            _ => RejectionClass::Unauthorized,
        }
    }

    /// Stable label for metrics.
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::MissingApiKey => "missing_api_key",
            RejectionReason::InvalidApiKey => "invalid_api_key",
            RejectionReason::MissingBearerToken => "missing_bearer_token",
            RejectionReason::InvalidBearerToken(_) => "invalid_bearer_token",
            RejectionReason::MissingSignature => "missing_signature",
            RejectionReason::MalformedSignature(_) => "malformed_signature",
            RejectionReason::MalformedBody(_) => "malformed_body",
            RejectionReason::SignatureMismatch => "signature_mismatch",
            RejectionReason::KeyUnavailable(_) => "key_unavailable",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "API key absent"),
            Self::InvalidApiKey => write!(f, "API key invalid"),
            Self::MissingBearerToken => write!(f, "missing identity signature (token absent)"),
            Self::InvalidBearerToken(e) => write!(f, "identity signature invalid or expired: {}", e),
            Self::MissingSignature => write!(f, "missing x-signature header"),
            Self::MalformedSignature(e) => write!(f, "malformed body signature: {}", e),
            Self::MalformedBody(e) => write!(f, "body cannot be canonicalized: {}", e),
            Self::SignatureMismatch => write!(f, "body signature does not verify"),
            Self::KeyUnavailable(e) => write!(f, "verification key unavailable: {}", e),
        }
    }
}

/// A rejected request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub policy: GuardPolicy,
    pub reason: RejectionReason,
}

/// Result of one guard evaluation.
#[must_use = "a rejected request must not reach the handler"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Accepted,
    Rejected(Rejection),
}

impl GuardOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GuardOutcome::Accepted)
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            GuardOutcome::Accepted => None,
            GuardOutcome::Rejected(r) => Some(r),
        }
    }
}
