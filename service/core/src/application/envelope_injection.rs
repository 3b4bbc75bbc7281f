// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Envelope Injection Stage
//!
//! Runs after the [`super::request_guard::RequestGuard`] admits a request.
//! Opens `x-security-envelope` and replaces the request body with the verified
//! payload, so the handler never sees anything the counterpart did not sign.
//!
//! ```text
//! admitted request
//!   └─ take x-security-envelope      (missing → MissingEnvelope)
//!   └─ EnvelopeUnpacker::unpack       (any failure → InvalidEnvelope)
//!   └─ RequestContext::replace_body   (no merge with the received body)
//! ```

use thiserror::Error;
use tracing::debug;

use crate::domain::envelope::{SecurityEnvelope, ENVELOPE_HEADER};
use crate::domain::request::RequestContext;
use crate::infrastructure::security::{EnvelopeUnpacker, GuardAuditLogger, InvalidEnvelopeError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InjectionError {
    #[error("Missing x-security-envelope header")]
    MissingEnvelope,

    #[error(transparent)]
    InvalidEnvelope(#[from] InvalidEnvelopeError),
}

impl InjectionError {
    /// Stable label for audit records and metrics.
    pub fn code(&self) -> &'static str {
        match self {
            InjectionError::MissingEnvelope => "missing",
            InjectionError::InvalidEnvelope(_) => "invalid",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvelopeInjectionStage {
    unpacker: EnvelopeUnpacker,
    audit: GuardAuditLogger,
}

impl EnvelopeInjectionStage {
    pub fn new(unpacker: EnvelopeUnpacker) -> Self {
        Self {
            unpacker,
            audit: GuardAuditLogger::new(),
        }
    }

    /// Consume the envelope header and install the verified payload as the
    /// body. The context is left untouched apart from the removed header when
    /// this fails.
    pub fn inject(&self, ctx: &mut RequestContext) -> Result<(), InjectionError> {
        let result = self.unpack_into(ctx);
        if let Err(e) = &result {
            self.audit.record_envelope_failure(e.code(), ctx.audit());
        }
        result
    }

    fn unpack_into(&self, ctx: &mut RequestContext) -> Result<(), InjectionError> {
        let envelope = ctx
            .take_header(ENVELOPE_HEADER)
            .map(SecurityEnvelope::new)
            .filter(|e| !e.as_str().is_empty())
            .ok_or(InjectionError::MissingEnvelope)?;

        let payload = self.unpacker.unpack(&envelope)?;
        ctx.replace_body(payload);
        debug!(path = %ctx.audit().path, "Verified payload injected");
        Ok(())
    }
}
