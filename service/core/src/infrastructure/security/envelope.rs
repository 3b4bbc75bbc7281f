// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Security Envelope
//!
//! Opens and seals the sign-then-encrypt envelope carried in
//! `x-security-envelope`.
//!
//! ```text
//! compact JWE  (RSA-OAEP-256 / AES-GCM or AES-CBC-HMAC, service public key)
//!   └─ compact JWS  (PS256, counterpart private key)
//!         └─ JSON payload
//! ```
//!
//! [`EnvelopeUnpacker`] is the receiving side; [`EnvelopeSealer`] is the
//! counterpart side, used by the CLI and by tests.

use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::envelope::{SecurityEnvelope, VerifiedPayload};
use crate::domain::key_material::{COUNTERPART_PUBLIC_KEY_VAR, SERVICE_PRIVATE_KEY_VAR};
use crate::infrastructure::security::jose::{self, ContentEncryption, JoseError};
use crate::infrastructure::security::key_cache::{KeyError, KeyMaterialCache};

/// Detailed cause of an envelope failure. Logged, never returned to callers.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope keys unavailable: {0}")]
    Keys(#[from] KeyError),

    #[error("envelope decryption failed: {0}")]
    Decryption(JoseError),

    #[error("envelope integrity check failed: {0}")]
    Integrity(JoseError),

    #[error("envelope payload is not JSON: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("envelope could not be sealed: {0}")]
    Seal(JoseError),
}

/// The only envelope error a caller ever sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid or corrupted security envelope")]
pub struct InvalidEnvelopeError;

/// Decrypts, verifies and parses security envelopes against the cached keys.
#[derive(Debug, Clone)]
pub struct EnvelopeUnpacker {
    keys: Arc<KeyMaterialCache>,
}

impl EnvelopeUnpacker {
    pub fn new(keys: Arc<KeyMaterialCache>) -> Self {
        Self { keys }
    }

    /// Every failure collapses into [`InvalidEnvelopeError`] after the cause is
    /// logged.
    pub fn unpack(&self, envelope: &SecurityEnvelope) -> Result<VerifiedPayload, InvalidEnvelopeError> {
        self.open(envelope).map_err(|e| {
            warn!(error = %e, envelope_len = envelope.as_str().len(), "Security envelope rejected");
            InvalidEnvelopeError
        })
    }

    /// Open the envelope keeping the detailed cause.
    pub fn open(&self, envelope: &SecurityEnvelope) -> Result<VerifiedPayload, EnvelopeError> {
        let service_key = self.keys.private_key(SERVICE_PRIVATE_KEY_VAR)?;
        let counterpart_key = self.keys.public_key(COUNTERPART_PUBLIC_KEY_VAR)?;

        let inner = jose::decrypt_compact(envelope.as_str(), service_key)
            .map_err(EnvelopeError::Decryption)?;
        let jws = std::str::from_utf8(&inner)
            .map_err(|_| EnvelopeError::Integrity(JoseError::Malformed("inner JWS is not UTF-8".to_string())))?;

        let payload = jose::verify_compact(jws.trim(), counterpart_key).map_err(EnvelopeError::Integrity)?;
        let value: Value = serde_json::from_slice(&payload)?;

        debug!("Security envelope opened");
        Ok(VerifiedPayload::new(value))
    }
}

/// Counterpart side of the envelope: sign with the counterpart private key,
/// then encrypt to the service public key.
#[derive(Clone)]
pub struct EnvelopeSealer {
    recipient: RsaPublicKey,
    signer: RsaPrivateKey,
    enc: ContentEncryption,
}

impl EnvelopeSealer {
    pub fn new(recipient: RsaPublicKey, signer: RsaPrivateKey) -> Self {
        Self {
            recipient,
            signer,
            enc: ContentEncryption::default(),
        }
    }

    pub fn with_content_encryption(mut self, enc: ContentEncryption) -> Self {
        self.enc = enc;
        self
    }

    pub fn seal(&self, payload: &Value) -> Result<SecurityEnvelope, EnvelopeError> {
        let json = serde_json::to_vec(payload)?;
        let jws = jose::sign_compact(&json, &self.signer).map_err(EnvelopeError::Seal)?;
        let jwe = jose::encrypt_compact(jws.as_bytes(), &self.recipient, self.enc, Some("JWT"))
            .map_err(EnvelopeError::Seal)?;
        Ok(SecurityEnvelope::new(jwe))
    }
}

impl std::fmt::Debug for EnvelopeSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeSealer")
            .field("enc", &self.enc)
            .finish_non_exhaustive()
    }
}
