// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid bearer token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

/// RS256 verifier for the `x-internal-token` identity assertion.
///
/// Only the signature and, when present, `exp` and `nbf` are checked. No other
/// claim is interpreted at this layer.
#[derive(Debug, Clone)]
pub struct BearerTokenVerifier {
    validation: Validation,
}

impl BearerTokenVerifier {
    pub fn new() -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.required_spec_claims.clear();
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.leeway = 0;
        Self { validation }
    }

    pub fn verify(&self, token: &str, public_key: &RsaPublicKey) -> Result<(), TokenError> {
        let decoding_key = DecodingKey::from_rsa_raw_components(
            &public_key.n().to_bytes_be(),
            &public_key.e().to_bytes_be(),
        );
        decode::<Value>(token.trim(), &decoding_key, &self.validation)?;
        Ok(())
    }
}

impl Default for BearerTokenVerifier {
    fn default() -> Self {
        Self::new()
    }
}
