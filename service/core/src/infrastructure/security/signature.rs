// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Detached Body Signatures
//!
//! Verifies the `x-signature` header: a base64 RSASSA-PSS signature
//! (SHA-256, MGF1-SHA-256, salt length 32) over the canonical form of the
//! request body.
//!
//! ## Canonicalization
//!
//! Signer and verifier must produce the same bytes. Two forms are supported
//! and the deployment must pick the one its signer uses:
//!
//! - [`Canonicalization::Reserialized`]: parse the body and write it back as
//!   compact JSON, keeping object keys in the order received. An empty body is
//!   `{}`.
//! - [`Canonicalization::Raw`]: the body bytes exactly as received.
//!
//! Neither form sorts keys, so a body re-ordered after signing fails.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pss::{Signature, VerifyingKey};
use rsa::signature::Verifier;
use rsa::traits::PublicKeyParts;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::borrow::Cow;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Canonicalization {
    #[default]
    Reserialized,
    Raw,
}

impl FromStr for Canonicalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reserialized" => Ok(Canonicalization::Reserialized),
            "raw" => Ok(Canonicalization::Raw),
            other => Err(format!(
                "unknown canonicalization '{}' (expected reserialized or raw)",
                other
            )),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The signature header could not be decoded into a signature of the
    /// key's size.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// Re-serialization was requested but the body is not JSON.
    #[error("body is not valid JSON: {0}")]
    MalformedBody(String),
}

/// Stateless PSS verifier for request bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureVerifier {
    canonicalization: Canonicalization,
}

impl SignatureVerifier {
    pub fn new(canonicalization: Canonicalization) -> Self {
        Self { canonicalization }
    }

    pub fn canonicalization(&self) -> Canonicalization {
        self.canonicalization
    }

    /// The bytes the signature is expected to cover.
    pub fn canonical_bytes<'a>(&self, body: &'a [u8]) -> Result<Cow<'a, [u8]>, SignatureError> {
        match self.canonicalization {
            Canonicalization::Raw => Ok(Cow::Borrowed(body)),
            Canonicalization::Reserialized => {
                if body.iter().all(u8::is_ascii_whitespace) {
                    return Ok(Cow::Owned(b"{}".to_vec()));
                }
                let parsed: Value = serde_json::from_slice(body)
                    .map_err(|e| SignatureError::MalformedBody(e.to_string()))?;
                Ok(Cow::Owned(parsed.to_string().into_bytes()))
            }
        }
    }

    /// `Ok(false)` means a well-formed signature that does not verify.
    pub fn verify(
        &self,
        body: &[u8],
        signature_b64: &str,
        public_key: &RsaPublicKey,
    ) -> Result<bool, SignatureError> {
        let signature = STANDARD
            .decode(signature_b64.trim())
            .map_err(|e| SignatureError::MalformedSignature(format!("invalid base64: {}", e)))?;

        if signature.len() != public_key.size() {
            return Err(SignatureError::MalformedSignature(format!(
                "expected {} bytes, got {}",
                public_key.size(),
                signature.len()
            )));
        }

        let message = self.canonical_bytes(body)?;
        Ok(verify_pss_sha256(public_key, &message, &signature))
    }
}

/// RSASSA-PSS / SHA-256 with salt length equal to the digest length.
/// Shared with the JWS layer of the envelope.
pub(crate) fn verify_pss_sha256(public_key: &RsaPublicKey, message: &[u8], signature: &[u8]) -> bool {
    let verifying_key = VerifyingKey::<Sha256>::new(public_key.clone());
    match Signature::try_from(signature) {
        Ok(signature) => verifying_key.verify(message, &signature).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;
    use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
    use rsa::pss::BlindedSigningKey;
    use rsa::signature::{RandomizedSigner, SignatureEncoding};
    use rsa::RsaPrivateKey;

    const COUNTERPART_PRIVATE_PEM: &str = include_str!("../../../tests/fixtures/counterpart_private.pem");
    const COUNTERPART_PUBLIC_PEM: &str = include_str!("../../../tests/fixtures/counterpart_public.pem");
    const ROGUE_PRIVATE_PEM: &str = include_str!("../../../tests/fixtures/rogue_private.pem");

    fn public_key() -> RsaPublicKey {
        RsaPublicKey::from_public_key_pem(COUNTERPART_PUBLIC_PEM).unwrap()
    }

    fn sign(private_pem: &str, message: &[u8]) -> String {
        let key = RsaPrivateKey::from_pkcs8_pem(private_pem).unwrap();
        let signing_key = BlindedSigningKey::<Sha256>::new(key);
        let signature = signing_key.sign_with_rng(&mut OsRng, message);
        STANDARD.encode(signature.to_bytes())
    }

    #[test]
    fn test_valid_signature_over_reserialized_body() {
        let verifier = SignatureVerifier::default();
        // Whitespace differs from the signed form but key order is the same.
        let body = br#"{ "name": "Regional 2026", "candidates": [1, 2] }"#;
        let signature = sign(COUNTERPART_PRIVATE_PEM, br#"{"name":"Regional 2026","candidates":[1,2]}"#);
        assert_eq!(verifier.verify(body, &signature, &public_key()), Ok(true));
    }

    #[test]
    fn test_reordered_keys_fail_verification() {
        let verifier = SignatureVerifier::default();
        let signature = sign(COUNTERPART_PRIVATE_PEM, br#"{"a":1,"b":2}"#);
        assert_eq!(verifier.verify(br#"{"b":2,"a":1}"#, &signature, &public_key()), Ok(false));
    }

    #[test]
    fn test_raw_canonicalization_is_byte_exact() {
        let verifier = SignatureVerifier::new(Canonicalization::Raw);
        let body = br#"{ "a": 1 }"#;
        let signature = sign(COUNTERPART_PRIVATE_PEM, body);
        assert_eq!(verifier.verify(body, &signature, &public_key()), Ok(true));
        assert_eq!(verifier.verify(br#"{"a":1}"#, &signature, &public_key()), Ok(false));
    }

    #[test]
    fn test_empty_body_canonicalizes_to_empty_object() {
        let verifier = SignatureVerifier::default();
        let signature = sign(COUNTERPART_PRIVATE_PEM, b"{}");
        assert_eq!(verifier.verify(b"", &signature, &public_key()), Ok(true));
    }

    #[test]
    fn test_wrong_signer_returns_false() {
        let verifier = SignatureVerifier::default();
        let signature = sign(ROGUE_PRIVATE_PEM, b"{}");
        assert_eq!(verifier.verify(b"{}", &signature, &public_key()), Ok(false));
    }

    #[test]
    fn test_undecodable_signature_is_error() {
        let verifier = SignatureVerifier::default();
        assert!(matches!(
            verifier.verify(b"{}", "%%%not-base64", &public_key()),
            Err(SignatureError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_truncated_signature_is_error() {
        let verifier = SignatureVerifier::default();
        let short = STANDARD.encode([0u8; 16]);
        assert!(matches!(
            verifier.verify(b"{}", &short, &public_key()),
            Err(SignatureError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_non_json_body_is_error_when_reserializing() {
        let verifier = SignatureVerifier::default();
        let signature = sign(COUNTERPART_PRIVATE_PEM, b"{}");
        assert!(matches!(
            verifier.verify(b"name=x", &signature, &public_key()),
            Err(SignatureError::MalformedBody(_))
        ));
    }

    #[test]
    fn test_verification_is_repeatable() {
        let verifier = SignatureVerifier::default();
        let signature = sign(COUNTERPART_PRIVATE_PEM, br#"{"x":true}"#);
        let key = public_key();
        let first = verifier.verify(br#"{"x":true}"#, &signature, &key);
        for _ in 0..3 {
            assert_eq!(verifier.verify(br#"{"x":true}"#, &signature, &key), first);
        }
    }

    #[test]
    fn test_canonicalization_parse() {
        assert_eq!("RAW".parse::<Canonicalization>().unwrap(), Canonicalization::Raw);
        assert!("sorted".parse::<Canonicalization>().is_err());
    }
}
