// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Message Transport
//!
//! Admission for JSON messages whose request headers travel inside the message
//! under `headers`:
//!
//! ```json
//! { "headers": { "x-api-key": "...", "x-security-envelope": "..." }, "...": "..." }
//! ```
//!
//! Admission checks the shared secret only, whatever policy the HTTP side runs:
//! a body signature would have to cover the `headers` object that carries it.
//! On success the entire message, `headers` included, is replaced by the
//! verified payload.

use serde_json::Value;
use tracing::error;

use super::api::{ApiError, SecurityState};
use crate::domain::request::RequestContext;

/// Guard and unpack one message. `pattern` names the message route and is used
/// as the audit path.
pub async fn admit_message(state: &SecurityState, pattern: &str, message: Value) -> Result<Value, ApiError> {
    let ctx = RequestContext::from_message(pattern, &message);
    let guard = state.message_guard.clone();
    let stage = state.injection.clone();

    tokio::task::spawn_blocking(move || -> Result<Value, ApiError> {
        let mut ctx = ctx;
        if !guard.check(&ctx).is_accepted() {
            return Err(ApiError::Unauthorized);
        }
        stage.inject(&mut ctx)?;
        ctx.into_json().map_err(|_| ApiError::InvalidEnvelope)
    })
    .await
    .map_err(|e| {
        error!("Message admission task failed: {}", e);
        ApiError::Internal
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{EnvelopeInjectionStage, RequestGuard};
    use crate::domain::guard::{GuardPolicy, SharedSecret};
    use crate::domain::key_material::{KeyKind, COUNTERPART_PUBLIC_KEY_VAR, SERVICE_PRIVATE_KEY_VAR};
    use crate::infrastructure::config::SecurityConfig;
    use crate::infrastructure::security::{
        Canonicalization, EnvelopeSealer, EnvelopeUnpacker, KeyMaterial, KeyMaterialCache,
    };
    use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
    use rsa::{RsaPrivateKey, RsaPublicKey};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    const SERVICE_PRIVATE_PEM: &str = include_str!("../../tests/fixtures/service_private.pem");
    const SERVICE_PUBLIC_PEM: &str = include_str!("../../tests/fixtures/service_public.pem");
    const COUNTERPART_PRIVATE_PEM: &str = include_str!("../../tests/fixtures/counterpart_private.pem");
    const COUNTERPART_PUBLIC_PEM: &str = include_str!("../../tests/fixtures/counterpart_public.pem");

    fn keys() -> Arc<KeyMaterialCache> {
        Arc::new(KeyMaterialCache::from_keys([
            KeyMaterial::from_pem(SERVICE_PRIVATE_KEY_VAR, KeyKind::Private, SERVICE_PRIVATE_PEM).unwrap(),
            KeyMaterial::from_pem(COUNTERPART_PUBLIC_KEY_VAR, KeyKind::Public, COUNTERPART_PUBLIC_PEM).unwrap(),
        ]))
    }

    fn state() -> SecurityState {
        let keys = keys();
        let guard = RequestGuard::new(
            GuardPolicy::ApiKey,
            SharedSecret::new("secret1").unwrap(),
            keys.clone(),
            Canonicalization::Reserialized,
        );
        SecurityState::new(guard, EnvelopeInjectionStage::new(EnvelopeUnpacker::new(keys)), 1024)
    }

    fn seal(payload: &Value) -> String {
        EnvelopeSealer::new(
            RsaPublicKey::from_public_key_pem(SERVICE_PUBLIC_PEM).unwrap(),
            RsaPrivateKey::from_pkcs8_pem(COUNTERPART_PRIVATE_PEM).unwrap(),
        )
        .seal(payload)
        .unwrap()
        .into_inner()
    }

    #[tokio::test]
    async fn test_message_is_replaced_by_payload() {
        let payload = json!({"electionId": "e-9", "status": "open"});
        let message = json!({
            "headers": {"x-api-key": "secret1", "x-security-envelope": seal(&payload)},
            "electionId": "forged"
        });
        let admitted = admit_message(&state(), "election.update", message).await.unwrap();
        assert_eq!(admitted, payload);
    }

    #[tokio::test]
    async fn test_message_with_wrong_key_is_unauthorized() {
        let message = json!({"headers": {"x-api-key": "nope"}});
        assert_eq!(
            admit_message(&state(), "election.update", message).await,
            Err(ApiError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn test_message_without_headers_is_unauthorized() {
        let message = json!({"electionId": "e-1"});
        assert_eq!(
            admit_message(&state(), "election.update", message).await,
            Err(ApiError::Unauthorized)
        );
    }

    #[tokio::test]
    async fn test_message_without_envelope_is_bad_request() {
        let message = json!({"headers": {"x-api-key": "secret1"}});
        assert_eq!(
            admit_message(&state(), "election.update", message).await,
            Err(ApiError::MissingEnvelope)
        );
    }

    #[tokio::test]
    async fn test_messages_are_admitted_under_default_http_policy() {
        let env = HashMap::from([("API_KEY".to_string(), "secret1".to_string())]);
        let config = SecurityConfig::from_source(&env).unwrap();
        assert_eq!(config.guard_policy, GuardPolicy::ApiKeyAndSignature);
        let state = SecurityState::from_config(&config, keys());

        let payload = json!({"electionId": "e-3"});
        let message = json!({
            "headers": {
                "x-api-key": "secret1",
                "x-signature": "c2lnbmVkIGJlZm9yZSB0aGUgaGVhZGVyIHdhcyBhZGRlZA==",
                "x-security-envelope": seal(&payload)
            }
        });
        let admitted = admit_message(&state, "election.update", message).await.unwrap();
        assert_eq!(admitted, payload);

        let wrong_key = json!({"headers": {"x-api-key": "nope"}});
        assert_eq!(
            admit_message(&state, "election.update", wrong_key).await,
            Err(ApiError::Unauthorized)
        );
    }
}
