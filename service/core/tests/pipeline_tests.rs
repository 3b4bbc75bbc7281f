// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use election_mgmt_core::infrastructure::config::SecurityConfig;
use election_mgmt_core::infrastructure::security::{EnvelopeSealer, KeyMaterialCache};
use election_mgmt_core::presentation::api::{app, secured, SecurityState};
use rand_core::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::pss::BlindedSigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

const SERVICE_PRIVATE_PEM: &str = include_str!("fixtures/service_private.pem");
const SERVICE_PUBLIC_PEM: &str = include_str!("fixtures/service_public.pem");
const COUNTERPART_PRIVATE_PEM: &str = include_str!("fixtures/counterpart_private.pem");
const COUNTERPART_PUBLIC_PEM: &str = include_str!("fixtures/counterpart_public.pem");
const ROGUE_PUBLIC_PEM: &str = include_str!("fixtures/rogue_public.pem");

const API_KEY: &str = "secret1";

fn environment(policy: &str) -> HashMap<String, String> {
    HashMap::from([
        ("API_KEY".to_string(), API_KEY.to_string()),
        ("GUARD_POLICY".to_string(), policy.to_string()),
        (
            "ELECTION_MGMT_PRIVATE_KEY_BASE64".to_string(),
            STANDARD.encode(SERVICE_PRIVATE_PEM),
        ),
        (
            "ELECTION_PUBLIC_KEY_BASE64".to_string(),
            STANDARD.encode(COUNTERPART_PUBLIC_PEM),
        ),
    ])
}

fn state(policy: &str) -> SecurityState {
    let env = environment(policy);
    let config = SecurityConfig::from_source(&env).unwrap();
    let keys = Arc::new(KeyMaterialCache::from_config(&env).unwrap());
    SecurityState::from_config(&config, keys)
}

fn seal_for(recipient_pem: &str, payload: &Value) -> String {
    EnvelopeSealer::new(
        RsaPublicKey::from_public_key_pem(recipient_pem).unwrap(),
        RsaPrivateKey::from_pkcs8_pem(COUNTERPART_PRIVATE_PEM).unwrap(),
    )
    .seal(payload)
    .unwrap()
    .into_inner()
}

fn sign(body: &[u8]) -> String {
    let key = RsaPrivateKey::from_pkcs8_pem(COUNTERPART_PRIVATE_PEM).unwrap();
    let signature = BlindedSigningKey::<Sha256>::new(key).sign_with_rng(&mut OsRng, body);
    STANDARD.encode(signature.to_bytes())
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn verify_request(headers: &[(&str, &str)], body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/envelope/verify")
        .header("content-type", "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn health_is_not_guarded() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(app(state("api-key")), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn signed_request_with_envelope_reaches_handler_with_payload() {
    let payload = json!({"electionId": "e-2026", "candidates": ["a", "b"]});
    let envelope = seal_for(SERVICE_PUBLIC_PEM, &payload);
    let body = r#"{"electionId":"e-2026"}"#;
    let signature = sign(body.as_bytes());

    let request = verify_request(
        &[
            ("x-api-key", API_KEY),
            ("x-signature", signature.as_str()),
            ("x-security-envelope", envelope.as_str()),
        ],
        body,
    );
    let (status, response) = send(app(state("api-key-signature")), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["verified"], true);
    assert_eq!(response["payload"], payload);
}

#[tokio::test]
async fn wrong_api_key_gets_generic_401() {
    let request = verify_request(&[("x-api-key", "secret2")], "{}");
    let (status, body) = send(app(state("api-key")), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "unauthorized", "message": "Access denied"}));
}

#[tokio::test]
async fn missing_bearer_token_is_rejected() {
    let envelope = seal_for(SERVICE_PUBLIC_PEM, &json!({}));
    let request = verify_request(
        &[("x-api-key", API_KEY), ("x-security-envelope", envelope.as_str())],
        "{}",
    );
    let (status, body) = send(app(state("api-key-bearer")), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Access denied");
}

#[tokio::test]
async fn tampered_body_is_rejected_before_unpacking() {
    let signature = sign(br#"{"seats":3}"#);
    let request = verify_request(
        &[("x-api-key", API_KEY), ("x-signature", signature.as_str())],
        r#"{"seats":30}"#,
    );
    let (status, _) = send(app(state("api-key-signature")), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admitted_request_without_envelope_is_400() {
    let request = verify_request(&[("x-api-key", API_KEY)], "{}");
    let (status, body) = send(app(state("api-key")), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing x-security-envelope header");
}

#[tokio::test]
async fn envelope_for_wrong_recipient_is_generic_400() {
    let envelope = seal_for(ROGUE_PUBLIC_PEM, &json!({"a": 1}));
    let request = verify_request(
        &[("x-api-key", API_KEY), ("x-security-envelope", envelope.as_str())],
        "{}",
    );
    let (status, body) = send(app(state("api-key")), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid or corrupted security envelope");
}

#[tokio::test]
async fn handler_sees_only_payload_and_no_envelope_header() {
    async fn inspect(headers: axum::http::HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        Json(json!({
            "body": body,
            "envelope_header_present": headers.contains_key("x-security-envelope"),
        }))
    }

    let router = secured(Router::new().route("/elections", post(inspect)), state("api-key"));
    let payload = json!({"name": "signed"});
    let envelope = seal_for(SERVICE_PUBLIC_PEM, &payload);
    let request = Request::builder()
        .method("POST")
        .uri("/elections")
        .header("x-api-key", API_KEY)
        .header("x-security-envelope", envelope.as_str())
        .body(Body::from(r#"{"name":"forged","role":"admin"}"#))
        .unwrap();

    let (status, body) = send(router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["body"], payload);
    assert_eq!(body["envelope_header_present"], false);
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let mut env = environment("api-key");
    env.insert("BODY_LIMIT_BYTES".to_string(), "16".to_string());
    let config = SecurityConfig::from_source(&env).unwrap();
    let keys = Arc::new(KeyMaterialCache::from_config(&env).unwrap());
    let state = SecurityState::from_config(&config, keys);

    let request = verify_request(&[("x-api-key", API_KEY)], &"x".repeat(64));
    let (status, _) = send(app(state), request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
