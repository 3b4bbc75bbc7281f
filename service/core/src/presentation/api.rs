// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # HTTP Surface
//!
//! Axum middleware that puts the request pipeline in front of any router:
//!
//! ```text
//! request
//!   └─ enforce_guard     RequestGuard::check            (401 on rejection)
//!   └─ inject_envelope   EnvelopeInjectionStage::inject (400 on envelope errors)
//!   └─ handler           body == verified payload, application/json
//! ```
//!
//! RSA work runs on the blocking pool. The guard hands its admitted
//! [`RequestContext`] to the injection middleware as a request extension; a
//! request that reaches injection without one is rejected.

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, OriginalUri, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{from_fn_with_state, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use http_body_util::LengthLimitError;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::application::{EnvelopeInjectionStage, InjectionError, RequestGuard};
use crate::domain::envelope::ENVELOPE_HEADER;
use crate::domain::request::{AuditContext, RequestContext};
use crate::infrastructure::config::SecurityConfig;
use crate::infrastructure::security::{EnvelopeUnpacker, KeyMaterialCache};

/// Shared state of the security middleware.
#[derive(Debug, Clone)]
pub struct SecurityState {
    pub guard: Arc<RequestGuard>,
    /// Shared-secret guard for the message transport.
    pub message_guard: Arc<RequestGuard>,
    pub injection: Arc<EnvelopeInjectionStage>,
    pub body_limit: usize,
}

impl SecurityState {
    pub fn new(guard: RequestGuard, injection: EnvelopeInjectionStage, body_limit: usize) -> Self {
        Self {
            message_guard: Arc::new(guard.for_messages()),
            guard: Arc::new(guard),
            injection: Arc::new(injection),
            body_limit,
        }
    }

    pub fn from_config(config: &SecurityConfig, keys: Arc<KeyMaterialCache>) -> Self {
        let guard = RequestGuard::new(
            config.guard_policy,
            config.api_key.clone(),
            keys.clone(),
            config.canonicalization,
        );
        let injection = EnvelopeInjectionStage::new(EnvelopeUnpacker::new(keys));
        Self::new(guard, injection, config.body_limit)
    }
}

/// Marker extension set by [`enforce_guard`] on admitted requests.
#[derive(Debug, Clone)]
pub struct AdmittedRequest(pub RequestContext);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    Unauthorized,
    MissingEnvelope,
    InvalidEnvelope,
    MalformedBody,
    PayloadTooLarge,
    Internal,
}

impl ApiError {
    pub fn status(self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::MissingEnvelope | ApiError::InvalidEnvelope | ApiError::MalformedBody => {
                StatusCode::BAD_REQUEST
            }
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(self) -> Value {
        let (error, message) = match self {
            ApiError::Unauthorized => ("unauthorized", "Access denied"),
            ApiError::MissingEnvelope => ("bad_request", "Missing x-security-envelope header"),
            ApiError::InvalidEnvelope => ("bad_request", "Invalid or corrupted security envelope"),
            ApiError::MalformedBody => ("bad_request", "Request body could not be read"),
            ApiError::PayloadTooLarge => ("payload_too_large", "Request body too large"),
            ApiError::Internal => ("internal_error", "Internal server error"),
        };
        json!({ "error": error, "message": message })
    }
}

impl From<InjectionError> for ApiError {
    fn from(e: InjectionError) -> Self {
        match e {
            InjectionError::MissingEnvelope => ApiError::MissingEnvelope,
            InjectionError::InvalidEnvelope(_) => ApiError::InvalidEnvelope,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// 413 when the limit was hit, 400 for any other body read failure.
fn body_read_error(e: axum::Error) -> ApiError {
    let root: &(dyn std::error::Error + 'static) = &e;
    let mut cause = Some(root);
    while let Some(err) = cause {
        if err.is::<LengthLimitError>() {
            return ApiError::PayloadTooLarge;
        }
        cause = err.source();
    }
    ApiError::MalformedBody
}

fn request_context(request_parts: &axum::http::request::Parts, body: Vec<u8>) -> RequestContext {
    let audit = AuditContext {
        method: request_parts.method.to_string(),
        path: request_parts
            .extensions
            .get::<OriginalUri>()
            .map(|OriginalUri(uri)| uri.path())
            .unwrap_or_else(|| request_parts.uri.path())
            .to_string(),
        caller: request_parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip()),
    };
    let headers = request_parts
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v.to_string())));
    RequestContext::new(audit, headers, body)
}

/// Admission middleware. Buffers the body so signatures can be checked over it.
pub async fn enforce_guard(
    State(state): State<SecurityState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, body) = request.into_parts();
    let bytes = to_bytes(body, state.body_limit).await.map_err(body_read_error)?;

    let ctx = request_context(&parts, bytes.to_vec());
    let guard = state.guard.clone();
    let (ctx, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = guard.check(&ctx);
        (ctx, outcome)
    })
    .await
    .map_err(|e| {
        error!("Guard task failed: {}", e);
        ApiError::Internal
    })?;

    if !outcome.is_accepted() {
        return Err(ApiError::Unauthorized);
    }

    parts.extensions.insert(AdmittedRequest(ctx));
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

/// Injection middleware. Must sit inside [`enforce_guard`].
pub async fn inject_envelope(
    State(state): State<SecurityState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (mut parts, _received) = request.into_parts();
    let AdmittedRequest(mut ctx) = parts
        .extensions
        .remove::<AdmittedRequest>()
        .ok_or(ApiError::Unauthorized)?;

    let stage = state.injection.clone();
    let (ctx, result) = tokio::task::spawn_blocking(move || {
        let result = stage.inject(&mut ctx);
        (ctx, result)
    })
    .await
    .map_err(|e| {
        error!("Envelope task failed: {}", e);
        ApiError::Internal
    })?;
    result?;

    parts.headers.remove(ENVELOPE_HEADER);
    parts.headers.remove(header::CONTENT_LENGTH);
    parts
        .headers
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let body = Body::from(ctx.into_body_bytes());
    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Wrap `router` so every route passes the guard and then envelope injection.
pub fn secured(router: Router, state: SecurityState) -> Router {
    router
        .layer(from_fn_with_state(state.clone(), inject_envelope))
        .layer(from_fn_with_state(state, enforce_guard))
}

/// Service router: unguarded health check plus the secured API.
pub fn app(state: SecurityState) -> Router {
    let api = Router::new().route("/v1/envelope/verify", post(verify_envelope));

    Router::new()
        .route("/health", get(health))
        .nest("/api", secured(api, state))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Echo the verified payload back to the counterpart.
async fn verify_envelope(Json(payload): Json<Value>) -> Json<Value> {
    Json(json!({ "verified": true, "payload": payload }))
}
