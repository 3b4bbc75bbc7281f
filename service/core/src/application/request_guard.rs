// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Request Guard
//!
//! Admission control evaluated before any handler or envelope work.
//!
//! | Policy | Checks, in order |
//! |--------|------------------|
//! | `ApiKey` | `x-api-key` equals the configured secret |
//! | `ApiKeyAndBearerToken` | shared secret, then `x-internal-token` is an RS256 JWT from the counterpart |
//! | `ApiKeyAndSignature` | shared secret, then `x-signature` verifies over the body |
//!
//! The first failing check decides the [`RejectionReason`]. The reason is
//! written to the audit log; callers only ever see a generic denial.
//!
//! Messages carry their headers inside the signed body, so the message
//! transport always admits with `ApiKey` (see [`RequestGuard::for_messages`]).

use std::sync::Arc;

use crate::domain::guard::{
    GuardOutcome, GuardPolicy, Rejection, RejectionReason, SharedSecret, API_KEY_HEADER,
    BEARER_TOKEN_HEADER, SIGNATURE_HEADER,
};
use crate::domain::key_material::COUNTERPART_PUBLIC_KEY_VAR;
use crate::domain::request::RequestContext;
use crate::infrastructure::security::{
    BearerTokenVerifier, Canonicalization, GuardAuditLogger, KeyMaterialCache, SignatureError,
    SignatureVerifier,
};

#[derive(Clone)]
pub struct RequestGuard {
    policy: GuardPolicy,
    api_key: SharedSecret,
    keys: Arc<KeyMaterialCache>,
    signature_verifier: SignatureVerifier,
    token_verifier: BearerTokenVerifier,
    audit: GuardAuditLogger,
}

impl RequestGuard {
    pub fn new(
        policy: GuardPolicy,
        api_key: SharedSecret,
        keys: Arc<KeyMaterialCache>,
        canonicalization: Canonicalization,
    ) -> Self {
        Self {
            policy,
            api_key,
            keys,
            signature_verifier: SignatureVerifier::new(canonicalization),
            token_verifier: BearerTokenVerifier::new(),
            audit: GuardAuditLogger::new(),
        }
    }

    pub fn policy(&self) -> GuardPolicy {
        self.policy
    }

    /// Same secret and keys, shared-secret check only.
    pub fn for_messages(&self) -> Self {
        Self {
            policy: GuardPolicy::ApiKey,
            ..self.clone()
        }
    }

    /// Evaluate the configured policy and audit the decision.
    ///
    /// Performs RSA work for the bearer and signature policies; async callers
    /// should run it on the blocking pool.
    pub fn check(&self, ctx: &RequestContext) -> GuardOutcome {
        match self.evaluate(ctx) {
            Ok(()) => {
                self.audit.record_admission(self.policy, ctx.audit());
                GuardOutcome::Accepted
            }
            Err(reason) => {
                let rejection = Rejection {
                    policy: self.policy,
                    reason,
                };
                self.audit.record_rejection(&rejection, ctx.audit());
                GuardOutcome::Rejected(rejection)
            }
        }
    }

    fn evaluate(&self, ctx: &RequestContext) -> Result<(), RejectionReason> {
        self.check_api_key(ctx)?;
        match self.policy {
            GuardPolicy::ApiKey => Ok(()),
            GuardPolicy::ApiKeyAndBearerToken => self.check_bearer_token(ctx),
            GuardPolicy::ApiKeyAndSignature => self.check_signature(ctx),
        }
    }

    fn check_api_key(&self, ctx: &RequestContext) -> Result<(), RejectionReason> {
        let presented = ctx
            .header(API_KEY_HEADER)
            .filter(|v| !v.is_empty())
            .ok_or(RejectionReason::MissingApiKey)?;
        if self.api_key.matches(presented) {
            Ok(())
        } else {
            Err(RejectionReason::InvalidApiKey)
        }
    }

    fn check_bearer_token(&self, ctx: &RequestContext) -> Result<(), RejectionReason> {
        let token = ctx
            .header(BEARER_TOKEN_HEADER)
            .filter(|v| !v.trim().is_empty())
            .ok_or(RejectionReason::MissingBearerToken)?;
        let public_key = self
            .keys
            .public_key(COUNTERPART_PUBLIC_KEY_VAR)
            .map_err(|e| RejectionReason::KeyUnavailable(e.to_string()))?;
        self.token_verifier
            .verify(token, public_key)
            .map_err(|e| RejectionReason::InvalidBearerToken(e.to_string()))
    }

    fn check_signature(&self, ctx: &RequestContext) -> Result<(), RejectionReason> {
        let signature = ctx
            .header(SIGNATURE_HEADER)
            .filter(|v| !v.trim().is_empty())
            .ok_or(RejectionReason::MissingSignature)?;
        let public_key = self
            .keys
            .public_key(COUNTERPART_PUBLIC_KEY_VAR)
            .map_err(|e| RejectionReason::KeyUnavailable(e.to_string()))?;

        match self
            .signature_verifier
            .verify(&ctx.body_bytes(), signature, public_key)
        {
            Ok(true) => Ok(()),
            Ok(false) => Err(RejectionReason::SignatureMismatch),
            Err(SignatureError::MalformedSignature(e)) => Err(RejectionReason::MalformedSignature(e)),
            Err(SignatureError::MalformedBody(e)) => Err(RejectionReason::MalformedBody(e)),
        }
    }
}

impl std::fmt::Debug for RequestGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGuard")
            .field("policy", &self.policy)
            .field("canonicalization", &self.signature_verifier.canonicalization())
            .finish_non_exhaustive()
    }
}
