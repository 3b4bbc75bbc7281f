// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Guard Audit Logger
//!
//! Emits one structured record per admission decision and per envelope
//! failure, and counts them.
//!
//! ## Records
//!
//! | Event | Level |
//! |-------|-------|
//! | Admission | `info` |
//! | Rejection, no valid shared secret | `warn` |
//! | Rejection, identity or integrity proof failed | `error` |
//! | Missing or invalid envelope | `warn` |
//!
//! Every record carries `method`, `path` and `caller_ip`. Credentials, key
//! material and payloads are never written.
//!
//! ## Metrics
//!
//! - `election_mgmt_guard_decisions_total{policy, outcome, reason}`
//! - `election_mgmt_envelope_failures_total{reason}`

use metrics::counter;
use tracing::{error, info, warn};

use crate::domain::guard::{GuardPolicy, Rejection, RejectionClass};
use crate::domain::request::AuditContext;

pub const GUARD_DECISIONS_METRIC: &str = "election_mgmt_guard_decisions_total";
pub const ENVELOPE_FAILURES_METRIC: &str = "election_mgmt_envelope_failures_total";

/// Writes guard and envelope decisions to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardAuditLogger;

impl GuardAuditLogger {
    pub fn new() -> Self {
        Self
    }

    pub fn record_admission(&self, policy: GuardPolicy, ctx: &AuditContext) {
        info!(
            policy = %policy,
            method = %ctx.method,
            path = %ctx.path,
            caller_ip = %ctx.caller_display(),
            "[ACCESS GRANTED] request admitted"
        );
        counter!(GUARD_DECISIONS_METRIC,
            "policy" => policy.as_str(),
            "outcome" => "accepted",
            "reason" => "none"
        )
        .increment(1);
    }

    pub fn record_rejection(&self, rejection: &Rejection, ctx: &AuditContext) {
        let caller_ip = ctx.caller_display();
        match rejection.reason.class() {
            RejectionClass::Unauthenticated => warn!(
                policy = %rejection.policy,
                method = %ctx.method,
                path = %ctx.path,
                caller_ip = %caller_ip,
                reason = %rejection.reason,
                "[ACCESS DENIED] unauthenticated request"
            ),
            RejectionClass::Unauthorized => error!(
                policy = %rejection.policy,
                method = %ctx.method,
                path = %ctx.path,
                caller_ip = %caller_ip,
                reason = %rejection.reason,
                "[ACCESS DENIED] unauthorized request"
            ),
        }
        counter!(GUARD_DECISIONS_METRIC,
            "policy" => rejection.policy.as_str(),
            "outcome" => "rejected",
            "reason" => rejection.reason.code()
        )
        .increment(1);
    }

    /// `reason` is a stable label such as `missing` or `invalid`.
    pub fn record_envelope_failure(&self, reason: &'static str, ctx: &AuditContext) {
        warn!(
            method = %ctx.method,
            path = %ctx.path,
            caller_ip = %ctx.caller_display(),
            reason,
            "Security envelope not accepted"
        );
        counter!(ENVELOPE_FAILURES_METRIC, "reason" => reason).increment(1);
    }
}
