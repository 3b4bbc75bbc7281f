// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Security Configuration
//!
//! Environment-style settings for the request pipeline. Values are read through
//! a [`ConfigSource`] so startup code reads the process environment while tests
//! supply an in-memory map.
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `API_KEY` | yes | |
//! | `ELECTION_PUBLIC_KEY_BASE64` | yes (read by the key cache) | |
//! | `ELECTION_MGMT_PRIVATE_KEY_BASE64` | yes (read by the key cache) | |
//! | `GUARD_POLICY` | no | `api-key-signature` |
//! | `SIGNATURE_CANONICALIZATION` | no | `reserialized` |
//! | `BODY_LIMIT_BYTES` | no | 1 MiB |

use std::collections::HashMap;
use thiserror::Error;

use crate::domain::guard::{GuardPolicy, SharedSecret};
use crate::infrastructure::security::signature::Canonicalization;

pub const API_KEY_VAR: &str = "API_KEY";
pub const GUARD_POLICY_VAR: &str = "GUARD_POLICY";
pub const CANONICALIZATION_VAR: &str = "SIGNATURE_CANONICALIZATION";
pub const BODY_LIMIT_VAR: &str = "BODY_LIMIT_BYTES";

pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Lookup of environment-style configuration values by name.
pub trait ConfigSource: Send + Sync {
    /// Returns `None` when the name is unset or empty.
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).filter(|v| !v.is_empty()).cloned()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },
}

/// Non-key settings of the request pipeline.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub api_key: SharedSecret,
    pub guard_policy: GuardPolicy,
    pub canonicalization: Canonicalization,
    pub body_limit: usize,
}

impl SecurityConfig {
    pub fn from_source(source: &dyn ConfigSource) -> Result<Self, ConfigError> {
        let api_key = source
            .get(API_KEY_VAR)
            .and_then(SharedSecret::new)
            .ok_or_else(|| ConfigError::Missing(API_KEY_VAR.to_string()))?;

        let guard_policy = match source.get(GUARD_POLICY_VAR) {
            Some(raw) => raw.parse::<GuardPolicy>().map_err(|reason| ConfigError::Invalid {
                name: GUARD_POLICY_VAR.to_string(),
                reason,
            })?,
            None => GuardPolicy::default(),
        };

        let canonicalization = match source.get(CANONICALIZATION_VAR) {
            Some(raw) => raw.parse::<Canonicalization>().map_err(|reason| ConfigError::Invalid {
                name: CANONICALIZATION_VAR.to_string(),
                reason,
            })?,
            None => Canonicalization::default(),
        };

        let body_limit = match source.get(BODY_LIMIT_VAR) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                name: BODY_LIMIT_VAR.to_string(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_BODY_LIMIT,
        };

        Ok(Self {
            api_key,
            guard_policy,
            canonicalization,
            body_limit,
        })
    }
}
