// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Key Material Cache
//!
//! Loads the service's RSA keys once at startup and hands them out read-only
//! for the rest of the process lifetime.
//!
//! ```text
//! ELECTION_MGMT_PRIVATE_KEY_BASE64 ──base64──► PKCS#8 PEM ──► RsaPrivateKey (RSA-OAEP-256)
//! ELECTION_PUBLIC_KEY_BASE64       ──base64──► SPKI PEM   ──► RsaPublicKey  (PS256)
//! ```
//!
//! The cache is built through [`KeyMaterialCacheBuilder`] and is immutable
//! afterwards; share it with `Arc`. A missing or malformed key is a startup
//! failure and the process must not serve traffic.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, info};

use crate::domain::key_material::{required_keys, KeyAlgorithm, KeyKind};
use crate::infrastructure::config::ConfigSource;

#[derive(Debug, Error)]
pub enum KeyError {
    /// The named variable is unset. Fatal at startup.
    #[error("Missing required environment variable: {0}")]
    Configuration(String),

    /// The variable is set but does not hold a usable key. Fatal at startup.
    #[error("Invalid {kind} key format in {name}: {reason}")]
    Import {
        name: String,
        kind: KeyKind,
        reason: String,
    },

    /// `get` was called for a key that was never loaded.
    #[error("Key {0} was never loaded")]
    NotFound(String),

    #[error("Key {name} is a {actual} key, expected a {expected} key")]
    KindMismatch {
        name: String,
        expected: KeyKind,
        actual: KeyKind,
    },
}

enum DecodedKey {
    Private(RsaPrivateKey),
    Public(RsaPublicKey),
}

/// One named, decoded key bound to a single algorithm.
pub struct KeyMaterial {
    name: String,
    algorithm: KeyAlgorithm,
    key: DecodedKey,
}

impl KeyMaterial {
    /// Import a key from PEM text: PKCS#8 for `Private`, SPKI for `Public`.
    pub fn from_pem(name: &str, kind: KeyKind, pem: &str) -> Result<Self, KeyError> {
        let import_error = |reason: String| KeyError::Import {
            name: name.to_string(),
            kind,
            reason,
        };

        let key = match kind {
            KeyKind::Private => DecodedKey::Private(
                RsaPrivateKey::from_pkcs8_pem(pem.trim()).map_err(|e| import_error(e.to_string()))?,
            ),
            KeyKind::Public => DecodedKey::Public(
                RsaPublicKey::from_public_key_pem(pem.trim())
                    .map_err(|e| import_error(e.to_string()))?,
            ),
        };

        Ok(Self {
            name: name.to_string(),
            algorithm: kind.algorithm(),
            key,
        })
    }

    /// Import a key from base64-encoded PEM text. Whitespace inside the
    /// base64 is ignored.
    pub fn from_base64(name: &str, kind: KeyKind, encoded: &str) -> Result<Self, KeyError> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let decoded = STANDARD.decode(compact).map_err(|e| KeyError::Import {
            name: name.to_string(),
            kind,
            reason: format!("invalid base64: {}", e),
        })?;
        let pem = String::from_utf8(decoded).map_err(|e| KeyError::Import {
            name: name.to_string(),
            kind,
            reason: format!("decoded key is not UTF-8: {}", e),
        })?;
        Self::from_pem(name, kind, &pem)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> KeyKind {
        match self.key {
            DecodedKey::Private(_) => KeyKind::Private,
            DecodedKey::Public(_) => KeyKind::Public,
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Modulus size in bits.
    pub fn bits(&self) -> usize {
        match &self.key {
            DecodedKey::Private(k) => k.size() * 8,
            DecodedKey::Public(k) => k.size() * 8,
        }
    }

    pub fn private_key(&self) -> Result<&RsaPrivateKey, KeyError> {
        match &self.key {
            DecodedKey::Private(k) => Ok(k),
            DecodedKey::Public(_) => Err(self.mismatch(KeyKind::Private)),
        }
    }

    pub fn public_key(&self) -> Result<&RsaPublicKey, KeyError> {
        match &self.key {
            DecodedKey::Public(k) => Ok(k),
            DecodedKey::Private(_) => Err(self.mismatch(KeyKind::Public)),
        }
    }

    fn mismatch(&self, expected: KeyKind) -> KeyError {
        KeyError::KindMismatch {
            name: self.name.clone(),
            expected,
            actual: self.kind(),
        }
    }
}

// Key bytes never appear in Debug output.
impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("algorithm", &self.algorithm)
            .field("bits", &self.bits())
            .finish()
    }
}

/// Immutable set of decoded keys, keyed by their source variable name.
#[derive(Debug)]
pub struct KeyMaterialCache {
    keys: HashMap<String, KeyMaterial>,
}

impl KeyMaterialCache {
    pub fn builder(source: &dyn ConfigSource) -> KeyMaterialCacheBuilder<'_> {
        KeyMaterialCacheBuilder {
            source,
            keys: HashMap::new(),
        }
    }

    /// Load every key the pipeline needs.
    pub fn from_config(source: &dyn ConfigSource) -> Result<Self, KeyError> {
        let mut builder = Self::builder(source);
        for (name, kind) in required_keys() {
            builder = builder.load(name, kind).inspect_err(|e| {
                error!("Failed to load cryptographic keys: {}", e);
            })?;
        }
        info!("Cryptographic keys loaded and cached successfully");
        Ok(builder.build())
    }

    /// Build a cache from already-imported keys.
    pub fn from_keys(keys: impl IntoIterator<Item = KeyMaterial>) -> Self {
        Self {
            keys: keys
                .into_iter()
                .map(|k| (k.name.clone(), k))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Result<&KeyMaterial, KeyError> {
        self.keys
            .get(name)
            .ok_or_else(|| KeyError::NotFound(name.to_string()))
    }

    pub fn private_key(&self, name: &str) -> Result<&RsaPrivateKey, KeyError> {
        self.get(name)?.private_key()
    }

    pub fn public_key(&self, name: &str) -> Result<&RsaPublicKey, KeyError> {
        self.get(name)?.public_key()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyMaterial> {
        self.keys.values()
    }
}

/// Startup-only loader. Consumed by [`KeyMaterialCacheBuilder::build`].
pub struct KeyMaterialCacheBuilder<'a> {
    source: &'a dyn ConfigSource,
    keys: HashMap<String, KeyMaterial>,
}

impl KeyMaterialCacheBuilder<'_> {
    /// Read `name` from the configuration source and import it as `kind`.
    pub fn load(mut self, name: &str, kind: KeyKind) -> Result<Self, KeyError> {
        let encoded = self
            .source
            .get(name)
            .ok_or_else(|| KeyError::Configuration(name.to_string()))?;

        let material = KeyMaterial::from_base64(name, kind, &encoded)?;
        info!(
            key = name,
            kind = %kind,
            algorithm = %material.algorithm(),
            bits = material.bits(),
            "Key cached successfully"
        );
        self.keys.insert(name.to_string(), material);
        Ok(self)
    }

    pub fn build(self) -> KeyMaterialCache {
        KeyMaterialCache { keys: self.keys }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::key_material::{COUNTERPART_PUBLIC_KEY_VAR, SERVICE_PRIVATE_KEY_VAR};

    const SERVICE_PRIVATE_PEM: &str = include_str!("../../../tests/fixtures/service_private.pem");
    const COUNTERPART_PUBLIC_PEM: &str = include_str!("../../../tests/fixtures/counterpart_public.pem");

    fn env_with(pairs: &[(&str, String)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn full_env() -> HashMap<String, String> {
        env_with(&[
            (SERVICE_PRIVATE_KEY_VAR, STANDARD.encode(SERVICE_PRIVATE_PEM)),
            (COUNTERPART_PUBLIC_KEY_VAR, STANDARD.encode(COUNTERPART_PUBLIC_PEM)),
        ])
    }

    #[test]
    fn test_from_config_loads_both_keys() {
        let cache = KeyMaterialCache::from_config(&full_env()).unwrap();
        assert_eq!(cache.len(), 2);

        let private = cache.get(SERVICE_PRIVATE_KEY_VAR).unwrap();
        assert_eq!(private.kind(), KeyKind::Private);
        assert_eq!(private.algorithm(), KeyAlgorithm::RsaOaep256);
        assert_eq!(private.bits(), 2048);

        let public = cache.get(COUNTERPART_PUBLIC_KEY_VAR).unwrap();
        assert_eq!(public.algorithm(), KeyAlgorithm::Ps256);
        assert!(cache.public_key(COUNTERPART_PUBLIC_KEY_VAR).is_ok());
    }

    #[test]
    fn test_missing_variable_is_configuration_error() {
        let env = env_with(&[(SERVICE_PRIVATE_KEY_VAR, STANDARD.encode(SERVICE_PRIVATE_PEM))]);
        let err = KeyMaterialCache::from_config(&env).unwrap_err();
        assert!(matches!(err, KeyError::Configuration(ref n) if n == COUNTERPART_PUBLIC_KEY_VAR));
    }

    #[test]
    fn test_invalid_base64_is_import_error() {
        let mut env = full_env();
        env.insert(SERVICE_PRIVATE_KEY_VAR.to_string(), "not*base64".to_string());
        let err = KeyMaterialCache::from_config(&env).unwrap_err();
        assert!(matches!(err, KeyError::Import { kind: KeyKind::Private, .. }));
    }

    #[test]
    fn test_public_pem_under_private_name_is_import_error() {
        let mut env = full_env();
        env.insert(
            SERVICE_PRIVATE_KEY_VAR.to_string(),
            STANDARD.encode(COUNTERPART_PUBLIC_PEM),
        );
        assert!(matches!(
            KeyMaterialCache::from_config(&env),
            Err(KeyError::Import { .. })
        ));
    }

    #[test]
    fn test_wrapped_base64_is_accepted() {
        let encoded = STANDARD.encode(COUNTERPART_PUBLIC_PEM);
        let wrapped: String = encoded
            .as_bytes()
            .chunks(64)
            .map(|c| format!("{}\n", std::str::from_utf8(c).unwrap()))
            .collect();
        assert!(KeyMaterial::from_base64("k", KeyKind::Public, &wrapped).is_ok());
    }

    #[test]
    fn test_get_unknown_key_is_not_found() {
        let cache = KeyMaterialCache::from_config(&full_env()).unwrap();
        assert!(matches!(cache.get("OTHER_KEY"), Err(KeyError::NotFound(_))));
    }

    #[test]
    fn test_kind_mismatch_is_reported() {
        let cache = KeyMaterialCache::from_config(&full_env()).unwrap();
        let err = cache.private_key(COUNTERPART_PUBLIC_KEY_VAR).unwrap_err();
        assert!(matches!(
            err,
            KeyError::KindMismatch { expected: KeyKind::Private, actual: KeyKind::Public, .. }
        ));
    }

    #[test]
    fn test_debug_output_has_no_key_bytes() {
        let key = KeyMaterial::from_pem("k", KeyKind::Private, SERVICE_PRIVATE_PEM).unwrap();
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("RsaOaep256"));
        assert!(!rendered.contains("MII"));
    }
}
