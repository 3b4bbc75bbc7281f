// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Key Material Descriptors
//!
//! Names and kinds of the long-lived RSA keys the service needs. The decoded
//! keys themselves live in
//! [`crate::infrastructure::security::key_cache::KeyMaterialCache`]; this module
//! stays free of `rsa` types.

use serde::{Deserialize, Serialize};

/// This service's own decryption key (PKCS#8 PEM, base64-encoded).
pub const SERVICE_PRIVATE_KEY_VAR: &str = "ELECTION_MGMT_PRIVATE_KEY_BASE64";

/// The counterpart's verification key (SPKI PEM, base64-encoded).
pub const COUNTERPART_PUBLIC_KEY_VAR: &str = "ELECTION_PUBLIC_KEY_BASE64";

/// Whether a key is held privately (decryption) or publicly (verification).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Private,
    Public,
}

impl KeyKind {
    /// The single algorithm a key of this kind may be used with.
    pub fn algorithm(self) -> KeyAlgorithm {
        match self {
            KeyKind::Private => KeyAlgorithm::RsaOaep256,
            KeyKind::Public => KeyAlgorithm::Ps256,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyKind::Private => "private",
            KeyKind::Public => "public",
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JOSE algorithm identifiers a loaded key is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// RSAES-OAEP with SHA-256 and MGF1-SHA-256 (confidentiality layer).
    #[serde(rename = "RSA-OAEP-256")]
    RsaOaep256,
    /// RSASSA-PSS with SHA-256, salt length 32 (integrity layer).
    #[serde(rename = "PS256")]
    Ps256,
}

impl KeyAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyAlgorithm::RsaOaep256 => "RSA-OAEP-256",
            KeyAlgorithm::Ps256 => "PS256",
        }
    }
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The keys that must be present before the service accepts connections.
pub fn required_keys() -> [(&'static str, KeyKind); 2] {
    [
        (SERVICE_PRIVATE_KEY_VAR, KeyKind::Private),
        (COUNTERPART_PUBLIC_KEY_VAR, KeyKind::Public),
    ]
}
