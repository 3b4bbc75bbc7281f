// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Compact JOSE Serialization
//!
//! The subset of JWE and JWS the security envelope uses.
//!
//! - **JWE**: `alg` = `RSA-OAEP-256`, `enc` = `A128GCM` | `A192GCM` |
//!   `A256GCM` | `A128CBC-HS256` | `A192CBC-HS384` | `A256CBC-HS512`. The
//!   content encryption key is unwrapped with the service private key; the
//!   ASCII protected header segment is the associated data. The CBC-HS family
//!   follows RFC 7518 §5.2 (MAC key first, then encryption key).
//! - **JWS**: `alg` = `PS256` (RSASSA-PSS, SHA-256, salt length 32). The
//!   signing input is `<header>.<payload>` as ASCII.
//!
//! Compression (`zip`) and critical extensions (`crit`) are not supported and
//! are rejected.

use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::aes::{Aes128, Aes192, Aes256};
use aes_gcm::{Aes128Gcm, Aes256Gcm, AesGcm};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use rsa::pss::BlindedSigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use thiserror::Error;

use crate::domain::key_material::KeyAlgorithm;
use crate::infrastructure::security::signature::verify_pss_sha256;

type Aes192Gcm = AesGcm<Aes192, U12>;

const GCM_IV_LEN: usize = 12;
const GCM_TAG_LEN: usize = 16;
const CBC_IV_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoseError {
    #[error("malformed compact serialization: {0}")]
    Malformed(String),

    #[error("unsupported header: {0}")]
    Unsupported(String),

    #[error("content encryption key could not be unwrapped")]
    KeyUnwrap,

    #[error("content decryption failed")]
    ContentDecryption,

    #[error("signature verification failed")]
    BadSignature,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

/// Content encryption algorithms accepted in the JWE `enc` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentEncryption {
    A128Gcm,
    A192Gcm,
    #[default]
    A256Gcm,
    A128CbcHs256,
    A192CbcHs384,
    A256CbcHs512,
}

impl ContentEncryption {
    pub const ALL: [ContentEncryption; 6] = [
        ContentEncryption::A128Gcm,
        ContentEncryption::A192Gcm,
        ContentEncryption::A256Gcm,
        ContentEncryption::A128CbcHs256,
        ContentEncryption::A192CbcHs384,
        ContentEncryption::A256CbcHs512,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentEncryption::A128Gcm => "A128GCM",
            ContentEncryption::A192Gcm => "A192GCM",
            ContentEncryption::A256Gcm => "A256GCM",
            ContentEncryption::A128CbcHs256 => "A128CBC-HS256",
            ContentEncryption::A192CbcHs384 => "A192CBC-HS384",
            ContentEncryption::A256CbcHs512 => "A256CBC-HS512",
        }
    }

    fn from_header(enc: &str) -> Result<Self, JoseError> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == enc)
            .ok_or_else(|| JoseError::Unsupported(format!("enc {}", enc)))
    }

    /// Content encryption key length in bytes. For CBC-HS this is the MAC key
    /// and the AES key together.
    fn key_len(self) -> usize {
        match self {
            ContentEncryption::A128Gcm => 16,
            ContentEncryption::A192Gcm => 24,
            ContentEncryption::A256Gcm => 32,
            ContentEncryption::A128CbcHs256 => 32,
            ContentEncryption::A192CbcHs384 => 48,
            ContentEncryption::A256CbcHs512 => 64,
        }
    }

    fn iv_len(self) -> usize {
        if self.is_gcm() {
            GCM_IV_LEN
        } else {
            CBC_IV_LEN
        }
    }

    fn tag_len(self) -> usize {
        if self.is_gcm() {
            GCM_TAG_LEN
        } else {
            self.key_len() / 2
        }
    }

    fn is_gcm(self) -> bool {
        matches!(
            self,
            ContentEncryption::A128Gcm | ContentEncryption::A192Gcm | ContentEncryption::A256Gcm
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ProtectedHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    crit: Option<Vec<String>>,
}

impl ProtectedHeader {
    fn parse(segment: &str) -> Result<Self, JoseError> {
        let bytes = decode_segment("protected header", segment)?;
        let header: ProtectedHeader = serde_json::from_slice(&bytes)
            .map_err(|e| JoseError::Malformed(format!("protected header: {}", e)))?;
        if header.zip.is_some() {
            return Err(JoseError::Unsupported("zip".to_string()));
        }
        if header.crit.is_some() {
            return Err(JoseError::Unsupported("crit".to_string()));
        }
        Ok(header)
    }

    fn encode(&self) -> Result<String, JoseError> {
        let json = serde_json::to_vec(self).map_err(|e| JoseError::Malformed(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }
}

fn decode_segment(what: &str, segment: &str) -> Result<Vec<u8>, JoseError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| JoseError::Malformed(format!("{}: {}", what, e)))
}

/// Decrypt a compact JWE with the recipient's private key.
pub fn decrypt_compact(jwe: &str, private_key: &RsaPrivateKey) -> Result<Vec<u8>, JoseError> {
    let parts: Vec<&str> = jwe.split('.').collect();
    let [header_b64, encrypted_key_b64, iv_b64, ciphertext_b64, tag_b64] = parts[..] else {
        return Err(JoseError::Malformed(format!(
            "JWE must have 5 segments, found {}",
            parts.len()
        )));
    };

    let header = ProtectedHeader::parse(header_b64)?;
    if header.alg != KeyAlgorithm::RsaOaep256.as_str() {
        return Err(JoseError::Unsupported(format!("alg {}", header.alg)));
    }
    let enc = ContentEncryption::from_header(
        header
            .enc
            .as_deref()
            .ok_or_else(|| JoseError::Malformed("missing enc".to_string()))?,
    )?;

    let encrypted_key = decode_segment("encrypted key", encrypted_key_b64)?;
    let iv = decode_segment("iv", iv_b64)?;
    let ciphertext = decode_segment("ciphertext", ciphertext_b64)?;
    let tag = decode_segment("tag", tag_b64)?;

    if iv.len() != enc.iv_len() {
        return Err(JoseError::Malformed(format!("iv must be {} bytes", enc.iv_len())));
    }
    if tag.len() != enc.tag_len() {
        return Err(JoseError::Malformed(format!("tag must be {} bytes", enc.tag_len())));
    }

    let cek = private_key
        .decrypt_blinded(&mut OsRng, Oaep::new::<Sha256>(), &encrypted_key)
        .map_err(|_| JoseError::KeyUnwrap)?;
    if cek.len() != enc.key_len() {
        return Err(JoseError::KeyUnwrap);
    }

    open_content(enc, &cek, &iv, header_b64.as_bytes(), &ciphertext, &tag)
}

fn open_content(
    enc: ContentEncryption,
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, JoseError> {
    let (mac_key, enc_key) = cek.split_at(cek.len() / 2);
    match enc {
        ContentEncryption::A128Gcm => gcm_decrypt::<Aes128Gcm>(cek, iv, aad, ciphertext, tag),
        ContentEncryption::A192Gcm => gcm_decrypt::<Aes192Gcm>(cek, iv, aad, ciphertext, tag),
        ContentEncryption::A256Gcm => gcm_decrypt::<Aes256Gcm>(cek, iv, aad, ciphertext, tag),
        ContentEncryption::A128CbcHs256 => {
            cbc_hmac::<Hmac<Sha256>>(mac_key, aad, iv, ciphertext)?
                .verify_truncated_left(tag)
                .map_err(|_| JoseError::ContentDecryption)?;
            cbc::Decryptor::<Aes128>::new_from_slices(enc_key, iv)
                .map_err(|_| JoseError::KeyUnwrap)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| JoseError::ContentDecryption)
        }
        ContentEncryption::A192CbcHs384 => {
            cbc_hmac::<Hmac<Sha384>>(mac_key, aad, iv, ciphertext)?
                .verify_truncated_left(tag)
                .map_err(|_| JoseError::ContentDecryption)?;
            cbc::Decryptor::<Aes192>::new_from_slices(enc_key, iv)
                .map_err(|_| JoseError::KeyUnwrap)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| JoseError::ContentDecryption)
        }
        ContentEncryption::A256CbcHs512 => {
            cbc_hmac::<Hmac<Sha512>>(mac_key, aad, iv, ciphertext)?
                .verify_truncated_left(tag)
                .map_err(|_| JoseError::ContentDecryption)?;
            cbc::Decryptor::<Aes256>::new_from_slices(enc_key, iv)
                .map_err(|_| JoseError::KeyUnwrap)?
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|_| JoseError::ContentDecryption)
        }
    }
}

/// Returns `(ciphertext, tag)`.
fn seal_content(
    enc: ContentEncryption,
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), JoseError> {
    let (mac_key, enc_key) = cek.split_at(cek.len() / 2);
    let tag_len = enc.tag_len();
    match enc {
        ContentEncryption::A128Gcm => gcm_encrypt::<Aes128Gcm>(cek, iv, aad, plaintext),
        ContentEncryption::A192Gcm => gcm_encrypt::<Aes192Gcm>(cek, iv, aad, plaintext),
        ContentEncryption::A256Gcm => gcm_encrypt::<Aes256Gcm>(cek, iv, aad, plaintext),
        ContentEncryption::A128CbcHs256 => {
            let ciphertext = cbc::Encryptor::<Aes128>::new_from_slices(enc_key, iv)
                .map_err(|e| JoseError::Encryption(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
            let mac = cbc_hmac::<Hmac<Sha256>>(mac_key, aad, iv, &ciphertext)?.finalize().into_bytes();
            Ok((ciphertext, mac[..tag_len].to_vec()))
        }
        ContentEncryption::A192CbcHs384 => {
            let ciphertext = cbc::Encryptor::<Aes192>::new_from_slices(enc_key, iv)
                .map_err(|e| JoseError::Encryption(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
            let mac = cbc_hmac::<Hmac<Sha384>>(mac_key, aad, iv, &ciphertext)?.finalize().into_bytes();
            Ok((ciphertext, mac[..tag_len].to_vec()))
        }
        ContentEncryption::A256CbcHs512 => {
            let ciphertext = cbc::Encryptor::<Aes256>::new_from_slices(enc_key, iv)
                .map_err(|e| JoseError::Encryption(e.to_string()))?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
            let mac = cbc_hmac::<Hmac<Sha512>>(mac_key, aad, iv, &ciphertext)?.finalize().into_bytes();
            Ok((ciphertext, mac[..tag_len].to_vec()))
        }
    }
}

fn gcm_decrypt<C: KeyInit + Aead>(
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, JoseError> {
    let cipher = C::new_from_slice(cek).map_err(|_| JoseError::KeyUnwrap)?;
    let mut sealed = Vec::with_capacity(ciphertext.len() + tag.len());
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);
    cipher
        .decrypt(
            aes_gcm::aead::Nonce::<C>::from_slice(iv),
            Payload { msg: &sealed, aad },
        )
        .map_err(|_| JoseError::ContentDecryption)
}

fn gcm_encrypt<C: KeyInit + Aead>(
    cek: &[u8],
    iv: &[u8],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), JoseError> {
    let cipher = C::new_from_slice(cek).map_err(|e| JoseError::Encryption(e.to_string()))?;
    let mut sealed = cipher
        .encrypt(
            aes_gcm::aead::Nonce::<C>::from_slice(iv),
            Payload { msg: plaintext, aad },
        )
        .map_err(|e| JoseError::Encryption(e.to_string()))?;
    let tag = sealed.split_off(sealed.len() - GCM_TAG_LEN);
    Ok((sealed, tag))
}

/// HMAC over `AAD || IV || ciphertext || AL`, AL being the AAD length in bits
/// as a 64-bit big-endian integer.
fn cbc_hmac<M: Mac + KeyInit>(mac_key: &[u8], aad: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<M, JoseError> {
    let mut mac = <M as Mac>::new_from_slice(mac_key).map_err(|_| JoseError::KeyUnwrap)?;
    mac.update(aad);
    mac.update(iv);
    mac.update(ciphertext);
    mac.update(&((aad.len() as u64) * 8).to_be_bytes());
    Ok(mac)
}

/// Encrypt `plaintext` to the recipient's public key as a compact JWE.
pub fn encrypt_compact(
    plaintext: &[u8],
    public_key: &RsaPublicKey,
    enc: ContentEncryption,
    cty: Option<&str>,
) -> Result<String, JoseError> {
    let header = ProtectedHeader {
        alg: KeyAlgorithm::RsaOaep256.as_str().to_string(),
        enc: Some(enc.as_str().to_string()),
        cty: cty.map(str::to_string),
        zip: None,
        crit: None,
    };
    let header_b64 = header.encode()?;

    let mut cek = vec![0u8; enc.key_len()];
    OsRng.fill_bytes(&mut cek);
    let mut iv = vec![0u8; enc.iv_len()];
    OsRng.fill_bytes(&mut iv);

    let encrypted_key = public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), &cek)
        .map_err(|e| JoseError::Encryption(e.to_string()))?;

    let (ciphertext, tag) = seal_content(enc, &cek, &iv, header_b64.as_bytes(), plaintext)?;

    Ok(format!(
        "{}.{}.{}.{}.{}",
        header_b64,
        URL_SAFE_NO_PAD.encode(encrypted_key),
        URL_SAFE_NO_PAD.encode(iv),
        URL_SAFE_NO_PAD.encode(ciphertext),
        URL_SAFE_NO_PAD.encode(tag),
    ))
}

/// Verify a compact PS256 JWS and return its payload bytes.
pub fn verify_compact(jws: &str, public_key: &RsaPublicKey) -> Result<Vec<u8>, JoseError> {
    let parts: Vec<&str> = jws.split('.').collect();
    let [header_b64, payload_b64, signature_b64] = parts[..] else {
        return Err(JoseError::Malformed(format!(
            "JWS must have 3 segments, found {}",
            parts.len()
        )));
    };

    let header = ProtectedHeader::parse(header_b64)?;
    if header.alg != KeyAlgorithm::Ps256.as_str() {
        return Err(JoseError::Unsupported(format!("alg {}", header.alg)));
    }

    let signature = decode_segment("signature", signature_b64)?;
    let signing_input = format!("{}.{}", header_b64, payload_b64);
    if !verify_pss_sha256(public_key, signing_input.as_bytes(), &signature) {
        return Err(JoseError::BadSignature);
    }

    decode_segment("payload", payload_b64)
}

/// Sign `payload` as a compact PS256 JWS.
pub fn sign_compact(payload: &[u8], private_key: &RsaPrivateKey) -> Result<String, JoseError> {
    let header = ProtectedHeader {
        alg: KeyAlgorithm::Ps256.as_str().to_string(),
        enc: None,
        cty: None,
        zip: None,
        crit: None,
    };
    let signing_input = format!("{}.{}", header.encode()?, URL_SAFE_NO_PAD.encode(payload));

    let signing_key = BlindedSigningKey::<Sha256>::new(private_key.clone());
    let signature = signing_key
        .try_sign_with_rng(&mut OsRng, signing_input.as_bytes())
        .map_err(|e| JoseError::Signing(e.to_string()))?;

    Ok(format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}
