// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Security envelope tooling for operators and integration checks
//!
//! Commands: seal, open

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use colored::Colorize;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use election_mgmt_core::domain::envelope::SecurityEnvelope;
use election_mgmt_core::infrastructure::config::{ConfigSource, EnvConfigSource};
use election_mgmt_core::infrastructure::security::jose::ContentEncryption;
use election_mgmt_core::infrastructure::security::{EnvelopeSealer, EnvelopeUnpacker, KeyMaterialCache};

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum EncArg {
    A128gcm,
    A192gcm,
    A256gcm,
    A128cbcHs256,
    A192cbcHs384,
    A256cbcHs512,
}

impl From<EncArg> for ContentEncryption {
    fn from(arg: EncArg) -> Self {
        match arg {
            EncArg::A128gcm => ContentEncryption::A128Gcm,
            EncArg::A192gcm => ContentEncryption::A192Gcm,
            EncArg::A256gcm => ContentEncryption::A256Gcm,
            EncArg::A128cbcHs256 => ContentEncryption::A128CbcHs256,
            EncArg::A192cbcHs384 => ContentEncryption::A192CbcHs384,
            EncArg::A256cbcHs512 => ContentEncryption::A256CbcHs512,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum EnvelopeCommand {
    /// Sign and encrypt a JSON payload the way the counterpart does
    Seal {
        /// JSON payload file ("-" for stdin)
        #[arg(value_name = "FILE")]
        payload: PathBuf,

        /// Recipient (service) public key, SPKI PEM
        #[arg(long, value_name = "FILE")]
        recipient_key: PathBuf,

        /// Signer (counterpart) private key, PKCS#8 PEM
        #[arg(long, value_name = "FILE")]
        signer_key: PathBuf,

        /// Content encryption algorithm
        #[arg(long, value_enum, default_value_t = EncArg::A256gcm)]
        enc: EncArg,
    },

    /// Open an envelope with the keys configured in the environment
    Open {
        /// Compact envelope file ("-" for stdin)
        #[arg(value_name = "FILE")]
        envelope: PathBuf,
    },
}

pub async fn handle_command(command: EnvelopeCommand) -> Result<()> {
    match command {
        EnvelopeCommand::Seal {
            payload,
            recipient_key,
            signer_key,
            enc,
        } => {
            let envelope = seal(&payload, &recipient_key, &signer_key, enc)?;
            println!("{}", envelope.as_str());
            Ok(())
        }
        EnvelopeCommand::Open { envelope } => {
            let payload = open(&EnvConfigSource, &envelope)?;
            eprintln!("{}", "✓ Envelope decrypted and signature verified".green());
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
    }
}

fn seal(payload: &Path, recipient_key: &Path, signer_key: &Path, enc: EncArg) -> Result<SecurityEnvelope> {
    let payload: Value = serde_json::from_str(&read_input(payload)?).context("Payload is not valid JSON")?;
    let recipient = RsaPublicKey::from_public_key_pem(&read_input(recipient_key)?)
        .context("Recipient key is not an SPKI PEM RSA public key")?;
    let signer = RsaPrivateKey::from_pkcs8_pem(&read_input(signer_key)?)
        .context("Signer key is not a PKCS#8 PEM RSA private key")?;

    EnvelopeSealer::new(recipient, signer)
        .with_content_encryption(enc.into())
        .seal(&payload)
        .context("Failed to seal envelope")
}

fn open(source: &dyn ConfigSource, envelope: &Path) -> Result<Value> {
    let keys = Arc::new(KeyMaterialCache::from_config(source).context("Failed to load cryptographic keys")?);
    let envelope = SecurityEnvelope::new(read_input(envelope)?);
    let payload = EnvelopeUnpacker::new(keys)
        .open(&envelope)
        .context("Envelope rejected")?;
    Ok(payload.into_value())
}
