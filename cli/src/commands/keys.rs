// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Key material commands
//!
//! Commands: check

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use election_mgmt_core::infrastructure::config::{ConfigSource, EnvConfigSource};
use election_mgmt_core::infrastructure::security::{KeyMaterial, KeyMaterialCache};

#[derive(Subcommand, Debug, Clone)]
pub enum KeysCommand {
    /// Load every configured key and report what was found
    Check,
}

pub async fn handle_command(command: KeysCommand) -> Result<()> {
    match command {
        KeysCommand::Check => check(&EnvConfigSource),
    }
}

fn check(source: &dyn ConfigSource) -> Result<()> {
    let cache = KeyMaterialCache::from_config(source).context("Key check failed")?;

    println!("{}", "Cryptographic keys:".bold());
    let mut keys: Vec<&KeyMaterial> = cache.iter().collect();
    keys.sort_by(|a, b| a.name().cmp(b.name()));
    for key in keys {
        println!("  {}", describe(key).green());
    }
    Ok(())
}

fn describe(key: &KeyMaterial) -> String {
    format!(
        "✓ {} ({}, {}, {} bits)",
        key.name(),
        key.kind(),
        key.algorithm(),
        key.bits()
    )
}
