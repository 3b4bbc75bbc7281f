// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the election management CLI

pub mod envelope;
pub mod keys;
pub mod serve;

pub use self::envelope::EnvelopeCommand;
pub use self::keys::KeysCommand;
pub use self::serve::ServeArgs;
