// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics with actionable messages.

use thiserror::Error;

/// A configuration problem discovered at load or validation time.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML parse or merge failure from the underlying loader.
    #[error("config load error: {0}")]
    Load(#[from] Box<figment::Error>),

    /// A value violates a semantic constraint (range, enum, relation).
    #[error("config validation error: {message}")]
    Validation { message: String },
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        ConfigError::Validation {
            message: message.into(),
        }
    }
}
