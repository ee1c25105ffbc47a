// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loading and validation for the Strata memory engine.
//!
//! Process-wide configuration is an immutable value built at startup:
//! load it once through [`loader::load_config`], run
//! [`validation::validate_config`], and pass the result by reference into
//! the construction root. No global state.

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::ConfigError;
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::StrataConfig;
pub use validation::validate_config;
