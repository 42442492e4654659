//! Aegis Config - Configuration Structures
//!
//! Configuration for the MQuery engine. Supports loading from TOML files and
//! programmatic construction, with defaults matching the behavior callers
//! expect from a MongoDB-style update engine.
//!
//! Key Features:
//! - Modifier strictness (skip or reject unknown update operators)
//! - Bounds on array growth through positional writes
//! - Regex compilation limits for `$regex` matchers
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use serde::{Deserialize, Serialize};
use std::path::Path;

// =============================================================================
// MQuery Configuration
// =============================================================================

/// Configuration for query matching and update modification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MQueryConfig {
    /// Reject unknown modifier names instead of skipping them.
    pub strict_modifiers: bool,
    /// Largest array index a write may target.
    pub max_array_index: usize,
    /// Compiled size limit for `$regex` patterns, in bytes.
    pub regex_size_limit: usize,
}

impl Default for MQueryConfig {
    fn default() -> Self {
        Self {
            strict_modifiers: false,
            max_array_index: 1_000_000,
            regex_size_limit: 1024 * 1024, // 1 MB
        }
    }
}

impl MQueryConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::AegisError::Configuration(e.to_string()))
    }

    /// Configuration that rejects anything it does not understand.
    pub fn strict() -> Self {
        Self {
            strict_modifiers: true,
            ..Default::default()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
