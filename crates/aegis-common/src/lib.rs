//! Aegis Common - Shared Types and Utilities
//!
//! Foundational error handling and configuration used by the Aegis MQuery
//! engine. Keeps the error taxonomy and tunables in one place so matching
//! and modification report failures consistently.
//!
//! Key Features:
//! - Unified error type with validation/user error classification
//! - Engine configuration loadable from TOML
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

pub mod config;
pub mod error;

pub use config::MQueryConfig;
pub use error::{AegisError, Result};
