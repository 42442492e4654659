//! Aegis Error - Unified Error Types
//!
//! Error handling for query matching and update modification. Update
//! validation errors abort a whole modifier batch before the document is
//! touched; matching itself only fails on arithmetic errors.
//!
//! Key Features:
//! - Validation taxonomy (type mismatch, invalid path, unsupported operator)
//! - Query and arithmetic failures surfaced to the caller
//! - Configuration loading errors with std::io::Error integration
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Unified error type for all Aegis MQuery operations.
#[derive(Error, Debug)]
pub enum AegisError {
    // Modifier validation errors
    #[error("{0}")]
    TypeMismatch(String),

    #[error("{0}")]
    InvalidPath(String),

    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),

    // Query errors
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("arithmetic error: {0}")]
    Arithmetic(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Type Aliases
// =============================================================================

/// Result type alias for Aegis MQuery operations.
pub type Result<T> = std::result::Result<T, AegisError>;

// =============================================================================
// Error Classification
// =============================================================================

impl AegisError {
    /// Returns true if the error was raised while validating a modifier.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            AegisError::TypeMismatch(_)
                | AegisError::InvalidPath(_)
                | AegisError::UnsupportedOperator(_)
        )
    }

    /// Returns true if this is a user error (vs system error).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            AegisError::TypeMismatch(_)
                | AegisError::InvalidPath(_)
                | AegisError::UnsupportedOperator(_)
                | AegisError::InvalidQuery(_)
                | AegisError::Arithmetic(_)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
