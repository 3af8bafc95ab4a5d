//! errors.rs - Custom error types for the reportkeeper-core library.
//!
//! This module defines a structured error enum for the library, providing
//! specific, actionable error types that can be handled programmatically.
//!
//! License: MIT OR APACHE 2.0

use thiserror::Error;

/// This enum represents all possible error types in the `reportkeeper-core` library.
///
/// By using `#[non_exhaustive]`, we signal to consumers of this library that
/// new variants may be added in future versions. This prevents them from
/// matching all variants exhaustively, thus avoiding breaking changes.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CoreError {
    #[error("Sequence '{0}' not found in sequence settings")]
    UnknownSequence(String),

    #[error("Identifier pattern '{0}' is invalid: {1}")]
    InvalidPattern(String, String),

    #[error("Failed to compile word filter '{0}': {1}")]
    FilterCompilation(String, regex::Error),

    #[error("An unexpected I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),

    #[error("A critical system error occurred: {0}")]
    AnyhowWrapper(#[from] anyhow::Error),

    #[error("A fatal error occurred: {0}")]
    Fatal(String),
}
