//! # Drop Rate Error Types
//!
//! All errors that can occur while computing or tracking drop chances.

use thiserror::Error;

/// Errors that can occur in the drop rate engine.
#[derive(Error, Debug)]
pub enum DropRateError {
    /// An argument violated a precondition (usually a zero divisor).
    #[error("invalid argument `{name}`: {value} ({reason})")]
    InvalidArgument {
        /// Name of the offending argument.
        name: &'static str,
        /// The rejected value, rendered for display.
        value: String,
        /// Which precondition was violated.
        reason: &'static str,
    },

    /// Invalid configuration file or value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl DropRateError {
    /// Builds a [`DropRateError::InvalidArgument`] from any displayable value.
    pub(crate) fn invalid_argument(
        name: &'static str,
        value: impl std::fmt::Display,
        reason: &'static str,
    ) -> Self {
        Self::InvalidArgument {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

/// Result type for drop rate operations.
pub type DropRateResult<T> = Result<T, DropRateError>;
