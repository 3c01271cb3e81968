//! Common error types for the conference focus crates.

use thiserror::Error;

/// Common errors that can occur across the focus components
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value could not be parsed into its typed form
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type alias using `CommonError`
pub type Result<T> = std::result::Result<T, CommonError>;
