//! Error types for xAP

use thiserror::Error;

/// Result type alias for xAP operations
pub type Result<T> = std::result::Result<T, Error>;

/// xAP error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed wire text (unterminated block, bad hex, unexpected character)
    #[error("format error: {0}")]
    Format(String),

    /// Malformed address string or misplaced wildcard
    #[error("invalid address: {0}")]
    Address(String),

    /// No constructor registered for a header block name
    #[error("no handlers defined for {0} message headers")]
    UnknownHeader(String),

    /// Header has no class and no fallback is registered
    #[error("message lacks a class field in its {0} header")]
    MissingClass(String),

    /// Neither the class nor a fallback is registered
    #[error("no handler defined for {header}/{class} messages")]
    UnknownClass { header: String, class: String },

    /// A constructor already exists for the key
    #[error("duplicate registration for {header}/{class}")]
    DuplicateRegistration { header: String, class: String },

    /// Missing or malformed header field
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Malformed field value (level, ID, text with a newline)
    #[error("invalid field value: {0}")]
    InvalidField(String),

    /// Schema body blocks missing or malformed
    #[error("invalid message body: {0}")]
    InvalidBody(String),

    /// Malformed device uid or device address
    #[error("validation error: {0}")]
    Validation(String),
}
