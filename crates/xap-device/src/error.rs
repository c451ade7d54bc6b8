//! Device error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeviceError>;

#[derive(Error, Debug)]
pub enum DeviceError {
    /// Duplicate name or uid, missing field, exhausted uids, bad value
    #[error("endpoint error: {0}")]
    Endpoint(String),

    /// Malformed device address
    #[error("validation error: {0}")]
    Validation(String),

    #[error("endpoint not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("core protocol error: {0}")]
    Core(#[from] xap_core::Error),
}
