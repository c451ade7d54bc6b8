//! Transport error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("bind failed: {0}")]
    Bind(String),

    #[error("send failed: {0}")]
    Send(String),

    #[error("server closed")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("core protocol error: {0}")]
    Core(#[from] xap_core::Error),

    #[error("device error: {0}")]
    Device(#[from] xap_device::DeviceError),
}
