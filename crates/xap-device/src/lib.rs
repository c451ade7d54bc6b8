//! xAP Devices
//!
//! Virtual xAP devices that a transport drives: the [`Device`] trait, the
//! heartbeat-only [`BaseDevice`], and the Basic Status and Control
//! [`BscDevice`] with its [`Endpoint`]s.
//!
//! Devices never touch a socket. A transport attaches an [`Outbox`] and
//! delivers typed messages through [`Device::receive_message`].

pub mod bsc_device;
pub mod config;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod outbox;

pub use bsc_device::BscDevice;
pub use config::{DeviceConfig, EndpointConfig};
pub use device::{validate_address, BaseDevice, Device};
pub use endpoint::{
    merge_level, Endpoint, EndpointChange, EndpointKind, EndpointSpec, EndpointValues,
};
pub use error::{DeviceError, Result};
pub use outbox::Outbox;
