//! xAP Transport Layer
//!
//! This crate connects xAP devices to the network:
//! - UDP broadcast socket ([`XapSocket`])
//! - Device ownership and message routing ([`XapHandler`])
//! - A single-task server with heartbeat scheduling ([`XapServer`])

pub mod error;
pub mod handler;
pub mod server;
pub mod udp;

pub use error::{Result, TransportError};
pub use handler::{DeviceId, XapHandler};
pub use server::{ServerHandle, XapServer, XapServerConfig};
pub use udp::{SocketEvent, XapSocket};
