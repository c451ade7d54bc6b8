//! xAP Core
//!
//! Wire format, addressing and message types for the xAP home automation
//! protocol.
//!
//! This crate provides:
//! - The block/key-value wire codec ([`codec`], [`Packet`], [`Block`])
//! - Address parsing and wildcard matching ([`Address`])
//! - Device uids ([`Uid`])
//! - Typed messages and class dispatch ([`Message`], [`Registry`])
//! - Heartbeat and Basic Status and Control schema messages
//!   ([`heartbeat`], [`bsc`])

pub mod address;
pub mod bsc;
pub mod codec;
pub mod error;
pub mod header;
pub mod heartbeat;
pub mod message;
pub mod registry;
pub mod uid;

pub use address::Address;
pub use bsc::{
    BlockId, BlockState, BscBlock, BscCommand, BscQuery, BscResponse, Direction, Level, State,
};
pub use codec::{fast_parse, parse, serialize, Block, Packet, Value};
pub use error::{Error, Result};
pub use header::Header;
pub use heartbeat::Heartbeat;
pub use message::{Message, Unsupported};
pub use registry::{Constructor, Registry};
pub use uid::Uid;

/// Protocol version written in the `v` header field
pub const PROTOCOL_VERSION: u32 = 12;

/// UDP port used by xAP
pub const XAP_PORT: u16 = 3639;

/// Header block name of ordinary messages
pub const HEADER_BLOCK: &str = "xap-header";

/// Header block name of heartbeats
pub const HEARTBEAT_BLOCK: &str = "xap-hbeat";
