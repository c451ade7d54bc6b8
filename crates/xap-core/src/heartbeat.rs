//! Heartbeat messages
//!
//! ```text
//! xap-hbeat
//! {
//! v=12
//! hop=1
//! uid=FF345600
//! class=xap-hbeat.alive
//! source=ACME.Lighting.apartment
//! interval=60
//! }
//! ```

use crate::codec::{Packet, Value};
use crate::header::Header;
use crate::message::{header_of, Message};
use crate::registry::Registry;
use crate::{Address, Error, Result, Uid, HEARTBEAT_BLOCK};

/// Heartbeat class
pub const HEARTBEAT_CLASS: &str = "xap-hbeat.alive";

/// Default heartbeat interval in seconds
pub const DEFAULT_INTERVAL: u32 = 60;

/// An xAP heartbeat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    header: Header,
    interval: u32,
}

impl Heartbeat {
    pub fn new(source: Address, uid: &Uid, interval: u32) -> Self {
        let mut header =
            Header::new(HEARTBEAT_CLASS, source, uid.as_str()).with_name(HEARTBEAT_BLOCK);
        header.set("interval", interval.to_string());
        Self { header, interval }
    }

    pub fn from_packet(packet: &Packet) -> Result<Self> {
        let header = header_of(packet)?;
        let interval = match header.get("interval") {
            Some(value) => value.as_text().trim().parse().map_err(|_| {
                Error::InvalidHeader(format!("invalid heartbeat interval {:?}", value.as_text()))
            })?,
            None => DEFAULT_INTERVAL,
        };
        Ok(Self { header, interval })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Seconds between heartbeats
    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn to_packet(&self) -> Packet {
        let mut header = self.header.clone();
        header.set("interval", Value::text(self.interval.to_string()));
        Packet::new().with_block(header.to_block())
    }
}

/// Register heartbeat support
pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register(HEARTBEAT_BLOCK, Some(HEARTBEAT_CLASS), |packet| {
        Heartbeat::from_packet(packet).map(Message::Heartbeat)
    })
}
