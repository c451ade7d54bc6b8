//! Typed xAP messages

use crate::bsc::{BscCommand, BscQuery, BscResponse};
use crate::codec::{self, Block, Packet};
use crate::header::Header;
use crate::heartbeat::Heartbeat;
use crate::registry::Registry;
use crate::{Address, Error, Result, HEADER_BLOCK, HEARTBEAT_BLOCK};
use bytes::Bytes;

/// Every message class this build understands, plus a fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Heartbeat(Heartbeat),
    BscCommand(BscCommand),
    BscQuery(BscQuery),
    BscEvent(BscResponse),
    BscInfo(BscResponse),
    /// A class with no schema support; keeps the raw body blocks
    Unsupported(Unsupported),
}

impl Message {
    pub fn header(&self) -> &Header {
        match self {
            Message::Heartbeat(m) => m.header(),
            Message::BscCommand(m) => m.header(),
            Message::BscQuery(m) => m.header(),
            Message::BscEvent(m) | Message::BscInfo(m) => m.header(),
            Message::Unsupported(m) => m.header(),
        }
    }

    pub fn class(&self) -> &str {
        &self.header().class
    }

    pub fn source(&self) -> &Address {
        &self.header().source
    }

    pub fn target(&self) -> Option<&Address> {
        self.header().target.as_ref()
    }

    /// Short name of the variant, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Heartbeat(_) => "heartbeat",
            Message::BscCommand(_) => "bsc-command",
            Message::BscQuery(_) => "bsc-query",
            Message::BscEvent(_) => "bsc-event",
            Message::BscInfo(_) => "bsc-info",
            Message::Unsupported(_) => "unsupported",
        }
    }

    /// Build the block tree for this message
    pub fn to_packet(&self) -> Packet {
        match self {
            Message::Heartbeat(m) => m.to_packet(),
            Message::BscCommand(m) => m.to_packet(),
            Message::BscQuery(m) => m.to_packet(),
            Message::BscEvent(m) | Message::BscInfo(m) => m.to_packet(),
            Message::Unsupported(m) => m.to_packet(),
        }
    }

    /// Serialize to wire text
    pub fn encode(&self) -> String {
        codec::serialize(&self.to_packet())
    }

    /// Serialize to wire bytes
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(self.encode())
    }
}

impl From<Heartbeat> for Message {
    fn from(m: Heartbeat) -> Self {
        Message::Heartbeat(m)
    }
}

impl From<BscCommand> for Message {
    fn from(m: BscCommand) -> Self {
        Message::BscCommand(m)
    }
}

impl From<BscQuery> for Message {
    fn from(m: BscQuery) -> Self {
        Message::BscQuery(m)
    }
}

impl From<BscResponse> for Message {
    fn from(m: BscResponse) -> Self {
        if m.is_event() {
            Message::BscEvent(m)
        } else {
            Message::BscInfo(m)
        }
    }
}

/// A message whose class has no schema support
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unsupported {
    header: Header,
    blocks: Vec<Block>,
}

impl Unsupported {
    pub fn new(header: Header, blocks: Vec<Block>) -> Self {
        Self { header, blocks }
    }

    /// Keep the block tree of any message. The class may be missing.
    pub fn from_packet(packet: &Packet) -> Result<Self> {
        let block = packet
            .header()
            .ok_or_else(|| Error::Format("message has no blocks".to_string()))?;
        Ok(Self {
            header: Header::from_block_without_class(block)?,
            blocks: packet.body().to_vec(),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn to_packet(&self) -> Packet {
        let mut packet = Packet::new().with_block(self.header.to_block());
        for block in &self.blocks {
            packet.push(block.clone());
        }
        packet
    }
}

/// Register the fallback for unrecognized classes
pub fn register(registry: &mut Registry) -> Result<()> {
    for header in [HEADER_BLOCK, HEARTBEAT_BLOCK] {
        registry.register(header, None, |packet| {
            Unsupported::from_packet(packet).map(Message::Unsupported)
        })?;
    }
    Ok(())
}

/// Parse the header block of a packet
pub(crate) fn header_of(packet: &Packet) -> Result<Header> {
    let block = packet
        .header()
        .ok_or_else(|| Error::Format("message has no blocks".to_string()))?;
    Header::from_block(block)
}
