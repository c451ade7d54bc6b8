//! xAP Basic Status and Control (BSC) schema messages
//!
//! BSC devices expose input and output endpoints. Each endpoint has a
//! State and optionally a Level, Text and DisplayText. Controllers send
//! `xAPBSC.cmd` and `xAPBSC.query` messages; devices answer with
//! `xAPBSC.event` (something changed) or `xAPBSC.info` (nothing changed).
//!
//! ```text
//! xap-header
//! {
//! v=12
//! hop=1
//! uid=FF123400
//! class=xAPBSC.cmd
//! source=ACME.Controller.Central
//! target=ACME.Lighting.apartment:Output 1
//! }
//! output.state.1
//! {
//! ID=*
//! State=ON
//! Level=40%
//! }
//! ```

use crate::codec::{Block, Packet, Value};
use crate::header::Header;
use crate::message::{header_of, Message};
use crate::registry::Registry;
use crate::{Address, Error, Result, HEADER_BLOCK};
use std::fmt;
use std::str::FromStr;

/// Command class
pub const CMD_CLASS: &str = "xAPBSC.cmd";
/// Query class
pub const QUERY_CLASS: &str = "xAPBSC.query";
/// Event class (a command changed something)
pub const EVENT_CLASS: &str = "xAPBSC.event";
/// Info class (status report, nothing changed)
pub const INFO_CLASS: &str = "xAPBSC.info";

// ============================================================================
// FIELD TYPES
// ============================================================================

/// Endpoint state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    On,
    Off,
    #[default]
    Unknown,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::On => "ON",
            State::Off => "OFF",
            State::Unknown => "?",
        }
    }

    /// Flip On and Off. Unknown counts as not-on and becomes On.
    pub fn toggled(self) -> Self {
        match self {
            State::On => State::Off,
            State::Off | State::Unknown => State::On,
        }
    }
}

impl From<bool> for State {
    fn from(on: bool) -> Self {
        if on {
            State::On
        } else {
            State::Off
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match BlockState::parse(s) {
            Some(BlockState::On) => Ok(State::On),
            Some(BlockState::Off) => Ok(State::Off),
            Some(BlockState::Unknown) => Ok(State::Unknown),
            _ => Err(Error::InvalidField(format!("invalid state {:?}", s))),
        }
    }
}

/// State field of a BSC block, which may also ask for a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    On,
    Off,
    Unknown,
    Toggle,
}

impl BlockState {
    /// Parse `ON`, `OFF`, `?` or `toggle` (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on" => Some(BlockState::On),
            "off" => Some(BlockState::Off),
            "?" => Some(BlockState::Unknown),
            "toggle" => Some(BlockState::Toggle),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockState::On => "ON",
            BlockState::Off => "OFF",
            BlockState::Unknown => "?",
            BlockState::Toggle => "toggle",
        }
    }
}

impl From<State> for BlockState {
    fn from(state: State) -> Self {
        match state {
            State::On => BlockState::On,
            State::Off => BlockState::Off,
            State::Unknown => BlockState::Unknown,
        }
    }
}

impl fmt::Display for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level field: `n/d`, `n%`, or a bare numerator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Ratio { numerator: i64, denominator: i64 },
    Percent(i64),
    /// A numerator with no unit; keeps the receiver's denominator
    Raw(i64),
}

impl Level {
    pub fn numerator(&self) -> i64 {
        match *self {
            Level::Ratio { numerator, .. } => numerator,
            Level::Percent(n) | Level::Raw(n) => n,
        }
    }

    /// The same unit with a different numerator
    pub fn with_numerator(&self, numerator: i64) -> Self {
        match *self {
            Level::Ratio { denominator, .. } => Level::Ratio {
                numerator,
                denominator,
            },
            Level::Percent(_) => Level::Percent(numerator),
            Level::Raw(_) => Level::Raw(numerator),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Ratio {
                numerator,
                denominator,
            } => write!(f, "{}/{}", numerator, denominator),
            Level::Percent(n) => write!(f, "{}%", n),
            Level::Raw(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidField(format!("invalid format for level: {:?}", s));
        let int = |t: &str| t.trim().parse::<i64>().map_err(|_| invalid());

        let s = s.trim();
        if let Some((num, denom)) = s.split_once('/') {
            let denominator = int(denom)?;
            if denominator <= 0 {
                return Err(invalid());
            }
            Ok(Level::Ratio {
                numerator: int(num)?,
                denominator,
            })
        } else if let Some(pct) = s.strip_suffix('%') {
            Ok(Level::Percent(int(pct)?))
        } else {
            Ok(Level::Raw(int(s)?))
        }
    }
}

/// ID field of a BSC block: every endpoint (`*`) or one sub-uid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockId {
    All,
    Uid(u8),
}

impl FromStr for BlockId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "*" {
            return Ok(BlockId::All);
        }
        if s.len() == 2 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            if let Ok(uid) = u8::from_str_radix(s, 16) {
                return Ok(BlockId::Uid(uid));
            }
        }
        Err(Error::InvalidField(format!(
            "ID must be two hex digits or *, not {:?}",
            s
        )))
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockId::All => f.write_str("*"),
            BlockId::Uid(uid) => write!(f, "{:02X}", uid),
        }
    }
}

fn check_text(what: &str, text: &str) -> Result<()> {
    if text.contains('\n') {
        return Err(Error::InvalidField(format!("{} must not include newlines", what)));
    }
    Ok(())
}

// ============================================================================
// BLOCKS
// ============================================================================

/// Endpoint direction of a BSC block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl Direction {
    fn prefix(&self) -> &'static str {
        match self {
            Direction::Input => "input.state",
            Direction::Output => "output.state",
        }
    }

    /// Direction from a block name, if it is a BSC block
    pub fn from_block_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.starts_with("input") {
            Some(Direction::Input)
        } else if lower.starts_with("output") {
            Some(Direction::Output)
        } else {
            None
        }
    }
}

/// An `input.state` or `output.state` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BscBlock {
    pub direction: Direction,
    /// 1-based block index (`output.state.N`)
    pub index: Option<u32>,
    pub id: Option<BlockId>,
    pub state: Option<BlockState>,
    pub level: Option<Level>,
    text: Option<String>,
    display_text: Option<String>,
    /// Unrecognized pairs, in order
    pub extra: Vec<(String, Value)>,
}

impl BscBlock {
    pub fn new(direction: Direction, index: Option<u32>) -> Self {
        Self {
            direction,
            index,
            id: None,
            state: None,
            level: None,
            text: None,
            display_text: None,
            extra: Vec::new(),
        }
    }

    /// Parse a BSC block. Unrecognized State values are ignored.
    pub fn from_block(block: &Block) -> Result<Self> {
        let direction = Direction::from_block_name(block.name()).ok_or_else(|| {
            Error::InvalidBody(format!("{} is not a BSC state block", block.name()))
        })?;
        let index = block
            .name()
            .rsplit_once('.')
            .and_then(|(_, n)| n.parse::<u32>().ok());

        let mut bsc = BscBlock::new(direction, index);
        for (key, value) in block.iter() {
            let text = value.as_text();
            match key.to_ascii_lowercase().as_str() {
                "state" => bsc.state = BlockState::parse(&text),
                "level" => bsc.level = Some(text.parse()?),
                "text" => bsc.set_text(text.into_owned())?,
                "displaytext" => bsc.set_display_text(text.into_owned())?,
                "id" => bsc.id = Some(text.to_ascii_uppercase().parse()?),
                _ => bsc.extra.push((key.to_string(), value.clone())),
            }
        }
        Ok(bsc)
    }

    /// `input.state[.N]` or `output.state[.N]`
    pub fn block_name(&self) -> String {
        match self.index {
            Some(index) => format!("{}.{}", self.direction.prefix(), index),
            None => self.direction.prefix().to_string(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn display_text(&self) -> Option<&str> {
        self.display_text.as_deref()
    }

    /// Set the Text field. Text must not contain a newline.
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        check_text("Text", &text)?;
        self.text = Some(text);
        Ok(())
    }

    /// Set the DisplayText field. Text must not contain a newline.
    pub fn set_display_text(&mut self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        check_text("DisplayText", &text)?;
        self.display_text = Some(text);
        Ok(())
    }

    pub fn to_block(&self) -> Block {
        let mut block = Block::new(self.block_name());
        if let Some(id) = &self.id {
            block.push("ID", id.to_string());
        }
        if let Some(state) = &self.state {
            block.push("State", state.as_str());
        }
        if let Some(level) = &self.level {
            block.push("Level", level.to_string());
        }
        if let Some(text) = &self.text {
            block.push("Text", text.clone());
        }
        if let Some(text) = &self.display_text {
            block.push("DisplayText", text.clone());
        }
        for (key, value) in &self.extra {
            block.push(key.clone(), value.clone());
        }
        block
    }
}

fn bsc_blocks(packet: &Packet) -> Result<Vec<BscBlock>> {
    let blocks = packet
        .body()
        .iter()
        .filter(|b| Direction::from_block_name(b.name()).is_some())
        .map(BscBlock::from_block)
        .collect::<Result<Vec<_>>>()?;
    if blocks.is_empty() {
        return Err(Error::InvalidBody(
            "xAP BSC messages must have at least one state block".to_string(),
        ));
    }
    Ok(blocks)
}

fn require_target(header: &Header) -> Result<()> {
    if header.target.is_none() {
        return Err(Error::InvalidHeader(format!(
            "all {} messages must have a target address",
            header.class
        )));
    }
    Ok(())
}

// ============================================================================
// MESSAGES
// ============================================================================

/// An `xAPBSC.cmd` message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BscCommand {
    header: Header,
    blocks: Vec<BscBlock>,
}

impl BscCommand {
    /// A command with no blocks yet; add them with [`block_mut`](Self::block_mut)
    pub fn new(source: Address, uid: impl Into<String>, target: Address) -> Self {
        Self {
            header: Header::new(CMD_CLASS, source, uid).with_target(target),
            blocks: Vec::new(),
        }
    }

    pub fn from_packet(packet: &Packet) -> Result<Self> {
        let header = header_of(packet)?;
        require_target(&header)?;
        Ok(Self {
            header,
            blocks: bsc_blocks(packet)?,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The target address (always present)
    pub fn target(&self) -> Option<&Address> {
        self.header.target.as_ref()
    }

    pub fn blocks(&self) -> &[BscBlock] {
        &self.blocks
    }

    /// The block at a 0-based index, created (as `output.state.N`) along
    /// with any missing blocks before it
    pub fn block_mut(&mut self, index: usize) -> &mut BscBlock {
        while self.blocks.len() <= index {
            let n = self.blocks.len() as u32 + 1;
            self.blocks.push(BscBlock::new(Direction::Output, Some(n)));
        }
        &mut self.blocks[index]
    }

    pub fn to_packet(&self) -> Packet {
        let mut packet = Packet::new().with_block(self.header.to_block());
        for block in &self.blocks {
            packet.push(block.to_block());
        }
        packet
    }
}

/// An `xAPBSC.query` message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BscQuery {
    header: Header,
}

impl BscQuery {
    pub fn new(source: Address, uid: impl Into<String>, target: Address) -> Self {
        Self {
            header: Header::new(QUERY_CLASS, source, uid).with_target(target),
        }
    }

    pub fn from_packet(packet: &Packet) -> Result<Self> {
        let header = header_of(packet)?;
        require_target(&header)?;
        Ok(Self { header })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn target(&self) -> Option<&Address> {
        self.header.target.as_ref()
    }

    pub fn to_packet(&self) -> Packet {
        Packet::new()
            .with_block(self.header.to_block())
            .with_block(Block::new("request"))
    }
}

/// An `xAPBSC.info` or `xAPBSC.event` message describing one endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BscResponse {
    header: Header,
    block: BscBlock,
}

impl BscResponse {
    /// An `xAPBSC.info` message from an endpoint
    pub fn info(source: Address, uid: impl Into<String>, direction: Direction) -> Self {
        Self::with_class(INFO_CLASS, source, uid, direction)
    }

    /// An `xAPBSC.event` message from an endpoint
    pub fn event(source: Address, uid: impl Into<String>, direction: Direction) -> Self {
        Self::with_class(EVENT_CLASS, source, uid, direction)
    }

    fn with_class(
        class: &str,
        source: Address,
        uid: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            header: Header::new(class, source, uid),
            block: BscBlock::new(direction, None),
        }
    }

    pub fn from_packet(packet: &Packet) -> Result<Self> {
        let header = header_of(packet)?;
        let block = bsc_blocks(packet)?.remove(0);
        Ok(Self { header, block })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn is_event(&self) -> bool {
        self.header.class.eq_ignore_ascii_case(EVENT_CLASS)
    }

    pub fn direction(&self) -> Direction {
        self.block.direction
    }

    pub fn block(&self) -> &BscBlock {
        &self.block
    }

    pub fn block_mut(&mut self) -> &mut BscBlock {
        &mut self.block
    }

    pub fn state(&self) -> Option<BlockState> {
        self.block.state
    }

    pub fn level(&self) -> Option<Level> {
        self.block.level
    }

    pub fn text(&self) -> Option<&str> {
        self.block.text()
    }

    pub fn display_text(&self) -> Option<&str> {
        self.block.display_text()
    }

    pub fn to_packet(&self) -> Packet {
        Packet::new()
            .with_block(self.header.to_block())
            .with_block(self.block.to_block())
    }
}

/// Register the BSC classes
pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register(HEADER_BLOCK, Some(CMD_CLASS), |packet| {
        BscCommand::from_packet(packet).map(Message::BscCommand)
    })?;
    registry.register(HEADER_BLOCK, Some(QUERY_CLASS), |packet| {
        BscQuery::from_packet(packet).map(Message::BscQuery)
    })?;
    registry.register(HEADER_BLOCK, Some(EVENT_CLASS), |packet| {
        BscResponse::from_packet(packet).map(Message::BscEvent)
    })?;
    registry.register(HEADER_BLOCK, Some(INFO_CLASS), |packet| {
        BscResponse::from_packet(packet).map(Message::BscInfo)
    })
}
