//! xAP Wire Codec
//!
//! An xAP message is a sequence of named blocks, each holding ordered
//! key/value pairs:
//!
//! ```text
//! xap-header
//! {
//! v=12
//! hop=1
//! uid=FF345600
//! class=AClass.AClassType
//! source=AVendor.ADevice.AnInstance
//! }
//! ASchema.ASchemaType
//! {
//! mybinary!68656C6C6F
//! }
//! ```
//!
//! `key=value` carries literal text, `key!value` carries hex digits that are
//! decoded to raw bytes. [`parse`] validates the grammar strictly and
//! [`serialize`] reproduces the parsed text byte for byte. [`fast_parse`]
//! skips validation and is only correct on well-formed input.

use crate::{Error, Result};
use bytes::Bytes;
use std::borrow::Cow;
use std::fmt;

/// A value in a key/value pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Literal text, written as `key=value`
    Ascii(String),
    /// Raw bytes, written as `key!hexdigits`
    Hex {
        data: Bytes,
        /// The hex digits as written
        wire: String,
    },
}

impl Value {
    /// Create a text value
    pub fn text(s: impl Into<String>) -> Self {
        Value::Ascii(s.into())
    }

    /// Create a hex value, serialized with uppercase digits
    pub fn hex(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Value::Hex {
            wire: hex::encode_upper(&data),
            data,
        }
    }

    /// The wire marker between key and value
    pub fn marker(&self) -> char {
        match self {
            Value::Ascii(_) => '=',
            Value::Hex { .. } => '!',
        }
    }

    pub fn is_hex(&self) -> bool {
        matches!(self, Value::Hex { .. })
    }

    /// The value as text. Hex values are decoded as (lossy) UTF-8.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Ascii(s) => Cow::Borrowed(s.as_str()),
            Value::Hex { data, .. } => String::from_utf8_lossy(data),
        }
    }

    /// The raw bytes of the value
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Value::Ascii(s) => s.as_bytes(),
            Value::Hex { data, .. } => data,
        }
    }

    /// The value exactly as it appears on the wire after the marker
    pub fn wire_text(&self) -> Cow<'_, str> {
        match self {
            Value::Ascii(s) => Cow::Borrowed(s.as_str()),
            Value::Hex { wire, .. } => Cow::Borrowed(wire.as_str()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Ascii(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Ascii(s)
    }
}

/// A named block of ordered key/value pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    name: String,
    pairs: Vec<(String, Value)>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pairs: Vec::new(),
        }
    }

    /// Builder-style text pair
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a pair. Duplicate keys are kept in order.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Look up the first value for a key (case-insensitive)
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.pairs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Look up a value as text (case-insensitive key)
    pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).map(Value::as_text)
    }

    pub fn pairs(&self) -> &[(String, Value)] {
        &self.pairs
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn write_to(&self, out: &mut String) {
        out.push_str(&self.name);
        out.push_str("\n{\n");
        for (key, value) in &self.pairs {
            out.push_str(key);
            out.push(value.marker());
            out.push_str(&value.wire_text());
            out.push('\n');
        }
        out.push_str("}\n");
    }
}

/// An ordered sequence of blocks. The first block is the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Packet {
    blocks: Vec<Block>,
}

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The header block, if any
    pub fn header(&self) -> Option<&Block> {
        self.blocks.first()
    }

    /// Every block after the header
    pub fn body(&self) -> &[Block] {
        self.blocks.get(1..).unwrap_or(&[])
    }

    /// First block with the given name (case-insensitive)
    pub fn block(&self, name: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Serialize to wire bytes
    pub fn to_bytes(&self) -> Bytes {
        Bytes::from(serialize(self))
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serialize(self))
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse wire text into a packet, validating the grammar
pub fn parse(text: &str) -> Result<Packet> {
    let mut lines = Lines::new(text);
    let mut packet = Packet::new();

    while !lines.is_done() {
        let (line_no, name) = lines.next_line()?;
        check_identifier(name, line_no, "block name")?;

        let (line_no, open) = lines.next_line()?;
        if open != "{" {
            return Err(Error::Format(format!(
                "line {}: expected '{{' after block {}, got {:?}",
                line_no, name, open
            )));
        }

        let mut block = Block::new(name);
        loop {
            let (line_no, line) = lines.next_line()?;
            if line == "}" {
                break;
            }
            let (key, value) = parse_pair(line, line_no)?;
            block.pairs.push((key.to_string(), value));
        }
        packet.push(block);
    }

    Ok(packet)
}

/// Parse without structural validation.
///
/// Agrees with [`parse`] on well-formed input. Malformed input produces an
/// unspecified packet rather than an error; undecodable hex is kept as text.
pub fn fast_parse(text: &str) -> Packet {
    let mut packet = Packet::new();
    let mut current: Option<Block> = None;
    let mut lines = text.split('\n');

    while let Some(line) = lines.next() {
        match current.as_mut() {
            None => {
                if line.is_empty() {
                    continue;
                }
                current = Some(Block::new(line));
                // Opening brace
                lines.next();
            }
            Some(block) => {
                if line == "}" {
                    if let Some(block) = current.take() {
                        packet.push(block);
                    }
                    continue;
                }
                let Some(split) = line.find(['=', '!']) else {
                    continue;
                };
                let key = &line[..split];
                let raw = &line[split + 1..];
                let value = if line.as_bytes()[split] == b'!' {
                    match hex::decode(raw) {
                        Ok(data) => Value::Hex {
                            data: Bytes::from(data),
                            wire: raw.to_string(),
                        },
                        Err(_) => Value::Ascii(raw.to_string()),
                    }
                } else {
                    Value::Ascii(raw.to_string())
                };
                block.pairs.push((key.to_string(), value));
            }
        }
    }

    if let Some(block) = current {
        packet.push(block);
    }
    packet
}

/// Serialize a packet to wire text
pub fn serialize(packet: &Packet) -> String {
    let capacity = packet
        .blocks
        .iter()
        .map(|b| b.name.len() + 5 + b.pairs.iter().map(|(k, v)| k.len() + v.as_bytes().len() * 2 + 2).sum::<usize>())
        .sum();
    let mut out = String::with_capacity(capacity);
    for block in &packet.blocks {
        block.write_to(&mut out);
    }
    out
}

// ============================================================================
// GRAMMAR HELPERS
// ============================================================================

/// Newline-terminated line reader that tracks line numbers
struct Lines<'a> {
    rest: &'a str,
    line_no: usize,
}

impl<'a> Lines<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            rest: text,
            line_no: 0,
        }
    }

    fn is_done(&self) -> bool {
        self.rest.is_empty()
    }

    fn next_line(&mut self) -> Result<(usize, &'a str)> {
        self.line_no += 1;
        if self.rest.is_empty() {
            return Err(Error::Format(format!(
                "line {}: unexpected end of message (unterminated block)",
                self.line_no
            )));
        }
        match self.rest.find('\n') {
            Some(end) => {
                let line = &self.rest[..end];
                self.rest = &self.rest[end + 1..];
                Ok((self.line_no, line))
            }
            None => Err(Error::Format(format!(
                "line {}: missing newline terminator",
                self.line_no
            ))),
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    matches!(c, ' '..='~') && !matches!(c, '=' | '!' | '{' | '}')
}

fn check_identifier(s: &str, line_no: usize, what: &str) -> Result<()> {
    if s.is_empty() {
        return Err(Error::Format(format!("line {}: empty {}", line_no, what)));
    }
    if let Some(c) = s.chars().find(|c| !is_identifier_char(*c)) {
        return Err(Error::Format(format!(
            "line {}: unexpected character {:?} in {} {:?}",
            line_no, c, what, s
        )));
    }
    Ok(())
}

fn parse_pair(line: &str, line_no: usize) -> Result<(&str, Value)> {
    let Some(split) = line.find(['=', '!']) else {
        return Err(Error::Format(format!(
            "line {}: expected key=value or key!hex, got {:?}",
            line_no, line
        )));
    };
    let key = &line[..split];
    check_identifier(key, line_no, "key")?;

    let raw = &line[split + 1..];
    if line.as_bytes()[split] == b'=' {
        return Ok((key, Value::Ascii(raw.to_string())));
    }

    if raw.len() % 2 != 0 {
        return Err(Error::Format(format!(
            "line {}: odd number of hex digits for key {}",
            line_no, key
        )));
    }
    let data = hex::decode(raw).map_err(|e| {
        Error::Format(format!("line {}: invalid hex for key {}: {}", line_no, key, e))
    })?;

    Ok((
        key,
        Value::Hex {
            data: Bytes::from(data),
            wire: raw.to_string(),
        },
    ))
}
