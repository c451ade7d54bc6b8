//! Message header block

use crate::codec::{Block, Value};
use crate::{Address, Error, Result, HEADER_BLOCK, PROTOCOL_VERSION};

/// Standard header fields of an xAP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Header block name (`xap-header`, `xap-hbeat`, ...)
    pub name: String,
    /// Protocol version (`v`)
    pub version: u32,
    /// Hop count
    pub hop: u32,
    /// Source uid (base uid or endpoint uid)
    pub uid: String,
    /// Message class, `Vendor.SchemaType`. Empty only for messages
    /// received without one.
    pub class: String,
    pub source: Address,
    pub target: Option<Address>,
    /// Any other header pairs, in order
    pub extra: Vec<(String, Value)>,
}

const KNOWN_KEYS: [&str; 6] = ["v", "hop", "uid", "class", "source", "target"];

impl Header {
    /// A header for a locally generated message (version 12, hop 1)
    pub fn new(class: impl Into<String>, source: Address, uid: impl Into<String>) -> Self {
        Self {
            name: HEADER_BLOCK.to_string(),
            version: PROTOCOL_VERSION,
            hop: 1,
            uid: uid.into(),
            class: class.into(),
            source,
            target: None,
            extra: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_target(mut self, target: Address) -> Self {
        self.target = Some(target);
        self
    }

    /// Parse header fields from a header block
    pub fn from_block(block: &Block) -> Result<Self> {
        Self::parse_block(block, true)
    }

    /// Like [`from_block`](Self::from_block), but a missing class is read
    /// as an empty one
    pub fn from_block_without_class(block: &Block) -> Result<Self> {
        Self::parse_block(block, false)
    }

    fn parse_block(block: &Block, class_required: bool) -> Result<Self> {
        let required = |key: &str| {
            block
                .text(key)
                .map(|v| v.into_owned())
                .ok_or_else(|| Error::InvalidHeader(format!("{} header lacks {}", block.name(), key)))
        };
        let integer = |key: &str| -> Result<u32> {
            let text = required(key)?;
            text.trim().parse().map_err(|_| {
                Error::InvalidHeader(format!("{} must be an integer, not {:?}", key, text))
            })
        };

        let version = integer("v")?;
        let hop = integer("hop")?;
        let uid = required("uid")?;
        let class = match block.text("class") {
            Some(class) => class.into_owned(),
            None if class_required => {
                return Err(Error::InvalidHeader(format!(
                    "{} header lacks class",
                    block.name()
                )))
            }
            None => String::new(),
        };
        let source = Address::parse(&required("source")?)?;
        let target = block
            .text("target")
            .map(|t| Address::parse(&t))
            .transpose()?;

        let extra = block
            .iter()
            .filter(|(k, _)| !KNOWN_KEYS.iter().any(|known| known.eq_ignore_ascii_case(k)))
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();

        Ok(Self {
            name: block.name().to_string(),
            version,
            hop,
            uid,
            class,
            source,
            target,
            extra,
        })
    }

    /// Build the header block. An empty class is left out.
    pub fn to_block(&self) -> Block {
        let mut block = Block::new(self.name.clone())
            .with("v", self.version.to_string())
            .with("hop", self.hop.to_string())
            .with("uid", self.uid.clone());
        if !self.class.is_empty() {
            block.push("class", self.class.clone());
        }
        block.push("source", self.source.to_string());
        if let Some(target) = &self.target {
            block.push("target", target.to_string());
        }
        for (key, value) in &self.extra {
            block.push(key.clone(), value.clone());
        }
        block
    }

    /// Extra header value by key (case-insensitive)
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Set or replace an extra header value
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.extra.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(key)) {
            Some(slot) => slot.1 = value,
            None => self.extra.push((key.to_string(), value)),
        }
    }

    /// The trailing two hex digits of the uid (the endpoint sub-uid)
    pub fn sub_uid(&self) -> Option<u8> {
        let start = self.uid.len().checked_sub(2)?;
        self.uid
            .get(start..)
            .and_then(|tail| u8::from_str_radix(tail, 16).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn test_header_from_block() {
        let packet = codec::parse(
            "xap-header\n{\nV=12\nHop=1\nUID=FF345601\nClass=xAPBSC.query\nSource=a.b.c\nTarget=d.e.f:g\nx-extra=1\n}\n",
        )
        .unwrap();
        let header = Header::from_block(packet.header().unwrap()).unwrap();
        assert_eq!(header.version, 12);
        assert_eq!(header.hop, 1);
        assert_eq!(header.class, "xAPBSC.query");
        assert_eq!(header.target.as_ref().unwrap().endpoint(), Some("g"));
        assert_eq!(header.extra.len(), 1);
        assert_eq!(header.sub_uid(), Some(1));
    }

    #[test]
    fn test_header_missing_field() {
        let packet = codec::parse("xap-header\n{\nv=12\nhop=1\nclass=a.b\nsource=a.b.c\n}\n").unwrap();
        assert!(matches!(
            Header::from_block(packet.header().unwrap()),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_header_without_class() {
        let text = "xap-header\n{\nv=12\nhop=1\nuid=FF345600\nsource=a.b.c\n}\n";
        let packet = codec::parse(text).unwrap();
        let block = packet.header().unwrap();
        assert!(matches!(
            Header::from_block(block),
            Err(Error::InvalidHeader(_))
        ));

        let header = Header::from_block_without_class(block).unwrap();
        assert!(header.class.is_empty());
        let out = codec::serialize(&codec::Packet::new().with_block(header.to_block()));
        assert_eq!(out, text);
    }

    #[test]
    fn test_header_bad_version() {
        let packet =
            codec::parse("xap-header\n{\nv=twelve\nhop=1\nuid=FF345600\nclass=a.b\nsource=a.b.c\n}\n")
                .unwrap();
        assert!(Header::from_block(packet.header().unwrap()).is_err());
    }

    #[test]
    fn test_header_block_order() {
        let source = Address::parse("a.b.c").unwrap();
        let mut header = Header::new("x.y", source, "FF345600");
        header.set("interval", "60");
        let text = codec::serialize(&codec::Packet::new().with_block(header.to_block()));
        assert_eq!(
            text,
            "xap-header\n{\nv=12\nhop=1\nuid=FF345600\nclass=x.y\nsource=a.b.c\ninterval=60\n}\n"
        );
    }
}
